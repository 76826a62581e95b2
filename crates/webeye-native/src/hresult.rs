/// `SUCCEEDED(hr)`.
pub fn succeeded(code: i32) -> bool {
    code >= 0
}

/// Text for an HRESULT-style code: the system message when the platform
/// has one, always followed by the hex code.
pub fn describe(code: i32) -> String {
    let hex = format!("HRESULT 0x{:08X}", code as u32);
    match system_message(code) {
        Some(text) => format!("{text} ({hex})"),
        None => hex,
    }
}

#[cfg(target_os = "windows")]
fn system_message(code: i32) -> Option<String> {
    let text = windows::core::HRESULT(code).message();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

#[cfg(not(target_os = "windows"))]
fn system_message(_code: i32) -> Option<String> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_codes_are_failures() {
        assert!(succeeded(0));
        assert!(succeeded(1));
        assert!(!succeeded(0x8007_0005_u32 as i32));
    }

    #[test]
    fn description_includes_hex_code() {
        let text = describe(0x8007_0005_u32 as i32);
        assert!(text.contains("0x80070005"), "{text}");
    }
}
