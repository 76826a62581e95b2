use serde::{Deserialize, Serialize};

// MARK: - RtspTransport

/// Lower transport requested for RTSP sources. Raw values are part of the
/// engine's open call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RtspTransport {
    #[default]
    Undefined,
    Udp,
    Tcp,
    UdpMulticast,
    Http,
}

impl RtspTransport {
    pub fn as_raw(self) -> i32 {
        match self {
            Self::Undefined => 0,
            Self::Udp => 1,
            Self::Tcp => 2,
            Self::UdpMulticast => 3,
            Self::Http => 4,
        }
    }
}

// MARK: - RtspFlags

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RtspFlags {
    #[default]
    None,
    /// Accept packets only from the negotiated peer address and port.
    FilterSrc,
    /// Act as a server, listening for an incoming connection.
    Listen,
    /// Try TCP first when the transport is left undefined.
    PreferTcp,
}

impl RtspFlags {
    pub fn as_raw(self) -> i32 {
        match self {
            Self::None => 0,
            Self::FilterSrc => 1,
            Self::Listen => 2,
            Self::PreferTcp => 3,
        }
    }
}

// MARK: - ParamsLayout

/// Shape of the initialization record the engine build expects.
///
/// * `V1`: window, started, stopped, failed (no payload).
/// * `V2`: window, started, failed with an error message.
///
/// Neither supersedes the other; pick the one matching the payload shipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamsLayout {
    #[default]
    V1,
    V2,
}

// MARK: - PlayerConfig

/// Options for the streaming engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    #[serde(alias = "connectionTimeoutMs")]
    pub connection_timeout_ms: u32,
    #[serde(alias = "streamTimeoutMs")]
    pub stream_timeout_ms: u32,
    pub transport: RtspTransport,
    pub flags: RtspFlags,
    #[serde(alias = "paramsLayout")]
    pub params_layout: ParamsLayout,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            connection_timeout_ms: 15_000,
            stream_timeout_ms: 15_000,
            transport: RtspTransport::Undefined,
            flags: RtspFlags::None,
            params_layout: ParamsLayout::V1,
        }
    }
}

impl PlayerConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Preset for cameras behind NAT or firewalls that drop RTP over UDP.
    pub fn rtsp_over_tcp() -> Self {
        Self {
            transport: RtspTransport::Tcp,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_engine_expectations() {
        let cfg = PlayerConfig::default();
        assert_eq!(cfg.connection_timeout_ms, 15_000);
        assert_eq!(cfg.stream_timeout_ms, 15_000);
        assert_eq!(cfg.transport.as_raw(), 0);
        assert_eq!(cfg.flags.as_raw(), 0);
        assert_eq!(cfg.params_layout, ParamsLayout::V1);
    }

    #[test]
    fn deserializes_camel_case_fields() {
        let json = r#"{
            "connectionTimeoutMs": 5000,
            "streamTimeoutMs": 8000,
            "transport": "tcp",
            "flags": "prefer_tcp",
            "paramsLayout": "v2"
        }"#;

        let cfg = PlayerConfig::from_json(json).expect("valid camelCase config");
        assert_eq!(cfg.connection_timeout_ms, 5_000);
        assert_eq!(cfg.stream_timeout_ms, 8_000);
        assert_eq!(cfg.transport, RtspTransport::Tcp);
        assert_eq!(cfg.flags.as_raw(), 3);
        assert_eq!(cfg.params_layout, ParamsLayout::V2);
    }

    #[test]
    fn deserializes_snake_case_fields_with_defaults() {
        let json = r#"{ "connection_timeout_ms": 2500, "transport": "udp_multicast" }"#;

        let cfg = PlayerConfig::from_json(json).expect("valid snake_case config");
        assert_eq!(cfg.connection_timeout_ms, 2_500);
        assert_eq!(cfg.stream_timeout_ms, 15_000);
        assert_eq!(cfg.transport.as_raw(), 3);
        assert_eq!(cfg.params_layout, ParamsLayout::V1);
    }

    #[test]
    fn rejects_unknown_transport() {
        assert!(PlayerConfig::from_json(r#"{ "transport": "quic" }"#).is_err());
    }
}
