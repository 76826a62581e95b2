use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};
use webeye_core::{EngineEvent, PlayerConfig, StreamSource, WindowHandle};
use webeye_native::{PayloadArch, PayloadSet};
use webeye_stream::{StreamPlayer, VideoSource, WebCamera};

use crate::export;

const USAGE: &str = "usage:
  webeye-probe devices  <capture-engine>
  webeye-probe snapshot <player-engine> <url | video=DEVICE> <out.png>

env:
  WEBEYE_PLAYER_CONFIG  path to a JSON player config";

/// How long to wait for the engine to report the stream started.
const START_TIMEOUT: Duration = Duration::from_secs(20);
const FRAME_ATTEMPTS: u32 = 25;
const FRAME_RETRY_DELAY: Duration = Duration::from_millis(200);

pub async fn run(args: &[String]) -> Result<()> {
    match args {
        [cmd, engine] if cmd == "devices" => devices(Path::new(engine)),
        [cmd, engine, source, out] if cmd == "snapshot" => {
            snapshot(Path::new(engine), parse_source(source), PathBuf::from(out)).await
        }
        _ => bail!("{USAGE}"),
    }
}

fn parse_source(arg: &str) -> StreamSource {
    match arg.strip_prefix("video=") {
        Some(device) => StreamSource::LocalDevice(device.to_string()),
        None => StreamSource::Url(arg.to_string()),
    }
}

fn payloads(engine: &Path) -> Result<PayloadSet> {
    let bytes = std::fs::read(engine).with_context(|| format!("reading engine build {}", engine.display()))?;
    Ok(PayloadSet::new().with(PayloadArch::current(), bytes))
}

fn player_config() -> Result<PlayerConfig> {
    let Ok(path) = std::env::var("WEBEYE_PLAYER_CONFIG") else {
        return Ok(PlayerConfig::default());
    };
    let json = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
    PlayerConfig::from_json(&json).with_context(|| format!("parsing {path}"))
}

fn devices(engine: &Path) -> Result<()> {
    let camera = WebCamera::load(&payloads(engine)?).context("loading capture engine")?;
    let devices = camera.list_devices()?;
    if devices.is_empty() {
        println!("no capture devices");
    }
    for (i, device) in devices.iter().enumerate() {
        println!("{i}: {device}\n   {}", device.device_path());
    }
    camera.shutdown()?;
    Ok(())
}

async fn snapshot(engine: &Path, source: StreamSource, out: PathBuf) -> Result<()> {
    let config = player_config()?;
    info!("Player config: {:?}", config);
    let player = StreamPlayer::load(&payloads(engine)?, config).context("loading streaming engine")?;
    let (_, mut events) = player.events().channel();

    player.initialize(WindowHandle::NONE)?;
    player.start(source.clone())?;

    match tokio::time::timeout(START_TIMEOUT, events.recv()).await {
        Ok(Some(EngineEvent::Started)) => info!("{} started", source),
        Ok(Some(EngineEvent::Failed { message })) => {
            bail!("{source} failed: {}", message.unwrap_or_else(|| "no details".into()))
        }
        Ok(Some(EngineEvent::Stopped)) | Ok(None) => bail!("{source} stopped before starting"),
        Err(_) => bail!("{source} did not start within {:?}", START_TIMEOUT),
    }

    let mut attempt = 0;
    let frame = loop {
        attempt += 1;
        match player.current_frame() {
            Ok(frame) => break frame,
            Err(e) if attempt < FRAME_ATTEMPTS => {
                warn!("No frame yet ({}), retrying", e);
                tokio::time::sleep(FRAME_RETRY_DELAY).await;
            }
            Err(e) => return Err(e).context("grabbing a frame"),
        }
    };

    export::save_png(&frame, &out)?;
    println!("{} {} frame → {}", frame.size(), frame.format, out.display());
    player.shutdown()?;
    Ok(())
}
