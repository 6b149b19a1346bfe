//! Desktop implementation of the session's host capabilities.

use crate::audio::{self, AudioIo};
use async_trait::async_trait;
use bloom_core::transport::Platform;
use bloom_core::{CapabilityError, MotionSample};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// Audio streams opened by the platform and picked up by the transport.
pub type AudioSlot = Arc<Mutex<Option<AudioIo>>>;

pub fn audio_slot() -> AudioSlot {
    Arc::new(Mutex::new(None))
}

pub struct DesktopPlatform {
    audio: AudioSlot,
    input_device: Option<String>,
    /// Line oriented accelerometer feed, e.g. a FIFO written by a sensor bridge.
    motion_input: Option<PathBuf>,
}

impl DesktopPlatform {
    pub fn new(audio: AudioSlot, input_device: Option<String>, motion_input: Option<PathBuf>) -> Self {
        Self {
            audio,
            input_device,
            motion_input,
        }
    }
}

#[async_trait]
impl Platform for DesktopPlatform {
    async fn request_audio_capability(&mut self) -> Result<(), CapabilityError> {
        if self.audio.lock().map(|slot| slot.is_some()).unwrap_or(false) {
            return Ok(());
        }
        let input_device = self.input_device.clone();
        let io = tokio::task::spawn_blocking(move || audio::open(input_device))
            .await
            .map_err(|e| CapabilityError::Other(format!("Audio setup task failed: {e}")))??;
        match self.audio.lock() {
            Ok(mut slot) => {
                *slot = Some(io);
                Ok(())
            }
            Err(_) => Err(CapabilityError::Other("Audio state is poisoned".to_string())),
        }
    }

    async fn request_motion_permission(&mut self) -> bool {
        // Desktop sensors need no prompt.
        true
    }

    fn motion_samples(&mut self) -> mpsc::Receiver<MotionSample> {
        let (tx, rx) = mpsc::channel(64);
        match self.motion_input.clone() {
            Some(path) => {
                tokio::spawn(async move {
                    if let Err(e) = pump_motion(path.clone(), tx).await {
                        tracing::warn!("motion input {} failed: {e:#}", path.display());
                    }
                });
            }
            None => tracing::info!("no motion input configured"),
        }
        rx
    }
}

async fn pump_motion(path: PathBuf, tx: mpsc::Sender<MotionSample>) -> anyhow::Result<()> {
    use anyhow::Context;
    let file = tokio::fs::File::open(&path)
        .await
        .with_context(|| format!("Failed to open motion input: {}", path.display()))?;
    let mut lines = BufReader::new(file).lines();
    while let Some(line) = lines.next_line().await? {
        let Some(sample) = parse_motion_line(&line) else {
            continue;
        };
        tracing::trace!(?sample, "motion sample");
        if tx.send(sample).await.is_err() {
            // Subscription dropped.
            break;
        }
    }
    Ok(())
}

/// Parses `x,y,z` or a JSON object with `x`, `y` and `z`. Blank lines and
/// `#` comments yield nothing, as do malformed lines.
pub fn parse_motion_line(line: &str) -> Option<MotionSample> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    if line.starts_with('{') {
        return match serde_json::from_str::<MotionSample>(line) {
            Ok(sample) => Some(sample),
            Err(e) => {
                tracing::debug!("ignoring motion line {line:?}: {e}");
                None
            }
        };
    }
    let mut axes = line.split(',').map(|v| v.trim().parse::<f64>());
    match (axes.next(), axes.next(), axes.next(), axes.next()) {
        (Some(Ok(x)), Some(Ok(y)), Some(Ok(z)), None) => Some(MotionSample::new(x, y, z)),
        _ => {
            tracing::debug!("ignoring motion line {line:?}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_csv_and_json_lines() {
        assert_eq!(
            parse_motion_line(" 0.5, 9.81 ,-0.25 "),
            Some(MotionSample::new(0.5, 9.81, -0.25))
        );
        assert_eq!(
            parse_motion_line(r#"{"x":1.0,"y":2.0,"z":3.0}"#),
            Some(MotionSample::new(1.0, 2.0, 3.0))
        );
        assert_eq!(parse_motion_line(r#"{"x":1.0}"#), Some(MotionSample::new(1.0, 0.0, 0.0)));
    }

    #[test]
    fn skips_noise() {
        assert_eq!(parse_motion_line(""), None);
        assert_eq!(parse_motion_line("# header"), None);
        assert_eq!(parse_motion_line("1,2"), None);
        assert_eq!(parse_motion_line("1,2,3,4"), None);
        assert_eq!(parse_motion_line("a,b,c"), None);
        assert_eq!(parse_motion_line("{broken"), None);
    }

    #[tokio::test]
    async fn streams_samples_from_a_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# x,y,z").unwrap();
        writeln!(file, "0,9.8,0").unwrap();
        writeln!(file, "garbage").unwrap();
        writeln!(file, "1,9.8,1").unwrap();

        let mut platform = DesktopPlatform::new(audio_slot(), None, Some(file.path().to_path_buf()));
        assert!(platform.request_motion_permission().await);
        let mut rx = platform.motion_samples();
        assert_eq!(rx.recv().await, Some(MotionSample::new(0.0, 9.8, 0.0)));
        assert_eq!(rx.recv().await, Some(MotionSample::new(1.0, 9.8, 1.0)));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn no_motion_input_closes_the_subscription() {
        let mut platform = DesktopPlatform::new(audio_slot(), None, None);
        let mut rx = platform.motion_samples();
        assert_eq!(rx.recv().await, None);
    }
}
