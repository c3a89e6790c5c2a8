use std::io::Cursor;

use async_trait::async_trait;
use base64::Engine as _;
use image::{ImageFormat, RgbaImage};

use crate::errors::{PilotError, PilotResult};
use crate::perception::traits::ScreenSource;
use crate::perception::types::ScreenshotMeta;

pub struct ScreenshotResult {
    pub png_bytes: Vec<u8>,
    pub image_base64: String,
    pub meta: ScreenshotMeta,
}

/// PNG-encodes a captured frame and base64s it for the model request.
pub fn encode_png(frame: &RgbaImage) -> PilotResult<ScreenshotResult> {
    let mut png_bytes = Vec::new();
    frame
        .write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)
        .map_err(|e| PilotError::Perception(format!("png encode: {e}")))?;
    let image_base64 = base64::engine::general_purpose::STANDARD.encode(&png_bytes);
    Ok(ScreenshotResult {
        png_bytes,
        image_base64,
        meta: ScreenshotMeta {
            width: frame.width(),
            height: frame.height(),
        },
    })
}

#[cfg(target_os = "windows")]
fn capture_primary_sync() -> PilotResult<ScreenshotResult> {
    let monitors =
        xcap::Monitor::all().map_err(|e| PilotError::Perception(format!("list monitors: {e}")))?;
    let monitor = monitors
        .iter()
        .find(|m| m.is_primary())
        .or_else(|| monitors.first())
        .ok_or_else(|| PilotError::Perception("no monitor found".into()))?;
    let frame = monitor
        .capture_image()
        .map_err(|e| PilotError::Perception(format!("capture: {e}")))?;
    encode_png(&frame)
}

#[cfg(not(target_os = "windows"))]
fn capture_primary_sync() -> PilotResult<ScreenshotResult> {
    Err(PilotError::Perception(
        "screen capture is only available on Windows".into(),
    ))
}

/// Captures the primary monitor on a blocking thread.
pub async fn capture_primary() -> PilotResult<ScreenshotResult> {
    let shot = tokio::task::spawn_blocking(capture_primary_sync)
        .await
        .map_err(|e| PilotError::Perception(format!("join: {e}")))??;
    tracing::debug!(
        width = shot.meta.width,
        height = shot.meta.height,
        bytes = shot.png_bytes.len(),
        "screen captured"
    );
    Ok(shot)
}

#[derive(Debug, Default)]
pub struct PrimaryScreen;

#[async_trait]
impl ScreenSource for PrimaryScreen {
    async fn capture(&self) -> PilotResult<ScreenshotResult> {
        capture_primary().await
    }
}
