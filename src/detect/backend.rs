use anyhow::Result;

use crate::detect::result::Detection;

/// Detector backend trait.
///
/// Implementations run one inference pass per call and report detections
/// in pixel coordinates of the given frame. Implementations must treat
/// the pixel slice as read-only and ephemeral.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a tightly packed RGB8 frame.
    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<Detection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
