//! Video capture.

pub mod webcam;

use crate::image::Image;
use crate::timer::Timer;

/// A source of camera frames.
pub trait Camera {
    /// Reads the next frame.
    ///
    /// May block until a frame is available.
    fn read(&mut self) -> anyhow::Result<Image>;

    /// Releases the capture device. Reading from a released camera fails.
    fn release(&mut self) -> anyhow::Result<()>;

    /// Returns the profiling timers of this camera, if it has any.
    fn timers(&self) -> Vec<&Timer> {
        Vec::new()
    }
}

/// Stand-in for a camera that could not be opened. Every read fails.
#[derive(Debug, Default)]
pub struct Disconnected;

impl Camera for Disconnected {
    fn read(&mut self) -> anyhow::Result<Image> {
        anyhow::bail!("no camera available")
    }

    fn release(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disconnected_never_yields_frames() {
        let mut camera = Disconnected;
        assert!(camera.read().is_err());
        assert!(camera.read().is_err());
        camera.release().unwrap();
        assert!(camera.timers().is_empty());
    }
}
