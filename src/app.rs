//! The capture, classify and display loop.
//!
//! [`App`] owns the camera and the landmark source and renders everything the window shows into a
//! single canvas image. It does not know about the window itself; [`crate::gui`] drives it.

use std::panic::{catch_unwind, AssertUnwindSafe};

use embedded_graphics::mono_font::iso_8859_9::{FONT_10X20, FONT_9X18_BOLD};

use crate::classify::{Classification, Classifier, PoseLabel};
use crate::gallery::{Gallery, PANEL_COLOR};
use crate::image::{draw, Color, Image, Resolution};
use crate::landmark::{Detections, LandmarkSource};
use crate::overlay;
use crate::timer::{FpsCounter, Timer};
use crate::video::Camera;

/// Size of the window contents.
pub const CANVAS_RES: Resolution = Resolution::new(1165, 600);

const BACKGROUND_COLOR: Color = Color::from_rgb8(0x2b, 0x2b, 0x2b);
const BORDER_COLOR: Color = Color::from_rgb8(0x44, 0x44, 0x44);
const POSE_NAME_COLOR: Color = Color::from_rgb8(0x4c, 0xaf, 0x50);

const TITLE_Y: i32 = 35;
const POSE_NAME_Y: i32 = 560;

const CAMERA_PANEL: Panel = Panel {
    x: 15,
    y: 55,
    res: Resolution::RES_VGA,
    title: "Canlı Kamera",
};

const ILLUSTRATION_PANEL: Panel = Panel {
    x: 670,
    y: 55,
    res: Resolution::new(480, 480),
    title: "Maymun Pozu",
};

/// A titled, framed area of the canvas.
struct Panel {
    x: i32,
    y: i32,
    res: Resolution,
    title: &'static str,
}

impl Panel {
    fn center_x(&self) -> i32 {
        self.x + self.res.width() as i32 / 2
    }

    /// Draws the panel with `content` centered inside of it.
    fn draw(&self, canvas: &mut Image, content: Option<&Image>) {
        draw::text(canvas, self.center_x(), TITLE_Y, self.title)
            .color(Color::WHITE)
            .font(&FONT_9X18_BOLD);

        draw::rect(
            canvas,
            self.x - 2,
            self.y - 2,
            self.res.width() + 4,
            self.res.height() + 4,
        )
        .color(BORDER_COLOR)
        .fill(PANEL_COLOR)
        .stroke_width(2);

        if let Some(content) = content {
            let dx = (i64::from(self.res.width()) - i64::from(content.width())) / 2;
            let dy = (i64::from(self.res.height()) - i64::from(content.height())) / 2;
            canvas.blit_from(i64::from(self.x) + dx, i64::from(self.y) + dy, content);
        }
    }
}

/// Result of a successful [`App::tick`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickOutcome {
    pub classification: Classification,
    /// Whether the label differs from the previous one (and the illustration was refreshed).
    pub changed: bool,
}

pub struct App {
    camera: Box<dyn Camera>,
    source: Box<dyn LandmarkSource>,
    classifier: Classifier,
    gallery: Gallery,
    current: PoseLabel,
    illustration: Image,
    camera_frame: Option<Image>,
    canvas: Image,
    released: bool,
    t_estimate: Timer,
    t_render: Timer,
    fps: FpsCounter,
}

impl App {
    pub fn new(
        camera: Box<dyn Camera>,
        source: Box<dyn LandmarkSource>,
        classifier: Classifier,
        gallery: Gallery,
    ) -> Self {
        let current = PoseLabel::default();
        let illustration = gallery.illustration(current, ILLUSTRATION_PANEL.res);
        let mut this = Self {
            camera,
            source,
            classifier,
            gallery,
            current,
            illustration,
            camera_frame: None,
            canvas: Image::filled(CANVAS_RES, BACKGROUND_COLOR),
            released: false,
            t_estimate: Timer::new("estimate"),
            t_render: Timer::new("render"),
            fps: FpsCounter::new("mimic"),
        };
        this.compose();
        this
    }

    /// Returns the label of the most recently classified frame.
    #[inline]
    pub fn current_pose(&self) -> PoseLabel {
        self.current
    }

    /// Returns the rendered window contents.
    #[inline]
    pub fn canvas(&self) -> &Image {
        &self.canvas
    }

    /// Captures, classifies and renders one frame.
    ///
    /// Returns [`None`] without changing anything if no frame could be read from the camera.
    pub fn tick(&mut self) -> Option<TickOutcome> {
        let mut frame = match self.camera.read() {
            Ok(frame) => frame,
            Err(e) => {
                log::debug!("skipping tick: {:#}", e);
                return None;
            }
        };
        frame.flip_horizontal_in_place();

        let detections = match self.t_estimate.time(|| self.source.detect(&frame)) {
            Ok(detections) => detections,
            Err(e) => {
                log::error!("landmark estimation failed: {:#}", e);
                Detections::none()
            }
        };

        let classification = self.classifier.classify(&detections);

        let camera_frame = self.t_render.time(|| {
            overlay::annotate(&mut frame, &detections, &classification);
            if frame.resolution() == CAMERA_PANEL.res {
                frame
            } else {
                frame.resized(CAMERA_PANEL.res)
            }
        });
        self.camera_frame = Some(camera_frame);

        let changed = classification.label != self.current;
        if changed {
            log::info!("pose changed: {} -> {}", self.current, classification.label);
            self.current = classification.label;
            self.illustration = self
                .gallery
                .illustration(self.current, ILLUSTRATION_PANEL.res);
        }
        self.compose();

        self.fps.tick_with(
            self.camera
                .timers()
                .into_iter()
                .chain(self.source.timers())
                .chain([&self.t_estimate, &self.t_render]),
        );

        Some(TickOutcome {
            classification,
            changed,
        })
    }

    fn compose(&mut self) {
        let canvas = &mut self.canvas;
        canvas.clear(BACKGROUND_COLOR);
        CAMERA_PANEL.draw(canvas, self.camera_frame.as_ref());
        ILLUSTRATION_PANEL.draw(canvas, Some(&self.illustration));
        draw::text(
            canvas,
            ILLUSTRATION_PANEL.center_x(),
            POSE_NAME_Y,
            self.current.display_name(),
        )
        .color(POSE_NAME_COLOR)
        .font(&FONT_10X20);
    }

    /// Releases the camera and the landmark source.
    ///
    /// Each resource is released even if releasing another one fails or panics. Calling this more
    /// than once has no effect.
    pub fn shutdown(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        log::info!("shutting down");
        release("camera", || self.camera.release());
        release("landmark estimators", || self.source.release());
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn release(what: &str, f: impl FnOnce() -> anyhow::Result<()>) {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => log::debug!("released {}", what),
        Ok(Err(e)) => log::error!("failed to release {}: {:#}", what, e),
        // the panic hook has already printed the message
        Err(_payload) => log::error!("panic while releasing {}", what),
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, rc::Rc};

    use super::*;
    use crate::face::{FaceLandmarks, LandmarkIdx as F};

    #[derive(Clone, Copy, PartialEq, Debug)]
    enum Release {
        Ok,
        Fail,
        Panic,
    }

    struct FakeCamera {
        working: Rc<Cell<bool>>,
        releases: Rc<Cell<u32>>,
        release: Release,
    }

    impl Camera for FakeCamera {
        fn read(&mut self) -> anyhow::Result<Image> {
            if !self.working.get() {
                anyhow::bail!("unplugged");
            }
            Ok(Image::filled(Resolution::RES_VGA, Color::from_rgb8(90, 90, 90)))
        }

        fn release(&mut self) -> anyhow::Result<()> {
            self.releases.set(self.releases.get() + 1);
            match self.release {
                Release::Ok => Ok(()),
                Release::Fail => anyhow::bail!("device busy"),
                Release::Panic => panic!("driver bug"),
            }
        }
    }

    /// Reports whatever detections are currently stored in `next`.
    struct FakeSource {
        next: Rc<Cell<Option<FaceLandmarks>>>,
        releases: Rc<Cell<u32>>,
    }

    impl LandmarkSource for FakeSource {
        fn detect(&mut self, _frame: &Image) -> anyhow::Result<Detections> {
            let face = self.next.take();
            self.next.set(face.clone());
            Ok(Detections {
                face,
                ..Detections::none()
            })
        }

        fn release(&mut self) -> anyhow::Result<()> {
            self.releases.set(self.releases.get() + 1);
            Ok(())
        }
    }

    struct Harness {
        app: App,
        camera_working: Rc<Cell<bool>>,
        camera_releases: Rc<Cell<u32>>,
        face: Rc<Cell<Option<FaceLandmarks>>>,
        source_releases: Rc<Cell<u32>>,
    }

    fn harness(release: Release) -> Harness {
        let camera_working = Rc::new(Cell::new(true));
        let camera_releases = Rc::new(Cell::new(0));
        let face = Rc::new(Cell::new(None));
        let source_releases = Rc::new(Cell::new(0));
        let app = App::new(
            Box::new(FakeCamera {
                working: camera_working.clone(),
                releases: camera_releases.clone(),
                release,
            }),
            Box::new(FakeSource {
                next: face.clone(),
                releases: source_releases.clone(),
            }),
            Classifier::default(),
            Gallery::default(),
        );
        Harness {
            app,
            camera_working,
            camera_releases,
            face,
            source_releases,
        }
    }

    fn open_mouth() -> FaceLandmarks {
        FaceLandmarks::new()
            .with(F::MouthCenter, 0.5, 0.5)
            .with(F::MouthTop, 0.5, 0.5)
            .with(F::MouthBottom, 0.5, 0.8)
            .with(F::Forehead, 0.5, 0.1)
            .with(F::Chin, 0.5, 0.9)
    }

    #[test]
    fn starts_with_default_pose() {
        let h = harness(Release::Ok);
        assert_eq!(h.app.current_pose(), PoseLabel::Default);
        assert_eq!(h.app.canvas().resolution(), CANVAS_RES);
    }

    #[test]
    fn failed_read_changes_nothing() {
        let mut h = harness(Release::Ok);
        h.face.set(Some(open_mouth()));
        h.camera_working.set(false);

        let before = h.app.canvas().data().to_vec();
        assert_eq!(h.app.tick(), None);
        assert_eq!(h.app.current_pose(), PoseLabel::Default);
        assert!(h.app.canvas().data() == &before[..]);
    }

    #[test]
    fn tick_renders_camera_frame() {
        let mut h = harness(Release::Ok);
        let before = h.app.canvas().data().to_vec();
        let outcome = h.app.tick().unwrap();
        assert_eq!(outcome.classification.label, PoseLabel::Default);
        assert!(!outcome.changed);
        assert!(h.app.canvas().data() != &before[..]);
    }

    #[test]
    fn label_change_refreshes_once() {
        let mut h = harness(Release::Ok);
        h.face.set(Some(open_mouth()));

        let changes = (0..3)
            .map(|_| h.app.tick().unwrap().changed)
            .collect::<Vec<_>>();
        assert_eq!(changes, [true, false, false]);
        assert_eq!(h.app.current_pose(), PoseLabel::Shocking);

        h.face.set(None);
        let outcome = h.app.tick().unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.classification.label, PoseLabel::Default);
    }

    #[test]
    fn shutdown_is_idempotent() {
        let mut h = harness(Release::Ok);
        h.app.shutdown();
        h.app.shutdown();
        drop(h.app);
        assert_eq!(h.camera_releases.get(), 1);
        assert_eq!(h.source_releases.get(), 1);
    }

    #[test]
    fn drop_releases() {
        let h = harness(Release::Ok);
        drop(h.app);
        assert_eq!(h.camera_releases.get(), 1);
        assert_eq!(h.source_releases.get(), 1);
    }

    #[test]
    fn shutdown_continues_after_failure() {
        for release in [Release::Fail, Release::Panic] {
            let mut h = harness(release);
            h.app.shutdown();
            assert_eq!(h.camera_releases.get(), 1, "{:?}", release);
            assert_eq!(h.source_releases.get(), 1, "{:?}", release);
        }
    }
}
