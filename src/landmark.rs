//! Common code for visual landmark estimation.
//!
//! Landmarks handed out by this crate use *normalized* image coordinates: `x` and `y` are
//! fractions of the frame's width and height, with `(0, 0)` in the top left corner and Y pointing
//! down. The `z` coordinate is network-specific and unused by pose classification.

use crate::body::BodyLandmarks;
use crate::face::FaceLandmarks;
use crate::hand::HandLandmarks;
use crate::image::{Image, Rect};
use crate::nn::{Cnn, Outputs};
use crate::timer::Timer;

pub type Position = [f64; 3];

/// A fixed-size collection of [`Landmark`]s.
#[derive(Clone, Debug)]
pub struct Landmarks {
    positions: Box<[Position]>,
    visibility: Option<Box<[f32]>>,
}

impl Landmarks {
    /// Creates a new [`Landmarks`] collection containing `len` preallocated landmarks.
    ///
    /// All landmarks will start with all coordinates at `0.0`.
    pub fn new(len: usize) -> Self {
        Self {
            positions: vec![[0.0, 0.0, 0.0]; len].into_boxed_slice(),
            visibility: None,
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Landmark> + Clone + '_ {
        (0..self.positions.len()).map(|i| self.get(i))
    }

    pub fn get(&self, index: usize) -> Landmark {
        let mut lm = Landmark::new(self.positions[index]);
        if let Some(vis) = &self.visibility {
            lm = lm.with_visibility(vis[index]);
        }
        lm
    }

    pub fn set(&mut self, index: usize, landmark: Landmark) {
        let len = self.positions.len();
        self.positions[index] = landmark.pos;
        if let Some(vis) = landmark.visibility {
            self.visibility.get_or_insert_with(|| vec![0.0; len].into())[index] = vis;
        }
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn positions_mut(&mut self) -> &mut [Position] {
        &mut self.positions
    }

    pub fn map_positions(&mut self, mut f: impl FnMut(Position) -> Position) {
        for pos in self.positions_mut() {
            *pos = f(*pos);
        }
    }
}

/// A landmark in (normalized) 3D space.
#[derive(Debug, PartialEq, PartialOrd, Clone, Copy)]
pub struct Landmark {
    pos: Position,
    visibility: Option<f32>,
}

impl Landmark {
    pub fn new(position: Position) -> Self {
        Self {
            pos: position,
            visibility: None,
        }
    }

    /// Creates a landmark in the image plane, with `z` set to 0.
    pub fn at(x: f64, y: f64) -> Self {
        Self::new([x, y, 0.0])
    }

    pub fn with_visibility(self, visibility: f32) -> Self {
        Self {
            visibility: Some(visibility),
            ..self
        }
    }

    #[inline]
    pub fn position(&self) -> Position {
        self.pos
    }

    #[inline]
    pub fn x(&self) -> f64 {
        self.pos[0]
    }

    #[inline]
    pub fn y(&self) -> f64 {
        self.pos[1]
    }

    #[inline]
    pub fn z(&self) -> f64 {
        self.pos[2]
    }

    /// Returns the probability that the landmark is visible (not occluded), if the network
    /// provides one.
    #[inline]
    pub fn visibility(&self) -> Option<f32> {
        self.visibility
    }

    /// Euclidean distance to `other` in the image plane, ignoring `z`.
    pub fn distance_2d(&self, other: &Landmark) -> f64 {
        (self.x() - other.x()).hypot(self.y() - other.y())
    }

    /// Converts the normalized coordinates to pixel coordinates in `image`.
    pub fn to_pixel(&self, image: &Image) -> (i32, i32) {
        (
            (self.x() * f64::from(image.width())).round() as i32,
            (self.y() * f64::from(image.height())).round() as i32,
        )
    }
}

/// All landmarks detected in a single camera frame.
///
/// Any of the landmark sets may be missing when the corresponding detection failed.
#[derive(Debug, Clone, Default)]
pub struct Detections {
    pub body: Option<BodyLandmarks>,
    /// Up to 2 hands, in detection order.
    pub hands: Vec<HandLandmarks>,
    pub face: Option<FaceLandmarks>,
}

impl Detections {
    /// Returns a [`Detections`] value where nothing was detected.
    pub fn none() -> Self {
        Self::default()
    }
}

/// Supplier of per-frame landmarks.
///
/// This is the seam between pose classification and whatever produces the landmarks, so that the
/// classification rules can be exercised with synthetic data.
pub trait LandmarkSource {
    /// Detects body, hand and face landmarks in `frame`.
    fn detect(&mut self, frame: &Image) -> anyhow::Result<Detections>;

    /// Releases the resources held by this source.
    ///
    /// Implementations must attempt to release every resource they own, even if releasing one of
    /// them fails.
    fn release(&mut self) -> anyhow::Result<()>;

    /// Returns the profiling timers of this source, if it has any.
    fn timers(&self) -> Vec<&Timer> {
        Vec::new()
    }
}

/// Trait for landmark estimation results produced by a [`Network`].
pub trait Estimate: Default {
    /// Returns the predicted [`Landmarks`].
    fn landmarks_mut(&mut self) -> &mut Landmarks;

    /// Confidence that the estimated object is actually present in the input, in range 0.0 to
    /// 1.0.
    fn confidence(&self) -> f32;
}

/// Trait implemented by wrapper types around neural networks that estimate landmarks.
pub trait Network {
    /// Type representing the predicted landmarks.
    type Output: Estimate;

    /// Returns the [`Cnn`] to use for landmark estimation.
    fn cnn(&self) -> &Cnn;

    /// Extracts the network outputs and writes them to `estimate`.
    ///
    /// The landmark positions are expected to be in the pixel coordinate system of the network's
    /// input.
    fn extract(&self, outputs: &Outputs, estimate: &mut Self::Output) -> anyhow::Result<()>;
}

/// Neural-network based landmark estimator.
///
/// Runs a [`Network`] on a region of a frame and maps the resulting landmarks back into normalized
/// frame coordinates.
pub struct Estimator<N: Network> {
    network: N,
    timer: Timer,
}

impl<N: Network> Estimator<N> {
    /// Creates an estimator that records its inference time in a [`Timer`] called `name`.
    pub fn new(name: &'static str, network: N) -> Self {
        Self {
            network,
            timer: Timer::new(name),
        }
    }

    /// Returns the profiling timer of this landmark estimator.
    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    /// Performs landmark estimation on the part of `frame` covered by `roi`.
    ///
    /// The region is stretched to the network's input resolution, so callers should pass a region
    /// with the right aspect ratio. Returned landmark coordinates are normalized to `frame`.
    pub fn estimate(&self, frame: &Image, roi: Rect) -> anyhow::Result<N::Output> {
        let _guard = self.timer.start();
        let cnn = self.network.cnn();
        let input_res = cnn.input_resolution();

        let outputs = cnn.estimate(frame, roi)?;
        log::trace!("inference result: {:?}", outputs);

        let mut estimate = N::Output::default();
        self.network.extract(&outputs, &mut estimate)?;

        let (w, h) = (f64::from(frame.width()), f64::from(frame.height()));
        estimate.landmarks_mut().map_positions(|[x, y, z]| {
            let [x, y] = roi.transform_out(
                x as f32,
                y as f32,
                input_res.width() as f32,
                input_res.height() as f32,
            );
            [f64::from(x) / w, f64::from(y) / h, z]
        });

        Ok(estimate)
    }
}
