//! Face mesh landmarks.
//!
//! The face mesh network estimates 468 landmarks covering the whole face. Only a handful of them
//! have names in [`LandmarkIdx`]; the lip contour is described by [`LIPS`].

use std::path::Path;

use crate::image::{draw, Color, Image};
use crate::landmark::{Estimate, Landmark, Landmarks, Network};
use crate::nn::{Cnn, CnnInputShape, ColorMapper, NeuralNetwork, Outputs};
use crate::num::sigmoid;

/// Face mesh landmarks of a single face.
#[derive(Debug, Clone)]
pub struct FaceLandmarks {
    landmarks: Landmarks,
    face_flag: f32,
}

impl Default for FaceLandmarks {
    fn default() -> Self {
        Self {
            landmarks: Landmarks::new(Self::NUM_LANDMARKS),
            face_flag: 0.0,
        }
    }
}

impl FaceLandmarks {
    pub const NUM_LANDMARKS: usize = 468;

    /// Creates a set of face landmarks with every landmark at the origin.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter placing landmark `idx` at `(x, y)`.
    pub fn with(mut self, idx: LandmarkIdx, x: f64, y: f64) -> Self {
        self.set(idx, Landmark::at(x, y));
        self
    }

    pub fn get(&self, idx: LandmarkIdx) -> Landmark {
        self.landmarks.get(idx as usize)
    }

    pub fn set(&mut self, idx: LandmarkIdx, landmark: Landmark) {
        self.landmarks.set(idx as usize, landmark);
    }

    #[inline]
    pub fn landmarks(&self) -> &Landmarks {
        &self.landmarks
    }

    /// Returns the points considered to be part of the mouth region.
    pub fn mouth_points(&self) -> [Landmark; 4] {
        [
            LandmarkIdx::MouthTop,
            LandmarkIdx::MouthBottom,
            LandmarkIdx::Chin,
            LandmarkIdx::MouthCenter,
        ]
        .map(|idx| self.get(idx))
    }

    #[cfg(test)]
    pub(crate) fn with_confidence(mut self, face_flag: f32) -> Self {
        self.face_flag = face_flag;
        self
    }

    /// Draws the lip contour onto `target`.
    pub fn draw_lips(&self, target: &mut Image) {
        for &(a, b) in LIPS {
            let (ax, ay) = self.landmarks.get(a).to_pixel(target);
            let (bx, by) = self.landmarks.get(b).to_pixel(target);
            draw::line(target, ax, ay, bx, by).color(Color::YELLOW);
        }
    }
}

impl Estimate for FaceLandmarks {
    #[inline]
    fn landmarks_mut(&mut self) -> &mut Landmarks {
        &mut self.landmarks
    }

    #[inline]
    fn confidence(&self) -> f32 {
        self.face_flag
    }
}

/// Names for the few face mesh landmarks used by pose classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkIdx {
    /// Center of the upper lip's outer edge.
    MouthCenter = 0,
    /// Top of the forehead.
    Forehead = 10,
    /// Inner edge of the upper lip.
    MouthTop = 13,
    /// Inner edge of the lower lip.
    MouthBottom = 14,
    Chin = 152,
}

/// Line segments forming the outer and inner lip contours.
pub const LIPS: &[(usize, usize)] = &[
    // outer, lower
    (61, 146),
    (146, 91),
    (91, 181),
    (181, 84),
    (84, 17),
    (17, 314),
    (314, 405),
    (405, 321),
    (321, 375),
    (375, 291),
    // outer, upper
    (61, 185),
    (185, 40),
    (40, 39),
    (39, 37),
    (37, 0),
    (0, 267),
    (267, 269),
    (269, 270),
    (270, 409),
    (409, 291),
    // inner, lower
    (78, 95),
    (95, 88),
    (88, 178),
    (178, 87),
    (87, 14),
    (14, 317),
    (317, 402),
    (402, 318),
    (318, 324),
    (324, 308),
    // inner, upper
    (78, 191),
    (191, 80),
    (80, 81),
    (81, 82),
    (82, 13),
    (13, 312),
    (312, 311),
    (311, 310),
    (310, 415),
    (415, 308),
];

/// The face mesh landmark network (`face_landmark.onnx`).
///
/// The input image must be a cropped image of a face that is mostly upright.
pub struct FaceMeshNetwork {
    cnn: Cnn,
}

impl FaceMeshNetwork {
    pub const FILE_NAME: &'static str = "face_landmark.onnx";

    /// Loads the network from `model_dir`.
    pub fn load(model_dir: &Path) -> anyhow::Result<Self> {
        let cnn = Cnn::new(
            NeuralNetwork::from_path(model_dir.join(Self::FILE_NAME))?,
            CnnInputShape::NCHW,
            ColorMapper::linear(-1.0..=1.0),
        )?;
        Ok(Self { cnn })
    }
}

impl Network for FaceMeshNetwork {
    type Output = FaceLandmarks;

    fn cnn(&self) -> &Cnn {
        &self.cnn
    }

    fn extract(&self, outputs: &Outputs, estimate: &mut FaceLandmarks) -> anyhow::Result<()> {
        let coords = outputs.f32s(0)?;
        if coords.len() != FaceLandmarks::NUM_LANDMARKS * 3 {
            anyhow::bail!(
                "face mesh network returned {} values, expected {}",
                coords.len(),
                FaceLandmarks::NUM_LANDMARKS * 3
            );
        }

        estimate.face_flag = sigmoid(outputs.scalar(1)?);
        for (chunk, out) in coords
            .chunks_exact(3)
            .zip(estimate.landmarks.positions_mut())
        {
            *out = [chunk[0].into(), chunk[1].into(), chunk[2].into()];
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::image::Resolution;

    use super::*;

    #[test]
    fn lips_stay_in_range() {
        assert_eq!(LIPS.len(), 40);
        assert!(LIPS
            .iter()
            .all(|&(a, b)| a < FaceLandmarks::NUM_LANDMARKS && b < FaceLandmarks::NUM_LANDMARKS));
    }

    #[test]
    fn mouth_points() {
        let face = FaceLandmarks::new()
            .with(LandmarkIdx::MouthTop, 0.5, 0.50)
            .with(LandmarkIdx::MouthBottom, 0.5, 0.62)
            .with(LandmarkIdx::Chin, 0.5, 0.90)
            .with(LandmarkIdx::MouthCenter, 0.5, 0.48);
        let ys = face.mouth_points().map(|lm| lm.y());
        assert_eq!(ys, [0.50, 0.62, 0.90, 0.48]);
    }

    #[test]
    fn draw_lips() {
        let mut image = Image::filled(Resolution::new(100, 100), Color::BLACK);
        let mut face = FaceLandmarks::new();
        for &(a, _) in LIPS {
            face.landmarks.set(a, Landmark::at(0.5, 0.5));
        }
        for &(_, b) in LIPS {
            face.landmarks.set(b, Landmark::at(0.5, 0.5));
        }
        face.draw_lips(&mut image);
        assert_eq!(image.get(50, 50), Some(Color::YELLOW));
        assert_eq!(image.get(0, 0), Some(Color::BLACK));
    }
}
