//! Body pose landmarks.

use std::path::Path;

use crate::landmark::{Estimate, Landmark, Landmarks, Network};
use crate::nn::{Cnn, CnnInputShape, ColorMapper, NeuralNetwork, Outputs};
use crate::num::sigmoid;

/// Number of named pose landmarks.
const NUM_POSE_LANDMARKS: usize = 33;
/// The pose network also outputs 6 auxiliary landmarks used for RoI tracking.
const NUM_AUX_LANDMARKS: usize = 6;

/// Body pose landmarks of a single person.
#[derive(Debug, Clone)]
pub struct BodyLandmarks {
    pose_presence: f32,
    landmarks: Landmarks,
}

impl Default for BodyLandmarks {
    fn default() -> Self {
        Self {
            pose_presence: 0.0,
            landmarks: Landmarks::new(NUM_POSE_LANDMARKS + NUM_AUX_LANDMARKS),
        }
    }
}

impl Estimate for BodyLandmarks {
    #[inline]
    fn landmarks_mut(&mut self) -> &mut Landmarks {
        &mut self.landmarks
    }

    #[inline]
    fn confidence(&self) -> f32 {
        self.pose_presence
    }
}

impl BodyLandmarks {
    /// Creates a set of body landmarks with every landmark at the origin.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter placing landmark `idx` at `(x, y)`.
    pub fn with(mut self, idx: LandmarkIdx, x: f64, y: f64) -> Self {
        self.set(idx, Landmark::at(x, y));
        self
    }

    pub fn pose_landmarks(&self) -> impl Iterator<Item = Landmark> + '_ {
        (0..NUM_POSE_LANDMARKS).map(|i| self.landmarks.get(i))
    }

    pub fn get(&self, idx: LandmarkIdx) -> Landmark {
        self.landmarks.get(idx as usize)
    }

    pub fn set(&mut self, idx: LandmarkIdx, landmark: Landmark) {
        self.landmarks.set(idx as usize, landmark);
    }

    #[cfg(test)]
    pub(crate) fn with_confidence(mut self, presence: f32) -> Self {
        self.pose_presence = presence;
        self
    }

    /// Returns whether landmark `idx` is likely visible in the frame.
    ///
    /// Landmarks without visibility information are treated as visible.
    pub fn is_visible(&self, idx: LandmarkIdx) -> bool {
        self.get(idx).visibility().map_or(true, |v| v > 0.5)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkIdx {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

/// Landmarks on the head, from the nose to the mouth corners.
pub const HEAD_LANDMARKS: &[LandmarkIdx] = {
    use LandmarkIdx::*;
    &[
        Nose,
        LeftEyeInner,
        LeftEye,
        LeftEyeOuter,
        RightEyeInner,
        RightEye,
        RightEyeOuter,
        LeftEar,
        RightEar,
        MouthLeft,
        MouthRight,
    ]
};

/// The full-size pose landmark network (`pose_landmark_full.onnx`).
pub struct PoseNetwork {
    cnn: Cnn,
}

impl PoseNetwork {
    pub const FILE_NAME: &'static str = "pose_landmark_full.onnx";

    /// Loads the network from `model_dir`.
    pub fn load(model_dir: &Path) -> anyhow::Result<Self> {
        let cnn = Cnn::new(
            NeuralNetwork::from_path(model_dir.join(Self::FILE_NAME))?,
            CnnInputShape::NCHW,
            ColorMapper::linear(0.0..=1.0),
        )?;
        Ok(Self { cnn })
    }
}

impl Network for PoseNetwork {
    type Output = BodyLandmarks;

    fn cnn(&self) -> &Cnn {
        &self.cnn
    }

    fn extract(&self, outputs: &Outputs, estimate: &mut BodyLandmarks) -> anyhow::Result<()> {
        let screen_landmarks = outputs.f32s(0)?;
        let expected = (NUM_POSE_LANDMARKS + NUM_AUX_LANDMARKS) * 5;
        if screen_landmarks.len() != expected {
            anyhow::bail!(
                "pose network returned {} values, expected {}",
                screen_landmarks.len(),
                expected
            );
        }

        estimate.pose_presence = outputs.scalar(1)?;

        for (i, chunk) in screen_landmarks.chunks_exact(5).enumerate() {
            let [x, y, z, visibility, _presence] = [chunk[0], chunk[1], chunk[2], chunk[3], chunk[4]];
            estimate.landmarks.set(
                i,
                Landmark::new([x.into(), y.into(), z.into()]).with_visibility(sigmoid(visibility)),
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_landmarks() {
        let body = BodyLandmarks::new()
            .with(LandmarkIdx::Nose, 0.5, 0.3)
            .with(LandmarkIdx::RightWrist, 0.6, 0.2);
        assert_eq!(body.get(LandmarkIdx::Nose), Landmark::at(0.5, 0.3));
        assert_eq!(body.get(LandmarkIdx::RightWrist).y(), 0.2);
        assert_eq!(body.get(LandmarkIdx::LeftWrist).x(), 0.0);
        assert_eq!(body.pose_landmarks().count(), 33);
        assert!(body.is_visible(LandmarkIdx::Nose));
    }

    #[test]
    fn visibility() {
        let mut body = BodyLandmarks::new();
        body.set(
            LandmarkIdx::LeftWrist,
            Landmark::at(0.1, 0.1).with_visibility(0.2),
        );
        assert!(!body.is_visible(LandmarkIdx::LeftWrist));
        assert!(!body.is_visible(LandmarkIdx::RightWrist));
    }
}
