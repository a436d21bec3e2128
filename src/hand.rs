//! Hand landmarks.

use std::path::Path;

use crate::image::{draw, Color, Image};
use crate::landmark::{Estimate, Landmark, Landmarks, Network};
use crate::nn::{Cnn, CnnInputShape, ColorMapper, NeuralNetwork, Outputs};

const NUM_LANDMARKS: usize = 21;

/// Landmarks of a single hand.
#[derive(Debug, Clone)]
pub struct HandLandmarks {
    landmarks: Landmarks,
    presence: f32,
}

impl Default for HandLandmarks {
    fn default() -> Self {
        Self {
            landmarks: Landmarks::new(NUM_LANDMARKS),
            presence: 0.0,
        }
    }
}

impl HandLandmarks {
    /// Creates a set of hand landmarks with every landmark at the origin.
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

    pub fn landmarks(&self) -> impl Iterator<Item = Landmark> + '_ {
        self.landmarks.iter()
    }

    /// Returns the tips of the thumb, index finger and middle finger.
    pub fn fingertips(&self) -> [Landmark; 3] {
        FINGERTIPS.map(|idx| self.get(idx))
    }

    #[cfg(test)]
    pub(crate) fn with_confidence(mut self, presence: f32) -> Self {
        self.presence = presence;
        self
    }

    /// Draws the hand skeleton onto `target`.
    pub fn draw(&self, target: &mut Image) {
        for (a, b) in CONNECTIVITY {
            let (ax, ay) = self.get(*a).to_pixel(target);
            let (bx, by) = self.get(*b).to_pixel(target);
            draw::line(target, ax, ay, bx, by)
                .color(Color::GREEN)
                .stroke_width(2);
        }
        for lm in self.landmarks() {
            let (x, y) = lm.to_pixel(target);
            draw::marker(target, x, y).color(Color::RED);
        }
    }
}

impl Estimate for HandLandmarks {
    #[inline]
    fn landmarks_mut(&mut self) -> &mut Landmarks {
        &mut self.landmarks
    }

    #[inline]
    fn confidence(&self) -> f32 {
        self.presence
    }
}

/// Names for the hand pose landmarks.
///
/// # Terminology
///
/// - **CMC**: [Carpometacarpal joint], the lowest joint of the thumb, located near the wrist.
/// - **MCP**: [Metacarpophalangeal joint], the lower joint forming the knuckles near the palm of
///   the hand.
/// - **PIP**: Proximal Interphalangeal joint, the joint between the MCP and DIP.
/// - **DIP**: Distal Interphalangeal joint, the highest joint of a finger.
/// - **Tip**: This landmark is just placed on the tip of the finger, above the DIP.
///
/// [Carpometacarpal joint]: https://en.wikipedia.org/wiki/Carpometacarpal_joint
/// [Metacarpophalangeal joint]: https://en.wikipedia.org/wiki/Metacarpophalangeal_joint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkIdx {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexFingerMcp,
    IndexFingerPip,
    IndexFingerDip,
    IndexFingerTip,
    MiddleFingerMcp,
    MiddleFingerPip,
    MiddleFingerDip,
    MiddleFingerTip,
    RingFingerMcp,
    RingFingerPip,
    RingFingerDip,
    RingFingerTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

const FINGERTIPS: [LandmarkIdx; 3] = [
    LandmarkIdx::ThumbTip,
    LandmarkIdx::IndexFingerTip,
    LandmarkIdx::MiddleFingerTip,
];

pub const CONNECTIVITY: &[(LandmarkIdx, LandmarkIdx)] = {
    use LandmarkIdx::*;
    &[
        // Surround the palm:
        (Wrist, ThumbCmc),
        (ThumbCmc, IndexFingerMcp),
        (IndexFingerMcp, MiddleFingerMcp),
        (MiddleFingerMcp, RingFingerMcp),
        (RingFingerMcp, PinkyMcp),
        (PinkyMcp, Wrist),
        // Thumb:
        (ThumbCmc, ThumbMcp),
        (ThumbMcp, ThumbIp),
        (ThumbIp, ThumbTip),
        // Index:
        (IndexFingerMcp, IndexFingerPip),
        (IndexFingerPip, IndexFingerDip),
        (IndexFingerDip, IndexFingerTip),
        // Middle:
        (MiddleFingerMcp, MiddleFingerPip),
        (MiddleFingerPip, MiddleFingerDip),
        (MiddleFingerDip, MiddleFingerTip),
        // Ring:
        (RingFingerMcp, RingFingerPip),
        (RingFingerPip, RingFingerDip),
        (RingFingerDip, RingFingerTip),
        // Pinky:
        (PinkyMcp, PinkyPip),
        (PinkyPip, PinkyDip),
        (PinkyDip, PinkyTip),
    ]
};

/// The full-size hand landmark network (`hand_landmark_full.onnx`).
pub struct HandNetwork {
    cnn: Cnn,
}

impl HandNetwork {
    pub const FILE_NAME: &'static str = "hand_landmark_full.onnx";

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

impl Network for HandNetwork {
    type Output = HandLandmarks;

    fn cnn(&self) -> &Cnn {
        &self.cnn
    }

    fn extract(&self, outputs: &Outputs, estimate: &mut HandLandmarks) -> anyhow::Result<()> {
        let screen_landmarks = outputs.f32s(0)?;
        if screen_landmarks.len() != NUM_LANDMARKS * 3 {
            anyhow::bail!(
                "hand network returned {} landmark values, expected {}",
                screen_landmarks.len(),
                NUM_LANDMARKS * 3
            );
        }

        estimate.presence = outputs.scalar(1)?;
        for (chunk, out) in screen_landmarks
            .chunks_exact(3)
            .zip(estimate.landmarks.positions_mut())
        {
            *out = [chunk[0].into(), chunk[1].into(), chunk[2].into()];
        }

        Ok(())
    }
}
