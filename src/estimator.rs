//! Holistic body, hand and face landmark estimation.
//!
//! The body network runs on the whole frame. Its landmarks are then used to find the regions of
//! interest for the hand and face networks, which run on those crops. When the body or its head is
//! not visible, the face mesh runs on the whole frame instead, so close-up faces are still found.
//!
//! Each network's result is kept or dropped on its own: a failed hand crop does not discard the
//! body or face landmarks of the same frame.

use std::path::Path;

use crate::body::{self, BodyLandmarks, PoseNetwork, HEAD_LANDMARKS};
use crate::config::StartupError;
use crate::face::{FaceLandmarks, FaceMeshNetwork};
use crate::hand::{HandLandmarks, HandNetwork};
use crate::image::{Image, Rect, Resolution};
use crate::landmark::{Detections, Estimate, Estimator, LandmarkSource};
use crate::timer::Timer;

/// Results with a lower presence or face flag are discarded.
const MIN_CONFIDENCE: f32 = 0.5;

/// Hand crops are never smaller than this, in pixels.
const MIN_HAND_ROI_SIZE: f32 = 32.0;

/// Size of a hand crop, relative to the wrist-to-palm distance.
const HAND_ROI_SCALE: f32 = 4.0;

/// Size of a face crop, relative to the ear-to-ear distance.
const FACE_ROI_SCALE: f32 = 1.8;

/// A [`LandmarkSource`] running the pose, hand and face mesh networks.
pub struct HolisticEstimator {
    body: Option<Estimator<PoseNetwork>>,
    hand: Option<Estimator<HandNetwork>>,
    face: Option<Estimator<FaceMeshNetwork>>,
}

impl HolisticEstimator {
    /// Loads all three networks from `model_dir`.
    pub fn load(model_dir: &Path) -> Result<Self, StartupError> {
        let load = || -> anyhow::Result<Self> {
            Ok(Self {
                body: Some(Estimator::new("body", PoseNetwork::load(model_dir)?)),
                hand: Some(Estimator::new("hands", HandNetwork::load(model_dir)?)),
                face: Some(Estimator::new("face", FaceMeshNetwork::load(model_dir)?)),
            })
        };

        let this = load().map_err(|source| StartupError::Estimator {
            model_dir: model_dir.to_path_buf(),
            source,
        })?;
        log::info!("loaded landmark models from '{}'", model_dir.display());
        Ok(this)
    }
}

impl LandmarkSource for HolisticEstimator {
    fn detect(&mut self, frame: &Image) -> anyhow::Result<Detections> {
        let (Some(body_est), Some(hand_est), Some(face_est)) = (&self.body, &self.hand, &self.face)
        else {
            anyhow::bail!("landmark estimators have been released");
        };

        let full_frame = frame.rect().grow_to_square();
        let res = frame.resolution();

        let body = accept("body", body_est.estimate(frame, full_frame));
        let hands = match &body {
            Some(body) => hand_rois(body, res)
                .into_iter()
                .map(|roi| hand_est.estimate(frame, roi))
                .collect(),
            None => Vec::new(),
        };

        // Without usable body landmarks, look for a face close to the camera.
        let face_roi = body
            .as_ref()
            .and_then(|body| face_roi(body, res))
            .unwrap_or(full_frame);
        let face = face_est.estimate(frame, face_roi);

        Ok(assemble(body, hands, face))
    }

    fn release(&mut self) -> anyhow::Result<()> {
        let mut released = 0;
        for (name, was_loaded) in [
            ("body", self.body.take().is_some()),
            ("hand", self.hand.take().is_some()),
            ("face", self.face.take().is_some()),
        ] {
            if was_loaded {
                log::debug!("released {} landmark estimator", name);
                released += 1;
            }
        }

        if released == 0 {
            anyhow::bail!("landmark estimators were already released");
        }
        Ok(())
    }

    fn timers(&self) -> Vec<&Timer> {
        let mut timers = Vec::new();
        timers.extend(self.body.as_ref().map(|e| e.timer()));
        timers.extend(self.hand.as_ref().map(|e| e.timer()));
        timers.extend(self.face.as_ref().map(|e| e.timer()));
        timers
    }
}

/// Keeps an estimate if it succeeded with enough confidence.
///
/// Failures are logged, so that one failing network does not discard the results of the others.
fn accept<T: Estimate>(what: &str, result: anyhow::Result<T>) -> Option<T> {
    match result {
        Ok(estimate) if estimate.confidence() >= MIN_CONFIDENCE => Some(estimate),
        Ok(_) => None,
        Err(e) => {
            log::warn!("{} landmark estimation failed: {:#}", what, e);
            None
        }
    }
}

fn assemble(
    body: Option<BodyLandmarks>,
    hands: Vec<anyhow::Result<HandLandmarks>>,
    face: anyhow::Result<FaceLandmarks>,
) -> Detections {
    Detections {
        body,
        hands: hands
            .into_iter()
            .filter_map(|hand| accept("hand", hand))
            .collect(),
        face: accept("face", face),
    }
}

fn to_pixel(body: &BodyLandmarks, idx: body::LandmarkIdx, res: Resolution) -> [f32; 2] {
    let lm = body.get(idx);
    [
        (lm.x() * f64::from(res.width())) as f32,
        (lm.y() * f64::from(res.height())) as f32,
    ]
}

fn distance([ax, ay]: [f32; 2], [bx, by]: [f32; 2]) -> f32 {
    (ax - bx).hypot(ay - by)
}

/// Computes the square crops for the hand network, left hand first.
///
/// A hand is only considered when the body network saw its wrist.
fn hand_rois(body: &BodyLandmarks, res: Resolution) -> Vec<Rect> {
    use body::LandmarkIdx::*;

    [
        (LeftWrist, LeftIndex, LeftPinky),
        (RightWrist, RightIndex, RightPinky),
    ]
    .into_iter()
    .filter(|(wrist, _, _)| body.is_visible(*wrist))
    .map(|(wrist, index, pinky)| {
        let wrist = to_pixel(body, wrist, res);
        let [ix, iy] = to_pixel(body, index, res);
        let [px, py] = to_pixel(body, pinky, res);
        let palm = [(ix + px) / 2.0, (iy + py) / 2.0];

        let size = (distance(wrist, palm) * HAND_ROI_SCALE).max(MIN_HAND_ROI_SIZE);
        Rect::from_center(palm[0], palm[1], size, size)
    })
    .collect()
}

/// Computes the square crop for the face mesh network.
///
/// Returns [`None`] when the nose is not visible.
fn face_roi(body: &BodyLandmarks, res: Resolution) -> Option<Rect> {
    use body::LandmarkIdx::*;

    if !body.is_visible(Nose) {
        return None;
    }

    let points = HEAD_LANDMARKS
        .iter()
        .map(|idx| to_pixel(body, *idx, res))
        .collect::<Vec<_>>();
    let n = points.len() as f32;
    let cx = points.iter().map(|p| p[0]).sum::<f32>() / n;
    let cy = points.iter().map(|p| p[1]).sum::<f32>() / n;

    let ears = distance(to_pixel(body, LeftEar, res), to_pixel(body, RightEar, res));
    let size = ears * FACE_ROI_SCALE;
    if size < 1.0 {
        return None;
    }
    Some(Rect::from_center(cx, cy, size, size))
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::body::LandmarkIdx as B;
    use crate::classify::{Classifier, PoseLabel};
    use crate::face::LandmarkIdx as F;
    use crate::hand::LandmarkIdx as H;
    use crate::landmark::Landmark;

    const RES: Resolution = Resolution::new(100, 100);

    #[test]
    fn hand_roi_geometry() {
        let body = BodyLandmarks::new()
            .with(B::LeftWrist, 0.5, 0.5)
            .with(B::LeftIndex, 0.4, 0.3)
            .with(B::LeftPinky, 0.6, 0.3)
            .with(B::RightWrist, 0.1, 0.1)
            .with(B::RightIndex, 0.1, 0.1)
            .with(B::RightPinky, 0.1, 0.1);
        let rois = hand_rois(&body, RES);
        assert_eq!(rois.len(), 2);

        // palm at (50, 30), 20px from the wrist
        let left = rois[0];
        assert_relative_eq!(left.center().0, 50.0, epsilon = 1e-4);
        assert_relative_eq!(left.center().1, 30.0, epsilon = 1e-4);
        assert_relative_eq!(left.width(), 80.0, epsilon = 1e-4);
        assert_relative_eq!(left.height(), 80.0, epsilon = 1e-4);

        // degenerate hand gets the minimum size
        assert_relative_eq!(rois[1].width(), MIN_HAND_ROI_SIZE, epsilon = 1e-4);
    }

    #[test]
    fn hidden_wrist_has_no_roi() {
        let mut body = BodyLandmarks::new();
        body.set(B::LeftWrist, Landmark::at(0.5, 0.5).with_visibility(0.1));
        body.set(B::RightWrist, Landmark::at(0.5, 0.5).with_visibility(0.9));
        let rois = hand_rois(&body, RES);
        assert_eq!(rois.len(), 1);
    }

    #[test]
    fn face_roi_geometry() {
        let mut body = BodyLandmarks::new();
        for idx in HEAD_LANDMARKS {
            body.set(*idx, Landmark::at(0.5, 0.4));
        }
        body.set(B::LeftEar, Landmark::at(0.6, 0.4));
        body.set(B::RightEar, Landmark::at(0.4, 0.4));

        let roi = face_roi(&body, RES).unwrap();
        assert_relative_eq!(roi.center().0, 50.0, epsilon = 1e-4);
        assert_relative_eq!(roi.center().1, 40.0, epsilon = 1e-4);
        assert_relative_eq!(roi.width(), 36.0, epsilon = 1e-4);
    }

    #[test]
    fn face_roi_needs_visible_nose() {
        let mut body = BodyLandmarks::new()
            .with(B::LeftEar, 0.6, 0.4)
            .with(B::RightEar, 0.4, 0.4);
        body.set(B::Nose, Landmark::at(0.5, 0.4).with_visibility(0.2));
        assert_eq!(face_roi(&body, RES), None);
    }

    fn confident_hand() -> HandLandmarks {
        HandLandmarks::new()
            .with(H::Wrist, 0.9, 0.95)
            .with(H::ThumbTip, 0.9, 0.9)
            .with(H::IndexFingerTip, 0.9, 0.9)
            .with(H::MiddleFingerTip, 0.9, 0.9)
            .with_confidence(0.9)
    }

    fn open_mouth() -> FaceLandmarks {
        FaceLandmarks::new()
            .with(F::MouthCenter, 0.5, 0.45)
            .with(F::MouthTop, 0.5, 0.4)
            .with(F::MouthBottom, 0.5, 0.6)
            .with(F::Forehead, 0.5, 0.1)
            .with(F::Chin, 0.5, 0.8)
            .with_confidence(0.9)
    }

    #[test]
    fn low_confidence_and_errors_are_dropped() {
        assert!(accept("hand", Ok(confident_hand())).is_some());
        assert!(accept("hand", Ok(confident_hand().with_confidence(0.4))).is_none());
        assert!(accept::<HandLandmarks>("hand", Err(anyhow::anyhow!("bad crop"))).is_none());
    }

    #[test]
    fn failed_hand_keeps_other_results() {
        let body = BodyLandmarks::new()
            .with(B::Nose, 0.5, 0.3)
            .with_confidence(0.9);
        let detections = assemble(
            Some(body),
            vec![Ok(confident_hand()), Err(anyhow::anyhow!("bad crop"))],
            Ok(open_mouth()),
        );
        assert!(detections.body.is_some());
        assert_eq!(detections.hands.len(), 1);
        assert!(detections.face.is_some());

        let detections = assemble(None, Vec::new(), Err(anyhow::anyhow!("inference failed")));
        assert!(detections.face.is_none());
    }

    #[test]
    fn face_without_body() {
        let detections = assemble(None, Vec::new(), Ok(open_mouth()));
        assert!(detections.body.is_none());
        let classification = Classifier::default().classify(&detections);
        assert_eq!(classification.label, PoseLabel::Shocking);
    }

    #[test]
    fn missing_models() {
        let err = HolisticEstimator::load(Path::new("/nonexistent/models"))
            .err()
            .unwrap();
        assert_eq!(err.exit_code(), 2);
    }
}
