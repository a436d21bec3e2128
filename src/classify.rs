//! Rule-based pose classification.
//!
//! [`Classifier::classify`] maps the landmarks detected in a single frame to one of four
//! [`PoseLabel`]s. Rules are checked in priority order and the first one that matches decides the
//! label:
//!
//! 1. [`PoseLabel::RaisingHand`]: a hand's wrist is above the nose by more than
//!    [`Thresholds::raised_hand`].
//! 2. [`PoseLabel::Thinking`]: a fingertip is closer to the mouth region than
//!    [`Thresholds::hand_to_mouth`].
//! 3. [`PoseLabel::Shocking`]: the mouth is opened wider than [`Thresholds::mouth_open`], relative
//!    to the face height.
//! 4. [`PoseLabel::Default`] otherwise.
//!
//! All comparisons are strict and operate on normalized coordinates.

use std::fmt;

use itertools::iproduct;

use crate::body::{self, BodyLandmarks};
use crate::face::{self, FaceLandmarks};
use crate::hand::{self, HandLandmarks};
use crate::landmark::Detections;

/// The discrete pose categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PoseLabel {
    RaisingHand,
    Thinking,
    Shocking,
    #[default]
    Default,
}

impl PoseLabel {
    pub const ALL: [PoseLabel; 4] = [
        PoseLabel::RaisingHand,
        PoseLabel::Thinking,
        PoseLabel::Shocking,
        PoseLabel::Default,
    ];

    /// Returns the canonical name of this label (eg. `raising_hand`).
    pub fn as_str(&self) -> &'static str {
        match self {
            PoseLabel::RaisingHand => "raising_hand",
            PoseLabel::Thinking => "thinking",
            PoseLabel::Shocking => "shocking",
            PoseLabel::Default => "default",
        }
    }

    /// Returns the (Turkish) name shown in the window.
    pub fn display_name(&self) -> &'static str {
        match self {
            PoseLabel::RaisingHand => "İşaret Parmağı Yukarıda",
            PoseLabel::Thinking => "El Yüzde (Düşünme)",
            PoseLabel::Shocking => "Ağız Açık (Şaşkınlık)",
            PoseLabel::Default => "Normal Duruş",
        }
    }
}

impl fmt::Display for PoseLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decision thresholds, in normalized image coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// Minimum height of a wrist above the nose for [`PoseLabel::RaisingHand`].
    pub raised_hand: f64,
    /// Maximum fingertip-to-mouth distance for [`PoseLabel::Thinking`].
    pub hand_to_mouth: f64,
    /// Minimum mouth opening, relative to the face height, for [`PoseLabel::Shocking`].
    pub mouth_open: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            raised_hand: 0.05,
            hand_to_mouth: 0.08,
            mouth_open: 0.15,
        }
    }
}

/// Per-frame values computed during classification, for display.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DebugInfo {
    /// Mouth opening divided by face height. 0.0 when no face was detected.
    pub mouth_ratio: f64,
    /// Nose height minus wrist height of the last examined hand. 0.0 when there is no body or hand.
    pub hand_height: f64,
    pub hands_detected: usize,
    pub face_detected: bool,
}

/// Result of classifying a single frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub label: PoseLabel,
    pub debug: DebugInfo,
}

/// Maps per-frame [`Detections`] to a [`PoseLabel`].
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    thresholds: Thresholds,
}

impl Classifier {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    #[inline]
    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Classifies the landmarks of one frame.
    ///
    /// The [`DebugInfo`] is always computed in full, even when a higher-priority rule already
    /// decided the label.
    pub fn classify(&self, detections: &Detections) -> Classification {
        let t = &self.thresholds;
        let hands = &detections.hands;

        let raised = match &detections.body {
            Some(body) => hand_height(body, hands, t.raised_hand),
            None => HandHeight::default(),
        };
        let mouth_ratio = detections.face.as_ref().map_or(0.0, mouth_ratio);

        let label = if raised.triggered {
            PoseLabel::RaisingHand
        } else if detections
            .face
            .as_ref()
            .map_or(false, |face| hand_near_mouth(face, hands, t.hand_to_mouth))
        {
            PoseLabel::Thinking
        } else if detections.face.is_some() && mouth_ratio > t.mouth_open {
            PoseLabel::Shocking
        } else {
            PoseLabel::Default
        };

        Classification {
            label,
            debug: DebugInfo {
                mouth_ratio,
                hand_height: raised.value,
                hands_detected: hands.len(),
                face_detected: detections.face.is_some(),
            },
        }
    }
}

#[derive(Default)]
struct HandHeight {
    value: f64,
    triggered: bool,
}

/// Checks the hands in detection order and stops at the first one raised above `threshold`.
///
/// The reported value is the one of the last hand examined, so with two lowered hands it is the
/// second hand's height, not the highest one.
fn hand_height(body: &BodyLandmarks, hands: &[HandLandmarks], threshold: f64) -> HandHeight {
    let nose = body.get(body::LandmarkIdx::Nose);
    let mut result = HandHeight::default();
    for hand in hands {
        let wrist = hand.get(hand::LandmarkIdx::Wrist);
        result.value = nose.y() - wrist.y();
        if result.value > threshold {
            result.triggered = true;
            break;
        }
    }
    result
}

fn hand_near_mouth(face: &FaceLandmarks, hands: &[HandLandmarks], threshold: f64) -> bool {
    let mouth = face.mouth_points();
    hands.iter().any(|hand| {
        iproduct!(hand.fingertips(), mouth).any(|(tip, point)| tip.distance_2d(&point) < threshold)
    })
}

/// Computes the vertical mouth opening relative to the forehead-to-chin distance.
///
/// Returns 0.0 if the face has no height.
pub fn mouth_ratio(face: &FaceLandmarks) -> f64 {
    let upper = face.get(face::LandmarkIdx::MouthTop);
    let lower = face.get(face::LandmarkIdx::MouthBottom);
    let forehead = face.get(face::LandmarkIdx::Forehead);
    let chin = face.get(face::LandmarkIdx::Chin);

    let face_height = (chin.y() - forehead.y()).abs();
    if face_height == 0.0 {
        return 0.0;
    }
    (lower.y() - upper.y()).abs() / face_height
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::body::LandmarkIdx as B;
    use crate::face::LandmarkIdx as F;
    use crate::hand::LandmarkIdx as H;

    fn body(nose_y: f64) -> BodyLandmarks {
        BodyLandmarks::new().with(B::Nose, 0.5, nose_y)
    }

    /// A hand whose three relevant fingertips all sit at `tips`.
    fn hand(wrist_y: f64, tips: (f64, f64)) -> HandLandmarks {
        HandLandmarks::new()
            .with(H::Wrist, 0.8, wrist_y)
            .with(H::ThumbTip, tips.0, tips.1)
            .with(H::IndexFingerTip, tips.0, tips.1)
            .with(H::MiddleFingerTip, tips.0, tips.1)
    }

    const FAR: (f64, f64) = (0.95, 0.05);

    fn face(upper: f64, lower: f64, forehead: f64, chin: f64) -> FaceLandmarks {
        FaceLandmarks::new()
            .with(F::MouthCenter, 0.7, (upper + lower) / 2.0)
            .with(F::MouthTop, 0.5, upper)
            .with(F::MouthBottom, 0.5, lower)
            .with(F::Forehead, 0.5, forehead)
            .with(F::Chin, 0.5, chin)
    }

    fn closed_face() -> FaceLandmarks {
        face(0.50, 0.52, 0.10, 0.90)
    }

    fn open_face() -> FaceLandmarks {
        face(0.50, 0.80, 0.10, 0.90)
    }

    fn classify(detections: &Detections) -> Classification {
        Classifier::default().classify(detections)
    }

    #[test]
    fn labels() {
        assert_eq!(PoseLabel::default(), PoseLabel::Default);
        assert_eq!(
            PoseLabel::ALL.map(|l| l.as_str()),
            ["raising_hand", "thinking", "shocking", "default"]
        );
        assert_eq!(PoseLabel::Shocking.to_string(), "shocking");
        assert_eq!(PoseLabel::Default.display_name(), "Normal Duruş");
    }

    #[test]
    fn nothing_detected() {
        let c = classify(&Detections::none());
        assert_eq!(c.label, PoseLabel::Default);
        assert_eq!(c.debug, DebugInfo::default());
    }

    #[test]
    fn deterministic() {
        let detections = Detections {
            body: Some(body(0.3)),
            hands: vec![hand(0.28, FAR)],
            face: Some(face(0.5, 0.6, 0.1, 0.9)),
        };
        assert_eq!(classify(&detections), classify(&detections));
    }

    #[test]
    fn raising_hand_boundary() {
        let mut detections = Detections {
            body: Some(body(0.05)),
            hands: vec![hand(0.0, FAR)],
            face: None,
        };
        assert_eq!(0.05 - 0.0, 0.05);
        let c = classify(&detections);
        assert_eq!(c.label, PoseLabel::Default);
        assert_eq!(c.debug.hand_height, 0.05);

        detections.body = Some(body(0.0501));
        assert_eq!(classify(&detections).label, PoseLabel::RaisingHand);
    }

    #[test]
    fn raising_hand_needs_body_and_hands() {
        let c = classify(&Detections {
            body: None,
            hands: vec![hand(0.0, FAR)],
            face: None,
        });
        assert_eq!(c.label, PoseLabel::Default);
        assert_eq!(c.debug.hand_height, 0.0);
        assert_eq!(c.debug.hands_detected, 1);

        let c = classify(&Detections {
            body: Some(body(0.9)),
            hands: vec![],
            face: None,
        });
        assert_eq!(c.label, PoseLabel::Default);
        assert_eq!(c.debug.hand_height, 0.0);
    }

    #[test]
    fn hand_height_stops_at_first_raised_hand() {
        let c = classify(&Detections {
            body: Some(body(0.5)),
            hands: vec![hand(0.3, FAR), hand(0.9, FAR)],
            face: None,
        });
        assert_eq!(c.label, PoseLabel::RaisingHand);
        assert_relative_eq!(c.debug.hand_height, 0.2, epsilon = 1e-12);
    }

    #[test]
    fn hand_height_reports_last_hand() {
        // The higher first hand does not win; the value of the last examined hand is reported.
        let c = classify(&Detections {
            body: Some(body(0.5)),
            hands: vec![hand(0.48, FAR), hand(0.49, FAR)],
            face: None,
        });
        assert_eq!(c.label, PoseLabel::Default);
        assert_relative_eq!(c.debug.hand_height, 0.01, epsilon = 1e-12);
    }

    #[test]
    fn thinking_uses_every_mouth_point() {
        // mouth points far enough apart that a fingertip can only be near one of them
        let f = FaceLandmarks::new()
            .with(F::MouthTop, 0.5, 0.3)
            .with(F::MouthBottom, 0.5, 0.5)
            .with(F::Chin, 0.5, 0.9)
            .with(F::MouthCenter, 0.7, 0.4)
            .with(F::Forehead, 0.5, 0.1);
        for target in [(0.5, 0.3), (0.5, 0.5), (0.5, 0.9), (0.7, 0.4)] {
            let c = classify(&Detections {
                body: None,
                hands: vec![hand(0.95, (target.0 + 0.03, target.1))],
                face: Some(f.clone()),
            });
            assert_eq!(c.label, PoseLabel::Thinking, "fingertip near {:?}", target);
        }

        // forehead is not part of the mouth region
        let c = classify(&Detections {
            body: None,
            hands: vec![hand(0.95, (0.5, 0.1))],
            face: Some(f),
        });
        assert_ne!(c.label, PoseLabel::Thinking);
    }

    #[test]
    fn thinking_checks_every_fingertip() {
        let base = HandLandmarks::new()
            .with(H::Wrist, 0.8, 0.95)
            .with(H::ThumbTip, FAR.0, FAR.1)
            .with(H::IndexFingerTip, FAR.0, FAR.1)
            .with(H::MiddleFingerTip, FAR.0, FAR.1);
        for tip in [H::ThumbTip, H::IndexFingerTip, H::MiddleFingerTip] {
            let c = classify(&Detections {
                body: None,
                hands: vec![hand(0.95, FAR), base.clone().with(tip, 0.51, 0.5)],
                face: Some(closed_face()),
            });
            assert_eq!(c.label, PoseLabel::Thinking, "{:?}", tip);
        }

        // ring finger is ignored
        let c = classify(&Detections {
            body: None,
            hands: vec![base.with(H::RingFingerTip, 0.5, 0.5)],
            face: Some(closed_face()),
        });
        assert_eq!(c.label, PoseLabel::Default);
    }

    #[test]
    fn thinking_distance_is_strict() {
        let classifier = Classifier::new(Thresholds {
            hand_to_mouth: 0.25,
            ..Thresholds::default()
        });
        // 0.25 is exactly representable, and so is the distance
        let c = classifier.classify(&Detections {
            body: None,
            hands: vec![hand(0.95, (0.25, 0.5))],
            face: Some(closed_face()),
        });
        assert_eq!(c.label, PoseLabel::Default);
    }

    #[test]
    fn thinking_distance_is_strict_at_default_threshold() {
        // 0.1 - 0.02 == 0.08 exactly
        let f = closed_face().with(F::MouthTop, 0.1, 0.5);
        assert_eq!(0.1 - 0.02, Thresholds::default().hand_to_mouth);

        let c = classify(&Detections {
            body: None,
            hands: vec![hand(0.95, (0.02, 0.5))],
            face: Some(f.clone()),
        });
        assert_eq!(c.label, PoseLabel::Default);

        let c = classify(&Detections {
            body: None,
            hands: vec![hand(0.95, (0.0201, 0.5))],
            face: Some(f),
        });
        assert_eq!(c.label, PoseLabel::Thinking);
    }

    #[test]
    fn mouth_ratio_boundary() {
        let f = face(0.50, 0.62, 0.10, 0.90);
        assert_eq!(mouth_ratio(&f), 0.15);
        let c = classify(&Detections {
            face: Some(f),
            ..Detections::none()
        });
        assert_eq!(c.label, PoseLabel::Default);
        assert_eq!(c.debug.mouth_ratio, 0.15);
        assert!(c.debug.face_detected);

        let c = classify(&Detections {
            face: Some(face(0.50, 0.6501, 0.0, 1.0)),
            ..Detections::none()
        });
        assert_eq!(c.label, PoseLabel::Shocking);
    }

    #[test]
    fn mouth_ratio_zero_face_height() {
        let f = face(0.50, 0.70, 0.40, 0.40);
        assert_eq!(mouth_ratio(&f), 0.0);
        assert_eq!(
            classify(&Detections {
                face: Some(f),
                ..Detections::none()
            })
            .label,
            PoseLabel::Default
        );
    }

    #[test]
    fn no_face_means_no_face_rules() {
        let c = classify(&Detections {
            body: None,
            hands: vec![hand(0.95, (0.5, 0.5))],
            face: None,
        });
        assert_eq!(c.label, PoseLabel::Default);
        assert_eq!(c.debug.mouth_ratio, 0.0);
        assert!(!c.debug.face_detected);
    }

    #[test]
    fn raising_beats_thinking() {
        let c = classify(&Detections {
            body: Some(body(0.3)),
            hands: vec![hand(0.1, (0.5, 0.5))],
            face: Some(closed_face()),
        });
        assert_eq!(c.label, PoseLabel::RaisingHand);
    }

    #[test]
    fn raising_beats_shocking() {
        let c = classify(&Detections {
            body: Some(body(0.3)),
            hands: vec![hand(0.1, FAR)],
            face: Some(open_face()),
        });
        assert_eq!(c.label, PoseLabel::RaisingHand);
        // still computed, even though the label was decided earlier
        assert_relative_eq!(c.debug.mouth_ratio, 0.375, epsilon = 1e-12);
    }

    #[test]
    fn thinking_beats_shocking() {
        let c = classify(&Detections {
            body: None,
            hands: vec![hand(0.95, (0.5, 0.81))],
            face: Some(open_face()),
        });
        assert_eq!(c.label, PoseLabel::Thinking);
        assert!(c.debug.mouth_ratio > Thresholds::default().mouth_open);
    }

    #[test]
    fn custom_thresholds() {
        let classifier = Classifier::new(Thresholds {
            mouth_open: 0.5,
            ..Thresholds::default()
        });
        let detections = Detections {
            face: Some(open_face()),
            ..Detections::none()
        };
        assert_eq!(classifier.thresholds().mouth_open, 0.5);
        assert_eq!(classifier.classify(&detections).label, PoseLabel::Default);
        assert_eq!(classify(&detections).label, PoseLabel::Shocking);
    }
}
