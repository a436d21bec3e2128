use approx::assert_relative_eq;
use mimic::body::{BodyLandmarks, LandmarkIdx as B};
use mimic::classify::{Classifier, PoseLabel};
use mimic::face::{FaceLandmarks, LandmarkIdx as F};
use mimic::hand::{HandLandmarks, LandmarkIdx as H};
use mimic::landmark::Detections;

/// A hand with every relevant landmark far away from the face.
fn hand() -> HandLandmarks {
    HandLandmarks::new()
        .with(H::Wrist, 0.9, 0.95)
        .with(H::ThumbTip, 0.9, 0.9)
        .with(H::IndexFingerTip, 0.9, 0.9)
        .with(H::MiddleFingerTip, 0.9, 0.9)
}

#[test]
fn empty_frame() {
    let classification = Classifier::default().classify(&Detections::none());
    assert_eq!(classification.label, PoseLabel::Default);
    assert_eq!(classification.debug.hands_detected, 0);
    assert!(!classification.debug.face_detected);
}

#[test]
fn raised_hand() {
    let detections = Detections {
        body: Some(BodyLandmarks::new().with(B::Nose, 0.5, 0.30)),
        hands: vec![hand().with(H::Wrist, 0.5, 0.20)],
        face: None,
    };
    let classification = Classifier::default().classify(&detections);
    assert_eq!(classification.label, PoseLabel::RaisingHand);
    assert_relative_eq!(classification.debug.hand_height, 0.10, epsilon = 1e-9);
    assert_eq!(classification.debug.hands_detected, 1);
}

#[test]
fn mouth_open_at_threshold_is_not_shocking() {
    let face = FaceLandmarks::new()
        .with(F::MouthTop, 0.5, 0.50)
        .with(F::MouthBottom, 0.5, 0.62)
        .with(F::Forehead, 0.5, 0.10)
        .with(F::Chin, 0.5, 0.90);
    let detections = Detections {
        face: Some(face.clone()),
        ..Detections::none()
    };
    let classification = Classifier::default().classify(&detections);
    assert_eq!(classification.label, PoseLabel::Default);
    assert_relative_eq!(classification.debug.mouth_ratio, 0.15, epsilon = 1e-9);
    assert!(classification.debug.face_detected);

    // slightly wider
    let detections = Detections {
        face: Some(face.with(F::MouthBottom, 0.5, 0.63)),
        ..Detections::none()
    };
    assert_eq!(
        Classifier::default().classify(&detections).label,
        PoseLabel::Shocking
    );
}

#[test]
fn finger_at_mouth() {
    let face = FaceLandmarks::new()
        .with(F::MouthCenter, 0.5, 0.5)
        .with(F::MouthTop, 0.5, 0.4)
        .with(F::MouthBottom, 0.5, 0.6)
        .with(F::Forehead, 0.5, 0.1)
        .with(F::Chin, 0.5, 0.8);
    let detections = Detections {
        body: None,
        hands: vec![hand().with(H::IndexFingerTip, 0.52, 0.51)],
        face: Some(face.clone()),
    };
    let classification = Classifier::default().classify(&detections);
    assert_eq!(classification.label, PoseLabel::Thinking);

    // the open mouth only counts once the finger moves away
    let detections = Detections {
        body: None,
        hands: vec![hand()],
        face: Some(face),
    };
    assert_eq!(
        Classifier::default().classify(&detections).label,
        PoseLabel::Shocking
    );
}
