//! Frame annotation.
//!
//! Draws the detected landmarks and the classifier's [`DebugInfo`] onto the camera frame. This is
//! independent of classification itself, which never touches the frame.

use embedded_graphics::mono_font::iso_8859_9::{FONT_10X20, FONT_9X15};

use crate::classify::{Classification, DebugInfo};
use crate::image::{draw, Color, Image};
use crate::landmark::Detections;

const DEBUG_TEXT_X: i32 = 10;
const DEBUG_TEXT_LINE_HEIGHT: i32 = 30;

/// Annotates `frame` with lip contours, hand skeletons and debug text.
pub fn annotate(frame: &mut Image, detections: &Detections, classification: &Classification) {
    if let Some(face) = &detections.face {
        face.draw_lips(frame);
    }
    for hand in &detections.hands {
        hand.draw(frame);
    }

    for (i, line) in debug_lines(&classification.debug).iter().enumerate() {
        let y = DEBUG_TEXT_LINE_HEIGHT * (i as i32 + 1);
        draw::text(frame, DEBUG_TEXT_X, y, line)
            .color(Color::CYAN)
            .font(&FONT_9X15)
            .align_left()
            .align_bottom();
    }

    let label = format!("Pose: {}", classification.label);
    let y = frame.height() as i32 - 20;
    draw::text(frame, DEBUG_TEXT_X, y, &label)
        .color(Color::GREEN)
        .font(&FONT_10X20)
        .align_left()
        .align_bottom();
}

/// Formats the debug text lines shown in the top left corner of the frame.
pub fn debug_lines(debug: &DebugInfo) -> [String; 4] {
    [
        format!("Eller: {}", debug.hands_detected),
        format!(
            "Yuz: {}",
            if debug.face_detected { "VAR" } else { "YOK" }
        ),
        format!("Agiz: {:.3}", debug.mouth_ratio),
        format!("El Yukseklik: {:.3}", debug.hand_height),
    ]
}
