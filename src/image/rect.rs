//! Axis-aligned rectangles in pixel space.

/// An axis-aligned rectangle with floating-point coordinates.
///
/// Rectangles may extend past the edges of the image they refer to. Pixels outside of the image
/// are treated as black when sampling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    x: f32,
    y: f32,
    w: f32,
    h: f32,
}

impl Rect {
    /// Creates a rectangle extending downwards and right from a point.
    #[inline]
    pub fn from_top_left(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            w: width,
            h: height,
        }
    }

    /// Creates a rectangle centered around `(x_center, y_center)`.
    #[inline]
    pub fn from_center(x_center: f32, y_center: f32, width: f32, height: f32) -> Self {
        Self::from_top_left(
            x_center - width / 2.0,
            y_center - height / 2.0,
            width,
            height,
        )
    }

    #[inline]
    pub fn x(&self) -> f32 {
        self.x
    }

    #[inline]
    pub fn y(&self) -> f32 {
        self.y
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.w
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.h
    }

    #[inline]
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    /// Symmetrically extends the shorter side of `self` so that the result is a square with the
    /// same center.
    #[must_use]
    pub fn grow_to_square(&self) -> Self {
        let (cx, cy) = self.center();
        let side = self.w.max(self.h);
        Self::from_center(cx, cy, side, side)
    }

    /// Maps a point from the coordinate system of `self` (scaled so that the rectangle is
    /// `scale_w x scale_h` units large) to the coordinate system the rectangle is defined in.
    #[inline]
    pub fn transform_out(&self, x: f32, y: f32, scale_w: f32, scale_h: f32) -> [f32; 2] {
        [
            self.x + x * self.w / scale_w,
            self.y + y * self.h / scale_h,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grow_to_square() {
        let rect = Rect::from_top_left(0.0, 0.0, 640.0, 480.0).grow_to_square();
        assert_eq!(rect, Rect::from_top_left(0.0, -80.0, 640.0, 640.0));

        let rect = Rect::from_center(10.0, 10.0, 2.0, 8.0).grow_to_square();
        assert_eq!(rect, Rect::from_center(10.0, 10.0, 8.0, 8.0));
    }

    #[test]
    fn transform_out() {
        let rect = Rect::from_top_left(100.0, 50.0, 200.0, 200.0);
        assert_eq!(rect.transform_out(0.0, 0.0, 256.0, 256.0), [100.0, 50.0]);
        assert_eq!(rect.transform_out(128.0, 256.0, 256.0, 256.0), [200.0, 250.0]);
    }
}
