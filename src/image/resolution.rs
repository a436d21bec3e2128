//! Types for representing image resolutions.

use std::fmt;

/// Resolution (`width x height`) of an image, window, panel, or camera.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    width: u32,
    height: u32,
}

impl Resolution {
    /// VGA resolution: `640x480`
    pub const RES_VGA: Self = Self {
        width: 640,
        height: 480,
    };

    /// Creates a new [`Resolution`] of `width x height`.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns the width of this [`Resolution`].
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the height of this [`Resolution`].
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn num_pixels(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Computes the largest resolution with the aspect ratio of `self` that fits into `bounds`.
    ///
    /// Returns `bounds` unchanged if `self` has a width or height of 0.
    pub fn fit_into(&self, bounds: Resolution) -> Resolution {
        if self.width == 0 || self.height == 0 {
            return bounds;
        }

        let scale = f64::min(
            f64::from(bounds.width) / f64::from(self.width),
            f64::from(bounds.height) / f64::from(self.height),
        );
        let width = ((f64::from(self.width) * scale).round() as u32).clamp(1, bounds.width.max(1));
        let height =
            ((f64::from(self.height) * scale).round() as u32).clamp(1, bounds.height.max(1));
        Resolution::new(width, height)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
