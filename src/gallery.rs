//! Pose illustrations.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use embedded_graphics::mono_font::iso_8859_9::FONT_10X20;

use crate::classify::PoseLabel;
use crate::image::{draw, Color, Image, Resolution};

/// Background of an empty illustration panel.
pub const PANEL_COLOR: Color = Color::from_rgb8(0x1e, 0x1e, 0x1e);

const PLACEHOLDER_TEXT_COLOR: Color = Color::from_rgb8(0xff, 0x98, 0x00);

/// Maps each [`PoseLabel`] to the illustration file shown for it.
///
/// Paths are resolved once, when the gallery is created. Labels whose file is missing fall back to
/// a text placeholder.
#[derive(Debug, Default)]
pub struct Gallery {
    paths: HashMap<PoseLabel, PathBuf>,
}

impl Gallery {
    /// Returns the file name of the illustration for `label`.
    pub fn file_name(label: PoseLabel) -> &'static str {
        match label {
            PoseLabel::RaisingHand => "raising_hand_pose.jpg",
            PoseLabel::Thinking => "thinking_pose.jpg",
            PoseLabel::Shocking => "shocking_pose.jpg",
            PoseLabel::Default => "default_pose.jpg",
        }
    }

    /// Looks up the illustrations in `asset_dir`, logging a warning for each missing one.
    pub fn discover(asset_dir: &Path) -> Self {
        let mut paths = HashMap::new();
        for label in PoseLabel::ALL {
            let path = asset_dir.join(Self::file_name(label));
            if path.is_file() {
                log::debug!("illustration for '{}': {}", label, path.display());
                paths.insert(label, path);
            } else {
                log::warn!(
                    "illustration for '{}' not found at '{}'",
                    label,
                    path.display()
                );
            }
        }
        Self { paths }
    }

    /// Returns the path of the illustration for `label`, if it exists.
    pub fn path(&self, label: PoseLabel) -> Option<&Path> {
        self.paths.get(&label).map(PathBuf::as_path)
    }

    /// Loads the illustration for `label`.
    ///
    /// Returns [`None`] if the label has no illustration or if loading fails.
    pub fn load(&self, label: PoseLabel) -> Option<Image> {
        let path = self.path(label)?;
        match Image::load(path) {
            Ok(image) => Some(image),
            Err(e) => {
                log::warn!("failed to load '{}': {}", path.display(), e);
                None
            }
        }
    }

    /// Returns the image to show in a `panel`-sized area for `label`.
    ///
    /// Illustrations are scaled to fit the panel, keeping their aspect ratio. If the illustration
    /// is unavailable, a placeholder of the panel's size is returned instead.
    pub fn illustration(&self, label: PoseLabel, panel: Resolution) -> Image {
        match self.load(label) {
            Some(image) => image.scaled_to_fit(panel),
            None => placeholder(label, panel),
        }
    }
}

/// Renders the text shown instead of a missing illustration.
///
/// The placeholder names the label by its canonical name (eg. `shocking`).
pub fn placeholder(label: PoseLabel, res: Resolution) -> Image {
    let mut image = Image::filled(res, PANEL_COLOR);
    let text = format!("{}\n\n(Resim bulunamadı)", label);
    let (x, y) = (res.width() as i32 / 2, res.height() as i32 / 2);
    draw::text(&mut image, x, y, &text)
        .color(PLACEHOLDER_TEXT_COLOR)
        .font(&FONT_10X20);
    image
}

#[cfg(test)]
mod tests {
    use std::fs;

    use ::image::{Rgb, RgbImage};

    use super::*;

    fn asset_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("mimic-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn count(image: &Image, color: Color) -> usize {
        image.data().chunks(4).filter(|px| *px == color.0).count()
    }

    #[test]
    fn file_names() {
        assert_eq!(
            PoseLabel::ALL.map(Gallery::file_name),
            [
                "raising_hand_pose.jpg",
                "thinking_pose.jpg",
                "shocking_pose.jpg",
                "default_pose.jpg",
            ]
        );
    }

    #[test]
    fn missing_assets() {
        let gallery = Gallery::discover(Path::new("/nonexistent/assets"));
        for label in PoseLabel::ALL {
            assert_eq!(gallery.path(label), None);
            assert!(gallery.load(label).is_none());
        }

        let image = gallery.illustration(PoseLabel::Shocking, Resolution::new(480, 480));
        assert_eq!(image.resolution(), Resolution::new(480, 480));
        assert!(count(&image, PLACEHOLDER_TEXT_COLOR) > 0);
    }

    #[test]
    fn scales_illustrations() {
        let dir = asset_dir("scales");
        RgbImage::from_pixel(40, 20, Rgb([0, 0, 255]))
            .save(dir.join("default_pose.jpg"))
            .unwrap();

        let gallery = Gallery::discover(&dir);
        assert!(gallery.path(PoseLabel::Default).is_some());
        assert!(gallery.path(PoseLabel::Thinking).is_none());

        let image = gallery.illustration(PoseLabel::Default, Resolution::new(480, 480));
        assert_eq!(image.resolution(), Resolution::new(480, 240));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn corrupt_illustration() {
        let dir = asset_dir("corrupt");
        fs::write(dir.join("thinking_pose.jpg"), b"not a jpeg").unwrap();

        let gallery = Gallery::discover(&dir);
        assert!(gallery.path(PoseLabel::Thinking).is_some());
        assert!(gallery.load(PoseLabel::Thinking).is_none());
        let image = gallery.illustration(PoseLabel::Thinking, Resolution::new(480, 480));
        assert!(count(&image, PLACEHOLDER_TEXT_COLOR) > 0);

        fs::remove_dir_all(&dir).unwrap();
    }
}
