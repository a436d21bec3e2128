//! V4L2 webcam access.
//!
//! Currently, only V4L2 `VIDEO_CAPTURE` devices yielding JFIF JPEG or Motion JPEG frames are
//! supported.

use std::cmp::Reverse;

use anyhow::bail;
use linuxvideo::{
    format::{FrameIntervals, FrameSizes, PixFormat, Pixelformat},
    stream::ReadStream,
    BufType, CapabilityFlags, Device, Fract,
};

use crate::image::{Image, Resolution};
use crate::timer::Timer;
use crate::video::Camera;

/// Format negotiation options.
#[derive(Debug, Default)]
pub struct WebcamOptions {
    name: Option<String>,
    resolution: Option<Resolution>,
}

impl WebcamOptions {
    /// Sets the name of the webcam device to open.
    ///
    /// If no webcam with the given name can be found, opening the webcam will result in an error.
    #[inline]
    pub fn name(self, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..self
        }
    }

    /// Sets the minimum image resolution.
    ///
    /// The smallest supported resolution that is at least this large is selected. If there is
    /// none, the requirement is dropped and the largest resolution is used.
    #[inline]
    pub fn resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = Some(resolution);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FrameFormat {
    resolution: Resolution,
    /// Frame rate, rounded to the nearest integer.
    fps: u32,
}

fn negotiate_format(
    device: &Device,
    min_resolution: Option<Resolution>,
) -> anyhow::Result<(PixFormat, Fract)> {
    let mut pixel_format = None;
    for format in device.formats(BufType::VIDEO_CAPTURE) {
        let format = format?;
        if format.pixelformat() == Pixelformat::JPEG || format.pixelformat() == Pixelformat::MJPG {
            pixel_format = Some(format.pixelformat());
            break;
        }
    }

    let Some(pixel_format) = pixel_format else {
        bail!("no supported pixel format found");
    };

    let mut formats = Vec::new();
    let mut frame_intervals = Vec::new();
    match device.frame_sizes(pixel_format)? {
        FrameSizes::Discrete(sizes) => {
            for size in sizes {
                let intervals =
                    match device.frame_intervals(pixel_format, size.width(), size.height())? {
                        FrameIntervals::Discrete(intervals) => intervals,
                        FrameIntervals::Stepwise(_) | FrameIntervals::Continuous(_) => {
                            bail!("stepwise or continuous frame rates are not supported")
                        }
                    };
                for rate in intervals {
                    let fract = *rate.fract();
                    formats.push(FrameFormat {
                        resolution: Resolution::new(size.width(), size.height()),
                        fps: (1.0 / fract.as_f32()).round() as u32,
                    });
                    frame_intervals.push(fract);
                }
            }
        }
        FrameSizes::Stepwise(_) | FrameSizes::Continuous(_) => {
            bail!("stepwise or continuous resolutions are not supported");
        }
    }

    let Some(index) = pick_format(&formats, min_resolution) else {
        bail!("failed to negotiate a webcam format");
    };
    let fmt = formats[index];
    Ok((
        PixFormat::new(
            fmt.resolution.width(),
            fmt.resolution.height(),
            pixel_format,
        ),
        frame_intervals[index],
    ))
}

/// Picks the format closest to `min_resolution` and returns its index.
///
/// Among formats of the same size, the fastest one wins. If no format is large enough, the largest
/// one is picked.
fn pick_format(formats: &[FrameFormat], min_resolution: Option<Resolution>) -> Option<usize> {
    if let Some(min) = min_resolution {
        let closest = formats
            .iter()
            .enumerate()
            .filter(|(_, fmt)| {
                fmt.resolution.width() >= min.width() && fmt.resolution.height() >= min.height()
            })
            .min_by_key(|(_, fmt)| (fmt.resolution.num_pixels(), Reverse(fmt.fps)));
        if let Some((index, _)) = closest {
            return Some(index);
        }
        log::debug!("no format of at least {} available", min);
    }

    formats
        .iter()
        .enumerate()
        .max_by_key(|(_, fmt)| (fmt.resolution.num_pixels(), fmt.fps))
        .map(|(index, _)| index)
}

/// A webcam yielding a stream of [`Image`]s.
pub struct Webcam {
    stream: Option<ReadStream>,
    t_dequeue: Timer,
    t_decode: Timer,
}

impl Webcam {
    /// Opens the first supported webcam found.
    ///
    /// This function can block for a significant amount of time while the webcam initializes (on
    /// the order of hundreds of milliseconds).
    pub fn open(options: WebcamOptions) -> anyhow::Result<Self> {
        if let Some(name) = &options.name {
            log::debug!("looking for webcam '{}'", name);
        }
        for res in linuxvideo::list()? {
            match res {
                Ok(dev) => match Self::open_impl(dev, &options) {
                    Ok(Some(webcam)) => return Ok(webcam),
                    Ok(None) => {}
                    Err(e) => {
                        log::debug!("{}", e);
                    }
                },
                Err(e) => {
                    log::warn!("{}", e);
                }
            }
        }

        match &options.name {
            Some(name) => bail!("no supported webcam named '{}' found", name),
            None => bail!("no supported webcam device found"),
        }
    }

    fn open_impl(dev: Device, options: &WebcamOptions) -> anyhow::Result<Option<Self>> {
        let caps = dev.capabilities()?;
        if let Some(name) = &options.name {
            if caps.card() != name {
                return Ok(None);
            }
        }

        let cap_flags = caps.device_capabilities();
        let path = dev.path()?;
        log::debug!(
            "device {} ({}) capabilities: {:?}",
            caps.card(),
            path.display(),
            cap_flags,
        );

        if !cap_flags.contains(CapabilityFlags::VIDEO_CAPTURE) {
            return Ok(None);
        }

        let (pixfmt, fract) = negotiate_format(&dev, options.resolution)?;

        let capture = dev.video_capture(pixfmt)?;
        let format = capture.format();
        let actual = capture.set_frame_interval(fract)?;

        log::info!(
            "opened {} ({}), {}x{} @ {:.1}Hz",
            caps.card(),
            path.display(),
            format.width(),
            format.height(),
            1.0 / actual.as_f32(),
        );

        let stream = capture.into_stream(2)?;

        Ok(Some(Self {
            stream: Some(stream),
            t_dequeue: Timer::new("dequeue"),
            t_decode: Timer::new("decode"),
        }))
    }
}

impl Camera for Webcam {
    /// Reads and decodes the next frame from the camera.
    ///
    /// If no frame is available, this method will block until one is. Webcams occasionally
    /// produce corrupted MJPG frames; those are returned as errors.
    fn read(&mut self) -> anyhow::Result<Image> {
        let Some(stream) = &mut self.stream else {
            bail!("webcam has been released");
        };

        let dequeue_guard = self.t_dequeue.start();
        let t_decode = &self.t_decode;
        stream.dequeue(|buf| {
            drop(dequeue_guard);
            Ok(t_decode.time(|| Image::decode_jpeg(&buf)))
        })?
    }

    fn release(&mut self) -> anyhow::Result<()> {
        match self.stream.take() {
            Some(stream) => {
                drop(stream);
                log::debug!("released webcam");
                Ok(())
            }
            None => bail!("webcam was already released"),
        }
    }

    fn timers(&self) -> Vec<&Timer> {
        vec![&self.t_dequeue, &self.t_decode]
    }
}
