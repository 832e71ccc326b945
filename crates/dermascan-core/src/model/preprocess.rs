//! Image preprocessing driven by the model's `preprocessor_config.json`.
//!
//! Nothing here is specific to one checkpoint: resize, center crop, rescale
//! and normalization parameters are all read from the config shipped with
//! the model. Output is an NCHW `[1, 3, H, W]` f32 tensor.

use std::path::Path;

use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgb, RgbImage};
use ndarray::Array4;
use serde::Deserialize;

use crate::error::{InferenceError, ModelLoadError};

/// Number of color channels (RGB).
const CHANNELS: usize = 3;

/// Target size as written in `preprocessor_config.json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum SizeSpec {
    /// A bare integer: square output.
    Square(u32),
    /// `{"height": H, "width": W}`
    Exact { height: u32, width: u32 },
    /// `{"shortest_edge": S}`, aspect ratio preserved
    ShortestEdge {
        shortest_edge: u32,
        #[serde(default)]
        longest_edge: Option<u32>,
    },
}

impl SizeSpec {
    /// Output `(width, height)` for an input of `width × height`.
    pub fn resolve(&self, width: u32, height: u32) -> (u32, u32) {
        match *self {
            SizeSpec::Square(s) => (s, s),
            SizeSpec::Exact { height: h, width: w } => (w, h),
            SizeSpec::ShortestEdge {
                shortest_edge,
                longest_edge,
            } => {
                let (short, long) = if width <= height {
                    (width, height)
                } else {
                    (height, width)
                };
                let short = short.max(1) as u64;
                let mut new_short = shortest_edge as u64;
                let mut new_long = (shortest_edge as u64 * long as u64) / short;
                if let Some(max) = longest_edge {
                    let max = max as u64;
                    if new_long > max {
                        new_short = max * new_short / new_long;
                        new_long = max;
                    }
                }
                let (new_short, new_long) = (new_short.max(1) as u32, new_long.max(1) as u32);
                if width <= height {
                    (new_short, new_long)
                } else {
                    (new_long, new_short)
                }
            }
        }
    }

    /// Crop target `(width, height)`. A shortest-edge spec crops to a square.
    fn crop_dims(&self) -> (u32, u32) {
        match *self {
            SizeSpec::Square(s) => (s, s),
            SizeSpec::Exact { height, width } => (width, height),
            SizeSpec::ShortestEdge { shortest_edge, .. } => (shortest_edge, shortest_edge),
        }
    }
}

/// Per-channel statistic: either one value for all channels or one per channel.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
enum ChannelStat {
    Uniform(f32),
    PerChannel(Vec<f32>),
}

impl ChannelStat {
    fn to_array(&self, field: &str) -> Result<[f32; CHANNELS], String> {
        match self {
            ChannelStat::Uniform(v) => Ok([*v; CHANNELS]),
            ChannelStat::PerChannel(values) => <[f32; CHANNELS]>::try_from(values.as_slice())
                .map_err(|_| format!("{field} must have {CHANNELS} values, got {}", values.len())),
        }
    }
}

/// Raw `preprocessor_config.json` fields. Missing fields take the defaults
/// of a generic Hugging Face image processor.
#[derive(Debug, Deserialize)]
struct RawPreprocessConfig {
    #[serde(default = "default_true")]
    do_resize: bool,
    #[serde(default)]
    size: Option<SizeSpec>,
    #[serde(default = "default_resample")]
    resample: u8,
    #[serde(default)]
    do_center_crop: bool,
    #[serde(default)]
    crop_size: Option<SizeSpec>,
    #[serde(default = "default_true")]
    do_rescale: bool,
    #[serde(default = "default_rescale_factor")]
    rescale_factor: f32,
    #[serde(default = "default_true")]
    do_normalize: bool,
    #[serde(default)]
    image_mean: Option<ChannelStat>,
    #[serde(default)]
    image_std: Option<ChannelStat>,
}

fn default_true() -> bool {
    true
}

fn default_resample() -> u8 {
    2
}

fn default_rescale_factor() -> f32 {
    1.0 / 255.0
}

/// Default edge length when the config names neither `size` nor `crop_size`.
const DEFAULT_SIZE: u32 = 224;

/// Mean/std used when the config omits them.
const DEFAULT_MEAN: [f32; CHANNELS] = [0.5, 0.5, 0.5];
const DEFAULT_STD: [f32; CHANNELS] = [0.5, 0.5, 0.5];

/// Validated preprocessing parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessConfig {
    pub resize: Option<SizeSpec>,
    pub filter: FilterType,
    pub center_crop: Option<SizeSpec>,
    pub rescale_factor: Option<f32>,
    pub normalize: Option<([f32; CHANNELS], [f32; CHANNELS])>,
}

impl PreprocessConfig {
    /// Load and validate `preprocessor_config.json`.
    pub fn from_file(path: &Path) -> Result<Self, ModelLoadError> {
        let content = std::fs::read_to_string(path).map_err(|source| ModelLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content).map_err(|message| ModelLoadError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Parse and validate a `preprocessor_config.json` document.
    pub fn from_json(content: &str) -> Result<Self, String> {
        let raw: RawPreprocessConfig = serde_json::from_str(content).map_err(|e| e.to_string())?;

        let resize = raw
            .do_resize
            .then(|| raw.size.unwrap_or(SizeSpec::Square(DEFAULT_SIZE)));
        let center_crop = raw
            .do_center_crop
            .then(|| raw.crop_size.unwrap_or(SizeSpec::Square(DEFAULT_SIZE)));

        // Without either, the tensor size would depend on the upload.
        if resize.is_none() && center_crop.is_none() {
            return Err("preprocessor disables both resize and center crop".to_string());
        }

        let rescale_factor = raw.do_rescale.then_some(raw.rescale_factor);

        let normalize = if raw.do_normalize {
            let mean = match &raw.image_mean {
                Some(stat) => stat.to_array("image_mean")?,
                None => DEFAULT_MEAN,
            };
            let std = match &raw.image_std {
                Some(stat) => stat.to_array("image_std")?,
                None => DEFAULT_STD,
            };
            if std.iter().any(|&s| s == 0.0 || !s.is_finite()) {
                return Err("image_std values must be finite and non-zero".to_string());
            }
            Some((mean, std))
        } else {
            None
        };

        Ok(Self {
            resize,
            filter: filter_from_pil(raw.resample),
            center_crop,
            rescale_factor,
            normalize,
        })
    }

    /// Spatial size `(width, height)` of the tensor produced for an input
    /// of `width × height`.
    pub fn output_dims(&self, width: u32, height: u32) -> (u32, u32) {
        let resized = match &self.resize {
            Some(spec) => spec.resolve(width, height),
            None => (width, height),
        };
        match &self.center_crop {
            Some(spec) => spec.crop_dims(),
            None => resized,
        }
    }

    /// Preprocess an image into a `[1, 3, H, W]` tensor.
    ///
    /// Fails when the intermediate resize would exceed `max_dim` on either
    /// side. Shortest-edge resizing of very thin images is the usual cause.
    pub fn apply(&self, image: &DynamicImage, max_dim: u32) -> Result<Array4<f32>, InferenceError> {
        if let Some(spec) = &self.resize {
            let (width, height) = spec.resolve(image.width(), image.height());
            if width > max_dim || height > max_dim {
                return Err(InferenceError::ResizeTooLarge {
                    width,
                    height,
                    max_dim,
                });
            }
        }

        let mut rgb = match image {
            DynamicImage::ImageRgb8(buf) => buf.clone(),
            other => other.to_rgb8(),
        };

        if let Some(spec) = &self.resize {
            let (w, h) = spec.resolve(rgb.width(), rgb.height());
            if (w, h) != rgb.dimensions() {
                rgb = imageops::resize(&rgb, w, h, self.filter);
            }
        }

        if let Some(spec) = &self.center_crop {
            let (cw, ch) = spec.crop_dims();
            rgb = center_crop(&rgb, cw, ch);
        }

        Ok(self.to_tensor(&rgb))
    }

    fn to_tensor(&self, rgb: &RgbImage) -> Array4<f32> {
        let (width, height) = (rgb.width() as usize, rgb.height() as usize);
        let plane = width * height;
        let mut tensor = Array4::<f32>::zeros((1, CHANNELS, height, width));

        let scale = self.rescale_factor.unwrap_or(1.0);
        let (mean, std) = self
            .normalize
            .unwrap_or(([0.0; CHANNELS], [1.0; CHANNELS]));

        // Fresh `zeros` arrays are contiguous in standard layout.
        if let Some(tensor_data) = tensor.as_slice_mut() {
            for (i, pixel) in rgb.as_raw().chunks_exact(CHANNELS).enumerate() {
                for (c, &val) in pixel.iter().enumerate() {
                    // NCHW layout: offset = c * H * W + y * W + x
                    tensor_data[c * plane + i] = (val as f32 * scale - mean[c]) / std[c];
                }
            }
        }

        tensor
    }
}

/// Center crop to `width × height`, zero-padding when the image is smaller.
fn center_crop(rgb: &RgbImage, width: u32, height: u32) -> RgbImage {
    let (w, h) = rgb.dimensions();
    if (w, h) == (width, height) {
        return rgb.clone();
    }
    if w >= width && h >= height {
        let left = (w - width) / 2;
        let top = (h - height) / 2;
        return imageops::crop_imm(rgb, left, top, width, height).to_image();
    }

    let offset = |src: u32, dst: u32| -> i64 {
        if src >= dst {
            -(((src - dst) / 2) as i64)
        } else {
            ((dst - src) / 2) as i64
        }
    };
    let mut canvas = RgbImage::from_pixel(width, height, Rgb([0, 0, 0]));
    imageops::overlay(&mut canvas, rgb, offset(w, width), offset(h, height));
    canvas
}

/// Map a PIL resampling code to the closest `image` filter.
fn filter_from_pil(code: u8) -> FilterType {
    match code {
        0 => FilterType::Nearest,
        1 => FilterType::Lanczos3,
        3 => FilterType::CatmullRom,
        // bilinear (2), box (4), hamming (5)
        _ => FilterType::Triangle,
    }
}
