//! Pure Rust image engine built on the `image` crate.
//!
//! Driver identifier: `"rust"`. Every pixel operation is delegated to the
//! `image` crate; this module only decides which operation to call, in which
//! order, and where the output goes.
//!
//! ## Parameter mapping
//!
//! | Parameter | Crate / function |
//! |---|---|
//! | `or` | `rotate90` / `rotate180` / `rotate270` (`auto` is a no-op) |
//! | `crop` | `DynamicImage::crop_imm` |
//! | `w`, `h`, `dpr`, `fit` | `resize` / `resize_exact` (Lanczos3) + `crop_imm` |
//! | `bri`, `con` | `brighten`, `adjust_contrast` |
//! | `sharp` | `unsharpen` |
//! | `filt=greyscale` | `grayscale` |
//! | `flip` | `fliph` / `flipv` |
//! | `blur` | `blur` |
//! | `pixel` | Nearest down/up resize |
//! | `mark*` | `imageops::overlay` |
//! | `fm`, `q` | `JpegEncoder`, `AvifEncoder`, `save_with_format` |
//!
//! `gam`, `border` and `filt=sepia` are accepted but ignored.
//!
//! Any resize whose result would exceed [`MAX_OUTPUT_PIXELS`] fails with
//! [`EngineError::ProcessingFailed`] before anything is allocated.
//!
//! ## Output location
//!
//! `<cache>/<digest>/<input stem>.<ext>`, where the digest is SHA-256 of the
//! source path and the query string. One sub-directory per output keeps
//! intermediates of a chain apart and never collides with the input file;
//! identical calls produce identical paths.

use super::backend::{EngineConfig, EngineError, ImageEngine, query_string};
use super::calculations::{
    anchor_offset, apply_pixel_ratio, calculate_contain_dimensions, calculate_fill_dimensions,
    resolve_dimensions,
};
use super::params::{
    Color, Fit, Flip, Orientation, OutputFormat, Quality, RenderPlan, WatermarkPlan,
};
use crate::translate::ParameterSet;
use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, ImageFormat, Pixel, Rgba, RgbaImage, RgbImage};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Hex digits of the digest used as the per-output directory name.
const DIGEST_DIR_LEN: usize = 16;

/// Largest image, in pixels, a resize may produce (including the oversized
/// intermediate of a crop fit).
pub const MAX_OUTPUT_PIXELS: u64 = 50_000_000;

/// AVIF encoder speed (1 = slowest/best, 10 = fastest).
const AVIF_SPEED: u8 = 6;

/// Pure Rust engine using the `image` crate ecosystem.
///
/// See the [module docs](self) for the parameter-to-crate mapping.
pub struct RustEngine;

impl RustEngine {
    pub const DRIVER: &'static str = "rust";

    pub fn new() -> Self {
        Self
    }
}

impl Default for RustEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageEngine for RustEngine {
    fn render(
        &self,
        config: &EngineConfig,
        filename: &str,
        parameters: &ParameterSet,
    ) -> Result<PathBuf, EngineError> {
        if config.driver != Self::DRIVER {
            return Err(EngineError::UnsupportedDriver(config.driver.clone()));
        }

        let source = config.source.join(filename);
        let plan = RenderPlan::from_parameters(parameters);
        if !plan.ignored.is_empty() {
            debug!(ignored = ?plan.ignored, "skipping unsupported parameters");
        }

        let format = plan
            .format
            .or_else(|| {
                source
                    .extension()
                    .and_then(|e| e.to_str())
                    .and_then(OutputFormat::from_extension)
            })
            .unwrap_or(OutputFormat::Jpeg);

        let relative = output_path(&source, filename, parameters, format);
        let output = config.cache.join(&relative);

        let image = load_image(&source)?;
        let image = apply_plan(image, &plan, config.watermarks.as_deref())?;

        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)?;
        }
        encode(&image, &output, format, plan.quality, plan.background)?;
        debug!(source = %source.display(), output = %output.display(), "rendered");
        Ok(relative)
    }
}

/// Deterministic output path, relative to the cache directory.
fn output_path(
    source: &Path,
    filename: &str,
    parameters: &ParameterSet,
    format: OutputFormat,
) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(source.to_string_lossy().as_bytes());
    hasher.update(b"\0");
    hasher.update(query_string(parameters).as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    let stem = Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    Path::new(&digest[..DIGEST_DIR_LEN]).join(format!("{stem}.{}", format.extension()))
}

fn load_image(path: &Path) -> Result<DynamicImage, EngineError> {
    image::open(path).map_err(|e| {
        EngineError::ProcessingFailed(format!("Failed to decode {}: {}", path.display(), e))
    })
}

/// Apply every planned operation, in engine order.
fn apply_plan(
    mut image: DynamicImage,
    plan: &RenderPlan,
    watermarks: Option<&Path>,
) -> Result<DynamicImage, EngineError> {
    image = match plan.orientation {
        Some(Orientation::Degrees90) => image.rotate270(),
        Some(Orientation::Degrees180) => image.rotate180(),
        Some(Orientation::Degrees270) => image.rotate90(),
        Some(Orientation::Auto | Orientation::Degrees0) | None => image,
    };

    if let Some(rect) = plan.manual_crop {
        image = image.crop_imm(rect.x, rect.y, rect.width, rect.height);
    }

    let width = apply_pixel_ratio(plan.width, plan.pixel_ratio);
    let height = apply_pixel_ratio(plan.height, plan.pixel_ratio);
    if let Some(target) = resolve_dimensions(image.dimensions(), width, height) {
        image = resize(image, target, plan.fit, plan.background)?;
    }

    if let Some(amount) = plan.brightness {
        image = image.brighten(amount);
    }
    if let Some(amount) = plan.contrast {
        image = image.adjust_contrast(amount);
    }
    if let Some(sigma) = plan.sharpen.filter(|s| *s > 0.0) {
        image = image.unsharpen(sigma, 0);
    }
    if plan.greyscale {
        image = image.grayscale();
    }
    image = match plan.flip {
        Some(Flip::Horizontal) => image.fliph(),
        Some(Flip::Vertical) => image.flipv(),
        Some(Flip::Both) => image.fliph().flipv(),
        None => image,
    };
    if let Some(sigma) = plan.blur.filter(|s| *s > 0.0) {
        image = image.blur(sigma);
    }
    if let Some(block) = plan.pixelate.filter(|b| *b > 1) {
        image = pixelate(image, block);
    }

    if let Some(mark) = &plan.watermark {
        image = apply_watermark(image, mark, watermarks)?;
    }
    Ok(image)
}

fn check_pixel_budget((width, height): (u32, u32)) -> Result<(), EngineError> {
    if u64::from(width) * u64::from(height) > MAX_OUTPUT_PIXELS {
        return Err(EngineError::ProcessingFailed(format!(
            "{width}x{height} exceeds the {MAX_OUTPUT_PIXELS} pixel limit"
        )));
    }
    Ok(())
}

fn resize(
    image: DynamicImage,
    target: (u32, u32),
    fit: Fit,
    background: Option<Color>,
) -> Result<DynamicImage, EngineError> {
    check_pixel_budget(target)?;
    let source = image.dimensions();
    let resized = match fit {
        Fit::Contain => {
            let (w, h) = calculate_contain_dimensions(source, target);
            image.resize_exact(w, h, FilterType::Lanczos3)
        }
        Fit::Max => {
            let (w, h) = calculate_contain_dimensions(source, target);
            if w >= source.0 || h >= source.1 {
                image
            } else {
                image.resize_exact(w, h, FilterType::Lanczos3)
            }
        }
        Fit::Stretch => image.resize_exact(target.0, target.1, FilterType::Lanczos3),
        Fit::Fill => {
            let (w, h) = calculate_contain_dimensions(source, target);
            let resized = image.resize_exact(w, h, FilterType::Lanczos3).to_rgba8();
            let fill = background.map_or(Rgba([0, 0, 0, 0]), |c| Rgba([c.0[0], c.0[1], c.0[2], 255]));
            let mut canvas = RgbaImage::from_pixel(target.0, target.1, fill);
            let x = (i64::from(target.0) - i64::from(w)) / 2;
            let y = (i64::from(target.1) - i64::from(h)) / 2;
            imageops::overlay(&mut canvas, &resized, x, y);
            DynamicImage::ImageRgba8(canvas)
        }
        Fit::Crop(anchor) => {
            let (fill_w, fill_h) = calculate_fill_dimensions(source, target);
            check_pixel_budget((fill_w, fill_h))?;
            let filled = image.resize_exact(fill_w, fill_h, FilterType::Lanczos3);
            let (x, y) = anchor_offset((fill_w, fill_h), target, anchor, (0, 0));
            let x = u32::try_from(x).unwrap_or(0);
            let y = u32::try_from(y).unwrap_or(0);
            filled.crop_imm(x, y, target.0, target.1)
        }
    };
    Ok(resized)
}

fn pixelate(image: DynamicImage, block: u32) -> DynamicImage {
    let (w, h) = image.dimensions();
    let small = image.resize_exact((w / block).max(1), (h / block).max(1), FilterType::Nearest);
    small.resize_exact(w, h, FilterType::Nearest)
}

fn apply_watermark(
    image: DynamicImage,
    plan: &WatermarkPlan,
    directory: Option<&Path>,
) -> Result<DynamicImage, EngineError> {
    let Some(directory) = directory else {
        debug!(mark = %plan.file, "no watermark directory configured, skipping");
        return Ok(image);
    };
    let path = directory.join(&plan.file);
    if !path.is_file() {
        debug!(mark = %path.display(), "watermark not found, skipping");
        return Ok(image);
    }

    let mut mark = load_image(&path)?;
    if let Some(target) = resolve_dimensions(mark.dimensions(), plan.width, plan.height) {
        mark = resize(mark, target, plan.fit, None)?;
    }
    let mut mark = mark.to_rgba8();
    if plan.alpha < 100 {
        let opacity = u16::from(plan.alpha);
        for pixel in mark.pixels_mut() {
            pixel.apply_with_alpha(|c| c, |a| (u16::from(a) * opacity / 100) as u8);
        }
    }

    let mut base = image.to_rgba8();
    let (x, y) = anchor_offset(base.dimensions(), mark.dimensions(), plan.anchor, plan.padding);
    imageops::overlay(&mut base, &mark, x, y);
    Ok(DynamicImage::ImageRgba8(base))
}

/// Composite onto an opaque background, for formats without alpha.
fn flatten(image: &DynamicImage, background: Color) -> RgbImage {
    let [r, g, b] = background.0;
    let mut canvas = RgbaImage::from_pixel(image.width(), image.height(), Rgba([r, g, b, 255]));
    imageops::overlay(&mut canvas, &image.to_rgba8(), 0, 0);
    DynamicImage::ImageRgba8(canvas).to_rgb8()
}

fn encode(
    image: &DynamicImage,
    path: &Path,
    format: OutputFormat,
    quality: Quality,
    background: Option<Color>,
) -> Result<(), EngineError> {
    let failed = |e: image::ImageError| {
        EngineError::ProcessingFailed(format!("Failed to encode {}: {}", path.display(), e))
    };
    let quality_u8 = quality.value().min(100) as u8;

    match format {
        // The `image` JPEG encoder is baseline only; pjpg is written as baseline.
        OutputFormat::Jpeg | OutputFormat::ProgressiveJpeg => {
            let flat = DynamicImage::ImageRgb8(flatten(image, background.unwrap_or(Color::WHITE)));
            let mut writer = BufWriter::new(File::create(path)?);
            flat.write_with_encoder(JpegEncoder::new_with_quality(&mut writer, quality_u8))
                .map_err(failed)
        }
        OutputFormat::Avif => {
            let rgba = DynamicImage::ImageRgba8(image.to_rgba8());
            let mut writer = BufWriter::new(File::create(path)?);
            rgba.write_with_encoder(AvifEncoder::new_with_speed_quality(
                &mut writer,
                AVIF_SPEED,
                quality_u8,
            ))
            .map_err(failed)
        }
        OutputFormat::Png | OutputFormat::Gif | OutputFormat::WebP | OutputFormat::Tiff => {
            let image_format = match format {
                OutputFormat::Png => ImageFormat::Png,
                OutputFormat::Gif => ImageFormat::Gif,
                OutputFormat::WebP => ImageFormat::WebP,
                _ => ImageFormat::Tiff,
            };
            DynamicImage::ImageRgba8(image.to_rgba8())
                .save_with_format(path, image_format)
                .map_err(failed)
        }
    }
}
