//! Typed view of an engine parameter set.
//!
//! [`RenderPlan::from_parameters`] reads the short-key parameters produced by
//! [`translate`](crate::translate) and turns them into *what* the
//! [`RustEngine`](super::RustEngine) should do. Parsing is lenient the way an
//! image server is: a malformed or unsupported value is recorded in
//! [`RenderPlan::ignored`] and otherwise skipped, never an error. Sizes
//! (`w`, `h`, `markw`, `markh`) above [`MAX_DIMENSION`] count as malformed.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 90). Clamped on construction.
//! - [`Anchor`]: Placement inside a container: nine named positions or a focal point.
//! - [`Fit`]: How `w`/`h` are applied: contain, max, fill, stretch, crop.
//! - [`OutputFormat`]: Encoded output format.
//! - [`WatermarkPlan`]: Watermark file, size, fit, padding, anchor, opacity.

use crate::manipulation::Argument;
use crate::translate::ParameterSet;

/// Largest accepted value for a single size parameter, in pixels.
pub const MAX_DIMENSION: u32 = 16_384;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// Where an item sits inside a container.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Anchor {
    TopLeft,
    Top,
    TopRight,
    Left,
    Center,
    Right,
    BottomLeft,
    Bottom,
    BottomRight,
    /// Horizontal and vertical fractions, each 0.0–1.0.
    Focal(f64, f64),
}

impl Anchor {
    pub fn parse(value: &str) -> Option<Self> {
        let anchor = match value {
            "top-left" => Anchor::TopLeft,
            "top" => Anchor::Top,
            "top-right" => Anchor::TopRight,
            "left" => Anchor::Left,
            "center" => Anchor::Center,
            "right" => Anchor::Right,
            "bottom-left" => Anchor::BottomLeft,
            "bottom" => Anchor::Bottom,
            "bottom-right" => Anchor::BottomRight,
            _ => return Self::parse_focal(value),
        };
        Some(anchor)
    }

    /// `"25-75"` → 25% from the left, 75% from the top.
    fn parse_focal(value: &str) -> Option<Self> {
        let (x, y) = value.split_once('-')?;
        let x: f64 = x.parse().ok()?;
        let y: f64 = y.parse().ok()?;
        if !(0.0..=100.0).contains(&x) || !(0.0..=100.0).contains(&y) {
            return None;
        }
        Some(Anchor::Focal(x / 100.0, y / 100.0))
    }

    pub fn fractions(self) -> (f64, f64) {
        match self {
            Anchor::TopLeft => (0.0, 0.0),
            Anchor::Top => (0.5, 0.0),
            Anchor::TopRight => (1.0, 0.0),
            Anchor::Left => (0.0, 0.5),
            Anchor::Center => (0.5, 0.5),
            Anchor::Right => (1.0, 0.5),
            Anchor::BottomLeft => (0.0, 1.0),
            Anchor::Bottom => (0.5, 1.0),
            Anchor::BottomRight => (1.0, 1.0),
            Anchor::Focal(x, y) => (x, y),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Fit {
    #[default]
    Contain,
    /// Contain, but never upscale.
    Max,
    /// Contain, then pad to the exact size with the background.
    Fill,
    Stretch,
    Crop(Anchor),
}

impl Fit {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "contain" => Some(Fit::Contain),
            "max" => Some(Fit::Max),
            "fill" => Some(Fit::Fill),
            "stretch" => Some(Fit::Stretch),
            "crop" => Some(Fit::Crop(Anchor::Center)),
            other => other
                .strip_prefix("crop-")
                .and_then(Anchor::parse)
                .map(Fit::Crop),
        }
    }
}

/// Explicit crop rectangle: `"width,height,x,y"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub width: u32,
    pub height: u32,
    pub x: u32,
    pub y: u32,
}

impl CropRect {
    pub fn parse(value: &str) -> Option<Self> {
        let parts: Vec<u32> = value
            .split(',')
            .map(|p| p.trim().parse().ok())
            .collect::<Option<_>>()?;
        match parts[..] {
            [width, height, x, y] if width > 0 && height > 0 => Some(Self {
                width,
                height,
                x,
                y,
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Auto,
    Degrees0,
    Degrees90,
    Degrees180,
    Degrees270,
}

impl Orientation {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "auto" => Some(Orientation::Auto),
            "0" => Some(Orientation::Degrees0),
            "90" => Some(Orientation::Degrees90),
            "180" => Some(Orientation::Degrees180),
            "270" => Some(Orientation::Degrees270),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flip {
    Horizontal,
    Vertical,
    Both,
}

impl Flip {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "h" => Some(Flip::Horizontal),
            "v" => Some(Flip::Vertical),
            "both" => Some(Flip::Both),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    ProgressiveJpeg,
    Png,
    Gif,
    WebP,
    Avif,
    Tiff,
}

impl OutputFormat {
    /// Value of the `fm` parameter.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "jpg" => Some(OutputFormat::Jpeg),
            "pjpg" => Some(OutputFormat::ProgressiveJpeg),
            "png" => Some(OutputFormat::Png),
            "gif" => Some(OutputFormat::Gif),
            "webp" => Some(OutputFormat::WebP),
            "avif" => Some(OutputFormat::Avif),
            "tiff" => Some(OutputFormat::Tiff),
            _ => None,
        }
    }

    /// Format implied by an input file extension.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(OutputFormat::Jpeg),
            "png" => Some(OutputFormat::Png),
            "gif" => Some(OutputFormat::Gif),
            "webp" => Some(OutputFormat::WebP),
            "avif" => Some(OutputFormat::Avif),
            "tif" | "tiff" => Some(OutputFormat::Tiff),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg | OutputFormat::ProgressiveJpeg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::Gif => "gif",
            OutputFormat::WebP => "webp",
            OutputFormat::Avif => "avif",
            OutputFormat::Tiff => "tiff",
        }
    }
}

/// Opaque RGB colour from a 3- or 6-digit hex string (leading `#` optional).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color(pub [u8; 3]);

impl Color {
    pub const WHITE: Color = Color([255, 255, 255]);

    pub fn parse(value: &str) -> Option<Self> {
        let hex = value.strip_prefix('#').unwrap_or(value);
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).ok();
        match hex.len() {
            3 => {
                let mut rgb = [0u8; 3];
                for (i, c) in hex.chars().enumerate() {
                    let v = channel(&c.to_string())?;
                    rgb[i] = v * 17;
                }
                Some(Color(rgb))
            }
            6 => Some(Color([
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            ])),
            _ => None,
        }
    }
}

/// Everything needed to place a watermark.
#[derive(Debug, Clone, PartialEq)]
pub struct WatermarkPlan {
    /// Filename, resolved against the configured watermark directory.
    pub file: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fit: Fit,
    pub padding: (u32, u32),
    pub anchor: Anchor,
    /// Opacity, 0–100.
    pub alpha: u8,
}

/// Parsed engine parameters, in the order the engine applies them.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPlan {
    pub orientation: Option<Orientation>,
    pub manual_crop: Option<CropRect>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub pixel_ratio: f64,
    pub fit: Fit,
    pub brightness: Option<i32>,
    pub contrast: Option<f32>,
    pub sharpen: Option<f32>,
    pub greyscale: bool,
    pub flip: Option<Flip>,
    pub blur: Option<f32>,
    pub pixelate: Option<u32>,
    pub background: Option<Color>,
    pub watermark: Option<WatermarkPlan>,
    pub quality: Quality,
    pub format: Option<OutputFormat>,
    /// Keys that were present but unsupported or malformed.
    pub ignored: Vec<&'static str>,
}

impl Default for RenderPlan {
    fn default() -> Self {
        Self {
            orientation: None,
            manual_crop: None,
            width: None,
            height: None,
            pixel_ratio: 1.0,
            fit: Fit::default(),
            brightness: None,
            contrast: None,
            sharpen: None,
            greyscale: false,
            flip: None,
            blur: None,
            pixelate: None,
            background: None,
            watermark: None,
            quality: Quality::default(),
            format: None,
            ignored: Vec::new(),
        }
    }
}

fn number(argument: &Argument) -> Option<f64> {
    match argument {
        Argument::Integer(n) => Some(*n as f64),
        Argument::Float(n) => Some(*n),
        Argument::Text(s) => s.trim().parse().ok(),
        Argument::Path(_) => None,
    }
}

fn text(argument: &Argument) -> String {
    argument.to_string()
}

fn ranged(argument: &Argument, min: f64, max: f64) -> Option<f64> {
    number(argument).filter(|n| (min..=max).contains(n))
}

fn pixels(argument: &Argument) -> Option<u32> {
    number(argument)
        .filter(|n| *n >= 1.0 && *n <= f64::from(MAX_DIMENSION))
        .map(|n| n.round() as u32)
}

impl RenderPlan {
    pub fn from_parameters(parameters: &ParameterSet) -> Self {
        let mut plan = RenderPlan::default();
        let mut mark_width = None;
        let mut mark_height = None;
        let mut mark_fit = Fit::Contain;
        let mut mark_padding = (0, 0);
        let mut mark_anchor = Anchor::BottomRight;
        let mut mark_alpha = 100u8;
        let mut mark_file = None;

        for (&key, argument) in parameters {
            let understood = match key {
                "w" => pixels(argument).map(|v| plan.width = Some(v)),
                "h" => pixels(argument).map(|v| plan.height = Some(v)),
                "dpr" => ranged(argument, 1.0, 8.0).map(|v| plan.pixel_ratio = v),
                "fit" => Fit::parse(&text(argument)).map(|v| plan.fit = v),
                "crop" => CropRect::parse(&text(argument)).map(|v| plan.manual_crop = Some(v)),
                "or" => Orientation::parse(&text(argument)).map(|v| plan.orientation = Some(v)),
                "flip" => Flip::parse(&text(argument)).map(|v| plan.flip = Some(v)),
                "bri" => ranged(argument, -100.0, 100.0)
                    .map(|v| plan.brightness = Some((v * 255.0 / 100.0).round() as i32)),
                "con" => ranged(argument, -100.0, 100.0).map(|v| plan.contrast = Some(v as f32)),
                "sharp" => ranged(argument, 0.0, 100.0).map(|v| plan.sharpen = Some(v as f32 / 10.0)),
                "blur" => ranged(argument, 0.0, 100.0).map(|v| plan.blur = Some(v as f32 / 2.0)),
                "pixel" => ranged(argument, 0.0, 1000.0).map(|v| plan.pixelate = Some(v as u32)),
                "filt" => (text(argument) == "greyscale").then(|| plan.greyscale = true),
                "bg" => Color::parse(&text(argument)).map(|v| plan.background = Some(v)),
                "q" => ranged(argument, 0.0, 100.0).map(|v| plan.quality = Quality::new(v as u32)),
                "fm" => OutputFormat::parse(&text(argument)).map(|v| plan.format = Some(v)),
                "mark" => {
                    mark_file = Some(text(argument));
                    Some(())
                }
                "markw" => pixels(argument).map(|v| mark_width = Some(v)),
                "markh" => pixels(argument).map(|v| mark_height = Some(v)),
                "markfit" => Fit::parse(&text(argument)).map(|v| mark_fit = v),
                "markx" => number(argument).map(|v| mark_padding.0 = v.max(0.0) as u32),
                "marky" => number(argument).map(|v| mark_padding.1 = v.max(0.0) as u32),
                "markpos" => Anchor::parse(&text(argument)).map(|v| mark_anchor = v),
                "markalpha" => ranged(argument, 0.0, 100.0).map(|v| mark_alpha = v as u8),
                // gam, border and sepia have no `image` crate counterpart.
                _ => None,
            };
            if understood.is_none() {
                plan.ignored.push(key);
            }
        }

        plan.watermark = mark_file.map(|file| WatermarkPlan {
            file,
            width: mark_width,
            height: mark_height,
            fit: mark_fit,
            padding: mark_padding,
            anchor: mark_anchor,
            alpha: mark_alpha,
        });
        plan
    }
}
