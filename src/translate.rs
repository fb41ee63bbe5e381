//! Abstract manipulation names → engine parameter keys.
//!
//! The table is closed: [`Manipulation`] has one variant per accepted name
//! and [`Manipulation::engine_key`] is an exhaustive match, so adding a name
//! without a key is a compile error. Names outside the table fail with
//! [`ConversionError::UnknownManipulation`]; there is no best-effort guess.
//!
//! | Manipulation | Engine key |
//! |---|---|
//! | `width` / `height` | `w` / `h` |
//! | `crop`, `fit` | `fit` |
//! | `manualCrop` | `crop` |
//! | `pixelate` | `pixel` |
//! | `orientation` | `or` |
//! | `devicePixelRatio` | `dpr` |
//! | `watermark*` | `mark*` |
//! | `optimize` | *(dropped)* |
//!
//! See [`Manipulation::ALL`] for the full list.

use crate::error::{ConversionError, Result};
use crate::manipulation::{Argument, ManipulationGroup};
use indexmap::IndexMap;
use std::str::FromStr;

/// Translated parameters for one engine call, in group order.
pub type ParameterSet = IndexMap<&'static str, Argument>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Manipulation {
    Width,
    Height,
    Blur,
    Pixelate,
    Crop,
    ManualCrop,
    Orientation,
    Flip,
    Fit,
    DevicePixelRatio,
    Brightness,
    Contrast,
    Gamma,
    Sharpen,
    Filter,
    Background,
    Border,
    Quality,
    Format,
    Watermark,
    WatermarkWidth,
    WatermarkHeight,
    WatermarkFit,
    WatermarkPaddingX,
    WatermarkPaddingY,
    WatermarkPosition,
    WatermarkOpacity,
    Optimize,
}

impl Manipulation {
    pub const ALL: [Manipulation; 28] = [
        Manipulation::Width,
        Manipulation::Height,
        Manipulation::Blur,
        Manipulation::Pixelate,
        Manipulation::Crop,
        Manipulation::ManualCrop,
        Manipulation::Orientation,
        Manipulation::Flip,
        Manipulation::Fit,
        Manipulation::DevicePixelRatio,
        Manipulation::Brightness,
        Manipulation::Contrast,
        Manipulation::Gamma,
        Manipulation::Sharpen,
        Manipulation::Filter,
        Manipulation::Background,
        Manipulation::Border,
        Manipulation::Quality,
        Manipulation::Format,
        Manipulation::Watermark,
        Manipulation::WatermarkWidth,
        Manipulation::WatermarkHeight,
        Manipulation::WatermarkFit,
        Manipulation::WatermarkPaddingX,
        Manipulation::WatermarkPaddingY,
        Manipulation::WatermarkPosition,
        Manipulation::WatermarkOpacity,
        Manipulation::Optimize,
    ];

    /// The abstract name callers use in a manipulation group.
    pub fn name(self) -> &'static str {
        match self {
            Manipulation::Width => "width",
            Manipulation::Height => "height",
            Manipulation::Blur => "blur",
            Manipulation::Pixelate => "pixelate",
            Manipulation::Crop => "crop",
            Manipulation::ManualCrop => "manualCrop",
            Manipulation::Orientation => "orientation",
            Manipulation::Flip => "flip",
            Manipulation::Fit => "fit",
            Manipulation::DevicePixelRatio => "devicePixelRatio",
            Manipulation::Brightness => "brightness",
            Manipulation::Contrast => "contrast",
            Manipulation::Gamma => "gamma",
            Manipulation::Sharpen => "sharpen",
            Manipulation::Filter => "filter",
            Manipulation::Background => "background",
            Manipulation::Border => "border",
            Manipulation::Quality => "quality",
            Manipulation::Format => "format",
            Manipulation::Watermark => "watermark",
            Manipulation::WatermarkWidth => "watermarkWidth",
            Manipulation::WatermarkHeight => "watermarkHeight",
            Manipulation::WatermarkFit => "watermarkFit",
            Manipulation::WatermarkPaddingX => "watermarkPaddingX",
            Manipulation::WatermarkPaddingY => "watermarkPaddingY",
            Manipulation::WatermarkPosition => "watermarkPosition",
            Manipulation::WatermarkOpacity => "watermarkOpacity",
            Manipulation::Optimize => "optimize",
        }
    }

    /// Engine parameter key, or `None` for manipulations the engine never sees.
    pub fn engine_key(self) -> Option<&'static str> {
        let key = match self {
            Manipulation::Width => "w",
            Manipulation::Height => "h",
            Manipulation::Blur => "blur",
            Manipulation::Pixelate => "pixel",
            Manipulation::Crop => "fit",
            Manipulation::ManualCrop => "crop",
            Manipulation::Orientation => "or",
            Manipulation::Flip => "flip",
            Manipulation::Fit => "fit",
            Manipulation::DevicePixelRatio => "dpr",
            Manipulation::Brightness => "bri",
            Manipulation::Contrast => "con",
            Manipulation::Gamma => "gam",
            Manipulation::Sharpen => "sharp",
            Manipulation::Filter => "filt",
            Manipulation::Background => "bg",
            Manipulation::Border => "border",
            Manipulation::Quality => "q",
            Manipulation::Format => "fm",
            Manipulation::Watermark => "mark",
            Manipulation::WatermarkWidth => "markw",
            Manipulation::WatermarkHeight => "markh",
            Manipulation::WatermarkFit => "markfit",
            Manipulation::WatermarkPaddingX => "markx",
            Manipulation::WatermarkPaddingY => "marky",
            Manipulation::WatermarkPosition => "markpos",
            Manipulation::WatermarkOpacity => "markalpha",
            // Optimization happens outside the engine.
            Manipulation::Optimize => return None,
        };
        Some(key)
    }
}

impl FromStr for Manipulation {
    type Err = ConversionError;

    fn from_str(name: &str) -> Result<Self> {
        Manipulation::ALL
            .into_iter()
            .find(|m| m.name() == name)
            .ok_or_else(|| ConversionError::UnknownManipulation(name.to_string()))
    }
}

/// Translate a single abstract name. `Ok(None)` means "drop silently".
pub fn translate(name: &str) -> Result<Option<&'static str>> {
    Ok(name.parse::<Manipulation>()?.engine_key())
}

/// Translate every entry of a group, preserving order.
///
/// Fails on the first unknown name; nothing is returned for a partially
/// translated group.
pub fn translate_group(group: &ManipulationGroup) -> Result<ParameterSet> {
    let mut parameters = ParameterSet::new();
    for (name, argument) in group.iter() {
        if let Some(key) = translate(name)? {
            parameters.insert(key, argument.clone());
        }
    }
    Ok(parameters)
}
