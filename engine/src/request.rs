use std::fmt;

use serde::{Serialize, Serializer};
use strum::{Display, EnumIter};

use crate::error::{GenerationError, Result};

/// Largest seed the form accepts
pub const MAX_SEED: u32 = (1 << 31) - 1;
pub const DEFAULT_SEED: u32 = 42;

#[derive(
    Debug,
    Clone,
    Copy,
    Display,
    clap::ValueEnum,
    Serialize,
    Hash,
    PartialEq,
    Eq,
    EnumIter,
    Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Png,
}

impl OutputFormat {
    pub fn media_type(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Png => "png",
        }
    }

    pub fn image_format(&self) -> image::ImageFormat {
        match self {
            OutputFormat::Jpeg => image::ImageFormat::Jpeg,
            OutputFormat::Png => image::ImageFormat::Png,
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    Display,
    clap::ValueEnum,
    Serialize,
    Hash,
    PartialEq,
    Eq,
    EnumIter,
    Default,
)]
pub enum AspectRatio {
    #[strum(to_string = "21:9")]
    #[serde(rename = "21:9")]
    #[value(name = "21:9")]
    UltraWide,
    #[default]
    #[strum(to_string = "16:9")]
    #[serde(rename = "16:9")]
    #[value(name = "16:9")]
    Widescreen,
    #[strum(to_string = "4:3")]
    #[serde(rename = "4:3")]
    #[value(name = "4:3")]
    Standard,
    #[strum(to_string = "3:2")]
    #[serde(rename = "3:2")]
    #[value(name = "3:2")]
    Photo,
    #[strum(to_string = "1:1")]
    #[serde(rename = "1:1")]
    #[value(name = "1:1")]
    Square,
    #[strum(to_string = "2:3")]
    #[serde(rename = "2:3")]
    #[value(name = "2:3")]
    PortraitPhoto,
    #[strum(to_string = "3:4")]
    #[serde(rename = "3:4")]
    #[value(name = "3:4")]
    PortraitStandard,
    #[strum(to_string = "9:16")]
    #[serde(rename = "9:16")]
    #[value(name = "9:16")]
    PortraitWidescreen,
    #[strum(to_string = "9:21")]
    #[serde(rename = "9:21")]
    #[value(name = "9:21")]
    PortraitUltraWide,
}

impl AspectRatio {
    pub fn label(&self) -> &'static str {
        use AspectRatio::*;
        match self {
            UltraWide => "Ultra wide (21:9)",
            Widescreen => "Widescreen (16:9)",
            Standard => "Standard (4:3)",
            Photo => "Photo (3:2)",
            Square => "Square (1:1)",
            PortraitPhoto => "Portrait photo (2:3)",
            PortraitStandard => "Portrait standard (3:4)",
            PortraitWidescreen => "Portrait widescreen (9:16)",
            PortraitUltraWide => "Portrait ultra wide (9:21)",
        }
    }
}

/// Content filter strictness, 1 (strictest) to 6. Goes over the wire as a string.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct SafetyTolerance(u8);

impl SafetyTolerance {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 6;

    pub fn try_new(level: u8) -> Result<Self> {
        if (Self::MIN..=Self::MAX).contains(&level) {
            Ok(Self(level))
        } else {
            Err(GenerationError::Validation(format!(
                "safety tolerance must be between {} and {}, got {level}",
                Self::MIN,
                Self::MAX
            )))
        }
    }

    pub fn level(&self) -> u8 {
        self.0
    }

    /// Display only, the numeric level is what gets transmitted
    pub fn label(&self) -> &'static str {
        match self.0 {
            1 => "Very strict",
            2 => "Strict (default)",
            3 => "Moderate",
            4 => "Permissive",
            5 => "Very permissive",
            _ => "Unrestricted",
        }
    }

    pub fn all() -> impl Iterator<Item = SafetyTolerance> {
        (Self::MIN..=Self::MAX).map(SafetyTolerance)
    }
}

impl Default for SafetyTolerance {
    fn default() -> Self {
        Self(2)
    }
}

impl fmt::Display for SafetyTolerance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for SafetyTolerance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The raw values of the generation form, as the user left them.
#[derive(Debug, Clone)]
pub struct FormState {
    pub prompt: String,
    pub enable_safety_checker: bool,
    pub safety_tolerance: SafetyTolerance,
    pub output_format: OutputFormat,
    pub aspect_ratio: AspectRatio,
    pub raw: bool,
    pub use_seed: bool,
    /// Kept as typed so half-finished input doesn't get lost
    pub seed: String,
}

impl Default for FormState {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            enable_safety_checker: true,
            safety_tolerance: SafetyTolerance::default(),
            output_format: OutputFormat::default(),
            aspect_ratio: AspectRatio::default(),
            raw: false,
            use_seed: false,
            seed: DEFAULT_SEED.to_string(),
        }
    }
}

/// Request body of the generation endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub num_images: u8,
    pub enable_safety_checker: bool,
    pub safety_tolerance: SafetyTolerance,
    pub output_format: OutputFormat,
    pub aspect_ratio: AspectRatio,
    // always sent, the service default for this flag is not to be relied upon
    pub raw: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u32>,
}

impl GenerationRequest {
    pub fn build(form: &FormState) -> Result<Self> {
        let prompt = form.prompt.trim();
        if prompt.is_empty() {
            return Err(GenerationError::Validation(
                "please enter an image description".into(),
            ));
        }

        let seed = if form.use_seed {
            Some(parse_seed(&form.seed)?)
        } else {
            None
        };

        Ok(Self {
            prompt: prompt.to_string(),
            num_images: 1,
            enable_safety_checker: form.enable_safety_checker,
            safety_tolerance: form.safety_tolerance,
            output_format: form.output_format,
            aspect_ratio: form.aspect_ratio,
            raw: form.raw,
            seed,
        })
    }
}

fn parse_seed(src: &str) -> Result<u32> {
    let invalid = || {
        GenerationError::Validation(format!(
            "the seed must be a whole number between 0 and {MAX_SEED}, got {src:?}"
        ))
    };
    let seed = src.trim().parse::<i64>().map_err(|_| invalid())?;
    u32::try_from(seed)
        .ok()
        .filter(|s| *s <= MAX_SEED)
        .ok_or_else(invalid)
}
