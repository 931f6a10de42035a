//! Output quality tiers
//!
//! A quality tier decides how aggressively embedded images are re-encoded
//! when a document is saved:
//! - Low: small files for sharing, images downscaled hard
//! - Standard: balanced size and quality
//! - High: images are copied untouched

use std::fmt;
use std::str::FromStr;

/// Named output quality preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QualityTier {
    /// Smallest output
    ///
    /// - JPEG images downscaled to 1024 px on the longest side
    /// - Re-encoded at quality 50
    Low,

    /// Balanced output
    ///
    /// - JPEG images downscaled to 2048 px on the longest side
    /// - Re-encoded at quality 75
    #[default]
    Standard,

    /// Images are left exactly as they are in the sources
    High,

    /// User-defined settings
    Custom(OptimizationSettings),
}

impl QualityTier {
    /// Get the optimization settings for this tier
    pub fn settings(&self) -> OptimizationSettings {
        match self {
            QualityTier::Low => OptimizationSettings {
                image_max_dimension: Some(1024),
                jpeg_quality: Some(50),
                compress_streams: true,
            },
            QualityTier::Standard => OptimizationSettings {
                image_max_dimension: Some(2048),
                jpeg_quality: Some(75),
                compress_streams: true,
            },
            QualityTier::High => OptimizationSettings {
                image_max_dimension: None,
                jpeg_quality: None,
                compress_streams: true,
            },
            QualityTier::Custom(settings) => *settings,
        }
    }

    pub fn custom(settings: OptimizationSettings) -> Self {
        QualityTier::Custom(settings)
    }
}

impl FromStr for QualityTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(QualityTier::Low),
            "standard" | "medium" => Ok(QualityTier::Standard),
            "high" => Ok(QualityTier::High),
            other => Err(format!(
                "Invalid quality '{}'. Valid options: low, standard, high",
                other
            )),
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityTier::Low => write!(f, "low"),
            QualityTier::Standard => write!(f, "standard"),
            QualityTier::High => write!(f, "high"),
            QualityTier::Custom(_) => write!(f, "custom"),
        }
    }
}

/// Detailed settings applied when a document is written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptimizationSettings {
    /// Longest image side in pixels after downscaling (`None` = keep size)
    pub image_max_dimension: Option<u32>,

    /// JPEG quality (1-100) for re-encoded images (`None` = never re-encode)
    pub jpeg_quality: Option<u8>,

    /// Whether to deflate uncompressed streams
    pub compress_streams: bool,
}

impl Default for OptimizationSettings {
    fn default() -> Self {
        QualityTier::Standard.settings()
    }
}

impl OptimizationSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image_max_dimension(mut self, max: Option<u32>) -> Self {
        self.image_max_dimension = max;
        self
    }

    /// Set the JPEG quality; values are clamped to 1..=100
    pub fn with_jpeg_quality(mut self, quality: Option<u8>) -> Self {
        self.jpeg_quality = quality.map(|q| q.clamp(1, 100));
        self
    }

    pub fn with_compress_streams(mut self, compress: bool) -> Self {
        self.compress_streams = compress;
        self
    }

    /// Whether any image work is requested at all
    pub fn recompresses_images(&self) -> bool {
        self.jpeg_quality.is_some()
    }
}
