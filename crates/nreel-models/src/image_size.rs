//! Image size presets accepted by the image-generation provider.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Output size preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ImageSize {
    /// 2048x2048
    #[serde(rename = "2048x2048")]
    Square,
    /// 2560x1440
    #[serde(rename = "2560x1440")]
    Landscape,
    /// 1440x2560
    #[default]
    #[serde(rename = "1440x2560")]
    Portrait,
}

impl ImageSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageSize::Square => "2048x2048",
            ImageSize::Landscape => "2560x1440",
            ImageSize::Portrait => "1440x2560",
        }
    }

    /// Parse a size string, falling back to the portrait preset.
    pub fn parse_or_default(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "2048x2048" | "square" => Ok(ImageSize::Square),
            "2560x1440" | "landscape" => Ok(ImageSize::Landscape),
            "1440x2560" | "portrait" => Ok(ImageSize::Portrait),
            other => Err(format!("unsupported image size: {other}")),
        }
    }
}
