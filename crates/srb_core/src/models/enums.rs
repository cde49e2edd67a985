//! Core enums used throughout the application.

use serde::{Deserialize, Serialize};

/// Super-resolution model passed to the external tool via `-n`.
///
/// The list mirrors the models shipped with realesrgan-ncnn-vulkan
/// and can be extended as new model files become available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum UpscaleModel {
    #[default]
    #[serde(rename = "realesrgan-x4plus-anime")]
    RealesrganX4plusAnime,
    #[serde(rename = "realesrgan-x4plus")]
    RealesrganX4plus,
    #[serde(rename = "realsr-animevideov3-x2")]
    RealsrAnimevideov3X2,
    #[serde(rename = "realsr-animevideov3-x3")]
    RealsrAnimevideov3X3,
}

impl UpscaleModel {
    /// All known models, in display order.
    pub const ALL: [UpscaleModel; 4] = [
        UpscaleModel::RealesrganX4plusAnime,
        UpscaleModel::RealesrganX4plus,
        UpscaleModel::RealsrAnimevideov3X2,
        UpscaleModel::RealsrAnimevideov3X3,
    ];

    /// The exact string the tool expects after `-n`.
    pub fn as_arg(&self) -> &'static str {
        match self {
            Self::RealesrganX4plusAnime => "realesrgan-x4plus-anime",
            Self::RealesrganX4plus => "realesrgan-x4plus",
            Self::RealsrAnimevideov3X2 => "realsr-animevideov3-x2",
            Self::RealsrAnimevideov3X3 => "realsr-animevideov3-x3",
        }
    }
}

impl std::fmt::Display for UpscaleModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_arg())
    }
}

impl std::str::FromStr for UpscaleModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|m| m.as_arg() == s)
            .copied()
            .ok_or_else(|| format!("unknown model '{}'", s))
    }
}
