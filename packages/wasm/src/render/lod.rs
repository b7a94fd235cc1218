//! Level of detail as a function of zoom scale.

use serde::{Deserialize, Serialize};

use crate::config::RenderConfig;

/// How much of a node is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LodLevel {
    /// Shape only.
    Macro,
    /// Shape plus id label.
    Meso,
    /// Title, progress and metadata.
    Micro,
}

impl LodLevel {
    /// Level for `scale` with the default thresholds (0.3 and 0.7).
    pub fn for_scale(scale: f32) -> Self {
        Self::for_scale_with(scale, &RenderConfig::default())
    }

    pub fn for_scale_with(scale: f32, config: &RenderConfig) -> Self {
        if scale < config.macro_below {
            LodLevel::Macro
        } else if scale < config.meso_below {
            LodLevel::Meso
        } else {
            LodLevel::Micro
        }
    }

    #[inline]
    pub fn shows_label(self) -> bool {
        self != LodLevel::Macro
    }

    #[inline]
    pub fn shows_details(self) -> bool {
        self == LodLevel::Micro
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thresholds() {
        assert_eq!(LodLevel::for_scale(0.05), LodLevel::Macro);
        assert_eq!(LodLevel::for_scale(0.29), LodLevel::Macro);
        assert_eq!(LodLevel::for_scale(0.3), LodLevel::Meso);
        assert_eq!(LodLevel::for_scale(0.69), LodLevel::Meso);
        assert_eq!(LodLevel::for_scale(0.7), LodLevel::Micro);
        assert_eq!(LodLevel::for_scale(4.0), LodLevel::Micro);
    }

    #[test]
    fn test_custom_thresholds() {
        let config = RenderConfig {
            macro_below: 0.5,
            meso_below: 1.0,
            ..RenderConfig::default()
        };
        assert_eq!(LodLevel::for_scale_with(0.4, &config), LodLevel::Macro);
        assert_eq!(LodLevel::for_scale_with(0.8, &config), LodLevel::Meso);
        assert!(!LodLevel::Macro.shows_label());
        assert!(LodLevel::Meso.shows_label() && !LodLevel::Meso.shows_details());
    }
}
