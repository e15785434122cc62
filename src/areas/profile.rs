use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::areas::resolver::AreaResolver;
use crate::areas::types::{CornerSet, Rectangle};
use crate::config::{InpaintMethod, ProcessingConfig};
use crate::error::{AreaError, Result};

/// Saved area selection, as written by the area editor
///
/// ```json
/// {
///   "areas": [[x, y, w, h]],
///   "corners": {"bottom_right": true, "top_left": false, "bottom_left": false, "top_right": false},
///   "settings": {"inpaint_method": "mixed", "blur_strength": 11, "margin_size": 20}
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AreaProfile {
    pub areas: Vec<Rectangle>,
    pub corners: CornerSet,
    pub settings: Option<ProfileSettings>,
}

/// Algorithm settings stored alongside the areas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileSettings {
    #[serde(with = "method_name")]
    pub inpaint_method: InpaintMethod,
    pub blur_strength: u32,
    pub margin_size: u32,
}

impl Default for ProfileSettings {
    fn default() -> Self {
        Self {
            inpaint_method: InpaintMethod::Mixed,
            blur_strength: 11,
            margin_size: 20,
        }
    }
}

impl AreaProfile {
    /// Capture the current selection and algorithm settings
    pub fn capture(resolver: &AreaResolver, config: &ProcessingConfig) -> Self {
        Self {
            areas: resolver.manual().to_vec(),
            corners: resolver.corners(),
            settings: Some(ProfileSettings {
                inpaint_method: config.inpaint_method,
                blur_strength: config.blur_strength,
                margin_size: config.margin,
            }),
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let failed = |reason: String| AreaError::ProfileLoadFailed {
            path: path.display().to_string(),
            reason,
        };

        let content = std::fs::read_to_string(path).map_err(|e| failed(e.to_string()))?;
        let profile: AreaProfile = serde_json::from_str(&content).map_err(|e| failed(e.to_string()))?;

        info!("Areas loaded from: {} ({} manual)", path.display(), profile.areas.len());
        Ok(profile)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let failed = |reason: String| AreaError::ProfileSaveFailed {
            path: path.display().to_string(),
            reason,
        };

        let content = serde_json::to_string_pretty(self).map_err(|e| failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| failed(e.to_string()))?;

        info!("Areas saved to: {}", path.display());
        Ok(())
    }

    pub fn resolver(&self) -> AreaResolver {
        AreaResolver::new(self.corners, self.areas.clone())
    }

    /// Override method, blur strength and margin from the stored settings
    pub fn apply_settings(&self, config: &mut ProcessingConfig) {
        if let Some(settings) = &self.settings {
            config.inpaint_method = settings.inpaint_method;
            config.blur_strength = settings.blur_strength;
            config.margin = settings.margin_size;
        }
    }
}

/// Profiles spell Navier-Stokes as `"ns"`
mod method_name {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::config::InpaintMethod;

    pub fn serialize<S: Serializer>(method: &InpaintMethod, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(method.as_str())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<InpaintMethod, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}
