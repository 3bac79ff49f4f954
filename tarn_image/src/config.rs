//! Image configuration.

use serde::{Deserialize, Serialize};

use crate::error::{ImageError, ImageResult};

/// Settings for one image build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImageConfig {
    /// Module name, also used in the text dump header.
    pub image_name: String,
    /// Pointer width in bits. Must match the environment's pointer size.
    pub native_int_size: u32,
    /// Symbol the bootstrap method is exported as.
    pub entry_symbol: String,
    /// Name of the method that initializes the runtime.
    pub bootstrap_method: String,
    /// Verify and emit the module after resolution.
    pub validate: bool,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            image_name: "image".to_string(),
            native_int_size: 32,
            entry_symbol: "main".to_string(),
            bootstrap_method: "Bootstrap_Initialization".to_string(),
            validate: true,
        }
    }
}

impl ImageConfig {
    /// Parse a configuration from JSON. Missing keys keep their defaults.
    pub fn from_json(text: &str) -> ImageResult<Self> {
        serde_json::from_str(text).map_err(|e| ImageError::config(e.to_string()))
    }
}
