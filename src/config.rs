//! Configuration for schemagen
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (schemagen.toml)
//! - Environment variables (SCHEMAGEN__*)
//!
//! ## Example config file (schemagen.toml):
//! ```toml
//! [codegen]
//! namespace_open = "WABI_NAMESPACE_BEGIN"
//! namespace_close = "WABI_NAMESPACE_END"
//! namespace_using = "WABI_NAMESPACE_USING"
//! header_terminator = "#endif"
//! schema_base_class = "UsdSchemaBase"
//!
//! [resolver]
//! search_paths = ["/opt/schemas"]
//!
//! [output]
//! validate = false
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration for a generation run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenConfig {
    /// Names spliced into generated code
    #[serde(default)]
    pub codegen: CodegenConfig,

    /// Where sublayers are looked up
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Output behaviour
    #[serde(default)]
    pub output: OutputConfig,
}

/// Code generation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodegenConfig {
    #[serde(default = "default_namespace_open")]
    pub namespace_open: String,

    #[serde(default = "default_namespace_close")]
    pub namespace_close: String,

    #[serde(default = "default_namespace_using")]
    pub namespace_using: String,

    /// Last line of generated headers
    #[serde(default = "default_header_terminator")]
    pub header_terminator: String,

    /// Base class of `Typed` and `APISchemaBase`, also the alias key in
    /// plugin descriptors
    #[serde(default = "default_schema_base_class")]
    pub schema_base_class: String,
}

/// Sublayer resolution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Directories searched for sublayers not found next to their referrer
    #[serde(default)]
    pub search_paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Compare against existing files instead of writing them
    #[serde(default)]
    pub validate: bool,
}

// Default value functions
fn default_namespace_open() -> String {
    "WABI_NAMESPACE_BEGIN".to_string()
}

fn default_namespace_close() -> String {
    "WABI_NAMESPACE_END".to_string()
}

fn default_namespace_using() -> String {
    "WABI_NAMESPACE_USING".to_string()
}

fn default_header_terminator() -> String {
    "#endif".to_string()
}

fn default_schema_base_class() -> String {
    "UsdSchemaBase".to_string()
}

impl Default for CodegenConfig {
    fn default() -> Self {
        Self {
            namespace_open: default_namespace_open(),
            namespace_close: default_namespace_close(),
            namespace_using: default_namespace_using(),
            header_terminator: default_header_terminator(),
            schema_base_class: default_schema_base_class(),
        }
    }
}

impl GenConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, layering `config_path` over the default locations
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = ["schemagen.toml", ".schemagen.toml", "config/schemagen.toml"];
        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(dirs) = directories::ProjectDirs::from("dev", "schemagen", "schemagen") {
            let xdg_config = dirs.config_dir().join("schemagen.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // SCHEMAGEN__CODEGEN__NAMESPACE_OPEN=...
        builder = builder.add_source(
            Environment::with_prefix("SCHEMAGEN")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }
}
