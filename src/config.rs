//! Converter configuration.

use crate::mapping::DEFAULT_LEGEND_MARKERS;
use std::path::PathBuf;

/// Prefix of the environment variables read by [`ConverterConfig::from_env`].
pub const ENV_PREFIX: &str = "MARKUP_SWAP_";

/// Default upload limit: 50 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Settings for a [`Converter`](crate::pipeline::Converter).
#[derive(Debug, Clone, PartialEq)]
pub struct ConverterConfig {
    /// Markdown bid → deployment mapping table
    pub mapping_file: PathBuf,
    /// Document whose visibility layers are cloned into the output
    pub layer_reference_pdf: Option<PathBuf>,
    /// Root directory of gear images
    pub gear_icons_dir: PathBuf,
    /// Hand-tuned icon configurations
    pub icon_overrides_file: Option<PathBuf>,
    /// Subjects containing any of these are deleted
    pub legend_markers: Vec<String>,
    /// `/T` of new annotations
    pub author: String,
    /// Largest accepted input, in bytes
    pub max_file_size: u64,
    /// Reject documents with more than one page
    pub require_single_page: bool,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            mapping_file: PathBuf::from("data/mapping.md"),
            layer_reference_pdf: None,
            gear_icons_dir: PathBuf::from("icons/gearIcons"),
            icon_overrides_file: None,
            legend_markers: DEFAULT_LEGEND_MARKERS.iter().map(|s| s.to_string()).collect(),
            author: "markup_swap".to_string(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            require_single_page: true,
        }
    }
}

impl ConverterConfig {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `MARKUP_SWAP_*` environment variables.
    ///
    /// | variable | field |
    /// |---|---|
    /// | `MARKUP_SWAP_MAPPING_FILE` | `mapping_file` |
    /// | `MARKUP_SWAP_LAYER_REFERENCE_PDF` | `layer_reference_pdf` |
    /// | `MARKUP_SWAP_GEAR_ICONS_DIR` | `gear_icons_dir` |
    /// | `MARKUP_SWAP_ICON_OVERRIDES_FILE` | `icon_overrides_file` |
    /// | `MARKUP_SWAP_LEGEND_MARKERS` | `legend_markers` (comma separated) |
    /// | `MARKUP_SWAP_AUTHOR` | `author` |
    /// | `MARKUP_SWAP_MAX_FILE_SIZE_MB` | `max_file_size` |
    /// | `MARKUP_SWAP_REQUIRE_SINGLE_PAGE` | `require_single_page` |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(&format!("{}{}", ENV_PREFIX, name))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut config = Self::default();

        if let Some(v) = get("MAPPING_FILE") {
            config.mapping_file = PathBuf::from(v);
        }
        if let Some(v) = get("LAYER_REFERENCE_PDF") {
            config.layer_reference_pdf = Some(PathBuf::from(v));
        }
        if let Some(v) = get("GEAR_ICONS_DIR") {
            config.gear_icons_dir = PathBuf::from(v);
        }
        if let Some(v) = get("ICON_OVERRIDES_FILE") {
            config.icon_overrides_file = Some(PathBuf::from(v));
        }
        if let Some(v) = get("LEGEND_MARKERS") {
            config.legend_markers = v
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(v) = get("AUTHOR") {
            config.author = v;
        }
        if let Some(v) = get("MAX_FILE_SIZE_MB") {
            match v.parse::<u64>() {
                Ok(mb) => config.max_file_size = mb * 1024 * 1024,
                Err(_) => log::warn!("Ignoring {}MAX_FILE_SIZE_MB={:?}", ENV_PREFIX, v),
            }
        }
        if let Some(v) = get("REQUIRE_SINGLE_PAGE") {
            match v.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => config.require_single_page = true,
                "0" | "false" | "no" | "off" => config.require_single_page = false,
                _ => log::warn!("Ignoring {}REQUIRE_SINGLE_PAGE={:?}", ENV_PREFIX, v),
            }
        }
        config
    }

    /// Set the mapping table.
    pub fn with_mapping_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.mapping_file = path.into();
        self
    }

    /// Set the layer reference document.
    pub fn with_layer_reference(mut self, path: impl Into<PathBuf>) -> Self {
        self.layer_reference_pdf = Some(path.into());
        self
    }

    /// Set the gear image directory.
    pub fn with_gear_icons_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.gear_icons_dir = path.into();
        self
    }

    /// Set the icon override store.
    pub fn with_icon_overrides(mut self, path: impl Into<PathBuf>) -> Self {
        self.icon_overrides_file = Some(path.into());
        self
    }

    /// Replace the legend markers.
    pub fn with_legend_markers<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.legend_markers = markers.into_iter().map(Into::into).collect();
        self
    }

    /// Set the annotation author.
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// Set the input size limit in bytes.
    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    /// Allow or reject multi-page input.
    pub fn with_require_single_page(mut self, require: bool) -> Self {
        self.require_single_page = require;
        self
    }
}
