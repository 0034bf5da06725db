//! Per-subject icon rendering parameters.
//!
//! The built-in catalog (`data/icon_catalog.json`) carries category defaults,
//! sparse per-icon overrides, gear image paths and ID prefixes. A JSON
//! override store written by the tuning editor can replace any icon's
//! configuration wholesale.
//!
//! Resolution order for [`IconCatalog::config_for`]:
//!
//! 1. override store entry (complete config, used as-is)
//! 2. category defaults, then per-icon overrides, then image path

use crate::error::{Error, Result};
use crate::ids::IdPrefixConfig;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// RGB colour with components in `0..=1`.
pub type Rgb = [f64; 3];

/// Components that can be reordered on top of the circle.
pub const DEFAULT_LAYER_ORDER: [&str; 3] = ["gear_image", "brand_text", "model_text"];

/// Brand prefixes removed from the model part of a subject.
const MODEL_BRANDS: [&str; 11] = [
    "Cisco ",
    "Ubiquiti ",
    "Axis ",
    "Yealink ",
    "BrightSign ",
    "Fortinet ",
    "Meraki ",
    "EcoFlow ",
    "Liebert ",
    "Netgear ",
    "Netonix ",
];

/// Rendering parameters for one deployment icon, in canonical 25 × 30 units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IconLayoutConfig {
    /// Circle fill
    pub circle_color: Rgb,
    /// Circle stroke width
    pub circle_border_width: f64,
    /// Circle stroke colour
    pub circle_border_color: Rgb,

    /// Height of the label box at the top
    pub id_box_height: f64,
    /// Label box width as a fraction of the canvas width
    pub id_box_width_ratio: f64,
    /// Label box stroke width
    pub id_box_border_width: f64,
    /// Vertical nudge of the label box
    pub id_box_y_offset: f64,
    /// Hide the label box and its text
    pub no_id_box: bool,
    /// Label font size
    pub id_font_size: f64,

    /// Image size relative to the circle radius
    pub img_scale_ratio: f64,
    /// Horizontal image nudge
    pub img_x_offset: f64,
    /// Vertical image nudge
    pub img_y_offset: f64,
    /// Draw no gear image
    pub no_image: bool,
    /// Gear image path relative to the icon directory
    pub image_path: Option<String>,

    /// Brand line drawn near the top of the circle
    pub brand_text: String,
    /// Brand font size
    pub brand_font_size: f64,
    /// Horizontal brand nudge
    pub brand_x_offset: f64,
    /// Brand baseline offset from the top of the circle
    pub brand_y_offset: f64,

    /// Model font size
    pub model_font_size: f64,
    /// Horizontal model nudge
    pub model_x_offset: f64,
    /// Model baseline offset from the bottom of the circle
    pub model_y_offset: f64,
    /// Replaces the model text derived from the subject
    pub model_text_override: Option<String>,
    /// Uppercase the model text
    pub model_uppercase: bool,

    /// Base font (always rendered with Helvetica-Bold metrics)
    pub font_name: String,
    /// Brand and model text colour
    pub text_color: Rgb,
    /// Label colour; the circle colour when unset
    pub id_text_color: Option<Rgb>,

    /// Stacking order of image, brand and model text
    pub layer_order: Vec<String>,
    /// Equipment category
    pub category: Option<String>,
}

impl Default for IconLayoutConfig {
    fn default() -> Self {
        Self {
            circle_color: [0.22, 0.34, 0.65],
            circle_border_width: 0.75,
            circle_border_color: [0.0, 0.0, 0.0],
            id_box_height: 2.3,
            id_box_width_ratio: 0.41,
            id_box_border_width: 0.35,
            id_box_y_offset: 0.0,
            no_id_box: false,
            id_font_size: 3.9,
            img_scale_ratio: 0.70,
            img_x_offset: 0.0,
            img_y_offset: 0.0,
            no_image: false,
            image_path: None,
            brand_text: String::new(),
            brand_font_size: 1.8,
            brand_x_offset: -0.2,
            brand_y_offset: -3.2,
            model_font_size: 2.2,
            model_x_offset: -0.2,
            model_y_offset: 2.5,
            model_text_override: None,
            model_uppercase: false,
            font_name: "Helvetica-Bold".to_string(),
            text_color: [1.0, 1.0, 1.0],
            id_text_color: None,
            layer_order: DEFAULT_LAYER_ORDER.iter().map(|s| s.to_string()).collect(),
            category: None,
        }
    }
}

impl IconLayoutConfig {
    /// Model text for `subject`: the override when set, uppercased on demand.
    pub fn model_text(&self, subject: &str) -> String {
        let text = match self.model_text_override.as_deref() {
            Some(o) if !o.is_empty() => o.to_string(),
            _ => get_model_text(subject),
        };
        if self.model_uppercase {
            text.to_uppercase()
        } else {
            text
        }
    }

    /// Effective label colour.
    pub fn id_text_color(&self) -> Rgb {
        self.id_text_color.unwrap_or(self.circle_color)
    }

    /// Image path to load, unless images are disabled.
    pub fn gear_image(&self) -> Option<&str> {
        if self.no_image {
            return None;
        }
        self.image_path.as_deref().filter(|p| !p.is_empty())
    }
}

/// Model text derived from a deployment subject.
///
/// ```
/// use markup_swap::icon_config::get_model_text;
///
/// assert_eq!(get_model_text("AP - Cisco MR36H"), "MR36H");
/// assert_eq!(get_model_text("DIST - Mini NOC"), "Mini NOC");
/// assert_eq!(get_model_text("FIBER"), "FIBER");
/// ```
pub fn get_model_text(subject: &str) -> String {
    let Some(idx) = subject.rfind(" - ") else {
        return subject.to_string();
    };
    let model = &subject[idx + 3..];
    for brand in MODEL_BRANDS {
        if let Some(rest) = model.strip_prefix(brand) {
            return rest.to_string();
        }
    }
    model.to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
struct CatalogData {
    #[serde(default)]
    categories: IndexMap<String, String>,
    #[serde(default)]
    category_defaults: HashMap<String, Map<String, Value>>,
    #[serde(default)]
    icon_overrides: HashMap<String, Map<String, Value>>,
    #[serde(default)]
    image_paths: HashMap<String, Option<String>>,
    #[serde(default)]
    id_prefixes: HashMap<String, IdPrefixConfig>,
}

const BUILTIN_CATALOG: &str = include_str!("../data/icon_catalog.json");

/// Read-only icon configuration table.
#[derive(Debug, Clone, Default)]
pub struct IconCatalog {
    data: CatalogData,
    overrides: HashMap<String, IconLayoutConfig>,
}

impl IconCatalog {
    /// Catalog embedded in the crate.
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_CATALOG)
    }

    /// Parse a catalog document.
    pub fn from_json(text: &str) -> Result<Self> {
        let data: CatalogData = serde_json::from_str(text)?;
        log::debug!(
            "Icon catalog: {} subjects, {} categories, {} ID prefixes",
            data.categories.len(),
            data.category_defaults.len(),
            data.id_prefixes.len()
        );
        Ok(Self {
            data,
            overrides: HashMap::new(),
        })
    }

    /// Snapshot the entries of an override store on top of this catalog.
    pub fn with_override_store(mut self, store: &OverrideStore) -> Self {
        let file = store.load();
        log::debug!("Applying {} icon overrides from {}", file.icons.len(), store.path().display());
        self.overrides.extend(file.icons);
        self
    }

    /// Add or replace one complete icon configuration.
    pub fn with_icon(mut self, subject: impl Into<String>, config: IconLayoutConfig) -> Self {
        self.overrides.insert(subject.into(), config);
        self
    }

    /// Add or replace one ID prefix.
    pub fn with_id_prefix(mut self, subject: impl Into<String>, prefix: IdPrefixConfig) -> Self {
        self.data.id_prefixes.insert(subject.into(), prefix);
        self
    }

    /// Layout configuration for `subject`, if one exists.
    pub fn config_for(&self, subject: &str) -> Option<IconLayoutConfig> {
        if let Some(config) = self.overrides.get(subject) {
            return Some(config.clone());
        }
        self.base_config(subject)
    }

    /// Catalog configuration without the override store.
    pub fn base_config(&self, subject: &str) -> Option<IconLayoutConfig> {
        let category = self.data.categories.get(subject)?;

        let mut merged = self.data.category_defaults.get(category).cloned().unwrap_or_default();
        if let Some(overrides) = self.data.icon_overrides.get(subject) {
            merged.extend(overrides.clone());
        }
        let image_path = self.data.image_paths.get(subject).cloned().flatten();
        merged.insert("image_path".to_string(), image_path.map(Value::String).unwrap_or(Value::Null));
        merged.insert("category".to_string(), Value::String(category.clone()));

        match serde_json::from_value(Value::Object(merged)) {
            Ok(config) => Some(config),
            Err(e) => {
                log::warn!("Invalid catalog entry for '{}': {}", subject, e);
                None
            },
        }
    }

    /// Category defaults as a full configuration.
    pub fn category_defaults(&self, category: &str) -> Option<IconLayoutConfig> {
        let defaults = self.data.category_defaults.get(category)?.clone();
        let mut config: IconLayoutConfig = serde_json::from_value(Value::Object(defaults)).ok()?;
        config.category = Some(category.to_string());
        Some(config)
    }

    /// Category of a catalog subject.
    pub fn category(&self, subject: &str) -> Option<&str> {
        self.data.categories.get(subject).map(String::as_str)
    }

    /// Catalog subjects in definition order.
    pub fn subjects(&self) -> impl Iterator<Item = &str> {
        self.data.categories.keys().map(String::as_str)
    }

    /// Subject → ID prefix table.
    pub fn id_prefixes(&self) -> &HashMap<String, IdPrefixConfig> {
        &self.data.id_prefixes
    }
}

/// Bookkeeping block of the override file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideMeta {
    /// File format version
    pub version: u32,
    /// RFC 3339 time of the last save
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
}

impl Default for OverrideMeta {
    fn default() -> Self {
        Self {
            version: 1,
            last_modified: None,
        }
    }
}

/// Contents of the override file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverrideFile {
    /// Metadata
    #[serde(rename = "_meta", default)]
    pub meta: OverrideMeta,
    /// Complete configurations by subject
    #[serde(default)]
    pub icons: IndexMap<String, IconLayoutConfig>,
}

/// JSON file of hand-tuned icon configurations.
#[derive(Debug, Clone)]
pub struct OverrideStore {
    path: PathBuf,
}

impl OverrideStore {
    /// Store backed by `path`; the file need not exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the file. A missing or unreadable file yields an empty store.
    pub fn load(&self) -> OverrideFile {
        if !self.path.exists() {
            return OverrideFile::default();
        }
        let parsed = std::fs::read_to_string(&self.path)
            .map_err(Error::from)
            .and_then(|text| serde_json::from_str(&text).map_err(Error::from));
        match parsed {
            Ok(file) => file,
            Err(e) => {
                log::error!("Failed to load icon overrides from {}: {}", self.path.display(), e);
                OverrideFile::default()
            },
        }
    }

    /// Write the file atomically through a `.tmp` sibling.
    pub fn save(&self, data: &mut OverrideFile) -> Result<()> {
        data.meta = OverrideMeta {
            version: 1,
            last_modified: Some(chrono::Utc::now().to_rfc3339()),
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(data)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// One stored configuration.
    pub fn get_icon(&self, subject: &str) -> Option<IconLayoutConfig> {
        self.load().icons.shift_remove(subject)
    }

    /// Insert or replace a configuration.
    pub fn set_icon(&self, subject: &str, config: IconLayoutConfig) -> Result<()> {
        let mut data = self.load();
        data.icons.insert(subject.to_string(), config);
        self.save(&mut data)
    }

    /// Remove a configuration; returns whether it existed.
    pub fn delete_icon(&self, subject: &str) -> Result<bool> {
        let mut data = self.load();
        if data.icons.shift_remove(subject).is_none() {
            return Ok(false);
        }
        self.save(&mut data)?;
        Ok(true)
    }

    /// Stored subjects in file order.
    pub fn list_icons(&self) -> Vec<String> {
        self.load().icons.into_keys().collect()
    }

    /// Merge `partial` onto the current configuration of `subject`.
    ///
    /// The base is the stored entry, else the catalog entry, else the
    /// defaults of `partial["category"]` (or `Misc`). Null values in
    /// `partial` are ignored.
    pub fn build_full_config(
        &self,
        catalog: &IconCatalog,
        subject: &str,
        partial: &Map<String, Value>,
    ) -> Result<IconLayoutConfig> {
        let base = match self.get_icon(subject).or_else(|| catalog.base_config(subject)) {
            Some(config) => config,
            None => {
                let category = partial.get("category").and_then(Value::as_str).unwrap_or("Misc");
                let mut config = catalog
                    .category_defaults(category)
                    .or_else(|| catalog.category_defaults("Misc"))
                    .unwrap_or_default();
                config.category = Some(category.to_string());
                config.image_path = None;
                config
            },
        };

        let mut merged = match serde_json::to_value(base)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        for (key, value) in partial {
            if !value.is_null() {
                merged.insert(key.clone(), value.clone());
            }
        }
        Ok(serde_json::from_value(Value::Object(merged))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_text() {
        assert_eq!(get_model_text("AP - Cisco MR36H"), "MR36H");
        assert_eq!(get_model_text("HL - Artist"), "Artist");
        assert_eq!(get_model_text("P2P - Ubiquiti NanoBeam"), "NanoBeam");
        assert_eq!(get_model_text("SW - IDF Cisco 9300 24X"), "IDF Cisco 9300 24X");
        assert_eq!(get_model_text("A - B - Meraki MT15"), "MT15");
        assert_eq!(get_model_text("HL -"), "HL -");
    }

    #[test]
    fn test_model_text_override_and_uppercase() {
        let config = IconLayoutConfig {
            model_text_override: Some("GENERAL\nINTERNET".to_string()),
            ..Default::default()
        };
        assert_eq!(config.model_text("HL - General Internet"), "GENERAL\nINTERNET");

        let config = IconLayoutConfig {
            model_uppercase: true,
            model_text_override: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(config.model_text("HL - Artist"), "ARTIST");
    }

    #[test]
    fn test_builtin_catalog_merges_overrides() {
        let catalog = IconCatalog::builtin().unwrap();
        let config = catalog.config_for("AP - Cisco MR36H").unwrap();
        assert_eq!(config.category.as_deref(), Some("APs"));
        assert_eq!(config.brand_text, "CISCO");
        assert_eq!(config.img_scale_ratio, 0.64);
        assert_eq!(config.model_x_offset, -1.0);
        assert_eq!(config.circle_color, [0.2157, 0.3412, 0.6431]);
        assert_eq!(config.image_path.as_deref(), Some("APs/AP - Cisco MR36H.png"));
        assert_eq!(config.layer_order, DEFAULT_LAYER_ORDER);
    }

    #[test]
    fn test_builtin_catalog_no_image_categories() {
        let catalog = IconCatalog::builtin().unwrap();
        let fiber = catalog.config_for("FIBER").unwrap();
        assert!(fiber.no_image);
        assert!(fiber.gear_image().is_none());
        assert!(catalog.config_for("Not A Subject").is_none());
    }

    #[test]
    fn test_builtin_id_prefixes() {
        let catalog = IconCatalog::builtin().unwrap();
        let p = &catalog.id_prefixes()["CCTV - Cisco MV93X"];
        assert_eq!(p.prefix, "a");
        assert_eq!(p.format, crate::ids::IdFormat::NumberFirst);
        assert_eq!(catalog.id_prefixes()["SW - Cisco 9500 48Y4C"].start, 900);
    }

    #[test]
    fn test_with_icon_replaces_whole_config() {
        let custom = IconLayoutConfig {
            brand_text: "CUSTOM".to_string(),
            ..Default::default()
        };
        let catalog = IconCatalog::builtin().unwrap().with_icon("AP - Cisco MR36H", custom.clone());
        assert_eq!(catalog.config_for("AP - Cisco MR36H"), Some(custom));
        assert_eq!(catalog.base_config("AP - Cisco MR36H").unwrap().brand_text, "CISCO");
    }

    #[test]
    fn test_id_text_color_falls_back_to_circle() {
        let config = IconLayoutConfig::default();
        assert_eq!(config.id_text_color(), config.circle_color);
    }

    #[test]
    fn test_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = OverrideStore::new(dir.path().join("nested").join("icon_overrides.json"));
        assert!(store.list_icons().is_empty());
        assert!(store.get_icon("X").is_none());

        let config = IconLayoutConfig {
            brand_text: "ACME".to_string(),
            ..Default::default()
        };
        store.set_icon("X - Acme Box", config.clone()).unwrap();
        assert_eq!(store.get_icon("X - Acme Box"), Some(config));
        assert_eq!(store.list_icons(), vec!["X - Acme Box".to_string()]);
        assert!(!dir.path().join("nested").join("icon_overrides.tmp").exists());

        let raw: Value = serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["_meta"]["version"], 1);
        assert!(raw["_meta"]["last_modified"].is_string());

        assert!(store.delete_icon("X - Acme Box").unwrap());
        assert!(!store.delete_icon("X - Acme Box").unwrap());
    }

    #[test]
    fn test_store_corrupt_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overrides.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(OverrideStore::new(&path).load().icons.is_empty());
    }

    #[test]
    fn test_catalog_uses_store_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = OverrideStore::new(dir.path().join("overrides.json"));
        let tuned = IconLayoutConfig {
            img_scale_ratio: 0.5,
            ..Default::default()
        };
        store.set_icon("HL - Artist", tuned.clone()).unwrap();
        let catalog = IconCatalog::builtin().unwrap().with_override_store(&store);
        assert_eq!(catalog.config_for("HL - Artist"), Some(tuned));
    }

    #[test]
    fn test_build_full_config() {
        let dir = tempfile::tempdir().unwrap();
        let store = OverrideStore::new(dir.path().join("overrides.json"));
        let catalog = IconCatalog::builtin().unwrap();

        let mut partial = Map::new();
        partial.insert("brand_text".to_string(), Value::String("MERAKI".to_string()));
        partial.insert("img_x_offset".to_string(), Value::Null);
        let config = store.build_full_config(&catalog, "AP - Cisco MR36H", &partial).unwrap();
        assert_eq!(config.brand_text, "MERAKI");
        assert_eq!(config.img_scale_ratio, 0.64);

        let mut partial = Map::new();
        partial.insert("category".to_string(), Value::String("Power".to_string()));
        let config = store.build_full_config(&catalog, "PWR - New Thing", &partial).unwrap();
        assert_eq!(config.category.as_deref(), Some("Power"));
        assert_eq!(config.circle_color, [0.4, 0.25, 0.1]);
        assert!(config.image_path.is_none());
    }
}
