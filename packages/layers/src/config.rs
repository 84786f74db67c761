//! Layer definitions loaded from TOML.
//!
//! Each output layer is described by a file under `layers/`: its name,
//! which feature tables feed it, and the minimum zoom at which a feature
//! appears in it. The default set is embedded at compile time; a
//! directory of overrides can be loaded with [`load_layers`].
//!
//! ```toml
//! name = "pois"
//! shape_types = ["point", "polygon"]
//!
//! [min_zoom]
//! default = 16.0
//!
//! [[min_zoom.rules]]
//! key = "railway"
//! value = "station"
//! zoom = 10.0
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use osm_tiles_feature_models::{Feature, ShapeType};
use serde::Deserialize;

/// Context about where a feature came from, available to min zoom rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayerMetadata {
    /// Name of the data source the feature was read from, if known.
    pub source: Option<String>,
}

/// One output layer.
#[derive(Debug, Clone, Deserialize)]
pub struct LayerSpec {
    /// Layer name as it appears in output rows (`__{name}_properties__`).
    pub name: String,
    /// Shape types this layer takes features from. `None` allows all.
    #[serde(default)]
    pub shape_types: Option<BTreeSet<ShapeType>>,
    /// Minimum zoom predicate.
    #[serde(default)]
    pub min_zoom: MinZoom,
}

impl LayerSpec {
    /// Whether features of this shape type feed the layer.
    #[must_use]
    pub fn allows_shape_type(&self, shape_type: ShapeType) -> bool {
        self.shape_types
            .as_ref()
            .is_none_or(|allowed| allowed.contains(&shape_type))
    }

    /// Minimum zoom at which the feature appears in this layer, or `None`
    /// if it never does.
    #[must_use]
    pub fn min_zoom(&self, feature: &Feature, meta: &LayerMetadata) -> Option<f64> {
        self.min_zoom.evaluate(feature, meta)
    }
}

/// Minimum zoom rules: the first matching rule wins, then the default.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MinZoom {
    /// Zoom for features matching no rule. `None` excludes them.
    #[serde(default)]
    pub default: Option<f64>,
    /// Rules in priority order.
    #[serde(default)]
    pub rules: Vec<MinZoomRule>,
}

impl MinZoom {
    fn evaluate(&self, feature: &Feature, meta: &LayerMetadata) -> Option<f64> {
        self.rules
            .iter()
            .find(|rule| rule.matches(feature, meta))
            .map(|rule| rule.zoom)
            .or(self.default)
    }
}

/// Assigns a zoom to features carrying a tag.
#[derive(Debug, Clone, Deserialize)]
pub struct MinZoomRule {
    /// Tag key that must be present.
    pub key: String,
    /// Required tag value. Any value matches when absent.
    #[serde(default)]
    pub value: Option<String>,
    /// Required data source.
    #[serde(default)]
    pub source: Option<String>,
    /// Required shape type.
    #[serde(default)]
    pub shape_type: Option<ShapeType>,
    /// Zoom assigned on match.
    pub zoom: f64,
}

impl MinZoomRule {
    fn matches(&self, feature: &Feature, meta: &LayerMetadata) -> bool {
        let Some(actual) = feature.tag(&self.key) else {
            return false;
        };
        self.value.as_deref().is_none_or(|v| v == actual)
            && self
                .source
                .as_deref()
                .is_none_or(|s| meta.source.as_deref() == Some(s))
            && self
                .shape_type
                .is_none_or(|s| feature.shape_type() == Some(s))
    }
}

/// Errors loading layer definitions.
#[derive(Debug, thiserror::Error)]
pub enum LayerConfigError {
    /// A layer file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File or directory that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A layer file is not valid TOML for a [`LayerSpec`].
    #[error("failed to parse layer {name}: {source}")]
    Parse {
        /// File name or embedded layer name.
        name: String,
        /// Underlying error.
        source: toml::de::Error,
    },

    /// Two layers share a name.
    #[error("duplicate layer name {0}")]
    Duplicate(String),
}

// ── Compile-time embedded TOML files ────────────────────────────────

const LAYER_TOMLS: &[(&str, &str)] = &[
    ("boundaries", include_str!("../layers/boundaries.toml")),
    ("buildings", include_str!("../layers/buildings.toml")),
    ("earth", include_str!("../layers/earth.toml")),
    ("landuse", include_str!("../layers/landuse.toml")),
    ("places", include_str!("../layers/places.toml")),
    ("pois", include_str!("../layers/pois.toml")),
    ("roads", include_str!("../layers/roads.toml")),
    ("transit", include_str!("../layers/transit.toml")),
    ("water", include_str!("../layers/water.toml")),
];

#[cfg(test)]
const EXPECTED_LAYER_COUNT: usize = 9;

/// Parses a single layer definition.
///
/// # Errors
///
/// Returns [`LayerConfigError::Parse`] if the TOML is malformed.
pub fn parse_layer(name: &str, toml_str: &str) -> Result<LayerSpec, LayerConfigError> {
    toml::de::from_str(toml_str).map_err(|source| LayerConfigError::Parse {
        name: name.to_string(),
        source,
    })
}

/// Returns the built-in layer definitions, in name order.
///
/// # Panics
///
/// Panics if any embedded TOML config is malformed (this is a compile-time
/// guarantee since the configs are embedded and covered by tests).
#[must_use]
pub fn all_layers() -> Vec<LayerSpec> {
    LAYER_TOMLS
        .iter()
        .map(|(name, toml_str)| {
            parse_layer(name, toml_str).unwrap_or_else(|e| panic!("Embedded layer broken: {e}"))
        })
        .collect()
}

/// Loads every `*.toml` file in a directory as a layer, in file name order.
///
/// # Errors
///
/// Returns an error if the directory or a file cannot be read, a file
/// does not parse, or two files define the same layer name.
pub fn load_layers(dir: &Path) -> Result<Vec<LayerSpec>, LayerConfigError> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| LayerConfigError::Io { path, source }
    };

    let mut paths = std::fs::read_dir(dir)
        .map_err(io_err(dir))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_err(dir))?;
    paths.retain(|p| p.extension().is_some_and(|ext| ext == "toml"));
    paths.sort();

    let mut names = BTreeSet::new();
    let mut layers = Vec::with_capacity(paths.len());
    for path in paths {
        let contents = std::fs::read_to_string(&path).map_err(io_err(&path))?;
        let layer = parse_layer(&path.display().to_string(), &contents)?;
        if !names.insert(layer.name.clone()) {
            return Err(LayerConfigError::Duplicate(layer.name));
        }
        layers.push(layer);
    }

    log::info!("Loaded {} layers from {}", layers.len(), dir.display());
    Ok(layers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Geometry, Point};
    use osm_tiles_feature_models::tags_to_properties;

    fn point(tags: &[(&str, &str)]) -> Feature {
        Feature::new(
            1,
            Geometry::Point(Point::new(0.0, 0.0)),
            tags_to_properties(tags.iter().copied()),
        )
    }

    #[test]
    fn loads_all_layers() {
        assert_eq!(all_layers().len(), EXPECTED_LAYER_COUNT);
    }

    #[test]
    fn layer_names_are_unique_and_match_files() {
        let mut seen = BTreeSet::new();
        for (file, layer) in LAYER_TOMLS.iter().zip(all_layers()) {
            assert_eq!(file.0, layer.name, "Layer file {} defines {}", file.0, layer.name);
            assert!(seen.insert(layer.name.clone()), "Duplicate layer: {}", layer.name);
        }
    }

    #[test]
    fn first_matching_rule_wins() {
        let layer = parse_layer(
            "test",
            r#"
            name = "test"

            [min_zoom]
            default = 16.0

            [[min_zoom.rules]]
            key = "railway"
            value = "station"
            zoom = 10.0

            [[min_zoom.rules]]
            key = "railway"
            zoom = 13.0
            "#,
        )
        .unwrap();
        let meta = LayerMetadata::default();

        assert_eq!(layer.min_zoom(&point(&[("railway", "station")]), &meta), Some(10.0));
        assert_eq!(layer.min_zoom(&point(&[("railway", "halt")]), &meta), Some(13.0));
        assert_eq!(layer.min_zoom(&point(&[("shop", "bakery")]), &meta), Some(16.0));
    }

    #[test]
    fn no_default_excludes_unmatched_features() {
        let layer = parse_layer(
            "water",
            r#"
            name = "water"
            shape_types = ["polygon"]

            [[min_zoom.rules]]
            key = "natural"
            value = "water"
            source = "osm"
            zoom = 9.0
            "#,
        )
        .unwrap();

        let lake = point(&[("natural", "water")]);
        let osm = LayerMetadata {
            source: Some("osm".to_string()),
        };
        assert_eq!(layer.min_zoom(&lake, &osm), Some(9.0));
        assert_eq!(layer.min_zoom(&lake, &LayerMetadata::default()), None);
        assert!(layer.allows_shape_type(ShapeType::Polygon));
        assert!(!layer.allows_shape_type(ShapeType::Point));
    }

    #[test]
    fn missing_shape_types_allow_everything() {
        let layer = parse_layer("any", r#"name = "any""#).unwrap();
        for shape in ShapeType::ALL {
            assert!(layer.allows_shape_type(shape));
        }
    }

    #[test]
    fn malformed_layer_is_parse_error() {
        let err = parse_layer("bad", r#"name = 3"#).unwrap_err();
        assert!(matches!(err, LayerConfigError::Parse { .. }));
    }
}
