//! JSON datasets of OSM nodes, ways and relations.
//!
//! A dataset is one JSON object:
//!
//! ```json
//! {
//!   "source": "osm",
//!   "nodes": [{ "id": 1, "tags": { "railway": "station" }, "geometry": { "type": "Point", "coordinates": [0.0, 0.0] } }],
//!   "ways": [{ "id": 2, "tags": {}, "nodes": [1], "geometry": { "type": "LineString", "coordinates": [[0.0, 0.0], [1.0, 1.0]] } }],
//!   "relations": [{ "id": 3, "tags": ["type", "route"], "parts": [2], "way_off": 0, "rel_off": 1 }],
//!   "features": []
//! }
//! ```
//!
//! Geometries are `GeoJSON` in spherical mercator (EPSG:3857) metres.
//! `features` holds extra table rows that are not part of the OSM graph,
//! such as synthetic features with negative IDs.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use osm_tiles_feature_models::{Feature, OsmId, ShapeType, tags_to_properties};
use osm_tiles_fetch::FeatureSource;
use osm_tiles_relation::{OsmGraph, RawRelation};
use serde::Deserialize;

/// Errors loading a dataset.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    /// The dataset file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Dataset path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },
    /// The dataset is not valid JSON for the expected shape.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// A geometry could not be converted.
    #[error("invalid geometry for {id}: {source}")]
    Geometry {
        /// ID of the offending record
        id: OsmId,
        /// Conversion failure
        source: Box<geojson::Error>,
    },
}

#[derive(Debug, Deserialize)]
struct FeatureRecord {
    id: OsmId,
    #[serde(default)]
    tags: BTreeMap<String, String>,
    geometry: geojson::Geometry,
}

impl FeatureRecord {
    fn into_feature(self) -> Result<Feature, DatasetError> {
        let id = self.id;
        let geometry: geo::Geometry<f64> =
            self.geometry
                .try_into()
                .map_err(|source| DatasetError::Geometry {
                    id,
                    source: Box::new(source),
                })?;
        let properties =
            tags_to_properties(self.tags.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        Ok(Feature::new(id, geometry, properties))
    }
}

#[derive(Debug, Deserialize)]
struct WayRecord {
    #[serde(flatten)]
    feature: FeatureRecord,
    #[serde(default)]
    nodes: Vec<OsmId>,
}

#[derive(Debug, Deserialize)]
struct DatasetFile {
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    nodes: Vec<FeatureRecord>,
    #[serde(default)]
    ways: Vec<WayRecord>,
    #[serde(default)]
    relations: Vec<RawRelation>,
    #[serde(default)]
    features: Vec<FeatureRecord>,
}

/// Every feature of a dataset, served as shape tables.
#[derive(Debug)]
pub struct DatasetSource {
    name: Option<String>,
    features: Vec<Feature>,
}

impl DatasetSource {
    #[must_use]
    pub fn feature_count(&self) -> usize {
        self.features.len()
    }
}

impl FeatureSource for DatasetSource {
    fn features(&self, shape_type: ShapeType) -> Vec<Feature> {
        self.features
            .iter()
            .filter(|f| f.shape_type() == Some(shape_type))
            .cloned()
            .collect()
    }

    fn source_name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// Parses a dataset into its feature tables and OSM graph.
///
/// # Errors
///
/// * If the JSON does not match the dataset shape
/// * If a geometry cannot be converted
pub fn parse(json: &str) -> Result<(DatasetSource, OsmGraph), DatasetError> {
    let file: DatasetFile = serde_json::from_str(json)?;

    let mut builder = OsmGraph::builder();
    let mut features =
        Vec::with_capacity(file.nodes.len() + file.ways.len() + file.features.len());

    for record in file.nodes {
        let feature = record.into_feature()?;
        builder.add_node(feature.clone());
        features.push(feature);
    }
    for record in file.ways {
        let feature = record.feature.into_feature()?;
        builder.add_way(feature.clone(), record.nodes);
        features.push(feature);
    }
    for raw in &file.relations {
        builder.add_relation(raw);
    }
    for record in file.features {
        features.push(record.into_feature()?);
    }

    Ok((
        DatasetSource {
            name: file.source,
            features,
        },
        builder.build(),
    ))
}

/// Reads and parses a dataset file.
///
/// # Errors
///
/// * If the file cannot be read
/// * If its contents fail to [`parse`]
pub fn load(path: &Path) -> Result<(DatasetSource, OsmGraph), DatasetError> {
    let json = std::fs::read_to_string(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let (source, graph) = parse(&json)?;
    log::info!(
        "Loaded {} features and {} relations from {}",
        source.feature_count(),
        graph.relation_count(),
        path.display()
    );
    Ok((source, graph))
}
