#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Tile data fetching.
//!
//! A [`DataFetcher`] owns one [`FeatureTileIndex`] per configured layer, all
//! built over the same [`TilePyramid`]. [`DataFetcher::fetch`] scans the
//! tiles covering a bounding box, keeps features that really touch the box,
//! derives their layer properties and returns one [`ReadRow`] per
//! `(feature, layer)` pair.

pub mod index;

use std::collections::{BTreeMap, BTreeSet};

use geo::{Intersects, Rect};
use geozero::{CoordDimensions, ToWkb};
use osm_tiles_feature_models::{Feature, OsmId, Properties, ShapeType};
use osm_tiles_layers::{LayerMetadata, LayerSpec, layer_properties};
use osm_tiles_relation::RelationGraphLookup;
use osm_tiles_tile::{TileCoord, TilePyramid, TileRange};
use serde::ser::{Serialize, SerializeMap, Serializer};

pub use index::FeatureTileIndex;

/// Errors fetching rows.
///
/// None of these are transient: retrying the same request fails the same
/// way. All but [`FetchError::Geometry`] are requests outside what the
/// fetcher was built for.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Query zoom is outside `[pyramid.z, pyramid.max_z]`.
    #[error("zoom {zoom} outside index range {min_zoom}..={max_zoom}")]
    ZoomOutOfRange {
        /// Requested zoom
        zoom: u8,
        /// Root zoom of the pyramid
        min_zoom: u8,
        /// Deepest zoom of the pyramid
        max_zoom: u8,
    },
    /// Query box is not contained in the pyramid's root tile.
    #[error("bounds {bounds:?} not inside index bounds {index_bounds:?}")]
    BoundsOutsidePyramid {
        /// Requested bounds
        bounds: Rect<f64>,
        /// Bounds of the pyramid's root tile
        index_bounds: Rect<f64>,
    },
    /// No layer with this name is configured.
    #[error("unknown layer '{0}'")]
    UnknownLayer(String),
    /// A feature geometry could not be encoded as WKB.
    #[error("failed to encode geometry of feature {id}: {source}")]
    Geometry {
        /// Feature ID
        id: OsmId,
        /// Encoder error
        source: geozero::error::GeozeroError,
    },
}

/// Where features come from when building the indexes.
///
/// One table per [`ShapeType`], like the `planet_osm_point`, `_line` and
/// `_polygon` tables of an osm2pgsql import.
pub trait FeatureSource {
    /// All features of one shape table.
    fn features(&self, shape_type: ShapeType) -> Vec<Feature>;

    /// Name of the source, handed to min zoom rules.
    fn source_name(&self) -> Option<&str> {
        None
    }
}

/// One feature emitted into one layer.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadRow {
    pub id: OsmId,
    pub layer: String,
    /// Geometry as little-endian WKB.
    pub geometry: Vec<u8>,
    pub properties: Properties,
}

impl ReadRow {
    /// Key the properties are written under, `__{layer}_properties__`.
    #[must_use]
    pub fn properties_key(&self) -> String {
        format!("__{}_properties__", self.layer)
    }
}

impl Serialize for ReadRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("__id__", &self.id)?;
        map.serialize_entry("__geometry__", &hex::encode(&self.geometry))?;
        map.serialize_entry(&self.properties_key(), &self.properties)?;
        map.end()
    }
}

/// Fetches rows for bounding boxes inside a pre-built tile pyramid.
pub struct DataFetcher<L> {
    pyramid: TilePyramid,
    layers: BTreeMap<String, FeatureTileIndex>,
    osm: L,
}

impl<L: RelationGraphLookup> DataFetcher<L> {
    /// Builds an index for every layer from the source's shape tables.
    ///
    /// Each shape table is read once, and only when some layer takes
    /// features of that shape.
    pub fn new(
        layers: &[LayerSpec],
        source: &impl FeatureSource,
        pyramid: TilePyramid,
        osm: L,
    ) -> Self {
        let meta = LayerMetadata {
            source: source.source_name().map(ToString::to_string),
        };

        let tables: BTreeMap<ShapeType, Vec<Feature>> = ShapeType::ALL
            .into_iter()
            .filter(|&shape| layers.iter().any(|layer| layer.allows_shape_type(shape)))
            .map(|shape| (shape, source.features(shape)))
            .collect();

        let indexes = layers
            .iter()
            .map(|layer| {
                let features = tables
                    .iter()
                    .filter(|(shape, _)| layer.allows_shape_type(**shape))
                    .flat_map(|(_, features)| features)
                    .filter_map(|feature| {
                        layer
                            .min_zoom(feature, &meta)
                            .map(|min_zoom| (feature.clone(), min_zoom))
                    });
                let index = FeatureTileIndex::build(pyramid, features);
                log::info!(
                    "Indexed {} features for layer '{}' in pyramid {}",
                    index.len(),
                    layer.name,
                    pyramid.tile(),
                );
                (layer.name.clone(), index)
            })
            .collect();

        Self {
            pyramid,
            layers: indexes,
            osm,
        }
    }

    /// The pyramid this fetcher covers.
    #[must_use]
    pub const fn pyramid(&self) -> TilePyramid {
        self.pyramid
    }

    /// Names of the configured layers.
    pub fn layer_names(&self) -> impl Iterator<Item = &str> {
        self.layers.keys().map(String::as_str)
    }

    /// Features of one layer returned by a single tile.
    ///
    /// # Errors
    ///
    /// * If no layer named `layer` is configured
    pub fn query(&self, layer: &str, tile: TileCoord) -> Result<Vec<&Feature>, FetchError> {
        let index = self
            .layers
            .get(layer)
            .ok_or_else(|| FetchError::UnknownLayer(layer.to_string()))?;
        Ok(index.query(tile).map(|(_, feature)| feature).collect())
    }

    /// Rows for every feature touching `unpadded_bounds` at `zoom`.
    ///
    /// A feature found in several tiles of the scan is emitted once per
    /// layer. Rows come out grouped by layer name.
    ///
    /// # Errors
    ///
    /// * If `zoom` is outside the pyramid's zoom range
    /// * If `unpadded_bounds` is not inside the pyramid's root tile
    /// * If a feature geometry cannot be encoded
    pub fn fetch(&self, zoom: u8, unpadded_bounds: Rect<f64>) -> Result<Vec<ReadRow>, FetchError> {
        self.check_coverage(zoom, unpadded_bounds)?;

        let range = TileRange::covering(zoom, unpadded_bounds);
        log::debug!(
            "Fetching z{zoom} x {}..={} y {}..={} ({} tiles)",
            range.min_x,
            range.max_x,
            range.min_y,
            range.max_y,
            range.len(),
        );

        let mut rows = Vec::new();
        for (layer, index) in &self.layers {
            let mut seen = BTreeSet::new();
            for tile in range.tiles() {
                for (slot, feature) in index.query(tile) {
                    if !seen.insert(slot) || !feature.geometry.intersects(&unpadded_bounds) {
                        continue;
                    }
                    let geometry = feature
                        .geometry
                        .to_wkb(CoordDimensions::xy())
                        .map_err(|source| FetchError::Geometry {
                            id: feature.id,
                            source,
                        })?;
                    rows.push(ReadRow {
                        id: feature.id,
                        layer: layer.clone(),
                        geometry,
                        properties: layer_properties(feature, layer, zoom, &self.osm),
                    });
                }
            }
        }

        Ok(rows)
    }

    fn check_coverage(&self, zoom: u8, bounds: Rect<f64>) -> Result<(), FetchError> {
        if zoom < self.pyramid.z || zoom > self.pyramid.max_z {
            return Err(FetchError::ZoomOutOfRange {
                zoom,
                min_zoom: self.pyramid.z,
                max_zoom: self.pyramid.max_z,
            });
        }

        let index_bounds = self.pyramid.bounds();
        let inside = bounds.min().x >= index_bounds.min().x
            && bounds.min().y >= index_bounds.min().y
            && bounds.max().x <= index_bounds.max().x
            && bounds.max().y <= index_bounds.max().y;
        if !inside {
            return Err(FetchError::BoundsOutsidePyramid {
                bounds,
                index_bounds,
            });
        }

        Ok(())
    }
}
