//! R-tree index of one layer's features over a tile pyramid.

use geo::{BoundingRect, Rect};
use osm_tiles_feature_models::Feature;
use osm_tiles_tile::{TileCoord, TilePyramid};
use rstar::{AABB, Envelope, RTree, RTreeObject};

/// A feature stored in the R-tree with its min zoom.
struct IndexedFeature {
    slot: usize,
    min_zoom: f64,
    envelope: AABB<[f64; 2]>,
    feature: Feature,
}

impl RTreeObject for IndexedFeature {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

fn rect_envelope(rect: Rect<f64>) -> AABB<[f64; 2]> {
    AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y])
}

/// Features of one layer that fall inside a tile pyramid.
///
/// Each feature keeps a slot number unique within the index, so callers
/// scanning several tiles can tell when a feature comes back more than
/// once.
pub struct FeatureTileIndex {
    tree: RTree<IndexedFeature>,
}

impl FeatureTileIndex {
    /// Builds the index from `(feature, min_zoom)` pairs.
    ///
    /// Features without a bounding box (empty geometries) or outside the
    /// pyramid's root tile are skipped.
    #[must_use]
    pub fn build(pyramid: TilePyramid, features: impl IntoIterator<Item = (Feature, f64)>) -> Self {
        let pyramid_envelope = rect_envelope(pyramid.bounds());

        let entries: Vec<IndexedFeature> = features
            .into_iter()
            .filter_map(|(feature, min_zoom)| {
                let envelope = rect_envelope(feature.geometry.bounding_rect()?);
                pyramid_envelope
                    .intersects(&envelope)
                    .then_some((feature, min_zoom, envelope))
            })
            .enumerate()
            .map(|(slot, (feature, min_zoom, envelope))| IndexedFeature {
                slot,
                min_zoom,
                envelope,
                feature,
            })
            .collect();

        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Features visible at the tile's zoom whose bounding box touches the
    /// tile, with their slot numbers.
    pub fn query(&self, tile: TileCoord) -> impl Iterator<Item = (usize, &Feature)> {
        let zoom = f64::from(tile.z);
        self.tree
            .locate_in_envelope_intersecting(&rect_envelope(tile.bounds()))
            .filter(move |entry| entry.min_zoom <= zoom)
            .map(|entry| (entry.slot, &entry.feature))
    }

    /// Number of indexed features.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Whether no feature was indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}
