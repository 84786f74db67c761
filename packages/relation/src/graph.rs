//! In-memory relation graph with reverse membership indexes.
//!
//! Built once from the node, way and relation tables covering a tile
//! pyramid, then shared read-only by every fetch against that pyramid.

use std::collections::{BTreeMap, BTreeSet};

use osm_tiles_feature_models::{Feature, OsmId};

use crate::{RawRelation, Relation, RelationGraphLookup};

type Edges = BTreeMap<OsmId, BTreeSet<OsmId>>;

/// Accumulates raw rows and builds an [`OsmGraph`].
#[derive(Debug, Default)]
pub struct OsmGraphBuilder {
    nodes: BTreeMap<OsmId, Feature>,
    ways: BTreeMap<OsmId, Feature>,
    way_nodes: BTreeMap<OsmId, Vec<OsmId>>,
    relations: BTreeMap<OsmId, Relation>,
    dropped_relations: usize,
}

impl OsmGraphBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the feature generated from a node.
    pub fn add_node(&mut self, feature: Feature) -> &mut Self {
        self.nodes.insert(feature.id, feature);
        self
    }

    /// Adds the feature generated from a way along with the way's node list.
    pub fn add_way(&mut self, feature: Feature, node_ids: Vec<OsmId>) -> &mut Self {
        self.way_nodes.insert(feature.id, node_ids);
        self.ways.insert(feature.id, feature);
        self
    }

    /// Decodes and adds a relation row.
    ///
    /// Rows that fail to decode are logged with the raw record and dropped;
    /// the rest of the graph is unaffected.
    pub fn add_relation(&mut self, raw: &RawRelation) -> &mut Self {
        match Relation::from_raw(raw) {
            Ok(rel) => {
                self.relations.insert(rel.id, rel);
            }
            Err(e) => {
                log::error!("Dropping relation {}: {e}: {raw:?}", raw.id);
                self.dropped_relations += 1;
            }
        }
        self
    }

    /// Builds the reverse membership indexes.
    #[must_use]
    pub fn build(self) -> OsmGraph {
        let mut rels_by_node = Edges::new();
        let mut rels_by_way = Edges::new();
        let mut rels_by_rel = Edges::new();
        let mut ways_by_node = Edges::new();

        for rel in self.relations.values() {
            for &node_id in &rel.node_ids {
                rels_by_node.entry(node_id).or_default().insert(rel.id);
            }
            for &way_id in &rel.way_ids {
                rels_by_way.entry(way_id).or_default().insert(rel.id);
            }
            for &child_id in &rel.rel_ids {
                rels_by_rel.entry(child_id).or_default().insert(rel.id);
            }
        }

        for (&way_id, node_ids) in &self.way_nodes {
            for &node_id in node_ids {
                ways_by_node.entry(node_id).or_default().insert(way_id);
            }
        }

        log::info!(
            "Built OSM graph: {} nodes, {} ways, {} relations ({} dropped)",
            self.nodes.len(),
            self.ways.len(),
            self.relations.len(),
            self.dropped_relations,
        );

        OsmGraph {
            nodes: self.nodes,
            ways: self.ways,
            relations: self.relations,
            rels_by_node,
            rels_by_way,
            rels_by_rel,
            ways_by_node,
        }
    }
}

/// Relation graph over nodes, ways and relations held in memory.
#[derive(Debug, Default)]
pub struct OsmGraph {
    nodes: BTreeMap<OsmId, Feature>,
    ways: BTreeMap<OsmId, Feature>,
    relations: BTreeMap<OsmId, Relation>,
    rels_by_node: Edges,
    rels_by_way: Edges,
    rels_by_rel: Edges,
    ways_by_node: Edges,
}

impl OsmGraph {
    /// Starts a new graph.
    #[must_use]
    pub fn builder() -> OsmGraphBuilder {
        OsmGraphBuilder::new()
    }

    /// Number of relations in the graph.
    #[must_use]
    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }
}

fn edges(map: &Edges, id: OsmId) -> BTreeSet<OsmId> {
    map.get(&id).cloned().unwrap_or_default()
}

impl RelationGraphLookup for OsmGraph {
    fn relations_using_node(&self, node_id: OsmId) -> BTreeSet<OsmId> {
        edges(&self.rels_by_node, node_id)
    }

    fn relations_using_way(&self, way_id: OsmId) -> BTreeSet<OsmId> {
        edges(&self.rels_by_way, way_id)
    }

    fn relations_using_rel(&self, rel_id: OsmId) -> BTreeSet<OsmId> {
        edges(&self.rels_by_rel, rel_id)
    }

    fn ways_using_node(&self, node_id: OsmId) -> BTreeSet<OsmId> {
        edges(&self.ways_by_node, node_id)
    }

    fn relation(&self, rel_id: OsmId) -> Option<Relation> {
        let rel = self.relations.get(&rel_id);
        if rel.is_none() {
            log::debug!("Relation {rel_id} referenced but not in graph");
        }
        rel.cloned()
    }

    fn way(&self, way_id: OsmId) -> Option<Feature> {
        self.ways.get(&way_id).cloned()
    }

    fn node(&self, node_id: OsmId) -> Option<Feature> {
        self.nodes.get(&node_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Geometry, LineString, Point};
    use osm_tiles_feature_models::tags_to_properties;

    fn raw(
        id: OsmId,
        tags: &[&str],
        parts: &[OsmId],
        way_off: usize,
        rel_off: usize,
    ) -> RawRelation {
        RawRelation {
            id,
            tags: tags.iter().map(|t| (*t).to_string()).collect(),
            parts: parts.to_vec(),
            way_off,
            rel_off,
        }
    }

    fn sample_graph() -> OsmGraph {
        let mut builder = OsmGraph::builder();
        builder
            .add_node(Feature::new(
                1,
                Geometry::Point(Point::new(0.0, 0.0)),
                tags_to_properties([("railway", "station")]),
            ))
            .add_way(
                Feature::new(
                    10,
                    Geometry::LineString(LineString::from(vec![(0.0, 0.0), (1.0, 0.0)])),
                    tags_to_properties([("railway", "rail")]),
                ),
                vec![1, 2],
            )
            .add_relation(&raw(100, &["public_transport", "stop_area"], &[1, 10], 1, 2))
            .add_relation(&raw(200, &["type", "site"], &[100], 0, 0))
            .add_relation(&raw(300, &["type", "route", "route", "train"], &[10, 100], 0, 1))
            .add_relation(&raw(400, &["broken"], &[], 0, 0));
        builder.build()
    }

    #[test]
    fn indexes_reverse_membership() {
        let graph = sample_graph();
        assert_eq!(graph.relations_using_node(1), BTreeSet::from([100]));
        assert_eq!(graph.relations_using_way(10), BTreeSet::from([100, 300]));
        assert_eq!(graph.relations_using_rel(100), BTreeSet::from([200, 300]));
        assert_eq!(graph.ways_using_node(2), BTreeSet::from([10]));
        assert!(graph.relations_using_node(99).is_empty());
    }

    #[test]
    fn transit_relations_keep_only_interesting_parents() {
        let graph = sample_graph();
        assert_eq!(graph.transit_relations(100), BTreeSet::from([200]));
    }

    #[test]
    fn malformed_relations_are_dropped() {
        let graph = sample_graph();
        assert_eq!(graph.relation_count(), 3);
        assert!(graph.relation(400).is_none());
    }

    #[test]
    fn looks_up_features() {
        let graph = sample_graph();
        let station = graph.node(1).unwrap();
        assert_eq!(station.tag("railway"), Some("station"));
        assert!(graph.way(10).is_some());
        assert!(graph.way(11).is_none());
    }
}
