//! Small in-memory [`RelationGraphLookup`] for tests.

use std::collections::{BTreeMap, BTreeSet};

use geo::{Geometry, LineString, Point};
use osm_tiles_feature_models::{Feature, OsmId, tags_to_properties};
use osm_tiles_relation::{Relation, RelationGraphLookup};

#[derive(Debug, Default)]
pub struct Fixture {
    relations: BTreeMap<OsmId, Relation>,
    nodes: BTreeMap<OsmId, Feature>,
    ways: BTreeMap<OsmId, (Feature, Vec<OsmId>)>,
}

impl Fixture {
    pub fn with_relation(
        mut self,
        id: OsmId,
        tags: &[(&str, &str)],
        node_ids: &[OsmId],
        way_ids: &[OsmId],
        rel_ids: &[OsmId],
    ) -> Self {
        let rel = Relation {
            id,
            tags: tags
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            node_ids: node_ids.to_vec(),
            way_ids: way_ids.to_vec(),
            rel_ids: rel_ids.to_vec(),
        };
        self.relations.insert(id, rel);
        self
    }

    pub fn with_node(mut self, id: OsmId, tags: &[(&str, &str)]) -> Self {
        let feature = Feature::new(
            id,
            Geometry::Point(Point::new(0.0, 0.0)),
            tags_to_properties(tags.iter().copied()),
        );
        self.nodes.insert(id, feature);
        self
    }

    pub fn with_way(mut self, id: OsmId, tags: &[(&str, &str)], node_ids: &[OsmId]) -> Self {
        let feature = Feature::new(
            id,
            Geometry::LineString(LineString::from(vec![(0.0, 0.0), (1.0, 0.0)])),
            tags_to_properties(tags.iter().copied()),
        );
        self.ways.insert(id, (feature, node_ids.to_vec()));
        self
    }

    fn parents(&self, member: impl Fn(&Relation) -> bool) -> BTreeSet<OsmId> {
        self.relations
            .values()
            .filter(|rel| member(rel))
            .map(|rel| rel.id)
            .collect()
    }
}

impl RelationGraphLookup for Fixture {
    fn relations_using_node(&self, node_id: OsmId) -> BTreeSet<OsmId> {
        self.parents(|rel| rel.node_ids.contains(&node_id))
    }

    fn relations_using_way(&self, way_id: OsmId) -> BTreeSet<OsmId> {
        self.parents(|rel| rel.way_ids.contains(&way_id))
    }

    fn relations_using_rel(&self, rel_id: OsmId) -> BTreeSet<OsmId> {
        self.parents(|rel| rel.rel_ids.contains(&rel_id))
    }

    fn ways_using_node(&self, node_id: OsmId) -> BTreeSet<OsmId> {
        self.ways
            .iter()
            .filter(|(_, (_, nodes))| nodes.contains(&node_id))
            .map(|(&id, _)| id)
            .collect()
    }

    fn relation(&self, rel_id: OsmId) -> Option<Relation> {
        self.relations.get(&rel_id).cloned()
    }

    fn way(&self, way_id: OsmId) -> Option<Feature> {
        self.ways.get(&way_id).map(|(feature, _)| feature.clone())
    }

    fn node(&self, node_id: OsmId) -> Option<Feature> {
        self.nodes.get(&node_id).cloned()
    }
}
