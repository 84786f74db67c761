#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! OSM relation decoding and membership lookups.
//!
//! osm2pgsql stores relations with their tags flattened into one
//! alternating `[key, value, key, value, ...]` array and their members
//! concatenated into one `parts` array: nodes first, then ways, then
//! child relations, split by two offsets. [`Relation::from_raw`] decodes
//! that layout.
//!
//! The [`RelationGraphLookup`] trait is the only way the transit and layer
//! code reaches relations, nodes and ways. [`OsmGraph`] is the in-memory
//! implementation built from raw tables.

pub mod graph;

use std::collections::{BTreeMap, BTreeSet};

use osm_tiles_feature_models::{Feature, OsmId};
use serde::{Deserialize, Serialize};

pub use graph::{OsmGraph, OsmGraphBuilder};

/// Decoded relation tags.
pub type Tags = BTreeMap<String, String>;

/// Errors decoding raw relation records.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    /// The flattened tag array did not alternate key and value.
    #[error("tag array has odd length {len}")]
    OddTagArray {
        /// Length of the offending array.
        len: usize,
    },

    /// The member offsets do not satisfy `way_off <= rel_off <= parts.len()`.
    #[error("invalid member offsets way_off={way_off} rel_off={rel_off} for {len} parts")]
    InvalidOffsets {
        /// Offset of the first way member.
        way_off: usize,
        /// Offset of the first relation member.
        rel_off: usize,
        /// Length of the parts array.
        len: usize,
    },
}

/// Pairs an alternating key/value array into a tag map.
///
/// Later duplicates of a key overwrite earlier ones.
///
/// # Errors
///
/// Returns [`FormatError::OddTagArray`] if the array has odd length.
pub fn decode_tags<S: AsRef<str>>(flat: &[S]) -> Result<Tags, FormatError> {
    if flat.len() % 2 != 0 {
        return Err(FormatError::OddTagArray { len: flat.len() });
    }

    Ok(flat
        .chunks_exact(2)
        .map(|pair| (pair[0].as_ref().to_string(), pair[1].as_ref().to_string()))
        .collect())
}

/// A relation row as stored by osm2pgsql in `planet_osm_rels`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRelation {
    /// Relation ID.
    pub id: OsmId,
    /// Alternating key/value tag array.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Member IDs: nodes, then ways, then relations.
    #[serde(default)]
    pub parts: Vec<OsmId>,
    /// Index of the first way member in `parts`.
    #[serde(default)]
    pub way_off: usize,
    /// Index of the first relation member in `parts`.
    #[serde(default)]
    pub rel_off: usize,
}

/// A decoded relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    /// Relation ID.
    pub id: OsmId,
    /// Decoded tags.
    pub tags: Tags,
    /// Member node IDs, in source order.
    pub node_ids: Vec<OsmId>,
    /// Member way IDs, in source order.
    pub way_ids: Vec<OsmId>,
    /// Member relation IDs, in source order.
    pub rel_ids: Vec<OsmId>,
}

impl Relation {
    /// Decodes a raw relation row.
    ///
    /// # Errors
    ///
    /// Returns a [`FormatError`] if the tag array has odd length or the
    /// member offsets are out of order or out of range.
    pub fn from_raw(raw: &RawRelation) -> Result<Self, FormatError> {
        let tags = decode_tags(&raw.tags)?;

        let len = raw.parts.len();
        if raw.way_off > raw.rel_off || raw.rel_off > len {
            return Err(FormatError::InvalidOffsets {
                way_off: raw.way_off,
                rel_off: raw.rel_off,
                len,
            });
        }

        Ok(Self {
            id: raw.id,
            tags,
            node_ids: raw.parts[..raw.way_off].to_vec(),
            way_ids: raw.parts[raw.way_off..raw.rel_off].to_vec(),
            rel_ids: raw.parts[raw.rel_off..].to_vec(),
        })
    }

    /// Returns a tag value.
    #[must_use]
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

/// Whether a relation groups transit stops and stations.
///
/// True for `public_transport` of `stop_area`/`stop_area_group`, or a
/// `type` of `stop_area`/`stop_area_group`/`site`.
#[must_use]
pub fn is_interesting_transit_relation(tags: &Tags) -> bool {
    let public_transport = tags.get("public_transport").map(String::as_str);
    let typ = tags.get("type").map(String::as_str);

    matches!(public_transport, Some("stop_area" | "stop_area_group"))
        || matches!(typ, Some("stop_area" | "stop_area_group" | "site"))
}

/// Read-only access to OSM entities and the membership edges between them.
///
/// Missing IDs are not errors: implementations return empty sets or
/// `None`, and callers treat that as no contribution.
pub trait RelationGraphLookup {
    /// Relations which have the node as a member.
    fn relations_using_node(&self, node_id: OsmId) -> BTreeSet<OsmId>;

    /// Relations which have the way as a member.
    fn relations_using_way(&self, way_id: OsmId) -> BTreeSet<OsmId>;

    /// Relations which have the relation as a member.
    fn relations_using_rel(&self, rel_id: OsmId) -> BTreeSet<OsmId>;

    /// Ways which include the node.
    fn ways_using_node(&self, node_id: OsmId) -> BTreeSet<OsmId>;

    /// The decoded relation.
    fn relation(&self, rel_id: OsmId) -> Option<Relation>;

    /// The feature generated from the way.
    fn way(&self, way_id: OsmId) -> Option<Feature>;

    /// The feature generated from the node.
    fn node(&self, node_id: OsmId) -> Option<Feature>;

    /// Transit relations which have the relation as a member.
    ///
    /// The default looks up every parent relation and keeps those passing
    /// [`is_interesting_transit_relation`].
    fn transit_relations(&self, rel_id: OsmId) -> BTreeSet<OsmId> {
        self.relations_using_rel(rel_id)
            .into_iter()
            .filter(|&parent| {
                self.relation(parent)
                    .is_some_and(|rel| is_interesting_transit_relation(&rel.tags))
            })
            .collect()
    }
}

impl<T: RelationGraphLookup + ?Sized> RelationGraphLookup for &T {
    fn relations_using_node(&self, node_id: OsmId) -> BTreeSet<OsmId> {
        (**self).relations_using_node(node_id)
    }

    fn relations_using_way(&self, way_id: OsmId) -> BTreeSet<OsmId> {
        (**self).relations_using_way(way_id)
    }

    fn relations_using_rel(&self, rel_id: OsmId) -> BTreeSet<OsmId> {
        (**self).relations_using_rel(rel_id)
    }

    fn ways_using_node(&self, node_id: OsmId) -> BTreeSet<OsmId> {
        (**self).ways_using_node(node_id)
    }

    fn relation(&self, rel_id: OsmId) -> Option<Relation> {
        (**self).relation(rel_id)
    }

    fn way(&self, way_id: OsmId) -> Option<Feature> {
        (**self).way(way_id)
    }

    fn node(&self, node_id: OsmId) -> Option<Feature> {
        (**self).node(node_id)
    }

    fn transit_relations(&self, rel_id: OsmId) -> BTreeSet<OsmId> {
        (**self).transit_relations(rel_id)
    }
}
