#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Transit importance scoring for railway stations.
//!
//! A station is scored by the distinct train, subway, light rail and tram
//! routes that serve it. Routes are found by walking out from the station:
//!
//! 1. the stop area relations containing the station node or way, and
//!    every transit relation above them ([`traversal`]);
//! 2. the stations and stops that are members of those relations;
//! 3. the railway lines passing through any of those stops;
//! 4. the route relations containing any stop, line or stop area.
//!
//! The score packs the mode counts into three decimal digits, with a
//! bonus for interchanges between mainline rail and metro.

#[cfg(test)]
mod fixture;
pub mod routes;
pub mod traversal;

use std::collections::{BTreeMap, BTreeSet};

use osm_tiles_feature_models::{Feature, OsmId};
use osm_tiles_relation::{RelationGraphLookup, is_interesting_transit_relation};

pub use routes::{RouteMode, RouteNames, transit_route_name};
pub use traversal::{Traversal, recurse_up_transit_relations};

/// Score and serving routes for one station.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitResult {
    /// Packed importance score in `0..=999`.
    pub score: u32,
    /// Furthest transit relation above the station, if it is in any.
    pub root_relation_id: Option<OsmId>,
    /// Mainline rail routes.
    pub trains: RouteNames,
    /// Subway routes.
    pub subways: RouteNames,
    /// Light rail routes.
    pub light_rails: RouteNames,
    /// Tram routes.
    pub trams: RouteNames,
    /// Other railway routes.
    pub railways: RouteNames,
}

/// Packs route counts into a score.
///
/// Hundreds are trains, tens are subway plus light rail, units are trams
/// plus other railways, each capped at 9. Stations served by both trains
/// and subway or light rail get their train and metro counts doubled.
#[must_use]
pub fn transit_score(
    trains: usize,
    subways: usize,
    light_rails: usize,
    trams: usize,
    railways: usize,
) -> u32 {
    let bonus = if trains > 0 && (subways > 0 || light_rails > 0) {
        2
    } else {
        1
    };
    #[allow(clippy::cast_possible_truncation)]
    let digit = |n: usize| n.min(9) as u32;

    100 * digit(bonus * trains)
        + 10 * digit(bonus * (subways + light_rails))
        + digit(trams + railways)
}

fn is_station_or_stop(node: &Feature) -> bool {
    matches!(node.tag("railway"), Some("station" | "stop" | "tram_stop"))
        || matches!(
            node.tag("public_transport"),
            Some("stop" | "stop_position" | "tram_stop")
        )
}

fn is_transit_line(way: &Feature) -> bool {
    matches!(
        way.tag("railway"),
        Some("subway" | "light_rail" | "tram" | "rail")
    )
}

/// Scores a station given as a node, a way, or both.
///
/// Missing relations, nodes and ways are skipped.
pub fn calculate_transit_routes_and_score<L: RelationGraphLookup + ?Sized>(
    osm: &L,
    node_id: Option<OsmId>,
    way_id: Option<OsmId>,
) -> TransitResult {
    let mut candidate_relations = BTreeSet::new();
    if let Some(id) = node_id {
        candidate_relations.extend(osm.relations_using_node(id));
    }
    if let Some(id) = way_id {
        candidate_relations.extend(osm.relations_using_way(id));
    }

    let seed_relations: BTreeSet<OsmId> = candidate_relations
        .into_iter()
        .filter(|&rel_id| {
            osm.relation(rel_id)
                .is_some_and(|rel| is_interesting_transit_relation(&rel.tags))
        })
        .collect();

    let traversal = recurse_up_transit_relations(&seed_relations, osm);

    let mut stations_and_stops: BTreeSet<OsmId> = traversal
        .all_relations
        .iter()
        .filter_map(|&rel_id| osm.relation(rel_id))
        .flat_map(|rel| rel.node_ids)
        .filter_map(|id| osm.node(id))
        .filter(is_station_or_stop)
        .map(|node| node.id)
        .collect();
    stations_and_stops.extend(node_id);

    let mut stations_and_lines: BTreeSet<OsmId> = stations_and_stops
        .iter()
        .flat_map(|&id| osm.ways_using_node(id))
        .filter(|&id| osm.way(id).is_some_and(|way| is_transit_line(&way)))
        .collect();
    stations_and_lines.extend(way_id);

    let route_candidates = stations_and_stops
        .iter()
        .flat_map(|&id| osm.relations_using_node(id))
        .chain(
            stations_and_lines
                .iter()
                .flat_map(|&id| osm.relations_using_way(id)),
        )
        .chain(
            traversal
                .all_relations
                .iter()
                .flat_map(|&id| osm.relations_using_rel(id)),
        )
        .collect::<BTreeSet<OsmId>>();

    let mut routes: BTreeMap<RouteMode, RouteNames> = BTreeMap::new();
    for rel in route_candidates.into_iter().filter_map(|id| osm.relation(id)) {
        if let Some(mode) = RouteMode::from_tags(&rel.tags) {
            routes
                .entry(mode)
                .or_default()
                .insert(transit_route_name(&rel.tags));
        }
    }

    let mut take = |mode: RouteMode| routes.remove(&mode).unwrap_or_default();
    let trains = take(RouteMode::Train);
    let subways = take(RouteMode::Subway);
    let light_rails = take(RouteMode::LightRail);
    let trams = take(RouteMode::Tram);
    let railways = take(RouteMode::Railway);

    let score = transit_score(
        trains.len(),
        subways.len(),
        light_rails.len(),
        trams.len(),
        railways.len(),
    );

    log::debug!(
        "Transit score {score} for node={node_id:?} way={way_id:?} ({} relations)",
        traversal.all_relations.len()
    );

    TransitResult {
        score,
        root_relation_id: traversal.root_relation_id(),
        trains,
        subways,
        light_rails,
        trams,
        railways,
    }
}
