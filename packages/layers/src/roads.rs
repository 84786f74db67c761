//! Route relation properties for road features.

use osm_tiles_feature_models::{OsmId, Properties, PropertyValue};
use osm_tiles_relation::RelationGraphLookup;

/// Road classes likely to carry buses. Only these get `is_bus_route`.
pub const BUS_ROADS: &[&str] = &[
    "motorway",
    "motorway_link",
    "trunk",
    "trunk_link",
    "primary",
    "primary_link",
    "secondary",
    "secondary_link",
    "tertiary",
    "tertiary_link",
    "residential",
    "unclassified",
    "road",
    "living_street",
];

/// Cycling network tiers, most important first.
pub const CYCLING_NETWORK_TIERS: [&str; 4] = ["icn", "ncn", "rcn", "lcn"];

/// Lowest zoom at which roads are flagged as bus routes.
pub const BUS_ROUTE_MIN_ZOOM: u8 = 12;

/// What the route relations containing a road say about it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoadRoutes {
    /// Flattened `(route, network, ref)` triples, in relation ID order.
    pub networks: Vec<PropertyValue>,
    /// Cycling network tiers of hiking, foot and bicycle routes.
    pub cycling_networks: Vec<&'static str>,
    /// Whether any bus or trolleybus route uses the road.
    pub is_bus_route: bool,
}

fn non_empty(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.is_empty())
}

impl RoadRoutes {
    /// Collects route information from every relation containing the way.
    pub fn for_way<L: RelationGraphLookup + ?Sized>(osm: &L, way_id: OsmId) -> Self {
        let mut routes = Self::default();

        for rel in osm
            .relations_using_way(way_id)
            .into_iter()
            .filter_map(|id| osm.relation(id))
        {
            let typ = rel.tag("type");
            let route = rel.tag("route");
            let network = rel.tag("network");
            let reference = rel.tag("ref");

            if non_empty(route) && (non_empty(network) || non_empty(reference)) {
                routes.networks.extend(
                    [route, network, reference]
                        .into_iter()
                        .map(PropertyValue::from),
                );
            }

            if typ != Some("route") {
                continue;
            }

            let cycling_tier = CYCLING_NETWORK_TIERS
                .into_iter()
                .find(|&tier| network == Some(tier))
                .filter(|_| matches!(route, Some("hiking" | "foot" | "bicycle")))
                .filter(|tier| !routes.cycling_networks.contains(tier));
            routes.cycling_networks.extend(cycling_tier);

            if matches!(route, Some("bus" | "trolleybus")) {
                routes.is_bus_route = true;
            }
        }

        routes
    }

    /// Picks the most important cycling tier the road belongs to, either
    /// from its own tags (`icn=yes`, `ncn_ref=...`) or from its relations.
    #[must_use]
    pub fn cycling_network(&self, props: &Properties) -> Option<&'static str> {
        CYCLING_NETWORK_TIERS.into_iter().find(|&tier| {
            props.get(tier).and_then(PropertyValue::as_str) == Some("yes")
                || props.contains_key(&format!("{tier}_ref"))
                || self.cycling_networks.contains(&tier)
        })
    }
}

/// Whether a road with the given `highway` tag is shown as a bus route.
#[must_use]
pub fn shows_bus_route(is_bus_route: bool, zoom: u8, highway: Option<&str>) -> bool {
    is_bus_route && zoom >= BUS_ROUTE_MIN_ZOOM && highway.is_some_and(|h| BUS_ROADS.contains(&h))
}
