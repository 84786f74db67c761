#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Per-layer property derivation.
//!
//! [`layer_properties`] takes a feature read from the tile index and the
//! layer it is being emitted into and returns the properties to write for
//! it: tag cleanup, polygon area, road route networks and railway station
//! transit scores. The rules only branch on layer name, geometry type and
//! ID sign, and never fail.

pub mod config;
pub mod roads;

use geo::{Area, Geometry};
use osm_tiles_feature_models::{Feature, OsmId, Properties, PropertyValue};
use osm_tiles_relation::RelationGraphLookup;
use osm_tiles_transit::{RouteNames, calculate_transit_routes_and_score};

pub use config::{
    LayerConfigError, LayerMetadata, LayerSpec, all_layers, load_layers, parse_layer,
};
pub use roads::RoadRoutes;

/// Property keys written by [`layer_properties`].
pub mod keys {
    /// Feature name. Only one of `pois`, `landuse` and `buildings` may carry it.
    pub const NAME: &str = "name";
    /// Set on water label points.
    pub const LABEL_PLACEMENT: &str = "label_placement";
    /// Planar polygon area in square mercator metres.
    pub const AREA: &str = "area";
    /// Flattened `(route, network, ref)` triples of a road's relations.
    pub const NETWORKS: &str = "mz_networks";
    /// Most important cycling network tier of a road.
    pub const CYCLING_NETWORK: &str = "mz_cycling_network";
    /// Set on roads used by bus routes.
    pub const IS_BUS_ROUTE: &str = "is_bus_route";
    /// Packed transit importance of a station.
    pub const TRANSIT_SCORE: &str = "mz_transit_score";
    /// Furthest transit relation containing a station.
    pub const TRANSIT_ROOT_RELATION_ID: &str = "mz_transit_root_relation_id";
    /// Train routes serving a station.
    pub const TRAIN_ROUTES: &str = "train_routes";
    /// Subway routes serving a station.
    pub const SUBWAY_ROUTES: &str = "subway_routes";
    /// Light rail routes serving a station.
    pub const LIGHT_RAIL_ROUTES: &str = "light_rail_routes";
    /// Tram routes serving a station.
    pub const TRAM_ROUTES: &str = "tram_routes";
}

/// Layers among which `name` is resolved upstream; it is stripped here.
const NAME_STRIPPED_LAYERS: &[&str] = &["pois", "landuse", "buildings"];

fn route_list(routes: &RouteNames) -> PropertyValue {
    PropertyValue::List(
        routes
            .names()
            .iter()
            .map(|name| PropertyValue::from(name.as_str()))
            .collect(),
    )
}

/// Properties for `feature` emitted into `layer_name` at `zoom`.
///
/// Starts from the feature's own properties and applies, in order:
///
/// - `name` removed in `pois`, `landuse` and `buildings`;
/// - `label_placement` on points in `water`;
/// - `area` on polygons;
/// - route networks, cycling tier and bus flag on OSM road lines;
/// - transit score and routes on OSM railway stations in `pois`.
#[must_use]
pub fn layer_properties<L: RelationGraphLookup + ?Sized>(
    feature: &Feature,
    layer_name: &str,
    zoom: u8,
    osm: &L,
) -> Properties {
    let mut props = feature.properties.clone();
    let geometry = &feature.geometry;

    if NAME_STRIPPED_LAYERS.contains(&layer_name) {
        props.remove(keys::NAME);
    }

    if layer_name == "water" && matches!(geometry, Geometry::Point(_)) {
        props.insert(keys::LABEL_PLACEMENT.to_string(), true.into());
    }

    if let Geometry::Polygon(_) | Geometry::MultiPolygon(_) = geometry {
        props.insert(keys::AREA.to_string(), geometry.unsigned_area().into());
    }

    let is_line = matches!(
        geometry,
        Geometry::LineString(_) | Geometry::MultiLineString(_)
    );
    if layer_name == "roads" && is_line && !feature.is_synthetic() {
        apply_road_routes(&mut props, feature, zoom, osm);
    }

    let is_point = matches!(geometry, Geometry::Point(_) | Geometry::MultiPoint(_));
    let is_polygon = matches!(
        geometry,
        Geometry::Polygon(_) | Geometry::MultiPolygon(_)
    );
    if layer_name == "pois"
        && feature.tag("railway") == Some("station")
        && (is_point || is_polygon)
        && !feature.is_synthetic()
    {
        let (node_id, way_id) = if is_point {
            (Some(feature.id), None)
        } else {
            (None, Some(feature.id))
        };
        apply_transit(&mut props, osm, node_id, way_id);
    }

    props
}

fn apply_road_routes<L: RelationGraphLookup + ?Sized>(
    props: &mut Properties,
    feature: &Feature,
    zoom: u8,
    osm: &L,
) {
    let routes = RoadRoutes::for_way(osm, feature.id);
    let cycling_network = routes.cycling_network(props);

    if roads::shows_bus_route(routes.is_bus_route, zoom, feature.tag("highway")) {
        props.insert(keys::IS_BUS_ROUTE.to_string(), true.into());
    }

    props.insert(
        keys::NETWORKS.to_string(),
        PropertyValue::List(routes.networks),
    );
    if let Some(tier) = cycling_network {
        props.insert(keys::CYCLING_NETWORK.to_string(), tier.into());
    }
}

fn apply_transit<L: RelationGraphLookup + ?Sized>(
    props: &mut Properties,
    osm: &L,
    node_id: Option<OsmId>,
    way_id: Option<OsmId>,
) {
    let transit = calculate_transit_routes_and_score(osm, node_id, way_id);

    props.insert(
        keys::TRANSIT_SCORE.to_string(),
        i64::from(transit.score).into(),
    );
    props.insert(
        keys::TRANSIT_ROOT_RELATION_ID.to_string(),
        transit.root_relation_id.into(),
    );
    props.insert(keys::TRAIN_ROUTES.to_string(), route_list(&transit.trains));
    props.insert(keys::SUBWAY_ROUTES.to_string(), route_list(&transit.subways));
    props.insert(
        keys::LIGHT_RAIL_ROUTES.to_string(),
        route_list(&transit.light_rails),
    );
    props.insert(keys::TRAM_ROUTES.to_string(), route_list(&transit.trams));
}
