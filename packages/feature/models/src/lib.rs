#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared feature types for the OSM tile pipeline.
//!
//! A [`Feature`] is a single row read from one of the osm2pgsql feature
//! tables: an OSM ID, a projected geometry and a bag of properties. This
//! crate only holds the data types and small accessors; it does no I/O.

use std::collections::BTreeMap;

use geo::Geometry;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// OSM identifier of a node, way or relation.
///
/// Negative IDs mark synthetic features that have no OSM membership.
pub type OsmId = i64;

/// Property mapping attached to a feature.
pub type Properties = BTreeMap<String, PropertyValue>;

/// A single property value.
///
/// Tags read from OSM are always strings; derived properties add numbers,
/// booleans and lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// Explicitly absent value (e.g. a transit root relation that was not found).
    Null,
    /// Boolean flag.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating point value.
    Float(f64),
    /// String value.
    String(String),
    /// Ordered list of values.
    List(Vec<Self>),
}

impl PropertyValue {
    /// Returns the string payload, if this is a string value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the boolean payload, if this is a boolean value.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer payload, if this is an integer value.
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the numeric payload as `f64` for integer and float values.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns the list payload, if this is a list value.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Self]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for PropertyValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Coarse shape class of a geometry, matching the three osm2pgsql feature
/// tables (`planet_osm_point`, `planet_osm_line`, `planet_osm_polygon`).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ShapeType {
    /// `Point` and `MultiPoint`.
    Point,
    /// `LineString` and `MultiLineString`.
    Line,
    /// `Polygon` and `MultiPolygon`.
    Polygon,
}

impl ShapeType {
    /// All shape types, in source table order.
    pub const ALL: [Self; 3] = [Self::Point, Self::Line, Self::Polygon];

    /// Classifies a geometry, ignoring any `Multi` prefix.
    ///
    /// Returns `None` for geometry kinds that never come out of the feature
    /// tables (collections, rectangles, triangles, bare lines).
    #[must_use]
    pub const fn of(geometry: &Geometry<f64>) -> Option<Self> {
        match geometry {
            Geometry::Point(_) | Geometry::MultiPoint(_) => Some(Self::Point),
            Geometry::LineString(_) | Geometry::MultiLineString(_) => Some(Self::Line),
            Geometry::Polygon(_) | Geometry::MultiPolygon(_) => Some(Self::Polygon),
            Geometry::Line(_)
            | Geometry::GeometryCollection(_)
            | Geometry::Rect(_)
            | Geometry::Triangle(_) => None,
        }
    }

    /// Name of the osm2pgsql table holding features of this shape.
    #[must_use]
    pub const fn table_name(self) -> &'static str {
        match self {
            Self::Point => "planet_osm_point",
            Self::Line => "planet_osm_line",
            Self::Polygon => "planet_osm_polygon",
        }
    }
}

/// A feature read from the tile index: `(id, geometry, properties)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// OSM ID. Negative for synthetic features.
    pub id: OsmId,
    /// Geometry in projected (spherical mercator) coordinates.
    pub geometry: Geometry<f64>,
    /// Tags and derived properties.
    pub properties: Properties,
}

impl Feature {
    /// Creates a feature.
    #[must_use]
    pub const fn new(id: OsmId, geometry: Geometry<f64>, properties: Properties) -> Self {
        Self {
            id,
            geometry,
            properties,
        }
    }

    /// Returns the string value of a property, if present and a string.
    #[must_use]
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(PropertyValue::as_str)
    }

    /// Whether this feature was synthesised rather than read from OSM.
    #[must_use]
    pub const fn is_synthetic(&self) -> bool {
        self.id < 0
    }

    /// Shape class of this feature's geometry.
    #[must_use]
    pub const fn shape_type(&self) -> Option<ShapeType> {
        ShapeType::of(&self.geometry)
    }
}

/// Builds a [`Properties`] map from string tag pairs.
#[must_use]
pub fn tags_to_properties<'a>(tags: impl IntoIterator<Item = (&'a str, &'a str)>) -> Properties {
    tags.into_iter()
        .map(|(k, v)| (k.to_string(), PropertyValue::from(v)))
        .collect()
}
