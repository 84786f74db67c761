//! Transit route modes and display names.

use std::collections::BTreeSet;

use osm_tiles_relation::Tags;
use strum_macros::{AsRefStr, Display, EnumString};

/// Route modes that count towards a station's transit score, keyed by the
/// relation's `route` tag.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, AsRefStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum RouteMode {
    /// Mainline rail.
    Train,
    /// Metro.
    Subway,
    /// Light rail.
    LightRail,
    /// Tram or streetcar.
    Tram,
    /// Any other `route=railway`.
    Railway,
}

impl RouteMode {
    /// Parses the `route` tag of a `type=route` relation.
    #[must_use]
    pub fn from_tags(tags: &Tags) -> Option<Self> {
        if tags.get("type").map(String::as_str) != Some("route") {
            return None;
        }
        tags.get("route")?.parse().ok()
    }
}

/// Display name for a route relation.
///
/// Prefers `ref` over `name` since the name often carries the
/// destination. An empty `ref` counts as missing, but a present empty
/// `name` is kept as the empty name. The result is trimmed.
#[must_use]
pub fn transit_route_name(tags: &Tags) -> Option<String> {
    tags.get("ref")
        .filter(|r| !r.is_empty())
        .or_else(|| tags.get("name"))
        .map(|value| value.trim().to_string())
}

/// Names of the routes of one mode serving a station.
///
/// Routes without a name still count once towards the size of the set but
/// have nothing to display.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteNames {
    names: BTreeSet<String>,
    has_unnamed: bool,
}

impl RouteNames {
    /// Adds a route's display name.
    pub fn insert(&mut self, name: Option<String>) {
        match name {
            Some(name) => {
                self.names.insert(name);
            }
            None => self.has_unnamed = true,
        }
    }

    /// Number of distinct routes, with all unnamed routes counted as one.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len() + usize::from(self.has_unnamed)
    }

    /// Whether no route of this mode was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The named routes, in sorted order.
    #[must_use]
    pub const fn names(&self) -> &BTreeSet<String> {
        &self.names
    }
}

impl<S: Into<String>> FromIterator<S> for RouteNames {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().map(Into::into).collect(),
            has_unnamed: false,
        }
    }
}
