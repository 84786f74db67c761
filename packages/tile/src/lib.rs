#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Tile addressing in spherical mercator.
//!
//! Tiles use the usual XYZ convention: zoom `z` splits the world into
//! `2^z` columns and rows, column 0 at the antimeridian and row 0 at the
//! northern edge. All coordinates are EPSG:3857 metres.

use std::fmt;
use std::str::FromStr;

use geo::{Polygon, Rect, coord};
use serde::{Deserialize, Serialize};

/// Half the circumference of the earth at the equator in mercator metres.
pub const HALF_EARTH_CIRCUMFERENCE: f64 = 20_037_508.342_789_244;

/// Full width of the mercator plane in metres.
pub const EARTH_CIRCUMFERENCE: f64 = 2.0 * HALF_EARTH_CIRCUMFERENCE;

/// Deepest supported zoom. Grid sizes stay within `u32` up to here.
pub const MAX_ZOOM: u8 = 30;

/// A single tile address `z/x/y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    /// Zoom level.
    pub z: u8,
    /// Column, `0..2^z`, west to east.
    pub x: u32,
    /// Row, `0..2^z`, north to south.
    pub y: u32,
}

impl TileCoord {
    /// Creates a tile address.
    #[must_use]
    pub const fn new(z: u8, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// Number of tiles along one axis at this zoom.
    #[must_use]
    pub const fn grid_size(self) -> u32 {
        1 << self.z
    }

    /// Mercator bounds of this tile.
    ///
    /// Callers must keep `x` and `y` inside `0..2^z`; nothing is checked.
    #[must_use]
    pub fn bounds(self) -> Rect<f64> {
        let tile_size = EARTH_CIRCUMFERENCE / f64::from(self.grid_size());
        let min_x = f64::from(self.x).mul_add(tile_size, -HALF_EARTH_CIRCUMFERENCE);
        let max_y = f64::from(self.y).mul_add(-tile_size, HALF_EARTH_CIRCUMFERENCE);

        Rect::new(
            coord! { x: min_x, y: max_y - tile_size },
            coord! { x: min_x + tile_size, y: max_y },
        )
    }

    /// Mercator bounds of this tile as a polygon.
    #[must_use]
    pub fn bbox(self) -> Polygon<f64> {
        self.bounds().to_polygon()
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Error parsing a `z/x/y` tile address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TileCoordParseError {
    /// The string did not have exactly three `/`-separated parts.
    #[error("expected z/x/y, got {0:?}")]
    Shape(String),

    /// A part was not a valid integer.
    #[error("invalid number in tile address {0:?}")]
    Number(String),

    /// Column or row is outside the grid for the zoom.
    #[error("tile {0} is outside the grid for its zoom")]
    OutOfGrid(TileCoord),
}

impl FromStr for TileCoord {
    type Err = TileCoordParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('/').collect();
        let [z, x, y] = parts.as_slice() else {
            return Err(TileCoordParseError::Shape(s.to_string()));
        };

        let number = |_| TileCoordParseError::Number(s.to_string());
        let coord = Self {
            z: z.parse().map_err(number)?,
            x: x.parse().map_err(number)?,
            y: y.parse().map_err(number)?,
        };

        if coord.z > MAX_ZOOM || coord.x >= coord.grid_size() || coord.y >= coord.grid_size() {
            return Err(TileCoordParseError::OutOfGrid(coord));
        }

        Ok(coord)
    }
}

/// The root tile of a pre-built index plus the deepest zoom it was built to.
///
/// Invariant: `z <= max_z <= MAX_ZOOM` and the root tile lies in its grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TilePyramid {
    /// Zoom of the root tile.
    pub z: u8,
    /// Column of the root tile.
    pub x: u32,
    /// Row of the root tile.
    pub y: u32,
    /// Deepest zoom covered by the pyramid.
    pub max_z: u8,
}

impl TilePyramid {
    /// Creates a pyramid, returning `None` when `z > max_z`, when `max_z`
    /// is deeper than [`MAX_ZOOM`], or when the root tile is off its grid.
    #[must_use]
    pub const fn new(z: u8, x: u32, y: u32, max_z: u8) -> Option<Self> {
        if z > max_z || max_z > MAX_ZOOM {
            return None;
        }
        let root = TileCoord::new(z, x, y);
        if x >= root.grid_size() || y >= root.grid_size() {
            return None;
        }
        Some(Self { z, x, y, max_z })
    }

    /// The root tile.
    #[must_use]
    pub const fn tile(self) -> TileCoord {
        TileCoord::new(self.z, self.x, self.y)
    }

    /// Mercator bounds of the root tile.
    #[must_use]
    pub fn bounds(self) -> Rect<f64> {
        self.tile().bounds()
    }

    /// Mercator bounds of the root tile as a polygon.
    #[must_use]
    pub fn bbox(self) -> Polygon<f64> {
        self.tile().bbox()
    }
}

/// Fractional grid position of a mercator point at a zoom.
///
/// Rows increase southwards, so the point with the largest `y` has the
/// smallest row.
#[must_use]
pub fn mercator_point_to_grid(zoom: u8, x: f64, y: f64) -> (f64, f64) {
    let scale = f64::from(1_u32 << zoom) / EARTH_CIRCUMFERENCE;
    let column = (x + HALF_EARTH_CIRCUMFERENCE) * scale;
    let row = (HALF_EARTH_CIRCUMFERENCE - y) * scale;
    (column, row)
}

/// Inclusive range of tile columns and rows covering a mercator box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    /// Zoom of every tile in the range.
    pub zoom: u8,
    /// Column of the top-left tile.
    pub min_x: u32,
    /// Row of the top-left tile.
    pub min_y: u32,
    /// Column of the bottom-right tile. Never less than `min_x`.
    pub max_x: u32,
    /// Row of the bottom-right tile. Never less than `min_y`.
    pub max_y: u32,
}

impl TileRange {
    /// Tiles at `zoom` covering `bounds`.
    ///
    /// The bottom-right corner is clamped so it is never above or left of
    /// the top-left corner: rounding in the conversion can swap them for
    /// boxes thinner than a tile, and the range must still hold at least
    /// one tile.
    #[must_use]
    pub fn covering(zoom: u8, bounds: Rect<f64>) -> Self {
        let (left, top) = mercator_point_to_grid(zoom, bounds.min().x, bounds.max().y);
        let (right, bottom) = mercator_point_to_grid(zoom, bounds.max().x, bounds.min().y);
        Self::from_grid(zoom, (left, top), (right, bottom))
    }

    /// Builds a range from fractional top-left and bottom-right grid points.
    #[must_use]
    pub fn from_grid(zoom: u8, top_left: (f64, f64), bottom_right: (f64, f64)) -> Self {
        let last = (1_u32 << zoom) - 1;
        let cell = |v: f64| -> u32 {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let c = v.floor().max(0.0) as u32;
            c.min(last)
        };

        let min_x = cell(top_left.0);
        let min_y = cell(top_left.1);

        Self {
            zoom,
            min_x,
            min_y,
            max_x: cell(bottom_right.0).max(min_x),
            max_y: cell(bottom_right.1).max(min_y),
        }
    }

    /// Iterates all tiles in the range, row-major within each column.
    pub fn tiles(self) -> impl Iterator<Item = TileCoord> {
        (self.min_x..=self.max_x).flat_map(move |x| {
            (self.min_y..=self.max_y).map(move |y| TileCoord::new(self.zoom, x, y))
        })
    }

    /// Number of tiles in the range.
    #[must_use]
    pub const fn len(self) -> u64 {
        (self.max_x - self.min_x + 1) as u64 * (self.max_y - self.min_y + 1) as u64
    }

    /// Always `false`: a range holds at least one tile.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn world_tile_covers_the_mercator_plane() {
        let rect = TileCoord::new(0, 0, 0).bounds();
        assert!(close(rect.min().x, -HALF_EARTH_CIRCUMFERENCE));
        assert!(close(rect.min().y, -HALF_EARTH_CIRCUMFERENCE));
        assert!(close(rect.max().x, HALF_EARTH_CIRCUMFERENCE));
        assert!(close(rect.max().y, HALF_EARTH_CIRCUMFERENCE));
    }

    #[test]
    fn zoom_one_tile_zero_zero_is_north_west_quadrant() {
        let rect = TileCoord::new(1, 0, 0).bounds();
        assert!(close(rect.min().x, -HALF_EARTH_CIRCUMFERENCE));
        assert!(close(rect.max().x, 0.0));
        assert!(close(rect.min().y, 0.0));
        assert!(close(rect.max().y, HALF_EARTH_CIRCUMFERENCE));
    }

    #[test]
    fn grid_position_round_trips_tile_corner() {
        let tile = TileCoord::new(10, 163, 395);
        let rect = tile.bounds();
        let (column, row) = mercator_point_to_grid(10, rect.min().x, rect.max().y);
        assert!(close(column, 163.0));
        assert!(close(row, 395.0));
    }

    #[test]
    fn covering_a_tile_interior_yields_that_tile() {
        let tile = TileCoord::new(12, 655, 1583);
        let rect = tile.bounds();
        let inner = Rect::new(
            coord! { x: rect.min().x + 1.0, y: rect.min().y + 1.0 },
            coord! { x: rect.max().x - 1.0, y: rect.max().y - 1.0 },
        );
        let range = TileRange::covering(12, inner);
        assert_eq!(range.tiles().collect::<Vec<_>>(), vec![tile]);
    }

    #[test]
    fn swapped_corners_are_clamped_to_one_row() {
        // bottom-right row computed slightly above the top-left row
        let range = TileRange::from_grid(5, (3.2, 7.999_999), (3.8, 6.999_999_9));
        assert_eq!(range.min_y, 7);
        assert_eq!(range.max_y, 7);
        assert_eq!(range.len(), 1);
        assert_eq!(range.tiles().count(), 1);
    }

    #[test]
    fn covering_clamps_to_grid_edge() {
        let range = TileRange::covering(1, TileCoord::new(0, 0, 0).bounds());
        assert_eq!((range.min_x, range.max_x), (0, 1));
        assert_eq!((range.min_y, range.max_y), (0, 1));
        assert_eq!(range.tiles().count(), 4);
    }

    #[test]
    fn parses_and_displays_tile_addresses() {
        let tile: TileCoord = "10/163/395".parse().unwrap();
        assert_eq!(tile, TileCoord::new(10, 163, 395));
        assert_eq!(tile.to_string(), "10/163/395");

        assert!(matches!(
            "10/163".parse::<TileCoord>(),
            Err(TileCoordParseError::Shape(_))
        ));
        assert!(matches!(
            "1/2/0".parse::<TileCoord>(),
            Err(TileCoordParseError::OutOfGrid(_))
        ));
    }

    #[test]
    fn pyramid_rejects_zoom_above_max() {
        assert!(TilePyramid::new(11, 0, 0, 10).is_none());
        assert!(TilePyramid::new(0, 0, 0, MAX_ZOOM + 1).is_none());
        assert!(TilePyramid::new(31, 0, 0, 31).is_none());
        assert!(TilePyramid::new(1, 2, 0, 4).is_none());
        assert!(TilePyramid::new(MAX_ZOOM, 0, 0, MAX_ZOOM).is_some());
        let pyramid = TilePyramid::new(10, 163, 395, 16).unwrap();
        assert_eq!(pyramid.tile(), TileCoord::new(10, 163, 395));
    }
}
