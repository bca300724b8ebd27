//! Tiling profiles: the pyramid a tile source publishes.
//!
//! A [`Profile`] fixes a spatial reference, a full extent, how many tiles
//! cover that extent at level 0, and the pixel size of each tile. Level `n`
//! splits every root tile into `2^n × 2^n` equal cells. Rows count downward
//! from the top (north) edge, matching the ArcGIS cache layout.

use std::fmt;

use thiserror::Error;

use crate::srs::SpatialReference;

/// Default tile size in pixels.
pub const DEFAULT_TILE_PIXELS: u32 = 256;

/// Half the circumference of the Web Mercator sphere, in meters.
const MERCATOR_HALF_WORLD: f64 = 20037508.342789244;

/// Half the meridian span of plate carrée, in meters.
const PLATE_CARREE_HALF_HEIGHT: f64 = 10018754.171394622;

/// Deepest level for which tile counts fit the index types.
const MAX_LEVEL: u32 = 31;

/// Errors raised when a profile would violate its invariants.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProfileError {
    /// The extent has zero or negative width or height.
    #[error("Extent is empty: {0}")]
    EmptyExtent(GeoExtent),

    /// One of the root tile counts is zero.
    #[error("Root tile counts must be at least 1 (got {tiles_x}x{tiles_y})")]
    ZeroRootTiles { tiles_x: u32, tiles_y: u32 },

    /// Tile size is zero.
    #[error("Tile pixel size must be positive")]
    ZeroTilePixels,

    /// The id names no known profile.
    #[error("Unknown profile '{0}'")]
    UnknownProfile(String),
}

/// An axis-aligned bounding box in some spatial reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoExtent {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl GeoExtent {
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.xmin + self.xmax) / 2.0,
            (self.ymin + self.ymax) / 2.0,
        )
    }

    /// True unless both dimensions are finite and positive.
    pub fn is_empty(&self) -> bool {
        !(self.width() > 0.0 && self.height() > 0.0)
    }

    /// Returns true if `other` lies entirely inside this extent.
    pub fn contains(&self, other: &GeoExtent) -> bool {
        other.xmin >= self.xmin
            && other.xmax <= self.xmax
            && other.ymin >= self.ymin
            && other.ymax <= self.ymax
    }

    /// Returns true if the two extents overlap with positive area.
    pub fn intersects(&self, other: &GeoExtent) -> bool {
        self.xmin < other.xmax
            && other.xmin < self.xmax
            && self.ymin < other.ymax
            && other.ymin < self.ymax
    }

    /// Pad the shorter axis symmetrically so width equals height.
    ///
    /// The center is preserved.
    pub fn squared(&self) -> GeoExtent {
        let (w, h) = (self.width(), self.height());
        if w > h {
            let d = (w - h) / 2.0;
            GeoExtent::new(self.xmin, self.ymin - d, self.xmax, self.ymax + d)
        } else if h > w {
            let d = (h - w) / 2.0;
            GeoExtent::new(self.xmin - d, self.ymin, self.xmax + d, self.ymax)
        } else {
            *self
        }
    }
}

impl fmt::Display for GeoExtent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}]",
            self.xmin, self.ymin, self.xmax, self.ymax
        )
    }
}

/// A tile pyramid definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    srs: SpatialReference,
    extent: GeoExtent,
    tiles_x0: u32,
    tiles_y0: u32,
    tile_pixels: u32,
}

impl Profile {
    /// Create a profile, validating its invariants.
    ///
    /// # Arguments
    ///
    /// * `srs` - Spatial reference of `extent`
    /// * `extent` - Area covered by the level-0 tiles
    /// * `tiles_x0` - Root tile columns
    /// * `tiles_y0` - Root tile rows
    /// * `tile_pixels` - Width and height of each tile in pixels
    pub fn new(
        srs: SpatialReference,
        extent: GeoExtent,
        tiles_x0: u32,
        tiles_y0: u32,
        tile_pixels: u32,
    ) -> Result<Self, ProfileError> {
        if extent.is_empty() {
            return Err(ProfileError::EmptyExtent(extent));
        }
        if tiles_x0 == 0 || tiles_y0 == 0 {
            return Err(ProfileError::ZeroRootTiles {
                tiles_x: tiles_x0,
                tiles_y: tiles_y0,
            });
        }
        if tile_pixels == 0 {
            return Err(ProfileError::ZeroTilePixels);
        }

        Ok(Self {
            srs,
            extent,
            tiles_x0,
            tiles_y0,
            tile_pixels,
        })
    }

    /// WGS84 lon/lat over the whole globe, two root tiles side by side.
    pub fn global_geodetic() -> Self {
        Self {
            srs: SpatialReference::wgs84(),
            extent: GeoExtent::new(-180.0, -90.0, 180.0, 90.0),
            tiles_x0: 2,
            tiles_y0: 1,
            tile_pixels: DEFAULT_TILE_PIXELS,
        }
    }

    /// Spherical Web Mercator, one root tile.
    pub fn global_mercator() -> Self {
        Self {
            srs: SpatialReference::web_mercator(),
            extent: GeoExtent::new(
                -MERCATOR_HALF_WORLD,
                -MERCATOR_HALF_WORLD,
                MERCATOR_HALF_WORLD,
                MERCATOR_HALF_WORLD,
            ),
            tiles_x0: 1,
            tiles_y0: 1,
            tile_pixels: DEFAULT_TILE_PIXELS,
        }
    }

    /// Equidistant cylindrical WGS84 in meters, two root tiles.
    pub fn plate_carree() -> Self {
        Self {
            srs: SpatialReference::plate_carree(),
            extent: GeoExtent::new(
                -MERCATOR_HALF_WORLD,
                -PLATE_CARREE_HALF_HEIGHT,
                MERCATOR_HALF_WORLD,
                PLATE_CARREE_HALF_HEIGHT,
            ),
            tiles_x0: 2,
            tiles_y0: 1,
            tile_pixels: DEFAULT_TILE_PIXELS,
        }
    }

    /// Look up a named profile (case-insensitive).
    ///
    /// Recognized ids: `global-geodetic` (`geodetic`, `epsg:4326`),
    /// `global-mercator` (`mercator`, `spherical-mercator`, `epsg:3857`),
    /// `plate-carre` (`plate-carree`).
    pub fn from_well_known(id: &str) -> Result<Self, ProfileError> {
        match id.trim().to_ascii_lowercase().as_str() {
            "global-geodetic" | "geodetic" | "epsg:4326" => Ok(Self::global_geodetic()),
            "global-mercator" | "mercator" | "spherical-mercator" | "epsg:3857" => {
                Ok(Self::global_mercator())
            }
            "plate-carre" | "plate-carree" => Ok(Self::plate_carree()),
            _ => Err(ProfileError::UnknownProfile(id.to_string())),
        }
    }

    pub fn srs(&self) -> &SpatialReference {
        &self.srs
    }

    pub fn extent(&self) -> &GeoExtent {
        &self.extent
    }

    /// Root tile counts `(x, y)`.
    pub fn root_tiles(&self) -> (u32, u32) {
        (self.tiles_x0, self.tiles_y0)
    }

    pub fn tile_pixels(&self) -> u32 {
        self.tile_pixels
    }

    /// Tile counts `(x, y)` at `level`, or `None` past the deepest level.
    pub fn num_tiles(&self, level: u32) -> Option<(u64, u64)> {
        if level > MAX_LEVEL {
            return None;
        }
        Some((
            u64::from(self.tiles_x0) << level,
            u64::from(self.tiles_y0) << level,
        ))
    }

    /// Extent of the tile at `(level, col, row)`.
    ///
    /// Returns `None` when the indices fall outside the level's grid.
    pub fn tile_extent(&self, level: u32, col: u64, row: u64) -> Option<GeoExtent> {
        let (nx, ny) = self.num_tiles(level)?;
        if col >= nx || row >= ny {
            return None;
        }

        let w = self.extent.width() / nx as f64;
        let h = self.extent.height() / ny as f64;

        // Outer edges snap to the full extent so same-level tiles union exactly.
        let xmin = self.extent.xmin + col as f64 * w;
        let xmax = if col + 1 == nx {
            self.extent.xmax
        } else {
            self.extent.xmin + (col + 1) as f64 * w
        };
        let ymax = self.extent.ymax - row as f64 * h;
        let ymin = if row + 1 == ny {
            self.extent.ymin
        } else {
            self.extent.ymax - (row + 1) as f64 * h
        };

        Some(GeoExtent::new(xmin, ymin, xmax, ymax))
    }

    /// The same pyramid with its extent padded to a square.
    ///
    /// Root tile counts and tile size are kept.
    pub fn squared(&self) -> Self {
        Self {
            extent: self.extent.squared(),
            ..self.clone()
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({}x{} root tiles, {}px)",
            self.srs, self.extent, self.tiles_x0, self.tiles_y0, self.tile_pixels
        )
    }
}
