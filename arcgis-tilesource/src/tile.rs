//! Tile key types.
//!
//! Provides the `TileKey` type that addresses one tile of a [`Profile`]
//! pyramid together with the geographic extent it covers.

use std::fmt;

use crate::profile::{GeoExtent, Profile};

/// Address of a single tile.
///
/// Columns grow eastward from the profile's left edge and rows grow
/// southward from its top edge. The extent is expressed in the profile's
/// spatial reference.
///
/// # Example
///
/// ```
/// use arcgis_tilesource::{Profile, TileKey};
///
/// let profile = Profile::global_geodetic();
/// let key = TileKey::new(1, 3, 0, &profile).unwrap();
/// assert_eq!(key.extent().xmin, 90.0);
/// assert_eq!(key.extent().ymax, 90.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileKey {
    level: u32,
    col: u64,
    row: u64,
    extent: GeoExtent,
}

impl TileKey {
    /// Create a key whose extent is derived from `profile`.
    ///
    /// Returns `None` if `(col, row)` is outside the grid at `level`.
    pub fn new(level: u32, col: u64, row: u64, profile: &Profile) -> Option<Self> {
        let extent = profile.tile_extent(level, col, row)?;
        Some(Self {
            level,
            col,
            row,
            extent,
        })
    }

    /// Create a key with an extent computed by the caller.
    ///
    /// The extent is trusted as-is and is what dynamic export requests ask for.
    pub fn with_extent(level: u32, col: u64, row: u64, extent: GeoExtent) -> Self {
        Self {
            level,
            col,
            row,
            extent,
        }
    }

    /// Get the level of detail.
    pub fn level(&self) -> u32 {
        self.level
    }

    /// Get the tile column (X index).
    pub fn col(&self) -> u64 {
        self.col
    }

    /// Get the tile row (Y index).
    pub fn row(&self) -> u64 {
        self.row
    }

    /// Get the geographic extent.
    pub fn extent(&self) -> &GeoExtent {
        &self.extent
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.level, self.col, self.row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_derives_extent() {
        let profile = Profile::global_geodetic();
        let key = TileKey::new(0, 1, 0, &profile).unwrap();
        assert_eq!(key.level(), 0);
        assert_eq!(key.col(), 1);
        assert_eq!(key.row(), 0);
        assert_eq!(*key.extent(), GeoExtent::new(0.0, -90.0, 180.0, 90.0));
    }

    #[test]
    fn test_new_out_of_range() {
        let profile = Profile::global_geodetic();
        assert!(TileKey::new(0, 2, 0, &profile).is_none());
        assert!(TileKey::new(3, 0, 8, &profile).is_none());
    }

    #[test]
    fn test_with_extent() {
        let extent = GeoExtent::new(1.0, 2.0, 3.0, 4.0);
        let key = TileKey::with_extent(5, 10, 7, extent);
        assert_eq!(*key.extent(), extent);
    }

    #[test]
    fn test_display() {
        let key = TileKey::with_extent(5, 10, 7, GeoExtent::new(0.0, 0.0, 1.0, 1.0));
        assert_eq!(key.to_string(), "5/10/7");
    }
}
