//! ArcGIS REST map service metadata.
//!
//! A map service describes itself at `{url}?f=json`. The parts this crate
//! needs are the full extent, its spatial reference and, for cached services,
//! the `tileInfo` block describing the tile grid:
//!
//! ```json
//! {
//!   "mapName": "Layers",
//!   "fullExtent": { "xmin": -180, "ymin": -90, "xmax": 180, "ymax": 90,
//!                   "spatialReference": { "wkid": 4326 } },
//!   "tileInfo": { "rows": 256, "cols": 256, "format": "PNG24",
//!                 "origin": { "x": -180, "y": 90 },
//!                 "spatialReference": { "wkid": 4326 },
//!                 "lods": [ { "level": 0, "resolution": 0.703125, "scale": 295497593.05875 } ] }
//! }
//! ```
//!
//! Services without `tileInfo` render on demand through `export` and are
//! described by a single root tile over the full extent.

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::http::{HttpClient, HttpError};
use crate::profile::{GeoExtent, Profile, ProfileError, DEFAULT_TILE_PIXELS};
use crate::progress::NoProgress;
use crate::srs::{SpatialReference, SrsResolver};
use crate::url::metadata_url;

/// Format used by dynamic services and cached services that omit one.
pub const DEFAULT_FORMAT: &str = "png";

/// Relative slack when deciding whether an extent is an exact multiple of
/// the root tile span.
const TILE_COUNT_TOLERANCE: f64 = 1e-6;

/// Errors raised while initializing a map service descriptor.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MapServiceError {
    /// The metadata request failed.
    #[error("Failed to fetch service metadata: {0}")]
    Network(#[from] HttpError),

    /// The service answered with an ArcGIS error document.
    #[error("Service reported error {code}: {message}")]
    ServiceReported { code: i64, message: String },

    /// The metadata is not valid JSON of the expected shape.
    #[error("Failed to parse service metadata: {0}")]
    Parse(String),

    /// `fullExtent` is absent or incomplete.
    #[error("Service metadata has no complete fullExtent")]
    MissingFullExtent,

    /// The spatial reference could not be resolved.
    #[error("Unknown spatial reference: {0}")]
    UnknownSrs(String),

    /// `tileInfo.rows` and `tileInfo.cols` differ.
    #[error("Tiles are not square ({rows} rows x {cols} cols)")]
    NonSquareTiles { rows: u32, cols: u32 },

    /// The derived profile violates its invariants.
    #[error("Invalid profile: {0}")]
    InvalidProfile(#[from] ProfileError),
}

impl MapServiceError {
    /// True when the metadata could not be obtained at all, as opposed to
    /// being obtained but inconsistent.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            MapServiceError::Network(_)
                | MapServiceError::ServiceReported { .. }
                | MapServiceError::Parse(_)
        )
    }
}

impl From<serde_json::Error> for MapServiceError {
    fn from(e: serde_json::Error) -> Self {
        MapServiceError::Parse(e.to_string())
    }
}

// ----------------------------------------------------------------------------
// Wire format
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceJson {
    full_extent: Option<ExtentJson>,
    tile_info: Option<TileInfoJson>,
    map_name: Option<String>,
    copyright_text: Option<String>,
    error: Option<ErrorJson>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtentJson {
    xmin: Option<f64>,
    ymin: Option<f64>,
    xmax: Option<f64>,
    ymax: Option<f64>,
    spatial_reference: Option<SpatialReferenceJson>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpatialReferenceJson {
    wkid: Option<u32>,
    latest_wkid: Option<u32>,
    wkt: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TileInfoJson {
    rows: u32,
    cols: u32,
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    lods: Vec<LodJson>,
    origin: Option<PointJson>,
    spatial_reference: Option<SpatialReferenceJson>,
}

#[derive(Debug, Deserialize)]
struct LodJson {
    level: u32,
    resolution: f64,
    #[serde(default)]
    scale: f64,
}

#[derive(Debug, Deserialize)]
struct PointJson {
    x: f64,
    y: f64,
}

/// ArcGIS error document: `{"error": {"code": 404, "message": "...", "details": []}}`.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorJson {
    pub(crate) code: i64,
    #[serde(default)]
    pub(crate) message: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub(crate) error: ErrorJson,
}

// ----------------------------------------------------------------------------
// Descriptor
// ----------------------------------------------------------------------------

/// One entry of a cached service's level-of-detail table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelOfDetail {
    pub level: u32,
    /// Map units per pixel.
    pub resolution: f64,
    /// Scale denominator.
    pub scale: f64,
}

/// Tile layout published by the service.
#[derive(Debug, Clone, PartialEq)]
pub struct TileInfo {
    tile_pixels: u32,
    format: String,
    lods: Vec<LevelOfDetail>,
}

impl TileInfo {
    fn dynamic() -> Self {
        Self {
            tile_pixels: DEFAULT_TILE_PIXELS,
            format: DEFAULT_FORMAT.to_string(),
            lods: Vec::new(),
        }
    }

    /// Width and height of a tile in pixels.
    pub fn tile_pixels(&self) -> u32 {
        self.tile_pixels
    }

    /// Image format, lowercased with every `png*` variant collapsed to `png`.
    pub fn format(&self) -> &str {
        &self.format
    }

    /// Level-of-detail table, in the order the service lists it.
    pub fn lods(&self) -> &[LevelOfDetail] {
        &self.lods
    }
}

/// Parsed description of a map service.
#[derive(Debug, Clone, PartialEq)]
pub struct MapServiceDescriptor {
    base_url: String,
    tiled: bool,
    tile_info: TileInfo,
    profile: Profile,
    map_name: Option<String>,
    copyright_text: Option<String>,
}

impl MapServiceDescriptor {
    /// Fetch and parse `{base_url}?f=json`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Map service URL without a trailing slash
    /// * `client` - HTTP client used for the single metadata request
    /// * `resolver` - Resolves the service's spatial reference ids
    pub fn fetch<C, R>(base_url: &str, client: &C, resolver: &R) -> Result<Self, MapServiceError>
    where
        C: HttpClient + ?Sized,
        R: SrsResolver + ?Sized,
    {
        let url = metadata_url(base_url);
        debug!(url = %url, "Fetching map service metadata");

        let body = client.get(&url, &NoProgress)?;
        Self::from_json(base_url, &body, resolver)
    }

    /// Parse a metadata document already in hand.
    pub fn from_json<R>(base_url: &str, body: &[u8], resolver: &R) -> Result<Self, MapServiceError>
    where
        R: SrsResolver + ?Sized,
    {
        let json: ServiceJson = serde_json::from_slice(body)?;

        if let Some(error) = json.error {
            return Err(MapServiceError::ServiceReported {
                code: error.code,
                message: error.message,
            });
        }

        let full_extent_json = json.full_extent.ok_or(MapServiceError::MissingFullExtent)?;
        let full_extent = match (
            full_extent_json.xmin,
            full_extent_json.ymin,
            full_extent_json.xmax,
            full_extent_json.ymax,
        ) {
            (Some(xmin), Some(ymin), Some(xmax), Some(ymax)) => {
                GeoExtent::new(xmin, ymin, xmax, ymax)
            }
            _ => return Err(MapServiceError::MissingFullExtent),
        };

        let (tiled, tile_info, profile) = match json.tile_info {
            Some(info) => {
                let srs = resolve_srs(
                    info.spatial_reference
                        .as_ref()
                        .or(full_extent_json.spatial_reference.as_ref()),
                    resolver,
                )?;
                let (tile_info, profile) = tiled_profile(info, full_extent, srs)?;
                (true, tile_info, profile)
            }
            None => {
                let srs = resolve_srs(full_extent_json.spatial_reference.as_ref(), resolver)?;
                let tile_info = TileInfo::dynamic();
                let profile = Profile::new(srs, full_extent, 1, 1, tile_info.tile_pixels)?;
                (false, tile_info, profile)
            }
        };

        Ok(Self {
            base_url: base_url.to_string(),
            tiled,
            tile_info,
            profile,
            map_name: json.map_name,
            copyright_text: json.copyright_text.filter(|s| !s.is_empty()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// True for cached services that serve pre-rendered tiles.
    pub fn is_tiled(&self) -> bool {
        self.tiled
    }

    pub fn tile_info(&self) -> &TileInfo {
        &self.tile_info
    }

    /// Profile derived from the metadata, before any squaring.
    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn map_name(&self) -> Option<&str> {
        self.map_name.as_deref()
    }

    /// Attribution text, when the service publishes one.
    pub fn copyright_text(&self) -> Option<&str> {
        self.copyright_text.as_deref()
    }
}

/// Lowercase a format name and collapse `png8`/`png24`/`png32` to `png`.
pub fn collapse_format(raw: &str) -> String {
    let format = raw.trim().to_ascii_lowercase();
    if format.is_empty() || format.starts_with("png") {
        DEFAULT_FORMAT.to_string()
    } else {
        format
    }
}

fn resolve_srs<R>(
    json: Option<&SpatialReferenceJson>,
    resolver: &R,
) -> Result<SpatialReference, MapServiceError>
where
    R: SrsResolver + ?Sized,
{
    let json = json.ok_or_else(|| MapServiceError::UnknownSrs("no spatialReference".to_string()))?;

    json.wkid
        .and_then(|wkid| resolver.resolve_wkid(wkid))
        .or_else(|| json.latest_wkid.and_then(|wkid| resolver.resolve_wkid(wkid)))
        .or_else(|| json.wkt.as_deref().and_then(|wkt| resolver.resolve_wkt(wkt)))
        .ok_or_else(|| {
            let id = match (json.wkid, json.latest_wkid, &json.wkt) {
                (Some(wkid), _, _) | (None, Some(wkid), _) => format!("wkid {}", wkid),
                (None, None, Some(wkt)) => format!("wkt {}", wkt),
                (None, None, None) => "empty spatialReference".to_string(),
            };
            MapServiceError::UnknownSrs(id)
        })
}

/// Build the tile info and grid-aligned profile of a cached service.
fn tiled_profile(
    info: TileInfoJson,
    full_extent: GeoExtent,
    srs: SpatialReference,
) -> Result<(TileInfo, Profile), MapServiceError> {
    if info.rows != info.cols {
        return Err(MapServiceError::NonSquareTiles {
            rows: info.rows,
            cols: info.cols,
        });
    }
    let tile_pixels = info.rows;

    let lods: Vec<LevelOfDetail> = info
        .lods
        .iter()
        .map(|lod| LevelOfDetail {
            level: lod.level,
            resolution: lod.resolution,
            scale: lod.scale,
        })
        .collect();

    let tile_info = TileInfo {
        tile_pixels,
        format: collapse_format(info.format.as_deref().unwrap_or(DEFAULT_FORMAT)),
        lods,
    };

    let root_resolution = tile_info
        .lods
        .iter()
        .find(|lod| lod.level == 0)
        .or_else(|| tile_info.lods.iter().min_by_key(|lod| lod.level))
        .map(|lod| lod.resolution)
        .filter(|r| r.is_finite() && *r > 0.0);

    let profile = match root_resolution {
        Some(resolution) => {
            // The grid hangs from its upper-left origin; the full extent only
            // tells us how far it reaches.
            let (left, top) = info
                .origin
                .map(|o| (o.x, o.y))
                .unwrap_or((full_extent.xmin, full_extent.ymax));
            let span = f64::from(tile_pixels) * resolution;
            let tiles_x = root_tile_count(full_extent.xmax - left, span);
            let tiles_y = root_tile_count(top - full_extent.ymin, span);
            let grid = GeoExtent::new(
                left,
                top - f64::from(tiles_y) * span,
                left + f64::from(tiles_x) * span,
                top,
            );
            Profile::new(srs, grid, tiles_x, tiles_y, tile_pixels)?
        }
        None => Profile::new(srs, full_extent, 1, 1, tile_pixels)?,
    };

    Ok((tile_info, profile))
}

/// Number of root cells of size `span` needed to cover `length`.
fn root_tile_count(length: f64, span: f64) -> u32 {
    let ratio = length / span;
    let nearest = ratio.round();
    let count = if (ratio - nearest).abs() <= TILE_COUNT_TOLERANCE * nearest.max(1.0) {
        nearest
    } else {
        ratio.ceil()
    };
    // NaN and negative spans saturate to 0 here.
    (count as u32).max(1)
}
