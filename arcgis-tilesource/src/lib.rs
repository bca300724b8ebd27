//! ArcGIS REST map service tile source.
//!
//! Reads imagery tiles from an ArcGIS Server map service for a host tiling
//! toolkit. The source fetches the service's JSON descriptor once, derives a
//! tiling [`Profile`] from it, and then serves one decoded image per
//! [`TileKey`]:
//!
//! - cached (tiled) services are read from their pre-rendered tile cache
//! - dynamic services are asked to export each tile's bounding box
//!
//! # Example
//!
//! ```ignore
//! use arcgis_tilesource::{
//!     ArcGisTileSource, NoProgress, ReqwestClient, SourceOptions, TileKey, TileSource,
//! };
//!
//! let options = SourceOptions::new("https://host/ArcGIS/rest/services/Layer/MapServer")?;
//! let mut source = ArcGisTileSource::new(options, ReqwestClient::new()?);
//! let profile = source.initialize("", None)?.clone();
//!
//! let key = TileKey::new(0, 0, 0, &profile).expect("root tile");
//! let image = source.create_image(&key, &NoProgress)?;
//! ```
//!
//! After [`TileSource::initialize`] the source is read-only and may be shared
//! across threads; [`Seeder`] uses this to fetch whole level ranges in
//! parallel.

pub mod error;
pub mod http;
pub mod logging;
pub mod map_service;
pub mod options;
pub mod profile;
pub mod progress;
pub mod seed;
pub mod source;
pub mod srs;
pub mod tile;
pub mod url;

pub use error::{ErrorKind, TileSourceError, TileSourceResult};
pub use http::{HttpClient, HttpError, ReqwestClient};
pub use logging::init_logging;
pub use map_service::{LevelOfDetail, MapServiceDescriptor, MapServiceError, TileInfo};
pub use options::SourceOptions;
pub use profile::{GeoExtent, Profile, ProfileError};
pub use progress::{NoProgress, Progress, ProgressToken};
pub use seed::{SeedReport, Seeder};
pub use source::{reconcile_profile, ArcGisTileSource, HeightField, TileSource};
pub use srs::{SpatialReference, SrsResolver, WellKnownSrsResolver};
pub use tile::TileKey;
