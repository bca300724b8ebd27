//! The ArcGIS tile source.
//!
//! [`ArcGisTileSource`] reads the service descriptor once when it is built,
//! settles on a [`Profile`] in [`TileSource::initialize`], and from then on
//! answers [`TileSource::create_image`] calls from any number of threads.
//!
//! # Lifecycle
//!
//! ```text
//! new()  ── GET {url}?f=json ──► descriptor (or a recorded failure)
//! initialize(&mut self)       ──► profile fixed
//! create_image(&self) × N     ──► tile/{level}/{row}/{col}.{fmt}  or  export?bbox=...
//! ```
//!
//! `initialize` takes `&mut self` and every fetch takes `&self`, so the
//! borrow checker guarantees the state is frozen before workers share it.

use image::{DynamicImage, ImageBuffer, Luma};
use tracing::{debug, info, warn};

use crate::error::{ErrorKind, TileSourceError, TileSourceResult};
use crate::http::{HttpClient, HttpError};
use crate::map_service::{ErrorEnvelope, MapServiceDescriptor, MapServiceError, DEFAULT_FORMAT};
use crate::options::SourceOptions;
use crate::profile::{Profile, DEFAULT_TILE_PIXELS};
use crate::progress::Progress;
use crate::srs::{SrsResolver, WellKnownSrsResolver};
use crate::tile::TileKey;
use crate::url::{export_url, tile_url};

/// Elevation raster, one `f32` height per sample.
pub type HeightField = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Capabilities a tile source offers to the host toolkit.
pub trait TileSource: Send + Sync {
    /// Fix the profile this source publishes.
    ///
    /// # Arguments
    ///
    /// * `reference_uri` - Location of the document that declared the source
    /// * `fallback` - Profile to use when neither an override nor the service
    ///   supplies one; global geodetic when `None`
    fn initialize(
        &mut self,
        reference_uri: &str,
        fallback: Option<&Profile>,
    ) -> TileSourceResult<&Profile>;

    /// The profile fixed by `initialize`.
    fn profile(&self) -> Option<&Profile>;

    /// Width and height of the tiles this source produces.
    fn pixels_per_tile(&self) -> u32;

    /// File extension of the images this source produces.
    fn extension(&self) -> &str;

    /// Fetch and decode the image for `key`.
    fn create_image(&self, key: &TileKey, progress: &dyn Progress)
        -> TileSourceResult<DynamicImage>;

    /// Fetch the elevation grid for `key`.
    fn create_height_field(
        &self,
        _key: &TileKey,
        _progress: &dyn Progress,
    ) -> TileSourceResult<HeightField> {
        Err(TileSourceError::NotImplemented("height fields"))
    }

    /// Like [`TileSource::create_image`], but logs failures and returns `None`.
    fn read_image(&self, key: &TileKey, progress: &dyn Progress) -> Option<DynamicImage> {
        match self.create_image(key, progress) {
            Ok(image) => Some(image),
            Err(e) => {
                match &e {
                    // Source-wide conditions; construction already warned about metadata.
                    TileSourceError::Metadata(_) | TileSourceError::NotInitialized => {
                        debug!(tile = %key, error = %e, "Tile source unavailable")
                    }
                    _ if matches!(e.kind(), ErrorKind::TileNotFound | ErrorKind::Cancelled) => {
                        debug!(tile = %key, error = %e, "No image for tile")
                    }
                    _ => warn!(tile = %key, error = %e, "Failed to create tile image"),
                }
                None
            }
        }
    }
}

/// Choose the profile a source publishes.
///
/// In order: an explicit well-known `override_id`; the descriptor's own
/// profile (squared for dynamic services, whose export endpoint always returns
/// the requested pixel size whatever the bbox aspect); the `fallback`.
pub fn reconcile_profile(
    override_id: Option<&str>,
    descriptor: Option<&MapServiceDescriptor>,
    fallback: &Profile,
) -> TileSourceResult<Profile> {
    if let Some(id) = override_id.filter(|id| !id.trim().is_empty()) {
        return Profile::from_well_known(id)
            .map_err(|e| TileSourceError::Configuration(e.to_string()));
    }

    Ok(match descriptor {
        Some(descriptor) if descriptor.is_tiled() => descriptor.profile().clone(),
        Some(descriptor) => descriptor.profile().squared(),
        None => fallback.clone(),
    })
}

/// Tile source backed by an ArcGIS Server REST map service.
///
/// # Example
///
/// ```no_run
/// use arcgis_tilesource::{
///     ArcGisTileSource, NoProgress, ReqwestClient, SourceOptions, TileKey, TileSource,
/// };
///
/// let options = SourceOptions::new("http://host/ArcGIS/rest/services/Layer/MapServer").unwrap();
/// let mut source = ArcGisTileSource::new(options, ReqwestClient::new().unwrap());
/// let profile = source.initialize("", None).unwrap().clone();
///
/// let key = TileKey::new(0, 0, 0, &profile).unwrap();
/// let image = source.create_image(&key, &NoProgress);
/// ```
pub struct ArcGisTileSource<C: HttpClient> {
    options: SourceOptions,
    client: C,
    descriptor: Result<MapServiceDescriptor, MapServiceError>,
    profile: Option<Profile>,
}

impl<C: HttpClient> ArcGisTileSource<C> {
    /// Create a source, fetching the service descriptor immediately.
    ///
    /// A failed fetch is logged once and leaves the source degraded: every
    /// `create_image` then fails without touching the network.
    pub fn new(options: SourceOptions, client: C) -> Self {
        Self::with_resolver(options, client, &WellKnownSrsResolver)
    }

    /// Create a source using a custom spatial reference resolver.
    pub fn with_resolver<R>(options: SourceOptions, client: C, resolver: &R) -> Self
    where
        R: SrsResolver + ?Sized,
    {
        let descriptor = MapServiceDescriptor::fetch(options.url(), &client, resolver);

        match &descriptor {
            Ok(d) => info!(
                url = options.url(),
                tiled = d.is_tiled(),
                format = d.tile_info().format(),
                tile_pixels = d.tile_info().tile_pixels(),
                "Map service initialized"
            ),
            Err(e) => warn!(
                url = options.url(),
                error = %e,
                "Map service initialization failed"
            ),
        }

        Self {
            options,
            client,
            descriptor,
            profile: None,
        }
    }

    pub fn options(&self) -> &SourceOptions {
        &self.options
    }

    /// The parsed service descriptor, or why it could not be built.
    pub fn descriptor(&self) -> Result<&MapServiceDescriptor, &MapServiceError> {
        self.descriptor.as_ref()
    }

    /// Descriptor failure message, empty when the service initialized.
    pub fn error_message(&self) -> String {
        match &self.descriptor {
            Ok(_) => String::new(),
            Err(e) => e.to_string(),
        }
    }

    /// Request URL for `key` against the live descriptor.
    pub fn tile_request_url(&self, key: &TileKey) -> TileSourceResult<String> {
        let descriptor = self
            .descriptor
            .as_ref()
            .map_err(|e| TileSourceError::Metadata(e.clone()))?;
        let info = descriptor.tile_info();

        Ok(if descriptor.is_tiled() {
            tile_url(
                descriptor.base_url(),
                key.level(),
                key.row(),
                key.col(),
                info.format(),
            )
        } else {
            export_url(
                descriptor.base_url(),
                key.extent(),
                info.format(),
                info.tile_pixels(),
            )
        })
    }

    fn fetch_image(&self, url: String, progress: &dyn Progress) -> TileSourceResult<DynamicImage> {
        let bytes = self.client.get(&url, progress)?;

        if progress.is_cancelled() {
            return Err(TileSourceError::Cancelled);
        }
        if bytes.is_empty() {
            return Err(TileSourceError::NotFound { url });
        }
        if let Some(envelope) = service_error(&bytes) {
            if envelope.error.code == 404 {
                return Err(TileSourceError::NotFound { url });
            }
            debug!(url = %url, message = %envelope.error.message, "Service reported tile error");
            return Err(TileSourceError::Network(HttpError::Status {
                status: u16::try_from(envelope.error.code).unwrap_or(500),
                url,
            }));
        }

        let image = image::load_from_memory(&bytes).map_err(|e| TileSourceError::Decode {
            url: url.clone(),
            reason: e.to_string(),
        })?;

        let expected = self.pixels_per_tile();
        if image.width() != expected || image.height() != expected {
            // The toolkit rescales; an odd size is not an error.
            debug!(
                url = %url,
                width = image.width(),
                height = image.height(),
                expected,
                "Tile size differs from service tile size"
            );
        }

        Ok(image)
    }
}

impl<C: HttpClient> TileSource for ArcGisTileSource<C> {
    fn initialize(
        &mut self,
        reference_uri: &str,
        fallback: Option<&Profile>,
    ) -> TileSourceResult<&Profile> {
        let fallback = fallback.cloned().unwrap_or_else(Profile::global_geodetic);
        let profile = reconcile_profile(
            self.options.profile(),
            self.descriptor.as_ref().ok(),
            &fallback,
        )?;

        info!(
            url = self.options.url(),
            reference_uri,
            profile = %profile,
            "ArcGIS source profile selected"
        );
        Ok(&*self.profile.insert(profile))
    }

    fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    fn pixels_per_tile(&self) -> u32 {
        self.descriptor
            .as_ref()
            .map(|d| d.tile_info().tile_pixels())
            .unwrap_or(DEFAULT_TILE_PIXELS)
    }

    fn extension(&self) -> &str {
        self.descriptor
            .as_ref()
            .map(|d| d.tile_info().format())
            .unwrap_or(DEFAULT_FORMAT)
    }

    fn create_image(
        &self,
        key: &TileKey,
        progress: &dyn Progress,
    ) -> TileSourceResult<DynamicImage> {
        let url = self.tile_request_url(key)?;
        if self.profile.is_none() {
            return Err(TileSourceError::NotInitialized);
        }

        debug!(tile = %key, url = %url, "Requesting tile");
        self.fetch_image(url, progress)
    }
}

/// Parse an ArcGIS error document masquerading as a tile body.
fn service_error(bytes: &[u8]) -> Option<ErrorEnvelope> {
    let first = bytes.iter().find(|b| !b.is_ascii_whitespace())?;
    if *first != b'{' {
        return None;
    }
    serde_json::from_slice(bytes).ok()
}
