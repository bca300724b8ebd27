//! Construction options for an ArcGIS tile source.
//!
//! The host toolkit hands a source its options as string key/value pairs.
//! Two keys are recognized:
//!
//! | key       | effect                                                        |
//! |-----------|---------------------------------------------------------------|
//! | `url`     | REST map service URL, e.g. `http://host/ArcGIS/rest/services/Layer/MapServer` |
//! | `profile` | optional well-known profile id overriding the service's own   |
//!
//! Options may also be read from a section of an INI file:
//!
//! ```ini
//! [arcgis]
//! url = http://host/ArcGIS/rest/services/Layer/MapServer
//! profile = global-geodetic
//! ```

use std::path::Path;

use ini::Ini;
use tracing::debug;

use crate::error::TileSourceError;

/// Option key for the map service URL.
pub const URL_KEY: &str = "url";

/// Option key for the profile override.
pub const PROFILE_KEY: &str = "profile";

/// INI section read by [`SourceOptions::from_ini_file`].
pub const DEFAULT_SECTION: &str = "arcgis";

/// Validated options for [`crate::ArcGisTileSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceOptions {
    url: String,
    profile: Option<String>,
}

impl SourceOptions {
    /// Create options for a service URL.
    ///
    /// Trailing slashes are removed. The URL must be absolute `http` or `https`.
    pub fn new(url: impl Into<String>) -> Result<Self, TileSourceError> {
        let url = url.into();
        let url = url.trim().trim_end_matches('/');

        if url.is_empty() {
            return Err(TileSourceError::Configuration(
                "the 'url' option is required".to_string(),
            ));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(TileSourceError::Configuration(format!(
                "'{}' is not an http(s) URL",
                url
            )));
        }

        Ok(Self {
            url: url.to_string(),
            profile: None,
        })
    }

    /// Override the profile derived from the service.
    ///
    /// An empty id clears the override. The id itself is validated when the
    /// source is initialized.
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        let profile = profile.into();
        let profile = profile.trim();
        self.profile = (!profile.is_empty()).then(|| profile.to_string());
        self
    }

    /// Build options from toolkit key/value pairs.
    ///
    /// Unknown keys are ignored.
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self, TileSourceError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut url = None;
        let mut profile = None;

        for (key, value) in pairs {
            match key.trim().to_ascii_lowercase().as_str() {
                URL_KEY => url = Some(value),
                PROFILE_KEY => profile = Some(value),
                other => debug!(key = other, "Ignoring unknown ArcGIS option"),
            }
        }

        let options = Self::new(url.unwrap_or_default())?;
        Ok(match profile {
            Some(profile) => options.with_profile(profile),
            None => options,
        })
    }

    /// Parse options from INI text.
    ///
    /// # Arguments
    ///
    /// * `content` - INI document
    /// * `section` - Section holding the options
    pub fn from_ini_str(content: &str, section: &str) -> Result<Self, TileSourceError> {
        let ini = Ini::load_from_str(content)
            .map_err(|e| TileSourceError::Configuration(format!("invalid INI: {}", e)))?;
        Self::from_ini(&ini, section)
    }

    /// Load options from the `[arcgis]` section of an INI file.
    pub fn from_ini_file(path: &Path) -> Result<Self, TileSourceError> {
        let ini = Ini::load_from_file(path).map_err(|e| {
            TileSourceError::Configuration(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_ini(&ini, DEFAULT_SECTION)
    }

    fn from_ini(ini: &Ini, section: &str) -> Result<Self, TileSourceError> {
        let properties = ini.section(Some(section)).ok_or_else(|| {
            TileSourceError::Configuration(format!("missing [{}] section", section))
        })?;
        Self::from_pairs(properties.iter())
    }

    /// Map service URL without a trailing slash.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Profile override, if any.
    pub fn profile(&self) -> Option<&str> {
        self.profile.as_deref()
    }
}
