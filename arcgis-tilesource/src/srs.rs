//! Spatial reference handles and the resolver that produces them.
//!
//! Map services identify their coordinate system by an EPSG or ESRI well-known
//! id (`wkid`), occasionally by WKT. The tile source only needs to know whether
//! a reference is geographic or projected and whether two references agree,
//! so [`SpatialReference`] carries nothing more. Full CRS parsing belongs to a
//! richer [`SrsResolver`] supplied by the host.

use std::fmt;

/// Web Mercator EPSG code.
pub const WEB_MERCATOR_WKID: u32 = 3857;

/// WGS84 geographic EPSG code.
pub const WGS84_WKID: u32 = 4326;

/// WGS84 plate carrée (equidistant cylindrical) EPSG code.
pub const PLATE_CARREE_WKID: u32 = 32663;

/// ESRI and legacy ids that all mean Web Mercator.
const WEB_MERCATOR_ALIASES: &[u32] = &[102100, 102113, 900913];

/// Whether coordinates are angular or planar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SrsKind {
    /// Longitude/latitude in degrees.
    Geographic,
    /// Easting/northing in linear units.
    Projected,
}

/// How a spatial reference was identified.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SrsId {
    /// Normalized well-known id.
    Wkid(u32),
    /// Well-known text, trimmed.
    Wkt(String),
}

/// A resolved spatial reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SpatialReference {
    id: SrsId,
    kind: SrsKind,
}

impl SpatialReference {
    /// Create a reference from an already-normalized id.
    pub fn new(id: SrsId, kind: SrsKind) -> Self {
        Self { id, kind }
    }

    /// WGS84 longitude/latitude.
    pub fn wgs84() -> Self {
        Self::new(SrsId::Wkid(WGS84_WKID), SrsKind::Geographic)
    }

    /// Spherical Web Mercator.
    pub fn web_mercator() -> Self {
        Self::new(SrsId::Wkid(WEB_MERCATOR_WKID), SrsKind::Projected)
    }

    /// Equidistant cylindrical projection of WGS84.
    pub fn plate_carree() -> Self {
        Self::new(SrsId::Wkid(PLATE_CARREE_WKID), SrsKind::Projected)
    }

    pub fn id(&self) -> &SrsId {
        &self.id
    }

    pub fn wkid(&self) -> Option<u32> {
        match self.id {
            SrsId::Wkid(wkid) => Some(wkid),
            SrsId::Wkt(_) => None,
        }
    }

    pub fn kind(&self) -> SrsKind {
        self.kind
    }

    pub fn is_geographic(&self) -> bool {
        self.kind == SrsKind::Geographic
    }

    pub fn is_projected(&self) -> bool {
        self.kind == SrsKind::Projected
    }
}

impl fmt::Display for SpatialReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            SrsId::Wkid(wkid) => write!(f, "EPSG:{}", wkid),
            SrsId::Wkt(wkt) => {
                let head: String = wkt.chars().take(32).collect();
                write!(f, "WKT[{}...]", head)
            }
        }
    }
}

/// Resolves service-native identifiers into spatial references.
pub trait SrsResolver: Send + Sync {
    /// Resolve an EPSG or ESRI well-known id.
    fn resolve_wkid(&self, wkid: u32) -> Option<SpatialReference>;

    /// Resolve a well-known text definition.
    fn resolve_wkt(&self, wkt: &str) -> Option<SpatialReference>;
}

/// Resolver that classifies ids by the EPSG and ESRI code ranges.
///
/// Code ranges used:
/// - EPSG 4000–4999 and ESRI 104000–104999: geographic
/// - EPSG 2000–32767 (other) and ESRI 102000–103999: projected
///
/// Web Mercator aliases (102100, 102113, 900913) normalize to 3857 so that
/// services published under either id compare equal.
#[derive(Debug, Clone, Copy, Default)]
pub struct WellKnownSrsResolver;

impl SrsResolver for WellKnownSrsResolver {
    fn resolve_wkid(&self, wkid: u32) -> Option<SpatialReference> {
        if WEB_MERCATOR_ALIASES.contains(&wkid) {
            return Some(SpatialReference::web_mercator());
        }

        let kind = match wkid {
            4000..=4999 | 104000..=104999 => SrsKind::Geographic,
            2000..=32767 | 102000..=103999 => SrsKind::Projected,
            _ => return None,
        };
        Some(SpatialReference::new(SrsId::Wkid(wkid), kind))
    }

    fn resolve_wkt(&self, wkt: &str) -> Option<SpatialReference> {
        let wkt = wkt.trim();
        let keyword: String = wkt
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .collect::<String>()
            .to_ascii_uppercase();

        let kind = match keyword.as_str() {
            "GEOGCS" | "GEOGCRS" | "GEODCRS" => SrsKind::Geographic,
            "PROJCS" | "PROJCRS" => SrsKind::Projected,
            _ => return None,
        };
        Some(SpatialReference::new(SrsId::Wkt(wkt.to_string()), kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wgs84_is_geographic() {
        let srs = WellKnownSrsResolver.resolve_wkid(4326).unwrap();
        assert!(srs.is_geographic());
        assert!(!srs.is_projected());
        assert_eq!(srs, SpatialReference::wgs84());
    }

    #[test]
    fn test_web_mercator_aliases_are_equal() {
        let resolver = WellKnownSrsResolver;
        let canonical = resolver.resolve_wkid(3857).unwrap();
        for alias in [102100, 102113, 900913] {
            let srs = resolver.resolve_wkid(alias).unwrap();
            assert_eq!(srs, canonical, "wkid {} should equal 3857", alias);
            assert!(srs.is_projected());
        }
    }

    #[test]
    fn test_utm_is_projected() {
        let srs = WellKnownSrsResolver.resolve_wkid(32633).unwrap();
        assert!(srs.is_projected());
        assert_eq!(srs.wkid(), Some(32633));
    }

    #[test]
    fn test_esri_geographic_range() {
        let srs = WellKnownSrsResolver.resolve_wkid(104199).unwrap();
        assert!(srs.is_geographic());
    }

    #[test]
    fn test_unknown_wkid() {
        assert!(WellKnownSrsResolver.resolve_wkid(0).is_none());
        assert!(WellKnownSrsResolver.resolve_wkid(999_999).is_none());
    }

    #[test]
    fn test_wkt_classification() {
        let resolver = WellKnownSrsResolver;
        let geog = resolver
            .resolve_wkt(r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984"]]"#)
            .unwrap();
        assert!(geog.is_geographic());
        assert_eq!(geog.wkid(), None);

        let proj = resolver
            .resolve_wkt(r#"  PROJCS["NAD_1983_StatePlane",GEOGCS["GCS_North_American_1983"]]"#)
            .unwrap();
        assert!(proj.is_projected());

        assert!(resolver.resolve_wkt("LOCAL_CS[\"unknown\"]").is_none());
    }

    #[test]
    fn test_display() {
        assert_eq!(SpatialReference::web_mercator().to_string(), "EPSG:3857");
    }
}
