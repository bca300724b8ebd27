//! Request URL builders for the two ArcGIS fetch styles.
//!
//! # URL Patterns
//!
//! - Cached (tiled) services: `{base}/tile/{level}/{row}/{col}.{format}`
//! - Dynamic services: `{base}/export?bbox={xmin},{ymin},{xmax},{ymax}&format={format}&size={px},{px}&transparent=true&f=image`
//!
//! The tile path puts the row (Y) before the column (X), matching the layout
//! of the server's cache directories.

use crate::profile::GeoExtent;

/// Metadata request for a map service.
pub fn metadata_url(base_url: &str) -> String {
    format!("{}?f=json&pretty=false", base_url)
}

/// Cached tile request.
pub fn tile_url(base_url: &str, level: u32, row: u64, col: u64, format: &str) -> String {
    format!("{}/tile/{}/{}/{}.{}", base_url, level, row, col, format)
}

/// Dynamic export request for a square image of `tile_pixels` pixels.
///
/// Coordinates use the shortest representation that parses back to the same
/// `f64`, so deep-level bounding boxes keep full precision.
pub fn export_url(base_url: &str, extent: &GeoExtent, format: &str, tile_pixels: u32) -> String {
    format!(
        "{}/export?bbox={},{},{},{}&format={}&size={},{}&transparent=true&f=image",
        base_url,
        extent.xmin,
        extent.ymin,
        extent.xmax,
        extent.ymax,
        format,
        tile_pixels,
        tile_pixels
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "http://host/ArcGIS/rest/services/Layer/MapServer";

    #[test]
    fn test_metadata_url() {
        assert_eq!(
            metadata_url(BASE),
            "http://host/ArcGIS/rest/services/Layer/MapServer?f=json&pretty=false"
        );
    }

    #[test]
    fn test_tile_url_root() {
        assert_eq!(
            tile_url(BASE, 0, 0, 0, "png"),
            "http://host/ArcGIS/rest/services/Layer/MapServer/tile/0/0/0.png"
        );
    }

    #[test]
    fn test_tile_url_row_before_col() {
        assert_eq!(
            tile_url(BASE, 5, 7, 10, "png"),
            "http://host/ArcGIS/rest/services/Layer/MapServer/tile/5/7/10.png"
        );
    }

    #[test]
    fn test_export_url() {
        let url = export_url(BASE, &GeoExtent::new(0.0, -30.0, 100.0, 70.0), "png", 256);
        assert_eq!(
            url,
            "http://host/ArcGIS/rest/services/Layer/MapServer/export?bbox=0,-30,100,70&format=png&size=256,256&transparent=true&f=image"
        );
    }

    #[test]
    fn test_export_url_has_no_trailing_format_fragment() {
        let url = export_url(BASE, &GeoExtent::new(0.0, 0.0, 1.0, 1.0), "jpg", 256);
        assert!(url.ends_with("&f=image"));
        assert!(!url.contains("&.jpg"));
    }

    #[test]
    fn test_export_url_keeps_full_precision() {
        let xmin = -20037508.342789244;
        let ymin = 0.1 + 0.2;
        let url = export_url(BASE, &GeoExtent::new(xmin, ymin, 1.0 / 3.0, 1.0), "png", 256);

        let bbox = url
            .split("bbox=")
            .nth(1)
            .and_then(|rest| rest.split('&').next())
            .unwrap();
        let values: Vec<f64> = bbox.split(',').map(|v| v.parse().unwrap()).collect();
        assert_eq!(values, vec![xmin, ymin, 1.0 / 3.0, 1.0]);
    }
}
