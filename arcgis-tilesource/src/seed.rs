//! Bulk tile fetching over a range of levels.
//!
//! [`Seeder`] enumerates every key of the source's profile for a range of
//! levels, optionally limited to a bounding extent, and fetches them on a
//! rayon pool. A warm HTTP cache in front of the service, or a toolkit cache
//! behind the source, is the usual beneficiary.
//!
//! # Example
//!
//! ```ignore
//! let report = Seeder::new(&source, 0..=4)
//!     .within(GeoExtent::new(5.0, 45.0, 11.0, 48.0))
//!     .with_threads(8)
//!     .run(&ProgressToken::new())?;
//! println!("{} fetched, {} missing", report.fetched, report.not_found);
//! ```

use std::ops::RangeInclusive;

use image::DynamicImage;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::error::{ErrorKind, TileSourceError, TileSourceResult};
use crate::profile::GeoExtent;
use crate::progress::Progress;
use crate::source::TileSource;
use crate::tile::TileKey;

/// Outcome counts of a seeding run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    /// Keys enumerated.
    pub requested: usize,
    /// Tiles fetched and decoded.
    pub fetched: usize,
    /// Tiles the service does not have.
    pub not_found: usize,
    /// Tiles that failed for any other reason.
    pub failed: usize,
    /// Tiles skipped or abandoned after cancellation.
    pub cancelled: usize,
}

impl SeedReport {
    fn from_outcome(outcome: &TileSourceResult<DynamicImage>) -> Self {
        let mut report = Self {
            requested: 1,
            ..Self::default()
        };
        match outcome {
            Ok(_) => report.fetched = 1,
            Err(e) => match e.kind() {
                ErrorKind::TileNotFound => report.not_found = 1,
                ErrorKind::Cancelled => report.cancelled = 1,
                _ => report.failed = 1,
            },
        }
        report
    }

    fn merge(self, other: Self) -> Self {
        Self {
            requested: self.requested + other.requested,
            fetched: self.fetched + other.fetched,
            not_found: self.not_found + other.not_found,
            failed: self.failed + other.failed,
            cancelled: self.cancelled + other.cancelled,
        }
    }
}

/// Fetches every tile in a level range from an initialized source.
pub struct Seeder<'a, S: TileSource + ?Sized> {
    source: &'a S,
    levels: RangeInclusive<u32>,
    bounds: Option<GeoExtent>,
    threads: Option<usize>,
}

impl<'a, S: TileSource + ?Sized> Seeder<'a, S> {
    /// Create a seeder for `levels` of `source`.
    pub fn new(source: &'a S, levels: RangeInclusive<u32>) -> Self {
        Self {
            source,
            levels,
            bounds: None,
            threads: None,
        }
    }

    /// Restrict seeding to tiles intersecting `bounds` (profile SRS units).
    pub fn within(mut self, bounds: GeoExtent) -> Self {
        self.bounds = Some(bounds);
        self
    }

    /// Run on a dedicated pool of `threads` workers instead of the global pool.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    /// Enumerate the keys this seeder would fetch, level by level.
    pub fn keys(&self) -> TileSourceResult<Vec<TileKey>> {
        let profile = self
            .source
            .profile()
            .ok_or(TileSourceError::NotInitialized)?;
        let extent = profile.extent();

        let mut keys = Vec::new();
        for level in self.levels.clone() {
            let Some((nx, ny)) = profile.num_tiles(level) else {
                break;
            };

            let (cols, rows) = match &self.bounds {
                Some(b) => {
                    let w = extent.width() / nx as f64;
                    let h = extent.height() / ny as f64;
                    let col_lo = ((b.xmin - extent.xmin) / w).floor().max(0.0) as u64;
                    let col_hi = (((b.xmax - extent.xmin) / w).ceil() as u64).min(nx);
                    let row_lo = ((extent.ymax - b.ymax) / h).floor().max(0.0) as u64;
                    let row_hi = (((extent.ymax - b.ymin) / h).ceil() as u64).min(ny);
                    (col_lo..col_hi, row_lo..row_hi)
                }
                None => (0..nx, 0..ny),
            };

            for row in rows {
                for col in cols.clone() {
                    if let Some(key) = TileKey::new(level, col, row, profile) {
                        if self.bounds.map_or(true, |b| key.extent().intersects(&b)) {
                            keys.push(key);
                        }
                    }
                }
            }
        }

        Ok(keys)
    }

    /// Fetch every key, in parallel.
    ///
    /// Once `progress` is cancelled the remaining keys are counted as
    /// cancelled without being requested.
    pub fn run(&self, progress: &dyn Progress) -> TileSourceResult<SeedReport> {
        let keys = self.keys()?;
        info!(tiles = keys.len(), levels = ?self.levels, "Seeding started");

        let fetch_all = || {
            keys.par_iter()
                .map(|key| {
                    let outcome = if progress.is_cancelled() {
                        Err(TileSourceError::Cancelled)
                    } else {
                        self.source.create_image(key, progress)
                    };
                    if let Err(e) = &outcome {
                        debug!(tile = %key, error = %e, "Seed fetch failed");
                    }
                    SeedReport::from_outcome(&outcome)
                })
                .reduce(SeedReport::default, SeedReport::merge)
        };

        let report = match self.threads {
            Some(threads) => rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| TileSourceError::Configuration(format!("seed pool: {}", e)))?
                .install(fetch_all),
            None => fetch_all(),
        };

        info!(
            fetched = report.fetched,
            not_found = report.not_found,
            failed = report.failed,
            cancelled = report.cancelled,
            "Seeding finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::Profile;
    use crate::progress::{NoProgress, ProgressToken};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Source that answers from the key alone: row 0 exists, everything else is missing.
    struct FakeSource {
        profile: Option<Profile>,
        calls: AtomicUsize,
    }

    impl FakeSource {
        fn initialized() -> Self {
            Self {
                profile: Some(Profile::global_geodetic()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl TileSource for FakeSource {
        fn initialize(
            &mut self,
            _reference_uri: &str,
            _fallback: Option<&Profile>,
        ) -> TileSourceResult<&Profile> {
            Ok(&*self.profile.insert(Profile::global_geodetic()))
        }

        fn profile(&self) -> Option<&Profile> {
            self.profile.as_ref()
        }

        fn pixels_per_tile(&self) -> u32 {
            4
        }

        fn extension(&self) -> &str {
            "png"
        }

        fn create_image(
            &self,
            key: &TileKey,
            _progress: &dyn Progress,
        ) -> TileSourceResult<DynamicImage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if key.row() == 0 {
                Ok(DynamicImage::new_rgba8(4, 4))
            } else {
                Err(TileSourceError::NotFound {
                    url: key.to_string(),
                })
            }
        }
    }

    #[test]
    fn test_keys_cover_each_level() {
        let source = FakeSource::initialized();
        let keys = Seeder::new(&source, 0..=2).keys().unwrap();
        // 2x1 + 4x2 + 8x4
        assert_eq!(keys.len(), 2 + 8 + 32);
        assert_eq!(keys.iter().filter(|k| k.level() == 1).count(), 8);
    }

    #[test]
    fn test_keys_within_bounds() {
        let source = FakeSource::initialized();
        let keys = Seeder::new(&source, 1..=1)
            .within(GeoExtent::new(10.0, 10.0, 20.0, 20.0))
            .keys()
            .unwrap();

        // Level 1 tiles are 90 degrees; (10..20, 10..20) falls in col 2, row 0.
        assert_eq!(keys.len(), 1);
        assert_eq!((keys[0].col(), keys[0].row()), (2, 0));
    }

    #[test]
    fn test_keys_bounds_outside_profile() {
        let source = FakeSource::initialized();
        let keys = Seeder::new(&source, 0..=3)
            .within(GeoExtent::new(500.0, 500.0, 600.0, 600.0))
            .keys()
            .unwrap();
        assert!(keys.is_empty());
    }

    #[test]
    fn test_keys_requires_initialized_source() {
        let source = FakeSource {
            profile: None,
            calls: AtomicUsize::new(0),
        };
        assert!(matches!(
            Seeder::new(&source, 0..=0).keys(),
            Err(TileSourceError::NotInitialized)
        ));
    }

    #[test]
    fn test_run_counts_outcomes() {
        let source = FakeSource::initialized();
        let report = Seeder::new(&source, 0..=1)
            .with_threads(4)
            .run(&NoProgress)
            .unwrap();

        // Level 0: 2 tiles in row 0. Level 1: 4 in row 0, 4 in row 1.
        assert_eq!(
            report,
            SeedReport {
                requested: 10,
                fetched: 6,
                not_found: 4,
                failed: 0,
                cancelled: 0,
            }
        );
        assert_eq!(source.calls.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn test_run_cancelled_skips_fetches() {
        let source = FakeSource::initialized();
        let token = ProgressToken::new();
        token.cancel();

        let report = Seeder::new(&source, 0..=2).run(&token).unwrap();
        assert_eq!(report.cancelled, report.requested);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }
}
