//! Significant-place detection by distance to saved places.
//!
//! The user is "at" a place when their latest location fix is fresh and
//! falls inside:
//! - a starred place's own geofence radius, or
//! - the configured threshold of a home, work or frequent place.
//!
//! When several places match, the nearest wins.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use steward_cache::{CacheOptions, DomainCache};
use steward_config::ProximityConfig;
use steward_core::{
    Coordinates, Domain, Place, PlaceCategory, PlaceSource, SignificantPlace,
    SignificantPlaceDetector, SourceError,
};
use tracing::debug;

/// Mean Earth radius in meters.
const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Cache key for saved places; the locations bundle reads the same key.
const PLACES_KEY: &str = "locations:saved";

/// Great-circle distance between two points, in meters.
pub fn haversine_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();
    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * a.sqrt().asin()
}

pub struct ProximityDetector {
    places: Arc<dyn PlaceSource>,
    config: ProximityConfig,
    cache: Option<(Arc<DomainCache>, Duration)>,
    fixed_now: Option<DateTime<Utc>>,
}

impl ProximityDetector {
    pub fn new(places: Arc<dyn PlaceSource>, config: ProximityConfig) -> Self {
        Self {
            places,
            config,
            cache: None,
            fixed_now: None,
        }
    }

    /// Read saved places through `cache` under the locations domain.
    pub fn with_cache(mut self, cache: Arc<DomainCache>, ttl: Duration) -> Self {
        self.cache = Some((cache, ttl));
        self
    }

    /// Judge fix freshness against `now` instead of the wall clock.
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.fixed_now = Some(now);
        self
    }

    async fn saved_places(&self) -> Result<Arc<Vec<Place>>, SourceError> {
        match &self.cache {
            Some((cache, ttl)) => {
                cache
                    .get_or_compute(PLACES_KEY, CacheOptions::tagged(*ttl, Domain::Locations), || {
                        self.places.saved_places()
                    })
                    .await
            }
            None => self.places.saved_places().await.map(Arc::new),
        }
    }

    /// The geofence radius that applies to `place`, if it can be significant.
    fn radius_for(&self, place: &Place) -> Option<f64> {
        if place.starred {
            return Some(place.radius_meters);
        }
        match place.category {
            PlaceCategory::Home | PlaceCategory::Work | PlaceCategory::Frequent => {
                Some(self.config.threshold_meters)
            }
            PlaceCategory::Other => None,
        }
    }

    fn nearest_match<'a>(&self, at: &Coordinates, places: &'a [Place]) -> Option<&'a Place> {
        places
            .iter()
            .filter_map(|place| {
                let radius = self.radius_for(place)?;
                let distance =
                    haversine_meters(at.latitude, at.longitude, place.latitude, place.longitude);
                (distance <= radius).then_some((place, distance))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(place, _)| place)
    }
}

#[async_trait]
impl SignificantPlaceDetector for ProximityDetector {
    async fn current_place(&self) -> Result<Option<SignificantPlace>, SourceError> {
        let Some(fix) = self.places.latest_coordinates().await? else {
            return Ok(None);
        };

        let now = self.fixed_now.unwrap_or_else(Utc::now);
        let max_age =
            TimeDelta::try_minutes(self.config.max_fix_age_minutes).unwrap_or(TimeDelta::MAX);
        if now - fix.recorded_at > max_age {
            debug!(recorded_at = %fix.recorded_at, "location fix too old");
            return Ok(None);
        }

        let places = self.saved_places().await?;
        Ok(self.nearest_match(&fix, &places).map(|place| {
            debug!(place = %place.name, "user is at a significant place");
            SignificantPlace {
                name: place.name.clone(),
                category: place.category,
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Fixture, InMemoryStore};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap()
    }

    fn place(name: &str, category: PlaceCategory, lat: f64, lon: f64, starred: bool) -> Place {
        Place {
            id: name.into(),
            name: name.into(),
            category,
            latitude: lat,
            longitude: lon,
            radius_meters: 100.0,
            starred,
        }
    }

    fn store_at(lat: f64, lon: f64, age_minutes: i64) -> Arc<InMemoryStore> {
        Arc::new(InMemoryStore::from_fixture(Fixture {
            places: vec![
                place("Home", PlaceCategory::Home, 40.7128, -74.0060, false),
                place("Bakery", PlaceCategory::Other, 40.7200, -74.0000, true),
                place("Random", PlaceCategory::Other, 40.7300, -74.0100, false),
            ],
            coordinates: Some(Coordinates {
                latitude: lat,
                longitude: lon,
                recorded_at: now() - TimeDelta::minutes(age_minutes),
            }),
            ..Fixture::default()
        }))
    }

    fn detector(store: Arc<InMemoryStore>) -> ProximityDetector {
        ProximityDetector::new(store, ProximityConfig::default()).at(now())
    }

    #[test]
    fn haversine_known_distance() {
        // One degree of latitude is ~111.2 km.
        let d = haversine_meters(0.0, 0.0, 1.0, 0.0);
        assert!((d - 111_195.0).abs() < 100.0);
        assert_eq!(haversine_meters(10.0, 10.0, 10.0, 10.0), 0.0);
    }

    #[tokio::test]
    async fn inside_home_threshold() {
        // ~55 m north of home.
        let place = detector(store_at(40.7133, -74.0060, 1)).current_place().await.unwrap();
        assert_eq!(
            place,
            Some(SignificantPlace {
                name: "Home".into(),
                category: PlaceCategory::Home,
            })
        );
    }

    #[tokio::test]
    async fn inside_starred_radius() {
        let place = detector(store_at(40.7201, -74.0000, 1)).current_place().await.unwrap();
        assert_eq!(place.map(|p| p.name), Some("Bakery".to_string()));
    }

    #[tokio::test]
    async fn unstarred_other_place_is_ignored() {
        let place = detector(store_at(40.7300, -74.0100, 1)).current_place().await.unwrap();
        assert!(place.is_none());
    }

    #[tokio::test]
    async fn stale_fix_is_ignored() {
        let place = detector(store_at(40.7128, -74.0060, 90)).current_place().await.unwrap();
        assert!(place.is_none());
    }

    #[tokio::test]
    async fn unbounded_fix_age_does_not_panic() {
        let config = ProximityConfig {
            max_fix_age_minutes: i64::MAX,
            ..ProximityConfig::default()
        };
        let detector = ProximityDetector::new(store_at(40.7128, -74.0060, 600), config).at(now());
        let place = detector.current_place().await.unwrap();
        assert_eq!(place.map(|p| p.name), Some("Home".to_string()));
    }

    #[tokio::test]
    async fn no_fix_no_place() {
        let store = Arc::new(InMemoryStore::new());
        assert!(detector(store).current_place().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reads_places_through_cache() {
        let cache = Arc::new(DomainCache::default());
        let detector = detector(store_at(40.7128, -74.0060, 1))
            .with_cache(cache.clone(), Duration::from_secs(30));
        detector.current_place().await.unwrap();
        assert_eq!(cache.keys_in_domain(Domain::Locations), vec![PLACES_KEY.to_string()]);
    }
}
