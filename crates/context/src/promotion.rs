//! Real-time tier promotion.
//!
//! When the user is at a significant place, the locations bundle moves up to
//! the primary tier for this request only. The shared route table is never
//! touched; promotion yields a request-local copy.

use std::borrow::Cow;

use steward_core::{RouteConfig, SignificantPlace, SignificantPlaceDetector, bundle_names};
use tracing::{debug, warn};

/// Ask the detector where the user is. Errors mean "no signal".
pub async fn detect(detector: Option<&dyn SignificantPlaceDetector>) -> Option<SignificantPlace> {
    let detector = detector?;
    match detector.current_place().await {
        Ok(place) => place,
        Err(e) => {
            warn!(error = %e, "significant place check failed, skipping promotion");
            None
        }
    }
}

/// Apply the promotion signal to a route config.
///
/// Returns the borrowed config untouched when there is no signal or
/// locations is already primary.
pub fn apply<'a>(
    config: &'a RouteConfig,
    signal: Option<&SignificantPlace>,
) -> Cow<'a, RouteConfig> {
    let Some(place) = signal else {
        return Cow::Borrowed(config);
    };
    match config.promote(bundle_names::LOCATIONS) {
        Some(promoted) => {
            let from = config.tier_of(bundle_names::LOCATIONS);
            debug!(place = %place.name, ?from, "promoting locations to primary");
            Cow::Owned(promoted)
        }
        None => Cow::Borrowed(config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use steward_core::{PlaceCategory, SourceError};

    struct Fixed(Result<Option<SignificantPlace>, SourceError>);

    #[async_trait]
    impl SignificantPlaceDetector for Fixed {
        async fn current_place(&self) -> Result<Option<SignificantPlace>, SourceError> {
            self.0.clone()
        }
    }

    fn gym() -> SignificantPlace {
        SignificantPlace {
            name: "Gym".into(),
            category: PlaceCategory::Frequent,
        }
    }

    #[tokio::test]
    async fn detector_error_is_no_signal() {
        let detector = Fixed(Err(SourceError::Unavailable("gps".into())));
        assert!(detect(Some(&detector)).await.is_none());
        assert!(detect(None).await.is_none());
    }

    #[tokio::test]
    async fn detector_place_is_returned() {
        let detector = Fixed(Ok(Some(gym())));
        assert_eq!(detect(Some(&detector)).await, Some(gym()));
    }

    #[test]
    fn promotes_into_a_copy() {
        let config = RouteConfig::new(&["grocery"], &["locations"], &["tasks"]);
        let applied = apply(&config, Some(&gym()));
        assert!(matches!(applied, Cow::Owned(_)));
        assert_eq!(applied.primary, vec!["grocery", "locations"]);
        assert!(applied.secondary.is_empty());
        // Original untouched.
        assert_eq!(config.secondary, vec!["locations"]);
    }

    #[test]
    fn already_primary_or_no_signal_borrows() {
        let config = RouteConfig::new(&["locations"], &["calendar"], &[]);
        assert!(matches!(apply(&config, Some(&gym())), Cow::Borrowed(_)));
        let other = RouteConfig::new(&["tasks"], &[], &[]);
        assert!(matches!(apply(&other, None), Cow::Borrowed(_)));
    }
}
