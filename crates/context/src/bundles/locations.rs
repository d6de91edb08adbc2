//! Places bundle — where the user is now and the places they care about.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use steward_cache::{CacheOptions, DomainCache};
use steward_core::{
    AppContext, BundleBuilder, BundleError, ContextBundle, Domain, Place, PlaceCategory,
    PlaceSource, bundle_names,
};

use crate::bundles::finish;

pub(crate) const CACHE_KEY: &str = "locations:saved";

pub struct LocationsBundle {
    source: Arc<dyn PlaceSource>,
    cache: Arc<DomainCache>,
    ttl: Duration,
}

impl LocationsBundle {
    pub fn new(source: Arc<dyn PlaceSource>, cache: Arc<DomainCache>, ttl: Duration) -> Self {
        Self { source, cache, ttl }
    }
}

#[async_trait]
impl BundleBuilder for LocationsBundle {
    fn name(&self) -> &str {
        bundle_names::LOCATIONS
    }

    async fn build(
        &self,
        ctx: &AppContext,
        max_tokens: usize,
    ) -> Result<ContextBundle, BundleError> {
        let options = CacheOptions::tagged(self.ttl, Domain::Locations);
        let places = self
            .cache
            .get_or_compute(CACHE_KEY, options, || self.source.saved_places())
            .await?;

        // The current place comes from the turn, not a fresh detector read.
        let mut out = String::from("## Places\n");
        match &ctx.significant_place {
            Some(place) => out.push_str(&format!(
                "Currently at: {} ({})",
                place.name,
                place.category.as_str()
            )),
            None => out.push_str("Current location: not at a saved place"),
        }

        let mut listed: Vec<&Place> = places
            .iter()
            .filter(|p| p.starred || p.category != PlaceCategory::Other)
            .collect();
        listed.sort_by(|a, b| b.starred.cmp(&a.starred).then_with(|| a.name.cmp(&b.name)));
        if !listed.is_empty() {
            out.push_str("\nSaved places:");
            for place in listed {
                let star = if place.starred { " ★" } else { "" };
                let category = place.category.as_str();
                out.push_str(&format!("\n- {}{star} ({category})", place.name));
            }
        }

        Ok(finish(self.name(), out, max_tokens))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use steward_core::{Coordinates, SignificantPlace, SourceError};

    struct FixedPlaces(Vec<Place>);

    #[async_trait]
    impl PlaceSource for FixedPlaces {
        async fn saved_places(&self) -> Result<Vec<Place>, SourceError> {
            Ok(self.0.clone())
        }

        async fn latest_coordinates(&self) -> Result<Option<Coordinates>, SourceError> {
            Ok(None)
        }
    }

    fn place(name: &str, category: PlaceCategory, starred: bool) -> Place {
        Place {
            id: name.into(),
            name: name.into(),
            category,
            latitude: 0.0,
            longitude: 0.0,
            radius_meters: 100.0,
            starred,
        }
    }

    fn bundle() -> LocationsBundle {
        LocationsBundle::new(
            Arc::new(FixedPlaces(vec![
                place("Home", PlaceCategory::Home, false),
                place("Bakery", PlaceCategory::Other, true),
                place("Random Cafe", PlaceCategory::Other, false),
            ])),
            Arc::new(DomainCache::default()),
            Duration::from_secs(30),
        )
    }

    #[tokio::test]
    async fn shows_current_place_and_saved_places() {
        let ctx = AppContext::new("/locations", "").with_significant_place(Some(SignificantPlace {
            name: "Gym".into(),
            category: PlaceCategory::Frequent,
        }));
        let out = bundle().build(&ctx, 500).await.unwrap();
        assert!(out.content.contains("Currently at: Gym (frequent)"));
        assert!(out.content.contains("Bakery ★"));
        assert!(out.content.contains("Home (home)"));
        assert!(!out.content.contains("Random Cafe"));
        // Starred first.
        assert!(out.content.find("Bakery").unwrap() < out.content.find("Home").unwrap());
    }

    #[tokio::test]
    async fn no_current_place_still_renders_saved_list() {
        let ctx = AppContext::new("/locations", "");
        let out = bundle().build(&ctx, 500).await.unwrap();
        assert!(out.content.contains("Current location: not at a saved place"));
        assert!(out.content.contains("Saved places:"));
    }
}
