//! Calendar bundle — upcoming events within the configured horizon.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use steward_cache::{CacheOptions, DomainCache};
use steward_config::MAX_CALENDAR_HORIZON_DAYS;
use steward_core::{
    AppContext, BundleBuilder, BundleError, CalendarEvent, CalendarSource, ContextBundle, Domain,
    bundle_names,
};

use crate::bundles::finish;
use crate::clock;

pub struct CalendarBundle {
    source: Arc<dyn CalendarSource>,
    cache: Arc<DomainCache>,
    ttl: Duration,
    horizon_days: i64,
}

impl CalendarBundle {
    pub fn new(
        source: Arc<dyn CalendarSource>,
        cache: Arc<DomainCache>,
        ttl: Duration,
        horizon_days: i64,
    ) -> Self {
        Self {
            source,
            cache,
            ttl,
            horizon_days: horizon_days.clamp(1, MAX_CALENDAR_HORIZON_DAYS),
        }
    }

    fn horizon(&self) -> TimeDelta {
        TimeDelta::try_days(self.horizon_days).unwrap_or(TimeDelta::MAX)
    }

    fn render(&self, ctx: &AppContext, events: &[CalendarEvent]) -> String {
        let tz = clock::user_timezone(ctx);
        let horizon = ctx
            .now
            .checked_add_signed(self.horizon())
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let upcoming: Vec<&CalendarEvent> = events
            .iter()
            .filter(|e| e.starts_at >= ctx.now && e.starts_at < horizon)
            .collect();

        let mut out = String::from("## Calendar\n");
        if upcoming.is_empty() {
            out.push_str(&format!(
                "No upcoming events in the next {} days.",
                self.horizon_days
            ));
            return out;
        }

        out.push_str(&format!("Upcoming (next {} days):", self.horizon_days));
        for event in upcoming {
            let start = event.starts_at.with_timezone(&tz);
            out.push_str(&format!("\n- {}: {}", start.format("%a %b %-d, %-I:%M %p"), event.title));
            if let Some(location) = &event.location {
                out.push_str(&format!(" @ {location}"));
            }
        }
        out
    }
}

#[async_trait]
impl BundleBuilder for CalendarBundle {
    fn name(&self) -> &str {
        bundle_names::CALENDAR
    }
    async fn build(
        &self,
        ctx: &AppContext,
        max_tokens: usize,
    ) -> Result<ContextBundle, BundleError> {
        // Fetch from the top of the hour so requests within the same hour
        // share one cache entry.
        let from = ctx
            .now
            .duration_trunc(TimeDelta::hours(1))
            .unwrap_or(ctx.now);
        let to = from
            .checked_add_signed(self.horizon())
            .and_then(|t| t.checked_add_signed(TimeDelta::hours(1)))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let key = format!("calendar:{}:{}d", from.format("%Y-%m-%dT%H"), self.horizon_days);

        let events = self
            .cache
            .get_or_compute(&key, CacheOptions::tagged(self.ttl, Domain::Calendar), || {
                self.source.events_between(from, to)
            })
            .await?;
        Ok(finish(self.name(), self.render(ctx, &events), max_tokens))
    }
}
