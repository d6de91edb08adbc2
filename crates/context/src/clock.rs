//! Request-local time in the user's timezone.

use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use steward_core::AppContext;
use tracing::warn;

/// The user's timezone, falling back to UTC when the name does not parse.
pub fn user_timezone(ctx: &AppContext) -> Tz {
    ctx.timezone.parse::<Tz>().unwrap_or_else(|_| {
        warn!(timezone = %ctx.timezone, "unknown timezone, rendering in UTC");
        Tz::UTC
    })
}

/// The request time in the user's timezone.
pub fn local_now(ctx: &AppContext) -> DateTime<Tz> {
    ctx.now.with_timezone(&user_timezone(ctx))
}

/// The user's calendar date for the request.
pub fn local_today(ctx: &AppContext) -> NaiveDate {
    local_now(ctx).date_naive()
}
