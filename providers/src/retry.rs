//! Server-side retry hints.
//!
//! Retrying itself is the caller's job (the judge runs a bounded attempt loop).
//! Providers only report what the server asked for.
//!
//! # Hints
//!
//! - `Retry-After-Ms`: milliseconds, float (preferred when present)
//! - `Retry-After`: whole seconds
//!
//! Hints outside `(0, 60s)` are ignored.

use std::time::Duration;

use reqwest::{StatusCode, header::HeaderMap};

const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name)?.to_str().ok().map(str::trim)
}

fn in_range(delay: Duration) -> Option<Duration> {
    (!delay.is_zero() && delay < MAX_RETRY_AFTER).then_some(delay)
}

/// Server-requested delay from `Retry-After-Ms` or `Retry-After`, if usable.
#[must_use]
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let from_millis = header_str(headers, "retry-after-ms")
        .and_then(|raw| raw.parse::<f64>().ok())
        .filter(|ms| ms.is_finite() && *ms > 0.0)
        .and_then(|ms| in_range(Duration::from_secs_f64(ms / 1000.0)));

    from_millis.or_else(|| {
        header_str(headers, "retry-after")
            .and_then(|raw| raw.parse::<u64>().ok())
            .and_then(|secs| in_range(Duration::from_secs(secs)))
    })
}

/// Statuses where the server is asking us to slow down rather than rejecting the request.
#[must_use]
pub fn is_throttling_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 503)
}

/// Retry hint for a failed response, only honored for throttling statuses.
#[must_use]
pub fn retry_hint(status: StatusCode, headers: &HeaderMap) -> Option<Duration> {
    if is_throttling_status(status) {
        parse_retry_after(headers)
    } else {
        None
    }
}
