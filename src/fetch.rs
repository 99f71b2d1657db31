use std::collections::HashMap;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::models::{ContestSnapshot, DayCounts, User};
use crate::source::MetricsSource;
use crate::throttle::Throttle;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchedMetrics {
    pub daily: HashMap<String, DayCounts>,
    pub cumulative: HashMap<String, DayCounts>,
    pub contest: HashMap<String, ContestSnapshot>,
}

/// Queries the source for every roster user, one user at a time. A failed
/// query only affects that user's value for that query.
pub async fn fetch_all<S>(
    source: &S,
    roster: &[User],
    date: NaiveDate,
    user_throttle: &Throttle,
) -> FetchedMetrics
where
    S: MetricsSource + ?Sized,
{
    let mut metrics = FetchedMetrics::default();
    let total = roster.len();
    info!(
        users = total,
        pause_ms = user_throttle.interval().as_millis() as u64,
        "fetching metrics"
    );

    for (index, user) in roster.iter().enumerate() {
        user_throttle.wait().await;
        let handle = user.handle.trim();
        info!(
            position = index + 1,
            total,
            name = %user.name,
            handle = %handle,
            "fetching"
        );

        let daily = match source.daily(handle, date).await {
            Ok(Some(counts)) => counts,
            Ok(None) => DayCounts::default(),
            Err(err) => {
                warn!(handle = %handle, error = %err, "daily fetch failed, recording zeros");
                DayCounts::default()
            }
        };
        info!(handle = %handle, daily = %daily, "daily counts");
        metrics.daily.insert(handle.to_string(), daily);

        match source.cumulative(handle).await {
            Ok(Some(counts)) => {
                metrics.cumulative.insert(handle.to_string(), counts);
            }
            Ok(None) => warn!(handle = %handle, "no cumulative stats"),
            Err(err) => warn!(handle = %handle, error = %err, "cumulative fetch failed"),
        }

        match source.contest(handle).await {
            Ok(Some(snapshot)) => {
                metrics.contest.insert(handle.to_string(), snapshot);
            }
            Ok(None) => warn!(handle = %handle, "no contest stats"),
            Err(err) => warn!(handle = %handle, error = %err, "contest fetch failed"),
        }
    }

    metrics
}
