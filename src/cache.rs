use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{DayCounts, User};

/// Side cache handed from a fetch-only run to a later email-only run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyCache {
    pub date: NaiveDate,
    pub daily_data: BTreeMap<String, DayCounts>,
    pub students: Vec<User>,
}

impl DailyCache {
    pub fn new<'a>(
        date: NaiveDate,
        roster: &[User],
        daily: impl IntoIterator<Item = (&'a String, &'a DayCounts)>,
    ) -> Self {
        Self {
            date,
            daily_data: daily
                .into_iter()
                .map(|(handle, counts)| (handle.clone(), *counts))
                .collect(),
            students: roster.to_vec(),
        }
    }

    pub fn is_fresh(&self, today: NaiveDate) -> bool {
        self.date == today
    }

    pub fn write(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write cache {}", path.display()))
    }

    /// `Ok(None)` when the cache file does not exist.
    pub fn read(path: &Path) -> anyhow::Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read cache {}", path.display()))?;
        let cache = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse cache {}", path.display()))?;
        Ok(Some(cache))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn sample(date: NaiveDate) -> DailyCache {
        let roster = vec![User {
            name: "Alice".to_string(),
            secondary_id: "R1".to_string(),
            handle: "alice123".to_string(),
        }];
        let daily = HashMap::from([("alice123".to_string(), DayCounts::from_tiers(2, 1, 0))]);
        DailyCache::new(date, &roster, &daily)
    }

    #[test]
    fn written_cache_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daily_cache.json");
        let cache = sample(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        cache.write(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"date\": \"2024-01-15\""));
        assert!(raw.contains("\"lc_id\": \"alice123\""));
        assert_eq!(DailyCache::read(&path).unwrap(), Some(cache));
    }

    #[test]
    fn missing_cache_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(DailyCache::read(&dir.path().join("nope.json")).unwrap(), None);
    }

    #[test]
    fn stale_when_date_differs() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let cache = sample(date);
        assert!(cache.is_fresh(date));
        assert!(!cache.is_fresh(date.succ_opt().unwrap()));
    }

    #[test]
    fn garbage_cache_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daily_cache.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(DailyCache::read(&path).is_err());
    }
}
