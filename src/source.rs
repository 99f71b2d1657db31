use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Local, NaiveDate, TimeZone};
use reqwest::header::{HeaderMap, HeaderValue, REFERER};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::config::ApiConfig;
use crate::models::{ContestSnapshot, DayCounts, Difficulty, LastContest};
use crate::throttle::Throttle;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(reqwest::StatusCode),
    #[error("graphql error: {0}")]
    Graphql(String),
    #[error("invalid client configuration: {0}")]
    Config(String),
}

pub type SourceResult<T> = Result<T, SourceError>;

/// Per-user statistics provider. `Ok(None)` means the platform had nothing
/// for this user.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn daily(&self, handle: &str, date: NaiveDate) -> SourceResult<Option<DayCounts>>;

    async fn cumulative(&self, handle: &str) -> SourceResult<Option<DayCounts>>;

    async fn contest(&self, handle: &str) -> SourceResult<Option<ContestSnapshot>>;
}

const OVERALL_QUERY: &str = r#"
query userProblemsSolved($username: String!) {
  matchedUser(username: $username) {
    submitStatsGlobal {
      acSubmissionNum {
        difficulty count
      }
    }
  }
}"#;

const RECENT_QUERY: &str = r#"
query recentAcSubmissions($username: String!, $limit: Int!) {
  recentAcSubmissionList(username: $username, limit: $limit) {
    id
    timestamp
    title
    titleSlug
  }
}"#;

const DIFFICULTY_QUERY: &str = r#"
query questionDifficulty($titleSlug: String!) {
  question(titleSlug: $titleSlug) {
    difficulty
  }
}"#;

const CONTEST_QUERY: &str = r#"
query userContestRanking($username: String!) {
  userContestRanking(username: $username) {
    rating
    globalRanking
    attendedContestsCount
  }
  userContestRankingHistory(username: $username) {
    attended
    rating
    ranking
    problemsSolved
    totalProblems
    contest { title startTime }
  }
}"#;

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OverallData {
    matched_user: Option<MatchedUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MatchedUser {
    submit_stats_global: SubmitStats,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitStats {
    ac_submission_num: Vec<DifficultyCount>,
}

#[derive(Debug, Deserialize)]
pub struct DifficultyCount {
    pub difficulty: String,
    pub count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecentData {
    recent_ac_submission_list: Option<Vec<RecentSubmission>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentSubmission {
    #[serde(deserialize_with = "de_timestamp")]
    pub timestamp: i64,
    pub title_slug: String,
}

#[derive(Debug, Deserialize)]
struct QuestionData {
    question: Option<Question>,
}

#[derive(Debug, Deserialize)]
struct Question {
    difficulty: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContestData {
    user_contest_ranking: Option<Ranking>,
    user_contest_ranking_history: Option<Vec<HistoryEntry>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ranking {
    rating: Option<f64>,
    global_ranking: Option<u64>,
    attended_contests_count: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[serde(default)]
    pub attended: bool,
    pub ranking: Option<u64>,
    pub problems_solved: Option<u32>,
    pub total_problems: Option<u32>,
    pub contest: ContestInfo,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContestInfo {
    pub title: String,
    pub start_time: Option<i64>,
}

/// The API sends timestamps as strings; accept numbers too.
fn de_timestamp<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(value) => Ok(value),
        Raw::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Slugs of problems accepted on `date` in `tz`, first occurrence order,
/// without duplicates.
pub fn solved_slugs_on<Tz: TimeZone>(
    submissions: &[RecentSubmission],
    date: NaiveDate,
    tz: &Tz,
) -> Vec<String> {
    let mut slugs: Vec<String> = Vec::new();
    for submission in submissions {
        let Some(at) = tz.timestamp_opt(submission.timestamp, 0).single() else {
            continue;
        };
        if at.date_naive() == date && !slugs.contains(&submission.title_slug) {
            slugs.push(submission.title_slug.clone());
        }
    }
    slugs
}

pub fn tally_overall(counts: &[DifficultyCount]) -> DayCounts {
    let lookup = |label: &str| {
        counts
            .iter()
            .find(|entry| entry.difficulty == label)
            .map_or(0, |entry| entry.count)
    };
    DayCounts {
        easy: lookup("Easy"),
        medium: lookup("Medium"),
        hard: lookup("Hard"),
        total: lookup("All"),
    }
}

/// Most recent attended contest by start time. Entries without a start time
/// sort last; among equal start times the later list entry wins.
pub fn select_last_contest(history: &[HistoryEntry]) -> Option<LastContest> {
    history
        .iter()
        .enumerate()
        .filter(|(_, entry)| entry.attended)
        .max_by_key(|(index, entry)| (entry.contest.start_time.unwrap_or(i64::MIN), *index))
        .map(|(_, entry)| LastContest {
            name: entry.contest.title.clone(),
            rank: entry.ranking,
            problems_solved: entry.problems_solved,
            total_problems: entry.total_problems,
        })
}

fn round_rating(rating: f64) -> f64 {
    (rating * 10.0).round() / 10.0
}

fn contest_snapshot(data: ContestData) -> ContestSnapshot {
    let ranking = data.user_contest_ranking;
    let history = data.user_contest_ranking_history.unwrap_or_default();
    ContestSnapshot {
        rating: ranking
            .as_ref()
            .and_then(|r| r.rating)
            .filter(|rating| *rating != 0.0)
            .map(round_rating),
        global_rank: ranking.as_ref().and_then(|r| r.global_ranking),
        contests_attended: Some(
            ranking
                .as_ref()
                .and_then(|r| r.attended_contests_count)
                .unwrap_or(0),
        ),
        last_contest: select_last_contest(&history),
    }
}

pub struct LeetCodeClient {
    client: reqwest::Client,
    endpoint: String,
    request_timeout: Duration,
    lookup_timeout: Duration,
    recent_limit: u32,
    lookup_throttle: Arc<Throttle>,
}

impl LeetCodeClient {
    pub fn new(config: &ApiConfig, lookup_throttle: Arc<Throttle>) -> SourceResult<Self> {
        let mut headers = HeaderMap::new();
        let referer = HeaderValue::from_str(&config.referer)
            .map_err(|err| SourceError::Config(format!("referer: {err}")))?;
        headers.insert(REFERER, referer);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            request_timeout: config.request_timeout(),
            lookup_timeout: config.lookup_timeout(),
            recent_limit: config.recent_submission_limit,
            lookup_throttle,
        })
    }

    async fn query<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Value,
        timeout: Duration,
    ) -> SourceResult<T> {
        let response = self
            .client
            .post(&self.endpoint)
            .timeout(timeout)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status));
        }

        let body: GraphQlResponse<T> = response.json().await?;
        match body.data {
            Some(data) => Ok(data),
            None => Err(SourceError::Graphql(
                body.errors
                    .into_iter()
                    .next()
                    .map(|error| error.message)
                    .unwrap_or_else(|| "response carried no data".to_string()),
            )),
        }
    }

    async fn difficulty(&self, slug: &str) -> SourceResult<Option<Difficulty>> {
        let data: QuestionData = self
            .query(
                DIFFICULTY_QUERY,
                json!({ "titleSlug": slug }),
                self.lookup_timeout,
            )
            .await?;
        Ok(data
            .question
            .and_then(|question| Difficulty::parse(&question.difficulty)))
    }
}

#[async_trait]
impl MetricsSource for LeetCodeClient {
    async fn daily(&self, handle: &str, date: NaiveDate) -> SourceResult<Option<DayCounts>> {
        let data: RecentData = self
            .query(
                RECENT_QUERY,
                json!({ "username": handle.trim(), "limit": self.recent_limit }),
                self.request_timeout,
            )
            .await?;
        let submissions = data.recent_ac_submission_list.unwrap_or_default();

        let mut counts = DayCounts::default();
        for slug in solved_slugs_on(&submissions, date, &Local) {
            self.lookup_throttle.wait().await;
            let difficulty = match self.difficulty(&slug).await {
                Ok(Some(difficulty)) => difficulty,
                Ok(None) => {
                    warn!(slug = %slug, "unknown difficulty, counting as easy");
                    Difficulty::Easy
                }
                Err(err) => {
                    warn!(slug = %slug, error = %err, "difficulty lookup failed, counting as easy");
                    Difficulty::Easy
                }
            };
            counts.record(difficulty);
        }

        Ok(Some(counts))
    }

    async fn cumulative(&self, handle: &str) -> SourceResult<Option<DayCounts>> {
        let data: OverallData = self
            .query(
                OVERALL_QUERY,
                json!({ "username": handle.trim() }),
                self.request_timeout,
            )
            .await?;
        Ok(data
            .matched_user
            .map(|user| tally_overall(&user.submit_stats_global.ac_submission_num)))
    }

    async fn contest(&self, handle: &str) -> SourceResult<Option<ContestSnapshot>> {
        let data: ContestData = self
            .query(
                CONTEST_QUERY,
                json!({ "username": handle.trim() }),
                self.request_timeout,
            )
            .await?;
        Ok(Some(contest_snapshot(data)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;
    use httpmock::prelude::*;

    #[derive(Clone, Default)]
    struct LogBuffer(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn submission(timestamp: i64, slug: &str) -> RecentSubmission {
        RecentSubmission {
            timestamp,
            title_slug: slug.to_string(),
        }
    }

    fn entry(title: &str, start: Option<i64>, attended: bool) -> HistoryEntry {
        HistoryEntry {
            attended,
            ranking: Some(100),
            problems_solved: Some(2),
            total_problems: Some(4),
            contest: ContestInfo {
                title: title.to_string(),
                start_time: start,
            },
        }
    }

    fn local_noon(date: NaiveDate) -> i64 {
        Local
            .from_local_datetime(&date.and_hms_opt(12, 0, 0).unwrap())
            .earliest()
            .unwrap()
            .timestamp()
    }

    fn client_for(server: &MockServer) -> LeetCodeClient {
        let config = ApiConfig {
            endpoint: server.url("/graphql"),
            ..ApiConfig::default()
        };
        LeetCodeClient::new(&config, Arc::new(Throttle::new(Duration::ZERO))).unwrap()
    }

    #[test]
    fn slugs_are_filtered_by_local_day_and_deduplicated() {
        // 2024-01-15 00:30 at +05:30 is still 2024-01-14 in UTC.
        let ist = FixedOffset::east_opt(5 * 3600 + 1800).unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let early = 1_705_258_800; // 2024-01-14T19:00:00Z
        let submissions = vec![
            submission(early, "two-sum"),
            submission(early + 60, "add-two-numbers"),
            submission(early + 120, "two-sum"),
            submission(early - 86_400, "old-problem"),
        ];
        assert_eq!(
            solved_slugs_on(&submissions, date, &ist),
            vec!["two-sum", "add-two-numbers"]
        );
        assert!(solved_slugs_on(&submissions, date, &chrono::Utc)
            .iter()
            .all(|slug| slug != "two-sum"));
    }

    #[test]
    fn timestamps_accept_strings_and_numbers() {
        let parsed: Vec<RecentSubmission> = serde_json::from_str(
            r#"[{"timestamp":"1705300000","titleSlug":"a"},{"timestamp":1705300001,"titleSlug":"b"}]"#,
        )
        .unwrap();
        assert_eq!(parsed[0].timestamp, 1_705_300_000);
        assert_eq!(parsed[1].timestamp, 1_705_300_001);
    }

    #[test]
    fn overall_counts_use_all_bucket_for_total() {
        let counts = vec![
            DifficultyCount {
                difficulty: "All".to_string(),
                count: 120,
            },
            DifficultyCount {
                difficulty: "Easy".to_string(),
                count: 70,
            },
            DifficultyCount {
                difficulty: "Hard".to_string(),
                count: 5,
            },
        ];
        assert_eq!(
            tally_overall(&counts),
            DayCounts {
                easy: 70,
                medium: 0,
                hard: 5,
                total: 120
            }
        );
    }

    #[test]
    fn last_contest_is_latest_attended_by_start_time() {
        let history = vec![
            entry("Weekly Contest 382", Some(300), true),
            entry("Weekly Contest 380", Some(100), true),
            entry("Biweekly Contest 122", Some(400), false),
            entry("Weekly Contest 381", Some(200), true),
        ];
        let last = select_last_contest(&history).unwrap();
        assert_eq!(last.name, "Weekly Contest 382");
        assert!(select_last_contest(&history[2..3]).is_none());
    }

    #[test]
    fn snapshot_without_ranking_reports_no_rating() {
        let snapshot = contest_snapshot(ContestData {
            user_contest_ranking: None,
            user_contest_ranking_history: None,
        });
        assert_eq!(snapshot.rating, None);
        assert_eq!(snapshot.contests_attended, Some(0));
        assert!(!snapshot.attended());
    }

    #[test]
    fn rating_is_rounded_to_one_decimal() {
        let snapshot = contest_snapshot(ContestData {
            user_contest_ranking: Some(Ranking {
                rating: Some(1523.4567),
                global_ranking: Some(80_412),
                attended_contests_count: Some(7),
            }),
            user_contest_ranking_history: Some(vec![entry("Weekly Contest 380", Some(1), true)]),
        });
        assert_eq!(snapshot.rating, Some(1523.5));
        assert_eq!(snapshot.global_rank, Some(80_412));
        assert_eq!(
            snapshot.last_contest.map(|c| c.solved_fraction()),
            Some("2/4".to_string())
        );
    }

    #[tokio::test]
    async fn daily_resolves_difficulty_and_falls_back_to_easy() {
        let server = MockServer::start_async().await;
        let today = Local::now().date_naive();
        let noon = local_noon(today);

        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/graphql")
                    .body_contains("recentAcSubmissions");
                then.status(200).json_body(json!({
                    "data": { "recentAcSubmissionList": [
                        { "id": "1", "timestamp": noon.to_string(), "title": "Two Sum", "titleSlug": "two-sum" },
                        { "id": "2", "timestamp": (noon + 5).to_string(), "title": "Two Sum", "titleSlug": "two-sum" },
                        { "id": "3", "timestamp": (noon + 9).to_string(), "title": "Median", "titleSlug": "median-of-two-sorted-arrays" },
                        { "id": "4", "timestamp": (noon + 20).to_string(), "title": "Mystery", "titleSlug": "mystery" }
                    ] }
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/graphql").body_contains("\"two-sum\"");
                then.status(200)
                    .json_body(json!({ "data": { "question": { "difficulty": "Medium" } } }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/graphql")
                    .body_contains("\"median-of-two-sorted-arrays\"");
                then.status(200)
                    .json_body(json!({ "data": { "question": { "difficulty": "Hard" } } }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/graphql").body_contains("\"mystery\"");
                then.status(500);
            })
            .await;

        let logs = LogBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer({
                let logs = logs.clone();
                move || logs.clone()
            })
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let client = client_for(&server);
        let counts = client.daily("alice123", today).await.unwrap().unwrap();
        assert_eq!(counts, DayCounts::from_tiers(1, 1, 1));

        let output = logs.contents();
        assert!(output.contains("WARN"));
        assert!(output.contains("difficulty lookup failed, counting as easy"));
    }

    #[tokio::test]
    async fn unknown_user_has_no_cumulative_stats() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/graphql");
                then.status(200).json_body(json!({
                    "data": { "matchedUser": null },
                    "errors": [{ "message": "That user does not exist." }]
                }));
            })
            .await;

        let client = client_for(&server);
        assert_eq!(client.cumulative("ghost").await.unwrap(), None);
    }

    #[tokio::test]
    async fn http_failure_is_an_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/graphql");
                then.status(429);
            })
            .await;

        let client = client_for(&server);
        let err = client.contest("alice123").await.unwrap_err();
        assert!(matches!(err, SourceError::Status(status) if status.as_u16() == 429));
    }

    #[tokio::test]
    async fn missing_data_surfaces_graphql_message() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/graphql");
                then.status(200)
                    .json_body(json!({ "errors": [{ "message": "rate limited" }] }));
            })
            .await;

        let client = client_for(&server);
        let err = client.cumulative("alice123").await.unwrap_err();
        assert!(matches!(err, SourceError::Graphql(message) if message == "rate limited"));
    }
}
