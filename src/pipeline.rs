use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::cache::DailyCache;
use crate::config::TrackerConfig;
use crate::db;
use crate::export::{self, ExportedFiles, HTML_REPORT};
use crate::fetch::{fetch_all, FetchedMetrics};
use crate::merge::{self, DailyHistory};
use crate::models::{DayCounts, User};
use crate::notify::{Delivery, Notification, Notifier};
use crate::report::{self, DailySummary};
use crate::roster;
use crate::sheet::{Workbook, CONTEST_SHEET, DAILY_SHEET, OVERALL_SHEET, ROSTER_SHEET};
use crate::source::MetricsSource;
use crate::throttle::Throttle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Full,
    FetchOnly,
    EmailOnly,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Full => "full",
            RunMode::FetchOnly => "fetch",
            RunMode::EmailOnly => "email",
        }
    }

    fn stages(&self) -> Stages {
        match self {
            RunMode::Full => Stages {
                fetch: true,
                write_cache: false,
                notify: true,
            },
            RunMode::FetchOnly => Stages {
                fetch: true,
                write_cache: true,
                notify: false,
            },
            RunMode::EmailOnly => Stages {
                fetch: false,
                write_cache: true,
                notify: true,
            },
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
struct Stages {
    fetch: bool,
    write_cache: bool,
    notify: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOutcome {
    pub users: usize,
    pub fetched: bool,
    pub exports: Option<ExportedFiles>,
    pub delivery: Option<Delivery>,
}

struct ReportUpdate {
    roster: Vec<User>,
    metrics: FetchedMetrics,
    history: DailyHistory,
    exports: Option<ExportedFiles>,
}

/// What the daily email is built from.
struct Digest {
    roster: Vec<User>,
    daily: BTreeMap<String, DayCounts>,
    history: DailyHistory,
    attachment: Option<PathBuf>,
}

pub struct Pipeline<'a, S: ?Sized, N: ?Sized> {
    config: &'a TrackerConfig,
    source: &'a S,
    notifier: &'a N,
    user_throttle: &'a Throttle,
}

impl<'a, S, N> Pipeline<'a, S, N>
where
    S: MetricsSource + ?Sized,
    N: Notifier + ?Sized,
{
    pub fn new(
        config: &'a TrackerConfig,
        source: &'a S,
        notifier: &'a N,
        user_throttle: &'a Throttle,
    ) -> Self {
        Self {
            config,
            source,
            notifier,
            user_throttle,
        }
    }

    /// Runs `mode` for `today`. Only a missing or unusable report file is an
    /// error; source and notification failures are logged and absorbed.
    pub async fn run(&self, mode: RunMode, today: NaiveDate) -> anyhow::Result<RunOutcome> {
        let run_id = Uuid::new_v4();
        let span = info_span!("run", run_id = %run_id, mode = %mode, date = %today);
        self.run_stages(run_id, mode, today).instrument(span).await
    }

    async fn run_stages(
        &self,
        run_id: Uuid,
        mode: RunMode,
        today: NaiveDate,
    ) -> anyhow::Result<RunOutcome> {
        let stages = mode.stages();
        let mut outcome = RunOutcome::default();

        let cached = if stages.fetch {
            None
        } else {
            self.fresh_cache(today)
        };

        let digest = match cached {
            Some(cache) => Digest {
                history: self.stored_history().await,
                attachment: Some(self.config.paths.export_dir.join(HTML_REPORT))
                    .filter(|path| path.exists()),
                roster: cache.students,
                daily: cache.daily_data,
            },
            None => {
                let recorded = if stages.fetch { mode } else { RunMode::FetchOnly };
                let update = self.update_report(run_id, recorded, today).await?;
                outcome.fetched = true;
                if stages.write_cache {
                    let cache = DailyCache::new(today, &update.roster, &update.metrics.daily);
                    match cache.write(&self.config.paths.cache) {
                        Ok(()) => info!(path = %self.config.paths.cache.display(), "cached daily data"),
                        Err(err) => warn!(error = %err, "failed to write daily cache"),
                    }
                }
                let attachment = update.exports.as_ref().map(|files| files.html.clone());
                outcome.exports = update.exports;
                Digest {
                    roster: update.roster,
                    daily: update.metrics.daily.into_iter().collect(),
                    history: update.history,
                    attachment,
                }
            }
        };
        outcome.users = digest.roster.len();

        if stages.notify {
            outcome.delivery = self.notify(&digest, today).await;
        }

        info!(users = outcome.users, "run finished");
        Ok(outcome)
    }

    async fn update_report(
        &self,
        run_id: Uuid,
        mode: RunMode,
        today: NaiveDate,
    ) -> anyhow::Result<ReportUpdate> {
        let report_path = &self.config.paths.report;
        let pool = db::open_report(report_path).await?;
        let mut workbook = db::load_workbook(&pool).await?;

        let roster = match workbook.sheet(ROSTER_SHEET) {
            Some(sheet) => roster::load_roster(sheet),
            None => {
                warn!(sheet = ROSTER_SHEET, "roster sheet missing, nothing to track");
                Vec::new()
            }
        };
        info!(users = roster.len(), report = %report_path.display(), "loaded roster");

        let metrics = fetch_all(self.source, &roster, today, self.user_throttle).await;

        apply_metrics(&mut workbook, &roster, today, &metrics);
        db::save_workbook(&pool, &workbook).await?;
        let history = workbook
            .sheet(DAILY_SHEET)
            .map(DailyHistory::read)
            .unwrap_or_default();
        info!(report = %report_path.display(), "report saved");

        if let Err(err) = db::record_run(&pool, run_id, today, mode.as_str(), roster.len()).await {
            warn!(error = %err, "failed to record run");
        }
        pool.close().await;

        let exports =
            match export::export_workbook(&workbook, &self.config.paths.export_dir, &self.config.styles) {
                Ok(files) => {
                    info!(html = %files.html.display(), csv = files.csv.len(), "report exported");
                    Some(files)
                }
                Err(err) => {
                    warn!(error = %err, "failed to export report");
                    None
                }
            };

        Ok(ReportUpdate {
            roster,
            metrics,
            history,
            exports,
        })
    }

    fn fresh_cache(&self, today: NaiveDate) -> Option<DailyCache> {
        let path = &self.config.paths.cache;
        match DailyCache::read(path) {
            Ok(Some(cache)) if cache.is_fresh(today) => return Some(cache),
            Ok(Some(cache)) => {
                warn!(cached = %cache.date, today = %today, "cache is stale, re-fetching")
            }
            Ok(None) => warn!(path = %path.display(), "no cached data, fetching first"),
            Err(err) => warn!(error = %err, "cache unreadable, re-fetching"),
        }
        None
    }

    async fn stored_history(&self) -> DailyHistory {
        match load_stored(&self.config.paths.report).await {
            Ok(workbook) => workbook
                .sheet(DAILY_SHEET)
                .map(DailyHistory::read)
                .unwrap_or_default(),
            Err(err) => {
                warn!(error = %err, "report unreadable, summary has no history");
                DailyHistory::default()
            }
        }
    }

    async fn notify(&self, digest: &Digest, today: NaiveDate) -> Option<Delivery> {
        let summary = DailySummary::build(&digest.roster, &digest.daily, &digest.history, today);
        let notification = Notification {
            subject: summary.subject(),
            html_body: report::render_html(&summary, &self.config.styles),
            attachment: digest.attachment.clone(),
        };
        info!(
            users = summary.total_users,
            active = summary.active_today,
            solved = summary.solved_today,
            "sending daily summary"
        );

        match self.notifier.send(&notification).await {
            Ok(Delivery::Sent) => {
                info!("email sent");
                Some(Delivery::Sent)
            }
            Ok(Delivery::Skipped) => {
                warn!("email skipped: sender, password or recipient not configured");
                Some(Delivery::Skipped)
            }
            Err(err) => {
                error!(error = %err, "email failed");
                None
            }
        }
    }
}

async fn load_stored(path: &Path) -> anyhow::Result<Workbook> {
    let pool = db::open_report(path).await?;
    let workbook = db::load_workbook(&pool).await;
    pool.close().await;
    workbook
}

pub fn apply_metrics(
    workbook: &mut Workbook,
    roster: &[User],
    today: NaiveDate,
    metrics: &FetchedMetrics,
) {
    merge::update_daily_sheet(workbook.ensure_sheet(DAILY_SHEET), roster, today, &metrics.daily);
    merge::update_overall_sheet(
        workbook.ensure_sheet(OVERALL_SHEET),
        roster,
        today,
        &metrics.cumulative,
    );
    merge::update_contest_sheet(workbook.ensure_sheet(CONTEST_SHEET), roster, &metrics.contest);
}
