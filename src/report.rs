use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::NaiveDate;

use crate::merge::{date_label, DailyHistory};
use crate::models::{DayCounts, User};
use crate::style::StylePresets;

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub rank: usize,
    pub name: String,
    pub secondary_id: String,
    pub handle: String,
    pub counts: DayCounts,
    /// Consecutive days up to today with at least one solve.
    pub streak: u32,
}

/// Today's activity in roster order, read from already merged data.
#[derive(Debug, Clone, PartialEq)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub rows: Vec<SummaryRow>,
    pub total_users: usize,
    pub active_today: usize,
    pub solved_today: u32,
    pub days_tracked: usize,
}

impl DailySummary {
    pub fn build(
        roster: &[User],
        daily: &BTreeMap<String, DayCounts>,
        history: &DailyHistory,
        date: NaiveDate,
    ) -> Self {
        let rows: Vec<SummaryRow> = roster
            .iter()
            .enumerate()
            .map(|(index, user)| {
                let counts = daily.get(&user.handle).copied().unwrap_or_default();
                SummaryRow {
                    rank: index + 1,
                    name: user.name.clone(),
                    secondary_id: user.secondary_id.clone(),
                    handle: user.handle.clone(),
                    counts,
                    streak: streak(history, &user.name, date, &counts),
                }
            })
            .collect();

        Self {
            date,
            days_tracked: history.dates.len(),
            total_users: rows.len(),
            active_today: rows.iter().filter(|row| row.counts.total > 0).count(),
            solved_today: rows.iter().map(|row| row.counts.total).sum(),
            rows,
        }
    }

    pub fn subject(&self) -> String {
        format!("LeetCode Daily Report — {}", long_date(self.date))
    }
}

fn streak(history: &DailyHistory, name: &str, date: NaiveDate, today: &DayCounts) -> u32 {
    if today.total == 0 {
        return 0;
    }
    let Some(row) = history.row_for(name) else {
        return 1;
    };

    let mut streak = 1;
    let mut day = date;
    while let Some(previous) = day.pred_opt() {
        match row.blocks.get(&date_label(previous)) {
            Some(counts) if counts.total > 0 => streak += 1,
            _ => break,
        }
        day = previous;
    }
    streak
}

pub fn long_date(date: NaiveDate) -> String {
    date.format("%d %B %Y").to_string()
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

pub fn render_html(summary: &DailySummary, styles: &StylePresets) -> String {
    let mut output = String::new();

    let _ = writeln!(
        output,
        "<html><body style=\"font-family:{},sans-serif; color:#{};\">",
        styles.font_family, styles.body_font
    );
    let _ = writeln!(
        output,
        "<h2 style=\"color:#{};\">LeetCode Daily Report — {}</h2>",
        styles.header_fill,
        long_date(summary.date)
    );
    let _ = writeln!(
        output,
        "<p><strong>Total Students:</strong> {} &nbsp;|&nbsp; \
         <strong>Active Today:</strong> {} &nbsp;|&nbsp; \
         <strong>Problems Solved Today:</strong> {} &nbsp;|&nbsp; \
         <strong>Days Tracked:</strong> {}</p>",
        summary.total_users, summary.active_today, summary.solved_today, summary.days_tracked
    );

    let _ = writeln!(
        output,
        "<table border=\"0\" cellspacing=\"0\" cellpadding=\"0\" \
         style=\"border-collapse:collapse; width:100%; font-size:13px;\">"
    );
    let _ = writeln!(
        output,
        "<thead><tr style=\"background:#{}; color:#{};\">",
        styles.header_fill, styles.header_font
    );
    for (label, align) in [
        ("#", "center"),
        ("Name", "left"),
        ("Reg No", "left"),
        ("LeetCode ID", "left"),
        ("Easy", "center"),
        ("Medium", "center"),
        ("Hard", "center"),
        ("Total", "center"),
        ("Streak", "center"),
    ] {
        let _ = writeln!(
            output,
            "<th style=\"padding:8px 10px; text-align:{align};\">{label}</th>"
        );
    }
    let _ = writeln!(output, "</tr></thead>");

    let _ = writeln!(output, "<tbody>");
    if summary.rows.is_empty() {
        let _ = writeln!(
            output,
            "<tr><td colspan=\"9\" style=\"padding:6px 10px;\">No students on the roster.</td></tr>"
        );
    }
    for (index, row) in summary.rows.iter().enumerate() {
        let background = if index % 2 == 0 {
            &styles.email_alternate_fill
        } else {
            &styles.plain_fill
        };
        let highlight = if row.counts.total > 0 {
            format!(" font-weight:bold; color:#{};", styles.email_highlight)
        } else {
            String::new()
        };
        let _ = writeln!(output, "<tr style=\"background:#{background};\">");
        let _ = writeln!(output, "<td style=\"padding:6px 10px;\">{}</td>", row.rank);
        for text in [&row.name, &row.secondary_id, &row.handle] {
            let _ = writeln!(
                output,
                "<td style=\"padding:6px 10px;\">{}</td>",
                escape_html(text)
            );
        }
        for value in [row.counts.easy, row.counts.medium, row.counts.hard] {
            let _ = writeln!(
                output,
                "<td style=\"padding:6px 10px; text-align:center;\">{value}</td>"
            );
        }
        let _ = writeln!(
            output,
            "<td style=\"padding:6px 10px; text-align:center;{highlight}\">{}</td>",
            row.counts.total
        );
        let _ = writeln!(
            output,
            "<td style=\"padding:6px 10px; text-align:center;\">{}</td>",
            row.streak
        );
        let _ = writeln!(output, "</tr>");
    }
    let _ = writeln!(output, "</tbody></table>");

    let _ = writeln!(
        output,
        "<p style=\"margin-top:20px; color:#555; font-size:12px;\">\
         Auto-generated by LeetCode Daily Tracker. Full report attached.</p>"
    );
    let _ = writeln!(output, "</body></html>");

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use crate::merge;
    use crate::sheet::{Sheet, DAILY_SHEET};

    fn roster() -> Vec<User> {
        vec![
            User {
                name: "Alice".to_string(),
                secondary_id: "R1".to_string(),
                handle: "alice123".to_string(),
            },
            User {
                name: "Bob <B>".to_string(),
                secondary_id: "R2".to_string(),
                handle: "bob456".to_string(),
            },
        ]
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
    }

    #[test]
    fn summary_counts_active_users_and_totals() {
        let daily = BTreeMap::from([
            ("alice123".to_string(), DayCounts::from_tiers(2, 1, 0)),
            ("bob456".to_string(), DayCounts::default()),
        ]);
        let summary = DailySummary::build(&roster(), &daily, &DailyHistory::default(), date());

        assert_eq!(summary.total_users, 2);
        assert_eq!(summary.active_today, 1);
        assert_eq!(summary.solved_today, 3);
        assert_eq!(summary.rows[0].rank, 1);
        assert_eq!(summary.rows[1].rank, 2);
        assert_eq!(summary.rows[1].secondary_id, "R2");
    }

    #[test]
    fn missing_users_count_as_zero() {
        let summary =
            DailySummary::build(&roster(), &BTreeMap::new(), &DailyHistory::default(), date());
        assert_eq!(summary.active_today, 0);
        assert_eq!(summary.rows[0].counts, DayCounts::default());
    }

    #[test]
    fn streak_runs_back_through_history() {
        let mut sheet = Sheet::new(DAILY_SHEET);
        for (d, counts) in [
            (12, DayCounts::from_tiers(1, 0, 0)),
            (13, DayCounts::default()),
            (14, DayCounts::from_tiers(0, 1, 0)),
        ] {
            let daily = HashMap::from([("alice123".to_string(), counts)]);
            merge::update_daily_sheet(
                &mut sheet,
                &roster(),
                NaiveDate::from_ymd_opt(2024, 1, d).unwrap(),
                &daily,
            );
        }
        let history = DailyHistory::read(&sheet);

        let today = BTreeMap::from([("alice123".to_string(), DayCounts::from_tiers(0, 0, 1))]);
        let summary = DailySummary::build(&roster(), &today, &history, date());
        assert_eq!(summary.days_tracked, 3);
        assert_eq!(summary.rows[0].streak, 2);
        assert_eq!(summary.rows[1].streak, 0);

        let newcomer = vec![User {
            name: "Cara".to_string(),
            secondary_id: "R3".to_string(),
            handle: "cara".to_string(),
        }];
        let today = BTreeMap::from([("cara".to_string(), DayCounts::from_tiers(1, 0, 0))]);
        let summary = DailySummary::build(&newcomer, &today, &history, date());
        assert_eq!(summary.rows[0].streak, 1);

        let html = render_html(&summary, &StylePresets::default());
        assert!(html.contains("<strong>Days Tracked:</strong> 3"));
        assert!(html.contains(">Streak</th>"));
    }

    #[test]
    fn html_lists_every_user_escaped() {
        let daily = BTreeMap::from([("alice123".to_string(), DayCounts::from_tiers(2, 1, 0))]);
        let summary = DailySummary::build(&roster(), &daily, &DailyHistory::default(), date());
        let html = render_html(&summary, &StylePresets::default());

        assert!(html.contains("LeetCode Daily Report — 15 January 2024"));
        assert!(html.contains("<strong>Active Today:</strong> 1"));
        assert!(html.contains("Bob &lt;B&gt;"));
        assert!(!html.contains("Bob <B>"));
        assert!(html.contains("color:#1F6E43;\">3</td>"));
        assert_eq!(summary.subject(), "LeetCode Daily Report — 15 January 2024");
    }
}
