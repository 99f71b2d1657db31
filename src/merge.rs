use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;

use crate::models::{ContestSnapshot, DayCounts, User};
use crate::sheet::{Align, CellStyle, CellValue, MergedRange, Sheet, Stripe};

pub const BLOCK_WIDTH: u32 = 4;
pub const FIRST_BLOCK_COL: u32 = 3;
pub const DAILY_FIRST_DATA_ROW: u32 = 3;
pub const METRIC_LABELS: [&str; 4] = ["Easy", "Medium", "Hard", "Total"];

pub const UNKNOWN: &str = "?";
pub const NOT_AVAILABLE: &str = "N/A";

const IDENTITY_WIDTH: f64 = 22.0;
const DAILY_METRIC_WIDTH: f64 = 8.0;
const OVERALL_METRIC_WIDTH: f64 = 9.0;

const HEADER_LEFT: Option<CellStyle> = Some(CellStyle::Header { align: Align::Left });
const HEADER_CENTER: Option<CellStyle> = Some(CellStyle::Header {
    align: Align::Center,
});
const DAY_HEADER: Option<CellStyle> = Some(CellStyle::DayHeader);

const CONTEST_COLUMNS: [(&str, f64); 9] = [
    ("Name", 22.0),
    ("LeetCode ID", 22.0),
    ("Contest Rating", 14.0),
    ("Global Ranking", 14.0),
    ("Contests Attended", 17.0),
    ("Last Contest", 22.0),
    ("Attended?", 10.0),
    ("Last Ranking", 14.0),
    ("Problems Solved", 15.0),
];

pub fn date_label(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn body(stripe: Stripe, align: Align) -> Option<CellStyle> {
    Some(CellStyle::Body { stripe, align })
}

/// Where things live in the daily sheet: date label -> first column of its
/// block, and user name -> row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailyLayout {
    pub date_columns: BTreeMap<String, u32>,
    pub name_rows: HashMap<String, u32>,
}

impl DailyLayout {
    pub fn scan(sheet: &Sheet) -> Self {
        let mut date_columns = BTreeMap::new();
        for col in FIRST_BLOCK_COL..=sheet.max_col() {
            let label = sheet.text(1, col);
            if !label.is_empty() {
                date_columns.insert(label, col);
            }
        }

        let mut name_rows = HashMap::new();
        for row in DAILY_FIRST_DATA_ROW..=sheet.max_row() {
            let name = sheet.text(row, 1);
            if !name.is_empty() {
                name_rows.insert(name, row);
            }
        }

        Self {
            date_columns,
            name_rows,
        }
    }

    pub fn next_block_col(&self) -> u32 {
        self.date_columns
            .values()
            .max()
            .map_or(FIRST_BLOCK_COL, |col| col + BLOCK_WIDTH)
    }
}

/// Writes `date`'s block into the daily sheet. Users whose daily fetch
/// produced nothing get zeros. Re-running for the same date overwrites the
/// same cells.
pub fn update_daily_sheet(
    sheet: &mut Sheet,
    roster: &[User],
    date: NaiveDate,
    daily: &HashMap<String, DayCounts>,
) {
    let mut layout = DailyLayout::scan(sheet);
    let label = date_label(date);

    let start_col = match layout.date_columns.get(&label) {
        Some(col) => *col,
        None => {
            let col = layout.next_block_col();
            append_date_block(sheet, &label, col);
            layout.date_columns.insert(label, col);
            col
        }
    };

    if sheet.value(1, 1).is_none() {
        write_identity_headers(sheet);
    }

    for (index, user) in roster.iter().enumerate() {
        let row = match layout.name_rows.get(&user.name) {
            Some(row) => *row,
            None => {
                let row = sheet.max_row().max(DAILY_FIRST_DATA_ROW - 1) + 1;
                layout.name_rows.insert(user.name.clone(), row);
                row
            }
        };

        let stripe = Stripe::for_position(index);
        sheet.set(row, 1, user.name.as_str(), body(stripe, Align::Left));
        sheet.set(row, 2, user.handle.as_str(), body(stripe, Align::Center));

        let counts = daily.get(&user.handle).copied().unwrap_or_default();
        for (offset, value) in counts.as_columns().into_iter().enumerate() {
            sheet.set(
                row,
                start_col + offset as u32,
                value,
                body(stripe, Align::Center),
            );
        }
    }
}

fn append_date_block(sheet: &mut Sheet, label: &str, col: u32) {
    sheet.merge(MergedRange::row_span(1, col, col + BLOCK_WIDTH - 1));
    sheet.set(1, col, label, DAY_HEADER);
    for (offset, sub) in METRIC_LABELS.iter().enumerate() {
        let sub_col = col + offset as u32;
        sheet.set(2, sub_col, *sub, HEADER_CENTER);
        sheet.set_column_width(sub_col, DAILY_METRIC_WIDTH);
    }
}

fn write_identity_headers(sheet: &mut Sheet) {
    for row in 1..=2 {
        sheet.set(row, 1, "Name", HEADER_LEFT);
        sheet.set(row, 2, "LeetCode ID", HEADER_CENTER);
    }
    sheet.set_column_width(1, IDENTITY_WIDTH);
    sheet.set_column_width(2, IDENTITY_WIDTH);
}

pub fn update_overall_sheet(
    sheet: &mut Sheet,
    roster: &[User],
    date: NaiveDate,
    overall: &HashMap<String, DayCounts>,
) {
    sheet.clear();

    write_identity_headers(sheet);
    sheet.merge(MergedRange::row_span(1, 3, 3 + BLOCK_WIDTH - 1));
    sheet.set(
        1,
        3,
        format!("Overall Stats (as of {})", date_label(date)),
        DAY_HEADER,
    );
    for (offset, sub) in METRIC_LABELS.iter().enumerate() {
        let col = 3 + offset as u32;
        sheet.set(2, col, *sub, HEADER_CENTER);
        sheet.set_column_width(col, OVERALL_METRIC_WIDTH);
    }

    for (index, user) in roster.iter().enumerate() {
        let row = index as u32 + 3;
        let stripe = Stripe::for_position(index);
        sheet.set(row, 1, user.name.as_str(), body(stripe, Align::Left));
        sheet.set(row, 2, user.handle.as_str(), body(stripe, Align::Center));

        let values: [CellValue; 4] = match overall.get(&user.handle) {
            Some(counts) => counts.as_columns().map(CellValue::from),
            None => std::array::from_fn(|_| CellValue::text(UNKNOWN)),
        };
        for (offset, value) in values.into_iter().enumerate() {
            sheet.set(row, 3 + offset as u32, value, body(stripe, Align::Center));
        }
    }
}

pub fn update_contest_sheet(
    sheet: &mut Sheet,
    roster: &[User],
    contest: &HashMap<String, ContestSnapshot>,
) {
    sheet.clear();

    for (index, (label, width)) in CONTEST_COLUMNS.iter().enumerate() {
        let col = index as u32 + 1;
        sheet.set(1, col, *label, HEADER_CENTER);
        sheet.set_column_width(col, *width);
    }

    for (index, user) in roster.iter().enumerate() {
        let row = index as u32 + 2;
        let stripe = Stripe::for_position(index);
        let mut values = vec![
            CellValue::text(&user.name),
            CellValue::text(&user.handle),
        ];
        values.extend(contest_cells(contest.get(&user.handle)));

        for (offset, value) in values.into_iter().enumerate() {
            let align = if offset == 0 { Align::Left } else { Align::Center };
            sheet.set(row, offset as u32 + 1, value, body(stripe, align));
        }
    }
}

fn contest_cells(snapshot: Option<&ContestSnapshot>) -> Vec<CellValue> {
    let na = || CellValue::text(NOT_AVAILABLE);
    let Some(snapshot) = snapshot else {
        return (0..7).map(|_| na()).collect();
    };

    let last = snapshot.last_contest.as_ref();
    vec![
        snapshot.rating.map_or_else(na, CellValue::Float),
        snapshot
            .global_rank
            .map_or_else(na, |rank| CellValue::Int(rank as i64)),
        snapshot.contests_attended.map_or_else(na, CellValue::from),
        last.map_or_else(na, |contest| CellValue::text(&contest.name)),
        CellValue::text(if snapshot.attended() { "Yes" } else { "No" }),
        last.and_then(|contest| contest.rank)
            .map_or_else(na, |rank| CellValue::Int(rank as i64)),
        last.map_or_else(na, |contest| CellValue::text(contest.solved_fraction())),
    ]
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailyHistory {
    pub dates: Vec<String>,
    pub rows: Vec<HistoryRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRow {
    pub row: u32,
    pub name: String,
    pub blocks: BTreeMap<String, DayCounts>,
}

impl DailyHistory {
    pub fn read(sheet: &Sheet) -> Self {
        let layout = DailyLayout::scan(sheet);
        let mut ordered: Vec<(&String, &u32)> = layout.date_columns.iter().collect();
        ordered.sort_by_key(|(_, col)| **col);

        let mut rows: Vec<HistoryRow> = layout
            .name_rows
            .iter()
            .map(|(name, row)| {
                let blocks = ordered
                    .iter()
                    .filter_map(|(label, col)| {
                        read_block(sheet, *row, **col).map(|counts| ((*label).clone(), counts))
                    })
                    .collect();
                HistoryRow {
                    row: *row,
                    name: name.clone(),
                    blocks,
                }
            })
            .collect();
        rows.sort_by_key(|row| row.row);

        Self {
            dates: ordered.into_iter().map(|(label, _)| label.clone()).collect(),
            rows,
        }
    }

    pub fn row_for(&self, name: &str) -> Option<&HistoryRow> {
        self.rows.iter().find(|row| row.name == name)
    }
}

fn read_block(sheet: &Sheet, row: u32, col: u32) -> Option<DayCounts> {
    let mut values = [0u32; 4];
    let mut any = false;
    for (offset, slot) in values.iter_mut().enumerate() {
        if let Some(CellValue::Int(value)) = sheet.value(row, col + offset as u32) {
            *slot = u32::try_from(*value).unwrap_or(0);
            any = true;
        }
    }
    any.then(|| DayCounts {
        easy: values[0],
        medium: values[1],
        hard: values[2],
        total: values[3],
    })
}
