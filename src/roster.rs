use std::path::Path;

use anyhow::Context;

use crate::models::User;
use crate::sheet::{Align, CellStyle, Sheet};

const NAME_LABEL: &str = "name";
const HANDLE_LABELS: [&str; 3] = ["leetcode", "handle", "username"];

pub const ROSTER_HEADERS: [&str; 3] = ["Name", "Reg No", "LeetCode ID"];

/// First row that carries both a name-like and a handle-like label.
/// Falls back to the first row when no such row exists.
pub fn find_header_row(sheet: &Sheet) -> u32 {
    for row in 1..=sheet.max_row() {
        let labels: Vec<String> = sheet
            .row_values(row)
            .into_iter()
            .map(|value| {
                value
                    .map(|v| v.to_string().trim().to_lowercase())
                    .unwrap_or_default()
            })
            .collect();

        let name_cells: Vec<usize> = positions(&labels, is_name_label);
        let handle_cells: Vec<usize> = positions(&labels, is_handle_label);

        // Name and handle labels must come from different cells.
        let separate = name_cells
            .iter()
            .any(|name| handle_cells.iter().any(|handle| handle != name));
        if separate {
            return row;
        }
    }
    1
}

fn positions(labels: &[String], matches: fn(&str) -> bool) -> Vec<usize> {
    labels
        .iter()
        .enumerate()
        .filter(|(_, label)| matches(label))
        .map(|(index, _)| index)
        .collect()
}

fn is_name_label(label: &str) -> bool {
    label
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| word == NAME_LABEL)
}

fn is_handle_label(label: &str) -> bool {
    HANDLE_LABELS.iter().any(|needle| label.contains(needle))
}

pub fn load_roster(sheet: &Sheet) -> Vec<User> {
    let header_row = find_header_row(sheet);
    let mut users = Vec::new();

    for row in header_row + 1..=sheet.max_row() {
        let name = sheet.text(row, 1);
        let secondary_id = sheet.text(row, 2);
        let handle = sheet.text(row, 3);

        if name.is_empty() && secondary_id.is_empty() && handle.is_empty() {
            continue;
        }

        if is_tracked(&name, &handle) {
            users.push(User {
                name,
                secondary_id,
                handle,
            });
        }
    }

    users
}

fn is_tracked(name: &str, handle: &str) -> bool {
    !name.is_empty() && !handle.is_empty() && handle.to_lowercase() != "nan"
}

/// Replaces the roster sheet with a header row followed by `rows`.
pub fn write_roster(sheet: &mut Sheet, rows: &[User]) {
    sheet.clear();
    let header = Some(CellStyle::Header { align: Align::Left });
    for (index, label) in ROSTER_HEADERS.iter().enumerate() {
        sheet.set(1, index as u32 + 1, *label, header);
    }
    for (offset, user) in rows.iter().enumerate() {
        let row = offset as u32 + 2;
        sheet.set(row, 1, user.name.as_str(), None);
        if !user.secondary_id.is_empty() {
            sheet.set(row, 2, user.secondary_id.as_str(), None);
        }
        if !user.handle.is_empty() {
            sheet.set(row, 3, user.handle.as_str(), None);
        }
    }
}

/// Reads roster rows from a CSV file with `name`, `secondary_id` and
/// `handle` columns. Rows are kept as-is; filtering happens on load.
pub fn read_roster_csv(csv_path: &Path) -> anyhow::Result<Vec<User>> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        #[serde(alias = "Name")]
        name: String,
        #[serde(default, alias = "reg", alias = "reg_no", alias = "Reg No")]
        secondary_id: Option<String>,
        #[serde(alias = "lc_id", alias = "leetcode_id", alias = "LeetCode ID")]
        handle: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut users = Vec::new();

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        users.push(User {
            name: row.name.trim().to_string(),
            secondary_id: row.secondary_id.unwrap_or_default().trim().to_string(),
            handle: row.handle.unwrap_or_default().trim().to_string(),
        });
    }

    Ok(users)
}
