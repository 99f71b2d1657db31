use std::fmt::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::report::escape_html;
use crate::sheet::{Sheet, Workbook, VIEW_SHEETS};
use crate::style::StylePresets;

pub const HTML_REPORT: &str = "report.html";

/// Paths written by one export.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedFiles {
    pub html: PathBuf,
    pub csv: Vec<PathBuf>,
}

pub fn csv_file_name(sheet_name: &str) -> String {
    format!("{}.csv", sheet_name.to_lowercase().replace(' ', "_"))
}

pub fn export_workbook(
    workbook: &Workbook,
    dir: &Path,
    styles: &StylePresets,
) -> anyhow::Result<ExportedFiles> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create export directory {}", dir.display()))?;

    let html = dir.join(HTML_REPORT);
    std::fs::write(&html, render_workbook_html(workbook, styles))
        .with_context(|| format!("failed to write {}", html.display()))?;

    let mut csv = Vec::new();
    for name in VIEW_SHEETS {
        let Some(sheet) = workbook.sheet(name) else {
            continue;
        };
        let path = dir.join(csv_file_name(name));
        write_sheet_csv(sheet, &path)?;
        csv.push(path);
    }

    Ok(ExportedFiles { html, csv })
}

pub fn render_workbook_html(workbook: &Workbook, styles: &StylePresets) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "<!DOCTYPE html>");
    let _ = writeln!(
        output,
        "<html><head><meta charset=\"utf-8\"><title>LeetCode Report</title></head>"
    );
    let _ = writeln!(
        output,
        "<body style=\"font-family:{},sans-serif;\">",
        styles.font_family
    );
    for name in VIEW_SHEETS {
        if let Some(sheet) = workbook.sheet(name) {
            render_sheet_html(&mut output, sheet, styles);
        }
    }
    let _ = writeln!(output, "</body></html>");
    output
}

fn render_sheet_html(output: &mut String, sheet: &Sheet, styles: &StylePresets) {
    let _ = writeln!(output, "<h2>{}</h2>", escape_html(&sheet.name));
    let _ = writeln!(output, "<table style=\"border-collapse:collapse;\">");

    let max_col = sheet.max_col();
    let _ = writeln!(output, "<colgroup>");
    for col in 1..=max_col {
        match sheet.column_widths().get(&col) {
            // One spreadsheet width unit is roughly one character.
            Some(width) => {
                let _ = writeln!(output, "<col style=\"width:{width}ch;\">");
            }
            None => {
                let _ = writeln!(output, "<col>");
            }
        }
    }
    let _ = writeln!(output, "</colgroup>");

    for row in 1..=sheet.max_row() {
        let _ = write!(output, "<tr>");
        for col in 1..=max_col {
            if sheet.is_merge_shadow(row, col) {
                continue;
            }
            let span = sheet
                .merge_anchored_at(row, col)
                .map(|range| range.last_col - range.first_col + 1)
                .filter(|span| *span > 1);
            let cell = sheet.cell(row, col);
            let text = cell
                .map(|cell| escape_html(&cell.value.to_string()))
                .unwrap_or_default();
            let css = styles.css(cell.and_then(|cell| cell.style));
            match span {
                Some(span) => {
                    let _ = write!(output, "<td colspan=\"{span}\" style=\"{css}\">{text}</td>");
                }
                None => {
                    let _ = write!(output, "<td style=\"{css}\">{text}</td>");
                }
            }
        }
        let _ = writeln!(output, "</tr>");
    }

    let _ = writeln!(output, "</table>");
}

pub fn write_sheet_csv(sheet: &Sheet, path: &Path) -> anyhow::Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;

    let max_col = sheet.max_col();
    for row in 1..=sheet.max_row() {
        let record: Vec<String> = (1..=max_col)
            .map(|col| {
                sheet
                    .value(row, col)
                    .map(|value| value.to_string())
                    .unwrap_or_default()
            })
            .collect();
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}
