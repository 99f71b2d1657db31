use std::collections::BTreeMap;
use std::fmt;

pub const ROSTER_SHEET: &str = "Sheet1";
pub const DAILY_SHEET: &str = "Daily Tracking";
pub const OVERALL_SHEET: &str = "Overall Stats";
pub const CONTEST_SHEET: &str = "Contest";

pub const VIEW_SHEETS: [&str; 3] = [DAILY_SHEET, OVERALL_SHEET, CONTEST_SHEET];

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Int(i64),
    Float(f64),
}

impl CellValue {
    pub fn text(value: impl Into<String>) -> Self {
        CellValue::Text(value.into())
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(text) => f.write_str(text),
            CellValue::Int(value) => write!(f, "{value}"),
            CellValue::Float(value) => write!(f, "{value}"),
        }
    }
}

impl From<u32> for CellValue {
    fn from(value: u32) -> Self {
        CellValue::Int(i64::from(value))
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stripe {
    Alternate,
    Plain,
}

impl Stripe {
    pub fn for_position(index: usize) -> Self {
        if index % 2 == 0 {
            Stripe::Alternate
        } else {
            Stripe::Plain
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellStyle {
    Header { align: Align },
    DayHeader,
    Body { stripe: Stripe, align: Align },
}

impl CellStyle {
    pub fn code(&self) -> &'static str {
        match self {
            CellStyle::Header { align: Align::Left } => "header-left",
            CellStyle::Header {
                align: Align::Center,
            } => "header",
            CellStyle::DayHeader => "day-header",
            CellStyle::Body {
                stripe: Stripe::Alternate,
                align: Align::Left,
            } => "alt-left",
            CellStyle::Body {
                stripe: Stripe::Alternate,
                align: Align::Center,
            } => "alt",
            CellStyle::Body {
                stripe: Stripe::Plain,
                align: Align::Left,
            } => "plain-left",
            CellStyle::Body {
                stripe: Stripe::Plain,
                align: Align::Center,
            } => "plain",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        let style = match code {
            "header-left" => CellStyle::Header { align: Align::Left },
            "header" => CellStyle::Header {
                align: Align::Center,
            },
            "day-header" => CellStyle::DayHeader,
            "alt-left" => CellStyle::Body {
                stripe: Stripe::Alternate,
                align: Align::Left,
            },
            "alt" => CellStyle::Body {
                stripe: Stripe::Alternate,
                align: Align::Center,
            },
            "plain-left" => CellStyle::Body {
                stripe: Stripe::Plain,
                align: Align::Left,
            },
            "plain" => CellStyle::Body {
                stripe: Stripe::Plain,
                align: Align::Center,
            },
            _ => return None,
        };
        Some(style)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub value: CellValue,
    pub style: Option<CellStyle>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergedRange {
    pub first_row: u32,
    pub first_col: u32,
    pub last_row: u32,
    pub last_col: u32,
}

impl MergedRange {
    pub fn row_span(first_row: u32, first_col: u32, last_col: u32) -> Self {
        Self {
            first_row,
            first_col,
            last_row: first_row,
            last_col,
        }
    }

    pub fn contains(&self, row: u32, col: u32) -> bool {
        (self.first_row..=self.last_row).contains(&row)
            && (self.first_col..=self.last_col).contains(&col)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Sheet {
    pub name: String,
    cells: BTreeMap<(u32, u32), Cell>,
    merges: Vec<MergedRange>,
    column_widths: BTreeMap<u32, f64>,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn value(&self, row: u32, col: u32) -> Option<&CellValue> {
        self.cells.get(&(row, col)).map(|cell| &cell.value)
    }

    pub fn cell(&self, row: u32, col: u32) -> Option<&Cell> {
        self.cells.get(&(row, col))
    }

    /// Trimmed text of a cell, empty when the cell is absent.
    pub fn text(&self, row: u32, col: u32) -> String {
        self.value(row, col)
            .map(|value| value.to_string().trim().to_string())
            .unwrap_or_default()
    }

    pub fn set(&mut self, row: u32, col: u32, value: impl Into<CellValue>, style: Option<CellStyle>) {
        debug_assert!(row > 0 && col > 0, "cells are 1-based");
        self.cells.insert(
            (row, col),
            Cell {
                value: value.into(),
                style,
            },
        );
    }

    pub fn max_row(&self) -> u32 {
        self.cells.keys().map(|(row, _)| *row).max().unwrap_or(0)
    }

    pub fn max_col(&self) -> u32 {
        self.cells.keys().map(|(_, col)| *col).max().unwrap_or(0)
    }

    pub fn row_values(&self, row: u32) -> Vec<Option<&CellValue>> {
        (1..=self.max_col()).map(|col| self.value(row, col)).collect()
    }

    pub fn cells(&self) -> impl Iterator<Item = (u32, u32, &Cell)> {
        self.cells.iter().map(|((row, col), cell)| (*row, *col, cell))
    }

    pub fn merges(&self) -> &[MergedRange] {
        &self.merges
    }

    pub fn merge(&mut self, range: MergedRange) {
        if !self.merges.contains(&range) {
            self.merges.push(range);
        }
    }

    pub fn merge_anchored_at(&self, row: u32, col: u32) -> Option<&MergedRange> {
        self.merges
            .iter()
            .find(|range| range.first_row == row && range.first_col == col)
    }

    /// True when the cell is covered by a merge but is not its anchor.
    pub fn is_merge_shadow(&self, row: u32, col: u32) -> bool {
        self.merges.iter().any(|range| {
            range.contains(row, col) && !(range.first_row == row && range.first_col == col)
        })
    }

    pub fn column_widths(&self) -> &BTreeMap<u32, f64> {
        &self.column_widths
    }

    pub fn set_column_width(&mut self, col: u32, width: f64) {
        self.column_widths.insert(col, width);
    }

    /// Drops every cell and merged range; column widths stay.
    pub fn clear(&mut self) {
        self.cells.clear();
        self.merges.clear();
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Workbook {
    sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|sheet| sheet.name.as_str()).collect()
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|sheet| sheet.name == name)
    }

    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        self.sheets.iter_mut().find(|sheet| sheet.name == name)
    }

    pub fn push(&mut self, sheet: Sheet) {
        match self.sheet_mut(&sheet.name) {
            Some(existing) => *existing = sheet,
            None => self.sheets.push(sheet),
        }
    }

    /// Returns the named sheet, appending an empty one if it does not exist.
    pub fn ensure_sheet(&mut self, name: &str) -> &mut Sheet {
        let index = match self.sheets.iter().position(|sheet| sheet.name == name) {
            Some(index) => index,
            None => {
                self.sheets.push(Sheet::new(name));
                self.sheets.len() - 1
            }
        };
        &mut self.sheets[index]
    }

    pub fn ensure_view_sheets(&mut self) {
        for name in VIEW_SHEETS {
            self.ensure_sheet(name);
        }
    }
}
