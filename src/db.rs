use std::path::Path;
use std::str::FromStr;

use anyhow::{bail, Context};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use uuid::Uuid;

use crate::roster;
use crate::sheet::{CellStyle, CellValue, MergedRange, Sheet, Workbook, ROSTER_SHEET};

#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub id: Uuid,
    pub run_date: NaiveDate,
    pub mode: String,
    pub user_count: i64,
    pub recorded_at: DateTime<Utc>,
}

pub async fn init_db(pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

async fn connect(path: &Path, create: bool) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(create)
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .with_context(|| format!("failed to open report file {}", path.display()))
}

/// Opens an existing report file. A missing file is an error: the run must
/// not create a fresh store behind the operator's back.
pub async fn open_report(path: &Path) -> anyhow::Result<SqlitePool> {
    if !path.exists() {
        bail!("report file not found: {}", path.display());
    }
    let pool = connect(path, false).await?;
    init_db(&pool).await?;
    Ok(pool)
}

/// Creates the report file with an empty roster sheet and the three views.
/// Existing content is left alone.
pub async fn create_report(path: &Path) -> anyhow::Result<SqlitePool> {
    let pool = connect(path, true).await?;
    init_db(&pool).await?;

    let existing = load_workbook(&pool).await?;
    if existing.sheets().is_empty() {
        save_workbook(&pool, &blank_workbook()).await?;
    }
    Ok(pool)
}

pub fn blank_workbook() -> Workbook {
    let mut workbook = Workbook::new();
    roster::write_roster(workbook.ensure_sheet(ROSTER_SHEET), &[]);
    workbook.ensure_view_sheets();
    workbook
}

pub async fn load_workbook(pool: &SqlitePool) -> anyhow::Result<Workbook> {
    let mut workbook = Workbook::new();

    let names = sqlx::query("SELECT name FROM sheets ORDER BY position")
        .fetch_all(pool)
        .await?;
    for row in names {
        workbook.push(Sheet::new(row.get::<String, _>("name")));
    }

    let cells = sqlx::query(
        "SELECT sheet, row_index, col_index, kind, value, style FROM cells \
         ORDER BY sheet, row_index, col_index",
    )
    .fetch_all(pool)
    .await?;
    for row in cells {
        let sheet_name: String = row.get("sheet");
        let row_index: i64 = row.get("row_index");
        let col_index: i64 = row.get("col_index");
        let kind: String = row.get("kind");
        let raw: String = row.get("value");
        let style: Option<String> = row.get("style");

        let value = decode_value(&kind, raw)
            .with_context(|| format!("bad cell {sheet_name}!R{row_index}C{col_index}"))?;
        let style = style.as_deref().and_then(CellStyle::from_code);
        workbook.ensure_sheet(&sheet_name).set(
            to_index(row_index)?,
            to_index(col_index)?,
            value,
            style,
        );
    }

    let merges = sqlx::query(
        "SELECT sheet, first_row, first_col, last_row, last_col FROM merged_ranges \
         ORDER BY rowid",
    )
    .fetch_all(pool)
    .await?;
    for row in merges {
        let sheet_name: String = row.get("sheet");
        let range = MergedRange {
            first_row: to_index(row.get("first_row"))?,
            first_col: to_index(row.get("first_col"))?,
            last_row: to_index(row.get("last_row"))?,
            last_col: to_index(row.get("last_col"))?,
        };
        workbook.ensure_sheet(&sheet_name).merge(range);
    }

    let widths = sqlx::query("SELECT sheet, col_index, width FROM column_widths")
        .fetch_all(pool)
        .await?;
    for row in widths {
        let sheet_name: String = row.get("sheet");
        let col = to_index(row.get("col_index"))?;
        workbook
            .ensure_sheet(&sheet_name)
            .set_column_width(col, row.get("width"));
    }

    Ok(workbook)
}

pub async fn save_workbook(pool: &SqlitePool, workbook: &Workbook) -> anyhow::Result<()> {
    let mut tx = pool.begin().await?;

    for table in ["cells", "merged_ranges", "column_widths", "sheets"] {
        sqlx::query(&format!("DELETE FROM {table}"))
            .execute(&mut *tx)
            .await?;
    }

    for (position, sheet) in workbook.sheets().iter().enumerate() {
        sqlx::query("INSERT INTO sheets (name, position) VALUES (?, ?)")
            .bind(&sheet.name)
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;

        for (row, col, cell) in sheet.cells() {
            let (kind, value) = encode_value(&cell.value);
            sqlx::query(
                r#"
                INSERT INTO cells (sheet, row_index, col_index, kind, value, style)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&sheet.name)
            .bind(i64::from(row))
            .bind(i64::from(col))
            .bind(kind)
            .bind(value)
            .bind(cell.style.map(|style| style.code()))
            .execute(&mut *tx)
            .await?;
        }

        for range in sheet.merges() {
            sqlx::query(
                r#"
                INSERT INTO merged_ranges (sheet, first_row, first_col, last_row, last_col)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(&sheet.name)
            .bind(i64::from(range.first_row))
            .bind(i64::from(range.first_col))
            .bind(i64::from(range.last_row))
            .bind(i64::from(range.last_col))
            .execute(&mut *tx)
            .await?;
        }

        for (col, width) in sheet.column_widths() {
            sqlx::query("INSERT INTO column_widths (sheet, col_index, width) VALUES (?, ?, ?)")
                .bind(&sheet.name)
                .bind(i64::from(*col))
                .bind(*width)
                .execute(&mut *tx)
                .await?;
        }
    }

    tx.commit().await.context("failed to commit report")?;
    Ok(())
}

pub async fn record_run(
    pool: &SqlitePool,
    id: Uuid,
    run_date: NaiveDate,
    mode: &str,
    user_count: usize,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO runs (id, run_date, mode, user_count, recorded_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(run_date.to_string())
    .bind(mode)
    .bind(user_count as i64)
    .bind(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true))
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn recent_runs(pool: &SqlitePool, limit: i64) -> anyhow::Result<Vec<RunRecord>> {
    let rows = sqlx::query(
        "SELECT id, run_date, mode, user_count, recorded_at FROM runs \
         ORDER BY recorded_at DESC, rowid DESC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let mut runs = Vec::new();
    for row in rows {
        let id: String = row.get("id");
        let run_date: String = row.get("run_date");
        let recorded_at: String = row.get("recorded_at");
        runs.push(RunRecord {
            id: Uuid::parse_str(&id)?,
            run_date: NaiveDate::from_str(&run_date)?,
            mode: row.get("mode"),
            user_count: row.get("user_count"),
            recorded_at: DateTime::parse_from_rfc3339(&recorded_at)?.with_timezone(&Utc),
        });
    }

    Ok(runs)
}

fn encode_value(value: &CellValue) -> (&'static str, String) {
    match value {
        CellValue::Text(text) => ("text", text.clone()),
        CellValue::Int(number) => ("int", number.to_string()),
        CellValue::Float(number) => ("float", number.to_string()),
    }
}

fn decode_value(kind: &str, raw: String) -> anyhow::Result<CellValue> {
    let value = match kind {
        "text" => CellValue::Text(raw),
        "int" => CellValue::Int(raw.parse()?),
        "float" => CellValue::Float(raw.parse()?),
        other => bail!("unknown cell kind {other}"),
    };
    Ok(value)
}

fn to_index(value: i64) -> anyhow::Result<u32> {
    u32::try_from(value).with_context(|| format!("index out of range: {value}"))
}
