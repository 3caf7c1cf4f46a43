/// Result rendering for terminals and files
use crate::execution::row::{Cell, Row};
use crate::execution::value_codec::format_number;
use crate::metadata::schema::TableSchema;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Longest cell shown by the table renderer before truncation
const MAX_TABLE_CELL: usize = 40;

/// Output format options
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ResultFormat {
    /// Aligned text table
    #[default]
    Table,
    Csv,
    /// `{"columns": [...], "rows": [[...]], "row_count": n}`
    Json,
}

/// Rows reduced to display text
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FormattedResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub row_count: usize,
}

#[derive(Serialize)]
struct JsonResult<'a> {
    columns: Vec<&'a str>,
    rows: &'a [Row],
    row_count: usize,
}

/// Display text of one cell; absent cells are empty
pub fn cell_text(cell: Option<&Cell>) -> String {
    match cell {
        Some(Cell::Text(s)) => s.clone(),
        Some(Cell::Number(v)) => format_number(*v),
        None => String::new(),
    }
}

pub fn format_results(schema: &TableSchema, rows: &[Row]) -> FormattedResult {
    FormattedResult {
        columns: schema.names().into_iter().map(str::to_string).collect(),
        rows: rows
            .iter()
            .map(|row| (0..schema.len()).map(|i| cell_text(row.get(i))).collect())
            .collect(),
        row_count: rows.len(),
    }
}

pub fn render(format: ResultFormat, schema: &TableSchema, rows: &[Row]) -> Result<String> {
    match format {
        ResultFormat::Table => Ok(render_table(&format_results(schema, rows))),
        ResultFormat::Csv => render_csv(&format_results(schema, rows)),
        ResultFormat::Json => render_json(schema, rows),
    }
}

pub fn render_table(result: &FormattedResult) -> String {
    let clip = |s: &str| -> String {
        if s.chars().count() > MAX_TABLE_CELL {
            let head: String = s.chars().take(MAX_TABLE_CELL - 3).collect();
            format!("{}...", head)
        } else {
            s.to_string()
        }
    };

    let header: Vec<String> = result.columns.iter().map(|c| clip(c)).collect();
    let body: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| row.iter().map(|c| clip(c)).collect())
        .collect();

    let widths: Vec<usize> = (0..header.len())
        .map(|i| {
            body.iter()
                .filter_map(|row| row.get(i))
                .chain(std::iter::once(&header[i]))
                .map(|s| s.chars().count())
                .max()
                .unwrap_or(0)
        })
        .collect();

    let line = |cells: &[String]| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:>width$}", cell, width = *width))
            .collect::<Vec<_>>()
            .join(" | ")
    };

    let mut out = String::new();
    out.push_str(&line(&header));
    out.push('\n');
    let total: usize = widths.iter().sum::<usize>() + widths.len().saturating_sub(1) * 3;
    out.push_str(&"-".repeat(total));
    out.push('\n');
    for row in &body {
        out.push_str(&line(row));
        out.push('\n');
    }
    out.push_str(&format!("({} rows)\n", result.row_count));
    out
}

pub fn render_csv(result: &FormattedResult) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(&result.columns)
        .context("Failed to write CSV header")?;
    for row in &result.rows {
        writer.write_record(row).context("Failed to write CSV row")?;
    }
    let bytes = writer.into_inner().context("Failed to flush CSV output")?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

pub fn render_json(schema: &TableSchema, rows: &[Row]) -> Result<String> {
    let result = JsonResult {
        columns: schema.names(),
        rows,
        row_count: rows.len(),
    };
    serde_json::to_string_pretty(&result).context("Failed to serialize rows to JSON")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::schema::build_schema;
    use crate::storage::symbol::{Symbol, SymbolKind};

    fn sample() -> (TableSchema, Vec<Row>) {
        let schema = build_schema(&Symbol::new("d", SymbolKind::Parameter, vec!["i".to_string()]));
        let rows = vec![
            Row::from_cells(vec![Some(Cell::Text("seattle".into())), Some(Cell::Number(2.5)), None]),
            Row::from_cells(vec![Some(Cell::Text("a,b".into())), None, Some(Cell::Text("Eps".into()))]),
        ];
        (schema, rows)
    }

    #[test]
    fn test_table_layout() {
        let (schema, rows) = sample();
        let table = render(ResultFormat::Table, &schema, &rows).unwrap();
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "      i | Value | Value (SV)");
        assert_eq!(lines[2], "seattle |   2.5 |           ");
        assert_eq!(lines.last(), Some(&"(2 rows)"));
    }

    #[test]
    fn test_csv_quotes_separators() {
        let (schema, rows) = sample();
        let csv = render(ResultFormat::Csv, &schema, &rows).unwrap();
        assert_eq!(csv, "i,Value,Value (SV)\nseattle,2.5,\n\"a,b\",,Eps\n");
    }

    #[test]
    fn test_json_keeps_column_order_and_nulls() {
        let (schema, rows) = sample();
        let json = render(ResultFormat::Json, &schema, &rows).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["columns"][1], "Value");
        assert_eq!(value["rows"][0][1], 2.5);
        assert!(value["rows"][0][2].is_null());
        assert_eq!(value["rows"][1][2], "Eps");
        assert_eq!(value["row_count"], 2);
    }
}
