//! Result rendering for the active print mode

use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::{Row, Rows};

/// How result rows are printed
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum PrintMode {
    Json,
    Line,
    #[default]
    Pretty,
    Csv,
}

impl PrintMode {
    pub fn all() -> &'static [PrintMode] {
        &[PrintMode::Json, PrintMode::Line, PrintMode::Pretty, PrintMode::Csv]
    }

    pub fn name(&self) -> &'static str {
        match self {
            PrintMode::Json => "json",
            PrintMode::Line => "line",
            PrintMode::Pretty => "pretty",
            PrintMode::Csv => "csv",
        }
    }
}

impl fmt::Display for PrintMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PrintMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        PrintMode::all()
            .iter()
            .copied()
            .find(|mode| mode.name() == wanted)
            .ok_or_else(|| {
                format!(
                    "unknown print mode '{}', expected one of: {}",
                    s.trim(),
                    PrintMode::all()
                        .iter()
                        .map(PrintMode::name)
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            })
    }
}

/// Write `rows` to `out` in `mode`
pub fn print_rows(out: &mut dyn Write, rows: &Rows, mode: PrintMode) -> io::Result<()> {
    out.write_all(render(rows, mode).as_bytes())?;
    out.flush()
}

/// Render `rows` as text. Empty results render nothing except in json mode.
pub fn render(rows: &Rows, mode: PrintMode) -> String {
    if rows.is_empty() && mode != PrintMode::Json {
        return String::new();
    }

    match mode {
        PrintMode::Json => render_json(rows),
        PrintMode::Line => render_lines(rows),
        PrintMode::Pretty => render_pretty(rows),
        PrintMode::Csv => render_csv(rows),
    }
}

/// Sorted union of the keys of every row
pub fn columns(rows: &Rows) -> Vec<&str> {
    let mut columns: Vec<&str> = rows
        .iter()
        .flat_map(|row| row.keys().map(String::as_str))
        .collect();
    columns.sort_unstable();
    columns.dedup();
    columns
}

fn cell<'a>(row: &'a Row, column: &str) -> &'a str {
    row.get(column).map(String::as_str).unwrap_or("")
}

fn render_json(rows: &Rows) -> String {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    match rows.serialize(&mut serializer) {
        Ok(()) => format!("{}\n", String::from_utf8_lossy(&buf)),
        Err(e) => {
            tracing::warn!("could not format query results: {}", e);
            "Could not format query results.\n".to_string()
        }
    }
}

fn render_lines(rows: &Rows) -> String {
    let mut out = String::new();
    for row in rows {
        let width = row.keys().map(|k| k.chars().count()).max().unwrap_or(0);
        for (key, value) in row {
            out.push_str(&format!("{:>width$} = {}\n", key, value, width = width));
        }
        out.push('\n');
    }
    out
}

fn render_pretty(rows: &Rows) -> String {
    let columns = columns(rows);
    let widths: Vec<usize> = columns
        .iter()
        .map(|column| {
            rows.iter()
                .map(|row| cell(row, column).chars().count())
                .chain(std::iter::once(column.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let divider = {
        let mut line = String::from("+");
        for width in &widths {
            line.push_str(&"-".repeat(width + 2));
            line.push('+');
        }
        line.push('\n');
        line
    };

    let format_line = |values: Vec<&str>| {
        let mut line = String::new();
        for (value, width) in values.iter().zip(&widths) {
            line.push_str(&format!("| {:<width$} ", value, width = width));
        }
        line.push_str("|\n");
        line
    };

    let mut out = divider.clone();
    out.push_str(&format_line(columns.clone()));
    out.push_str(&divider);
    for row in rows {
        out.push_str(&format_line(
            columns.iter().map(|column| cell(row, column)).collect(),
        ));
    }
    out.push_str(&divider);
    out
}

fn render_csv(rows: &Rows) -> String {
    let columns = columns(rows);
    let mut out = String::new();

    let header: Vec<String> = columns.iter().map(|c| csv_field(c)).collect();
    out.push_str(&header.join(","));
    out.push('\n');

    for row in rows {
        let fields: Vec<String> = columns
            .iter()
            .map(|column| csv_field(cell(row, column)))
            .collect();
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    out
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
