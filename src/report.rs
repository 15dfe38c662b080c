use std::path::Path;

use chrono::{DateTime, Utc};
use owo_colors::{OwoColorize, Stream, Style};

use crate::errors::BenchError;
use crate::types::ResultMatrix;

/// Pretty JSON: `{ mode: { threads: millis } }`, keys sorted.
pub fn to_json(matrix: &ResultMatrix) -> Result<String, BenchError> {
    serde_json::to_string_pretty(matrix).map_err(|source| BenchError::Serialize { source })
}

pub fn from_json(text: &str) -> Result<ResultMatrix, BenchError> {
    serde_json::from_str(text).map_err(|source| BenchError::Serialize { source })
}

/// Overwrite `path` with `contents`.
pub fn write_results(path: &Path, contents: &str) -> Result<(), BenchError> {
    std::fs::write(path, contents).map_err(|source| BenchError::WriteResults {
        path: path.to_path_buf(),
        source,
    })
}

/// One `mode threads millis` line per cell. Used when JSON output fails.
pub fn format_plain(matrix: &ResultMatrix) -> String {
    let mut out = String::new();
    for (mode, cells) in matrix.iter() {
        for (threads, millis) in cells {
            out.push_str(&format!("{} {} {}\n", mode, threads, millis));
        }
    }
    out
}

/// Cell text: milliseconds, or throughput (`1000 / ms`) with `perf`.
fn cell_text(millis: Option<u64>, perf: bool) -> Option<String> {
    let millis = millis?;
    if !perf {
        return Some(millis.to_string());
    }
    if millis == 0 {
        return None;
    }
    Some(format!("{:.3}", 1000.0 / millis as f64))
}

fn style_header() -> Style {
    Style::new().cyan().bold()
}

/// Console table, one row per mode, one column per thread count.
pub fn format_table(matrix: &ResultMatrix, perf: bool, now: DateTime<Utc>) -> String {
    let threads = matrix.thread_counts();
    let unit = if perf { "1/ms" } else { "ms" };

    let mut out = String::new();
    let title = format!(
        "Benchmark results ({}), {}",
        unit,
        now.format("%Y-%m-%d %H:%M:%S UTC")
    );
    out.push_str(
        &title
            .if_supports_color(Stream::Stdout, |s| s.bold())
            .to_string(),
    );
    out.push_str("\n\n");

    let rows: Vec<(&String, Vec<Option<String>>)> = matrix
        .iter()
        .map(|(mode, cells)| {
            let values = threads
                .iter()
                .map(|t| cell_text(cells.get(t).copied(), perf))
                .collect();
            (mode, values)
        })
        .collect();

    let label = "threads";
    let name_width = rows
        .iter()
        .map(|(mode, _)| mode.len())
        .chain(std::iter::once(label.len()))
        .max()
        .unwrap_or(0);

    let col_widths: Vec<usize> = threads
        .iter()
        .enumerate()
        .map(|(i, t)| {
            rows.iter()
                .filter_map(|(_, values)| values[i].as_ref().map(String::len))
                .chain(std::iter::once(t.to_string().len()))
                .max()
                .unwrap_or(1)
        })
        .collect();

    let header_style = style_header();
    let mut header = format!("{:<width$}", label, width = name_width);
    for (t, width) in threads.iter().zip(&col_widths) {
        header.push_str(&format!("  {:>width$}", t, width = *width));
    }
    out.push_str(
        &header
            .if_supports_color(Stream::Stdout, |s| s.style(header_style))
            .to_string(),
    );
    out.push('\n');

    for (mode, values) in &rows {
        let name = format!("{:<width$}", mode, width = name_width);
        out.push_str(
            &name
                .if_supports_color(Stream::Stdout, |s| s.green())
                .to_string(),
        );
        for (value, width) in values.iter().zip(&col_widths) {
            out.push_str("  ");
            match value {
                Some(v) => out.push_str(&format!("{:>width$}", v, width = *width)),
                None => {
                    let dash = format!("{:>width$}", "-", width = *width);
                    out.push_str(
                        &dash
                            .if_supports_color(Stream::Stdout, |s| s.dimmed())
                            .to_string(),
                    );
                }
            }
        }
        out.push('\n');
    }

    out
}

/// Markdown table in the layout of the report tables built from `results.json`.
pub fn format_markdown(matrix: &ResultMatrix, perf: bool) -> String {
    let threads = matrix.thread_counts();
    let label = "Thread number";

    let mut out = format!("| {} |", label);
    for t in &threads {
        out.push_str(&format!(" {} |", t));
    }
    out.push('\n');

    out.push_str(&format!("|{}|", "-".repeat(label.len() + 2)));
    for _ in &threads {
        out.push_str("----|");
    }
    out.push('\n');

    for (mode, cells) in matrix.iter() {
        out.push_str(&format!("| {} |", mode));
        for t in &threads {
            match cell_text(cells.get(t).copied(), perf) {
                Some(v) => out.push_str(&format!(" {} |", v)),
                None => out.push_str("  |"),
            }
        }
        out.push('\n');
    }

    out
}
