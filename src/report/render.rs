use unicode_width::UnicodeWidthStr;

use crate::report::aggregate::Report;

/// Text shown instead of a table when a sweep produced nothing.
pub const NO_RESULTS: &str = "No results.";

fn pad_left(text: &str, width: usize) -> String {
    format!("{}{}", text, " ".repeat(width.saturating_sub(text.width())))
}

fn pad_center(text: &str, width: usize) -> String {
    let gap = width.saturating_sub(text.width());
    let left = gap / 2;
    format!("{}{}{}", " ".repeat(left), text, " ".repeat(gap - left))
}

/// Render the report as a boxed text table.
///
/// The tag column is left-aligned, metric columns are centered.
pub fn render_table(report: &Report) -> String {
    if report.is_empty() {
        return NO_RESULTS.to_string();
    }

    let rows: Vec<Vec<&str>> = report
        .groups
        .iter()
        .map(|group| report.columns.iter().map(|c| group.field(c)).collect())
        .collect();

    let widths: Vec<usize> = report
        .columns
        .iter()
        .enumerate()
        .map(|(i, column)| {
            rows.iter()
                .map(|row| row[i].width())
                .chain(std::iter::once(column.width()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let border = format!(
        "+{}+",
        widths
            .iter()
            .map(|w| "-".repeat(w + 2))
            .collect::<Vec<_>>()
            .join("+")
    );

    let line = |cells: &[&str]| -> String {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .enumerate()
            .map(|(i, (cell, &w))| {
                if i == 0 {
                    pad_left(cell, w)
                } else {
                    pad_center(cell, w)
                }
            })
            .collect();
        format!("| {} |", padded.join(" | "))
    };

    let header: Vec<&str> = report.columns.iter().map(String::as_str).collect();

    let mut out = Vec::with_capacity(rows.len() + 4);
    out.push(border.clone());
    out.push(line(&header));
    out.push(border.clone());
    for row in &rows {
        out.push(line(row));
    }
    out.push(border);
    out.join("\n")
}
