use console::style;
use serde_json::Value;
use unicode_width::UnicodeWidthStr;

use crate::config::ParamMap;

pub const RULE: &str = "================================================================================";

pub fn warning(prefix: &str, msg: &str) {
    println!("{} {}", style(format!("[{}]", prefix)).yellow().bold(), msg);
}

pub fn error(prefix: &str, msg: &str) {
    println!("{} {}", style(format!("[{}]", prefix)).red().bold(), msg);
}

pub fn info(prefix: &str, msg: &str) {
    println!("{} {}", style(format!("[{}]", prefix)).blue().bold(), msg);
}

pub fn success(prefix: &str, msg: &str) {
    println!("{} {}", style(format!("[{}]", prefix)).green().bold(), msg);
}

/// Pretty-print a parameter or result map as indented JSON.
pub fn print_json(map: &ParamMap) {
    match serde_json::to_string_pretty(&Value::Object(map.clone())) {
        Ok(text) => println!("{}", text),
        Err(_) => println!("{:?}", map),
    }
}

/// Aligned preview of every config about to run.
///
/// `start` marks where execution will resume.
pub fn print_preview(name: &str, entries: &[(String, String)], start: usize) {
    println!();
    println!(
        "{}",
        style(format!(
            "Running {} with {} configurations",
            name,
            entries.len()
        ))
        .green()
        .bold()
    );

    for (i, line) in preview_lines(entries, start).into_iter().enumerate() {
        if i < start {
            println!("{}", style(line).dim());
        } else if i == start {
            println!("{}", style(line).cyan().bold());
        } else {
            println!("{}", line);
        }
    }
}

/// Preview lines without styling, tags padded to the same display width.
fn preview_lines(entries: &[(String, String)], start: usize) -> Vec<String> {
    let index_width = entries.len().saturating_sub(1).to_string().len();
    let tag_width = entries.iter().map(|(tag, _)| tag.width()).max().unwrap_or(0);

    entries
        .iter()
        .enumerate()
        .map(|(i, (tag, display))| {
            let marker = if i == start { ">" } else { "-" };
            let padding = " ".repeat(tag_width - tag.width());
            format!(
                " {} [{:>iw$}] {}{}  ({})",
                marker,
                i,
                tag,
                padding,
                display,
                iw = index_width
            )
        })
        .collect()
}

/// Banner printed before each run.
pub fn print_run_header(time: &str, position: usize, total: usize, tag: &str) {
    println!();
    println!("{}", RULE);
    println!(
        "{} Running: {}/{} {}",
        time,
        position,
        total,
        style(tag).magenta().bold()
    );
    println!("{}", RULE);
}
