/// Terminal output of the sub-commands. Diagnostics go through `tracing`; this is the
/// human facing summary printed to stdout.
use colored::*;
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color as TableColor, ContentArrangement, Table};
use std::io::IsTerminal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    Success,
    Warning,
    Tip,
}

/// Settings of the run about to start, one `label: value` line each.
pub fn print_settings(title: &str, settings: &[(&str, String)]) {
    let width = settings.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
    println!("\n{} {}", "▶".cyan(), title.bold());
    for (label, value) in settings {
        println!("  {}  {}", format!("{:<width$}", label, width = width).dimmed(), value);
    }
}

pub fn notice(kind: Notice, message: &str) {
    match kind {
        Notice::Success => println!("\n{} {}", "✓".green().bold(), message),
        Notice::Warning => println!("\n{} {}", "⚠".yellow(), message.yellow()),
        Notice::Tip => println!("\n{} {}", "→".cyan(), message.dimmed()),
    }
}

/// Counters with right aligned values.
pub fn print_counters(title: &str, rows: Vec<(&str, String)>) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new(title).add_attribute(Attribute::Bold).fg(TableColor::Cyan),
            Cell::new(""),
        ]);
    for (label, value) in rows {
        table.add_row(vec![
            Cell::new(label),
            Cell::new(value)
                .fg(TableColor::Green)
                .set_alignment(CellAlignment::Right),
        ]);
    }
    println!("\n{}", table);
}

/// `1234567` as `1,234,567`.
pub fn group_digits(n: u64) -> String {
    let digits = n.to_string();
    let head = digits.len() % 3;
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    out.push_str(&digits[..head]);
    for (i, chunk) in digits.as_bytes()[head..].chunks(3).enumerate() {
        if head > 0 || i > 0 {
            out.push(',');
        }
        out.push_str(std::str::from_utf8(chunk).unwrap_or_default());
    }
    out
}

/// Colours follow `NO_COLOR` and are off when stdout is not a terminal.
pub fn init() {
    if std::env::var_os("NO_COLOR").is_some() || !std::io::stdout().is_terminal() {
        colored::control::set_override(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_digits() {
        assert_eq!(group_digits(0), "0");
        assert_eq!(group_digits(999), "999");
        assert_eq!(group_digits(1000), "1,000");
        assert_eq!(group_digits(1234567), "1,234,567");
        assert_eq!(group_digits(123456), "123,456");
    }
}
