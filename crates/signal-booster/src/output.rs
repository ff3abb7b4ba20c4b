//! Shared terminal rendering helpers for the command handlers.

use owo_colors::OwoColorize;

/// Horizontal rule width-matched to the report layout.
pub const HR: &str = "────────────────────────────────────────────────";

/// Key column width for aligned key/value rows.
pub const KEY_WIDTH: usize = 18;

pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", HR.dimmed());
}

pub fn section(title: &str) {
    println!();
    println!("{}", title.bold());
}

pub fn print_kv(key: &str, value: &str) {
    println!("  {:<width$} {}", key, value, width = KEY_WIDTH);
}

pub fn footer() {
    println!("{}", HR.dimmed());
    println!();
}
