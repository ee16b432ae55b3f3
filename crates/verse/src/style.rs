//! Terminal styling for stdout.
//!
//! Every styled value goes through [`paint`], so `--color` (via
//! `owo_colors::set_override`) and terminal detection both apply.

use std::fmt::Display;

use owo_colors::{OwoColorize, Stream, Style};

/// Render `value` with `style` when stdout takes colors, plain otherwise.
pub fn paint<T: Display>(value: T, style: Style) -> String {
    value
        .if_supports_color(Stream::Stdout, |text| text.style(style))
        .to_string()
}

/// Bold text.
pub fn bold<T: Display>(value: T) -> String {
    paint(value, Style::new().bold())
}

/// Secondary text.
pub fn dimmed<T: Display>(value: T) -> String {
    paint(value, Style::new().dimmed())
}

/// Identifiers and paths.
pub fn accent<T: Display>(value: T) -> String {
    paint(value, Style::new().cyan())
}

/// New versions and success marks.
pub fn success<T: Display>(value: T) -> String {
    paint(value, Style::new().green().bold())
}

/// Things worth a second look.
pub fn warning<T: Display>(value: T) -> String {
    paint(value, Style::new().yellow())
}

/// Section headings.
pub fn heading<T: Display>(value: T) -> String {
    paint(value, Style::new().bold().underline())
}
