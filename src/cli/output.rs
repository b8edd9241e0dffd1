//! Output formatting utilities for CLI

use serde::Serialize;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Print a serializable value as JSON or use custom text formatter
pub fn print_formatted<T, F>(value: &T, format: OutputFormat, text_formatter: F)
where
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    match format {
        OutputFormat::Text => println!("{}", text_formatter(value)),
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(value) {
                println!("{}", json);
            }
        }
    }
}

/// Print one event of a stream: a single JSON line, or the text form
pub fn print_event<T, F>(value: &T, format: OutputFormat, text_formatter: F)
where
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    match format {
        OutputFormat::Text => println!("{}", text_formatter(value)),
        OutputFormat::Json => match serde_json::to_string(value) {
            Ok(json) => println!("{}", json),
            Err(e) => tracing::warn!("Failed to serialize event: {}", e),
        },
    }
}

/// Print a success message (suppressed in quiet mode)
pub fn print_success(message: &str, quiet: bool) {
    if !quiet {
        println!("{}", message);
    }
}

/// Print an error message (never suppressed)
pub fn print_error(message: &str) {
    eprintln!("Error: {}", message);
}

/// Print a status line with a check mark or X
pub fn print_status(ok: bool, message: &str) {
    if ok {
        println!("[OK] {}", message);
    } else {
        println!("[  ] {}", message);
    }
}

/// `Some(n)` as `n`, `None` as `-`
pub fn format_count(count: Option<usize>) -> String {
    count.map_or_else(|| "-".to_string(), |n| n.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(None), "-");
        assert_eq!(format_count(Some(0)), "0");
        assert_eq!(format_count(Some(12)), "12");
    }
}
