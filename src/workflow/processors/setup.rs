//! Setup/initialization module - handles application startup tasks
//!
//! Includes:
//! - Logger initialization
//! - Folder structure initialization

use anstyle::{AnsiColor, Color, Style};
use anyhow::{Context, Result};
use env_logger::{Builder, Env, WriteStyle};
use log::kv::Key;
use std::io::Write;

use crate::config::AppConfig;

// ────────────────────────────────────────────────────────────────
// Folder Initialization
// ────────────────────────────────────────────────────────────────

/// Create required folder structure for the application
pub fn initialize_folder(config: &AppConfig) -> Result<()> {
    let bucket_dir = config.objects_dir().join(&config.bucket);
    std::fs::create_dir_all(&bucket_dir)
        .with_context(|| format!("failed to create directory tree {:?}", bucket_dir))?;
    Ok(())
}

// ────────────────────────────────────────────────────────────────
// Logger Initialization
// ────────────────────────────────────────────────────────────────

const DIM: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::BrightBlack)));
const CYAN: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Cyan)));

/// Format a `duration` key-value to two decimals with a space before the unit.
fn format_duration(raw: String) -> String {
    if let Some(idx) = raw.find(|c: char| c.is_alphabetic()) {
        let (num, unit) = (&raw[..idx], &raw[idx..]);
        if let Ok(val) = num.parse::<f32>() {
            return format!("{:.2} {}", val, unit);
        }
    }
    raw
}

/// Initialize the logger. `RUST_LOG` overrides the default INFO level.
pub fn initialize_logger() {
    Builder::from_env(Env::default().default_filter_or("info"))
        .write_style(WriteStyle::Auto)
        .format(|buf, record| {
            let ts = buf.timestamp();
            let level_style = buf.default_level_style(record.level());

            let dur_raw = record
                .key_values()
                .get(Key::from("duration"))
                .map(|v| format_duration(v.to_string()))
                .unwrap_or_default();
            let instance = record
                .key_values()
                .get(Key::from("instance"))
                .map(|v| format!(" [{}]", v))
                .unwrap_or_default();

            let dur = if dur_raw.is_empty() {
                " ".repeat(10)
            } else {
                format!("{CYAN}{:>10}{CYAN:#}", dur_raw)
            };

            writeln!(
                buf,
                "{DIM}{ts}{DIM:#} {level_style}{}{level_style:#} {DIM}{}{DIM:#}{}",
                record.level(),
                record.target(),
                instance,
            )?;

            let message = format!("{}", record.args());
            let subsequent_indent = " ".repeat(11);
            let mut lines = message.lines();

            if let Some(first_line) = lines.next() {
                writeln!(buf, "{} {}", dur, first_line)?;
            }
            for line in lines {
                writeln!(buf, "{}{}", subsequent_indent, line)?;
            }

            Ok(())
        })
        .filter(Some("rocket"), log::LevelFilter::Warn)
        .init();
}
