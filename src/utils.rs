use anyhow::Result;
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

use crate::constants::{BYTES_PER_KB, VERBOSITY_SILENT, VERBOSITY_VERBOSE};

pub fn log_level(verbosity: &str) -> Level {
    match verbosity {
        VERBOSITY_SILENT => Level::ERROR,
        VERBOSITY_VERBOSE => Level::DEBUG,
        _ => Level::INFO,
    }
}

pub fn setup_logging(verbosity: &str) -> Result<()> {
    let level = log_level(verbosity);

    let filter = EnvFilter::from_default_env()
        .add_directive(format!("wave_sort={}", level).parse()?);

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= BYTES_PER_KB as f64 && unit_index < UNITS.len() - 1 {
        size /= BYTES_PER_KB as f64;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}

pub fn format_duration(millis: u64) -> String {
    let seconds = millis as f64 / 1000.0;
    if seconds < 60.0 {
        format!("{:.1}s", seconds)
    } else if seconds < 3600.0 {
        format!("{:.1}m", seconds / 60.0)
    } else {
        format!("{:.1}h", seconds / 3600.0)
    }
}
