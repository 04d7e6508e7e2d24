use std::fs;
use std::path::Path;

use time::UtcOffset;
use tracing::{Level, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{reload::Handle, EnvFilter};

const LOGGING_ENV_FILE: &str = "logging.env";

/// Installs the global subscriber. `log` records from the library are
/// forwarded into it.
///
/// Keep the returned handle alive for as long as logging is wanted, dropping it
/// flushes and stops the background writer.
pub fn init_logging() -> Result<LoggingHandle<EnvFilter, impl Subscriber>, String> {
    tracing_log::LogTracer::init().map_err(|err| format!("failed to bridge log records: {}", err))?;
    init_tracing_logger()
}

#[derive(Debug)]
pub enum ReloadLogLevelError {
    InvalidFilter(String),
    ReloadFailed(tracing_subscriber::reload::Error),
}

/// Re-reads `logging.env` and swaps the active filter for it.
pub fn reload_log_level<S>(handle: &Handle<EnvFilter, S>) -> Result<String, ReloadLogLevelError> {
    let new_filter = read_env_filter(Path::new(LOGGING_ENV_FILE)).map_err(ReloadLogLevelError::InvalidFilter)?;

    let filter_string = format!("{}", new_filter);

    handle.reload(new_filter).map_err(ReloadLogLevelError::ReloadFailed)?;

    Ok(filter_string)
}

fn init_tracing_logger() -> Result<LoggingHandle<EnvFilter, impl Subscriber>, String> {
    let timer = tracing_subscriber::fmt::time::OffsetTime::new(
        UtcOffset::current_local_offset().unwrap_or_else(|err| {
            eprintln!("Failed to get timezone: {}", err);
            UtcOffset::UTC
        }),
        time::macros::format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second] +[offset_hour]"
        ),
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(std::io::stdout());

    let env_filter = read_env_filter(Path::new(LOGGING_ENV_FILE)).unwrap_or_else(|err| {
        eprintln!(
            "Failed to read env filter, using environment variable or default: {}",
            err
        );
        EnvFilter::builder()
            .with_default_directive(Level::DEBUG.into())
            .from_env_lossy()
    });

    println!("Env Filter: {}", env_filter);

    let builder = tracing_subscriber::fmt()
        .with_timer(timer)
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_filter_reloading();

    let handle = builder.reload_handle();

    tracing::subscriber::set_global_default(builder.finish())
        .map_err(|err| format!("failed to initialize logger: {}", err))?;

    Ok(LoggingHandle {
        _non_blocking_guard: guard,
        handle,
    })
}

fn read_env_filter(path: &Path) -> Result<EnvFilter, String> {
    let s = fs::read_to_string(path)
        .map_err(|err| format!("Failed to read file {}: {}", path.display(), err))?;
    let first_line = s
        .lines()
        .next()
        .ok_or_else(|| format!("{} is empty", path.display()))?;
    EnvFilter::builder()
        .with_default_directive(Level::DEBUG.into())
        .parse(first_line)
        .map_err(|err| format!("Failed to parse env filter: {}", err))
}

pub struct LoggingHandle<L, S> {
    _non_blocking_guard: WorkerGuard,
    handle: Handle<L, S>,
}

impl<L, S> LoggingHandle<L, S> {
    pub fn reload_handle(&self) -> Handle<L, S> {
        self.handle.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_read_env_filter() {
        let path = env::temp_dir().join(format!("gpio_pin_logging_{}.env", std::process::id()));
        fs::write(&path, "gpio_pin=trace,warn\nignored").unwrap();
        let filter = read_env_filter(&path).expect("Filter should parse");
        assert!(filter.to_string().contains("gpio_pin=trace"), "Got {}", filter);

        fs::write(&path, "").unwrap();
        assert!(read_env_filter(&path).is_err(), "An empty file has no filter");

        fs::remove_file(&path).unwrap();
        assert!(read_env_filter(&path).is_err(), "A missing file has no filter");
    }
}
