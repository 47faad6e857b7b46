//! Tracing setup: stderr console layer (pretty or JSON), optional JSON-lines
//! file sink, and a reloadable level filter for the console `debug` toggle.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use antctl_config::Logging;
use eyre::{Result, WrapErr};
use tracing_appender::non_blocking::NonBlocking;
use tracing_appender::rolling::{self, RollingFileAppender};
use tracing_subscriber::{
    EnvFilter, Registry, fmt, layer::SubscriberExt, reload, util::SubscriberInitExt,
};

use crate::cli::FILE_GUARD;

/// Handle on the installed level filter.
pub struct LogControl {
    handle: reload::Handle<EnvFilter, Registry>,
    base: String,
    debug: AtomicBool,
}

impl LogControl {
    /// Flip between the configured level and `debug`; returns the new state.
    pub fn toggle_debug(&self) -> Result<bool> {
        let enable = !self.debug.load(Ordering::Relaxed);
        let directives = if enable { "debug" } else { self.base.as_str() };
        self.handle
            .reload(EnvFilter::new(directives))
            .map_err(|e| eyre::eyre!("failed to reload log filter: {e}"))?;
        self.debug.store(enable, Ordering::Relaxed);
        Ok(enable)
    }
}

/// `RUST_LOG` wins, then `--log-level`, then `[logging].level`, then `info`.
fn effective_level(cli_level: Option<&str>, logging: &Logging) -> String {
    std::env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| cli_level.map(str::to_string))
        .or_else(|| logging.level.clone())
        .unwrap_or_else(|| "info".to_string())
}

fn file_appender(path: &Path, rotation: Option<&str>) -> Result<RollingFileAppender> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let Some(name) = path.file_name() else {
        eyre::bail!("logging.file '{}' has no file name", path.display());
    };
    std::fs::create_dir_all(dir)
        .wrap_err_with(|| format!("failed to create log directory {}", dir.display()))?;
    Ok(match rotation.unwrap_or("never") {
        "never" => rolling::never(dir, name),
        "daily" => rolling::daily(dir, name),
        "hourly" => rolling::hourly(dir, name),
        other => eyre::bail!("logging.rotation must be never|daily|hourly, got '{other}'"),
    })
}

fn file_writer(logging: &Logging) -> Result<Option<NonBlocking>> {
    let Some(file) = logging.file.as_deref() else {
        return Ok(None);
    };
    let appender = file_appender(Path::new(file), logging.rotation.as_deref())?;
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = FILE_GUARD.set(guard);
    Ok(Some(writer))
}

/// Install the global subscriber. Logs go to stderr so console output on
/// stdout stays clean.
pub fn init(cli_level: Option<&str>, json: bool, logging: &Logging) -> Result<LogControl> {
    let base = effective_level(cli_level, logging);
    let filter =
        EnvFilter::try_new(&base).wrap_err_with(|| format!("invalid log level '{base}'"))?;
    let (filter, handle) = reload::Layer::new(filter);

    let console_json = json.then(|| fmt::layer().json().with_writer(std::io::stderr));
    let console_text = (!json).then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
    });
    let file = file_writer(logging)?.map(|w| fmt::layer().json().with_writer(w).with_ansi(false));

    tracing_subscriber::registry()
        .with(filter)
        .with(console_json)
        .with(console_text)
        .with(file)
        .try_init()
        .wrap_err("failed to initialize logging")?;

    Ok(LogControl {
        handle,
        base,
        debug: AtomicBool::new(false),
    })
}
