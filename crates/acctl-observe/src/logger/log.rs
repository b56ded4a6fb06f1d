use time::{UtcOffset, format_description::well_known::Rfc3339};
use tracing_subscriber::{
    EnvFilter, fmt, fmt::time::OffsetTime, layer::SubscriberExt, util::SubscriberInitExt,
    util::TryInitError,
};

use crate::logger::{config::LoggerConfig, error::LoggerError, format::LoggerFormat};

/// Install one global subscriber: level filter plus the layer matching
/// `cfg.format`. Layers for other formats stay `None`.
pub(crate) fn install(cfg: &LoggerConfig) -> Result<(), LoggerError> {
    let level = cfg.level.as_str();
    let filter =
        EnvFilter::try_new(level).map_err(|_| LoggerError::InvalidLogLevel(level.to_owned()))?;

    let text = (cfg.format == LoggerFormat::Text).then(|| {
        fmt::layer()
            .with_ansi(cfg.use_color)
            .with_target(cfg.with_targets)
            .with_timer(local_rfc3339())
    });
    let json = (cfg.format == LoggerFormat::Json).then(|| {
        fmt::layer()
            .json()
            .with_ansi(false)
            .with_target(cfg.with_targets)
            .with_timer(local_rfc3339())
    });

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(text)
        .with(json);

    #[cfg(all(target_os = "linux", feature = "journald"))]
    let registry = {
        let journald = match cfg.format {
            LoggerFormat::Journald => Some(
                tracing_journald::layer()
                    .map_err(|e| LoggerError::InitializationFailed(format!("journald: {e}")))?,
            ),
            _ => None,
        };
        registry.with(journald)
    };

    #[cfg(not(all(target_os = "linux", feature = "journald")))]
    if cfg.format == LoggerFormat::Journald {
        return Err(LoggerError::JournaldNotSupported);
    }

    registry.try_init().map_err(init_error)
}

/// Timestamps in the host's local offset, UTC when it cannot be read.
fn local_rfc3339() -> OffsetTime<Rfc3339> {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    OffsetTime::new(offset, Rfc3339)
}

fn init_error(e: TryInitError) -> LoggerError {
    if tracing::dispatcher::has_been_set() {
        LoggerError::AlreadyInitialized
    } else {
        LoggerError::InitializationFailed(e.to_string())
    }
}
