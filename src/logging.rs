use time::UtcOffset;
use tracing_subscriber::{
    fmt::time::OffsetTime, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
    Registry,
};

use crate::config::LoggingConfig;
use crate::errors::{ConfigError, ModbusError};

/// Installs a global tracing subscriber for applications that do not bring
/// their own.
pub fn init(config: &LoggingConfig) -> Result<(), ModbusError> {
    config.validate()?;

    let timer = OffsetTime::new(
        UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC),
        time::format_description::well_known::Rfc3339,
    );

    let mut env_filter = EnvFilter::default().add_directive(config.level_filter().into());

    if config.trace_frames {
        env_filter = env_filter
            .add_directive("modbus_link::engine=trace".parse().expect("static directive"))
            .add_directive(
                "modbus_link::transport=trace"
                    .parse()
                    .expect("static directive"),
            );
    }

    let layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_level(true)
        .with_timer(timer)
        .with_filter(env_filter);

    Registry::default().with(layer).try_init().map_err(|e| {
        ModbusError::Config(ConfigError::logging(format!(
            "Failed to initialize logging: {e}"
        )))
    })
}
