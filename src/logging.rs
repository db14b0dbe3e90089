use log::LevelFilter;
use simplelog::{ColorChoice, CombinedLogger, ConfigBuilder, TermLogger, TerminalMode};

/// Installs a terminal logger at `level` (`error`, `warn`, `info`, `debug` or `trace`). Unknown
/// levels fall back to `info`.
pub fn init(level: &str) {
    let level = level.parse().unwrap_or(LevelFilter::Info);
    let logger_config = ConfigBuilder::new()
        .set_time_level(LevelFilter::Error)
        .set_target_level(LevelFilter::Off)
        .set_location_level(LevelFilter::Off)
        .build();
    if CombinedLogger::init(vec![TermLogger::new(
        level,
        logger_config,
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )])
    .is_err()
    {
        warn!("Logger already initialized");
    }
}
