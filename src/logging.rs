use time::macros::format_description;
use tracing_subscriber::{fmt::time::LocalTime, EnvFilter};

/// Installs the global subscriber. `RUST_LOG` overrides the level picked
/// from the debug flag.
pub fn init(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let timer = LocalTime::new(format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second]"
    ));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(timer)
        .with_target(true)
        .init();
}
