// src/logging.rs
use tracing_subscriber::{filter::Directive, fmt, EnvFilter};

/// Build the filter: `RUST_LOG` if set, else `default`, plus `LOG_LEVEL` as
/// an extra directive when it parses.
pub fn env_filter(default: &str, log_level: Option<&str>) -> EnvFilter {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    match log_level.and_then(|l| l.parse::<Directive>().ok()) {
        Some(directive) => filter.add_directive(directive),
        None => filter,
    }
}

/// Install the global fmt subscriber. Safe to call more than once; later
/// calls are ignored.
pub fn init(default: &str) {
    let log_level = std::env::var("LOG_LEVEL").ok();
    let _ = fmt()
        .with_env_filter(env_filter(default, log_level.as_deref()))
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .try_init();
}

/// Subscriber for tests: output captured by the test harness.
#[cfg(test)]
pub(crate) fn init_for_tests() {
    let _ = fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_adds_a_directive() {
        let f = env_filter("info", Some("salesboard=trace"));
        assert!(f.to_string().contains("salesboard=trace"));
        let f = env_filter("info", Some("salesboard=bogus"));
        assert!(!f.to_string().contains("bogus"));
    }

    #[test]
    fn init_twice_is_harmless() {
        init_for_tests();
        init("debug");
        tracing::info!("logging ready");
    }
}
