//! Logging setup.
//!
//! `PTAH_LOG` takes an `EnvFilter` directive (`debug`, `ptah_migrate=trace`,
//! ...) and wins over `-v`. Without either, only warnings are shown.
//! `PTAH_LOG_FORMAT=json` switches to JSON lines. Logs go to stderr.

use std::env;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Environment variable holding the filter directive.
pub const LOG_ENV: &str = "PTAH_LOG";

/// Environment variable selecting the output format.
pub const LOG_FORMAT_ENV: &str = "PTAH_LOG_FORMAT";

/// Default directive for a `-v` count.
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber. Safe to call more than once.
pub fn init(verbosity: u8) {
    let filter = env::var(LOG_ENV)
        .ok()
        .and_then(|directive| EnvFilter::try_new(directive).ok())
        .unwrap_or_else(|| EnvFilter::new(default_directive(verbosity)));

    let json = env::var(LOG_FORMAT_ENV).is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
            .ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_harmless() {
        init(0);
        init(2);
        tracing::debug!("still logging");
    }

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive(0), "warn");
        assert_eq!(default_directive(1), "debug");
        assert_eq!(default_directive(4), "trace");
    }
}
