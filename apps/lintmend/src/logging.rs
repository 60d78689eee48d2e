//! Tracing subscriber setup for the binary.
//!
//! Diagnostics go to stderr; command results stay on stdout.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// `RUST_LOG` wins when set; otherwise warnings only, or debug output for
/// this crate with `verbose`.
pub fn filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| {
            if verbose {
                EnvFilter::try_new("lintmend=debug,info")
            } else {
                EnvFilter::try_new("lintmend=warn")
            }
        })
        .unwrap_or_else(|_| EnvFilter::new("warn"))
}

pub fn init_tracing(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(filter(verbose))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbose)
                .compact(),
        )
        .try_init()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_reports_error_instead_of_panicking() {
        let _ = init_tracing(false);
        assert!(init_tracing(true).is_err());
    }
}
