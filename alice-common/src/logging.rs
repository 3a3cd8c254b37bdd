//! Logging setup for the Alice client.
//!
//! Everything goes to stderr so that answers printed on stdout stay clean.
//! Transport crates log every frame at `debug`; they are capped at `warn`
//! unless `RUST_LOG` says otherwise.

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Crates capped at `warn` regardless of the base level.
pub const NOISY_MODULES: &[&str] = &[
    "hyper",
    "hyper_util",
    "reqwest",
    "h2",
    "rustls",
    "tungstenite",
    "tokio_tungstenite",
];

/// Output flavour of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    /// Anything other than `json` falls back to pretty output.
    pub fn from_name(name: &str) -> Self {
        if name.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Pretty
        }
    }
}

/// Filter directives: the base level followed by one `target=warn` per quiet target.
fn build_directives(log_level: &str, excluded_targets: &[String]) -> String {
    let quiet = NOISY_MODULES
        .iter()
        .copied()
        .chain(excluded_targets.iter().map(String::as_str))
        .map(|target| format!("{target}=warn"));

    std::iter::once(log_level.to_string())
        .chain(quiet)
        .collect::<Vec<_>>()
        .join(",")
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init_logging(log_level: &str, log_format: &str, excluded_targets: &[String]) {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new(build_directives(log_level, excluded_targets)),
    };
    let registry = tracing_subscriber::registry().with(filter);

    let format = LogFormat::from_name(log_format);
    let installed = match format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_span_events(FmtSpan::CLOSE)
                    .with_current_span(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };

    if installed.is_ok() {
        tracing::debug!(level = %log_level, format = ?format, "Logging ready");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noisy_and_excluded_targets_are_capped() {
        let directives = build_directives("debug", &["alice_session::version".to_string()]);
        assert!(directives.starts_with("debug,hyper=warn"));
        assert!(directives.contains(",tokio_tungstenite=warn"));
        assert!(directives.ends_with(",alice_session::version=warn"));
    }

    #[test]
    fn test_unknown_format_is_pretty() {
        assert_eq!(LogFormat::from_name("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::from_name("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::from_name("xml"), LogFormat::Pretty);
    }

    #[test]
    fn test_second_init_is_harmless() {
        init_logging("info", "pretty", &[]);
        init_logging("debug", "json", &[]);
    }
}
