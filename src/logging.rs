// Logging setup: tracing-subscriber fmt output filtered by RUST_LOG.

use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;

/// Third-party crates that are chatty at info level
const NOISY_TARGETS: &[(&str, &str)] = &[
    ("headless_chrome", "warn"),
    ("tungstenite", "warn"),
    ("hyper", "warn"),
    ("reqwest", "warn"),
    ("html5ever", "error"),
    ("selectors", "error"),
];

/// `RUST_LOG` wins when set; otherwise `level` plus the noisy-crate caps.
fn build_env_filter(level: &str) -> anyhow::Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let mut directives = vec![level.to_string()];
    for (target, lvl) in NOISY_TARGETS {
        directives.push(format!("{}={}", target, lvl));
    }

    let filter_str = directives.join(",");
    EnvFilter::try_new(&filter_str)
        .map_err(|e| anyhow::anyhow!("Invalid tracing filter '{}': {}", filter_str, e))
}

/// Install the global subscriber. Colors are dropped when stdout is not a
/// terminal, e.g. when the form redirects a run into its log file.
pub fn init(level: &str) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(build_env_filter(level)?)
        .with_ansi(std::io::stdout().is_terminal())
        .with_target(false)
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_is_valid() {
        let filter = build_env_filter("info").unwrap();
        if std::env::var_os("RUST_LOG").is_none() {
            let rendered = filter.to_string();
            assert!(rendered.contains("headless_chrome=warn"));
        }
    }
}
