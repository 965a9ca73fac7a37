//! Tracing setup shared by the binaries

use eyre::{Result, WrapErr};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// One-shot CLI
pub const CLI_DIRECTIVES: &str = "dex_metrics=info";
/// HTTP server: library and the `serve` binary itself
pub const SERVER_DIRECTIVES: &str = "dex_metrics=info,serve=info";
/// scan-pools / compare-rpcs print their own report; only warnings from the library
pub const TOOL_DIRECTIVES: &str = "dex_metrics=warn";

/// `RUST_LOG` plus each comma-separated entry of `defaults`
pub fn env_filter(defaults: &str) -> Result<EnvFilter> {
    let mut filter = EnvFilter::from_default_env();
    for directive in defaults.split(',').map(str::trim).filter(|d| !d.is_empty()) {
        let parsed = directive
            .parse()
            .wrap_err_with(|| format!("Invalid log directive {:?}", directive))?;
        filter = filter.add_directive(parsed);
    }
    Ok(filter)
}

/// Install the global subscriber. Logs go to stderr so stdout stays
/// machine-readable.
pub fn init_tracing(defaults: &str) -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(env_filter(defaults)?)
        .try_init()?;

    Ok(())
}
