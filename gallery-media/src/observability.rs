//! Subscriber bootstrap for binaries embedding the gateway.
//!
//! Gateway decisions (compensation, absorbed delete failures, sweep results)
//! are logged with `tracing`; dangling records removed by the sweeper go to
//! the [`AUDIT_TARGET`](crate::sweeper::AUDIT_TARGET) target so they can be
//! routed separately, e.g. `RUST_LOG=info,gallery::audit=info`.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a global subscriber filtered by `RUST_LOG` (default `info`).
///
/// Fails if a global subscriber is already set.
pub fn init_tracing(json: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(fmt::layer().json().with_target(true)).try_init()?;
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()?;
    }

    Ok(())
}
