use anyhow::{Context, Result};
use tracing::Subscriber;
use tracing::subscriber::set_global_default;
use tracing_log::LogTracer;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt};

/// Log an error if it exists using the alternate selector, which emits the
/// error chain.
pub fn log_error(e: impl Into<anyhow::Error>) {
    let e: anyhow::Error = e.into();
    tracing::error!("{e:#}");
}

pub fn get_subscriber(env_filter: String) -> impl Subscriber + Sync + Send {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(env_filter));
    let stderr = fmt::Layer::new()
        .with_writer(std::io::stderr)
        .pretty()
        .with_span_events(fmt::format::FmtSpan::CLOSE);
    Registry::default().with(env_filter).with(stderr)
}

/// Register a subscriber as global default to process span data. A second
/// call fails instead of replacing the first subscriber.
pub fn init_subscriber(subscriber: impl Subscriber + Sync + Send) -> Result<()> {
    LogTracer::init().context("Failed to set logger")?;
    set_global_default(subscriber).context("Failed to set subscriber")?;
    Ok(())
}

/// Tracing setup for test functions. Every scenario calls this, so a
/// subscriber that is already installed is not an error.
pub fn init_test_tracing() {
    let subscriber = get_subscriber("info".into());
    let _ = LogTracer::init();
    let _ = subscriber.try_init();
}
