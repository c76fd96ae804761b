//! Tracing and Sentry initialization for hosts embedding the checkout.

use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::CheckoutConfig;
use crate::error::CAPTURED_TARGET;

/// Start Sentry when a DSN is configured.
///
/// Every event is tagged `component=checkout` so hosts sharing one Sentry
/// project can tell checkout failures apart. Returns `None` without a DSN.
#[must_use]
pub fn init_sentry(config: &CheckoutConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_deref()?;

    let guard = sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config.sentry_environment.clone().map(Into::into),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));
    sentry::configure_scope(|scope| scope.set_tag("component", "checkout"));

    tracing::info!(environment = ?config.sentry_environment, "Sentry initialized");
    Some(guard)
}

/// Map checkout log levels onto Sentry.
///
/// Only `error!` becomes an event, except on [`CAPTURED_TARGET`] where
/// `report` has already captured the error itself. Provider and network
/// failures log at `warn!` and are expected during normal use, so they ride
/// along as breadcrumbs with the `info!` steps. Per-tick `debug!` polling is
/// dropped.
#[must_use]
pub fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR if metadata.target() == CAPTURED_TARGET => {
            sentry_tracing::EventFilter::Breadcrumb
        }
        tracing::Level::ERROR => sentry_tracing::EventFilter::Event,
        tracing::Level::WARN | tracing::Level::INFO => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

/// Install the global tracing subscriber and Sentry.
///
/// Defaults to info level for the checkout crate if `RUST_LOG` is not set.
/// Keep the returned guard alive for the lifetime of the host process.
#[must_use]
pub fn init(config: &CheckoutConfig) -> Option<sentry::ClientInitGuard> {
    // Sentry must be initialized before the tracing subscriber
    let sentry_guard = init_sentry(config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "marketplace_checkout=info".into());

    let (json, text) = if config.log_json {
        (Some(tracing_subscriber::fmt::layer().json()), None)
    } else {
        (None, Some(tracing_subscriber::fmt::layer()))
    };

    let result = tracing_subscriber::registry()
        .with(env_filter)
        .with(json)
        .with(text)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .try_init();

    if let Err(e) = result {
        tracing::debug!(error = %e, "Tracing subscriber already installed");
    }

    sentry_guard
}
