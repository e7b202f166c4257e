//! Publisher and subscriber entry points.

use std::sync::Arc;

use anyhow::Context;
use cc_app::{PollLoop, PublishLoop};
use cc_core::config::AppConfig;
use cc_core::protocol::PROTOCOL_VERSION;
use cc_core::ports::SubscriberNotifierPort;
use cc_platform::adapters::{ConnectionRegistry, OPERATOR_TARGET};
use cc_platform::transport::{connect, PublisherListener};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};

use super::wiring::{wire_client, wire_server, Presenter};

/// Log the error that ended the process where the operator will see it.
pub fn report_fatal(err: &anyhow::Error) {
    error!(target: OPERATOR_TARGET, "{err:#}");
}

/// Publish the local clipboard until `cancel` fires.
///
/// Bind failures are returned before anything else starts.
pub async fn run_server(config: &AppConfig, cancel: CancellationToken) -> anyhow::Result<()> {
    let deps = wire_server(config)?;

    let listener = PublisherListener::bind(deps.bind_addr, config.server.send_timeout()).await?;
    let local_addr = listener.local_addr()?;
    info!(
        target: OPERATOR_TARGET,
        max_connections = config.server.max_connections,
        protocol = PROTOCOL_VERSION,
        "publishing on {local_addr}"
    );

    let registry = ConnectionRegistry::with_shutdown(
        config.server.max_connections,
        deps.admission.clone(),
        cancel.child_token(),
    );

    let accept_span = info_span!("server.accept_loop", addr = %local_addr);
    let accept = tokio::spawn(
        listener
            .run_accept_loop(registry.clone(), deps.admission.clone(), cancel.clone())
            .instrument(accept_span),
    );

    let mut publish = PublishLoop::new(
        deps.clipboard,
        Arc::new(registry.clone()),
        config.server.tick_interval(),
    );
    if let Some(view) = deps.data_view {
        publish = publish.with_data_view(view);
    }
    publish.run(cancel.clone()).await;

    registry.shutdown().await;
    if let Err(e) = accept.await {
        warn!(error = %e, "accept loop ended abnormally");
    }
    info!("publisher stopped");
    Ok(())
}

/// Subscribe to the configured publisher.
///
/// Returns `Ok` only when `cancel` fires; losing the publisher is an error so
/// the process can exit non-zero.
pub async fn run_client(config: &AppConfig, cancel: CancellationToken) -> anyhow::Result<()> {
    let deps = wire_client(config)?;

    let conn = connect(&deps.endpoint, config.client.max_frame_bytes).await?;
    info!(target: OPERATOR_TARGET, "connected to {} as {}", deps.endpoint, conn.id());

    let notifier = deps.presenter.as_notifier();
    let acknowledgements = cancel.child_token();
    let listener = match &deps.presenter {
        Presenter::ShowAndConfirm(presenter) => {
            presenter.on_data_received(&deps.cache.current());
            let presenter = presenter.clone();
            let stop = acknowledgements.clone();
            Some(tokio::spawn(async move {
                presenter
                    .listen_for_acknowledgements(tokio::io::stdin(), stop)
                    .await
            }))
        }
        Presenter::AutoCopy(_) => None,
    };

    let result = PollLoop::new(conn, deps.cache, notifier)
        .with_receive_timeout(config.client.receive_timeout())
        .with_dead_peer_after(config.client.dead_peer_after())
        .run(cancel)
        .await;

    acknowledgements.cancel();
    if let Some(handle) = listener {
        handle.abort();
    }

    result.with_context(|| format!("subscription to {} ended", deps.endpoint))
}
