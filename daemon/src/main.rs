//! Helpdesk ticket engine process.
//!
//! Runs the escalation scheduler and the event log consumer over in-memory
//! storage until Ctrl+C or SIGTERM.

use helpdesk_core::environment::{Clock, SystemClock};
use helpdesk_core::event_bus::EventBus;
use helpdesk_daemon::config::SeedUser;
use helpdesk_daemon::lifecycle::{await_shutdown, shutdown_signal};
use helpdesk_daemon::{Config, EventConsumer, TicketEventLogger};
use helpdesk_runtime::metrics::MetricsServer;
use helpdesk_runtime::{
    EscalationScheduler, HelpdeskEngine, InProcessEventBus, IntervalTicker, WorkflowEnvironment,
};
use helpdesk_testing::{InMemoryTicketStore, InMemoryUserDirectory};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_new(&config.server.log_level)
                .unwrap_or_else(|_| EnvFilter::new("helpdesk=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting helpdesk engine");
    info!(
        workload_ceiling = config.engine.workload_ceiling,
        escalation_interval = ?config.engine.escalation_interval,
        event_topic = %config.engine.event_topic,
        seed_users = config.seed_users.len(),
        "Configuration loaded"
    );

    let mut metrics = MetricsServer::new(config.metrics_addr()?);
    metrics.start()?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let event_bus = Arc::new(InProcessEventBus::new(config.engine.event_channel_capacity));
    let store = Arc::new(InMemoryTicketStore::with_clock(Arc::clone(&clock)));
    let directory = Arc::new(InMemoryUserDirectory::with_users(
        config.seed_users.iter().map(SeedUser::to_user),
    ));

    let env = WorkflowEnvironment::new(
        store,
        directory,
        Arc::clone(&event_bus) as Arc<dyn EventBus>,
        clock,
        config.engine.clone(),
    );
    let engine = HelpdeskEngine::new(env);

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let scheduler = EscalationScheduler::new(
        engine.escalation(),
        Box::new(IntervalTicker::new(config.engine.escalation_interval)),
        shutdown_tx.subscribe(),
    )
    .spawn();

    let event_log = EventConsumer::new(
        "event-log",
        vec![config.engine.event_topic.clone()],
        event_bus,
        Arc::new(TicketEventLogger::new()),
        shutdown_tx.subscribe(),
    )
    .spawn();

    info!("Helpdesk engine running");
    shutdown_signal().await;

    info!("Initiating graceful shutdown...");
    if shutdown_tx.send(()).is_err() {
        warn!("No background task was listening for shutdown");
    }
    await_shutdown(
        vec![("escalation-scheduler", scheduler), ("event-log", event_log)],
        config.shutdown_timeout(),
    )
    .await;

    match engine.queries().statistics().await {
        Ok(stats) => info!(
            total = stats.total,
            active = stats.active(),
            unassigned = stats.unassigned,
            "Final ticket statistics"
        ),
        Err(e) => warn!(error = %e, "Could not read final statistics"),
    }
    if let Some(snapshot) = metrics.render() {
        debug!(metrics = %snapshot, "Final metrics snapshot");
    }

    info!("Graceful shutdown complete");
    Ok(())
}
