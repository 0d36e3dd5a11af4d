//! The `nebula-server` binary: wires the webhook ingress router, the
//! Trigger Manager, the Schedule Manager, and the Flow Execution Engine
//! into one running process, then serves HTTP until shut down (spec §2
//! overview, §4.1-§4.5).
//!
//! Node-type execution plug-ins are a collaborator boundary this crate
//! deliberately does not own (spec §6: the `NodeExecutor` trait). Lacking
//! a real plug-in registry to wire in, this binary boots with an empty
//! [`nebula_engine::testing::StaticNodeExecutor`]; every workflow will run
//! to `DependencyUnsatisfiable`/`NodeExecutorError::UnknownNodeType` until
//! a real executor is substituted by whatever embeds this crate for
//! production node-type coverage.

use std::sync::Arc;

use nebula_api::{InMemoryWorkflowStore, ResultCache, ScheduleManager, ServerConfig, TriggerManager, WorkflowSyncFacade};
use nebula_engine::testing::StaticNodeExecutor;
use nebula_engine::FlowExecutionEngine;
use nebula_telemetry::service::NoopTelemetry;
use nebula_webhook::{build_router, WebhookLimits, WebhookRegistry, WebhookRouterState};

#[tokio::main]
async fn main() {
    nebula_log::init();

    let config = ServerConfig::from_env();
    tracing::info!(bind_addr = %config.bind_addr, "starting nebula-server");

    let telemetry = NoopTelemetry::arc();
    let executor = Arc::new(StaticNodeExecutor::new());
    let engine = Arc::new(FlowExecutionEngine::new(executor, Arc::clone(&telemetry)));

    let workflows = Arc::new(InMemoryWorkflowStore::new());
    let trigger_manager = TriggerManager::new(
        Arc::clone(&engine),
        Arc::clone(&workflows) as Arc<dyn nebula_api::WorkflowSource>,
        ResultCache::new(),
        config.trigger_manager,
    );

    let schedules = ScheduleManager::new(Arc::clone(&trigger_manager), config.schedule);
    schedules.spawn_tick_loop();

    let webhook_registry = Arc::new(WebhookRegistry::new());
    let _sync = WorkflowSyncFacade::new(Arc::clone(&webhook_registry), Arc::clone(&schedules));

    let router_state = Arc::new(WebhookRouterState {
        registry: webhook_registry,
        dispatcher: trigger_manager as Arc<dyn nebula_webhook::TriggerDispatcher>,
        credentials: None,
        limits: WebhookLimits::default(),
        telemetry,
    });

    let app = build_router(router_state).into_make_service_with_connect_info::<std::net::SocketAddr>();

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .unwrap_or_else(|error| panic!("failed to bind {}: {error}", config.bind_addr));
    tracing::info!(bind_addr = %config.bind_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
