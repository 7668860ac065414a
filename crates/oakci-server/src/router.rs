//! Router assembly and the serve loop.

use std::sync::Arc;

use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, post, put};
use oakci_domain::error::{Error, Result};
use oakci_infrastructure::state::DaemonState;
use tracing::info;

use crate::middleware::{auth, cors, limit};
use crate::routes;

/// Builds the full router with the middleware stack applied, outermost
/// first: dynamic CORS, bearer auth, body-size cap.
#[must_use]
pub fn build_router(state: Arc<DaemonState>) -> Router {
    let api = Router::new()
        // Health and status
        .route("/api/health", get(routes::health::health))
        .route("/api/status", get(routes::health::status))
        .route("/api/logs", get(routes::health::logs))
        // Search surface
        .route(
            "/api/search",
            get(routes::search::search_get).post(routes::search::search_post),
        )
        .route("/api/fetch", post(routes::search::fetch))
        .route("/api/remember", post(routes::search::remember))
        .route("/api/context", post(routes::search::context))
        .route("/api/memories", get(routes::search::list_memories))
        .route(
            "/api/memories/bulk-resolve",
            post(routes::search::bulk_resolve),
        )
        .route(
            "/api/memories/bulk-delete",
            post(routes::search::bulk_delete),
        )
        .route(
            "/api/memories/{id}/status",
            put(routes::search::update_memory_status),
        )
        // Activity browsing
        .route("/api/activity/event", post(routes::events::hook_event))
        .route("/api/activity/sessions", get(routes::activity::list_sessions))
        .route(
            "/api/activity/sessions/{id}",
            get(routes::activity::get_session).delete(routes::activity::delete_session),
        )
        .route(
            "/api/activity/sessions/{id}/related",
            get(routes::activity::list_related).post(routes::activity::add_related),
        )
        .route(
            "/api/activity/sessions/{id}/related/{other}",
            delete(routes::activity::remove_related),
        )
        .route(
            "/api/activity/sessions/{id}/suggested-related",
            get(routes::activity::suggested_related),
        )
        .route(
            "/api/activity/batches/{id}",
            get(routes::activity::get_batch).delete(routes::activity::delete_batch),
        )
        .route(
            "/api/activity/activities/{id}",
            get(routes::activity::get_activity).delete(routes::activity::delete_activity),
        )
        // Notify receiver
        .route("/api/notify", post(routes::events::notify))
        // Governance
        .route(
            "/api/governance/config",
            get(routes::governance::get_config).put(routes::governance::put_config),
        )
        .route("/api/governance/audit", get(routes::governance::audit))
        .route(
            "/api/governance/audit/summary",
            get(routes::governance::audit_summary),
        )
        .route(
            "/api/governance/audit/prune",
            post(routes::governance::audit_prune),
        )
        .route("/api/governance/test", post(routes::governance::test))
        // Backup
        .route("/api/backup/status", get(routes::backup::status))
        .route("/api/backup/create", post(routes::backup::create))
        .route("/api/backup/restore", post(routes::backup::restore))
        // Tunnel
        .route("/api/tunnel/start", post(routes::tunnel::start))
        .route("/api/tunnel/stop", post(routes::tunnel::stop))
        .route("/api/tunnel/status", get(routes::tunnel::status))
        // Cloud relay
        .route("/api/cloud/preflight", get(routes::cloud_relay::preflight))
        .route("/api/cloud/start", post(routes::cloud_relay::start))
        .route("/api/cloud/stop", post(routes::cloud_relay::stop))
        .route(
            "/api/cloud/settings",
            put(routes::cloud_relay::settings),
        )
        .route("/api/cloud/status", get(routes::cloud_relay::status))
        .route("/api/cloud/connect", post(routes::cloud_relay::connect))
        .route(
            "/api/cloud/disconnect",
            post(routes::cloud_relay::disconnect),
        )
        // Devtools
        .route(
            "/api/devtools/rebuild-index",
            post(routes::devtools::rebuild_index),
        )
        .route(
            "/api/devtools/reset-processing",
            post(routes::devtools::reset_processing),
        )
        .route(
            "/api/devtools/trigger-processing",
            post(routes::devtools::trigger_processing),
        )
        .route(
            "/api/devtools/re-embed-memories",
            post(routes::devtools::re_embed_memories),
        )
        .route(
            "/api/devtools/memory-stats",
            get(routes::devtools::memory_stats),
        )
        // Schedules and saved tasks
        .route(
            "/api/schedules",
            get(routes::schedules::list_schedules).post(routes::schedules::upsert_schedule),
        )
        .route(
            "/api/schedules/{id}",
            delete(routes::schedules::delete_schedule),
        )
        .route(
            "/api/tasks/saved",
            get(routes::schedules::list_saved_tasks).post(routes::schedules::upsert_saved_task),
        )
        .route(
            "/api/tasks/saved/{id}",
            delete(routes::schedules::delete_saved_task),
        )
        // System
        .route("/api/restart", post(routes::system::restart))
        .route(
            "/api/config",
            get(routes::system::get_config).put(routes::system::put_config),
        );

    api.layer(from_fn_with_state(
        Arc::clone(&state),
        limit::body_size_limit,
    ))
    .layer(from_fn_with_state(Arc::clone(&state), auth::bearer_auth))
    .layer(from_fn_with_state(Arc::clone(&state), cors::dynamic_cors))
    .with_state(state)
}

/// Binds and serves until the shutdown token fires.
pub async fn serve(state: Arc<DaemonState>) -> Result<()> {
    let config = state.config.get().server;
    let address = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .map_err(|e| Error::network(format!("could not bind {address}: {e}")))?;
    info!(address = %address, "daemon listening");

    let shutdown = state.shutdown.clone();
    let router = build_router(state);
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| Error::network(format!("server error: {e}")))
}
