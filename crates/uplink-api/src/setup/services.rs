//! Service initialization and application state setup

use crate::engine::{event_channels, EngineEvents};
use crate::services::{
    run_event_loop, FixedWindowRateLimiter, ProgressHub, SessionService, UploadLifecycleAdapter,
};
use crate::state::AppState;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uplink_core::{Config, IdentityLookup};
use uplink_store::KvStore;

/// Build the application state and start the upload event loop.
///
/// Must be called from within a tokio runtime.
pub fn initialize_services(
    config: &Config,
    store: Arc<dyn KvStore>,
    identity: Arc<dyn IdentityLookup>,
) -> Arc<AppState> {
    let (state, events) = build_state(config, store, identity);
    spawn_event_loop(&state, events);
    state
}

pub fn build_state(
    config: &Config,
    store: Arc<dyn KvStore>,
    identity: Arc<dyn IdentityLookup>,
) -> (Arc<AppState>, EngineEvents) {
    let hub = ProgressHub::new(config.subscriber_queue_capacity);
    let sessions = SessionService::new(store.clone(), identity.clone(), config.upload_token_ttl);
    let lifecycle = UploadLifecycleAdapter::new(
        store.clone(),
        identity,
        hub.clone(),
        config.upload_dir.clone(),
        config.upload_session_ttl,
    );
    let (engine, events) = event_channels(config.engine_event_buffer);

    let state = Arc::new(AppState {
        config: config.clone(),
        limiter: FixedWindowRateLimiter::new(store.clone()),
        store,
        sessions,
        hub,
        lifecycle,
        engine,
        shutdown: CancellationToken::new(),
    });

    (state, events)
}

pub fn spawn_event_loop(state: &AppState, events: EngineEvents) -> tokio::task::JoinHandle<()> {
    tokio::spawn(run_event_loop(
        state.lifecycle.clone(),
        events,
        state.shutdown.clone(),
    ))
}
