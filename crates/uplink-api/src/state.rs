//! Application state shared by every handler and middleware.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uplink_core::Config;
use uplink_store::KvStore;

use crate::engine::EngineEventSender;
use crate::services::{FixedWindowRateLimiter, ProgressHub, SessionService, UploadLifecycleAdapter};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn KvStore>,
    pub sessions: SessionService,
    pub hub: ProgressHub,
    pub limiter: FixedWindowRateLimiter,
    /// Hooks the upload engine calls before creating and finishing an upload.
    pub lifecycle: UploadLifecycleAdapter,
    /// Handed to the upload engine to report lifecycle events.
    pub engine: EngineEventSender,
    /// Cancelled at shutdown; stops the upload event loop.
    pub shutdown: CancellationToken,
}
