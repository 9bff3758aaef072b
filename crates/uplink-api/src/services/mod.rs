pub mod broadcast;
pub mod lifecycle;
pub mod rate_limiter;
pub mod sessions;

pub use broadcast::{BroadcastReport, ProgressHub, Subscription};
pub use lifecycle::{
    relocate_artifact, run_event_loop, EventScheduler, EventStage, UploadLifecycleAdapter,
};
pub use rate_limiter::{FixedWindowRateLimiter, RateLimitPermit};
pub use sessions::SessionService;
