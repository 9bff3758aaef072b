use tracing_subscriber::{
    fmt::format::Format, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Initialize console tracing: compact lines by default, JSON lines when
/// `json` is set. `RUST_LOG` overrides the default filter.
pub fn init_telemetry(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let compact_fmt = (!json).then(|| {
        tracing_subscriber::fmt::layer().event_format(
            Format::default()
                .compact()
                .with_target(false)
                .without_time(),
        )
    });
    let json_fmt = json.then(|| tracing_subscriber::fmt::layer().json().flatten_event(true));

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "uplink=debug,tower_http=debug".into()),
        )
        .with(compact_fmt)
        .with(json_fmt)
        .try_init()?;

    tracing::info!(json = json, "Tracing initialized");
    Ok(())
}
