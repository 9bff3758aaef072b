use uplink_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize the application (store, registry, services, routes)
    let (state, router) = uplink_api::setup::initialize_app(config.clone()).await?;

    // Start the server
    uplink_api::setup::server::start_server(&config, router, state.shutdown.clone()).await?;

    Ok(())
}
