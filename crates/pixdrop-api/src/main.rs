use pixdrop_core::Config;

// Use mimalloc as the global allocator for better performance and lower fragmentation,
// especially when running on musl-based systems inside containers.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;

    let (state, router) = pixdrop_api::setup::initialize_app(config.clone()).await?;

    let sweeper = state.sweeper.clone().start();

    pixdrop_api::setup::server::start_server(&config, router).await?;

    if let Some(handle) = sweeper {
        handle.abort();
    }

    Ok(())
}
