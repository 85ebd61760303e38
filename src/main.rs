use service_repository::config::Config;
use service_repository::services::connection::ChannelHandleFactory;
use service_repository::services::{ServiceHandle, ServiceRegistry, UserHandle};
use tracing_subscriber::EnvFilter;

#[global_allocator]
static GLOBAL: jemallocator::Jemalloc = jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    // RUST_LOG 优先于配置文件中的过滤器
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.filter))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!(
        services = config.services.len(),
        policy = ?config.registry.construction_policy,
        "Starting service repository"
    );

    let factory = ChannelHandleFactory::from_config(&config);
    let registry = ServiceRegistry::new(factory, config.registry.clone());

    for service in &config.services {
        let component = service.component();
        match registry.acquire(&component, UserHandle::SYSTEM) {
            Ok(handle) => tracing::info!(
                service = %handle.key(),
                handle_id = %handle.id(),
                address = %handle.address(),
                "Acquired service handle"
            ),
            Err(err) => tracing::error!(
                component = %component,
                error = %err,
                "Failed to acquire service handle"
            ),
        }
    }

    let mut dump = String::new();
    registry.dump(&mut dump)?;
    tracing::info!("\n{dump}");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received, unbinding cached services");

    for handle in registry.cached_handles() {
        handle.unbind();
    }
    registry.factory().shutdown().await;

    tracing::info!(stats = ?registry.stats(), "Service repository stopped");
    Ok(())
}
