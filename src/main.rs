use tcp_jsonrpc::{config::Config, logging, methods, RpcServer};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging();

    let config = Config::from_env()?;
    let mut server = RpcServer::new(config);
    methods::register_builtin_methods(&mut server)?;

    let local_addr = server.start().await?;
    info!(local_addr = %local_addr, "server accepting connections");

    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown signal received");
                shutdown.shutdown();
            }
            Err(err) => warn!(error = %err, "failed to listen for shutdown signal"),
        }
    });

    server.run().await?;
    Ok(())
}
