//! SimRelay - room-scoped live needs relay.

use simrelay::config::Config;
use tokio_util::sync::CancellationToken;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("simrelay=info,tower_http=info")
            }),
        )
        .init();

    let config = Config::from_env()?;

    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║              SimRelay - Live Needs Relay                   ║");
    println!("╚════════════════════════════════════════════════════════════╝");
    println!();
    println!("🌐 Server starting on port {}", config.port);
    println!("   Visit http://localhost:{} to start a new session", config.port);
    println!("   • GET  /               - New session and room");
    println!("   • GET  /:room          - Watch a room");
    println!("   • GET  /:room/connect  - Live event stream");
    println!("   • POST /:room/control  - Controller updates");
    println!();

    // Shutdown signal
    let shutdown = CancellationToken::new();
    let shutdown_ctrlc = shutdown.clone();
    ctrlc::set_handler(move || {
        println!("\n🛑 Shutdown signal received...");
        shutdown_ctrlc.cancel();
    })?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(simrelay::server::serve(config, shutdown))?;

    println!("\n👋 SimRelay has exited. Goodbye!");
    Ok(())
}
