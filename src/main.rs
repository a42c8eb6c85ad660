//! vls - language server for V
//!
//! Speaks LSP over stdin/stdout. Diagnostics go to stderr so they never
//! corrupt the protocol stream.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vls::app::App;
use vls::cli::Cli;

fn main() {
    // Quiet by default; RUST_LOG=vls=debug for verbose output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vls=warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .init();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("vls: failed to create runtime: {}", e);
            std::process::exit(2);
        }
    };

    match runtime.block_on(async_main()) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("vls: {:#}", e);
            std::process::exit(2);
        }
    }
}

async fn async_main() -> anyhow::Result<i32> {
    let cli = Cli::parse();

    let app = App::new(&cli)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to initialize: {}", e))?;

    app.run().await
}
