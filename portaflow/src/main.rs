use clap::Parser;
use portaflow::config::Args;
use portaflow::telemetry::init_telemetry;
use portaflow::{Application, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install the default crypto provider before anything touches TLS.
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let args = Args::parse();
    let config = Config::load(&args)?;

    if args.validate {
        println!("Configuration is valid.");
        return Ok(());
    }

    init_telemetry()?;

    let app = Application::new(config).await?;
    app.serve(shutdown_signal()).await
}

/// Resolves on ctrl-c or SIGTERM so in-flight requests can drain.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install ctrl-c handler");
    };

    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
