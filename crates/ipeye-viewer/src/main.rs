use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use ipeye_viewer::{
    Result,
    config::{Args, Command, Config},
    context::Context,
    logging, menu,
};

#[tokio::main]
async fn main() -> Result<()> {
    let args: Args<Config> = Args::parse();
    let config = args.get_config()?;

    logging::init_logging(&config.logging);
    debug!(config = ?config, "Parsed config successfully");

    config
        .validate()
        .inspect_err(|err| error!(err = ?err, "Invalid configuration"))?;
    if args.validate {
        info!("Configuration is valid");
        return Ok(());
    }

    info!(
        "Starting {} v{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let context = Context::new(config)?;

    match args.command.unwrap_or(Command::Menu) {
        Command::Update => {
            let cancel = CancellationToken::new();
            cancel_on_interrupt(cancel.clone());
            context
                .catalog
                .update_with(&cancel)
                .await
                .inspect_err(|err| error!(err = ?err, "Failed to update cameras"))?;
        }
        Command::Serve => {
            let server = context.web_server().start().await?;
            cancel_on_interrupt(server.shutdown_token());
            server.wait().await?;
        }
        Command::Menu => menu::run(&context).await?,
    }

    info!("Exiting...");
    Ok(())
}

fn cancel_on_interrupt(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, shutting down");
            cancel.cancel();
        }
    });
}
