use clap::Parser;
use leurre::configuration::config::{Cli, Config};
use leurre::controller::Controller;
use log::{error, info};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // https://docs.rs/env_logger/latest/env_logger/
    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .format_target(false)
        .init();

    println!(
        "
██╗     ███████╗██╗   ██╗██████╗ ██████╗ ███████╗
██║     ██╔════╝██║   ██║██╔══██╗██╔══██╗██╔════╝
██║     █████╗  ██║   ██║██████╔╝██████╔╝█████╗  
██║     ██╔══╝  ██║   ██║██╔══██╗██╔══██╗██╔══╝  
███████╗███████╗╚██████╔╝██║  ██║██║  ██║███████╗
╚══════╝╚══════╝ ╚═════╝ ╚═╝  ╚═╝╚═╝  ╚═╝╚══════╝
=================================================
  Low-interaction SSH/HTTP deception service v{}
=================================================
",
        env!("CARGO_PKG_VERSION")
    );

    info!("Importing configuration from {}", cli.config_file.display());
    let mut config = match Config::from_file(&cli.config_file) {
        Ok(config) => config,
        Err(e) => {
            error!("Unable to import configuration from file: {}", e);
            std::process::exit(1);
        }
    };
    cli.apply(&mut config);
    info!("Configuration imported successfully");

    let controller = match Controller::new(config) {
        Ok(controller) => controller,
        Err(e) => {
            error!("Unable to create a controller instance: {}, exiting...", e);
            std::process::exit(1);
        }
    };

    let result = tokio::spawn(async move {
        info!("Spawning the controller");
        controller.run().await
    });

    match result.await {
        Ok(Ok(())) => info!("Bye"),
        Ok(Err(e)) => {
            error!("Error occured in the controller process: {}, exiting...", e);
            std::process::exit(1);
        }
        Err(e) => {
            error!("Error joining at the end of execution: {}", e);
            std::process::exit(1);
        }
    }
}
