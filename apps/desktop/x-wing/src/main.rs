use x_wing::app::{AppPaths, RunningApp, load_config};
use x_wing::logger::initialize as LoggerInitialize;

use relay_core::config::RelayConfig;

use std::process::ExitCode;

use log::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    // Before anything reads RABBITMQ_URI
    let env_file = RelayConfig::load_env_file();

    let paths = match AppPaths::resolve() {
        Ok(paths) => paths,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    // Initialize logger FIRST
    if let Err(e) = LoggerInitialize(&paths.log_dir) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    info!("X-Wing overlay starting");
    info!("Config directory: {}", paths.config_dir.display());
    info!("Log directory: {}", paths.log_dir.display());
    if let Some(env_file) = env_file {
        info!("Environment file: {}", env_file.display());
    }

    let config = match load_config(&paths.config_dir) {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let mut app = match RunningApp::start(&config, &paths.config_dir).await {
        Ok(app) => app,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let reason = app.wait_for_exit().await;
    info!("Shutting down: {reason:?}");
    app.shutdown().await;

    ExitCode::SUCCESS
}
