use std::process;

use speedtest_mqtt::{
    config::Config, core::session, error::RunError, logger::LoggerManager, print_error,
};
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() {
    let cfg = Config::from_env().unwrap_or_else(|e| {
        print_error!("{}", e);
        process::exit(RunError::from(e).exit_code());
    });

    let mut logger_manager = LoggerManager::new(cfg.logger.clone()).unwrap_or_else(|e| {
        print_error!("Failed to setup Log Manager: {}", e);
        process::exit(RunError::from(e).exit_code());
    });
    logger_manager.init().unwrap_or_else(|e| {
        print_error!("Failed to init Log Manager: {}", e);
        process::exit(RunError::from(e).exit_code());
    });

    info!(
        "Starting speedtest-mqtt version {}...",
        env!("CARGO_PKG_VERSION")
    );
    debug!("{:#?}", cfg.transport);
    info!("Log level: {}", cfg.logger.level);

    let interrupt = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => warn!("Received Ctrl+C, aborting run"),
            Err(e) => {
                warn!("Ctrl+C handler unavailable: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    match session::run(&cfg, interrupt).await {
        Ok(result) => info!(
            "Run complete: {:.2} ms, {:.2} Mbps down, {:.2} Mbps up",
            result.latency, result.dl_speed, result.ul_speed
        ),
        Err(e) => {
            error!(
                kind = e.kind(),
                phase = e.phase(),
                exit_code = e.exit_code(),
                "{}",
                e
            );
            process::exit(e.exit_code());
        }
    }
}
