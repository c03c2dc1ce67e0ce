//! ranctl - xRAN network controller
//!
//! The controller binary:
//! - CLI argument parsing
//! - Configuration loading and validation
//! - Explicit dependency-order construction of the R-NIB, correlator,
//!   scheduler, dispatch engine, and southbound listener
//! - Graceful shutdown with reverse-order teardown
//!
//! # Usage
//!
//! ```bash
//! ranctl -c config/ranctl.yaml
//! ```

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};

use ranctl_common::{init_logging, CtrlConfig, LogLevel};
use ranctl_ctrl::{
    ControlApi, Controller, Correlator, ExpiryScheduler, FlagPolicy, SouthboundListener,
};
use ranctl_rnib::{CellIndex, Rnib, RnibStore, UeIndex};

/// ranctl - xRAN network controller
#[derive(Parser, Debug)]
#[command(name = "ranctl")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the controller configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config_file: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'v', long = "log-level", default_value = "info")]
    log_level: LogLevel,
}

/// The assembled controller process.
struct CtrlApp {
    controller: Arc<Controller>,
    listener: SouthboundListener,
    scheduler: Arc<ExpiryScheduler>,
}

impl CtrlApp {
    /// Builds every component in dependency order: store, indexes,
    /// correlator and scheduler, policy, controller, listener.
    fn new(config_path: &str) -> Result<Self> {
        info!("Loading configuration from: {}", config_path);
        let config = CtrlConfig::load(config_path)
            .with_context(|| format!("Failed to load configuration from {config_path}"))?;
        info!(
            "Configuration loaded: {}:{}, {} authorized cell(s)",
            config.bind_address,
            config.bind_port,
            config.cells.len()
        );

        let store = Arc::new(RnibStore::new());
        let cell_index = Arc::new(CellIndex::new());
        let ue_index = Arc::new(UeIndex::new());
        let rnib = Rnib::new(store, cell_index, ue_index);

        let correlator = Arc::new(Correlator::new(Duration::from_millis(
            config.timers.request_timeout_ms,
        )));
        let scheduler = Arc::new(ExpiryScheduler::new());
        let policy = Arc::new(FlagPolicy::new(config.policy));

        let controller = Arc::new(Controller::new(
            rnib,
            Arc::clone(&correlator),
            Arc::clone(&scheduler),
            policy,
            config.timers,
        ));

        // The in-process control surface; an HTTP layer would be
        // mounted over this handle.
        let _api = ControlApi::new(Arc::clone(&controller));

        let listener = SouthboundListener::new(Arc::clone(&controller), Arc::new(config));

        Ok(Self {
            controller,
            listener,
            scheduler,
        })
    }

    /// Serves until Ctrl+C or a listener failure.
    async fn run(&self) -> Result<()> {
        tokio::select! {
            result = self.listener.run() => {
                result.context("southbound listener failed")?;
            }
            _ = signal::ctrl_c() => {
                info!("Received Ctrl+C, initiating shutdown...");
            }
        }
        Ok(())
    }

    /// Reverse-order teardown: sessions/cells first, then timers.
    fn shutdown(self) {
        for cell in self.controller.rnib().store().cells() {
            self.controller.remove_cell(cell.ecgi);
        }
        self.scheduler.shutdown();
        info!("Controller shut down");
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.log_level);

    println!("ranctl - xRAN network controller");
    println!("================================");

    match run_ctrl(args).await {
        Ok(()) => {
            info!("Controller exited successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Controller failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_ctrl(args: Args) -> Result<()> {
    let app = CtrlApp::new(&args.config_file)?;
    app.run().await?;
    app.shutdown();
    Ok(())
}
