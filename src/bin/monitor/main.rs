use std::{
    process::ExitCode,
    sync::{Arc, Mutex},
    time::Duration,
};

use clap::Parser;
use log::{error, info, warn};
use xvfdiag::{
    args::MonitorArgs, control::XvfHost, dispatcher::Dispatcher, gui::aec_dashboard,
    monitor::AecHistory,
};

fn main() -> ExitCode {
    env_logger::init();
    let args = MonitorArgs::parse();

    let config = match args.host.load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let interval = args
        .interval_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| config.refresh_interval());

    let dispatcher = Arc::new(Dispatcher::new(XvfHost::from_config(&config)));
    match dispatcher.read_named("VERSION") {
        Ok(inv) => {
            let version: Vec<String> = inv.values.iter().map(|v| v.to_string()).collect();
            info!("firmware version {}", version.join("."));
        }
        Err(e) => warn!("device not responding, monitoring anyway: {}", e),
    }

    let history = Arc::new(Mutex::new(AecHistory::new(config.history_len)));
    if let Err(e) = aec_dashboard(dispatcher, history, interval) {
        error!("{}", e);
        eprintln!("error: {}", e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
