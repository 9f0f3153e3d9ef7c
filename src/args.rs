//! Commandline argument parser using clap for xvfdiag

use crate::config::{ConfigError, DiagConfig};
use crate::response::parse_number;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Arguments of the `xvfdiag` binary.
#[derive(Debug, Parser, Clone)]
#[clap(version, about)]
pub struct DiagArgs {
    #[command(subcommand, long_about)]
    /// Which task to perform against the device
    pub command: CommandTask,

    /// Where to find the device and how long to wait for it
    #[command(flatten)]
    pub host: HostArgs,
}

/// Options shared by every binary that talks to the device.
#[derive(Debug, Args, Clone, Default)]
pub struct HostArgs {
    /// Path of the xvf_host executable, overriding the config file
    #[arg(long = "host", global = true)]
    pub host_path: Option<PathBuf>,

    /// Longest a single invocation may take, in milliseconds
    #[arg(long = "timeout-ms", global = true)]
    pub timeout_ms: Option<u64>,

    /// Configuration file; defaults to xvfdiag.ron when present
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,
}

impl HostArgs {
    /// Loads the configuration and applies the commandline overrides on top.
    pub fn load_config(&self) -> Result<DiagConfig, ConfigError> {
        let mut config = DiagConfig::load(self.config.as_deref())?;
        if let Some(path) = &self.host_path {
            config.host_path = Some(path.clone());
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.timeout_ms = timeout_ms;
        }
        Ok(config)
    }
}

/// The `xvfdiag` subcommands.
#[derive(Debug, Subcommand, Clone)]
pub enum CommandTask {
    /// Print every known command with its access, type and range
    List,

    /// Read and decode the current value of a command
    Read {
        /// Command name, e.g. AUDIO_MGR_MIC_GAIN
        name: String,
    },

    /// Validate and write values to a command
    Write {
        /// Command name, e.g. AUDIO_MGR_MIC_GAIN
        name: String,

        /// One value per parameter; decimal, negative or 0x hex
        #[arg(required = true, allow_negative_numbers = true, value_parser = parse_value)]
        values: Vec<f64>,
    },

    /// Stage several parameters and apply them as one batch
    Apply {
        /// Assignments of the form NAME=V or NAME=V1,V2
        #[arg(required = true, value_parser = parse_assignment)]
        assignments: Vec<(String, Vec<f64>)>,
    },

    /// Apply the documented default of every read-write parameter
    Defaults,

    /// Persist the current parameters on the device
    Save,

    /// Erase the persisted parameters on the device
    Clear {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Read version, serial number, device ID and every read-only command
    Info,

    /// Statistics of a recorded WAV file
    Analyze(AnalyzeCommand),
}

/// Options of `xvfdiag analyze`.
#[derive(Debug, Args, Clone)]
pub struct AnalyzeCommand {
    /// WAV file to analyse
    pub file: PathBuf,

    /// Histogram bins, overriding the config file
    #[arg(short, long)]
    pub bins: Option<usize>,

    /// Channel to analyse
    #[arg(long, default_value_t = 0)]
    pub channel: usize,

    /// Samples per RMS envelope window, overriding the config file
    #[arg(short, long)]
    pub window: Option<usize>,
}

/// Arguments of the `monitor` binary.
#[derive(Debug, Parser, Clone)]
#[clap(version, about = "Live AEC energy and azimuth dashboard")]
pub struct MonitorArgs {
    /// Where to find the device and how long to wait for it
    #[command(flatten)]
    pub host: HostArgs,

    /// Refresh period in milliseconds, overriding the config file
    #[arg(short, long = "interval-ms")]
    pub interval_ms: Option<u64>,
}

fn parse_value(s: &str) -> Result<f64, String> {
    parse_number(s).ok_or_else(|| format!("`{}` is not a number", s))
}

fn parse_assignment(s: &str) -> Result<(String, Vec<f64>), String> {
    let (name, values) = s
        .split_once('=')
        .ok_or_else(|| format!("`{}` is not of the form NAME=VALUE", s))?;
    if name.is_empty() {
        return Err(format!("`{}` has no command name", s));
    }
    let values = values
        .split(',')
        .map(|v| parse_value(v.trim()))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((name.to_owned(), values))
}
