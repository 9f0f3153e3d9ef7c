//! Command-line front end: read, write, batch-apply and persist XVF3800
//! parameters, and analyse recordings.

use clap::Parser;
use xvfdiag::{
    analysis::{self, load_wav},
    args::{AnalyzeCommand, CommandTask, DiagArgs},
    command_registry::{commands, Access},
    config::DiagConfig,
    control::XvfHost,
    dispatcher::{CommandInvocation, Dispatcher},
    monitor::{device_info, DEVICE_INFO},
    session::{Outcome, ParameterSession},
};

use log::{error, info, warn};
use std::{error::Error, io, process::ExitCode};

// Example:
// cargo run --bin xvfdiag -- read AUDIO_MGR_MIC_GAIN
// cargo run --bin xvfdiag -- apply PP_AGCGAIN=2.5 LED_EFFECT=1
// cargo run --bin xvfdiag -- analyze take.wav --channel 1

type Res = Result<bool, Box<dyn Error>>;

/// Only the start of a recording goes into the spectrum.
const SPECTRUM_SAMPLES: usize = 1 << 16;

fn main() -> ExitCode {
    env_logger::init();
    let args = DiagArgs::parse();

    let config = match args.host.load_config() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(args.command, &config) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn dispatcher(config: &DiagConfig) -> Dispatcher<XvfHost> {
    let host = XvfHost::from_config(config);
    match host.path() {
        Some(path) => info!("using {}", path.display()),
        None => warn!("xvf_host was not found; pass --host or set host_path"),
    }
    Dispatcher::new(host)
}

fn print_values(inv: &CommandInvocation) {
    let values: Vec<String> = inv.values.iter().map(|v| v.to_string()).collect();
    println!("{} {}", inv.spec.name, values.join(" "));
}

fn print_outcomes(outcomes: &[(String, Outcome)]) -> bool {
    let mut all_ok = true;
    for (name, outcome) in outcomes {
        match outcome {
            Ok(inv) => println!("ok     {} {}", name, inv.arguments.join(" ")),
            Err(e) => {
                all_ok = false;
                println!("failed {}", e);
            }
        }
    }
    all_ok
}

fn confirm(prompt: &str) -> io::Result<bool> {
    println!("{} [y/N]", prompt);
    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn run(command: CommandTask, config: &DiagConfig) -> Res {
    match command {
        CommandTask::List => {
            for spec in commands() {
                println!("{}", spec);
            }
            Ok(true)
        }

        CommandTask::Read { name } => {
            let inv = dispatcher(config).read_named(&name)?;
            print_values(&inv);
            Ok(true)
        }

        CommandTask::Write { name, values } => {
            let inv = dispatcher(config).write_named(&name, &values)?;
            println!("{} <- {}", inv.spec.name, inv.arguments.join(" "));
            Ok(true)
        }

        CommandTask::Apply { assignments } => {
            let mut session = ParameterSession::new();
            for (name, values) in assignments {
                session.stage(name, values);
            }
            let outcomes = session.apply_all(&dispatcher(config));
            Ok(print_outcomes(&outcomes))
        }

        CommandTask::Defaults => {
            let mut session = ParameterSession::new();
            session.stage_defaults();
            let outcomes = session.apply_all(&dispatcher(config));
            Ok(print_outcomes(&outcomes))
        }

        CommandTask::Save => {
            ParameterSession::new().save_configuration(&dispatcher(config))?;
            println!("configuration saved");
            Ok(true)
        }

        CommandTask::Clear { yes } => {
            if !yes && !confirm("Erase the configuration stored on the device?")? {
                println!("aborted");
                return Ok(false);
            }
            ParameterSession::new().clear_configuration(&dispatcher(config))?;
            println!("configuration cleared");
            Ok(true)
        }

        CommandTask::Info => {
            let dispatcher = dispatcher(config);
            let mut all_ok = true;
            for (name, values) in device_info(&dispatcher) {
                match values {
                    Ok(values) => {
                        let shown: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                        println!("{} {}", name, shown.join(" "));
                    }
                    Err(e) => {
                        all_ok = false;
                        println!("{} unavailable: {}", name, e);
                    }
                }
            }
            let readable = commands()
                .filter(|c| c.access == Access::ReadOnly && !DEVICE_INFO.contains(&c.name));
            for spec in readable {
                match dispatcher.read(spec) {
                    Ok(inv) => print_values(&inv),
                    Err(e) => {
                        all_ok = false;
                        println!("{} unavailable: {}", spec.name, e);
                    }
                }
            }
            Ok(all_ok)
        }

        CommandTask::Analyze(cmd) => analyze(cmd, config),
    }
}

fn analyze(cmd: AnalyzeCommand, config: &DiagConfig) -> Res {
    let recording = load_wav(&cmd.file)?;
    let samples = recording.channel(cmd.channel)?;
    println!(
        "{}: {} Hz, {} channel(s), {:.2} s; analysing channel {}",
        cmd.file.display(),
        recording.sample_rate,
        recording.channels,
        recording.duration_secs(),
        cmd.channel
    );

    let Some(stats) = analysis::stats(&samples) else {
        println!("no samples");
        return Ok(true);
    };
    println!(
        "mean {:.3}  std {:.3}  max|x| {:.3}  rms {:.3}",
        stats.mean, stats.std_dev, stats.max_abs, stats.rms
    );

    let bins = cmd.bins.unwrap_or(config.histogram_bins);
    if let Some(histogram) = analysis::histogram(&samples, bins) {
        let peak = histogram.counts.iter().copied().max().unwrap_or(1).max(1);
        for (edge, count) in histogram.edges().zip(&histogram.counts) {
            let bar = "#".repeat(count * 40 / peak);
            println!("{:>12.3} {:>8} {}", edge, count, bar);
        }
    }

    let window = cmd.window.unwrap_or(config.envelope_window);
    let envelope = analysis::rms_envelope(&samples, window);
    let loudest = envelope.iter().copied().fold(0.0f32, f32::max);
    println!(
        "rms envelope: {} windows of {} samples, loudest {:.3}",
        envelope.len(),
        window,
        loudest
    );

    let head = &samples[..samples.len().min(SPECTRUM_SAMPLES)];
    let spectrum = analysis::spectrum(head, recording.sample_rate);
    if let Some(freq) = analysis::dominant_frequency(&spectrum) {
        println!("dominant frequency {:.1} Hz", freq);
    }
    Ok(true)
}
