//! Periodic monitoring of the echo canceller and the beams.
//!
//! [`AutoRefresh`] owns one worker thread. Every tick it reads speech
//! energy, azimuths and convergence through the shared [`Dispatcher`] and
//! appends an [`AecSample`] to an [`AecHistory`]. Ticks run one after the
//! other on that single thread, so they can never overlap or pile up, and
//! the dispatcher keeps them from interleaving with anyone else's commands.

use crate::command_registry::lookup;
use crate::control::ControlChannel;
use crate::dispatcher::Dispatcher;
use crate::error::XvfError;
use crate::value::Value;

use log::{debug, info, warn};
use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        mpsc::{self, RecvTimeoutError},
        Arc, Mutex, PoisonError,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

/// Labels of the four values in every energy and azimuth reading.
pub const BEAMS: [&str; 4] = ["Beam 1", "Beam 2", "Free running", "Auto select"];

/// The reads that identify the connected device, in display order.
pub const DEVICE_INFO: [&str; 3] = ["VERSION", "DEVICE_SERIAL", "DEVICE_ID"];

/// Reads every [`DEVICE_INFO`] command. Each read succeeds or fails on its
/// own, so a device missing one of them still reports the rest.
pub fn device_info<C: ControlChannel>(
    dispatcher: &Dispatcher<C>,
) -> Vec<(&'static str, Result<Vec<Value>, XvfError>)> {
    DEVICE_INFO
        .iter()
        .map(|&name| (name, dispatcher.read_named(name).map(|inv| inv.values)))
        .collect()
}

/// One monitoring tick.
#[derive(Debug, Clone, PartialEq)]
pub struct AecSample {
    /// Time since monitoring started
    pub elapsed: Duration,
    /// Speech energy per beam, in [`BEAMS`] order
    pub energy: [f32; 4],
    /// Azimuth per beam in radians, in [`BEAMS`] order
    pub azimuth: [f32; 4],
    /// Whether the echo canceller reported convergence
    pub converged: bool,
}

/// The most recent samples, oldest first.
#[derive(Debug, Clone)]
pub struct AecHistory {
    samples: VecDeque<AecSample>,
    capacity: usize,
}

impl AecHistory {
    /// An empty history keeping at most `capacity` samples (at least one).
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Appends a sample, dropping the oldest once full.
    pub fn push(&mut self, sample: AecSample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// The newest sample.
    pub fn latest(&self) -> Option<&AecSample> {
        self.samples.back()
    }

    /// Samples from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &AecSample> {
        self.samples.iter()
    }

    /// Number of samples kept.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether no sample has been kept.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Forgets every sample.
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Fraction of the kept samples in which the canceller had converged.
    pub fn converged_ratio(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let converged = self.samples.iter().filter(|s| s.converged).count();
        Some(converged as f64 / self.samples.len() as f64)
    }
}

fn four(values: &[Value]) -> [f32; 4] {
    let mut out = [0.0; 4];
    for (slot, value) in out.iter_mut().zip(values) {
        *slot = value.as_f64() as f32;
    }
    out
}

/// Takes one reading of the three AEC monitoring commands.
pub fn poll_aec<C: ControlChannel>(
    dispatcher: &Dispatcher<C>,
    elapsed: Duration,
) -> Result<AecSample, XvfError> {
    let energy = dispatcher.read(lookup("AEC_SPENERGY_VALUES")?)?;
    let azimuth = dispatcher.read(lookup("AEC_AZIMUTH_VALUES")?)?;
    let converged = dispatcher.read(lookup("AEC_AECCONVERGED")?)?;

    Ok(AecSample {
        elapsed,
        energy: four(&energy.values),
        azimuth: four(&azimuth.values),
        converged: converged.values.first() == Some(&Value::UInt8(1)),
    })
}

enum Signal {
    Interval(Duration),
    Stop,
}

/// Handle to the auto-refresh worker. Dropping it stops the worker.
#[derive(Debug, Default)]
pub struct AutoRefresh {
    handle: Option<JoinHandle<()>>,
    tx: Option<mpsc::Sender<Signal>>,
    ticks: Arc<AtomicUsize>,
    failures: Arc<AtomicUsize>,
}

impl AutoRefresh {
    /// A handle with no worker running.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts ticking every `interval`, the first tick immediately. Returns
    /// `false` and does nothing if the worker is already running.
    pub fn start<C>(
        &mut self,
        dispatcher: Arc<Dispatcher<C>>,
        history: Arc<Mutex<AecHistory>>,
        interval: Duration,
    ) -> bool
    where
        C: ControlChannel + Send + 'static,
    {
        if self.is_running() {
            debug!("auto-refresh already running");
            return false;
        }

        let (tx, rx) = mpsc::channel::<Signal>();
        let ticks = Arc::clone(&self.ticks);
        let failures = Arc::clone(&self.failures);

        let handle = thread::spawn(move || {
            let origin = Instant::now();
            let mut interval = interval;
            loop {
                match poll_aec(&dispatcher, origin.elapsed()) {
                    Ok(sample) => history
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push(sample),
                    Err(error) => {
                        warn!("auto-refresh tick failed: {}", error);
                        failures.fetch_add(1, Ordering::SeqCst);
                    }
                }
                ticks.fetch_add(1, Ordering::SeqCst);

                // Waiting on the channel doubles as the sleep between ticks,
                // so a stop request is seen without waiting out the interval.
                match rx.recv_timeout(interval) {
                    Ok(Signal::Interval(new_interval)) => interval = new_interval,
                    Ok(Signal::Stop) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {}
                }
            }
            info!("auto-refresh stopped");
        });

        info!("auto-refresh started every {:?}", interval);
        self.tx = Some(tx);
        self.handle = Some(handle);
        true
    }

    /// Whether the worker thread is alive.
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Changes the period; takes effect after the current wait.
    pub fn set_interval(&self, interval: Duration) {
        if let Some(tx) = &self.tx {
            if tx.send(Signal::Interval(interval)).is_err() {
                debug!("auto-refresh worker already gone");
            }
        }
    }

    /// Stops the worker and waits for an in-progress tick to finish.
    pub fn stop(&mut self) {
        if let Some(tx) = self.tx.take() {
            // The worker may already have exited, which is fine.
            let _ = tx.send(Signal::Stop);
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("auto-refresh worker panicked");
            }
        }
    }

    /// Ticks completed so far, successful or not.
    pub fn ticks(&self) -> usize {
        self.ticks.load(Ordering::SeqCst)
    }

    /// Ticks that failed.
    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }
}

impl Drop for AutoRefresh {
    fn drop(&mut self) {
        self.stop();
    }
}
