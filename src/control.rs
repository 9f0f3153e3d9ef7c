//! The boundary with the vendor's `xvf_host` control executable.
//!
//! Everything the device understands goes through [`ControlChannel`], so the
//! rest of the crate never needs to know whether it is talking to a real
//! process or to a stand-in.

use crate::config::DiagConfig;
use crate::error::ProcessFailure;

use log::{debug, info, warn};
use std::{
    env, io,
    io::Read,
    path::{Path, PathBuf},
    process::{Command, Stdio},
    sync::mpsc::{self, Receiver, RecvTimeoutError},
    thread,
    time::{Duration, Instant},
};

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Something that can run one named command against the device and hand
/// back what it printed.
pub trait ControlChannel {
    /// Runs `command` with `args` and returns its standard output.
    fn invoke(&mut self, command: &str, args: &[String]) -> Result<String, ProcessFailure>;
}

/// Runs the `xvf_host` executable once per command.
#[derive(Debug, Clone)]
pub struct XvfHost {
    path: Option<PathBuf>,
    timeout: Duration,
}

impl XvfHost {
    /// A host using the executable at `path`. A `None` path makes every
    /// invocation fail with [`ProcessFailure::ExecutableNotFound`].
    pub fn new(path: Option<PathBuf>, timeout: Duration) -> Self {
        Self { path, timeout }
    }

    /// Builds a host from the configuration, searching the usual install
    /// locations when no path is configured.
    pub fn from_config(config: &DiagConfig) -> Self {
        let path = locate(config.host_path.as_deref());
        Self::new(path, config.timeout())
    }

    /// The executable that will be run, if one was found.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

fn platform_dir() -> &'static str {
    match env::consts::OS {
        "windows" => "win32",
        "macos" => "mac_os",
        _ => "linux",
    }
}

fn executable_name() -> &'static str {
    if cfg!(windows) {
        "xvf_host.exe"
    } else {
        "xvf_host"
    }
}

/// The places `xvf_host` is looked for, in order, relative to `base`.
fn candidates(base: &Path) -> Vec<PathBuf> {
    let dir = base.join("host_control").join(platform_dir());
    vec![
        dir.join(executable_name()),
        dir.join("reSpeakerXVF").join(executable_name()),
    ]
}

/// Resolves the control executable. An explicit path is used as-is when it
/// exists; otherwise the vendor layout is searched next to the working
/// directory and next to this program.
pub fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            info!("using xvf_host at {}", path.display());
            return Some(path.to_path_buf());
        }
        warn!("configured xvf_host {} does not exist", path.display());
        return None;
    }

    let mut bases = vec![PathBuf::from(".")];
    if let Some(dir) = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        bases.push(dir);
    }

    let found = bases
        .iter()
        .flat_map(|base| candidates(base))
        .find(|p| p.exists());

    match &found {
        Some(path) => info!("found xvf_host at {}", path.display()),
        None => warn!("xvf_host not found under host_control/{}", platform_dir()),
    }
    found
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            if let Err(error) = pipe.read_to_end(&mut buf) {
                debug!("error reading child pipe: {}", error);
            }
        }
        // Nobody is listening any more if the invocation already timed out.
        let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
    });
    rx
}

/// Waits for a pipe reader until `deadline`. A pipe can outlive the child
/// when a grandchild inherited it, so the wait is bounded too.
fn collect(
    rx: &Receiver<String>,
    deadline: Instant,
    timeout: Duration,
) -> Result<String, ProcessFailure> {
    let left = deadline.saturating_duration_since(Instant::now());
    rx.recv_timeout(left).map_err(|error| match error {
        RecvTimeoutError::Timeout => ProcessFailure::Timeout(timeout),
        RecvTimeoutError::Disconnected => ProcessFailure::Spawn(io::Error::new(
            io::ErrorKind::Other,
            "pipe reader panicked",
        )),
    })
}

impl ControlChannel for XvfHost {
    fn invoke(&mut self, command: &str, args: &[String]) -> Result<String, ProcessFailure> {
        let path = self.path.as_ref().ok_or(ProcessFailure::ExecutableNotFound)?;
        debug!("running {} {} {}", path.display(), command, args.join(" "));

        let mut child = Command::new(path)
            .arg(command)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Drained on their own threads so a chatty child cannot block on a
        // full pipe while we wait for it.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            if let Some(status) = child.try_wait().map_err(ProcessFailure::Spawn)? {
                break status;
            }
            if Instant::now() >= deadline {
                warn!("{} timed out after {:?}, killing it", command, self.timeout);
                if let Err(error) = child.kill() {
                    debug!("kill failed: {}", error);
                }
                if let Err(error) = child.wait() {
                    debug!("reaping {} failed: {}", command, error);
                }
                return Err(ProcessFailure::Timeout(self.timeout));
            }
            thread::sleep(POLL_INTERVAL);
        };

        let out = collect(&stdout, deadline, self.timeout).map_err(|failure| {
            warn!("{} exited but its output stayed open past the deadline", command);
            failure
        })?;
        let err = collect(&stderr, deadline, self.timeout)?;

        if status.success() {
            debug!("{} answered {:?}", command, out.trim());
            Ok(out)
        } else {
            Err(ProcessFailure::Exit {
                code: status.code(),
                stderr: err,
            })
        }
    }
}

#[cfg(test)]
pub(crate) mod scripted {
    //! A [`ControlChannel`] that answers from a script and remembers every
    //! call, for tests that need to prove what was (or was not) sent.

    use super::*;
    use std::collections::HashMap;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    };

    pub type CallLog = Arc<Mutex<Vec<(String, Vec<String>)>>>;

    #[derive(Default)]
    pub struct ScriptedChannel {
        answers: HashMap<String, Result<String, i32>>,
        delay: Duration,
        pub calls: CallLog,
        pub in_flight: Arc<AtomicUsize>,
        pub max_in_flight: Arc<AtomicUsize>,
    }

    impl ScriptedChannel {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn answer(mut self, command: &str, output: &str) -> Self {
            self.answers.insert(command.to_owned(), Ok(output.to_owned()));
            self
        }

        pub fn fail(mut self, command: &str, code: i32) -> Self {
            self.answers.insert(command.to_owned(), Err(code));
            self
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    impl ControlChannel for ScriptedChannel {
        fn invoke(&mut self, command: &str, args: &[String]) -> Result<String, ProcessFailure> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.calls
                .lock()
                .unwrap()
                .push((command.to_owned(), args.to_vec()));
            thread::sleep(self.delay);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match self.answers.get(command) {
                Some(Ok(out)) => Ok(out.clone()),
                Some(Err(code)) => Err(ProcessFailure::Exit {
                    code: Some(*code),
                    stderr: "scripted failure".to_owned(),
                }),
                None => Ok(String::new()),
            }
        }
    }
}
