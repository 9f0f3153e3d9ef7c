//! Errors raised while looking up, validating, sending or decoding commands.

use crate::command_registry::Access;
use crate::value::ParamType;
use std::{borrow::Cow, fmt, io, time::Duration};

/// Why the external control process did not produce a usable answer.
#[derive(Debug)]
pub enum ProcessFailure {
    /// No control executable was configured or found on disk.
    ExecutableNotFound,
    /// The executable exists but could not be started.
    Spawn(io::Error),
    /// The process did not finish in time and was killed.
    Timeout(Duration),
    /// The process finished with a non-zero exit status.
    Exit {
        /// Exit code, `None` if the process was killed by a signal
        code: Option<i32>,
        /// Whatever the process wrote to stderr
        stderr: String,
    },
}

impl fmt::Display for ProcessFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ProcessFailure as PF;
        let msg = match self {
            PF::ExecutableNotFound => Cow::from("control executable not found"),
            PF::Spawn(error) => Cow::from(format!("failed to start: {}", error)),
            PF::Timeout(after) => Cow::from(format!("timed out after {:?}", after)),
            PF::Exit { code: Some(code), stderr } => {
                Cow::from(format!("exited with status {}: {}", code, stderr.trim()))
            }
            PF::Exit { code: None, stderr } => {
                Cow::from(format!("terminated by signal: {}", stderr.trim()))
            }
        };
        write!(f, "{}", msg)
    }
}

impl From<io::Error> for ProcessFailure {
    fn from(value: io::Error) -> Self {
        match value.kind() {
            io::ErrorKind::NotFound => Self::ExecutableNotFound,
            _ => Self::Spawn(value),
        }
    }
}

/// The argument list handed to `write` broke a constraint of the command.
#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
    /// The number of values does not match the command's parameter count.
    ArgumentCount {
        /// The command's parameter count
        expected: usize,
        /// Number of values supplied
        got: usize,
    },
    /// A value lies outside its declared range.
    OutOfRange {
        /// Zero-based parameter position
        index: usize,
        /// The offending value
        value: f64,
        /// Lower bound, inclusive
        min: f64,
        /// Upper bound, inclusive
        max: f64,
    },
    /// A value cannot be expressed in the command's parameter type.
    NotRepresentable {
        /// Zero-based parameter position
        index: usize,
        /// The offending value
        value: f64,
        /// Type the command expects
        param_type: ParamType,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Violation::ArgumentCount { expected, got } => {
                write!(f, "expected {} value(s), got {}", expected, got)
            }
            Violation::OutOfRange {
                index,
                value,
                min,
                max,
            } => write!(
                f,
                "parameter {} = {} is outside [{}, {}]",
                index, value, min, max
            ),
            Violation::NotRepresentable {
                index,
                value,
                param_type,
            } => write!(f, "parameter {} = {} is not a valid {}", index, value, param_type),
        }
    }
}

/// Everything that can go wrong between naming a command and holding its
/// decoded answer.
#[derive(Debug)]
pub enum XvfError {
    /// No command with this name is registered.
    NotFound {
        /// The name that was looked up
        name: String,
    },
    /// A read of a write-only command, or a write of a read-only one.
    AccessViolation {
        /// The command that was refused
        command: &'static str,
        /// What the command allows
        access: Access,
        /// `"read"` or `"write"`
        attempted: &'static str,
    },
    /// Client-side validation rejected a write before anything was sent.
    Validation {
        /// The command being written
        command: &'static str,
        /// The first constraint that failed
        violation: Violation,
    },
    /// The process answered, but not in the shape the command declares.
    Parse {
        /// The command that was read
        command: &'static str,
        /// What did not match
        reason: String,
    },
    /// The external process failed.
    Process {
        /// The command that was running
        command: &'static str,
        /// How the process failed
        failure: ProcessFailure,
    },
}

impl fmt::Display for XvfError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use XvfError as XE;
        let msg = match self {
            XE::NotFound { name } => Cow::from(format!("unknown command {}", name)),
            XE::AccessViolation {
                command,
                access,
                attempted,
            } => Cow::from(format!(
                "{}: cannot {} a command with access {}",
                command, attempted, access
            )),
            XE::Validation { command, violation } => {
                Cow::from(format!("{}: invalid arguments: {}", command, violation))
            }
            XE::Parse { command, reason } => {
                Cow::from(format!("{}: unexpected response: {}", command, reason))
            }
            XE::Process { command, failure } => Cow::from(format!("{}: {}", command, failure)),
        };

        write!(f, "{}", msg)
    }
}

impl std::error::Error for XvfError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            XvfError::Process {
                failure: ProcessFailure::Spawn(error),
                ..
            } => Some(error),
            _ => None,
        }
    }
}
