//! Validates, sends and decodes commands.
//!
//! The [`Dispatcher`] is the only thing that talks to a [`ControlChannel`].
//! It holds the channel behind a mutex for the whole of each invocation, so
//! there is never more than one command in flight no matter how many
//! threads share it.

use crate::command_registry::{lookup, CommandSpec};
use crate::control::ControlChannel;
use crate::error::{Violation, XvfError};
use crate::response;
use crate::value::Value;

use log::{debug, warn};
use std::sync::{Mutex, PoisonError};

/// One completed command.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandInvocation {
    /// The command that was sent
    pub spec: &'static CommandSpec,
    /// Argument tokens passed after the command name; empty for reads
    pub arguments: Vec<String>,
    /// Everything the control process printed
    pub raw_output: String,
    /// Decoded answer; empty for writes
    pub values: Vec<Value>,
}

/// Checks `values` against `spec` and converts them to typed values.
/// Nothing is sent; this is the whole of write validation.
pub fn validate(spec: &'static CommandSpec, values: &[f64]) -> Result<Vec<Value>, XvfError> {
    let invalid = |violation| XvfError::Validation {
        command: spec.name,
        violation,
    };

    if values.len() != spec.param_count {
        return Err(invalid(Violation::ArgumentCount {
            expected: spec.param_count,
            got: values.len(),
        }));
    }

    values
        .iter()
        .enumerate()
        .map(|(index, &value)| {
            if let Some((min, max)) = spec.range_of(index) {
                if !(value >= min && value <= max) {
                    return Err(invalid(Violation::OutOfRange {
                        index,
                        value,
                        min,
                        max,
                    }));
                }
            }
            Value::coerce(spec.param_type, value).ok_or_else(|| {
                invalid(Violation::NotRepresentable {
                    index,
                    value,
                    param_type: spec.param_type,
                })
            })
        })
        .collect()
}

/// Sends commands over a [`ControlChannel`], one at a time.
pub struct Dispatcher<C: ControlChannel> {
    channel: Mutex<C>,
}

impl<C: ControlChannel> Dispatcher<C> {
    /// Takes ownership of `channel`; nothing else may talk to it afterwards.
    pub fn new(channel: C) -> Self {
        Self {
            channel: Mutex::new(channel),
        }
    }

    fn invoke(&self, spec: &'static CommandSpec, arguments: &[String]) -> Result<String, XvfError> {
        // A panic in another caller leaves the channel itself intact.
        let mut channel = self.channel.lock().unwrap_or_else(PoisonError::into_inner);
        channel.invoke(spec.name, arguments).map_err(|failure| {
            warn!("{} failed: {}", spec.name, failure);
            XvfError::Process {
                command: spec.name,
                failure,
            }
        })
    }

    /// Reads the current value(s) of `spec` from the device.
    pub fn read(&self, spec: &'static CommandSpec) -> Result<CommandInvocation, XvfError> {
        if !spec.access.readable() {
            return Err(XvfError::AccessViolation {
                command: spec.name,
                access: spec.access,
                attempted: "read",
            });
        }

        let raw_output = self.invoke(spec, &[])?;
        let values = response::decode(spec, &raw_output)?;
        debug!("{} = {:?}", spec.name, values);

        Ok(CommandInvocation {
            spec,
            arguments: Vec::new(),
            raw_output,
            values,
        })
    }

    /// Writes `values` to `spec`. Every value is validated before the
    /// control process is started, so a rejected write sends nothing.
    pub fn write(
        &self,
        spec: &'static CommandSpec,
        values: &[f64],
    ) -> Result<CommandInvocation, XvfError> {
        if !spec.access.writable() {
            return Err(XvfError::AccessViolation {
                command: spec.name,
                access: spec.access,
                attempted: "write",
            });
        }

        let arguments: Vec<String> = validate(spec, values)?
            .iter()
            .map(Value::to_string)
            .collect();
        let raw_output = self.invoke(spec, &arguments)?;
        debug!("{} <- {}", spec.name, arguments.join(" "));

        Ok(CommandInvocation {
            spec,
            arguments,
            raw_output,
            values: Vec::new(),
        })
    }

    /// [`read`](Self::read) by command name.
    pub fn read_named(&self, name: &str) -> Result<CommandInvocation, XvfError> {
        self.read(lookup(name)?)
    }

    /// [`write`](Self::write) by command name.
    pub fn write_named(&self, name: &str, values: &[f64]) -> Result<CommandInvocation, XvfError> {
        self.write(lookup(name)?, values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::scripted::ScriptedChannel;
    use crate::error::ProcessFailure;

    #[test]
    fn read_of_write_only_never_invokes() {
        let channel = ScriptedChannel::new();
        let calls = channel.calls.clone();
        let dispatcher = Dispatcher::new(channel);

        let res = dispatcher.read_named("GPO_WRITE_VALUE");
        assert!(matches!(
            res,
            Err(XvfError::AccessViolation { attempted: "read", .. })
        ));
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn write_of_read_only_never_invokes() {
        let channel = ScriptedChannel::new();
        let calls = channel.calls.clone();
        let dispatcher = Dispatcher::new(channel);

        let res = dispatcher.write_named("VERSION", &[1.0, 2.0, 3.0]);
        assert!(matches!(
            res,
            Err(XvfError::AccessViolation { attempted: "write", .. })
        ));
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn out_of_range_gain_is_rejected_before_sending() {
        let channel = ScriptedChannel::new();
        let calls = channel.calls.clone();
        let dispatcher = Dispatcher::new(channel);

        let res = dispatcher.write_named("AUDIO_MGR_MIC_GAIN", &[256.0]);
        match res {
            Err(XvfError::Validation {
                command,
                violation: Violation::OutOfRange { index, max, .. },
            }) => {
                assert_eq!(command, "AUDIO_MGR_MIC_GAIN");
                assert_eq!(index, 0);
                assert_eq!(max, 255.0);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn valid_gain_sends_one_token() {
        let channel = ScriptedChannel::new();
        let calls = channel.calls.clone();
        let dispatcher = Dispatcher::new(channel);

        let inv = dispatcher.write_named("AUDIO_MGR_MIC_GAIN", &[120.0]).unwrap();
        assert_eq!(inv.arguments, vec!["120".to_owned()]);
        assert_eq!(
            *calls.lock().unwrap(),
            vec![("AUDIO_MGR_MIC_GAIN".to_owned(), vec!["120".to_owned()])]
        );
    }

    #[test]
    fn argument_count_and_type_are_checked() {
        let dispatcher = Dispatcher::new(ScriptedChannel::new());

        assert!(matches!(
            dispatcher.write_named("GPO_WRITE_VALUE", &[30.0]),
            Err(XvfError::Validation {
                violation: Violation::ArgumentCount { expected: 2, got: 1 },
                ..
            })
        ));
        assert!(matches!(
            dispatcher.write_named("LED_BRIGHTNESS", &[12.5]),
            Err(XvfError::Validation {
                violation: Violation::NotRepresentable { index: 0, .. },
                ..
            })
        ));
        assert!(matches!(
            dispatcher.write_named("GPO_WRITE_VALUE", &[30.0, 2.0]),
            Err(XvfError::Validation {
                violation: Violation::OutOfRange { index: 1, .. },
                ..
            })
        ));
        assert!(matches!(
            dispatcher.write_named("AUDIO_MGR_REF_GAIN", &[f64::NAN]),
            Err(XvfError::Validation { .. })
        ));
    }

    #[test]
    fn read_decodes_energy() {
        let channel = ScriptedChannel::new().answer("AEC_SPENERGY_VALUES", "AEC_SPENERGY_VALUES 1 2 3 4\n");
        let calls = channel.calls.clone();
        let dispatcher = Dispatcher::new(channel);

        let inv = dispatcher.read_named("AEC_SPENERGY_VALUES").unwrap();
        assert_eq!(inv.values.len(), 4);
        assert_eq!(inv.values[0], Value::Float(1.0));
        assert_eq!(
            *calls.lock().unwrap(),
            vec![("AEC_SPENERGY_VALUES".to_owned(), Vec::<String>::new())]
        );
    }

    #[test]
    fn short_answer_is_a_parse_error() {
        let channel = ScriptedChannel::new().answer("AEC_SPENERGY_VALUES", "1 2 3");
        let dispatcher = Dispatcher::new(channel);

        assert!(matches!(
            dispatcher.read_named("AEC_SPENERGY_VALUES"),
            Err(XvfError::Parse { .. })
        ));
    }

    #[test]
    fn process_failures_carry_the_command() {
        let channel = ScriptedChannel::new().fail("LED_EFFECT", 1);
        let dispatcher = Dispatcher::new(channel);

        match dispatcher.write_named("LED_EFFECT", &[2.0]) {
            Err(XvfError::Process {
                command: "LED_EFFECT",
                failure: ProcessFailure::Exit { code: Some(1), .. },
            }) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unknown_command() {
        let dispatcher = Dispatcher::new(ScriptedChannel::new());
        assert!(matches!(
            dispatcher.read_named("NOT_A_COMMAND"),
            Err(XvfError::NotFound { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn end_to_end_through_a_real_process() {
        use crate::control::XvfHost;
        use std::{path::PathBuf, time::Duration};

        // `echo` answers every read with the command name followed by its
        // (empty) argument list, so only the parse step can fail.
        let host = XvfHost::new(Some(PathBuf::from("/bin/echo")), Duration::from_secs(2));
        let dispatcher = Dispatcher::new(host);

        let inv = dispatcher.write_named("AUDIO_MGR_SYS_DELAY", &[-32.0]).unwrap();
        assert_eq!(inv.raw_output.trim(), "AUDIO_MGR_SYS_DELAY -32");
        assert!(matches!(
            dispatcher.read_named("AUDIO_MGR_SYS_DELAY"),
            Err(XvfError::Parse { .. })
        ));
    }
}
