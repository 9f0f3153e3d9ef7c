//! Parameters staged by the operator and applied as one batch.
//!
//! Staging is cheap and never touches the device or the command table.
//! Validation happens when the batch is applied, one entry at a time, and a
//! bad entry only fails itself.

use crate::command_registry::{commands, lookup, Access};
use crate::control::ControlChannel;
use crate::dispatcher::{CommandInvocation, Dispatcher};
use crate::error::XvfError;

use log::{info, warn};
use std::collections::BTreeMap;

/// What happened to one staged entry.
pub type Outcome = Result<CommandInvocation, XvfError>;

/// Pending parameter values keyed by command name.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ParameterSession {
    staged: BTreeMap<String, Vec<f64>>,
}

impl ParameterSession {
    /// An empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `values` for `name`, replacing anything staged for it before.
    pub fn stage(&mut self, name: impl Into<String>, values: Vec<f64>) {
        self.staged.insert(name.into(), values);
    }

    /// Stages the documented default of every read-write parameter.
    pub fn stage_defaults(&mut self) {
        for spec in commands().filter(|c| c.access == Access::ReadWrite) {
            if let Some(default) = spec.default {
                self.stage(spec.name, default.to_vec());
            }
        }
    }

    /// Writes every staged entry. Each entry succeeds or fails on its own;
    /// the ones that succeeded are removed from the session, the failures
    /// stay staged so they can be corrected and applied again.
    pub fn apply_all<C: ControlChannel>(&mut self, dispatcher: &Dispatcher<C>) -> Vec<(String, Outcome)> {
        let staged = std::mem::take(&mut self.staged);
        let mut outcomes = Vec::with_capacity(staged.len());

        for (name, values) in staged {
            let outcome = dispatcher.write_named(&name, &values);
            match &outcome {
                Ok(_) => info!("applied {} = {:?}", name, values),
                Err(error) => {
                    warn!("failed to apply {}: {}", name, error);
                    self.staged.insert(name.clone(), values);
                }
            }
            outcomes.push((name, outcome));
        }

        outcomes
    }

    /// Forgets everything staged. The device is not touched.
    pub fn clear(&mut self) {
        self.staged.clear();
    }

    /// Asks the device to persist its current parameters.
    pub fn save_configuration<C: ControlChannel>(&self, dispatcher: &Dispatcher<C>) -> Outcome {
        dispatcher.write(lookup("SAVE_CONFIGURATION")?, &[1.0])
    }

    /// Asks the device to erase its persisted parameters.
    pub fn clear_configuration<C: ControlChannel>(&self, dispatcher: &Dispatcher<C>) -> Outcome {
        dispatcher.write(lookup("CLEAR_CONFIGURATION")?, &[1.0])
    }

    /// The staged entries in apply order.
    pub fn staged(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.staged.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Number of staged entries.
    pub fn len(&self) -> usize {
        self.staged.len()
    }

    /// Whether nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::scripted::ScriptedChannel;
    use crate::error::Violation;

    #[test]
    fn stage_overwrites() {
        let mut session = ParameterSession::new();
        session.stage("PP_AGCGAIN", vec![1.0]);
        session.stage("PP_AGCGAIN", vec![3.0]);
        assert_eq!(session.len(), 1);
        assert_eq!(session.staged().next(), Some(("PP_AGCGAIN", &[3.0][..])));
    }

    #[test]
    fn one_bad_entry_does_not_block_the_rest() {
        let channel = ScriptedChannel::new();
        let calls = channel.calls.clone();
        let dispatcher = Dispatcher::new(channel);

        let mut session = ParameterSession::new();
        session.stage("AUDIO_MGR_MIC_GAIN", vec![120.0]);
        session.stage("AUDIO_MGR_REF_GAIN", vec![99.0]);

        let outcomes = session.apply_all(&dispatcher);
        assert_eq!(outcomes.len(), 2);

        let gain = outcomes.iter().find(|(n, _)| n == "AUDIO_MGR_MIC_GAIN").unwrap();
        assert!(gain.1.is_ok());
        let ref_gain = outcomes.iter().find(|(n, _)| n == "AUDIO_MGR_REF_GAIN").unwrap();
        assert!(matches!(
            ref_gain.1,
            Err(XvfError::Validation {
                violation: Violation::OutOfRange { .. },
                ..
            })
        ));

        // Only the valid entry reached the process, and only the failure
        // is still staged.
        assert_eq!(calls.lock().unwrap().len(), 1);
        assert_eq!(session.len(), 1);
        assert_eq!(session.staged().next().map(|(n, _)| n), Some("AUDIO_MGR_REF_GAIN"));
    }

    #[test]
    fn process_failures_are_isolated_too() {
        let channel = ScriptedChannel::new().fail("LED_EFFECT", 2);
        let dispatcher = Dispatcher::new(channel);

        let mut session = ParameterSession::new();
        session.stage("LED_EFFECT", vec![1.0]);
        session.stage("LED_SPEED", vec![5.0]);
        session.stage("NOT_A_COMMAND", vec![0.0]);

        let outcomes = session.apply_all(&dispatcher);
        let ok: Vec<&str> = outcomes
            .iter()
            .filter(|(_, o)| o.is_ok())
            .map(|(n, _)| n.as_str())
            .collect();
        assert_eq!(ok, vec!["LED_SPEED"]);
        assert_eq!(session.len(), 2);
    }

    #[test]
    fn successful_batch_empties_the_session() {
        let dispatcher = Dispatcher::new(ScriptedChannel::new());
        let mut session = ParameterSession::new();
        session.stage("PP_AGCMAXGAIN", vec![32.0]);
        session.stage("AUDIO_MGR_SYS_DELAY", vec![-16.0]);

        assert!(session.apply_all(&dispatcher).iter().all(|(_, o)| o.is_ok()));
        assert!(session.is_empty());
    }

    #[test]
    fn clear_touches_nothing() {
        let channel = ScriptedChannel::new();
        let calls = channel.calls.clone();
        let mut session = ParameterSession::new();
        session.stage("LED_COLOR", vec![255.0]);
        session.clear();

        let dispatcher = Dispatcher::new(channel);
        assert!(session.apply_all(&dispatcher).is_empty());
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn defaults_cover_read_write_parameters_only() {
        let mut session = ParameterSession::new();
        session.stage_defaults();

        let names: Vec<&str> = session.staged().map(|(n, _)| n).collect();
        assert!(names.contains(&"AUDIO_MGR_MIC_GAIN"));
        assert!(names.contains(&"LED_BRIGHTNESS"));
        assert!(!names.contains(&"SAVE_CONFIGURATION"));
        assert!(!names.contains(&"VERSION"));

        let dispatcher = Dispatcher::new(ScriptedChannel::new());
        assert!(session.apply_all(&dispatcher).iter().all(|(_, o)| o.is_ok()));
    }

    #[test]
    fn save_and_clear_configuration_pass_through() {
        let channel = ScriptedChannel::new();
        let calls = channel.calls.clone();
        let dispatcher = Dispatcher::new(channel);
        let session = ParameterSession::new();

        session.save_configuration(&dispatcher).unwrap();
        session.clear_configuration(&dispatcher).unwrap();

        let sent: Vec<String> = calls.lock().unwrap().iter().map(|(c, _)| c.clone()).collect();
        assert_eq!(sent, vec!["SAVE_CONFIGURATION", "CLEAR_CONFIGURATION"]);
    }
}
