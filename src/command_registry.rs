//! The table of commands understood by the XVF3800 control firmware.
//!
//! Every command the tool can send lives in [`COMMANDS`], a declarative
//! table. Nothing in the crate special-cases a command by name beyond
//! looking it up here, so adding a command is a one-line change.
//!
//! Ranges and defaults come from the vendor's user guide and are advisory:
//! they guard against obviously bad writes, they do not promise that a
//! given firmware revision accepts every value inside them.

use crate::error::XvfError;
use crate::value::ParamType::{self, Float, Int32, Radians, UInt32, UInt8};
use std::fmt;

/// Which direction(s) a command may be used in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Only `read` is legal
    ReadOnly,
    /// Only `write` is legal
    WriteOnly,
    /// Both `read` and `write` are legal
    ReadWrite,
}

impl Access {
    /// Whether the command may be read.
    pub fn readable(self) -> bool {
        matches!(self, Access::ReadOnly | Access::ReadWrite)
    }

    /// Whether the command may be written.
    pub fn writable(self) -> bool {
        matches!(self, Access::WriteOnly | Access::ReadWrite)
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Access::ReadOnly => "ro",
            Access::WriteOnly => "wo",
            Access::ReadWrite => "rw",
        };
        write!(f, "{}", s)
    }
}

/// An inclusive `(min, max)` bound on a parameter.
pub type Range = (f64, f64);

/// The static description of one command.
#[derive(Debug, PartialEq)]
pub struct CommandSpec {
    /// Command token, exactly as `xvf_host` expects it
    pub name: &'static str,
    /// Which of read and write are allowed
    pub access: Access,
    /// Number of scalars read or written
    pub param_count: usize,
    /// Type shared by every parameter
    pub param_type: ParamType,
    /// Either empty (unconstrained), one range shared by every parameter,
    /// or exactly one range per parameter.
    pub ranges: &'static [Range],
    /// Value the device resets to, one per parameter, if documented
    pub default: Option<&'static [f64]>,
    /// One line for `list`
    pub description: &'static str,
}

impl CommandSpec {
    /// The declared range of parameter `index`, if there is one.
    pub fn range_of(&self, index: usize) -> Option<Range> {
        match self.ranges {
            [] => None,
            [shared] => Some(*shared),
            per_param => per_param.get(index).copied(),
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<22} {} {}x{:<8}",
            self.name, self.access, self.param_count, self.param_type
        )?;
        let ranges: Vec<String> = (0..self.param_count)
            .filter_map(|i| self.range_of(i))
            .map(|(lo, hi)| format!("[{}, {}]", lo, hi))
            .collect();
        if !ranges.is_empty() {
            write!(f, " {}", ranges.join(" "))?;
        }
        if let Some(default) = self.default {
            let shown: Vec<String> = default.iter().map(|d| d.to_string()).collect();
            write!(f, " default={}", shown.join(","))?;
        }
        write!(f, "  {}", self.description)
    }
}

const fn cmd(
    name: &'static str,
    access: Access,
    param_count: usize,
    param_type: ParamType,
    ranges: &'static [Range],
    default: Option<&'static [f64]>,
    description: &'static str,
) -> CommandSpec {
    CommandSpec {
        name,
        access,
        param_count,
        param_type,
        ranges,
        default,
        description,
    }
}

use Access::{ReadOnly as RO, ReadWrite as RW, WriteOnly as WO};

/// Every command the tool knows about.
pub static COMMANDS: &[CommandSpec] = &[
    // device
    cmd("VERSION", RO, 3, UInt8, &[], None, "Firmware version (major, minor, patch)"),
    cmd("DEVICE_SERIAL", RO, 1, UInt32, &[], None, "Device serial number"),
    cmd("DEVICE_ID", RO, 1, UInt32, &[], None, "Device identifier"),
    cmd("BOOT_STATUS", RO, 1, UInt8, &[], None, "Boot source status flag"),
    cmd("REBOOT", WO, 1, UInt8, &[(1.0, 1.0)], None, "Reboot the device"),
    cmd("SAVE_CONFIGURATION", WO, 1, UInt8, &[(1.0, 1.0)], None, "Persist current parameters to flash"),
    cmd("CLEAR_CONFIGURATION", WO, 1, UInt8, &[(1.0, 1.0)], None, "Erase persisted parameters"),
    // audio manager
    cmd("AUDIO_MGR_MIC_GAIN", RW, 1, UInt32, &[(0.0, 255.0)], Some(&[90.0]), "Microphone pre-gain"),
    cmd("AUDIO_MGR_REF_GAIN", RW, 1, Float, &[(0.0, 20.0)], Some(&[8.0]), "Far-end reference gain"),
    cmd("AUDIO_MGR_SYS_DELAY", RW, 1, Int32, &[(-64.0, 256.0)], Some(&[-32.0]), "Reference to mic delay in samples"),
    // post-processing
    cmd("PP_AGCGAIN", RW, 1, Float, &[(0.0, 10.0)], Some(&[2.0]), "AGC current gain"),
    cmd("PP_AGCMAXGAIN", RW, 1, Float, &[(0.0, 100.0)], Some(&[64.0]), "AGC maximum gain"),
    cmd("PP_FMIN_SPEINDEX", RW, 1, Float, &[(0.0, 5000.0)], Some(&[1300.0]), "Lowest frequency considered for speech (Hz)"),
    cmd("AEC_ASROUTGAIN", RW, 1, Float, &[(0.0, 5.0)], Some(&[1.0]), "Gain applied to the ASR output beam"),
    // AEC and beamforming
    cmd("AEC_AECCONVERGED", RO, 1, UInt8, &[(0.0, 1.0)], None, "1 once the echo canceller has converged"),
    cmd("AEC_SPENERGY_VALUES", RO, 4, Float, &[], None, "Speech energy: beam 1, beam 2, free-running, auto-select"),
    cmd("AEC_AZIMUTH_VALUES", RO, 4, Radians, &[], None, "Azimuth: beam 1, beam 2, free-running, auto-select"),
    cmd("DOA_VALUE", RO, 2, UInt32, &[], None, "Direction of arrival (degrees) and speech flag"),
    // LEDs
    cmd("LED_EFFECT", RW, 1, UInt8, &[(0.0, 4.0)], Some(&[0.0]), "0 off, 1 breath, 2 rainbow, 3 single colour, 4 DoA"),
    cmd("LED_COLOR", RW, 1, UInt32, &[(0.0, 16777215.0)], Some(&[0.0]), "Colour as 0xRRGGBB"),
    cmd("LED_BRIGHTNESS", RW, 1, UInt8, &[(0.0, 255.0)], Some(&[255.0]), "LED brightness"),
    cmd("LED_SPEED", RW, 1, UInt8, &[(1.0, 10.0)], Some(&[1.0]), "Effect animation speed"),
    // GPIO
    cmd("GPI_READ_VALUES", RO, 3, UInt8, &[(0.0, 1.0)], None, "Levels of the general purpose inputs"),
    cmd("GPO_READ_VALUES", RO, 5, UInt8, &[(0.0, 1.0)], None, "Levels of GPO pins 11, 30, 31, 33, 39"),
    cmd("GPO_WRITE_VALUE", WO, 2, UInt8, &[(11.0, 39.0), (0.0, 1.0)], None, "Drive a GPO pin: pin, level"),
];

/// Finds the command called `name`. Names are case-sensitive.
pub fn lookup(name: &str) -> Result<&'static CommandSpec, XvfError> {
    COMMANDS
        .iter()
        .find(|c| c.name == name)
        .ok_or_else(|| XvfError::NotFound {
            name: name.to_owned(),
        })
}

/// Iterates the whole table in declaration order.
pub fn commands() -> impl Iterator<Item = &'static CommandSpec> {
    COMMANDS.iter()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn names_are_unique() {
        let mut seen = HashSet::new();
        for c in commands() {
            assert!(seen.insert(c.name), "duplicate command {}", c.name);
        }
    }

    #[test]
    fn table_is_well_formed() {
        for c in commands() {
            assert!(c.param_count > 0, "{} has no parameters", c.name);
            assert!(
                c.ranges.len() <= 1 || c.ranges.len() == c.param_count,
                "{} has a mismatched range list",
                c.name
            );
            for (lo, hi) in c.ranges {
                assert!(lo <= hi, "{} has an inverted range", c.name);
            }
            if let Some(default) = c.default {
                assert_eq!(default.len(), c.param_count, "{}", c.name);
                for (i, d) in default.iter().enumerate() {
                    if let Some((lo, hi)) = c.range_of(i) {
                        assert!(*d >= lo && *d <= hi, "{} default out of range", c.name);
                    }
                }
            }
        }
    }

    #[test]
    fn lookup_is_case_sensitive() {
        assert_eq!(lookup("AUDIO_MGR_MIC_GAIN").unwrap().param_type, UInt32);
        assert!(matches!(
            lookup("audio_mgr_mic_gain"),
            Err(XvfError::NotFound { .. })
        ));
    }

    #[test]
    fn per_parameter_ranges() {
        let gpo = lookup("GPO_WRITE_VALUE").unwrap();
        assert_eq!(gpo.range_of(0), Some((11.0, 39.0)));
        assert_eq!(gpo.range_of(1), Some((0.0, 1.0)));

        let serial = lookup("DEVICE_SERIAL").unwrap();
        assert_eq!(serial.access, Access::ReadOnly);
        assert_eq!(serial.range_of(0), None);

        let energy = lookup("AEC_SPENERGY_VALUES").unwrap();
        assert_eq!(energy.range_of(3), None);
    }
}
