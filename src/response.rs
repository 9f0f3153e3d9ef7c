//! Decodes what `xvf_host` prints into typed [`Value`]s.
//!
//! A typical answer looks like
//!
//! ```text
//! Device (USB)::device_init() -- Found device VID: 10374 PID: 26 interface: 3
//! AEC_AZIMUTH_VALUES 0.52 (30.00 deg) 1.57 (90.00 deg) 0.00 (0.00 deg) 0.52 (30.00 deg)
//! ```
//!
//! The answer line echoes the command name, may be preceded by
//! initialisation chatter, and may carry human-readable annotations in
//! parentheses. Only the bare numbers are data.

use crate::command_registry::CommandSpec;
use crate::error::XvfError;
use crate::value::{ParamType, Value};

use nom::{
    branch::alt,
    bytes::complete::{is_not, tag_no_case},
    character::complete::{char, hex_digit1, i32, multispace0, u32, u8},
    combinator::{all_consuming, map, map_res, opt, recognize},
    multi::many0,
    number::complete::float,
    sequence::{delimited, pair, preceded, terminated},
    Finish, IResult,
};

enum Piece<'a> {
    Token(&'a str),
    Annotation,
}

fn annotation(s: &str) -> IResult<&str, Piece> {
    map(
        delimited(char('('), opt(is_not(")")), char(')')),
        |_| Piece::Annotation,
    )(s)
}

fn token(s: &str) -> IResult<&str, Piece> {
    map(is_not(" \t\r\n()"), Piece::Token)(s)
}

fn pieces(s: &str) -> IResult<&str, Vec<&str>> {
    map(
        all_consuming(terminated(
            many0(preceded(multispace0, alt((annotation, token)))),
            multispace0,
        )),
        |ps| {
            ps.into_iter()
                .filter_map(|p| match p {
                    Piece::Token(t) => Some(t),
                    Piece::Annotation => None,
                })
                .collect()
        },
    )(s)
}

fn hex_u32(s: &str) -> IResult<&str, u32> {
    map_res(preceded(tag_no_case("0x"), hex_digit1), |digits: &str| {
        u32::from_str_radix(digits, 16)
    })(s)
}

fn signed_hex_i32(s: &str) -> IResult<&str, i32> {
    map_res(
        recognize(pair(opt(char('-')), preceded(tag_no_case("0x"), hex_digit1))),
        |text: &str| {
            let (negative, digits) = match text.strip_prefix('-') {
                Some(rest) => (true, &rest[2..]),
                None => (false, &text[2..]),
            };
            i32::from_str_radix(digits, 16).map(|v| if negative { -v } else { v })
        },
    )(s)
}

/// Parses a single token as `param_type`. Integer types accept decimal
/// or `0x` hexadecimal.
pub fn parse_token(param_type: ParamType, text: &str) -> Option<Value> {
    let parsed: Result<(&str, Value), nom::error::Error<&str>> = match param_type {
        ParamType::UInt8 => all_consuming(map(
            alt((map_res(hex_u32, u8::try_from), u8)),
            Value::UInt8,
        ))(text)
        .finish(),
        ParamType::Int32 => all_consuming(map(alt((signed_hex_i32, i32)), Value::Int32))(text)
            .finish(),
        ParamType::UInt32 => all_consuming(map(alt((hex_u32, u32)), Value::UInt32))(text)
            .finish(),
        ParamType::Float => all_consuming(map(float, Value::Float))(text).finish(),
        ParamType::Radians => all_consuming(map(float, Value::Radians))(text).finish(),
    };
    parsed.ok().map(|(_, value)| value)
}

/// Picks the line that answers `name`: the last line starting with the
/// command name (name stripped), or else the last non-empty line.
fn answer_line<'a>(name: &str, raw: &'a str) -> Option<&'a str> {
    let echoed = raw.lines().rev().find_map(|line| {
        let line = line.trim();
        line.strip_prefix(name)
            .filter(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
    });

    echoed.or_else(|| raw.lines().map(str::trim).rev().find(|l| !l.is_empty()))
}

/// Decodes the stdout of a read of `spec` into exactly `spec.param_count`
/// values of `spec.param_type`.
pub fn decode(spec: &'static CommandSpec, raw: &str) -> Result<Vec<Value>, XvfError> {
    let parse_err = |reason: String| XvfError::Parse {
        command: spec.name,
        reason,
    };

    let line = answer_line(spec.name, raw).ok_or_else(|| parse_err("empty output".into()))?;

    let (_, tokens) = pieces(line)
        .finish()
        .map_err(|e| parse_err(format!("malformed line {:?} ({:?})", line, e.code)))?;

    if tokens.len() != spec.param_count {
        return Err(parse_err(format!(
            "expected {} value(s), got {} in {:?}",
            spec.param_count,
            tokens.len(),
            line
        )));
    }

    tokens
        .into_iter()
        .map(|t| {
            parse_token(spec.param_type, t)
                .ok_or_else(|| parse_err(format!("{:?} is not a valid {}", t, spec.param_type)))
        })
        .collect()
}

/// Reads a number typed by the operator, such as `"0xff0000"`, `"-32"` or
/// `"1.5"`.
pub fn parse_number(text: &str) -> Option<f64> {
    let text = text.trim();
    if let Some(Value::Int32(v)) = parse_token(ParamType::Int32, text) {
        return Some(v as f64);
    }
    if let Some(Value::UInt32(v)) = parse_token(ParamType::UInt32, text) {
        return Some(v as f64);
    }
    text.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_registry::lookup;

    #[test]
    fn four_energy_tokens() {
        let spec = lookup("AEC_SPENERGY_VALUES").unwrap();
        let values = decode(spec, "1.5 2 3.25 4e3\n").unwrap();
        assert_eq!(
            values,
            vec![
                Value::Float(1.5),
                Value::Float(2.0),
                Value::Float(3.25),
                Value::Float(4000.0)
            ]
        );
    }

    #[test]
    fn three_energy_tokens_is_a_parse_error() {
        let spec = lookup("AEC_SPENERGY_VALUES").unwrap();
        assert!(matches!(
            decode(spec, "1.0 2.0 3.0"),
            Err(XvfError::Parse { command: "AEC_SPENERGY_VALUES", .. })
        ));
    }

    #[test]
    fn skips_chatter_and_echoed_name() {
        let spec = lookup("AEC_SPENERGY_VALUES").unwrap();
        let raw = "Device (USB)::device_init() -- Found device\n\
                   AEC_SPENERGY_VALUES 10 20 30 40\n";
        let values = decode(spec, raw).unwrap();
        assert_eq!(values[3], Value::Float(40.0));
    }

    #[test]
    fn drops_degree_annotations() {
        let spec = lookup("AEC_AZIMUTH_VALUES").unwrap();
        let raw = "AEC_AZIMUTH_VALUES 0.52 (30.00 deg) 1.57 (90.00 deg) 0 (0.00 deg) 3.14 (180.00 deg)";
        let values = decode(spec, raw).unwrap();
        assert_eq!(values.len(), 4);
        assert_eq!(values[1], Value::Radians(1.57));
    }

    #[test]
    fn rejects_non_numeric_tokens() {
        let spec = lookup("AUDIO_MGR_MIC_GAIN").unwrap();
        assert!(matches!(
            decode(spec, "AUDIO_MGR_MIC_GAIN loud"),
            Err(XvfError::Parse { .. })
        ));
        assert!(matches!(decode(spec, "   \n"), Err(XvfError::Parse { .. })));
    }

    #[test]
    fn name_prefix_must_be_a_whole_word() {
        assert_eq!(answer_line("LED_SPEED", "LED_SPEEDX 3\n7"), Some("7"));
        assert_eq!(answer_line("LED_SPEED", "LED_SPEED 3\n"), Some(" 3"));
    }

    #[test]
    fn integer_tokens_accept_hex() {
        assert_eq!(
            parse_token(ParamType::UInt32, "0xFF0000"),
            Some(Value::UInt32(0xFF0000))
        );
        assert_eq!(parse_token(ParamType::UInt8, "0x100"), None);
        assert_eq!(parse_token(ParamType::Int32, "-0x20"), Some(Value::Int32(-32)));
        assert_eq!(parse_token(ParamType::UInt8, "-1"), None);
    }

    #[test]
    fn user_numbers() {
        assert_eq!(parse_number("0xff0000"), Some(16711680.0));
        assert_eq!(parse_number(" -32 "), Some(-32.0));
        assert_eq!(parse_number("8.5"), Some(8.5));
        assert_eq!(parse_number("eight"), None);
    }
}
