//! Bridge limits from a C constants header.
//!
//! Reads `#define NAME value` lines where `value` is an integer literal or a
//! quoted string. Expressions such as `(VIRTUALBOT_TTY_MAJOR + 1)` are not
//! evaluated and are skipped.

use super::error::{ConfigError, ConfigResult};
use super::schema::BridgeConfig;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

pub const MAX_SIGNAL_LEN_KEY: &str = "VIRTUALBOT_MAX_SIGNAL_LEN";
pub const TOTAL_SIGNALS_KEY: &str = "VIRTUALBOT_TOTAL_SIGNALS";
pub const MAX_MINORS_KEY: &str = "VIRTUALBOT_MAX_TTY_MINORS";
pub const MAJOR_KEY: &str = "VIRTUALBOT_TTY_MAJOR";
pub const EMULATED_NAME_KEY: &str = "VIRTUALBOT_TTY_NAME";
pub const EXOGENOUS_NAME_KEY: &str = "VB_COMM_TTY_NAME";

/// A constant value found in the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    Int(i64),
    Str(String),
}

/// A parsed constant together with the line it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderConstant {
    pub value: HeaderValue,
    pub line: usize,
}

fn define_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^\s*#\s*define\s+([A-Za-z_][A-Za-z0-9_]*)\s+(?:"([^"]*)"|(-?(?:0[xX][0-9a-fA-F]+|\d+)))\s*(?://.*|/\*.*)?$"#)
            .expect("define pattern is valid")
    })
}

fn parse_int(literal: &str) -> Option<i64> {
    let (negative, digits) = match literal.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, literal),
    };
    let value = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => i64::from_str_radix(hex, 16).ok()?,
        None => digits.parse().ok()?,
    };
    Some(if negative { -value } else { value })
}

/// Collect every integer or string `#define` in the header text.
pub fn parse_defines(content: &str) -> ConfigResult<BTreeMap<String, HeaderConstant>> {
    let mut constants = BTreeMap::new();

    for (idx, raw) in content.lines().enumerate() {
        let Some(caps) = define_regex().captures(raw) else {
            continue;
        };
        let line = idx + 1;
        let name = caps[1].to_string();

        let value = if let Some(text) = caps.get(2) {
            HeaderValue::Str(text.as_str().to_string())
        } else {
            let literal = &caps[3];
            let value = parse_int(literal)
                .ok_or_else(|| ConfigError::header(&name, line, "integer out of range"))?;
            HeaderValue::Int(value)
        };

        constants.insert(name, HeaderConstant { value, line });
    }

    Ok(constants)
}

fn as_count(
    constants: &BTreeMap<String, HeaderConstant>,
    key: &str,
) -> ConfigResult<Option<usize>> {
    match constants.get(key) {
        None => Ok(None),
        Some(HeaderConstant {
            value: HeaderValue::Int(n),
            line,
        }) => usize::try_from(*n)
            .map(Some)
            .map_err(|_| ConfigError::header(key, *line, "must not be negative")),
        Some(HeaderConstant { line, .. }) => {
            Err(ConfigError::header(key, *line, "expected an integer"))
        }
    }
}

fn as_name(constants: &BTreeMap<String, HeaderConstant>, key: &str) -> ConfigResult<Option<String>> {
    match constants.get(key) {
        None => Ok(None),
        Some(HeaderConstant {
            value: HeaderValue::Str(s),
            ..
        }) => Ok(Some(s.clone())),
        Some(HeaderConstant { line, .. }) => {
            Err(ConfigError::header(key, *line, "expected a quoted string"))
        }
    }
}

/// Overwrite the bridge limits found in `constants`; missing keys are left alone.
pub fn apply_to_bridge(
    constants: &BTreeMap<String, HeaderConstant>,
    bridge: &mut BridgeConfig,
) -> ConfigResult<()> {
    if let Some(n) = as_count(constants, MAX_SIGNAL_LEN_KEY)? {
        bridge.max_signal_len = n;
    }
    if let Some(n) = as_count(constants, TOTAL_SIGNALS_KEY)? {
        bridge.total_signal_capacity = n;
    }
    if let Some(n) = as_count(constants, MAX_MINORS_KEY)? {
        bridge.max_minors = n;
    }
    if let Some(n) = as_count(constants, MAJOR_KEY)? {
        bridge.major = u32::try_from(n).map_err(|_| {
            let line = constants.get(MAJOR_KEY).map(|c| c.line).unwrap_or_default();
            ConfigError::header(MAJOR_KEY, line, "major number out of range")
        })?;
    }
    if let Some(name) = as_name(constants, EMULATED_NAME_KEY)? {
        bridge.emulated_prefix = name;
    }
    if let Some(name) = as_name(constants, EXOGENOUS_NAME_KEY)? {
        bridge.exogenous_prefix = name;
    }
    Ok(())
}
