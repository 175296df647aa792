//! One-line text form of breakpoints and watchpoints.
//!
//! ```text
//! $80001000 nlbc r3 == 5
//! $80003000 80003010 nwc r3 == 5
//! ```
//!
//! Addresses are 8 lowercase hex digits, the first one prefixed with `$`.
//! Flags are single letters written in a fixed order and read in any order.
//! A `c` flag means the rest of the line is the condition text.

use std::fmt::Write;

use crate::breakpoints::Breakpoint;
use crate::condition::{Condition, ConditionParser};
use crate::error::{Error, Result};
use crate::watchpoints::Watchpoint;

const ENABLED: char = 'n';
const BREAK_ON_READ: char = 'r';
const BREAK_ON_WRITE: char = 'w';
const LOG_ON_HIT: char = 'l';
const BREAK_ON_HIT: char = 'b';
const CONDITION: char = 'c';

pub fn encode_breakpoint(bp: &Breakpoint) -> String {
    let mut line = format!("${:08x} ", bp.address);
    push_flag(&mut line, bp.enabled, ENABLED);
    push_flag(&mut line, bp.log_on_hit, LOG_ON_HIT);
    push_flag(&mut line, bp.break_on_hit, BREAK_ON_HIT);
    push_condition(&mut line, bp.condition.as_ref());
    line
}

pub fn encode_watchpoint(wp: &Watchpoint) -> String {
    let mut line = format!("${:08x} {:08x} ", wp.start_address, wp.end_address);
    push_flag(&mut line, wp.enabled, ENABLED);
    push_flag(&mut line, wp.break_on_read, BREAK_ON_READ);
    push_flag(&mut line, wp.break_on_write, BREAK_ON_WRITE);
    push_flag(&mut line, wp.log_on_hit, LOG_ON_HIT);
    push_flag(&mut line, wp.break_on_hit, BREAK_ON_HIT);
    push_condition(&mut line, wp.condition.as_ref());
    line
}

/// Decode a saved breakpoint. The result is never temporary.
pub fn decode_breakpoint(line: &str, parser: &dyn ConditionParser) -> Result<Breakpoint> {
    let mut fields = Fields::new(line);
    let address = fields.address("address")?;
    let flags = fields.flags();

    Ok(Breakpoint {
        address,
        enabled: flags.contains(ENABLED),
        temporary: false,
        break_on_hit: flags.contains(BREAK_ON_HIT),
        log_on_hit: flags.contains(LOG_ON_HIT),
        condition: fields.condition(flags, parser),
    })
}

pub fn decode_watchpoint(line: &str, parser: &dyn ConditionParser) -> Result<Watchpoint> {
    let mut fields = Fields::new(line);
    let start_address = fields.address("start address")?;
    let end_address = fields.address("end address")?;
    let flags = fields.flags();

    Ok(Watchpoint {
        start_address,
        end_address,
        ranged: start_address != end_address,
        enabled: flags.contains(ENABLED),
        break_on_read: flags.contains(BREAK_ON_READ),
        break_on_write: flags.contains(BREAK_ON_WRITE),
        log_on_hit: flags.contains(LOG_ON_HIT),
        break_on_hit: flags.contains(BREAK_ON_HIT),
        condition: fields.condition(flags, parser),
        hit_count: 0,
    })
}

fn push_flag(line: &mut String, set: bool, flag: char) {
    if set {
        line.push(flag);
    }
}

fn push_condition(line: &mut String, condition: Option<&Condition>) {
    if let Some(condition) = condition {
        // Writing to a String cannot fail.
        let _ = write!(line, "{CONDITION} {}", condition.text());
    }
}

/// Whitespace-separated cursor over a saved line.
struct Fields<'a> {
    line: &'a str,
    rest: &'a str,
}

impl<'a> Fields<'a> {
    fn new(line: &'a str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);
        let rest = line.strip_prefix('$').unwrap_or(line);
        Self { line, rest }
    }

    fn token(&mut self) -> Option<&'a str> {
        let trimmed = self.rest.trim_start();
        if trimmed.is_empty() {
            self.rest = trimmed;
            return None;
        }
        let end = trimmed
            .find(char::is_whitespace)
            .unwrap_or(trimmed.len());
        let (token, rest) = trimmed.split_at(end);
        self.rest = rest;
        Some(token)
    }

    fn address(&mut self, field: &'static str) -> Result<u32> {
        let token = self.token().ok_or_else(|| Error::MissingField {
            field,
            line: self.line.to_owned(),
        })?;
        let digits = token
            .strip_prefix("0x")
            .or_else(|| token.strip_prefix("0X"))
            .unwrap_or(token);
        u32::from_str_radix(digits, 16).map_err(|_| Error::InvalidAddress {
            text: token.to_owned(),
            line: self.line.to_owned(),
        })
    }

    /// A missing flags field means no flags.
    fn flags(&mut self) -> &'a str {
        self.token().unwrap_or("")
    }

    fn condition(&self, flags: &str, parser: &dyn ConditionParser) -> Option<Condition> {
        if !flags.contains(CONDITION) {
            return None;
        }
        Condition::parse(parser, self.rest.trim_start())
    }
}
