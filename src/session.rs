//! Saved debugger state: both registries' lines in one file.
//!
//! ```text
//! [BreakPoints]
//! $80001000 nb
//! [MemoryBreakPoints]
//! $80003000 80003010 nwc r3 == 5
//! ```

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

pub const BREAKPOINTS_SECTION: &str = "BreakPoints";
pub const WATCHPOINTS_SECTION: &str = "MemoryBreakPoints";

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Session {
    pub breakpoints: Vec<String>,
    pub watchpoints: Vec<String>,
}

enum Section {
    Breakpoints,
    Watchpoints,
}

impl Session {
    /// Blank lines and `#` comments are skipped. Anything outside a known
    /// section is an error.
    pub fn parse(text: &str) -> Result<Self> {
        let mut session = Session::default();
        let mut section = None;

        for (index, raw) in text.lines().enumerate() {
            let line_number = index + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            if let Some(name) = trimmed.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
                section = Some(match name.trim() {
                    BREAKPOINTS_SECTION => Section::Breakpoints,
                    WATCHPOINTS_SECTION => Section::Watchpoints,
                    other => {
                        return Err(Error::Session {
                            line: line_number,
                            reason: format!("unknown section [{other}]"),
                        })
                    }
                });
                continue;
            }

            // Condition text may end in spaces, so keep everything but the
            // leading indentation.
            let entry = raw.trim_start().to_owned();
            match section {
                Some(Section::Breakpoints) => session.breakpoints.push(entry),
                Some(Section::Watchpoints) => session.watchpoints.push(entry),
                None => {
                    return Err(Error::Session {
                        line: line_number,
                        reason: "entry before any section header".to_owned(),
                    })
                }
            }
        }

        Ok(session)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (name, lines) in [
            (BREAKPOINTS_SECTION, &self.breakpoints),
            (WATCHPOINTS_SECTION, &self.watchpoints),
        ] {
            let _ = writeln!(out, "[{name}]");
            for line in lines {
                let _ = writeln!(out, "{line}");
            }
        }
        out
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let session = Self::parse(&text)?;
        log::debug!(
            "loaded {} breakpoints and {} watchpoints from {}",
            session.breakpoints.len(),
            session.watchpoints.len(),
            path.display()
        );
        Ok(session)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.render())?;
        Ok(())
    }
}
