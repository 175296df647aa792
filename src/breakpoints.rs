use serde::Serialize;
use std::sync::Arc;

use crate::codec;
use crate::condition::{Condition, ConditionParser};
use crate::hooks::{CodeCache, INSTRUCTION_SIZE};

/// An execution breakpoint on one instruction address.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Breakpoint {
    pub address: u32,
    pub enabled: bool,
    /// Removed after it fires once. Never saved.
    pub temporary: bool,
    pub break_on_hit: bool,
    pub log_on_hit: bool,
    pub condition: Option<Condition>,
}

impl Breakpoint {
    /// An enabled, halting, unconditional breakpoint.
    pub fn new(address: u32) -> Self {
        Self {
            address,
            enabled: true,
            temporary: false,
            break_on_hit: true,
            log_on_hit: false,
            condition: None,
        }
    }
}

/// Instruction breakpoints, kept in insertion order.
///
/// Has no locking of its own. Callers on other threads must already be
/// synchronized with the execution thread.
pub struct BreakpointRegistry {
    breakpoints: Vec<Breakpoint>,
    code_cache: Arc<dyn CodeCache>,
}

impl BreakpointRegistry {
    pub fn new(code_cache: Arc<dyn CodeCache>) -> Self {
        Self {
            breakpoints: Vec::new(),
            code_cache,
        }
    }

    pub fn is_breakpoint(&self, address: u32) -> bool {
        self.breakpoints.iter().any(|bp| bp.address == address)
    }

    pub fn is_enabled(&self, address: u32) -> bool {
        self.breakpoints
            .iter()
            .any(|bp| bp.enabled && bp.address == address)
    }

    pub fn is_temporary(&self, address: u32) -> bool {
        self.breakpoints
            .iter()
            .any(|bp| bp.temporary && bp.address == address)
    }

    pub fn find(&self, address: u32) -> Option<&Breakpoint> {
        self.breakpoints.iter().find(|bp| bp.address == address)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Breakpoint> {
        self.breakpoints.iter()
    }

    pub fn len(&self) -> usize {
        self.breakpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakpoints.is_empty()
    }

    /// Insert `breakpoint` unless its address is already taken.
    pub fn add(&mut self, breakpoint: Breakpoint) {
        if self.is_breakpoint(breakpoint.address) {
            return;
        }

        log::debug!("breakpoint added at {:08x}", breakpoint.address);
        self.invalidate(breakpoint.address);
        self.breakpoints.push(breakpoint);
    }

    /// Set a plain halting breakpoint at `address`.
    pub fn add_address(&mut self, address: u32, temporary: bool) {
        self.add_or_replace(address, temporary, true, false, None);
    }

    /// Set a breakpoint at `address`, replacing whatever is there. A replaced
    /// breakpoint keeps its enabled state.
    pub fn add_or_replace(
        &mut self,
        address: u32,
        temporary: bool,
        break_on_hit: bool,
        log_on_hit: bool,
        condition: Option<Condition>,
    ) {
        let mut breakpoint = Breakpoint {
            address,
            enabled: true,
            temporary,
            break_on_hit,
            log_on_hit,
            condition,
        };

        match self.breakpoints.iter_mut().find(|bp| bp.address == address) {
            Some(existing) => {
                breakpoint.enabled = existing.enabled;
                *existing = breakpoint;
                log::debug!("breakpoint replaced at {address:08x}");
            }
            None => {
                self.breakpoints.push(breakpoint);
                log::debug!("breakpoint added at {address:08x}");
            }
        }

        self.invalidate(address);
    }

    /// Flip the enabled state. `false` when there is no breakpoint at `address`.
    pub fn toggle(&mut self, address: u32) -> bool {
        match self.breakpoints.iter_mut().find(|bp| bp.address == address) {
            Some(bp) => {
                bp.enabled = !bp.enabled;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, address: u32) {
        let Some(index) = self.breakpoints.iter().position(|bp| bp.address == address) else {
            return;
        };

        self.breakpoints.remove(index);
        log::debug!("breakpoint removed at {address:08x}");
        self.invalidate(address);
    }

    pub fn clear(&mut self) {
        for bp in &self.breakpoints {
            self.code_cache
                .invalidate_icache(bp.address, INSTRUCTION_SIZE, true);
        }
        log::debug!("cleared {} breakpoints", self.breakpoints.len());
        self.breakpoints.clear();
    }

    pub fn clear_temporary(&mut self) {
        let code_cache = &self.code_cache;
        self.breakpoints.retain(|bp| {
            if bp.temporary {
                code_cache.invalidate_icache(bp.address, INSTRUCTION_SIZE, true);
                false
            } else {
                true
            }
        });
    }

    /// Saved form of every non-temporary breakpoint.
    pub fn get_strings(&self) -> Vec<String> {
        self.breakpoints
            .iter()
            .filter(|bp| !bp.temporary)
            .map(codec::encode_breakpoint)
            .collect()
    }

    /// Load saved breakpoints. Malformed lines are skipped with a warning.
    /// Returns how many lines decoded.
    pub fn add_from_strings<S: AsRef<str>>(
        &mut self,
        lines: &[S],
        parser: &dyn ConditionParser,
    ) -> usize {
        let mut loaded = 0;
        for line in lines {
            match codec::decode_breakpoint(line.as_ref(), parser) {
                Ok(bp) => {
                    self.add(bp);
                    loaded += 1;
                }
                Err(e) => log::warn!("skipping breakpoint: {e}"),
            }
        }
        loaded
    }

    fn invalidate(&self, address: u32) {
        self.code_cache
            .invalidate_icache(address, INSTRUCTION_SIZE, true);
    }
}
