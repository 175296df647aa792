use serde::Serialize;
use std::fmt;

use crate::condition::{Condition, MachineState};
use crate::hooks::DebugInterface;
use crate::watchpoints::Watchpoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AccessKind {
    Read,
    Write,
}

impl fmt::Display for AccessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessKind::Read => f.write_str("Read"),
            AccessKind::Write => f.write_str("Write"),
        }
    }
}

/// What the execution loop should do after a breakpoint or watchpoint check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TriggerOutcome {
    /// Nothing fired.
    NoHit,
    /// Fired without a halt request; any log line has been written.
    Continue,
    /// Fired and execution must stop.
    Halt,
}

/// One memory access as seen by the load/store path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryAccess {
    pub value: u64,
    pub address: u32,
    pub kind: AccessKind,
    /// In bytes.
    pub size: u32,
    pub pc: u32,
}

impl Watchpoint {
    /// Decide whether `access` triggers this watchpoint.
    ///
    /// Does not touch `hit_count`; counting is up to the caller.
    pub fn action(
        &self,
        debug: &dyn DebugInterface,
        machine: &dyn MachineState,
        access: &MemoryAccess,
    ) -> TriggerOutcome {
        if !self.enabled {
            return TriggerOutcome::NoHit;
        }

        let watched = match access.kind {
            AccessKind::Read => self.break_on_read,
            AccessKind::Write => self.break_on_write,
        };
        if !watched || !Condition::evaluate(self.condition.as_ref(), machine) {
            return TriggerOutcome::NoHit;
        }

        if self.log_on_hit {
            log::info!(target: "memmap", "{}", hit_message(debug, access));
        }
        if self.break_on_hit {
            TriggerOutcome::Halt
        } else {
            TriggerOutcome::Continue
        }
    }
}

/// `MBP <pc> (<pc symbol>) <Read|Write><bits> <value> at <address> (<address symbol>)`
pub fn hit_message(debug: &dyn DebugInterface, access: &MemoryAccess) -> String {
    format!(
        "MBP {:08x} ({}) {}{} {:x} at {:08x} ({})",
        access.pc,
        debug.describe(access.pc),
        access.kind,
        access.size * 8,
        access.value,
        access.address,
        debug.describe(access.address)
    )
}
