use std::sync::Arc;

use crate::breakpoints::BreakpointRegistry;
use crate::condition::{Condition, ConditionParser, MachineState};
use crate::exec::ExecutionContext;
use crate::hooks::{CodeCache, DebugInterface, MmuNotifier};
use crate::session::Session;
use crate::trigger::{MemoryAccess, TriggerOutcome};
use crate::watchpoints::WatchpointRegistry;

/// Breakpoints and watchpoints for one emulated CPU, plus the checks the
/// execution loop calls into.
pub struct Debugger {
    pub breakpoints: BreakpointRegistry,
    pub watchpoints: WatchpointRegistry,
    debug: Arc<dyn DebugInterface + Send + Sync>,
}

impl Debugger {
    pub fn new<H>(host: Arc<H>) -> Self
    where
        H: CodeCache + MmuNotifier + DebugInterface + Send + Sync + 'static,
    {
        Self {
            breakpoints: BreakpointRegistry::new(host.clone()),
            watchpoints: WatchpointRegistry::new(host.clone(), host.clone()),
            debug: host,
        }
    }

    // 実行中のアドレスがブレークポイントに達したかをチェック
    /// Check the instruction about to run at `pc`. A temporary breakpoint is
    /// removed once it fires.
    pub fn check_breakpoint(&mut self, pc: u32, machine: &dyn MachineState) -> TriggerOutcome {
        let Some(bp) = self.breakpoints.find(pc) else {
            return TriggerOutcome::NoHit;
        };
        if !bp.enabled || !Condition::evaluate(bp.condition.as_ref(), machine) {
            return TriggerOutcome::NoHit;
        }

        if bp.log_on_hit {
            log::info!(target: "memmap", "BP {:08x} ({})", pc, self.debug.describe(pc));
        }
        let outcome = if bp.break_on_hit {
            TriggerOutcome::Halt
        } else {
            TriggerOutcome::Continue
        };

        if bp.temporary {
            self.breakpoints.remove(pc);
        }
        outcome
    }

    /// Check a load or store against the watchpoints, counting the hit on the
    /// first watchpoint that covers it.
    pub fn memory_access(&self, machine: &dyn MachineState, access: &MemoryAccess) -> TriggerOutcome {
        match self.watchpoints.record_hit(access.address, access.size) {
            Some(wp) => wp.action(self.debug.as_ref(), machine, access),
            None => TriggerOutcome::NoHit,
        }
    }

    pub fn save_session(&self) -> Session {
        Session {
            breakpoints: self.breakpoints.get_strings(),
            watchpoints: self.watchpoints.get_strings(),
        }
    }

    /// Replace both registries with the contents of `session`.
    pub fn load_session<E>(&mut self, exec: &E, session: &Session, parser: &dyn ConditionParser)
    where
        E: ExecutionContext + ?Sized,
    {
        self.breakpoints.clear();
        self.watchpoints.clear(exec);
        let bps = self.breakpoints.add_from_strings(&session.breakpoints, parser);
        let wps = self
            .watchpoints
            .add_from_strings(exec, &session.watchpoints, parser);
        log::debug!("session restored {bps} breakpoints and {wps} watchpoints");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::tests::Registers;
    use crate::condition::ComparisonParser;
    use crate::exec::Inline;
    use crate::hooks::testing::RecordingHost;
    use crate::trigger::AccessKind;
    use crate::watchpoints::Watchpoint;

    fn debugger() -> (Debugger, Arc<RecordingHost>) {
        let host = Arc::new(RecordingHost::default());
        (Debugger::new(host.clone()), host)
    }

    #[test]
    fn breakpoint_hit_and_miss() {
        let (mut dbg, _) = debugger();
        let regs = Registers::default();
        dbg.breakpoints.add_address(0x8000_1000, false);

        assert_eq!(dbg.check_breakpoint(0x8000_1000, &regs), TriggerOutcome::Halt);
        assert_eq!(dbg.check_breakpoint(0x8000_1004, &regs), TriggerOutcome::NoHit);

        dbg.breakpoints.toggle(0x8000_1000);
        assert_eq!(dbg.check_breakpoint(0x8000_1000, &regs), TriggerOutcome::NoHit);
    }

    #[test]
    fn temporary_breakpoint_fires_once() {
        let (mut dbg, host) = debugger();
        let regs = Registers::default();
        dbg.breakpoints.add_address(0x8000_1000, true);

        assert_eq!(dbg.check_breakpoint(0x8000_1000, &regs), TriggerOutcome::Halt);
        assert!(!dbg.breakpoints.is_breakpoint(0x8000_1000));
        assert_eq!(host.invalidations_at(0x8000_1000), 2);
        assert_eq!(dbg.check_breakpoint(0x8000_1000, &regs), TriggerOutcome::NoHit);
    }

    #[test]
    fn conditional_log_only_breakpoint() {
        let (mut dbg, _) = debugger();
        dbg.breakpoints.add_or_replace(
            0x10,
            false,
            false,
            true,
            Condition::parse(&ComparisonParser, "r3 == 5"),
        );
        assert_eq!(
            dbg.check_breakpoint(0x10, &Registers::with("r3", 4)),
            TriggerOutcome::NoHit
        );
        assert_eq!(
            dbg.check_breakpoint(0x10, &Registers::with("r3", 5)),
            TriggerOutcome::Continue
        );
    }

    #[test]
    fn memory_access_counts_hits() {
        let (dbg, _) = debugger();
        let mut wp = Watchpoint::new(0x8000_3000, 0x8000_3010);
        wp.break_on_read = false;
        dbg.watchpoints.add(&Inline, wp);

        let mut access = MemoryAccess {
            value: 1,
            address: 0x8000_3008,
            kind: AccessKind::Read,
            size: 4,
            pc: 0x8000_1000,
        };
        let regs = Registers::default();
        // A read is counted even though it does not trigger.
        assert_eq!(dbg.memory_access(&regs, &access), TriggerOutcome::NoHit);
        access.kind = AccessKind::Write;
        assert_eq!(dbg.memory_access(&regs, &access), TriggerOutcome::Halt);
        access.address = 0x8000_4000;
        assert_eq!(dbg.memory_access(&regs, &access), TriggerOutcome::NoHit);

        assert_eq!(dbg.watchpoints.find(0x8000_3000, 1).unwrap().hit_count, 2);
    }

    #[test]
    fn session_round_trip() {
        let (mut dbg, _) = debugger();
        dbg.breakpoints.add_address(0x8000_1000, false);
        dbg.breakpoints.add_address(0x8000_2000, true);
        dbg.watchpoints.add(&Inline, Watchpoint::new(0x8000_3000, 0x8000_3010));
        let saved = dbg.save_session();
        assert_eq!(saved.breakpoints, vec!["$80001000 nb"]);

        let (mut restored, host) = debugger();
        restored.breakpoints.add_address(0x9000_0000, false);
        restored.load_session(&Inline, &saved, &ComparisonParser);
        assert!(!restored.breakpoints.is_breakpoint(0x9000_0000));
        assert_eq!(restored.save_session(), saved);
        // clear on an empty table, then the first add
        assert_eq!(host.clear_count(), 2);
    }
}
