// Interfaces the registries use to reach the rest of the emulator.

/// Size of the region invalidated for a single instruction breakpoint.
pub const INSTRUCTION_SIZE: u32 = 4;

/// The JIT's compiled code cache.
pub trait CodeCache: Send + Sync {
    /// Drop compiled blocks covering `[address, address + size)`.
    fn invalidate_icache(&self, address: u32, size: u32, forced: bool);

    /// Drop every compiled block.
    fn clear_cache(&self);
}

/// Memory management unit, told when the set of watched ranges changes so
/// it can rebuild its fast-access tables.
pub trait MmuNotifier: Send + Sync {
    fn watch_config_changed(&self);
}

/// Symbolic information about the emulated program, used only for log text.
pub trait DebugInterface {
    fn describe(&self, address: u32) -> String;
}

/// Host with no JIT, no MMU tables and no symbols.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHost;

impl CodeCache for NullHost {
    fn invalidate_icache(&self, address: u32, size: u32, forced: bool) {
        log::trace!("invalidate_icache({address:08x}, {size}, {forced}) ignored");
    }

    fn clear_cache(&self) {
        log::trace!("clear_cache() ignored");
    }
}

impl MmuNotifier for NullHost {
    fn watch_config_changed(&self) {
        log::trace!("watch_config_changed() ignored");
    }
}

impl DebugInterface for NullHost {
    fn describe(&self, _address: u32) -> String {
        String::new()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// Records every collaborator call so tests can count them.
    #[derive(Debug, Default)]
    pub struct RecordingHost {
        pub invalidations: Mutex<Vec<(u32, u32, bool)>>,
        pub clears: Mutex<usize>,
        pub config_changes: Mutex<usize>,
        pub symbols: HashMap<u32, String>,
    }

    impl RecordingHost {
        pub fn invalidations_at(&self, address: u32) -> usize {
            self.invalidations
                .lock()
                .iter()
                .filter(|(a, _, _)| *a == address)
                .count()
        }

        pub fn clear_count(&self) -> usize {
            *self.clears.lock()
        }

        pub fn config_change_count(&self) -> usize {
            *self.config_changes.lock()
        }
    }

    impl CodeCache for RecordingHost {
        fn invalidate_icache(&self, address: u32, size: u32, forced: bool) {
            self.invalidations.lock().push((address, size, forced));
        }

        fn clear_cache(&self) {
            *self.clears.lock() += 1;
        }
    }

    impl MmuNotifier for RecordingHost {
        fn watch_config_changed(&self) {
            *self.config_changes.lock() += 1;
        }
    }

    impl DebugInterface for RecordingHost {
        fn describe(&self, address: u32) -> String {
            self.symbols.get(&address).cloned().unwrap_or_default()
        }
    }
}
