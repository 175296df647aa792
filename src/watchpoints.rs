//! Memory watchpoints.
//!
//! Whether any watchpoint exists decides which code path the JIT emits for
//! loads and stores, so every structural change runs on the execution thread
//! and the compiled code cache is flushed whenever the table switches between
//! empty and non-empty.

use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;

use crate::codec;
use crate::condition::{Condition, ConditionParser};
use crate::exec::ExecutionContext;
use crate::hooks::{CodeCache, MmuNotifier};

/// A watched, inclusive address range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Watchpoint {
    pub start_address: u32,
    pub end_address: u32,
    pub ranged: bool,
    pub enabled: bool,
    pub break_on_read: bool,
    pub break_on_write: bool,
    pub log_on_hit: bool,
    pub break_on_hit: bool,
    pub condition: Option<Condition>,
    pub hit_count: u64,
}

impl Watchpoint {
    /// Enabled, watching reads and writes, logging and halting on a hit.
    pub fn new(start_address: u32, end_address: u32) -> Self {
        Self {
            start_address,
            end_address,
            ranged: start_address != end_address,
            enabled: true,
            break_on_read: true,
            break_on_write: true,
            log_on_hit: true,
            break_on_hit: true,
            condition: None,
            hit_count: 0,
        }
    }

    /// Does `[address, address + length - 1]` touch this range?
    pub fn intersects(&self, address: u32, length: u32) -> bool {
        let first = u64::from(address);
        let last = first + u64::from(length.max(1)) - 1;
        u64::from(self.end_address) >= first && last >= u64::from(self.start_address)
    }
}

enum Outcome {
    Unchanged,
    Changed { clear_cache: bool },
}

/// Memory watchpoints keyed by start address, kept in insertion order.
///
/// Queries may run on any thread and may be stale by the time the caller
/// acts on them. `add`, `remove`, `clear` and `add_from_strings` go through
/// the given [`ExecutionContext`] and return once the change is applied.
pub struct WatchpointRegistry {
    checks: Arc<RwLock<Vec<Watchpoint>>>,
    code_cache: Arc<dyn CodeCache>,
    mmu: Arc<dyn MmuNotifier>,
}

impl WatchpointRegistry {
    pub fn new(code_cache: Arc<dyn CodeCache>, mmu: Arc<dyn MmuNotifier>) -> Self {
        Self {
            checks: Arc::new(RwLock::new(Vec::new())),
            code_cache,
            mmu,
        }
    }

    pub fn has_any(&self) -> bool {
        !self.checks.read().is_empty()
    }

    pub fn len(&self) -> usize {
        self.checks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_any()
    }

    pub fn snapshot(&self) -> Vec<Watchpoint> {
        self.checks.read().clone()
    }

    /// Insert `watchpoint`, or replace the one with the same start address.
    /// A replaced watchpoint keeps its enabled state and restarts its hit
    /// count.
    pub fn add<E>(&self, exec: &E, watchpoint: Watchpoint)
    where
        E: ExecutionContext + ?Sized,
    {
        self.exclusive(exec, move |checks| {
            let had_any = !checks.is_empty();
            let address = watchpoint.start_address;
            match checks.iter_mut().find(|wp| wp.start_address == address) {
                Some(existing) => {
                    let enabled = existing.enabled;
                    *existing = watchpoint;
                    existing.enabled = enabled;
                    existing.hit_count = 0;
                    log::debug!("watchpoint replaced at {address:08x}");
                }
                None => {
                    checks.push(watchpoint);
                    log::debug!("watchpoint added at {address:08x}");
                }
            }
            Outcome::Changed {
                clear_cache: !had_any,
            }
        });
    }

    /// Flip the enabled state. `false` when no watchpoint starts at `address`.
    pub fn toggle(&self, address: u32) -> bool {
        match self
            .checks
            .write()
            .iter_mut()
            .find(|wp| wp.start_address == address)
        {
            Some(wp) => {
                wp.enabled = !wp.enabled;
                true
            }
            None => false,
        }
    }

    /// First watchpoint touching `[address, address + length - 1]`.
    pub fn find(&self, address: u32, length: u32) -> Option<Watchpoint> {
        self.checks
            .read()
            .iter()
            .find(|wp| wp.intersects(address, length))
            .cloned()
    }

    /// Count a hit against the first watchpoint touching the access and
    /// return it as it is after counting.
    pub fn record_hit(&self, address: u32, size: u32) -> Option<Watchpoint> {
        let mut checks = self.checks.write();
        let wp = checks.iter_mut().find(|wp| wp.intersects(address, size))?;
        wp.hit_count += 1;
        Some(wp.clone())
    }

    pub fn remove<E>(&self, exec: &E, address: u32)
    where
        E: ExecutionContext + ?Sized,
    {
        self.exclusive(exec, move |checks| {
            let Some(index) = checks.iter().position(|wp| wp.start_address == address) else {
                return Outcome::Unchanged;
            };
            checks.remove(index);
            log::debug!("watchpoint removed at {address:08x}");
            Outcome::Changed {
                clear_cache: checks.is_empty(),
            }
        });
    }

    pub fn clear<E>(&self, exec: &E)
    where
        E: ExecutionContext + ?Sized,
    {
        self.exclusive(exec, |checks| {
            log::debug!("cleared {} watchpoints", checks.len());
            checks.clear();
            Outcome::Changed { clear_cache: true }
        });
    }

    /// Page-granular test: does any watched range touch the `length`-sized,
    /// `length`-aligned block holding `address`?
    ///
    /// `length` must be a power of two, the page size being probed.
    pub fn overlaps(&self, address: u32, length: u32) -> bool {
        let checks = self.checks.read();
        if checks.is_empty() {
            return false;
        }

        debug_assert!(length.is_power_of_two(), "page size {length} is not a power of two");
        let page_mask = length.wrapping_sub(1);
        let page_end = address | page_mask;

        checks.iter().any(|wp| {
            let start_page_end = wp.start_address | page_mask;
            let end_page_end = wp.end_address | page_mask;
            start_page_end == page_end
                || end_page_end == page_end
                || (start_page_end < page_end && end_page_end > page_end)
        })
    }

    pub fn get_strings(&self) -> Vec<String> {
        self.checks
            .read()
            .iter()
            .map(codec::encode_watchpoint)
            .collect()
    }

    /// Load saved watchpoints. Malformed lines are skipped with a warning.
    /// Returns how many lines decoded.
    pub fn add_from_strings<E, S>(&self, exec: &E, lines: &[S], parser: &dyn ConditionParser) -> usize
    where
        E: ExecutionContext + ?Sized,
        S: AsRef<str>,
    {
        let mut loaded = 0;
        for line in lines {
            match codec::decode_watchpoint(line.as_ref(), parser) {
                Ok(wp) => {
                    self.add(exec, wp);
                    loaded += 1;
                }
                Err(e) => log::warn!("skipping watchpoint: {e}"),
            }
        }
        loaded
    }

    fn exclusive<E, F>(&self, exec: &E, mutate: F)
    where
        E: ExecutionContext + ?Sized,
        F: FnOnce(&mut Vec<Watchpoint>) -> Outcome + Send + 'static,
    {
        let checks = self.checks.clone();
        let code_cache = self.code_cache.clone();
        let mmu = self.mmu.clone();

        exec.run_exclusive(Box::new(move || {
            // Release the table before calling out; the MMU reads it back.
            let outcome = mutate(&mut *checks.write());
            if let Outcome::Changed { clear_cache } = outcome {
                if clear_cache {
                    code_cache.clear_cache();
                }
                mmu.watch_config_changed();
            }
        }));
    }
}
