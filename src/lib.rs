//! Breakpoint and watchpoint registry for an emulated CPU's debugger.
//!
//! Instruction breakpoints live in a [`BreakpointRegistry`], memory
//! watchpoints in a [`WatchpointRegistry`]. Both save to and load from a
//! one-line-per-record text form (see [`codec`]). The JIT, MMU and
//! execution thread are reached only through the traits in [`hooks`] and
//! [`exec`].

pub use crate::breakpoints::{Breakpoint, BreakpointRegistry};
pub use crate::condition::{ComparisonParser, Condition, ConditionParser, Expression, MachineState};
pub use crate::debugger::Debugger;
pub use crate::error::{Error, Result};
pub use crate::exec::{ExecutionContext, ExecutionHandle, ExecutionQueue, ExecutionThread, Inline};
pub use crate::hooks::{CodeCache, DebugInterface, MmuNotifier, NullHost};
pub use crate::session::Session;
pub use crate::trigger::{AccessKind, MemoryAccess, TriggerOutcome};
pub use crate::watchpoints::{Watchpoint, WatchpointRegistry};

// 他のモジュールをエクスポート
pub mod breakpoints;
pub mod codec;
pub mod condition;
pub mod debugger;
pub mod error;
pub mod exec;
pub mod hooks;
pub mod session;
pub mod trigger;
pub mod watchpoints;
