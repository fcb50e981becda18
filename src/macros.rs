//! Macro storage and expansion.
//!
//! This module holds the two tightly coupled halves of the macro system:
//! [`MacroTable`] stores raw (unexpanded) macro values together with their
//! source and read-only flag and mirrors environment-sourced macros into an
//! [`EnvironmentSink`]; the expansion engine in [`expand`] resolves `$`
//! invocations recursively with cycle detection, substitution modifiers,
//! and deferred filename macros.
//!
//! Values are stored exactly as written. Expansion happens when a value is
//! used, so `X = $(Y)` tracks later redefinitions of `Y`; the one exception
//! is a textual self-reference (`X = $(X) more`), which is replaced with the
//! current value at assignment time.

mod expand;
mod table;

pub use expand::FILENAME_MACRO_ESCAPE;
pub use table::{EnvironmentMap, EnvironmentSink, MacroSource, MacroTable};
