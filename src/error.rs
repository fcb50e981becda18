//! Error types for macro expansion and makefile parsing.
//!
//! Two layers mirror the two subsystems: [`MacroError`] is raised by the
//! macro table and expander and carries no positional information, while
//! [`ParseError`] is raised by the parser, records the input line number
//! where one applies, and wraps macro failures encountered mid-parse.

use miette::Diagnostic;
use thiserror::Error;

/// Errors raised by the macro table and the expansion engine.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum MacroError {
    /// A `$(` invocation ran to the end of the string without a `)`.
    #[error("Macro invocation $( without closing ) found")]
    #[diagnostic(code(nmakefile::macros::unterminated_invocation))]
    UnterminatedInvocation,

    /// `$()` or `$(:...)`: nothing between the parenthesis and the end of
    /// the name.
    #[error("Macro name is missing from invocation")]
    #[diagnostic(code(nmakefile::macros::missing_name))]
    MissingName,

    /// A substitution invocation without a `=` separating `before` from
    /// `after`.
    #[error("Cannot find = after : in macro substitution.")]
    #[diagnostic(code(nmakefile::macros::bad_substitution))]
    BadSubstitution,

    /// `$` followed by a character that opens no known invocation form.
    #[error("Invalid macro invocation found")]
    #[diagnostic(code(nmakefile::macros::invalid_invocation))]
    InvalidInvocation,

    /// Recursive expansion re-entered a macro already being expanded.
    #[error("Cycle in macro detected when trying to invoke $({name}).")]
    #[diagnostic(code(nmakefile::macros::cycle))]
    Cycle {
        /// The macro whose re-entry closed the cycle.
        name: String,
    },

    /// An assignment used a name outside the accepted identifier shape.
    #[error("macro name {name} is invalid")]
    #[diagnostic(code(nmakefile::macros::invalid_name))]
    InvalidName {
        /// The offending (already expanded) name.
        name: String,
    },
}

/// Errors raised while parsing a makefile and validating the target graph.
#[derive(Debug, Error, Diagnostic)]
pub enum ParseError {
    /// A macro failure surfaced while expanding part of a line.
    #[error("line {line}: {source}")]
    #[diagnostic(code(nmakefile::parser::macro_error))]
    Macro {
        /// Input line number the expansion was triggered from.
        line: u32,
        /// The underlying macro failure.
        #[diagnostic_source]
        source: MacroError,
    },

    /// A line or construct the parser could not make sense of.
    #[error("line {line}: {message}")]
    #[diagnostic(code(nmakefile::parser::syntax))]
    Syntax {
        /// Input line number of the offending construct.
        line: u32,
        /// Description of what went wrong.
        message: String,
    },

    /// A target was declared with both `:` and `::` separators.
    #[error("line {line}: cannot have : and :: dependents for same target")]
    #[diagnostic(code(nmakefile::parser::dual_separator))]
    DualSeparator {
        /// Input line number of the conflicting declaration.
        line: u32,
        /// The target declared both ways.
        target: String,
    },

    /// The dependency graph reachable from an active target contains a
    /// cycle.
    #[error("cycle in targets detected: {target}")]
    #[diagnostic(code(nmakefile::parser::target_cycle))]
    TargetCycle {
        /// The target that was re-entered while still on the DFS stack.
        target: String,
    },

    /// An explicitly requested target never appeared in the makefile.
    #[error("Target {target} doesn't exist.")]
    #[diagnostic(code(nmakefile::parser::missing_active_target))]
    MissingActiveTarget {
        /// The requested target name.
        target: String,
    },
}

impl ParseError {
    /// Attach a line number to a [`MacroError`].
    #[must_use]
    pub fn from_macro(line: u32, source: MacroError) -> Self {
        Self::Macro { line, source }
    }
}
