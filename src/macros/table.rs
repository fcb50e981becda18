//! The macro table: storage, sources, and environment mirroring.

use std::borrow::Cow;
use std::collections::HashMap;
use std::io::{self, Write};

use indexmap::IndexMap;

use crate::error::MacroError;
use crate::regex;

use super::expand;

/// Where a macro definition came from.
///
/// The source decides overwrite rules and whether mutations mirror into the
/// environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacroSource {
    /// Defined by an assignment line in a makefile.
    MakeFile,
    /// Defined on the command line; read-only.
    CommandLine,
    /// Derived from command-line state rather than written by the user.
    CommandLineImplicit,
    /// Imported from the process environment; mutations mirror back.
    Environment,
    /// Built-in definition seeded before parsing.
    Predefinition,
}

/// Receives the expanded values of environment-sourced macros.
///
/// The executor later reads the accumulated variables when spawning
/// commands, so the sink is readable as well as writable.
pub trait EnvironmentSink: std::fmt::Debug {
    /// Set `name` to `value`, replacing any previous value.
    fn set(&mut self, name: &str, value: &str);

    /// Current value of `name`, if set.
    fn get(&self, name: &str) -> Option<&str>;
}

/// In-memory [`EnvironmentSink`] preserving insertion order.
#[derive(Debug, Default)]
pub struct EnvironmentMap {
    vars: IndexMap<String, String>,
}

impl EnvironmentMap {
    /// Iterate over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl EnvironmentSink for EnvironmentMap {
    fn set(&mut self, name: &str, value: &str) {
        self.vars.insert(name.to_owned(), value.to_owned());
    }

    fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }
}

#[derive(Debug)]
struct MacroData {
    value: String,
    source: MacroSource,
    read_only: bool,
}

impl Default for MacroData {
    fn default() -> Self {
        Self {
            value: String::new(),
            source: MacroSource::MakeFile,
            read_only: false,
        }
    }
}

/// Stores macros by name and keeps environment-sourced ones in sync with
/// an [`EnvironmentSink`].
#[derive(Debug)]
pub struct MacroTable {
    macros: HashMap<String, MacroData>,
    environment: Box<dyn EnvironmentSink>,
}

impl Default for MacroTable {
    fn default() -> Self {
        Self::new()
    }
}

impl MacroTable {
    /// An empty table mirroring into an [`EnvironmentMap`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_environment(Box::new(EnvironmentMap::default()))
    }

    /// An empty table mirroring into the given sink.
    #[must_use]
    pub fn with_environment(environment: Box<dyn EnvironmentSink>) -> Self {
        Self {
            macros: HashMap::new(),
            environment,
        }
    }

    /// The environment the table mirrors into.
    #[must_use]
    pub fn environment(&self) -> &dyn EnvironmentSink {
        self.environment.as_ref()
    }

    /// Raw (unexpanded) value of `name`, empty if undefined.
    #[must_use]
    pub fn value(&self, name: &str) -> &str {
        self.macros.get(name).map_or("", |data| data.value.as_str())
    }

    /// Whether `name` is defined.
    #[must_use]
    pub fn is_defined(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    /// Source of `name`, if defined.
    #[must_use]
    pub fn source(&self, name: &str) -> Option<MacroSource> {
        self.macros.get(name).map(|data| data.source)
    }

    /// Remove `name` from the table. The mirrored environment variable, if
    /// any, is left in place for the executor.
    pub fn undefine(&mut self, name: &str) {
        self.macros.remove(name);
    }

    /// Define or update a macro from a makefile assignment.
    ///
    /// The name is expanded before validation and the value is stored as
    /// given. A macro whose existing source is [`MacroSource::Environment`]
    /// stays environment-sourced and the sink is refreshed with the
    /// expansion of its new value.
    ///
    /// # Errors
    ///
    /// Returns [`MacroError::InvalidName`] when the expanded name does not
    /// match the identifier shape, or any expansion failure from the name
    /// or the environment refresh.
    pub fn set(&mut self, name: &str, value: &str) -> Result<(), MacroError> {
        self.set_impl(name, value, MacroSource::MakeFile)
    }

    /// Define a built-in macro before parsing starts.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`MacroTable::set`].
    pub fn predefine(&mut self, name: &str, value: &str) -> Result<(), MacroError> {
        self.set_impl(name, value, MacroSource::Predefinition)
    }

    /// Define a read-only macro from the command line, overwriting any
    /// existing definition.
    ///
    /// # Errors
    ///
    /// Returns [`MacroError::InvalidName`] for a malformed name.
    pub fn set_command_line(&mut self, name: &str, value: &str) -> Result<(), MacroError> {
        self.set_command_line_impl(name, value, MacroSource::CommandLine)
    }

    /// Like [`MacroTable::set_command_line`] for macros derived from
    /// command-line state rather than written by the user.
    ///
    /// # Errors
    ///
    /// Returns [`MacroError::InvalidName`] for a malformed name.
    pub fn set_command_line_implicit(&mut self, name: &str, value: &str) -> Result<(), MacroError> {
        self.set_command_line_impl(name, value, MacroSource::CommandLineImplicit)
    }

    /// Define a macro from an environment variable.
    ///
    /// The name is upper-cased. An existing command-line macro of that name
    /// is promoted to environment-sourced with its current value mirrored;
    /// an existing macro of any other source is left untouched. A new entry
    /// whose value fails to expand is not created at all; this matches the
    /// documented NMAKE handling of values like `PROMPT=$+$P$_$G` and is
    /// the only silently swallowed failure in the crate.
    pub fn set_environment(&mut self, name: &str, value: &str, read_only: bool) {
        let upper = name.to_uppercase();
        if let Some(data) = self.macros.get_mut(&upper) {
            if data.source == MacroSource::CommandLine {
                data.source = MacroSource::Environment;
                let raw = data.value.clone();
                if let Ok(expanded) = self.expand(&raw) {
                    self.environment.set(&upper, &expanded);
                }
            }
            return;
        }

        // The macro gets the unexpanded value, the environment variable the
        // expanded one.
        let Ok(expanded) = self.expand(value) else {
            tracing::debug!(name = %upper, "dropping environment macro with unexpandable value");
            return;
        };
        if self.internal_set(&upper, value, false).is_err() {
            return;
        }
        if let Some(data) = self.macros.get_mut(&upper) {
            data.source = MacroSource::Environment;
            data.read_only = read_only;
        }
        self.environment.set(&upper, &expanded);
    }

    /// Import every variable of the process environment via
    /// [`MacroTable::set_environment`].
    pub fn seed_from_env(&mut self) {
        for (name, value) in std::env::vars() {
            self.set_environment(&name, &value, false);
        }
    }

    /// Expand all macro invocations in `text`.
    ///
    /// Returns the input unchanged (borrowed) when it contains no `$`.
    ///
    /// # Errors
    ///
    /// Any [`MacroError`] raised by the expansion engine.
    pub fn expand<'a>(&self, text: &'a str) -> Result<Cow<'a, str>, MacroError> {
        expand::expand(self, text, false)
    }

    /// Expand `text` as the dependents side of a description block, where
    /// `$$@` escapes a filename macro instead of collapsing to `$@`.
    ///
    /// # Errors
    ///
    /// Any [`MacroError`] raised by the expansion engine.
    pub fn expand_in_dependents_line<'a>(&self, text: &'a str) -> Result<Cow<'a, str>, MacroError> {
        expand::expand(self, text, true)
    }

    /// Write `NAME = value` lines for every macro, in table order.
    ///
    /// # Errors
    ///
    /// Propagates write failures.
    pub fn dump(&self, w: &mut impl Write) -> io::Result<()> {
        for (name, data) in &self.macros {
            writeln!(w, "{name} = {}", data.value)?;
        }
        Ok(())
    }

    fn set_impl(&mut self, name: &str, value: &str, source: MacroSource) -> Result<(), MacroError> {
        let key = self.internal_set(name, value, false)?;
        let env_value = match self.macros.get_mut(&key) {
            Some(data) if data.source == MacroSource::Environment => data.value.clone(),
            Some(data) => {
                data.source = source;
                return Ok(());
            }
            None => return Ok(()),
        };
        let expanded = self.expand(&env_value)?.into_owned();
        self.environment.set(&key, &expanded);
        Ok(())
    }

    fn set_command_line_impl(
        &mut self,
        name: &str,
        value: &str,
        source: MacroSource,
    ) -> Result<(), MacroError> {
        let key = self.internal_set(name, value, true)?;
        if let Some(data) = self.macros.get_mut(&key) {
            data.source = source;
            data.read_only = true;
        }
        Ok(())
    }

    /// Store `value` under the expanded `name`, honouring the read-only
    /// flag unless `ignore_read_only`. Returns the storage key.
    fn internal_set(
        &mut self,
        name: &str,
        value: &str,
        ignore_read_only: bool,
    ) -> Result<String, MacroError> {
        let expanded_name = self.expand(name)?.into_owned();
        if !is_macro_name_valid(&expanded_name) {
            return Err(MacroError::InvalidName {
                name: expanded_name,
            });
        }

        // `X = $(X) more` freezes the self-reference at the current value.
        // The lookup only happens when the token is actually present.
        let token = format!("$({expanded_name})");
        let new_value = if value.contains(&token) {
            value.replace(&token, self.value(&expanded_name))
        } else {
            value.to_owned()
        };

        let data = self.macros.entry(expanded_name.clone()).or_default();
        if ignore_read_only || !data.read_only {
            data.value = new_value;
        }
        Ok(expanded_name)
    }
}

fn is_macro_name_valid(name: &str) -> bool {
    regex!(r"^[A-Za-z_][A-Za-z0-9_.]*$").is_match(name)
}
