//! The build graph data model.
//!
//! A parsed makefile is a set of [`DescriptionBlock`] targets in first-seen
//! order, a list of [`InferenceRule`] templates in declaration order, the
//! precious-target set, and the macro table the parse ran against. The
//! graph carries everything a downstream executor needs; nothing here
//! executes commands.

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use time::OffsetDateTime;

use crate::macros::MacroTable;

/// A single command line attached to a target or inference rule.
#[derive(Debug, Clone, Default)]
pub struct Command {
    /// The command text as it will be handed to the shell.
    pub command_line: String,
    /// Highest exit code that still counts as success; 255 means the exit
    /// code is ignored entirely.
    pub max_exit_code: u8,
    /// Suppress echoing of the command line.
    pub silent: bool,
    /// Here-document attached to this command, if any.
    pub inline_file: Option<InlineFile>,
}

/// A here-document delimited by `<<` markers.
#[derive(Debug, Clone, Default)]
pub struct InlineFile {
    /// Name the file is written under; empty for a generated temporary.
    pub filename: String,
    /// File content, one line per source line, macro-expanded.
    pub content: String,
    /// Keep the file after the command finishes.
    pub keep: bool,
    /// Write the file as Unicode.
    pub unicode: bool,
}

/// Whether a target accepts additional commands from later description
/// blocks.
///
/// `Enabled` corresponds to the `::` separator. Once a target has been
/// declared one way the state is fixed; a conflicting later declaration is
/// an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddCommandsState {
    /// No declaration seen yet.
    #[default]
    Unknown,
    /// Declared with `::`; later blocks append commands.
    Enabled,
    /// Declared with `:`; later blocks replace commands.
    Disabled,
}

/// A build target with its dependents and commands.
#[derive(Debug, Clone)]
pub struct DescriptionBlock {
    /// Target name as written in the makefile.
    pub target: String,
    /// Dependent names in source order.
    pub dependents: Vec<String>,
    /// Commands in source order.
    pub commands: Vec<Command>,
    /// Separator mode the target was declared with.
    pub can_add_commands: AddCommandsState,
    /// Whether a file of this name existed when the target was registered.
    pub file_exists: bool,
    /// Valid after timestamp propagation; before that, only set for
    /// targets whose file existed.
    pub time_stamp: Option<OffsetDateTime>,
    /// The suffix list in effect when this target was last declared.
    /// Shared; `.SUFFIXES` mutations rebind the parser's copy without
    /// touching captured ones.
    pub suffixes: Arc<Vec<String>>,
    /// Inference rules preselected for this target, in declaration order.
    pub inference_rules: Vec<Arc<InferenceRule>>,
}

impl DescriptionBlock {
    /// A fresh block for `target` carrying the given suffix list.
    #[must_use]
    pub fn new(target: String, suffixes: Arc<Vec<String>>) -> Self {
        Self {
            target,
            dependents: Vec::new(),
            commands: Vec::new(),
            can_add_commands: AddCommandsState::Unknown,
            file_exists: false,
            time_stamp: None,
            suffixes,
            inference_rules: Vec::new(),
        }
    }
}

/// A generic recipe keyed on source and target extensions with optional
/// search directories.
///
/// Equality ignores the command list: a newly parsed rule with the same
/// four-tuple replaces an existing one.
#[derive(Debug, Clone, Default)]
pub struct InferenceRule {
    /// Directory searched for the source file; `.` when unspecified.
    pub from_search_path: String,
    /// Extension of the source file, including the dot.
    pub from_extension: String,
    /// Directory the target is built into; `.` when unspecified.
    pub to_search_path: String,
    /// Extension of the target, including the dot.
    pub to_extension: String,
    /// Declared with `::`; multiple inputs may be processed together.
    pub batch_mode: bool,
    /// Commands, stored unexpanded until the rule is applied to a target.
    pub commands: Vec<Command>,
}

impl PartialEq for InferenceRule {
    fn eq(&self, other: &Self) -> bool {
        self.from_search_path == other.from_search_path
            && self.from_extension == other.from_extension
            && self.to_search_path == other.to_search_path
            && self.to_extension == other.to_extension
    }
}

impl Eq for InferenceRule {}

/// The parsed build graph.
#[derive(Debug)]
pub struct Makefile {
    targets: IndexMap<String, DescriptionBlock>,
    inference_rules: Vec<Arc<InferenceRule>>,
    precious_targets: IndexSet<String>,
    macro_table: MacroTable,
}

impl Makefile {
    /// An empty makefile bound to `macro_table`.
    #[must_use]
    pub fn new(macro_table: MacroTable) -> Self {
        Self {
            targets: IndexMap::new(),
            inference_rules: Vec::new(),
            precious_targets: IndexSet::new(),
            macro_table,
        }
    }

    /// The block for `name`, if one was declared or inferred.
    #[must_use]
    pub fn target(&self, name: &str) -> Option<&DescriptionBlock> {
        self.targets.get(name)
    }

    pub(crate) fn target_mut(&mut self, name: &str) -> Option<&mut DescriptionBlock> {
        self.targets.get_mut(name)
    }

    /// The first target declared in the makefile.
    #[must_use]
    pub fn first_target(&self) -> Option<&DescriptionBlock> {
        self.targets.first().map(|(_, block)| block)
    }

    /// All targets in first-seen order.
    pub fn targets(&self) -> impl Iterator<Item = &DescriptionBlock> {
        self.targets.values()
    }

    pub(crate) fn target_names(&self) -> Vec<String> {
        self.targets.keys().cloned().collect()
    }

    /// Register a block under its target name. First registration fixes
    /// the target's position in iteration order; re-registration keeps the
    /// existing block.
    pub(crate) fn append(&mut self, block: DescriptionBlock) -> &mut DescriptionBlock {
        self.targets.entry(block.target.clone()).or_insert(block)
    }

    /// Inference rules in declaration order (modulo replacement).
    #[must_use]
    pub fn inference_rules(&self) -> &[Arc<InferenceRule>] {
        &self.inference_rules
    }

    /// Replace an equal rule (same four-tuple) or append a new one, so the
    /// last declaration wins while non-replacements keep their order.
    pub(crate) fn add_inference_rule(&mut self, rule: InferenceRule) {
        if let Some(idx) = self.inference_rules.iter().position(|r| **r == rule) {
            self.inference_rules.remove(idx);
        }
        self.inference_rules.push(Arc::new(rule));
    }

    /// Targets that must not be deleted when a build fails.
    #[must_use]
    pub fn precious_targets(&self) -> &IndexSet<String> {
        &self.precious_targets
    }

    pub(crate) fn add_precious_target(&mut self, name: &str) {
        self.precious_targets.insert(name.to_owned());
    }

    /// The macro table the makefile was parsed against.
    #[must_use]
    pub fn macro_table(&self) -> &MacroTable {
        &self.macro_table
    }

    /// Mutable access to the macro table.
    pub fn macro_table_mut(&mut self) -> &mut MacroTable {
        &mut self.macro_table
    }

    /// Drop all targets, rules, and precious names, keeping the macro
    /// table.
    pub fn clear(&mut self) {
        self.targets.clear();
        self.inference_rules.clear();
        self.precious_targets.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(from: &str, from_ext: &str, to: &str, to_ext: &str) -> InferenceRule {
        InferenceRule {
            from_search_path: from.into(),
            from_extension: from_ext.into(),
            to_search_path: to.into(),
            to_extension: to_ext.into(),
            batch_mode: false,
            commands: Vec::new(),
        }
    }

    #[test]
    fn rule_equality_ignores_commands() {
        let mut a = rule("src", ".c", "obj", ".obj");
        let b = rule("src", ".c", "obj", ".obj");
        a.commands.push(Command {
            command_line: "cl /c".into(),
            ..Command::default()
        });
        assert_eq!(a, b);
        assert_ne!(a, rule("src", ".cpp", "obj", ".obj"));
    }

    #[test]
    fn redeclared_rule_replaces_but_keeps_position_of_others() {
        let mut makefile = Makefile::new(MacroTable::new());
        makefile.add_inference_rule(rule(".", ".c", ".", ".obj"));
        makefile.add_inference_rule(rule(".", ".cpp", ".", ".obj"));
        let mut updated = rule(".", ".c", ".", ".obj");
        updated.batch_mode = true;
        makefile.add_inference_rule(updated);

        let rules = makefile.inference_rules();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].from_extension, ".cpp");
        assert_eq!(rules[1].from_extension, ".c");
        assert!(rules[1].batch_mode);
    }

    #[test]
    fn targets_iterate_in_first_seen_order() {
        let suffixes = Arc::new(Vec::new());
        let mut makefile = Makefile::new(MacroTable::new());
        makefile.append(DescriptionBlock::new("all".into(), Arc::clone(&suffixes)));
        makefile.append(DescriptionBlock::new("clean".into(), Arc::clone(&suffixes)));
        makefile.append(DescriptionBlock::new("install".into(), suffixes));

        let names: Vec<&str> = makefile.targets().map(|b| b.target.as_str()).collect();
        assert_eq!(names, vec!["all", "clean", "install"]);
        assert_eq!(makefile.first_target().map(|b| b.target.as_str()), Some("all"));
    }

    #[test]
    fn clear_keeps_the_macro_table() {
        let mut table = MacroTable::new();
        table.set("A", "1").expect("set");
        let mut makefile = Makefile::new(table);
        makefile.append(DescriptionBlock::new("all".into(), Arc::new(Vec::new())));
        makefile.add_inference_rule(rule(".", ".c", ".", ".obj"));
        makefile.add_precious_target("all");

        makefile.clear();
        assert!(makefile.first_target().is_none());
        assert!(makefile.inference_rules().is_empty());
        assert!(makefile.precious_targets().is_empty());
        assert_eq!(makefile.macro_table().value("A"), "1");
    }

    #[test]
    fn precious_targets_deduplicate_preserving_order() {
        let mut makefile = Makefile::new(MacroTable::new());
        makefile.add_precious_target("lib.dll");
        makefile.add_precious_target("app.exe");
        makefile.add_precious_target("lib.dll");
        let names: Vec<&str> = makefile.precious_targets().iter().map(String::as_str).collect();
        assert_eq!(names, vec!["lib.dll", "app.exe"]);
    }
}
