//! Whole-graph validation: cycle detection, timestamp propagation, and
//! inference-rule preselection.

use std::collections::HashSet;
use std::sync::Arc;

use time::OffsetDateTime;
use time::macros::datetime;

use crate::error::ParseError;
use crate::fsmeta::FileMetaProvider;
use crate::input::InputStream;
use crate::makefile::{InferenceRule, Makefile};

use super::Parser;

/// Floor for propagated timestamps of absent-file targets with dependents.
const PROPAGATION_EPOCH: OffsetDateTime = datetime!(1900-01-01 0:00 UTC);

/// Depth-first cycle check over the dependents reachable from `root`.
///
/// # Errors
///
/// Returns [`ParseError::TargetCycle`] when a target is re-entered while
/// still on the traversal stack.
pub(super) fn check_for_cycles(makefile: &Makefile, root: &str) -> Result<(), ParseError> {
    let mut detector = CycleDetector {
        makefile,
        on_stack: HashSet::new(),
    };
    detector.visit(root)
}

/// Marks nodes only while they are on the traversal stack, so a diamond
/// shared between independent targets is not misreported as a cycle.
struct CycleDetector<'a> {
    makefile: &'a Makefile,
    on_stack: HashSet<&'a str>,
}

impl<'a> CycleDetector<'a> {
    fn visit(&mut self, name: &'a str) -> Result<(), ParseError> {
        let Some(block) = self.makefile.target(name) else {
            return Ok(());
        };
        if !self.on_stack.insert(name) {
            return Err(ParseError::TargetCycle {
                target: name.to_owned(),
            });
        }
        for dependent in &block.dependents {
            self.visit(dependent)?;
        }
        self.on_stack.remove(name);
        Ok(())
    }
}

impl<S: InputStream, M: FileMetaProvider> Parser<S, M> {
    /// Give every target a valid timestamp.
    ///
    /// Targets whose file existed keep its modification time. Of the rest,
    /// leaves are stamped with the current time and inner nodes with the
    /// maximum of their dependents' (recursively propagated) stamps,
    /// starting from the 1900 epoch.
    pub(super) fn update_time_stamps(&mut self) {
        let now = OffsetDateTime::now_utc();
        for name in self.makefile.target_names() {
            self.update_time_stamp(&name, now);
        }
    }

    fn update_time_stamp(&mut self, name: &str, now: OffsetDateTime) {
        let Some(block) = self.makefile.target_mut(name) else {
            return;
        };
        if block.time_stamp.is_some() {
            return;
        }
        if block.dependents.is_empty() {
            block.time_stamp = Some(now);
            return;
        }

        // Stamping before the recursion keeps revisits finite.
        block.time_stamp = Some(PROPAGATION_EPOCH);
        let dependents = block.dependents.clone();
        for dependent in dependents {
            if self.makefile.target(&dependent).is_none() {
                continue;
            }
            self.update_time_stamp(&dependent, now);
            let dependent_stamp = self
                .makefile
                .target(&dependent)
                .and_then(|dep| dep.time_stamp);
            if let Some(block) = self.makefile.target_mut(name)
                && block.time_stamp < dependent_stamp
            {
                block.time_stamp = dependent_stamp;
            }
        }
    }

    /// Attach candidate inference rules to every commandless target
    /// reachable from the active targets, lazily creating dependent blocks
    /// when a rule matches them.
    pub(super) fn preselect_inference_rules(&mut self) {
        for name in self.active_targets.clone() {
            if let Some(block) = self.makefile.target(&name)
                && block.commands.is_empty()
            {
                let suffixes = Arc::clone(&block.suffixes);
                let rules = select_rules(&self.makefile, &name, &suffixes);
                if let Some(block) = self.makefile.target_mut(&name) {
                    block.inference_rules = rules;
                }
            }
            self.preselect_recursive(&name);
        }
    }

    fn preselect_recursive(&mut self, name: &str) {
        let Some(block) = self.makefile.target(name) else {
            return;
        };
        let parent_suffixes = Arc::clone(&block.suffixes);
        let dependents = block.dependents.clone();

        for dependent in dependents {
            // The dependent's own suffix list wins over the parent's, so
            // `.SUFFIXES` scoping is decided where the dependent was
            // declared.
            let suffixes = match self.makefile.target(&dependent) {
                Some(dep) => {
                    if !dep.commands.is_empty() {
                        self.preselect_recursive(&dependent);
                        continue;
                    }
                    Arc::clone(&dep.suffixes)
                }
                None => Arc::clone(&parent_suffixes),
            };

            let selected = select_rules(&self.makefile, &dependent, &suffixes);
            if self.makefile.target(&dependent).is_none() {
                if selected.is_empty() {
                    continue;
                }
                tracing::debug!(target = %dependent, "creating target for preselected rule");
                self.create_target(&dependent);
            }
            if let Some(dep) = self.makefile.target_mut(&dependent) {
                dep.inference_rules = selected;
            }
            self.preselect_recursive(&dependent);
        }
    }
}

/// Rules applicable to `target_name`: its name must end in one of the
/// scope's suffixes, the rule's target extension must match, and the
/// rule's target directory must equal the name's directory component.
fn select_rules(
    makefile: &Makefile,
    target_name: &str,
    suffixes: &[String],
) -> Vec<Arc<InferenceRule>> {
    if !suffixes.iter().any(|s| target_name.ends_with(s.as_str())) {
        return Vec::new();
    }
    makefile
        .inference_rules()
        .iter()
        .filter(|rule| {
            target_name.ends_with(&rule.to_extension)
                && directory_of(target_name) == rule.to_search_path
        })
        .cloned()
        .collect()
}

/// Directory component of a target name, `.` when there is none.
fn directory_of(target_name: &str) -> &str {
    match target_name.rfind(['/', '\\']) {
        Some(0) | None => ".",
        Some(idx) => &target_name[..idx],
    }
}
