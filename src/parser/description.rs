//! Description blocks: `targets : dependents` with attached commands.

use std::sync::Arc;

use crate::error::ParseError;
use crate::fsmeta::FileMetaProvider;
use crate::input::InputStream;
use crate::makefile::AddCommandsState;

use super::Parser;

impl<S: InputStream, M: FileMetaProvider> Parser<S, M> {
    /// Parse the current line as a description block plus its command
    /// lines.
    ///
    /// Both sides of the separator are macro-expanded, the dependents side
    /// in dependents-line mode so `$$@` survives as an escaped filename
    /// macro. A command may follow the dependents after `;`; further
    /// commands come from subsequent lines led by a space or tab. A blank
    /// line directly after the header ends command collection.
    pub(super) fn parse_description_block(
        &mut self,
        line: &str,
        separator_pos: usize,
        separator_len: usize,
    ) -> Result<(), ParseError> {
        let line_no = self.cursor.line_number();
        let target_side = line[..separator_pos].trim();
        let rest = line[separator_pos + separator_len..].trim();
        let (deps_side, semicolon_command) = match rest.split_once(';') {
            Some((deps, command)) => (deps.trim(), Some(command.trim())),
            None => (rest, None),
        };

        let table = self.makefile.macro_table();
        let targets_text = table
            .expand(target_side)
            .map_err(|e| ParseError::from_macro(line_no, e))?
            .into_owned();
        let deps_text = table
            .expand_in_dependents_line(deps_side)
            .map_err(|e| ParseError::from_macro(line_no, e))?
            .into_owned();

        let mut commands = Vec::new();
        if let Some(text) = semicolon_command
            && !text.is_empty()
        {
            commands.push(self.make_command(text, false)?);
        }

        self.cursor.advance();
        if self.cursor.current().is_none_or(|l| l.trim().is_empty()) {
            self.cursor.advance();
        } else {
            while self.parse_command(&mut commands, false)? {
                self.cursor.advance();
            }
        }

        let targets: Vec<String> = targets_text.split_whitespace().map(str::to_owned).collect();
        let dependents: Vec<String> = deps_text.split_whitespace().map(str::to_owned).collect();
        let mode = if separator_len > 1 {
            AddCommandsState::Enabled
        } else {
            AddCommandsState::Disabled
        };

        for target in &targets {
            if self.makefile.target(target).is_none() {
                self.create_target(target);
                if let Some(block) = self.makefile.target_mut(target) {
                    block.can_add_commands = mode;
                    block.dependents = dependents.clone();
                    block.commands = commands.clone();
                }
            } else {
                let suffixes = Arc::clone(&self.suffixes);
                let Some(block) = self.makefile.target_mut(target) else {
                    continue;
                };
                if block.can_add_commands != AddCommandsState::Unknown
                    && block.can_add_commands != mode
                {
                    return Err(ParseError::DualSeparator {
                        line: line_no,
                        target: target.clone(),
                    });
                }
                block.can_add_commands = mode;
                block.dependents = dependents.clone();
                block.suffixes = suffixes;
                if mode == AddCommandsState::Enabled {
                    block.commands.extend(commands.iter().cloned());
                } else {
                    block.commands = commands.clone();
                }
            }
            self.expand_block_commands(target)?;
        }
        Ok(())
    }

    /// Second expansion pass over a block's commands, picking up macros
    /// defined since the commands were collected.
    fn expand_block_commands(&mut self, target: &str) -> Result<(), ParseError> {
        let line_no = self.cursor.line_number();
        let Some(block) = self.makefile.target_mut(target) else {
            return Ok(());
        };
        let mut commands = std::mem::take(&mut block.commands);
        let mut failure = None;
        for cmd in &mut commands {
            match self.makefile.macro_table().expand(&cmd.command_line) {
                Ok(expanded) => cmd.command_line = expanded.into_owned(),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }
        if let Some(block) = self.makefile.target_mut(target) {
            block.commands = commands;
        }
        failure.map_or(Ok(()), |e| Err(ParseError::from_macro(line_no, e)))
    }
}
