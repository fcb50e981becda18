//! Command collection: prefixes, exit-code handling, and inline files.

use crate::error::ParseError;
use crate::fsmeta::FileMetaProvider;
use crate::input::InputStream;
use crate::makefile::{Command, InlineFile};
use crate::regex;

use super::Parser;

impl<S: InputStream, M: FileMetaProvider> Parser<S, M> {
    /// Try to read one command from the current line into `commands`.
    ///
    /// Blank lines between commands are skipped. Returns `false` when the
    /// current line is not a command (or the stream ended), leaving it in
    /// place for the dispatcher. Inference-rule commands are stored
    /// unexpanded; they are expanded at application time against the
    /// matched target.
    pub(super) fn parse_command(
        &mut self,
        commands: &mut Vec<Command>,
        inference_rule: bool,
    ) -> Result<bool, ParseError> {
        loop {
            match self.cursor.current() {
                None => return Ok(false),
                Some(line) if line.trim().is_empty() => self.cursor.advance(),
                Some(_) => break,
            }
        }
        let Some(line) = self.cursor.current().map(str::to_owned) else {
            return Ok(false);
        };
        if !line.starts_with(' ') && !line.starts_with('\t') {
            return Ok(false);
        }

        let cmd = self.make_command(line.trim(), inference_rule)?;
        commands.push(cmd);

        // The inline-file marker is searched in the raw line, before any
        // expansion.
        if let Some(caps) = regex!(r"<<\s*(\S*)").captures(&line) {
            let filename = caps.get(1).map_or("", |m| m.as_str()).to_owned();
            let Some(cmd) = commands.last_mut() else {
                return Ok(true);
            };
            self.parse_inline_file(cmd, filename)?;
        }

        Ok(true)
    }

    /// Build a [`Command`] from trimmed command text, applying the active
    /// silent/ignore modes and the `-`/`-N`/`@` prefixes.
    pub(super) fn make_command(
        &self,
        text: &str,
        inference_rule: bool,
    ) -> Result<Command, ParseError> {
        let mut cmd = Command {
            silent: self.silent_commands,
            max_exit_code: if self.ignore_exit_codes { 255 } else { 0 },
            ..Command::default()
        };
        cmd.command_line = if inference_rule {
            text.to_owned()
        } else {
            let line = self.cursor.line_number();
            self.makefile
                .macro_table()
                .expand(text)
                .map_err(|e| ParseError::from_macro(line, e))?
                .into_owned()
        };

        if let Some(rest) = cmd.command_line.strip_prefix('-') {
            let rest = rest.to_owned();
            cmd.max_exit_code = 255;
            // An exit-code bound may follow, up to the first whitespace.
            if let Some(idx) = rest.find([' ', '\t'])
                && let Ok(code) = rest[..idx].parse::<u8>()
            {
                cmd.max_exit_code = code;
                cmd.command_line = rest[idx + 1..].trim_start().to_owned();
            } else {
                cmd.command_line = rest;
            }
        } else if let Some(rest) = cmd.command_line.strip_prefix('@') {
            let rest = rest.to_owned();
            cmd.command_line = rest;
            cmd.silent = true;
        }

        Ok(cmd)
    }

    /// Read the body of a here-document up to a line beginning with `<<`.
    ///
    /// The terminator line stays current; the caller advances past it. Its
    /// remainder may carry `KEEP` and `UNICODE` options. A stream that
    /// ends before the terminator yields the content collected so far.
    fn parse_inline_file(&mut self, cmd: &mut Command, filename: String) -> Result<(), ParseError> {
        let mut inline = InlineFile {
            filename,
            ..InlineFile::default()
        };
        self.cursor.advance();
        while let Some(line) = self.cursor.current().map(str::to_owned) {
            if let Some(rest) = line.strip_prefix("<<") {
                let options: Vec<&str> = rest.split_whitespace().collect();
                inline.keep = options.contains(&"KEEP");
                inline.unicode = options.contains(&"UNICODE");
                break;
            }
            let line_no = self.cursor.line_number();
            let expanded = self
                .makefile
                .macro_table()
                .expand(line.trim())
                .map_err(|e| ParseError::from_macro(line_no, e))?;
            inline.content.push_str(&expanded);
            inline.content.push('\n');
            self.cursor.advance();
        }
        cmd.inline_file = Some(inline);
        Ok(())
    }
}
