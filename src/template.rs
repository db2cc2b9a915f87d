//! Unit template parsing and rendering.
//!
//! The template is the text of a systemd unit file:
//!
//! ```text
//! [Unit]
//! Description=Per-machine agent
//!
//! [Service]
//! ExecStart=/usr/bin/agent \
//!     --verbose
//! ```
//!
//! It is parsed once at startup. Rendering for a machine clones the parsed
//! options and appends `X-Fleet/MachineID=<machine>` so fleet schedules the
//! unit on exactly that machine.

use thiserror::Error;

use crate::types::{MachineId, OptionSet, UnitOption};

/// Section of the option that pins a unit to a machine.
pub const FLEET_SECTION: &str = "X-Fleet";

/// Name of the option that pins a unit to a machine.
pub const MACHINE_ID_OPTION: &str = "MachineID";

/// Errors from parsing a unit template.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TemplateError {
    /// The template has no options at all.
    #[error("unit template is empty")]
    Empty,

    /// An option appeared before any `[Section]` header.
    #[error("line {line}: option outside of a section")]
    OptionOutsideSection { line: usize },

    /// A line that is neither a header, a comment, nor `Name=Value`.
    #[error("line {line}: expected `Name=Value`, got {text:?}")]
    MalformedLine { line: usize, text: String },

    /// A `[Section]` header with nothing between the brackets.
    #[error("line {line}: empty section name")]
    EmptySection { line: usize },
}

/// A parsed unit template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitTemplate {
    options: Vec<UnitOption>,
}

impl UnitTemplate {
    /// Parses unit-file text.
    ///
    /// Options keep file order, duplicates included.
    pub fn parse(text: &str) -> Result<Self, TemplateError> {
        let mut options = Vec::new();
        let mut section: Option<String> = None;

        for (line_no, line) in logical_lines(text) {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some(rest) = line.strip_prefix('[') {
                let name = rest.strip_suffix(']').ok_or_else(|| TemplateError::MalformedLine {
                    line: line_no,
                    text: line.to_string(),
                })?;
                let name = name.trim();
                if name.is_empty() {
                    return Err(TemplateError::EmptySection { line: line_no });
                }
                section = Some(name.to_string());
                continue;
            }

            let Some((name, value)) = line.split_once('=') else {
                return Err(TemplateError::MalformedLine {
                    line: line_no,
                    text: line.to_string(),
                });
            };

            let Some(ref current) = section else {
                return Err(TemplateError::OptionOutsideSection { line: line_no });
            };

            let name = name.trim();
            if name.is_empty() {
                return Err(TemplateError::MalformedLine {
                    line: line_no,
                    text: line.to_string(),
                });
            }

            options.push(UnitOption::new(current.as_str(), name, value.trim()));
        }

        if options.is_empty() {
            return Err(TemplateError::Empty);
        }

        Ok(UnitTemplate { options })
    }

    /// The parsed options, without the machine pin.
    pub fn options(&self) -> &[UnitOption] {
        &self.options
    }

    /// Renders the definition of the unit for `machine`.
    pub fn render(&self, machine: &MachineId) -> OptionSet {
        let mut options = OptionSet::new(self.options.clone());
        options.push(UnitOption::new(
            FLEET_SECTION,
            MACHINE_ID_OPTION,
            machine.as_str(),
        ));
        options
    }
}

/// Joins backslash-continued lines, yielding each logical line with the
/// 1-based number of its first physical line.
fn logical_lines(text: &str) -> Vec<(usize, String)> {
    let mut out = Vec::new();
    let mut pending: Option<(usize, String)> = None;

    for (idx, raw) in text.lines().enumerate() {
        let (continues, content) = match raw.trim_end().strip_suffix('\\') {
            Some(head) => (true, head),
            None => (false, raw),
        };

        let joined = match pending.take() {
            Some((start, mut acc)) => {
                acc.push(' ');
                acc.push_str(content.trim());
                (start, acc)
            }
            None => (idx + 1, content.trim_end().to_string()),
        };

        if continues {
            pending = Some(joined);
        } else {
            out.push(joined);
        }
    }

    if let Some(last) = pending {
        out.push(last);
    }

    out
}
