//! Translates manifest parsing errors into actionable diagnostics.
//!
//! [`map_yaml_error`] wraps a `serde_saphyr` error in a [`miette`]
//! diagnostic that carries the manifest source, a span pointing at the
//! failure, and a hint for common YAML mistakes such as tab indentation.

use miette::{Diagnostic, NamedSource, SourceSpan};
use serde_saphyr::{Error as YamlError, Location};
use thiserror::Error;

const YAML_HINTS: [(&str, &str); 4] = [
    (
        "did not find expected '-'",
        "Start list items with '-' and ensure proper indentation.",
    ),
    (
        "mapping values are not allowed",
        "Check for a stray ':' or add quotes around values where needed.",
    ),
    (
        "unknown field",
        "Check the key against the manifest schema; unknown keys are rejected.",
    ),
    (
        "missing field",
        "Every command needs `name` and `command`; every target needs `name`.",
    ),
];

/// Display name for a manifest source used in diagnostics.
///
/// ```rust
/// use bffgen::manifest::ManifestName;
/// let name = ManifestName::new("bffgen.yml");
/// assert_eq!(name.as_str(), "bffgen.yml");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ManifestName(String);

impl ManifestName {
    /// Construct a diagnostic label describing the manifest being processed.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Access the label as a borrowed string slice.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Display for ManifestName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// Reconstruct the byte offset for a one-based line and column.
///
/// Offsets past the end of a line clamp to the line end; both `\n` and
/// `\r\n` line endings are accepted.
fn byte_index(src: &str, line: u64, column: u64) -> usize {
    let target_line = usize::try_from(line.saturating_sub(1)).unwrap_or(usize::MAX);
    let target_column = usize::try_from(column.saturating_sub(1)).unwrap_or(usize::MAX);
    let mut offset = 0usize;
    for (idx, segment) in src.split_inclusive('\n').enumerate() {
        if idx == target_line {
            let without_newline = segment.strip_suffix('\n').unwrap_or(segment);
            let cleaned = without_newline
                .strip_suffix('\r')
                .unwrap_or(without_newline);
            let column_offset = cleaned
                .char_indices()
                .nth(target_column)
                .map_or(cleaned.len(), |(byte_idx, _)| byte_idx);
            return offset + column_offset;
        }
        offset += segment.len();
    }
    src.len()
}

fn to_span(src: &str, loc: Location) -> SourceSpan {
    let at = byte_index(src, loc.line(), loc.column());
    let len = src
        .get(at..)
        .and_then(|rest| rest.chars().next())
        .filter(|c| *c != '\n' && *c != '\r')
        .map_or(0, char::len_utf8);
    SourceSpan::new(at.into(), len)
}

#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
#[diagnostic(code(bffgen::yaml::parse))]
struct YamlDiagnostic {
    #[source_code]
    src: NamedSource<String>,
    #[label("parse error here")]
    span: Option<SourceSpan>,
    #[help]
    help: Option<String>,
    #[source]
    source: YamlError,
    message: String,
}

fn starts_with_tab(line: &str) -> bool {
    line.chars()
        .take_while(|c| c.is_whitespace())
        .any(|c| c == '\t')
}

/// Whether a line up to the error location is indented with tabs. Without
/// a known location every line is considered.
fn has_tab_indent(src: &str, location: Option<Location>) -> bool {
    let last = location
        .map(|loc| loc.line())
        .filter(|line| *line > 0)
        .map_or(usize::MAX, |line| usize::try_from(line).unwrap_or(usize::MAX));
    src.lines().take(last).any(starts_with_tab)
}

fn hint_for(err_str: &str, src: &str, loc: Option<Location>) -> Option<String> {
    if has_tab_indent(src, loc) {
        return Some("Use spaces for indentation; tabs are invalid in YAML.".into());
    }
    let lower = err_str.to_lowercase();
    YAML_HINTS
        .iter()
        .find(|(needle, _)| lower.contains(*needle))
        .map(|(_, hint)| (*hint).into())
}

/// Map a `serde_saphyr` error into a [`miette`] diagnostic.
#[must_use]
pub fn map_yaml_error(
    err: YamlError,
    src: &str,
    name: &ManifestName,
) -> Box<dyn Diagnostic + Send + Sync + 'static> {
    let loc = err.location();
    let (line, col, span) = loc.map_or((1, 1, None), |l| {
        (l.line(), l.column(), Some(to_span(src, l)))
    });
    let err_str = err.to_string();
    let help = hint_for(&err_str, src, loc);
    Box::new(YamlDiagnostic {
        src: NamedSource::new(name.as_str(), src.to_owned()),
        span,
        help,
        source: err,
        message: format!("YAML parse error at line {line}, column {col}: {err_str}"),
    })
}
