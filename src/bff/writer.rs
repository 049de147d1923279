//! Scoped, indentation-aware writer for the FASTBuild description language.
//!
//! [`BffWriter`] is append-only: it never reads back what it has written and
//! performs no escaping of its own. Callers hand it literals that are already
//! quoted (see [`super::escape`]); the writer only contributes structure,
//! meaning indentation, scope delimiters, and statement layout.
//!
//! The underlying stream is acquired lazily on the first write, so a writer
//! created with [`BffWriter::lazy`] never touches the filesystem unless
//! something is emitted.
//!
//! # Examples
//!
//! ```
//! use bffgen::bff::writer::BffWriter;
//!
//! let mut out = BffWriter::in_memory();
//! out.write_command("Alias", "'All'")?;
//! out.push_block()?;
//! out.write_array("Targets", &["'Debug'", "'Release'"])?;
//! out.pop_scope()?;
//! let text = String::from_utf8(out.finish()?.unwrap_or_default())?;
//! assert_eq!(
//!     text,
//!     "Alias('All')\n{\n\t.Targets = \n\t{\n\t\t'Debug',\n\t\t'Release'\n\t}\n}\n"
//! );
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::fmt::{self, Display, Formatter};
use std::io::{self, Write};

use miette::Diagnostic;
use thiserror::Error;

const INDENT: char = '\t';
const HORIZONTAL_RULE: &str =
    ";-------------------------------------------------------------------------------";

/// Errors raised while emitting a build description.
#[derive(Debug, Error, Diagnostic)]
pub enum EmitError {
    /// A scope was closed while none was open.
    #[error("cannot close a scope: no scope is open")]
    #[diagnostic(code(bffgen::emit::unbalanced_scope))]
    UnbalancedScope,
    /// The stream was closed with scopes still open.
    #[error("{depth} scope(s) still open when closing the stream")]
    #[diagnostic(code(bffgen::emit::unclosed_scopes))]
    UnclosedScopes {
        /// Number of scopes left open.
        depth: usize,
    },
    /// A previous attempt to open the stream failed.
    #[error("output stream is unavailable after a failed open")]
    #[diagnostic(code(bffgen::emit::stream_unavailable))]
    StreamUnavailable,
    /// The underlying stream rejected a write.
    #[error("failed to write build description")]
    #[diagnostic(code(bffgen::emit::io))]
    Io(#[from] io::Error),
}

/// Assignment operator used by variable statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Op {
    /// `=`: replace the value.
    #[default]
    Assign,
    /// `+`: append to the value.
    Append,
}

impl Display for Op {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Assign => "=",
            Self::Append => "+",
        })
    }
}

type Opener<W> = Box<dyn FnOnce() -> io::Result<W>>;

enum Stream<W> {
    Pending(Opener<W>),
    Open(W),
    Failed,
}

fn acquire<W>(stream: &mut Stream<W>) -> Result<&mut W, EmitError> {
    if matches!(stream, Stream::Pending(_))
        && let Stream::Pending(open) = std::mem::replace(stream, Stream::Failed)
    {
        *stream = Stream::Open(open()?);
    }
    match stream {
        Stream::Open(sink) => Ok(sink),
        Stream::Pending(_) | Stream::Failed => Err(EmitError::StreamUnavailable),
    }
}

/// Append-only writer that tracks indentation and open scopes.
pub struct BffWriter<W: Write> {
    stream: Stream<W>,
    line_prefix: String,
    closing: Vec<char>,
}

impl BffWriter<Vec<u8>> {
    /// Create a writer that collects output in memory.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Vec::new())
    }
}

impl<W: Write> BffWriter<W> {
    /// Wrap an already open stream.
    #[must_use]
    pub fn new(sink: W) -> Self {
        Self {
            stream: Stream::Open(sink),
            line_prefix: String::new(),
            closing: Vec::new(),
        }
    }

    /// Defer opening the stream until the first write.
    #[must_use]
    pub fn lazy(open: impl FnOnce() -> io::Result<W> + 'static) -> Self {
        Self {
            stream: Stream::Pending(Box::new(open)),
            line_prefix: String::new(),
            closing: Vec::new(),
        }
    }

    /// Whether the underlying stream has been acquired.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self.stream, Stream::Open(_))
    }

    /// Number of currently open scopes.
    #[must_use]
    pub const fn depth(&self) -> usize {
        self.closing.len()
    }

    fn line(&mut self, args: fmt::Arguments<'_>) -> Result<(), EmitError> {
        let sink = acquire(&mut self.stream)?;
        writeln!(sink, "{}{args}", self.line_prefix)?;
        Ok(())
    }

    fn raw_line(&mut self, args: fmt::Arguments<'_>) -> Result<(), EmitError> {
        let sink = acquire(&mut self.stream)?;
        writeln!(sink, "{args}")?;
        Ok(())
    }

    /// Write `open` on its own line and indent everything that follows until
    /// the matching [`pop_scope`](Self::pop_scope).
    ///
    /// # Errors
    ///
    /// Returns [`EmitError::Io`] if the stream rejects the write.
    pub fn push_scope(&mut self, open: char, close: char) -> Result<(), EmitError> {
        self.line(format_args!("{open}"))?;
        self.line_prefix.push(INDENT);
        self.closing.push(close);
        Ok(())
    }

    /// Open a `{` `}` block.
    ///
    /// # Errors
    ///
    /// Returns [`EmitError::Io`] if the stream rejects the write.
    pub fn push_block(&mut self) -> Result<(), EmitError> {
        self.push_scope('{', '}')
    }

    /// Open a `[` `]` struct.
    ///
    /// # Errors
    ///
    /// Returns [`EmitError::Io`] if the stream rejects the write.
    pub fn push_struct(&mut self) -> Result<(), EmitError> {
        self.push_scope('[', ']')
    }

    /// Close the innermost scope.
    ///
    /// # Errors
    ///
    /// Returns [`EmitError::UnbalancedScope`] when no scope is open, or
    /// [`EmitError::Io`] if the stream rejects the write.
    pub fn pop_scope(&mut self) -> Result<(), EmitError> {
        let close = self.closing.pop().ok_or(EmitError::UnbalancedScope)?;
        self.line_prefix.pop();
        self.line(format_args!("{close}"))
    }

    /// Write a `;` comment at the current indentation.
    ///
    /// # Errors
    ///
    /// Returns [`EmitError::Io`] if the stream rejects the write.
    pub fn write_comment(&mut self, comment: &str) -> Result<(), EmitError> {
        self.line(format_args!(";{comment}"))
    }

    /// Write an empty line.
    ///
    /// # Errors
    ///
    /// Returns [`EmitError::Io`] if the stream rejects the write.
    pub fn write_blank_line(&mut self) -> Result<(), EmitError> {
        self.raw_line(format_args!(""))
    }

    /// Write a full-width comment rule. Rules are never indented.
    ///
    /// # Errors
    ///
    /// Returns [`EmitError::Io`] if the stream rejects the write.
    pub fn write_horizontal_line(&mut self) -> Result<(), EmitError> {
        self.raw_line(format_args!("{HORIZONTAL_RULE}"))
    }

    /// Write a banner: blank line, rule, comment, rule.
    ///
    /// # Errors
    ///
    /// Returns [`EmitError::Io`] if the stream rejects the write.
    pub fn write_section_header(&mut self, section: &str) -> Result<(), EmitError> {
        self.write_blank_line()?;
        self.write_horizontal_line()?;
        self.write_comment(section)?;
        self.write_horizontal_line()
    }

    /// Write a preprocessor directive such as `once` or `include "base.bff"`.
    ///
    /// # Errors
    ///
    /// Returns [`EmitError::Io`] if the stream rejects the write.
    pub fn write_directive(&mut self, directive: &str) -> Result<(), EmitError> {
        self.raw_line(format_args!("#{directive}"))
    }

    /// Write a function call line, `Name(args)`, or a bare `Name` when
    /// `args` is empty.
    ///
    /// # Errors
    ///
    /// Returns [`EmitError::Io`] if the stream rejects the write.
    pub fn write_command(&mut self, command: &str, args: &str) -> Result<(), EmitError> {
        if args.is_empty() {
            self.line(format_args!("{command}"))
        } else {
            self.line(format_args!("{command}({args})"))
        }
    }

    /// Write the left-hand side of a statement whose value follows on the
    /// next lines, such as an array or struct.
    ///
    /// # Errors
    ///
    /// Returns [`EmitError::Io`] if the stream rejects the write.
    pub fn write_declaration(&mut self, key: &str, op: Op) -> Result<(), EmitError> {
        self.line(format_args!(".{key} {op} "))
    }

    /// Write `.key = value`.
    ///
    /// # Errors
    ///
    /// Returns [`EmitError::Io`] if the stream rejects the write.
    pub fn write_variable(&mut self, key: &str, value: &str) -> Result<(), EmitError> {
        self.write_variable_with(key, value, Op::Assign)
    }

    /// Write `.key <op> value`.
    ///
    /// # Errors
    ///
    /// Returns [`EmitError::Io`] if the stream rejects the write.
    pub fn write_variable_with(&mut self, key: &str, value: &str, op: Op) -> Result<(), EmitError> {
        self.line(format_args!(".{key} {op} {value}"))
    }

    /// Write `.key = true` or `.key = false`.
    ///
    /// # Errors
    ///
    /// Returns [`EmitError::Io`] if the stream rejects the write.
    pub fn write_bool(&mut self, key: &str, value: bool) -> Result<(), EmitError> {
        self.write_variable(key, if value { "true" } else { "false" })
    }

    /// Write `.key = { ... }` with one value per line.
    ///
    /// # Errors
    ///
    /// Returns [`EmitError::Io`] if the stream rejects the write.
    pub fn write_array<S: AsRef<str>>(&mut self, key: &str, values: &[S]) -> Result<(), EmitError> {
        self.write_array_with(key, values, Op::Assign)
    }

    /// Write `.key <op> { ... }` with one value per line.
    ///
    /// # Errors
    ///
    /// Returns [`EmitError::Io`] if the stream rejects the write.
    pub fn write_array_with<S: AsRef<str>>(
        &mut self,
        key: &str,
        values: &[S],
        op: Op,
    ) -> Result<(), EmitError> {
        self.write_declaration(key, op)?;
        self.push_block()?;
        let last = values.len().saturating_sub(1);
        for (idx, value) in values.iter().enumerate() {
            let sep = if idx == last { "" } else { "," };
            self.line(format_args!("{}{sep}", value.as_ref()))?;
        }
        self.pop_scope()
    }

    /// Close the stream and hand back the sink, or `None` if nothing was ever
    /// written.
    ///
    /// # Errors
    ///
    /// Returns [`EmitError::UnclosedScopes`] when scopes are still open, or
    /// [`EmitError::Io`] if the final flush fails.
    pub fn finish(self) -> Result<Option<W>, EmitError> {
        if !self.closing.is_empty() {
            return Err(EmitError::UnclosedScopes {
                depth: self.closing.len(),
            });
        }
        match self.stream {
            Stream::Open(mut sink) => {
                sink.flush()?;
                Ok(Some(sink))
            }
            Stream::Pending(_) => Ok(None),
            Stream::Failed => Err(EmitError::StreamUnavailable),
        }
    }
}
