//! Delimited-text row writer.
//!
//! Two dialects are supported:
//!
//! - **Escaped** (default, loads with Postgres `COPY ... (FORMAT text)`):
//!   `|` separated, no quoting, `\` before any delimiter, quote or escape
//!   character, and `\n` / `\r` for embedded line breaks.
//! - **Quoted**: every field wrapped in `"`, embedded quotes doubled.
//!
//! Rows are encoded into a scratch buffer before touching the output, so a
//! rejected row never leaves a partial line behind.

use std::io::{self, Write};

use thiserror::Error;

const QUOTE: char = '"';

/// Per-row write failure.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("field {field} contains {found:?}, which the dialect cannot represent without an escape character")]
    Unrepresentable { field: usize, found: char },

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Destination for delimited rows.
pub trait RowSink {
    /// Append one record.
    fn write_row(&mut self, fields: &[&str]) -> Result<(), SinkError>;

    /// Flush everything buffered so far.
    fn finish(&mut self) -> io::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quoting {
    /// Never quote; escape special characters instead.
    #[default]
    Never,
    /// Quote every field.
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    pub delimiter: char,
    pub escape: Option<char>,
    pub quoting: Quoting,
}

impl Default for Dialect {
    fn default() -> Self {
        Self {
            delimiter: '|',
            escape: Some('\\'),
            quoting: Quoting::Never,
        }
    }
}

impl Dialect {
    fn needs_escape(&self, c: char) -> bool {
        c == self.delimiter || c == QUOTE || c == '\n' || c == '\r' || Some(c) == self.escape
    }
}

/// Writes rows to any `Write` using a [`Dialect`].
pub struct DelimitedWriter<W: Write> {
    out: W,
    dialect: Dialect,
    line: String,
}

impl<W: Write> DelimitedWriter<W> {
    pub fn new(out: W, dialect: Dialect) -> Self {
        Self {
            out,
            dialect,
            line: String::with_capacity(256),
        }
    }

    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn encode_field(&mut self, index: usize, field: &str) -> Result<(), SinkError> {
        match self.dialect.quoting {
            Quoting::All => {
                self.line.push(QUOTE);
                for c in field.chars() {
                    if c == QUOTE {
                        self.line.push(QUOTE);
                    }
                    self.line.push(c);
                }
                self.line.push(QUOTE);
            }
            Quoting::Never => {
                for c in field.chars() {
                    if !self.dialect.needs_escape(c) {
                        self.line.push(c);
                        continue;
                    }
                    let Some(escape) = self.dialect.escape else {
                        return Err(SinkError::Unrepresentable { field: index, found: c });
                    };
                    self.line.push(escape);
                    self.line.push(match c {
                        '\n' => 'n',
                        '\r' => 'r',
                        other => other,
                    });
                }
            }
        }
        Ok(())
    }
}

impl<W: Write> RowSink for DelimitedWriter<W> {
    fn write_row(&mut self, fields: &[&str]) -> Result<(), SinkError> {
        self.line.clear();
        for (index, field) in fields.iter().enumerate() {
            if index > 0 {
                self.line.push(self.dialect.delimiter);
            }
            self.encode_field(index, field)?;
        }
        self.line.push('\n');
        self.out.write_all(self.line.as_bytes())?;
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(dialect: Dialect, rows: &[&[&str]]) -> String {
        let mut writer = DelimitedWriter::new(Vec::new(), dialect);
        for row in rows {
            writer.write_row(row).unwrap();
        }
        writer.finish().unwrap();
        String::from_utf8(writer.into_inner()).unwrap()
    }

    #[test]
    fn test_default_dialect_plain_fields() {
        let out = render(
            Dialect::default(),
            &[&["0", "http://e/o/#s", "http://e/o/p1", "v"]],
        );
        assert_eq!(out, "0|http://e/o/#s|http://e/o/p1|v\n");
    }

    #[test]
    fn test_default_dialect_escapes_specials() {
        let out = render(Dialect::default(), &[&["1", "a|b", "say \"hi\"", "x\\y\nz"]]);
        assert_eq!(out, "1|a\\|b|say \\\"hi\\\"|x\\\\y\\nz\n");
    }

    #[test]
    fn test_quoted_dialect_doubles_quotes() {
        let dialect = Dialect {
            delimiter: ',',
            escape: None,
            quoting: Quoting::All,
        };
        let out = render(dialect, &[&["0", "a,b", "say \"hi\""]]);
        assert_eq!(out, "\"0\",\"a,b\",\"say \"\"hi\"\"\"\n");
    }

    #[test]
    fn test_unrepresentable_field_rejects_whole_row() {
        let dialect = Dialect {
            delimiter: '|',
            escape: None,
            quoting: Quoting::Never,
        };
        let mut writer = DelimitedWriter::new(Vec::new(), dialect);
        writer.write_row(&["0", "fine"]).unwrap();

        let err = writer.write_row(&["1", "has|pipe"]).unwrap_err();
        assert!(matches!(err, SinkError::Unrepresentable { field: 1, found: '|' }));

        writer.write_row(&["2", "also fine"]).unwrap();
        let out = String::from_utf8(writer.into_inner()).unwrap();
        assert_eq!(out, "0|fine\n2|also fine\n");
    }
}
