//! N-Triples Line Parser
//!
//! Parses one input line into zero or more statements:
//!
//! ```text
//! <subject> <predicate> <object> .            # IRI object
//! _:b0 <predicate> "lexical"@en .             # language-tagged literal
//! <subject> <predicate> "42"^^<xsd:int> .     # typed literal
//! ```
//!
//! Blank lines and `#` comment lines yield no statements. Several statements
//! on one line are accepted. Escape sequences are kept raw while scanning
//! and only decoded when a statement is rendered ([`Statement::to_triple`]),
//! so a bad escape rejects its own statement rather than the whole line.

use std::fmt;

use thiserror::Error;

use crate::types::{ObjectAnnotation, Triple};

/// Whole-line syntax error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at column {column}")]
pub struct ParseError {
    /// 1-based character column.
    pub column: usize,
    pub message: String,
}

/// Failure rendering a single term of an otherwise well-formed statement.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TermError {
    #[error("unknown escape sequence '\\{0}'")]
    UnknownEscape(char),

    #[error("malformed escape sequence '{0}'")]
    MalformedEscape(String),

    #[error("escape sequence encodes invalid code point U+{0:04X}")]
    InvalidCodePoint(u32),
}

/// Parser contract used by pipeline workers.
///
/// Each worker owns its own instance, so implementations may keep scratch
/// state between calls but must not share it across instances.
pub trait TripleParser: Send {
    /// Parse one raw line (without terminator) into statements.
    fn parse(&mut self, line: &str) -> Result<Vec<Statement>, ParseError>;
}

// ============================================================================
// Terms and Statements
// ============================================================================

/// Datatype or language suffix of a literal, as written in the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiteralSuffix {
    None,
    Language(String),
    /// Raw datatype IRI (escapes not yet decoded).
    Datatype(String),
}

/// One term with its escapes still encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    Iri(String),
    BlankNode(String),
    Literal { lexical: String, suffix: LiteralSuffix },
}

impl Term {
    /// Render the term as a column value.
    ///
    /// IRIs lose their angle brackets, blank nodes keep their `_:` prefix,
    /// literals become their decoded lexical form.
    pub fn render(&self) -> Result<String, TermError> {
        match self {
            Self::Iri(raw) => unescape(raw),
            Self::BlankNode(label) => Ok(format!("_:{label}")),
            Self::Literal { lexical, .. } => unescape(lexical),
        }
    }

    fn annotation(&self) -> Result<ObjectAnnotation, TermError> {
        match self {
            Self::Literal {
                suffix: LiteralSuffix::Language(tag),
                ..
            } => Ok(ObjectAnnotation::Language(tag.clone())),
            Self::Literal {
                suffix: LiteralSuffix::Datatype(raw),
                ..
            } => Ok(ObjectAnnotation::Datatype(unescape(raw)?)),
            _ => Ok(ObjectAnnotation::None),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Iri(raw) => write!(f, "<{raw}>"),
            Self::BlankNode(label) => write!(f, "_:{label}"),
            Self::Literal { lexical, suffix } => {
                write!(f, "\"{lexical}\"")?;
                match suffix {
                    LiteralSuffix::None => Ok(()),
                    LiteralSuffix::Language(tag) => write!(f, "@{tag}"),
                    LiteralSuffix::Datatype(raw) => write!(f, "^^<{raw}>"),
                }
            }
        }
    }
}

/// A parsed but not yet rendered statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
}

impl Statement {
    /// Decode every term into a [`Triple`].
    pub fn to_triple(&self) -> Result<Triple, TermError> {
        Ok(Triple {
            subject: self.subject.render()?,
            predicate: self.predicate.render()?,
            object: self.object.render()?,
            annotation: self.object.annotation()?,
        })
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} .", self.subject, self.predicate, self.object)
    }
}

// ============================================================================
// Parser
// ============================================================================

/// Stateless N-Triples line parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct NTriplesParser;

impl NTriplesParser {
    pub fn new() -> Self {
        Self
    }
}

impl TripleParser for NTriplesParser {
    fn parse(&mut self, line: &str) -> Result<Vec<Statement>, ParseError> {
        let mut cursor = Cursor::new(line);
        let mut statements = Vec::new();

        loop {
            cursor.skip_whitespace();
            match cursor.peek() {
                None | Some('#') => break,
                Some(_) => statements.push(cursor.statement()?),
            }
        }

        Ok(statements)
    }
}

/// Characters that may not appear unescaped inside an IRI.
fn is_forbidden_in_iri(c: char) -> bool {
    matches!(c, ' ' | '<' | '"' | '{' | '}' | '|' | '^' | '`') || c.is_control()
}

fn is_blank_label_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':')
}

struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn column(&self) -> usize {
        self.text[..self.pos].chars().count() + 1
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            column: self.column(),
            message: message.into(),
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(' ' | '\t' | '\r' | '\n')) {
            self.bump();
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), ParseError> {
        match self.peek() {
            Some(c) if c == expected => {
                self.bump();
                Ok(())
            }
            Some(c) => Err(self.error(format!("expected '{expected}', found '{c}'"))),
            None => Err(self.error(format!("expected '{expected}', found end of line"))),
        }
    }

    fn statement(&mut self) -> Result<Statement, ParseError> {
        let subject = match self.peek() {
            Some('<') => self.iri()?,
            Some('_') => self.blank_node()?,
            _ => return Err(self.error("expected IRI or blank node as subject")),
        };

        self.skip_whitespace();
        let predicate = match self.peek() {
            Some('<') => self.iri()?,
            _ => return Err(self.error("expected IRI as predicate")),
        };

        self.skip_whitespace();
        let object = match self.peek() {
            Some('<') => self.iri()?,
            Some('_') => self.blank_node()?,
            Some('"') => self.literal()?,
            _ => return Err(self.error("expected IRI, blank node or literal as object")),
        };

        self.skip_whitespace();
        self.expect('.')?;

        Ok(Statement {
            subject,
            predicate,
            object,
        })
    }

    fn iri(&mut self) -> Result<Term, ParseError> {
        self.iri_text().map(Term::Iri)
    }

    fn iri_text(&mut self) -> Result<String, ParseError> {
        self.expect('<')?;
        let start = self.pos;
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated IRI")),
                Some('>') => break,
                Some(c) if is_forbidden_in_iri(c) => {
                    return Err(self.error(format!("invalid character {c:?} in IRI")));
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
        let raw = self.text[start..self.pos].to_string();
        self.bump();
        if raw.is_empty() {
            return Err(self.error("empty IRI"));
        }
        Ok(raw)
    }

    fn blank_node(&mut self) -> Result<Term, ParseError> {
        self.expect('_')?;
        self.expect(':')?;
        let start = self.pos;
        while self.peek().is_some_and(is_blank_label_char) {
            self.bump();
        }
        // A label cannot end with '.', which belongs to the statement terminator.
        while self.pos > start && self.text[..self.pos].ends_with('.') {
            self.pos -= 1;
        }
        if self.pos == start {
            return Err(self.error("empty blank node label"));
        }
        Ok(Term::BlankNode(self.text[start..self.pos].to_string()))
    }

    fn literal(&mut self) -> Result<Term, ParseError> {
        self.expect('"')?;
        let start = self.pos;
        loop {
            match self.peek() {
                None | Some('\n' | '\r') => return Err(self.error("unterminated literal")),
                Some('"') => break,
                Some('\\') => {
                    self.bump();
                    if self.bump().is_none() {
                        return Err(self.error("unterminated literal"));
                    }
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
        let lexical = self.text[start..self.pos].to_string();
        self.bump();

        let suffix = match self.peek() {
            Some('@') => {
                self.bump();
                let tag_start = self.pos;
                while self
                    .peek()
                    .is_some_and(|c| c.is_ascii_alphanumeric() || c == '-')
                {
                    self.bump();
                }
                let tag = &self.text[tag_start..self.pos];
                if tag.is_empty() || !tag.starts_with(|c: char| c.is_ascii_alphabetic()) {
                    return Err(self.error("invalid language tag"));
                }
                LiteralSuffix::Language(tag.to_string())
            }
            Some('^') => {
                self.expect('^')?;
                self.expect('^')?;
                LiteralSuffix::Datatype(self.iri_text()?)
            }
            _ => LiteralSuffix::None,
        };

        Ok(Term::Literal { lexical, suffix })
    }
}

// ============================================================================
// Escape Decoding
// ============================================================================

/// Decode N-Triples string and `\u` / `\U` escapes.
fn unescape(raw: &str) -> Result<String, TermError> {
    if !raw.contains('\\') {
        return Ok(raw.to_string());
    }

    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let decoded = match chars.next() {
            Some('t') => '\t',
            Some('b') => '\u{8}',
            Some('n') => '\n',
            Some('r') => '\r',
            Some('f') => '\u{c}',
            Some('"') => '"',
            Some('\'') => '\'',
            Some('\\') => '\\',
            Some('u') => code_point(&mut chars, 'u', 4)?,
            Some('U') => code_point(&mut chars, 'U', 8)?,
            Some(other) => return Err(TermError::UnknownEscape(other)),
            None => return Err(TermError::MalformedEscape("\\".to_string())),
        };
        out.push(decoded);
    }
    Ok(out)
}

fn code_point(chars: &mut std::str::Chars<'_>, marker: char, digits: usize) -> Result<char, TermError> {
    let hex: String = chars.by_ref().take(digits).collect();
    if hex.chars().count() != digits || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(TermError::MalformedEscape(format!("\\{marker}{hex}")));
    }
    let value = u32::from_str_radix(&hex, 16)
        .map_err(|_| TermError::MalformedEscape(format!("\\{marker}{hex}")))?;
    char::from_u32(value).ok_or(TermError::InvalidCodePoint(value))
}
