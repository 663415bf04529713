//! Token model and the reader capability every stage of the pipeline speaks.

use crate::error::FindXmlResult;
use std::fmt;

/// Source position of a token. Lines and columns are 1-based; columns count characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Position {
    Known { line: usize, column: usize },
    Unknown,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Position::Known { line, column }
    }

    pub fn line(&self) -> Option<usize> {
        match self {
            Position::Known { line, .. } => Some(*line),
            Position::Unknown => None,
        }
    }

    pub fn column(&self) -> Option<usize> {
        match self {
            Position::Known { column, .. } => Some(*column),
            Position::Unknown => None,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Position::Known { line, column } => write!(f, "{line}:{column}"),
            Position::Unknown => f.write_str("?"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    StartElement,
    EndElement,
    Attribute,
    Text,
    Comment,
    ProcessingInstruction,
    /// XML declaration, DOCTYPE.
    Other,
}

/// One unit of the token stream. Empty `prefix` / `namespace_uri` mean "none".
///
/// For processing instructions `local_name` is the target and `value` the data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub local_name: String,
    pub prefix: String,
    pub namespace_uri: String,
    pub value: String,
    pub position: Position,
}

impl Token {
    pub fn new(kind: TokenKind, position: Position) -> Self {
        Self {
            kind,
            local_name: String::new(),
            prefix: String::new(),
            namespace_uri: String::new(),
            value: String::new(),
            position,
        }
    }

    /// `prefix:local` or `local`.
    pub fn qualified_name(&self) -> String {
        if self.prefix.is_empty() { self.local_name.clone() } else { format!("{}:{}", self.prefix, self.local_name) }
    }

    /// `xmlns="..."` or `xmlns:p="..."`.
    pub fn is_namespace_declaration(&self) -> bool {
        self.kind == TokenKind::Attribute
            && (self.prefix == "xmlns" || (self.prefix.is_empty() && self.local_name == "xmlns"))
    }
}

/// Pull-style XML token source.
///
/// `read` walks non-attribute tokens; after a `StartElement` its attributes are
/// available through `next_attribute` until the next `read`.
pub trait TokenSource {
    /// Advances to the next non-attribute token; `Ok(None)` at end of input or after `close`.
    fn read(&mut self) -> FindXmlResult<Option<Token>>;

    /// Next attribute of the current start element, `Ok(None)` when exhausted.
    fn next_attribute(&mut self) -> FindXmlResult<Option<Token>>;

    /// Rewinds the attribute cursor of the current element and returns its first attribute.
    fn first_attribute(&mut self) -> FindXmlResult<Option<Token>>;

    /// Position of the current token (the last one returned).
    fn line_info(&self) -> Position;

    /// Releases the source. Closing twice is a no-op.
    fn close(&mut self);
}

impl<S: TokenSource + ?Sized> TokenSource for Box<S> {
    fn read(&mut self) -> FindXmlResult<Option<Token>> {
        (**self).read()
    }

    fn next_attribute(&mut self) -> FindXmlResult<Option<Token>> {
        (**self).next_attribute()
    }

    fn first_attribute(&mut self) -> FindXmlResult<Option<Token>> {
        (**self).first_attribute()
    }

    fn line_info(&self) -> Position {
        (**self).line_info()
    }

    fn close(&mut self) {
        (**self).close();
    }
}
