//! Namespace-erasing [`TokenSource`] adapter.
//!
//! Queries written against a normalized stream can use plain names (`/Project`)
//! no matter which namespaces the document declares. Everything except the
//! namespace parts of element and attribute tokens is forwarded unchanged,
//! positions included.

use crate::error::{FindXmlError, FindXmlResult};
use crate::token::{Position, Token, TokenKind, TokenSource};

pub struct NamespaceNormalizer<S: TokenSource> {
    inner: S,
    closed: bool,
}

impl<S: TokenSource> NamespaceNormalizer<S> {
    pub fn new(inner: S) -> Self {
        Self { inner, closed: false }
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

/// `xmlns`, `xmlns:p` and also `p:xmlns`, which would read as a default
/// namespace declaration once its prefix is stripped.
fn is_xmlns_attribute(attr: &Token) -> bool {
    attr.local_name == "xmlns" || attr.prefix == "xmlns"
}

fn strip(mut token: Token) -> Token {
    if matches!(token.kind, TokenKind::StartElement | TokenKind::EndElement | TokenKind::Attribute) {
        token.prefix.clear();
        token.namespace_uri.clear();
    }
    token
}

impl<S: TokenSource> TokenSource for NamespaceNormalizer<S> {
    fn read(&mut self) -> FindXmlResult<Option<Token>> {
        if self.closed {
            return Ok(None);
        }
        Ok(self.inner.read()?.map(strip))
    }

    fn next_attribute(&mut self) -> FindXmlResult<Option<Token>> {
        if self.closed {
            return Ok(None);
        }
        while let Some(attr) = self.inner.next_attribute()? {
            if is_xmlns_attribute(&attr) {
                tracing::trace!(name = %attr.qualified_name(), position = %attr.position, "dropped namespace declaration");
                continue;
            }
            return Ok(Some(strip(attr)));
        }
        Ok(None)
    }

    /// Skipping namespace declarations needs the sequential cursor of
    /// [`TokenSource::next_attribute`]; a direct jump is refused.
    fn first_attribute(&mut self) -> FindXmlResult<Option<Token>> {
        Err(FindXmlError::Unsupported("moving to the first attribute of a namespace-normalized source"))
    }

    fn line_info(&self) -> Position {
        self.inner.line_info()
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.inner.close();
        }
    }
}

impl<S: TokenSource> Drop for NamespaceNormalizer<S> {
    fn drop(&mut self) {
        self.close();
    }
}
