//! [`TokenSource`] over `quick-xml`.
//!
//! quick-xml reports raw prefixed names and byte offsets; this reader adds the
//! pieces the pipeline relies on: namespace resolution with its own scope
//! stack, 1-based line/column positions, attribute cursors, and the
//! well-formedness checks quick-xml leaves to the caller (unclosed elements,
//! missing or repeated root element, unbound prefixes).
//!
//! Line ends are normalized to `\n` before parsing, and tabs and line breaks
//! in attribute values become spaces, as an XML processor must do.

use crate::error::{FindXmlError, FindXmlResult};
use crate::token::{Position, Token, TokenKind, TokenSource};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::io::Cursor;
use std::path::Path;
use std::str::FromStr;

pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";
pub const XMLNS_NS: &str = "http://www.w3.org/2000/xmlns/";

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

pub struct XmlTokenReader {
    reader: Option<Reader<Cursor<Vec<u8>>>>,
    line_starts: Vec<usize>,
    cursor: LineCursor,
    buf: Vec<u8>,
    /// Namespace bindings in scope, innermost last. `""` is the default namespace.
    bindings: Vec<(String, String)>,
    /// Length of `bindings` when each open element started.
    scope_marks: Vec<usize>,
    open: Vec<String>,
    pending_end: Option<Token>,
    attributes: Vec<Token>,
    attr_cursor: usize,
    current: Position,
    seen_root: bool,
    root_closed: bool,
}

impl XmlTokenReader {
    pub fn open(path: impl AsRef<Path>) -> FindXmlResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| FindXmlError::io(path, e))?;
        tracing::trace!(path = %path.display(), bytes = bytes.len(), "opened xml source");
        Self::from_bytes(bytes)
    }

    pub fn from_bytes(mut bytes: Vec<u8>) -> FindXmlResult<Self> {
        if bytes.starts_with(UTF8_BOM) {
            bytes.drain(..UTF8_BOM.len());
        }
        if let Err(e) = std::str::from_utf8(&bytes) {
            let line_starts = line_starts(&bytes);
            let position = position_in(&bytes, &line_starts, e.valid_up_to());
            return Err(FindXmlError::malformed("invalid UTF-8 byte sequence", position));
        }
        let bytes = normalize_line_ends(bytes);
        let line_starts = line_starts(&bytes);
        Ok(Self {
            reader: Some(Reader::from_reader(Cursor::new(bytes))),
            line_starts,
            cursor: LineCursor::default(),
            buf: Vec::new(),
            bindings: Vec::new(),
            scope_marks: Vec::new(),
            open: Vec::new(),
            pending_end: None,
            attributes: Vec::new(),
            attr_cursor: 0,
            current: Position::Unknown,
            seen_root: false,
            root_closed: false,
        })
    }

    fn position_at(&mut self, offset: usize) -> Position {
        match &self.reader {
            Some(r) => self.cursor.advance(r.get_ref().get_ref(), &self.line_starts, offset),
            None => Position::Unknown,
        }
    }

    /// Offset of the `<` opening the markup event read from `start`. After a text
    /// event quick-xml has already consumed the `<`.
    fn markup_start(&self, start: usize) -> usize {
        match &self.reader {
            Some(r) if r.get_ref().get_ref().get(start) != Some(&b'<') => start.saturating_sub(1),
            _ => start,
        }
    }

    fn lookup(&self, prefix: &str) -> Option<&str> {
        match prefix {
            "xml" => Some(XML_NS),
            "xmlns" => Some(XMLNS_NS),
            _ => self.bindings.iter().rev().find(|(p, _)| p == prefix).map(|(_, uri)| uri.as_str()),
        }
    }

    fn resolve(&self, prefix: &str, position: Position) -> FindXmlResult<String> {
        match self.lookup(prefix) {
            Some(uri) => Ok(uri.to_string()),
            None if prefix.is_empty() => Ok(String::new()),
            None => Err(FindXmlError::malformed(format!("'{prefix}' is an undeclared prefix"), position)),
        }
    }

    /// Builds the element token and its attribute tokens, opening a namespace scope.
    fn start_element(&mut self, e: &BytesStart<'_>, start: usize) -> FindXmlResult<Token> {
        let start = self.markup_start(start);
        let position = self.position_at(start + 1);
        if self.open.is_empty() && self.root_closed {
            return Err(FindXmlError::malformed("there are multiple root elements", position));
        }
        let qname = utf8(e.name().as_ref(), position)?;
        let base = e.as_ptr() as usize;

        let mut raw = Vec::new();
        self.scope_marks.push(self.bindings.len());
        for attr in e.attributes() {
            let attr = attr.map_err(|err| FindXmlError::Xml(err.into()))?;
            let offset = (attr.key.as_ref().as_ptr() as usize).saturating_sub(base);
            let attr_position = self.position_at(start + 1 + offset);
            let key = utf8(attr.key.as_ref(), attr_position)?;
            let value = attribute_value(&attr.value, attr_position)?;
            let (prefix, local) = split_qname(&key);
            if prefix == "xmlns" {
                self.bindings.push((local.to_string(), value.clone()));
            } else if prefix.is_empty() && local == "xmlns" {
                self.bindings.push((String::new(), value.clone()));
            }
            raw.push((prefix.to_string(), local.to_string(), value, attr_position));
        }

        let (prefix, local) = split_qname(&qname);
        let mut token = Token::new(TokenKind::StartElement, position);
        token.namespace_uri = self.resolve(prefix, position)?;
        token.prefix = prefix.to_string();
        token.local_name = local.to_string();

        self.attributes.clear();
        self.attr_cursor = 0;
        for (prefix, local, value, pos) in raw {
            let mut attr = Token::new(TokenKind::Attribute, pos);
            // Unprefixed attributes are in no namespace, whatever the default namespace is.
            attr.namespace_uri = if prefix.is_empty() && local == "xmlns" {
                XMLNS_NS.to_string()
            } else if prefix.is_empty() {
                String::new()
            } else {
                self.resolve(&prefix, pos)?
            };
            attr.prefix = prefix;
            attr.local_name = local;
            attr.value = value;
            self.attributes.push(attr);
        }

        self.open.push(qname);
        self.seen_root = true;
        Ok(token)
    }

    fn end_element(&mut self, qname: &str, position: Position) -> FindXmlResult<Token> {
        let (prefix, local) = split_qname(qname);
        let mut token = Token::new(TokenKind::EndElement, position);
        token.namespace_uri = self.resolve(prefix, position)?;
        token.prefix = prefix.to_string();
        token.local_name = local.to_string();
        if let Some(mark) = self.scope_marks.pop() {
            self.bindings.truncate(mark);
        }
        self.open.pop();
        if self.open.is_empty() {
            self.root_closed = true;
        }
        Ok(token)
    }

    fn emit(&mut self, token: Token) -> FindXmlResult<Option<Token>> {
        self.current = token.position;
        Ok(Some(token))
    }

    fn next_token(&mut self) -> FindXmlResult<Option<Token>> {
        loop {
            if let Some(end) = self.pending_end.take() {
                let token = self.end_element(&end.qualified_name(), end.position)?;
                return self.emit(token);
            }
            let Some(reader) = self.reader.as_mut() else {
                return Ok(None);
            };
            let start = usize::try_from(reader.buffer_position()).unwrap_or(usize::MAX);
            let mut buf = std::mem::take(&mut self.buf);
            buf.clear();
            let event = match reader.read_event_into(&mut buf) {
                Ok(ev) => ev,
                Err(e) => return Err(FindXmlError::malformed(e.to_string(), self.position_at(start))),
            };
            let token = match event {
                Event::Start(e) => Some(self.start_element(&e, start)?),
                Event::Empty(e) => {
                    let token = self.start_element(&e, start)?;
                    let mut end = Token::new(TokenKind::EndElement, token.position);
                    end.prefix.clone_from(&token.prefix);
                    end.local_name.clone_from(&token.local_name);
                    self.pending_end = Some(end);
                    Some(token)
                }
                Event::End(e) => {
                    let position = self.position_at(self.markup_start(start) + 2);
                    let qname = utf8(e.name().as_ref(), position)?;
                    Some(self.end_element(&qname, position)?)
                }
                Event::Text(e) => {
                    let position = self.position_at(start);
                    let value = e.unescape()?.into_owned();
                    if self.open.is_empty() {
                        if !value.chars().all(char::is_whitespace) {
                            return Err(FindXmlError::malformed("data at the root level is invalid", position));
                        }
                        None
                    } else {
                        let mut t = Token::new(TokenKind::Text, position);
                        t.value = value;
                        Some(t)
                    }
                }
                Event::CData(e) => {
                    let position = self.position_at(self.markup_start(start) + 9);
                    let mut t = Token::new(TokenKind::Text, position);
                    t.value = utf8(&e, position)?;
                    Some(t)
                }
                Event::Comment(e) => {
                    let position = self.position_at(self.markup_start(start) + 4);
                    let mut t = Token::new(TokenKind::Comment, position);
                    t.value = utf8(&e, position)?;
                    Some(t)
                }
                Event::PI(e) => {
                    let position = self.position_at(self.markup_start(start) + 2);
                    let raw = utf8(&e, position)?;
                    let (target, data) = raw.split_once(char::is_whitespace).unwrap_or((raw.as_str(), ""));
                    let mut t = Token::new(TokenKind::ProcessingInstruction, position);
                    t.local_name = target.to_string();
                    t.value = data.trim_start().to_string();
                    Some(t)
                }
                Event::Decl(e) => {
                    let position = self.position_at(self.markup_start(start) + 2);
                    let mut t = Token::new(TokenKind::Other, position);
                    t.value = utf8(&e, position)?;
                    Some(t)
                }
                Event::DocType(e) => {
                    let position = self.position_at(self.markup_start(start) + 2);
                    let mut t = Token::new(TokenKind::Other, position);
                    t.value = utf8(&e, position)?;
                    Some(t)
                }
                Event::Eof => {
                    let position = self.position_at(start);
                    if let Some(name) = self.open.last() {
                        return Err(FindXmlError::malformed(
                            format!("unexpected end of file; the element '{name}' is not closed"),
                            position,
                        ));
                    }
                    if !self.seen_root {
                        return Err(FindXmlError::malformed("root element is missing", position));
                    }
                    self.buf = buf;
                    self.close();
                    return Ok(None);
                }
            };
            self.buf = buf;
            if let Some(token) = token {
                return self.emit(token);
            }
        }
    }
}

impl FromStr for XmlTokenReader {
    type Err = FindXmlError;

    fn from_str(xml: &str) -> Result<Self, Self::Err> {
        Self::from_bytes(xml.as_bytes().to_vec())
    }
}

impl TokenSource for XmlTokenReader {
    fn read(&mut self) -> FindXmlResult<Option<Token>> {
        // Attributes of the previous start element stay readable until the next pending end.
        if self.pending_end.is_none() {
            self.attributes.clear();
            self.attr_cursor = 0;
        }
        let token = self.next_token()?;
        if token.as_ref().is_some_and(|t| t.kind != TokenKind::StartElement) {
            self.attributes.clear();
            self.attr_cursor = 0;
        }
        Ok(token)
    }

    fn next_attribute(&mut self) -> FindXmlResult<Option<Token>> {
        match self.attributes.get(self.attr_cursor) {
            Some(attr) => {
                let attr = attr.clone();
                self.attr_cursor += 1;
                self.current = attr.position;
                Ok(Some(attr))
            }
            None => Ok(None),
        }
    }

    fn first_attribute(&mut self) -> FindXmlResult<Option<Token>> {
        self.attr_cursor = 0;
        self.next_attribute()
    }

    fn line_info(&self) -> Position {
        self.current
    }

    fn close(&mut self) {
        if self.reader.take().is_some() {
            tracing::trace!("closed xml source");
        }
        self.pending_end = None;
        self.attributes.clear();
        self.bindings.clear();
        self.scope_marks.clear();
        self.open.clear();
    }
}

fn utf8(bytes: &[u8], position: Position) -> FindXmlResult<String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|_| FindXmlError::malformed("invalid UTF-8 byte sequence", position))
}

fn split_qname(qname: &str) -> (&str, &str) {
    qname.split_once(':').unwrap_or(("", qname))
}

/// `\r\n` and lone `\r` become `\n`.
fn normalize_line_ends(bytes: Vec<u8>) -> Vec<u8> {
    if !bytes.contains(&b'\r') {
        return bytes;
    }
    let mut out = Vec::with_capacity(bytes.len());
    let mut iter = bytes.iter().copied().peekable();
    while let Some(b) = iter.next() {
        if b == b'\r' {
            out.push(b'\n');
            if iter.peek() == Some(&b'\n') {
                iter.next();
            }
        } else {
            out.push(b);
        }
    }
    out
}

/// Literal tabs and line breaks become spaces before references are expanded,
/// so `&#10;` still yields a line break.
fn attribute_value(raw: &[u8], position: Position) -> FindXmlResult<String> {
    let raw = utf8(raw, position)?;
    let spaced: String = raw.chars().map(|c| if matches!(c, '\t' | '\n' | '\r') { ' ' } else { c }).collect();
    quick_xml::escape::unescape(&spaced)
        .map(std::borrow::Cow::into_owned)
        .map_err(|e| FindXmlError::malformed(e.to_string(), position))
}

fn line_starts(bytes: &[u8]) -> Vec<usize> {
    let mut starts = vec![0];
    starts.extend(bytes.iter().enumerate().filter(|(_, b)| **b == b'\n').map(|(i, _)| i + 1));
    starts
}

/// Position of the last looked-up offset. Lookups mostly move forward, so each
/// one only scans the bytes since the previous lookup.
#[derive(Debug, Clone, Copy)]
struct LineCursor {
    offset: usize,
    /// 0-based.
    line: usize,
    column: usize,
}

impl Default for LineCursor {
    fn default() -> Self {
        Self { offset: 0, line: 0, column: 1 }
    }
}

impl LineCursor {
    fn advance(&mut self, bytes: &[u8], line_starts: &[usize], offset: usize) -> Position {
        let offset = offset.min(bytes.len());
        if offset < self.offset {
            let line = match line_starts.binary_search(&offset) {
                Ok(i) => i,
                Err(i) => i.saturating_sub(1),
            };
            *self = Self { offset: line_starts.get(line).copied().unwrap_or(0), line, column: 1 };
        }
        for &b in &bytes[self.offset..offset] {
            if b == b'\n' {
                self.line += 1;
                self.column = 1;
            } else if b & 0xC0 != 0x80 {
                self.column += 1;
            }
        }
        self.offset = offset;
        Position::new(self.line + 1, self.column)
    }
}

fn position_in(bytes: &[u8], line_starts: &[usize], offset: usize) -> Position {
    LineCursor::default().advance(bytes, line_starts, offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_count_characters() {
        let bytes = "é\nab<c".as_bytes();
        let starts = line_starts(bytes);
        assert_eq!(position_in(bytes, &starts, 0), Position::new(1, 1));
        // 'é' is two bytes, so byte 5 is '<' on line 2.
        assert_eq!(position_in(bytes, &starts, 5), Position::new(2, 3));
    }

    #[test]
    fn cursor_moves_back_within_and_across_lines() {
        let bytes = "ab\ncdé\nf".as_bytes();
        let starts = line_starts(bytes);
        let mut cursor = LineCursor::default();
        assert_eq!(cursor.advance(bytes, &starts, 8), Position::new(3, 1));
        assert_eq!(cursor.advance(bytes, &starts, 4), Position::new(2, 2));
        assert_eq!(cursor.advance(bytes, &starts, 7), Position::new(2, 4));
        assert_eq!(cursor.advance(bytes, &starts, 1), Position::new(1, 2));
    }

    #[test]
    fn line_ends_become_newlines() {
        assert_eq!(normalize_line_ends(b"a\r\nb\rc\n\r\r\n".to_vec()), b"a\nb\nc\n\n\n".to_vec());
        assert_eq!(normalize_line_ends(b"plain".to_vec()), b"plain".to_vec());
    }

    #[test]
    fn attribute_whitespace_becomes_spaces() {
        let position = Position::new(1, 1);
        assert_eq!(attribute_value(b"a\tb\nc", position).unwrap(), "a b c");
        assert_eq!(attribute_value(b"a&#10;b &amp; c", position).unwrap(), "a\nb & c");
        assert!(attribute_value(b"a&bogus;", position).is_err());
    }

    #[test]
    fn deep_bindings_unwind_per_element() {
        let mut reader = XmlTokenReader::from_str(r#"<a xmlns:p="u1"><b><p:c xmlns:p="u2"/><p:d/></b></a>"#).unwrap();
        let mut uris = Vec::new();
        while let Some(t) = reader.read().unwrap() {
            if t.kind == TokenKind::StartElement {
                uris.push((t.local_name, t.namespace_uri));
            }
        }
        let expected: Vec<(String, String)> =
            [("a", ""), ("b", ""), ("c", "u2"), ("d", "u1")].iter().map(|(n, u)| ((*n).into(), (*u).into())).collect();
        assert_eq!(uris, expected);
    }

    #[test]
    fn split_qname_handles_unprefixed() {
        assert_eq!(split_qname("a"), ("", "a"));
        assert_eq!(split_qname("p:a"), ("p", "a"));
    }
}
