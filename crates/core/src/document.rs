//! Whitespace-preserving document model built from a [`TokenSource`].
//!
//! Nodes live in one arena shared through an `Arc`; [`XmlNode`] is a cheap
//! `(arena, index)` handle, so a node handed out by a query keeps its document
//! alive and can never dangle. Arena order is document order: an element,
//! then its namespace declarations and attributes (interleaved as in the
//! source), then its children.

use crate::error::FindXmlResult;
use crate::token::{Position, Token, TokenKind, TokenSource};
use findxml_xpath::model::{NodeKind, QName, XdmNode};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

#[derive(Debug)]
pub(crate) struct NodeData {
    pub(crate) kind: NodeKind,
    pub(crate) name: Option<QName>,
    pub(crate) value: String,
    pub(crate) position: Position,
    pub(crate) parent: Option<usize>,
    pub(crate) children: Vec<usize>,
    pub(crate) attributes: Vec<usize>,
    pub(crate) namespaces: Vec<usize>,
}

impl NodeData {
    fn new(kind: NodeKind, position: Position, parent: Option<usize>) -> Self {
        Self {
            kind,
            name: None,
            value: String::new(),
            position,
            parent,
            children: Vec::new(),
            attributes: Vec::new(),
            namespaces: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Arena {
    pub(crate) nodes: Vec<NodeData>,
}

impl Arena {
    fn push(&mut self, data: NodeData) -> usize {
        let id = self.nodes.len();
        self.nodes.push(data);
        id
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

fn qname_of(token: Token) -> (QName, String) {
    let name = QName {
        prefix: non_empty(token.prefix),
        local: token.local_name,
        ns_uri: non_empty(token.namespace_uri),
    };
    (name, token.value)
}

#[derive(Clone)]
pub struct XmlDocument {
    arena: Arc<Arena>,
}

impl XmlDocument {
    /// Drains `source` into a new document. The source is left open; closing
    /// it is the caller's business.
    pub fn load<S: TokenSource + ?Sized>(source: &mut S) -> FindXmlResult<Self> {
        let mut arena = Arena::default();
        let root = arena.push(NodeData::new(NodeKind::Document, Position::Unknown, None));
        let mut open = vec![root];

        while let Some(token) = source.read()? {
            let position = source.line_info();
            let parent = open.last().copied().unwrap_or(root);
            match token.kind {
                TokenKind::StartElement => {
                    let mut element = NodeData::new(NodeKind::Element, position, Some(parent));
                    element.name = Some(qname_of(token).0);
                    let id = arena.push(element);
                    arena.nodes[parent].children.push(id);
                    while let Some(attr) = source.next_attribute()? {
                        let position = source.line_info();
                        let is_declaration = attr.is_namespace_declaration();
                        let (mut name, value) = qname_of(attr);
                        let kind = if is_declaration {
                            // Declared prefix, "" for the default namespace.
                            name = QName::local(if name.prefix.is_some() { name.local } else { String::new() });
                            NodeKind::Namespace
                        } else {
                            NodeKind::Attribute
                        };
                        let mut data = NodeData::new(kind, position, Some(id));
                        data.name = Some(name);
                        data.value = value;
                        let attr_id = arena.push(data);
                        if is_declaration {
                            arena.nodes[id].namespaces.push(attr_id);
                        } else {
                            arena.nodes[id].attributes.push(attr_id);
                        }
                    }
                    open.push(id);
                }
                TokenKind::EndElement => {
                    if open.len() > 1 {
                        open.pop();
                    }
                }
                TokenKind::Text => {
                    if parent == root {
                        continue;
                    }
                    let last = arena.nodes[parent].children.last().copied();
                    match last {
                        Some(prev) if arena.nodes[prev].kind == NodeKind::Text => {
                            arena.nodes[prev].value.push_str(&token.value);
                        }
                        _ => {
                            let mut text = NodeData::new(NodeKind::Text, position, Some(parent));
                            text.value = token.value;
                            let id = arena.push(text);
                            arena.nodes[parent].children.push(id);
                        }
                    }
                }
                TokenKind::Comment | TokenKind::ProcessingInstruction => {
                    let kind = if token.kind == TokenKind::Comment {
                        NodeKind::Comment
                    } else {
                        NodeKind::ProcessingInstruction
                    };
                    let mut data = NodeData::new(kind, position, Some(parent));
                    if kind == NodeKind::ProcessingInstruction {
                        data.name = Some(QName::local(token.local_name));
                    }
                    data.value = token.value;
                    let id = arena.push(data);
                    arena.nodes[parent].children.push(id);
                }
                TokenKind::Attribute | TokenKind::Other => {}
            }
        }

        tracing::debug!(nodes = arena.nodes.len(), "loaded document");
        Ok(Self { arena: Arc::new(arena) })
    }

    /// The document node.
    pub fn root(&self) -> XmlNode {
        XmlNode { arena: Arc::clone(&self.arena), id: 0 }
    }

    pub fn document_element(&self) -> Option<XmlNode> {
        self.root().children().into_iter().find(|n| n.kind() == NodeKind::Element)
    }

    pub fn len(&self) -> usize {
        self.arena.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.nodes.len() <= 1
    }
}

impl fmt::Debug for XmlDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XmlDocument").field("nodes", &self.arena.nodes.len()).finish()
    }
}

#[derive(Clone)]
pub struct XmlNode {
    pub(crate) arena: Arc<Arena>,
    pub(crate) id: usize,
}

impl XmlNode {
    pub(crate) fn data(&self) -> &NodeData {
        &self.arena.nodes[self.id]
    }

    pub(crate) fn at(&self, id: usize) -> XmlNode {
        XmlNode { arena: Arc::clone(&self.arena), id }
    }

    /// Where the node's token started in the source, if the source could tell.
    pub fn position(&self) -> Position {
        self.data().position
    }

    /// Local name, `""` for unnamed nodes.
    pub fn local_name(&self) -> &str {
        self.data().name.as_ref().map_or("", |q| q.local.as_str())
    }

    pub fn value(&self) -> &str {
        &self.data().value
    }

    /// Namespace declarations and attributes of an element, in source order.
    pub(crate) fn markup_attributes(&self) -> Vec<XmlNode> {
        let data = self.data();
        let mut ids: Vec<usize> = data.namespaces.iter().chain(data.attributes.iter()).copied().collect();
        ids.sort_unstable();
        ids.into_iter().map(|id| self.at(id)).collect()
    }

    fn collect_text(&self, out: &mut String) {
        for &c in &self.data().children {
            let child = &self.arena.nodes[c];
            match child.kind {
                NodeKind::Text => out.push_str(&child.value),
                NodeKind::Element => self.at(c).collect_text(out),
                _ => {}
            }
        }
    }
}

impl PartialEq for XmlNode {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.arena, &other.arena) && self.id == other.id
    }
}

impl Eq for XmlNode {}

impl fmt::Debug for XmlNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.data();
        let mut d = f.debug_struct("XmlNode");
        d.field("id", &self.id).field("kind", &data.kind);
        if let Some(name) = &data.name {
            d.field("name", &name.lexical());
        }
        d.field("position", &data.position).finish()
    }
}

impl XdmNode for XmlNode {
    fn kind(&self) -> NodeKind {
        self.data().kind
    }

    fn name(&self) -> Option<QName> {
        self.data().name.clone()
    }

    fn string_value(&self) -> String {
        match self.data().kind {
            NodeKind::Document | NodeKind::Element => {
                let mut out = String::new();
                self.collect_text(&mut out);
                out
            }
            _ => self.data().value.clone(),
        }
    }

    fn parent(&self) -> Option<Self> {
        self.data().parent.map(|p| self.at(p))
    }

    fn children(&self) -> Vec<Self> {
        self.data().children.iter().map(|&c| self.at(c)).collect()
    }

    fn attributes(&self) -> Vec<Self> {
        self.data().attributes.iter().map(|&a| self.at(a)).collect()
    }

    fn namespaces(&self) -> Vec<Self> {
        self.data().namespaces.iter().map(|&n| self.at(n)).collect()
    }

    fn compare_document_order(&self, other: &Self) -> Ordering {
        if Arc::ptr_eq(&self.arena, &other.arena) {
            self.id.cmp(&other.id)
        } else {
            // Stable, arbitrary order between documents.
            Arc::as_ptr(&self.arena).cmp(&Arc::as_ptr(&other.arena))
        }
    }
}
