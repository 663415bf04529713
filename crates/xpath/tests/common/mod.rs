#![allow(dead_code)]

use findxml_xpath::model::{NodeKind, QName, XdmNode};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct Dom {
    nodes: Vec<NodeRecord>,
}

#[derive(Debug, Clone)]
struct NodeRecord {
    kind: NodeKind,
    name: Option<QName>,
    value: String,
    parent: Option<usize>,
    children: Vec<usize>,
    attributes: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct Node {
    dom: Arc<Dom>,
    idx: usize,
}

impl PartialEq for Node {
    fn eq(&self, o: &Self) -> bool {
        Arc::ptr_eq(&self.dom, &o.dom) && self.idx == o.idx
    }
}
impl Eq for Node {}

impl Node {
    fn at(&self, idx: usize) -> Self {
        Node { dom: self.dom.clone(), idx }
    }

    pub fn local(&self) -> String {
        self.name().map(|q| q.local).unwrap_or_default()
    }
}

impl XdmNode for Node {
    fn kind(&self) -> NodeKind {
        self.dom.nodes[self.idx].kind
    }
    fn name(&self) -> Option<QName> {
        self.dom.nodes[self.idx].name.clone()
    }
    fn string_value(&self) -> String {
        let rec = &self.dom.nodes[self.idx];
        match rec.kind {
            NodeKind::Document | NodeKind::Element => {
                rec.children.iter().map(|&c| self.at(c)).filter(|c| c.kind() != NodeKind::Comment).map(|c| c.string_value()).collect()
            }
            _ => rec.value.clone(),
        }
    }
    fn parent(&self) -> Option<Self> {
        self.dom.nodes[self.idx].parent.map(|i| self.at(i))
    }
    fn children(&self) -> Vec<Self> {
        self.dom.nodes[self.idx].children.iter().map(|&i| self.at(i)).collect()
    }
    fn attributes(&self) -> Vec<Self> {
        self.dom.nodes[self.idx].attributes.iter().map(|&i| self.at(i)).collect()
    }
    fn compare_document_order(&self, other: &Self) -> std::cmp::Ordering {
        self.idx.cmp(&other.idx)
    }
}

fn qname(name: &str, ns: Option<&str>) -> QName {
    match name.split_once(':') {
        Some((p, l)) => QName { prefix: Some(p.into()), local: l.into(), ns_uri: ns.map(Into::into) },
        None => QName { prefix: None, local: name.into(), ns_uri: ns.map(Into::into) },
    }
}

impl Dom {
    fn push(&mut self, kind: NodeKind, name: Option<QName>, value: &str, parent: Option<usize>) -> usize {
        let idx = self.nodes.len();
        self.nodes.push(NodeRecord {
            kind,
            name,
            value: value.into(),
            parent,
            children: vec![],
            attributes: vec![],
        });
        idx
    }

    pub fn document() -> (Dom, usize) {
        let mut dom = Dom::default();
        let d = dom.push(NodeKind::Document, None, "", None);
        (dom, d)
    }

    pub fn element(&mut self, parent: usize, name: &str) -> usize {
        self.element_ns(parent, name, None)
    }

    pub fn element_ns(&mut self, parent: usize, name: &str, ns: Option<&str>) -> usize {
        let idx = self.push(NodeKind::Element, Some(qname(name, ns)), "", Some(parent));
        self.nodes[parent].children.push(idx);
        idx
    }

    pub fn attribute(&mut self, parent: usize, name: &str, value: &str) -> usize {
        let idx = self.push(NodeKind::Attribute, Some(qname(name, None)), value, Some(parent));
        self.nodes[parent].attributes.push(idx);
        idx
    }

    pub fn text(&mut self, parent: usize, value: &str) -> usize {
        let idx = self.push(NodeKind::Text, None, value, Some(parent));
        self.nodes[parent].children.push(idx);
        idx
    }

    pub fn comment(&mut self, parent: usize, value: &str) -> usize {
        let idx = self.push(NodeKind::Comment, None, value, Some(parent));
        self.nodes[parent].children.push(idx);
        idx
    }

    pub fn finish(self, idx: usize) -> Node {
        Node { dom: Arc::new(self), idx }
    }
}

/// ```xml
/// <library>
///   <book id="b1" lang="en"><title>Rust in Action</title><price>30</price></book>
///   <book id="b2" lang="de"><title>Der Prozess</title><price>12.5</price></book>
///   <!--note-->
///   <magazine id="m1"><title>Byte</title></magazine>
/// </library>
/// ```
pub fn library() -> Node {
    let (mut dom, doc) = Dom::document();
    let lib = dom.element(doc, "library");
    for (id, lang, title, price) in [("b1", "en", "Rust in Action", "30"), ("b2", "de", "Der Prozess", "12.5")] {
        let b = dom.element(lib, "book");
        dom.attribute(b, "id", id);
        dom.attribute(b, "lang", lang);
        let t = dom.element(b, "title");
        dom.text(t, title);
        let p = dom.element(b, "price");
        dom.text(p, price);
    }
    dom.comment(lib, "note");
    let m = dom.element(lib, "magazine");
    dom.attribute(m, "id", "m1");
    let t = dom.element(m, "title");
    dom.text(t, "Byte");
    dom.finish(doc)
}
