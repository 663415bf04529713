//! Outer-markup rendering of document nodes for match reports.
//!
//! Output is compact (no re-indentation). A non-root element carries the
//! namespace bindings it inherits from its ancestors and actually uses, so a
//! reported fragment stays self-contained.

use crate::document::XmlNode;
use findxml_xpath::model::{NodeKind, XdmNode};
use std::fmt::Write;

impl XmlNode {
    /// Markup of the node including its descendants.
    pub fn outer_xml(&self) -> String {
        let mut out = String::new();
        match self.kind() {
            NodeKind::Element => {
                let inherited = if self.parent().is_some_and(|p| p.kind() == NodeKind::Element) {
                    inherited_bindings(self)
                } else {
                    Vec::new()
                };
                write_element(self, &inherited, &mut out);
            }
            _ => write_node(self, &mut out),
        }
        out
    }

    /// Markup of the children only.
    pub fn inner_xml(&self) -> String {
        let mut out = String::new();
        for child in self.children() {
            write_node(&child, &mut out);
        }
        out
    }
}

fn write_node(node: &XmlNode, out: &mut String) {
    let data = node.data();
    match data.kind {
        NodeKind::Document => {
            for child in node.children() {
                write_node(&child, out);
            }
        }
        NodeKind::Element => write_element(node, &[], out),
        NodeKind::Attribute => {
            let name = data.name.as_ref().map(findxml_xpath::QName::lexical).unwrap_or_default();
            write_attribute(&name, &data.value, out);
        }
        NodeKind::Namespace => write_attribute(&declaration_name(node.local_name()), &data.value, out),
        NodeKind::Text => escape_text(&data.value, out),
        NodeKind::Comment => {
            let _ = write!(out, "<!--{}-->", data.value);
        }
        NodeKind::ProcessingInstruction => {
            out.push_str("<?");
            out.push_str(node.local_name());
            if !data.value.is_empty() {
                out.push(' ');
                out.push_str(&data.value);
            }
            out.push_str("?>");
        }
    }
}

fn write_element(node: &XmlNode, inherited: &[(String, String)], out: &mut String) {
    let data = node.data();
    let name = data.name.as_ref().map(findxml_xpath::QName::lexical).unwrap_or_default();
    out.push('<');
    out.push_str(&name);
    for attr in node.markup_attributes() {
        out.push(' ');
        write_node(&attr, out);
    }
    for (prefix, uri) in inherited {
        out.push(' ');
        write_attribute(&declaration_name(prefix), uri, out);
    }
    if data.children.is_empty() {
        out.push_str(" />");
        return;
    }
    out.push('>');
    for child in node.children() {
        write_node(&child, out);
    }
    out.push_str("</");
    out.push_str(&name);
    out.push('>');
}

fn declaration_name(prefix: &str) -> String {
    if prefix.is_empty() { "xmlns".to_string() } else { format!("xmlns:{prefix}") }
}

fn write_attribute(name: &str, value: &str, out: &mut String) {
    out.push_str(name);
    out.push_str("=\"");
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out.push('"');
}

fn escape_text(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

/// Bindings used by the subtree of `node` but declared above it, in order of first use.
fn inherited_bindings(node: &XmlNode) -> Vec<(String, String)> {
    let mut used = Vec::new();
    let mut declared: Vec<String> = Vec::new();
    collect_used(node, &mut declared, &mut used);
    used
}

fn collect_used(node: &XmlNode, declared: &mut Vec<String>, used: &mut Vec<(String, String)>) {
    let mark = declared.len();
    declared.extend(node.namespaces().iter().map(|n| n.local_name().to_string()));

    let mut note = |prefix: Option<&str>, uri: Option<&str>, declared: &[String]| {
        let prefix = prefix.unwrap_or("");
        let Some(uri) = uri.filter(|u| !u.is_empty()) else { return };
        if prefix == "xml" || declared.iter().any(|d| d == prefix) || used.iter().any(|(p, _)| p == prefix) {
            return;
        }
        used.push((prefix.to_string(), uri.to_string()));
    };

    if let Some(name) = node.name() {
        note(name.prefix.as_deref(), name.ns_uri.as_deref(), declared);
    }
    for attr in node.attributes() {
        // Unprefixed attributes never use the default namespace.
        if let Some(name) = attr.name().filter(|q| q.prefix.is_some()) {
            note(name.prefix.as_deref(), name.ns_uri.as_deref(), declared);
        }
    }
    for child in node.children() {
        if child.kind() == NodeKind::Element {
            collect_used(&child, declared, used);
        }
    }
    declared.truncate(mark);
}

#[cfg(test)]
mod tests {
    use crate::document::XmlDocument;
    use crate::reader::XmlTokenReader;
    use findxml_xpath::XdmNode;
    use std::str::FromStr;

    fn load(xml: &str) -> XmlDocument {
        let mut reader = XmlTokenReader::from_str(xml).unwrap();
        XmlDocument::load(&mut reader).unwrap()
    }

    #[test]
    fn escapes_text_and_attributes() {
        let doc = load(r#"<a t="x &amp; &quot;y&quot;">1 &lt; 2 &amp;&amp; 3 &gt; 2</a>"#);
        assert_eq!(doc.root().outer_xml(), r#"<a t="x &amp; &quot;y&quot;">1 &lt; 2 &amp;&amp; 3 &gt; 2</a>"#);
    }

    #[test]
    fn child_element_carries_used_bindings() {
        let doc = load(r#"<p:a xmlns:p="urn:p" xmlns:q="urn:q" xmlns="urn:d"><b p:x="1"/></p:a>"#);
        let b = doc.document_element().unwrap().children().remove(0);
        assert_eq!(b.outer_xml(), r#"<b p:x="1" xmlns="urn:d" xmlns:p="urn:p" />"#);
    }

    #[test]
    fn local_declarations_are_not_repeated() {
        let doc = load(r#"<a xmlns="urn:d"><b xmlns:q="urn:q"><q:c/></b></a>"#);
        let b = doc.document_element().unwrap().children().remove(0);
        assert_eq!(b.outer_xml(), r#"<b xmlns:q="urn:q" xmlns="urn:d"><q:c /></b>"#);
    }

    #[test]
    fn comments_and_processing_instructions() {
        let doc = load("<a><!-- c --><?go now?><?halt?></a>");
        assert_eq!(doc.document_element().unwrap().inner_xml(), "<!-- c --><?go now?><?halt?>");
    }
}
