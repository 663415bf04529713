use core::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Document,
    Element,
    Attribute,
    Text,
    Comment,
    ProcessingInstruction,
    Namespace,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    pub prefix: Option<String>,
    pub local: String,
    pub ns_uri: Option<String>,
}

impl QName {
    pub fn local(local: impl Into<String>) -> Self {
        Self { prefix: None, local: local.into(), ns_uri: None }
    }

    /// Lexical form as written in the source (`prefix:local` or `local`).
    pub fn lexical(&self) -> String {
        match &self.prefix {
            Some(p) if !p.is_empty() => format!("{p}:{}", self.local),
            _ => self.local.clone(),
        }
    }
}

/// Fallback comparator for document order based on ancestry and
/// stable sibling ordering.
///
/// - If one node is an ancestor of the other, the ancestor precedes the descendant.
/// - Among siblings, attributes come first, then namespaces, then child nodes; within
///   each group the order provided by the adapter is preserved.
/// - Nodes of different trees compare as `Equal`; adapters holding several trees must
///   override [`XdmNode::compare_document_order`].
pub fn compare_by_ancestry<N: XdmNode>(a: &N, b: &N) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    fn path_to_root<N: XdmNode>(n: &N) -> Vec<N> {
        let mut p = vec![n.clone()];
        let mut cur = n.clone();
        while let Some(parent) = cur.parent() {
            p.push(parent.clone());
            cur = parent;
        }
        p.reverse();
        p
    }
    let pa = path_to_root(a);
    let pb = path_to_root(b);
    let len = pa.len().min(pb.len());
    let mut i = 0usize;
    while i < len && pa[i] == pb[i] {
        i += 1;
    }
    if i == len {
        return pa.len().cmp(&pb.len());
    }
    if i == 0 {
        return Ordering::Equal;
    }
    let parent = &pa[i - 1];
    let mut sibs: Vec<N> = parent.attributes();
    sibs.extend(parent.namespaces());
    sibs.extend(parent.children());
    let posa = sibs.iter().position(|n| *n == pa[i]);
    let posb = sibs.iter().position(|n| *n == pb[i]);
    match (posa, posb) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => Ordering::Equal,
    }
}

/// Node model the evaluator navigates. Implementations are cheap handles
/// (an `Arc` to an arena plus an index, ...).
pub trait XdmNode: Clone + Eq + core::fmt::Debug + Send + Sync + 'static {
    fn kind(&self) -> NodeKind;
    fn name(&self) -> Option<QName>;
    fn string_value(&self) -> String;

    fn parent(&self) -> Option<Self>;
    fn children(&self) -> Vec<Self>;
    fn attributes(&self) -> Vec<Self>;
    fn namespaces(&self) -> Vec<Self> {
        Vec::new()
    }

    fn compare_document_order(&self, other: &Self) -> Ordering {
        compare_by_ancestry(self, other)
    }
}
