use core::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExpandedName {
    pub ns_uri: Option<String>,
    pub local: String,
}

impl ExpandedName {
    pub fn new(ns_uri: Option<String>, local: impl Into<String>) -> Self {
        Self { ns_uri, local: local.into() }
    }

    pub fn local(local: impl Into<String>) -> Self {
        Self { ns_uri: None, local: local.into() }
    }
}

impl fmt::Display for ExpandedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.ns_uri {
            Some(ns) => write!(f, "{{{ns}}}{}", self.local),
            None => f.write_str(&self.local),
        }
    }
}

/// XPath 1.0 value types besides node-sets.
#[derive(Debug, Clone, PartialEq)]
pub enum XdmAtomicValue {
    Boolean(bool),
    String(String),
    Double(f64),
}

impl XdmAtomicValue {
    /// String conversion per the XPath 1.0 `string()` rules.
    pub fn to_xpath_string(&self) -> String {
        match self {
            XdmAtomicValue::Boolean(b) => b.to_string(),
            XdmAtomicValue::String(s) => s.clone(),
            XdmAtomicValue::Double(d) => number_to_string(*d),
        }
    }
}

pub fn number_to_string(d: f64) -> String {
    if d.is_nan() {
        "NaN".to_string()
    } else if d.is_infinite() {
        if d > 0.0 { "Infinity".to_string() } else { "-Infinity".to_string() }
    } else if d == 0.0 {
        "0".to_string()
    } else {
        format!("{d}")
    }
}

pub type XdmSequence<N> = Vec<XdmItem<N>>;

#[derive(Debug, Clone, PartialEq)]
pub enum XdmItem<N> {
    Node(N),
    Atomic(XdmAtomicValue),
}

impl<N> XdmItem<N> {
    pub fn string(s: impl Into<String>) -> Self {
        XdmItem::Atomic(XdmAtomicValue::String(s.into()))
    }

    pub fn boolean(b: bool) -> Self {
        XdmItem::Atomic(XdmAtomicValue::Boolean(b))
    }

    pub fn double(d: f64) -> Self {
        XdmItem::Atomic(XdmAtomicValue::Double(d))
    }
}

impl<N> fmt::Display for XdmItem<N>
where
    N: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XdmItem::Node(_) => write!(f, "<node>"),
            XdmItem::Atomic(a) => write!(f, "{a:?}"),
        }
    }
}
