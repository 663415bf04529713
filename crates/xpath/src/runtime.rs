use crate::xdm::{ExpandedName, XdmItem, XdmSequence};
use core::fmt;
use std::collections::HashMap;
use std::sync::Arc;

pub type Arity = usize;

/// Static result type of an expression as known at bind time.
///
/// `Any` is reported for expressions whose type cannot be known before evaluation
/// (variable references); parameter checks accept it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StaticType {
    String,
    Number,
    Boolean,
    NodeSet,
    Any,
}

impl fmt::Display for StaticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StaticType::String => "string",
            StaticType::Number => "number",
            StaticType::Boolean => "boolean",
            StaticType::NodeSet => "node-set",
            StaticType::Any => "any",
        })
    }
}

/// Focus passed into function implementations.
pub struct CallCtx<'a, N> {
    pub context_item: Option<&'a XdmItem<N>>,
    pub position: usize,
    pub last: usize,
}

pub type FunctionImpl<N> =
    Arc<dyn Fn(&CallCtx<N>, &[XdmSequence<N>]) -> Result<XdmSequence<N>, Error> + Send + Sync>;

/// Wraps a closure as a [`FunctionImpl`], giving it the higher-ranked call signature.
pub fn function_impl<N, F>(f: F) -> FunctionImpl<N>
where
    F: Fn(&CallCtx<N>, &[XdmSequence<N>]) -> Result<XdmSequence<N>, Error> + Send + Sync + 'static,
{
    Arc::new(f)
}

#[derive(Debug, Clone)]
pub struct FunctionSignature {
    pub min_arity: Arity,
    pub max_arity: Option<Arity>,
    /// Declared parameter types; the last entry repeats for variadic tails.
    /// Only `NodeSet` is enforced, every other type is reached by conversion.
    pub params: Vec<StaticType>,
    pub return_type: StaticType,
}

impl FunctionSignature {
    pub fn accepts_arity(&self, arity: Arity) -> bool {
        arity >= self.min_arity && self.max_arity.is_none_or(|m| arity <= m)
    }

    pub fn param(&self, index: usize) -> StaticType {
        self.params.get(index).or_else(|| self.params.last()).copied().unwrap_or(StaticType::Any)
    }
}

pub struct Registration<N> {
    pub signature: FunctionSignature,
    pub func: FunctionImpl<N>,
}

/// Error type returned by function resolution.
#[derive(Debug, Clone)]
pub enum ResolveError {
    /// No function with this name exists.
    Unknown(ExpandedName),
    /// Function exists, but not for the requested arity. Provides known arities.
    WrongArity { name: ExpandedName, available: Vec<Arity> },
}

/// Built-in function table keyed by expanded name. Each name holds one or more
/// arity ranges; a call matches when `min <= argc <= max` (`max = None` is variadic).
pub struct FunctionRegistry<N> {
    fns: HashMap<ExpandedName, Vec<Registration<N>>>,
}

impl<N> Default for FunctionRegistry<N> {
    fn default() -> Self {
        Self { fns: HashMap::new() }
    }
}

impl<N> FunctionRegistry<N> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: ExpandedName, signature: FunctionSignature, func: FunctionImpl<N>) {
        let entry = self.fns.entry(name).or_default();
        entry.push(Registration { signature, func });
        // Most specific first: higher min, then smaller max (None last).
        entry.sort_by(|a, b| {
            b.signature.min_arity.cmp(&a.signature.min_arity).then_with(|| {
                match (a.signature.max_arity, b.signature.max_arity) {
                    (Some(x), Some(y)) => x.cmp(&y),
                    (Some(_), None) => core::cmp::Ordering::Less,
                    (None, Some(_)) => core::cmp::Ordering::Greater,
                    (None, None) => core::cmp::Ordering::Equal,
                }
            })
        });
    }

    /// Convenience: register a no-namespace function with an arity range and a plain closure.
    pub fn register_local_range<F>(
        &mut self,
        local: &str,
        min_arity: Arity,
        max_arity: Option<Arity>,
        params: &[StaticType],
        return_type: StaticType,
        f: F,
    ) where
        F: 'static + Send + Sync + Fn(&CallCtx<N>, &[XdmSequence<N>]) -> Result<XdmSequence<N>, Error>,
    {
        let signature =
            FunctionSignature { min_arity, max_arity, params: params.to_vec(), return_type };
        self.register(ExpandedName::local(local), signature, function_impl(f));
    }

    /// Convenience: register a no-namespace function with an exact arity.
    pub fn register_local<F>(
        &mut self,
        local: &str,
        arity: Arity,
        params: &[StaticType],
        return_type: StaticType,
        f: F,
    ) where
        F: 'static + Send + Sync + Fn(&CallCtx<N>, &[XdmSequence<N>]) -> Result<XdmSequence<N>, Error>,
    {
        self.register_local_range(local, arity, Some(arity), params, return_type, f);
    }

    pub fn resolve(&self, name: &ExpandedName, arity: Arity) -> Result<&Registration<N>, ResolveError> {
        let Some(cands) = self.fns.get(name) else {
            return Err(ResolveError::Unknown(name.clone()));
        };
        if let Some(reg) = cands.iter().find(|r| r.signature.accepts_arity(arity)) {
            return Ok(reg);
        }
        let mut available: Vec<Arity> = Vec::new();
        for r in cands {
            if let Some(m) = r.signature.max_arity {
                available.extend(r.signature.min_arity..=m);
            }
        }
        available.sort_unstable();
        available.dedup();
        Err(ResolveError::WrongArity { name: name.clone(), available })
    }
}

/// Function bound to a call site by a [`QueryContext`].
pub struct ResolvedFunction<N> {
    pub return_type: StaticType,
    pub func: FunctionImpl<N>,
}

/// Pluggable resolver consulted at bind time for every function call the
/// built-in library does not define, and for every variable reference.
pub trait QueryContext<N>: Send + Sync {
    /// Returns `Ok(None)` when the name is not known here; the engine then raises
    /// its own unknown-function error.
    fn resolve_function(
        &self,
        name: &ExpandedName,
        arg_types: &[StaticType],
    ) -> Result<Option<ResolvedFunction<N>>, Error>;

    fn resolve_variable(&self, name: &ExpandedName) -> Result<XdmSequence<N>, Error> {
        Err(Error::static_code(ErrorCode::XPST0008, format!("unknown variable ${}", name.local)))
    }
}

/// Context without extension functions or variables.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyQueryContext;

impl<N> QueryContext<N> for EmptyQueryContext {
    fn resolve_function(
        &self,
        _name: &ExpandedName,
        _arg_types: &[StaticType],
    ) -> Result<Option<ResolvedFunction<N>>, Error> {
        Ok(None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Static,
    Dynamic,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorKind::Static => "static",
            ErrorKind::Dynamic => "dynamic",
        })
    }
}

/// Canonical subset of XPath error codes the engine emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    FOER0000, // generic
    FORX0002, // invalid regular expression
    XPTY0004, // type error
    XPTY0019, // path step applied to a non-node
    XPST0003, // syntax error
    XPST0008, // unknown variable
    XPST0017, // unknown function / wrong arity
    XPST0081, // unknown namespace prefix
    XPDY0002, // no context item
    NYI0000,  // not implemented
    Unknown,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        use ErrorCode::*;
        match self {
            FOER0000 => "err:FOER0000",
            FORX0002 => "err:FORX0002",
            XPTY0004 => "err:XPTY0004",
            XPTY0019 => "err:XPTY0019",
            XPST0003 => "err:XPST0003",
            XPST0008 => "err:XPST0008",
            XPST0017 => "err:XPST0017",
            XPST0081 => "err:XPST0081",
            XPDY0002 => "err:XPDY0002",
            NYI0000 => "err:NYI0000",
            Unknown => "err:UNKNOWN",
        }
    }

    pub fn from_code(s: &str) -> Self {
        use ErrorCode::*;
        match s {
            "err:FOER0000" => FOER0000,
            "err:FORX0002" => FORX0002,
            "err:XPTY0004" => XPTY0004,
            "err:XPTY0019" => XPTY0019,
            "err:XPST0003" => XPST0003,
            "err:XPST0008" => XPST0008,
            "err:XPST0017" => XPST0017,
            "err:XPST0081" => XPST0081,
            "err:XPDY0002" => XPDY0002,
            "err:NYI0000" => NYI0000,
            _ => Unknown,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {message} ({code})")]
pub struct Error {
    pub kind: ErrorKind,
    pub code: String,
    pub message: String,
}

impl Error {
    pub fn static_err(code: &str, msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Static, code: code.to_string(), message: msg.into() }
    }

    pub fn dynamic_err(code: &str, msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Dynamic, code: code.to_string(), message: msg.into() }
    }

    pub fn dynamic(code: ErrorCode, msg: impl Into<String>) -> Self {
        Self::dynamic_err(code.as_str(), msg)
    }

    pub fn static_code(code: ErrorCode, msg: impl Into<String>) -> Self {
        Self::static_err(code.as_str(), msg)
    }

    pub fn not_implemented(feature: &str) -> Self {
        Self::static_code(ErrorCode::NYI0000, format!("not implemented: {feature}"))
    }

    pub fn code_enum(&self) -> ErrorCode {
        ErrorCode::from_code(&self.code)
    }
}

#[derive(Debug, Clone, Default)]
pub struct NamespaceBindings {
    pub by_prefix: HashMap<String, String>,
}

pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// Compile-time settings. Captured into the compiled expression; node tests with
/// prefixes are resolved against `namespaces`.
#[derive(Debug, Clone)]
pub struct StaticContext {
    pub namespaces: NamespaceBindings,
}

impl Default for StaticContext {
    fn default() -> Self {
        let mut ns = NamespaceBindings::default();
        ns.by_prefix.insert("xml".to_string(), XML_NS.to_string());
        Self { namespaces: ns }
    }
}

pub struct StaticContextBuilder {
    ctx: StaticContext,
}

impl Default for StaticContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticContextBuilder {
    pub fn new() -> Self {
        Self { ctx: StaticContext::default() }
    }

    /// Register a namespace prefix → URI mapping. The reserved `xml` prefix cannot be rebound.
    pub fn with_namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        let p = prefix.into();
        if p == "xml" {
            return self;
        }
        self.ctx.namespaces.by_prefix.insert(p, uri.into());
        self
    }

    pub fn build(self) -> StaticContext {
        self.ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn most_specific_range_wins() {
        let mut reg: FunctionRegistry<()> = FunctionRegistry::new();
        reg.register_local_range("f", 1, None, &[], StaticType::String, |_, _| {
            Ok(vec![XdmItem::string("variadic")])
        });
        reg.register_local("f", 2, &[], StaticType::Boolean, |_, _| Ok(vec![XdmItem::boolean(true)]));
        let name = ExpandedName::local("f");
        assert_eq!(reg.resolve(&name, 2).ok().map(|r| r.signature.return_type), Some(StaticType::Boolean));
        assert_eq!(reg.resolve(&name, 5).ok().map(|r| r.signature.return_type), Some(StaticType::String));
    }

    #[test]
    fn wrong_arity_lists_available() {
        let mut reg: FunctionRegistry<()> = FunctionRegistry::new();
        reg.register_local_range("g", 1, Some(2), &[], StaticType::String, |_, _| Ok(vec![]));
        match reg.resolve(&ExpandedName::local("g"), 3) {
            Err(ResolveError::WrongArity { available, .. }) => assert_eq!(available, vec![1, 2]),
            _ => panic!("expected wrong arity"),
        }
        assert!(matches!(reg.resolve(&ExpandedName::local("h"), 0), Err(ResolveError::Unknown(_))));
    }

    #[test]
    fn xml_prefix_cannot_be_rebound() {
        let ctx = StaticContextBuilder::new().with_namespace("xml", "urn:x").with_namespace("p", "urn:p").build();
        assert_eq!(ctx.namespaces.by_prefix.get("xml").map(String::as_str), Some(XML_NS));
        assert_eq!(ctx.namespaces.by_prefix.get("p").map(String::as_str), Some("urn:p"));
    }
}
