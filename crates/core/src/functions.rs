//! `lower-case()` and `matches()` for XPath 1.0 queries.
//!
//! [`XPath20Functions`] is consulted by the engine for every call its own
//! library does not define. Arguments are type-checked when the query is
//! bound and coerced to strings when it runs:
//!
//! - a string is used as is,
//! - a node-set contributes the string value of its first node, or `""` when empty.

use findxml_xpath::convert::to_string;
use findxml_xpath::runtime::{ErrorCode, ResolvedFunction, StaticType};
use findxml_xpath::{CallCtx, Error, ExpandedName, QueryContext, XdmItem, XdmNode, XdmSequence, function_impl};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnKind {
    String,
    Boolean,
}

impl ReturnKind {
    pub fn static_type(self) -> StaticType {
        match self {
            ReturnKind::String => StaticType::String,
            ReturnKind::Boolean => StaticType::Boolean,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionValue {
    String(String),
    Boolean(bool),
}

impl FunctionValue {
    fn into_item<N>(self) -> XdmItem<N> {
        match self {
            FunctionValue::String(s) => XdmItem::string(s),
            FunctionValue::Boolean(b) => XdmItem::boolean(b),
        }
    }
}

pub type Evaluate = Arc<dyn Fn(&[String]) -> Result<FunctionValue, Error> + Send + Sync>;

/// Name, arity bounds, return kind and behavior of one extension function.
#[derive(Clone)]
pub struct FunctionDescriptor {
    pub name: &'static str,
    pub min_args: usize,
    pub max_args: usize,
    pub return_kind: ReturnKind,
    evaluate: Evaluate,
}

impl FunctionDescriptor {
    pub fn new<F>(name: &'static str, min_args: usize, max_args: usize, return_kind: ReturnKind, evaluate: F) -> Self
    where
        F: Fn(&[String]) -> Result<FunctionValue, Error> + Send + Sync + 'static,
    {
        Self { name, min_args, max_args, return_kind, evaluate: Arc::new(evaluate) }
    }

    pub fn accepts_arity(&self, argc: usize) -> bool {
        (self.min_args..=self.max_args).contains(&argc)
    }

    /// Runs the function on already coerced arguments.
    pub fn invoke(&self, args: &[String]) -> Result<FunctionValue, Error> {
        if !self.accepts_arity(args.len()) {
            return Err(self.arity_error(args.len()));
        }
        (self.evaluate)(args)
    }

    fn arity_error(&self, argc: usize) -> Error {
        Error::static_code(
            ErrorCode::XPST0017,
            format!("function {}() takes {}, found {argc}", self.name, self.arity_text()),
        )
    }

    fn arity_text(&self) -> String {
        if self.min_args == self.max_args {
            format!("{} argument(s)", self.min_args)
        } else {
            format!("{} to {} arguments", self.min_args, self.max_args)
        }
    }
}

impl fmt::Debug for FunctionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDescriptor")
            .field("name", &self.name)
            .field("min_args", &self.min_args)
            .field("max_args", &self.max_args)
            .field("return_kind", &self.return_kind)
            .finish_non_exhaustive()
    }
}

/// Extension function table. Immutable once built and shared by every file of a search.
#[derive(Debug, Clone)]
pub struct XPath20Functions {
    functions: HashMap<&'static str, FunctionDescriptor>,
}

impl Default for XPath20Functions {
    fn default() -> Self {
        Self::new()
    }
}

impl XPath20Functions {
    pub fn new() -> Self {
        let mut functions = HashMap::new();
        for descriptor in [
            FunctionDescriptor::new("lower-case", 1, 1, ReturnKind::String, lower_case),
            FunctionDescriptor::new("matches", 2, 3, ReturnKind::Boolean, matches),
        ] {
            functions.insert(descriptor.name, descriptor);
        }
        Self { functions }
    }

    pub fn get(&self, name: &str) -> Option<&FunctionDescriptor> {
        self.functions.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.functions.keys().copied()
    }
}

fn lower_case(args: &[String]) -> Result<FunctionValue, Error> {
    Ok(FunctionValue::String(args[0].to_lowercase()))
}

/// Unanchored search: true when the pattern matches anywhere in the value.
fn matches(args: &[String]) -> Result<FunctionValue, Error> {
    let (value, pattern) = (&args[0], &args[1]);
    let ignore_case = args.get(2).is_some_and(|flags| flags.eq_ignore_ascii_case("i"));
    let mut builder = fancy_regex::RegexBuilder::new(pattern);
    builder.case_insensitive(ignore_case);
    let regex = builder.build().map_err(|e| {
        Error::dynamic(ErrorCode::FORX0002, format!("invalid regular expression '{pattern}': {e}"))
    })?;
    let found = regex
        .is_match(value)
        .map_err(|e| Error::dynamic(ErrorCode::FORX0002, format!("regular expression '{pattern}' failed: {e}")))?;
    Ok(FunctionValue::Boolean(found))
}

fn check_argument_types(descriptor: &FunctionDescriptor, arg_types: &[StaticType]) -> Result<(), Error> {
    if !descriptor.accepts_arity(arg_types.len()) {
        return Err(descriptor.arity_error(arg_types.len()));
    }
    for (i, t) in arg_types.iter().enumerate() {
        if !matches!(t, StaticType::String | StaticType::NodeSet | StaticType::Any) {
            return Err(Error::static_code(
                ErrorCode::XPTY0004,
                format!(
                    "incorrect argument type: string or node-set expected for argument {} of {}(), found {t}",
                    i + 1,
                    descriptor.name
                ),
            ));
        }
    }
    Ok(())
}

impl<N: XdmNode> QueryContext<N> for XPath20Functions {
    fn resolve_function(
        &self,
        name: &ExpandedName,
        arg_types: &[StaticType],
    ) -> Result<Option<ResolvedFunction<N>>, Error> {
        if name.ns_uri.is_some() {
            return Ok(None);
        }
        let Some(descriptor) = self.functions.get(name.local.as_str()) else {
            return Ok(None);
        };
        check_argument_types(descriptor, arg_types)?;
        let descriptor = descriptor.clone();
        Ok(Some(ResolvedFunction {
            return_type: descriptor.return_kind.static_type(),
            func: function_impl(move |_ctx: &CallCtx<N>, args: &[XdmSequence<N>]| {
                let strings: Vec<String> = args.iter().map(|a| to_string(a)).collect();
                Ok(vec![descriptor.invoke(&strings)?.into_item()])
            }),
        }))
    }

    fn resolve_variable(&self, name: &ExpandedName) -> Result<XdmSequence<N>, Error> {
        Err(Error::not_implemented(&format!("variable ${}", name.local)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn call(name: &str, args: &[&str]) -> FunctionValue {
        let functions = XPath20Functions::new();
        let args: Vec<String> = args.iter().map(ToString::to_string).collect();
        functions.get(name).unwrap().invoke(&args).unwrap()
    }

    #[rstest]
    #[case::case_sensitive(&["Hello", "hello"], false)]
    #[case::ignore_case(&["Hello", "hello", "i"], true)]
    #[case::ignore_case_upper_flag(&["Hello", "hello", "I"], true)]
    #[case::other_flags_ignored(&["Hello", "hello", "x"], false)]
    #[case::anchored(&["abc123", r"^\d+$"], false)]
    #[case::unanchored(&["x123y", r"\d+"], true)]
    #[case::anchored_full(&["123", r"^\d+$"], true)]
    #[case::empty_pattern(&["", ""], true)]
    #[case::backreference(&["abab", r"(ab)\1"], true)]
    fn matches_semantics(#[case] args: &[&str], #[case] expected: bool) {
        assert_eq!(call("matches", args), FunctionValue::Boolean(expected));
    }

    #[rstest]
    #[case("ABC", "abc")]
    #[case("", "")]
    #[case("ÄÖÜ Straße", "äöü straße")]
    fn lower_case_is_total(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(call("lower-case", &[input]), FunctionValue::String(expected.to_string()));
    }

    #[test]
    fn invalid_pattern_is_a_regex_error() {
        let functions = XPath20Functions::new();
        let err = functions.get("matches").unwrap().invoke(&["a".into(), "(".into()]).unwrap_err();
        assert_eq!(err.code_enum(), ErrorCode::FORX0002);
    }

    #[rstest]
    #[case::lower_case_without_args("lower-case", &[])]
    #[case::matches_with_one_arg("matches", &["x"])]
    #[case::matches_with_four_args("matches", &["x", "x", "i", "x"])]
    fn direct_calls_check_arity(#[case] name: &str, #[case] args: &[&str]) {
        let functions = XPath20Functions::new();
        let args: Vec<String> = args.iter().map(ToString::to_string).collect();
        let err = functions.get(name).unwrap().invoke(&args).unwrap_err();
        assert_eq!(err.code_enum(), ErrorCode::XPST0017);
    }

    #[rstest]
    #[case::number(&[StaticType::Number], ErrorCode::XPTY0004)]
    #[case::boolean(&[StaticType::Boolean], ErrorCode::XPTY0004)]
    #[case::too_many(&[StaticType::String, StaticType::String], ErrorCode::XPST0017)]
    fn lower_case_binding_errors(#[case] types: &[StaticType], #[case] code: ErrorCode) {
        let functions = XPath20Functions::new();
        let err = check_argument_types(functions.get("lower-case").unwrap(), types).unwrap_err();
        assert_eq!(err.code_enum(), code);
    }

    #[test]
    fn names_are_registered() {
        let mut names: Vec<&str> = XPath20Functions::new().names().collect();
        names.sort_unstable();
        assert_eq!(names, vec!["lower-case", "matches"]);
    }
}
