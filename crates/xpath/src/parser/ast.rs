//! AST for XPath 1.0 expressions.

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneralComp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QName {
    pub prefix: Option<String>,
    pub local: String,
}

impl QName {
    pub fn lexical(&self) -> String {
        match &self.prefix {
            Some(p) => format!("{p}:{}", self.local),
            None => self.local.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    VarRef(QName),
    FunctionCall {
        name: QName,
        args: Vec<Expr>,
    },
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    GeneralComparison {
        left: Box<Expr>,
        op: GeneralComp,
        right: Box<Expr>,
    },
    Negate(Box<Expr>),
    Union(Box<Expr>, Box<Expr>),
    Path(PathExpr),
    /// `primary[pred]...` optionally continued by location steps (`(//a)[1]/b`).
    Filter {
        primary: Box<Expr>,
        predicates: Vec<Expr>,
        steps: Vec<Step>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathStart {
    Root,
    Relative,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathExpr {
    pub start: PathStart,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub axis: Axis,
    pub test: NodeTest,
    pub predicates: Vec<Expr>,
}

impl Step {
    /// `descendant-or-self::node()`, the expansion of `//`.
    pub fn descendant_or_self() -> Self {
        Step { axis: Axis::DescendantOrSelf, test: NodeTest::Kind(KindTest::AnyKind), predicates: vec![] }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Child,
    Descendant,
    Attribute,
    SelfAxis,
    DescendantOrSelf,
    FollowingSibling,
    Following,
    Namespace,
    Parent,
    Ancestor,
    PrecedingSibling,
    Preceding,
    AncestorOrSelf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeTest {
    Name(QName),
    /// `*`
    Wildcard,
    /// `prefix:*`
    PrefixWildcard(String),
    Kind(KindTest),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KindTest {
    AnyKind,
    Text,
    Comment,
    ProcessingInstruction(Option<String>),
}
