use crate::runtime::StaticType;
use crate::xdm::{ExpandedName, XdmAtomicValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisIR {
    Child,
    Attribute,
    SelfAxis,
    DescendantOrSelf,
    Descendant,
    Parent,
    Ancestor,
    AncestorOrSelf,
    PrecedingSibling,
    FollowingSibling,
    Preceding,
    Following,
}

impl AxisIR {
    /// Reverse axes number their nodes nearest-first for positional predicates.
    pub fn is_reverse(self) -> bool {
        matches!(
            self,
            AxisIR::Parent
                | AxisIR::Ancestor
                | AxisIR::AncestorOrSelf
                | AxisIR::PrecedingSibling
                | AxisIR::Preceding
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeTestIR {
    AnyKind,            // node()
    Name(ExpandedName), // QName
    WildcardAny,        // *
    NsWildcard(String), // ns:*

    KindText,                                  // text()
    KindComment,                               // comment()
    KindProcessingInstruction(Option<String>), // processing-instruction('target'?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OpCode {
    // Data and variables
    PushAtomic(XdmAtomicValue),
    LoadVar(usize),
    LoadContextItem,
    ToRoot,

    // Steps / filters
    AxisStep(AxisIR, NodeTestIR, Vec<InstrSeq>),
    // Apply n predicates to TOS sequence; each predicate is a separate InstrSeq.
    ApplyPredicates(Vec<InstrSeq>),

    // Arithmetic / logic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Neg,
    ToEBV,
    Pop,
    JumpIfTrue(usize),  // relative forward
    JumpIfFalse(usize), // relative forward

    CompareGeneral(ComparisonOp),
    Union,

    // Call site index, argc
    Call(usize, usize),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstrSeq(pub Vec<OpCode>);

/// Where the static type of a call argument comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    Known(StaticType),
    /// Return type of an earlier call site, known once that site is bound.
    CallResult(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallSite {
    pub name: ExpandedName,
    /// Name as written in the query, for diagnostics.
    pub lexical: String,
    pub args: Vec<ArgType>,
}

#[derive(Debug, Clone)]
pub struct CompiledIR {
    pub instrs: InstrSeq,
    /// Call sites in evaluation order: arguments are always lowered before the call itself.
    pub call_sites: Vec<CallSite>,
    pub variables: Vec<ExpandedName>,
    pub source: String,
}
