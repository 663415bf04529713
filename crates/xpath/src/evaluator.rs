use crate::compiler::XPathExpression;
use crate::compiler::ir::{ArgType, AxisIR, CallSite, ComparisonOp, CompiledIR, InstrSeq, NodeTestIR, OpCode};
use crate::convert::{atomic_to_number, is_node_set, item_to_number, item_to_string, string_to_number, to_boolean};
use crate::functions::default_function_registry;
use crate::model::{NodeKind, XdmNode};
use crate::runtime::{
    CallCtx, Error, ErrorCode, FunctionImpl, FunctionRegistry, QueryContext, ResolveError, ResolvedFunction,
    StaticType,
};
use crate::xdm::{XdmAtomicValue, XdmItem, XdmSequence};
use core::fmt;
use std::sync::Arc;

impl XPathExpression {
    /// Resolves every call site, built-in library first, then `ctx`, and binds
    /// the variables the query references.
    pub fn bind<N: XdmNode>(&self, ctx: &dyn QueryContext<N>) -> Result<BoundExpression<N>, Error> {
        let registry = default_function_registry::<N>();
        let mut functions = Vec::with_capacity(self.ir.call_sites.len());
        let mut return_types: Vec<StaticType> = Vec::with_capacity(self.ir.call_sites.len());
        for (index, site) in self.ir.call_sites.iter().enumerate() {
            let arg_types: Vec<StaticType> = site
                .args
                .iter()
                .map(|a| match a {
                    ArgType::Known(t) => *t,
                    ArgType::CallResult(j) => return_types.get(*j).copied().unwrap_or(StaticType::Any),
                })
                .collect();
            let resolved = bind_call(&registry, ctx, site, &arg_types)?;
            tracing::trace!(function = %site.lexical, site = index, return_type = %resolved.return_type, "bound call");
            return_types.push(resolved.return_type);
            functions.push(resolved.func);
        }
        let variables =
            self.ir.variables.iter().map(|v| ctx.resolve_variable(v)).collect::<Result<Vec<_>, _>>()?;
        Ok(BoundExpression { ir: Arc::clone(&self.ir), functions, variables })
    }
}

fn bind_call<N: XdmNode>(
    registry: &FunctionRegistry<N>,
    ctx: &dyn QueryContext<N>,
    site: &CallSite,
    arg_types: &[StaticType],
) -> Result<ResolvedFunction<N>, Error> {
    match registry.resolve(&site.name, arg_types.len()) {
        Ok(reg) => {
            for (i, t) in arg_types.iter().enumerate() {
                if reg.signature.param(i) == StaticType::NodeSet && !matches!(t, StaticType::NodeSet | StaticType::Any) {
                    return Err(Error::static_code(
                        ErrorCode::XPTY0004,
                        format!("argument {} of {}() must be a node-set, found {t}", i + 1, site.lexical),
                    ));
                }
            }
            Ok(ResolvedFunction { return_type: reg.signature.return_type, func: Arc::clone(&reg.func) })
        }
        Err(ResolveError::WrongArity { available, .. }) => {
            let mut msg = format!("function {}() cannot take {} argument(s)", site.lexical, arg_types.len());
            if !available.is_empty() {
                let list: Vec<String> = available.iter().map(ToString::to_string).collect();
                msg.push_str(&format!("; accepted: {}", list.join(", ")));
            }
            Err(Error::static_code(ErrorCode::XPST0017, msg))
        }
        Err(ResolveError::Unknown(_)) => ctx.resolve_function(&site.name, arg_types)?.ok_or_else(|| {
            Error::static_code(ErrorCode::XPST0017, format!("unknown function {}()", site.lexical))
        }),
    }
}

/// A query bound to its functions and variables, ready to run against any
/// number of trees of node type `N`.
pub struct BoundExpression<N> {
    ir: Arc<CompiledIR>,
    functions: Vec<FunctionImpl<N>>,
    variables: Vec<XdmSequence<N>>,
}

impl<N> fmt::Debug for BoundExpression<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundExpression")
            .field("source", &self.ir.source)
            .field("functions", &self.functions.len())
            .field("variables", &self.variables.len())
            .finish()
    }
}

impl<N: XdmNode> BoundExpression<N> {
    pub fn source(&self) -> &str {
        &self.ir.source
    }

    /// Evaluates with `context` as context node (position 1 of 1).
    pub fn evaluate(&self, context: Option<&N>) -> Result<XdmSequence<N>, Error> {
        let item = context.map(|n| XdmItem::Node(n.clone()));
        self.run_instrs(&self.ir.instrs, item.as_ref(), 1, 1)
    }

    /// Evaluates and requires the result to be a node-set, returned in document order.
    pub fn select(&self, context: &N) -> Result<Vec<N>, Error> {
        self.evaluate(Some(context))?
            .into_iter()
            .map(|item| match item {
                XdmItem::Node(n) => Ok(n),
                XdmItem::Atomic(_) => {
                    Err(Error::dynamic(ErrorCode::XPTY0004, "expression must evaluate to a node-set"))
                }
            })
            .collect()
    }

    fn run_instrs(
        &self,
        instrs: &InstrSeq,
        context_item: Option<&XdmItem<N>>,
        position: usize,
        last: usize,
    ) -> Result<XdmSequence<N>, Error> {
        let mut stack: Vec<XdmSequence<N>> = Vec::new();
        let code = &instrs.0;
        let mut ip: usize = 0;
        while ip < code.len() {
            match &code[ip] {
                OpCode::PushAtomic(a) => stack.push(vec![XdmItem::Atomic(a.clone())]),
                OpCode::LoadVar(slot) => {
                    let value = self
                        .variables
                        .get(*slot)
                        .ok_or_else(|| Error::dynamic(ErrorCode::XPST0008, "unbound variable slot"))?;
                    stack.push(value.clone());
                }
                OpCode::LoadContextItem => match context_item {
                    Some(ci) => stack.push(vec![ci.clone()]),
                    None => return Err(Error::dynamic(ErrorCode::XPDY0002, "no context item defined")),
                },
                OpCode::ToRoot => {
                    let nodes = node_seq(pop(&mut stack)?)?;
                    let mut roots: Vec<N> = nodes.iter().map(root_of).collect();
                    doc_order_distinct(&mut roots);
                    stack.push(roots.into_iter().map(XdmItem::Node).collect());
                }
                OpCode::AxisStep(axis, test, preds) => {
                    let nodes = node_seq(pop(&mut stack)?)?;
                    let mut acc: Vec<N> = Vec::new();
                    for n in &nodes {
                        let mut candidates: XdmSequence<N> = axis_nodes(n, *axis)
                            .into_iter()
                            .filter(|c| matches_test(c, test, *axis))
                            .map(XdmItem::Node)
                            .collect();
                        for p in preds {
                            candidates = self.apply_predicate(candidates, p)?;
                        }
                        acc.extend(candidates.into_iter().filter_map(|i| match i {
                            XdmItem::Node(n) => Some(n),
                            XdmItem::Atomic(_) => None,
                        }));
                    }
                    doc_order_distinct(&mut acc);
                    stack.push(acc.into_iter().map(XdmItem::Node).collect());
                }
                OpCode::ApplyPredicates(preds) => {
                    let mut seq = pop(&mut stack)?;
                    for p in preds {
                        seq = self.apply_predicate(seq, p)?;
                    }
                    stack.push(seq);
                }
                OpCode::Add => bin_num(&mut stack, |a, b| a + b)?,
                OpCode::Sub => bin_num(&mut stack, |a, b| a - b)?,
                OpCode::Mul => bin_num(&mut stack, |a, b| a * b)?,
                OpCode::Div => bin_num(&mut stack, |a, b| a / b)?,
                OpCode::Mod => bin_num(&mut stack, |a, b| a % b)?,
                OpCode::Neg => {
                    let v = pop(&mut stack)?;
                    stack.push(vec![XdmItem::double(-first_number(&v))]);
                }
                OpCode::ToEBV => {
                    let v = pop(&mut stack)?;
                    stack.push(vec![XdmItem::boolean(to_boolean(&v))]);
                }
                OpCode::Pop => {
                    pop(&mut stack)?;
                }
                OpCode::JumpIfTrue(off) => {
                    let top = stack.last().ok_or_else(underflow)?;
                    if to_boolean(top) {
                        ip += off + 1;
                        continue;
                    }
                }
                OpCode::JumpIfFalse(off) => {
                    let top = stack.last().ok_or_else(underflow)?;
                    if !to_boolean(top) {
                        ip += off + 1;
                        continue;
                    }
                }
                OpCode::CompareGeneral(op) => {
                    let r = pop(&mut stack)?;
                    let l = pop(&mut stack)?;
                    stack.push(vec![XdmItem::boolean(compare_general(&l, &r, *op))]);
                }
                OpCode::Union => {
                    let r = pop(&mut stack)?;
                    let l = pop(&mut stack)?;
                    if !is_node_set(&l) || !is_node_set(&r) {
                        return Err(Error::dynamic(ErrorCode::XPTY0004, "operands of '|' must be node-sets"));
                    }
                    let mut nodes = node_seq(l)?;
                    nodes.extend(node_seq(r)?);
                    doc_order_distinct(&mut nodes);
                    stack.push(nodes.into_iter().map(XdmItem::Node).collect());
                }
                OpCode::Call(site, argc) => {
                    if stack.len() < *argc {
                        return Err(underflow());
                    }
                    let args = stack.split_off(stack.len() - argc);
                    let func = self
                        .functions
                        .get(*site)
                        .ok_or_else(|| Error::dynamic(ErrorCode::XPST0017, "call site was not bound"))?;
                    let call_ctx = CallCtx { context_item, position, last };
                    stack.push((**func)(&call_ctx, &args)?);
                }
            }
            ip += 1;
        }
        Ok(stack.pop().unwrap_or_default())
    }

    // Numeric results select by proximity position, anything else by its boolean value.
    fn apply_predicate(&self, items: XdmSequence<N>, pred: &InstrSeq) -> Result<XdmSequence<N>, Error> {
        let last = items.len();
        let mut out = Vec::with_capacity(items.len());
        for (i, item) in items.into_iter().enumerate() {
            let r = self.run_instrs(pred, Some(&item), i + 1, last)?;
            let keep = match r.as_slice() {
                [XdmItem::Atomic(XdmAtomicValue::Double(d))] => *d == (i + 1) as f64,
                _ => to_boolean(&r),
            };
            if keep {
                out.push(item);
            }
        }
        Ok(out)
    }
}

fn underflow() -> Error {
    Error::dynamic(ErrorCode::FOER0000, "stack underflow")
}

fn pop<N>(stack: &mut Vec<XdmSequence<N>>) -> Result<XdmSequence<N>, Error> {
    stack.pop().ok_or_else(underflow)
}

fn bin_num<N: XdmNode>(stack: &mut Vec<XdmSequence<N>>, f: impl Fn(f64, f64) -> f64) -> Result<(), Error> {
    let r = pop(stack)?;
    let l = pop(stack)?;
    stack.push(vec![XdmItem::double(f(first_number(&l), first_number(&r)))]);
    Ok(())
}

fn first_number<N: XdmNode>(seq: &[XdmItem<N>]) -> f64 {
    seq.first().map_or(f64::NAN, item_to_number)
}

fn node_seq<N>(seq: XdmSequence<N>) -> Result<Vec<N>, Error> {
    seq.into_iter()
        .map(|i| match i {
            XdmItem::Node(n) => Ok(n),
            XdmItem::Atomic(_) => Err(Error::dynamic(ErrorCode::XPTY0019, "path step applied to a non-node")),
        })
        .collect()
}

fn doc_order_distinct<N: XdmNode>(nodes: &mut Vec<N>) {
    nodes.sort_by(|a, b| a.compare_document_order(b));
    nodes.dedup();
}

fn root_of<N: XdmNode>(n: &N) -> N {
    let mut cur = n.clone();
    while let Some(p) = cur.parent() {
        cur = p;
    }
    cur
}

fn is_attribute_like<N: XdmNode>(n: &N) -> bool {
    matches!(n.kind(), NodeKind::Attribute | NodeKind::Namespace)
}

fn push_descendants<N: XdmNode>(n: &N, out: &mut Vec<N>) {
    for c in n.children() {
        out.push(c.clone());
        push_descendants(&c, out);
    }
}

fn siblings<N: XdmNode>(n: &N) -> (Vec<N>, Vec<N>) {
    if is_attribute_like(n) {
        return (Vec::new(), Vec::new());
    }
    let Some(parent) = n.parent() else {
        return (Vec::new(), Vec::new());
    };
    let mut all = parent.children();
    match all.iter().position(|c| c == n) {
        Some(i) => {
            let after = all.split_off(i + 1);
            all.truncate(i);
            all.reverse();
            (all, after)
        }
        None => (Vec::new(), Vec::new()),
    }
}

/// Nodes of `axis` from `n`, in axis order (reverse axes nearest-first).
fn axis_nodes<N: XdmNode>(n: &N, axis: AxisIR) -> Vec<N> {
    match axis {
        AxisIR::Child => {
            if is_attribute_like(n) {
                Vec::new()
            } else {
                n.children()
            }
        }
        AxisIR::Attribute => {
            if n.kind() == NodeKind::Element {
                n.attributes()
            } else {
                Vec::new()
            }
        }
        AxisIR::SelfAxis => vec![n.clone()],
        AxisIR::Descendant => {
            let mut out = Vec::new();
            push_descendants(n, &mut out);
            out
        }
        AxisIR::DescendantOrSelf => {
            let mut out = vec![n.clone()];
            push_descendants(n, &mut out);
            out
        }
        AxisIR::Parent => n.parent().into_iter().collect(),
        AxisIR::Ancestor | AxisIR::AncestorOrSelf => {
            let mut out = Vec::new();
            if axis == AxisIR::AncestorOrSelf {
                out.push(n.clone());
            }
            let mut cur = n.parent();
            while let Some(p) = cur {
                cur = p.parent();
                out.push(p);
            }
            out
        }
        AxisIR::PrecedingSibling => siblings(n).0,
        AxisIR::FollowingSibling => siblings(n).1,
        AxisIR::Following => {
            let mut out = Vec::new();
            let mut cur = n.clone();
            if is_attribute_like(n) {
                let Some(p) = n.parent() else { return out };
                push_descendants(&p, &mut out);
                cur = p;
            }
            loop {
                for s in siblings(&cur).1 {
                    out.push(s.clone());
                    push_descendants(&s, &mut out);
                }
                match cur.parent() {
                    Some(p) => cur = p,
                    None => break,
                }
            }
            out
        }
        AxisIR::Preceding => {
            let mut out = Vec::new();
            let mut cur = n.clone();
            if is_attribute_like(n) {
                let Some(p) = n.parent() else { return out };
                cur = p;
            }
            loop {
                for s in siblings(&cur).0 {
                    let mut sub = vec![s.clone()];
                    push_descendants(&s, &mut sub);
                    sub.reverse();
                    out.extend(sub);
                }
                match cur.parent() {
                    Some(p) => cur = p,
                    None => break,
                }
            }
            out
        }
    }
}

fn matches_test<N: XdmNode>(n: &N, test: &NodeTestIR, axis: AxisIR) -> bool {
    let principal = if axis == AxisIR::Attribute { NodeKind::Attribute } else { NodeKind::Element };
    match test {
        NodeTestIR::AnyKind => true,
        NodeTestIR::WildcardAny => n.kind() == principal,
        NodeTestIR::Name(expected) => {
            n.kind() == principal
                && n.name().is_some_and(|q| {
                    q.local == expected.local
                        && q.ns_uri.as_deref().filter(|u| !u.is_empty()) == expected.ns_uri.as_deref()
                })
        }
        NodeTestIR::NsWildcard(uri) => {
            n.kind() == principal && n.name().is_some_and(|q| q.ns_uri.as_deref() == Some(uri.as_str()))
        }
        NodeTestIR::KindText => n.kind() == NodeKind::Text,
        NodeTestIR::KindComment => n.kind() == NodeKind::Comment,
        NodeTestIR::KindProcessingInstruction(target) => {
            n.kind() == NodeKind::ProcessingInstruction
                && target.as_ref().is_none_or(|t| n.name().is_some_and(|q| q.local == *t))
        }
    }
}

fn flip(op: ComparisonOp) -> ComparisonOp {
    match op {
        ComparisonOp::Lt => ComparisonOp::Gt,
        ComparisonOp::Le => ComparisonOp::Ge,
        ComparisonOp::Gt => ComparisonOp::Lt,
        ComparisonOp::Ge => ComparisonOp::Le,
        other => other,
    }
}

fn is_equality(op: ComparisonOp) -> bool {
    matches!(op, ComparisonOp::Eq | ComparisonOp::Ne)
}

#[allow(clippy::float_cmp)]
fn cmp_num(a: f64, b: f64, op: ComparisonOp) -> bool {
    match op {
        ComparisonOp::Eq => a == b,
        ComparisonOp::Ne => a != b,
        ComparisonOp::Lt => a < b,
        ComparisonOp::Le => a <= b,
        ComparisonOp::Gt => a > b,
        ComparisonOp::Ge => a >= b,
    }
}

fn cmp_str(a: &str, b: &str, op: ComparisonOp) -> bool {
    if is_equality(op) {
        (a == b) == (op == ComparisonOp::Eq)
    } else {
        cmp_num(string_to_number(a), string_to_number(b), op)
    }
}

fn atomic_to_boolean(a: &XdmAtomicValue) -> bool {
    match a {
        XdmAtomicValue::Boolean(b) => *b,
        XdmAtomicValue::String(s) => !s.is_empty(),
        XdmAtomicValue::Double(d) => *d != 0.0 && !d.is_nan(),
    }
}

fn compare_atomics(a: &XdmAtomicValue, b: &XdmAtomicValue, op: ComparisonOp) -> bool {
    use XdmAtomicValue as V;
    if !is_equality(op) {
        return cmp_num(atomic_to_number(a), atomic_to_number(b), op);
    }
    match (a, b) {
        (V::Boolean(_), _) | (_, V::Boolean(_)) => {
            (atomic_to_boolean(a) == atomic_to_boolean(b)) == (op == ComparisonOp::Eq)
        }
        (V::Double(_), _) | (_, V::Double(_)) => cmp_num(atomic_to_number(a), atomic_to_number(b), op),
        _ => cmp_str(&a.to_xpath_string(), &b.to_xpath_string(), op),
    }
}

// Existential comparison of a node-set against a single atomic value.
fn compare_set_atomic<N: XdmNode>(set: &[XdmItem<N>], a: &XdmAtomicValue, op: ComparisonOp) -> bool {
    match a {
        XdmAtomicValue::Boolean(_) => compare_atomics(&XdmAtomicValue::Boolean(to_boolean(set)), a, op),
        XdmAtomicValue::Double(d) => set.iter().any(|n| cmp_num(item_to_number(n), *d, op)),
        XdmAtomicValue::String(s) => set.iter().any(|n| cmp_str(&item_to_string(n), s, op)),
    }
}

fn single_atomic<N: XdmNode>(seq: &[XdmItem<N>]) -> XdmAtomicValue {
    match seq.first() {
        Some(XdmItem::Atomic(a)) => a.clone(),
        Some(item @ XdmItem::Node(_)) => XdmAtomicValue::String(item_to_string(item)),
        None => XdmAtomicValue::String(String::new()),
    }
}

fn compare_general<N: XdmNode>(l: &[XdmItem<N>], r: &[XdmItem<N>], op: ComparisonOp) -> bool {
    match (is_node_set(l), is_node_set(r)) {
        (true, true) => l.iter().any(|a| {
            let sa = item_to_string(a);
            r.iter().any(|b| cmp_str(&sa, &item_to_string(b), op))
        }),
        (true, false) => compare_set_atomic(l, &single_atomic(r), op),
        (false, true) => compare_set_atomic(r, &single_atomic(l), flip(op)),
        (false, false) => compare_atomics(&single_atomic(l), &single_atomic(r), op),
    }
}
