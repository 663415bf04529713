use crate::parser::{ast, parse_xpath};
use crate::runtime::{Error, ErrorCode, StaticContext, StaticType};
use crate::xdm::{ExpandedName, XdmAtomicValue};
use std::sync::{Arc, OnceLock};

pub mod ir;

static DEFAULT_STATIC_CONTEXT: OnceLock<StaticContext> = OnceLock::new();

fn default_static_ctx() -> &'static StaticContext {
    DEFAULT_STATIC_CONTEXT.get_or_init(StaticContext::default)
}

/// A compiled query, independent of any document. Bind it with
/// [`XPathExpression::bind`] before running it.
#[derive(Debug, Clone)]
pub struct XPathExpression {
    pub(crate) ir: Arc<ir::CompiledIR>,
}

impl XPathExpression {
    pub fn source(&self) -> &str {
        &self.ir.source
    }

    pub fn ir(&self) -> &ir::CompiledIR {
        &self.ir
    }
}

/// Compile using a lazily initialized default StaticContext
pub fn compile_xpath(expr: &str) -> Result<XPathExpression, Error> {
    compile_xpath_with_context(expr, default_static_ctx())
}

/// Compile with an explicitly provided StaticContext
pub fn compile_xpath_with_context(expr: &str, static_ctx: &StaticContext) -> Result<XPathExpression, Error> {
    let ast = parse_xpath(expr)?;
    let mut c = Compiler::new(static_ctx);
    c.lower_expr(&ast)?;
    tracing::trace!(query = expr, ops = c.code.len(), call_sites = c.call_sites.len(), "compiled query");
    Ok(XPathExpression {
        ir: Arc::new(ir::CompiledIR {
            instrs: ir::InstrSeq(c.code),
            call_sites: c.call_sites,
            variables: c.variables,
            source: expr.to_string(),
        }),
    })
}

struct Compiler<'a> {
    static_ctx: &'a StaticContext,
    code: Vec<ir::OpCode>,
    call_sites: Vec<ir::CallSite>,
    variables: Vec<ExpandedName>,
}

type CResult<T> = Result<T, Error>;

impl<'a> Compiler<'a> {
    fn new(static_ctx: &'a StaticContext) -> Self {
        Self { static_ctx, code: Vec::new(), call_sites: Vec::new(), variables: Vec::new() }
    }

    fn emit(&mut self, op: ir::OpCode) {
        self.code.push(op);
    }

    /// Lowers `e` and returns where its static type comes from.
    fn lower_expr(&mut self, e: &ast::Expr) -> CResult<ir::ArgType> {
        use ast::Expr as E;
        use ir::ArgType::Known;
        match e {
            E::Literal(ast::Literal::Number(n)) => {
                self.emit(ir::OpCode::PushAtomic(XdmAtomicValue::Double(*n)));
                Ok(Known(StaticType::Number))
            }
            E::Literal(ast::Literal::String(s)) => {
                self.emit(ir::OpCode::PushAtomic(XdmAtomicValue::String(s.clone())));
                Ok(Known(StaticType::String))
            }
            E::VarRef(q) => {
                let en = self.to_expanded(q)?;
                let slot = match self.variables.iter().position(|v| *v == en) {
                    Some(i) => i,
                    None => {
                        self.variables.push(en);
                        self.variables.len() - 1
                    }
                };
                self.emit(ir::OpCode::LoadVar(slot));
                Ok(Known(StaticType::Any))
            }
            E::FunctionCall { name, args } => {
                let mut arg_types = Vec::with_capacity(args.len());
                for a in args {
                    arg_types.push(self.lower_expr(a)?);
                }
                let site = self.call_sites.len();
                self.call_sites.push(ir::CallSite {
                    name: self.to_expanded(name)?,
                    lexical: name.lexical(),
                    args: arg_types,
                });
                self.emit(ir::OpCode::Call(site, args.len()));
                Ok(ir::ArgType::CallResult(site))
            }
            E::Binary { left, op, right } => {
                use ast::BinaryOp::*;
                match op {
                    And => self.lower_logic(left, right, false),
                    Or => self.lower_logic(left, right, true),
                    _ => {
                        self.lower_expr(left)?;
                        self.lower_expr(right)?;
                        self.emit(match op {
                            Add => ir::OpCode::Add,
                            Sub => ir::OpCode::Sub,
                            Mul => ir::OpCode::Mul,
                            Div => ir::OpCode::Div,
                            _ => ir::OpCode::Mod,
                        });
                        Ok(Known(StaticType::Number))
                    }
                }
            }
            E::GeneralComparison { left, op, right } => {
                self.lower_expr(left)?;
                self.lower_expr(right)?;
                self.emit(ir::OpCode::CompareGeneral(map_cmp(*op)));
                Ok(Known(StaticType::Boolean))
            }
            E::Negate(inner) => {
                self.lower_expr(inner)?;
                self.emit(ir::OpCode::Neg);
                Ok(Known(StaticType::Number))
            }
            E::Union(a, b) => {
                self.lower_expr(a)?;
                self.lower_expr(b)?;
                self.emit(ir::OpCode::Union);
                Ok(Known(StaticType::NodeSet))
            }
            E::Path(p) => {
                self.lower_path_expr(p)?;
                Ok(Known(StaticType::NodeSet))
            }
            E::Filter { primary, predicates, steps } => {
                let ty = self.lower_expr(primary)?;
                if !predicates.is_empty() {
                    let preds = self.lower_predicates(predicates)?;
                    self.emit(ir::OpCode::ApplyPredicates(preds));
                }
                if steps.is_empty() {
                    return Ok(ty);
                }
                self.lower_path_steps(steps)?;
                Ok(Known(StaticType::NodeSet))
            }
        }
    }

    // Short-circuit: `and` skips the right side on false, `or` on true.
    // The jump leaves the deciding boolean on the stack.
    fn lower_logic(&mut self, left: &ast::Expr, right: &ast::Expr, is_or: bool) -> CResult<ir::ArgType> {
        self.lower_expr(left)?;
        self.emit(ir::OpCode::ToEBV);
        let pos = self.code.len();
        self.emit(if is_or { ir::OpCode::JumpIfTrue(0) } else { ir::OpCode::JumpIfFalse(0) });
        self.emit(ir::OpCode::Pop);
        self.lower_expr(right)?;
        self.emit(ir::OpCode::ToEBV);
        Self::patch_jump(&mut self.code, pos);
        Ok(ir::ArgType::Known(StaticType::Boolean))
    }

    fn lower_predicates(&mut self, preds: &[ast::Expr]) -> CResult<Vec<ir::InstrSeq>> {
        let mut v = Vec::with_capacity(preds.len());
        for p in preds {
            let outer = std::mem::take(&mut self.code);
            let res = self.lower_expr(p);
            let sub = std::mem::replace(&mut self.code, outer);
            res?;
            v.push(ir::InstrSeq(sub));
        }
        Ok(v)
    }

    fn lower_path_expr(&mut self, p: &ast::PathExpr) -> CResult<()> {
        self.emit(ir::OpCode::LoadContextItem);
        if p.start == ast::PathStart::Root {
            self.emit(ir::OpCode::ToRoot);
        }
        self.lower_path_steps(&p.steps)
    }

    fn lower_path_steps(&mut self, steps: &[ast::Step]) -> CResult<()> {
        for s in steps {
            let axis = map_axis(s.axis)?;
            let test = self.lower_node_test(&s.test)?;
            let preds = self.lower_predicates(&s.predicates)?;
            self.emit(ir::OpCode::AxisStep(axis, test, preds));
        }
        Ok(())
    }

    fn lower_node_test(&self, t: &ast::NodeTest) -> CResult<ir::NodeTestIR> {
        use ast::{KindTest, NodeTest};
        Ok(match t {
            NodeTest::Name(q) => ir::NodeTestIR::Name(self.to_expanded(q)?),
            NodeTest::Wildcard => ir::NodeTestIR::WildcardAny,
            NodeTest::PrefixWildcard(p) => ir::NodeTestIR::NsWildcard(self.resolve_prefix(p)?),
            NodeTest::Kind(KindTest::AnyKind) => ir::NodeTestIR::AnyKind,
            NodeTest::Kind(KindTest::Text) => ir::NodeTestIR::KindText,
            NodeTest::Kind(KindTest::Comment) => ir::NodeTestIR::KindComment,
            NodeTest::Kind(KindTest::ProcessingInstruction(target)) => {
                ir::NodeTestIR::KindProcessingInstruction(target.clone())
            }
        })
    }

    fn resolve_prefix(&self, prefix: &str) -> CResult<String> {
        self.static_ctx.namespaces.by_prefix.get(prefix).cloned().ok_or_else(|| {
            Error::static_code(ErrorCode::XPST0081, format!("unknown namespace prefix '{prefix}'"))
        })
    }

    // Unprefixed names are in no namespace; there is no default element namespace.
    fn to_expanded(&self, q: &ast::QName) -> CResult<ExpandedName> {
        match &q.prefix {
            Some(p) => Ok(ExpandedName::new(Some(self.resolve_prefix(p)?), q.local.clone())),
            None => Ok(ExpandedName::local(q.local.clone())),
        }
    }

    fn patch_jump(code: &mut [ir::OpCode], pos: usize) {
        let delta = code.len() - pos - 1;
        if let Some(op) = code.get_mut(pos) {
            match op {
                ir::OpCode::JumpIfFalse(d) | ir::OpCode::JumpIfTrue(d) => *d = delta,
                _ => {}
            }
        }
    }
}

fn map_cmp(op: ast::GeneralComp) -> ir::ComparisonOp {
    use ast::GeneralComp as G;
    match op {
        G::Eq => ir::ComparisonOp::Eq,
        G::Ne => ir::ComparisonOp::Ne,
        G::Lt => ir::ComparisonOp::Lt,
        G::Le => ir::ComparisonOp::Le,
        G::Gt => ir::ComparisonOp::Gt,
        G::Ge => ir::ComparisonOp::Ge,
    }
}

fn map_axis(a: ast::Axis) -> CResult<ir::AxisIR> {
    use ast::Axis as A;
    Ok(match a {
        A::Child => ir::AxisIR::Child,
        A::Descendant => ir::AxisIR::Descendant,
        A::Attribute => ir::AxisIR::Attribute,
        A::SelfAxis => ir::AxisIR::SelfAxis,
        A::DescendantOrSelf => ir::AxisIR::DescendantOrSelf,
        A::FollowingSibling => ir::AxisIR::FollowingSibling,
        A::Following => ir::AxisIR::Following,
        A::Parent => ir::AxisIR::Parent,
        A::Ancestor => ir::AxisIR::Ancestor,
        A::PrecedingSibling => ir::AxisIR::PrecedingSibling,
        A::Preceding => ir::AxisIR::Preceding,
        A::AncestorOrSelf => ir::AxisIR::AncestorOrSelf,
        A::Namespace => return Err(Error::not_implemented("namespace axis")),
    })
}
