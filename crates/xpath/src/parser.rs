use crate::runtime::{Error, ErrorCode};
use pest::Parser;
use pest::error::LineColLocation;
use pest::iterators::Pair;

pub mod ast;

#[derive(pest_derive::Parser)]
#[grammar = "xpath.pest"]
pub struct XPathParser;

/// Parse an XPath expression into the AST.
pub fn parse_xpath(input: &str) -> Result<ast::Expr, Error> {
    XPathParser::parse_to_ast(input)
}

impl XPathParser {
    /// Build the AST for evaluation from the XPath input.
    pub fn parse_to_ast(input: &str) -> Result<ast::Expr, Error> {
        let mut pairs = Self::parse(Rule::xpath, input).map_err(syntax_error)?;
        let root = pairs.next().ok_or_else(|| unexpected("empty parse result"))?;
        let expr = root
            .into_inner()
            .find(|p| p.as_rule() == Rule::expr)
            .ok_or_else(|| unexpected("missing expression"))?;
        Self::build_expr(expr)
    }

    fn build_expr(pair: Pair<Rule>) -> Result<ast::Expr, Error> {
        match pair.as_rule() {
            Rule::expr | Rule::path_expr | Rule::location_path | Rule::primary_expr => {
                let inner = first_inner(pair)?;
                Self::build_expr(inner)
            }
            Rule::or_expr | Rule::and_expr | Rule::additive_expr | Rule::multiplicative_expr => {
                Self::fold_binary(pair)
            }
            Rule::equality_expr | Rule::relational_expr => Self::fold_comparison(pair),
            Rule::unary_expr => {
                let mut negations = 0usize;
                let mut operand = None;
                for p in pair.into_inner() {
                    match p.as_rule() {
                        Rule::OP_MINUS => negations += 1,
                        _ => operand = Some(Self::build_expr(p)?),
                    }
                }
                let mut expr = operand.ok_or_else(|| unexpected("unary operator without operand"))?;
                for _ in 0..negations {
                    expr = ast::Expr::Negate(Box::new(expr));
                }
                Ok(expr)
            }
            Rule::union_expr => {
                let mut inner = pair.into_inner().filter(|p| p.as_rule() != Rule::OP_PIPE);
                let first = inner.next().ok_or_else(|| unexpected("empty union"))?;
                let mut expr = Self::build_expr(first)?;
                for right in inner {
                    expr = ast::Expr::Union(Box::new(expr), Box::new(Self::build_expr(right)?));
                }
                Ok(expr)
            }
            Rule::filter_path => Self::build_filter_path(pair),
            Rule::absolute_location_path => Self::build_absolute_path(pair),
            Rule::relative_location_path => Ok(ast::Expr::Path(ast::PathExpr {
                start: ast::PathStart::Relative,
                steps: Self::collect_steps(pair)?,
            })),
            Rule::parenthesized_expr => Self::build_expr(first_inner(pair)?),
            Rule::var_ref => Ok(ast::Expr::VarRef(qname_from_str(first_inner(pair)?.as_str()))),
            Rule::string_literal => Ok(ast::Expr::Literal(ast::Literal::String(string_literal_value(pair)))),
            Rule::number_literal => {
                let v = pair
                    .as_str()
                    .parse::<f64>()
                    .map_err(|_| Error::static_code(ErrorCode::XPST0003, format!("invalid number '{}'", pair.as_str())))?;
                Ok(ast::Expr::Literal(ast::Literal::Number(v)))
            }
            Rule::function_call => {
                let mut inner = pair.into_inner();
                let name = inner.next().ok_or_else(|| unexpected("function call without name"))?;
                let name = qname_from_str(name.as_str());
                let args = inner.map(Self::build_expr).collect::<Result<Vec<_>, _>>()?;
                Ok(ast::Expr::FunctionCall { name, args })
            }
            other => Err(unexpected(&format!("unsupported rule {other:?}"))),
        }
    }

    fn fold_binary(pair: Pair<Rule>) -> Result<ast::Expr, Error> {
        let mut inner = pair.into_inner();
        let first = inner.next().ok_or_else(|| unexpected("empty operand chain"))?;
        let mut expr = Self::build_expr(first)?;
        while let Some(op) = inner.next() {
            let op = match op.as_rule() {
                Rule::K_OR => ast::BinaryOp::Or,
                Rule::K_AND => ast::BinaryOp::And,
                Rule::OP_PLUS => ast::BinaryOp::Add,
                Rule::OP_MINUS => ast::BinaryOp::Sub,
                Rule::OP_STAR => ast::BinaryOp::Mul,
                Rule::K_DIV => ast::BinaryOp::Div,
                Rule::K_MOD => ast::BinaryOp::Mod,
                other => return Err(unexpected(&format!("unexpected operator {other:?}"))),
            };
            let right = inner.next().ok_or_else(|| unexpected("operator without right operand"))?;
            expr = ast::Expr::Binary { left: Box::new(expr), op, right: Box::new(Self::build_expr(right)?) };
        }
        Ok(expr)
    }

    fn fold_comparison(pair: Pair<Rule>) -> Result<ast::Expr, Error> {
        use ast::GeneralComp as GC;
        let mut inner = pair.into_inner();
        let first = inner.next().ok_or_else(|| unexpected("empty comparison"))?;
        let mut expr = Self::build_expr(first)?;
        while let Some(op) = inner.next() {
            let op = match op.as_rule() {
                Rule::OP_EQ => GC::Eq,
                Rule::OP_NE => GC::Ne,
                Rule::OP_LT => GC::Lt,
                Rule::OP_LTE => GC::Le,
                Rule::OP_GT => GC::Gt,
                Rule::OP_GTE => GC::Ge,
                other => return Err(unexpected(&format!("unexpected comparison {other:?}"))),
            };
            let right = inner.next().ok_or_else(|| unexpected("comparison without right operand"))?;
            expr = ast::Expr::GeneralComparison {
                left: Box::new(expr),
                op,
                right: Box::new(Self::build_expr(right)?),
            };
        }
        Ok(expr)
    }

    fn build_filter_path(pair: Pair<Rule>) -> Result<ast::Expr, Error> {
        let mut inner = pair.into_inner();
        let filter = inner.next().ok_or_else(|| unexpected("empty filter path"))?;
        let mut filter_inner = filter.into_inner();
        let primary = Self::build_expr(filter_inner.next().ok_or_else(|| unexpected("missing primary"))?)?;
        let predicates = filter_inner
            .map(|p| Self::build_expr(first_inner(p)?))
            .collect::<Result<Vec<_>, _>>()?;
        let mut steps = Vec::new();
        if let Some(sep) = inner.next() {
            if sep.as_rule() == Rule::OP_DSLASH {
                steps.push(ast::Step::descendant_or_self());
            }
            let rel = inner.next().ok_or_else(|| unexpected("missing steps after '/'"))?;
            steps.extend(Self::collect_steps(rel)?);
        }
        if predicates.is_empty() && steps.is_empty() {
            return Ok(primary);
        }
        Ok(ast::Expr::Filter { primary: Box::new(primary), predicates, steps })
    }

    fn build_absolute_path(pair: Pair<Rule>) -> Result<ast::Expr, Error> {
        let mut inner = pair.into_inner();
        let first = inner.next().ok_or_else(|| unexpected("empty absolute path"))?;
        let mut steps = Vec::new();
        if first.as_rule() == Rule::OP_DSLASH {
            steps.push(ast::Step::descendant_or_self());
        }
        if let Some(rel) = inner.next() {
            steps.extend(Self::collect_steps(rel)?);
        }
        Ok(ast::Expr::Path(ast::PathExpr { start: ast::PathStart::Root, steps }))
    }

    fn collect_steps(pair: Pair<Rule>) -> Result<Vec<ast::Step>, Error> {
        debug_assert_eq!(pair.as_rule(), Rule::relative_location_path);
        let mut out = Vec::new();
        for p in pair.into_inner() {
            match p.as_rule() {
                Rule::step => out.push(Self::build_step(p)?),
                Rule::OP_DSLASH => out.push(ast::Step::descendant_or_self()),
                Rule::OP_SLASH => {}
                other => return Err(unexpected(&format!("unexpected {other:?} in path"))),
            }
        }
        Ok(out)
    }

    fn build_step(pair: Pair<Rule>) -> Result<ast::Step, Error> {
        let mut axis = ast::Axis::Child;
        let mut test = None;
        let mut predicates = Vec::new();
        for p in pair.into_inner() {
            match p.as_rule() {
                Rule::abbrev_step => {
                    let tok = first_inner(p)?;
                    let axis =
                        if tok.as_rule() == Rule::OP_DOTDOT { ast::Axis::Parent } else { ast::Axis::SelfAxis };
                    return Ok(ast::Step {
                        axis,
                        test: ast::NodeTest::Kind(ast::KindTest::AnyKind),
                        predicates: vec![],
                    });
                }
                Rule::axis_spec => axis = axis_from_spec(first_inner(p)?)?,
                Rule::node_test => test = Some(node_test(first_inner(p)?)?),
                Rule::predicate => predicates.push(Self::build_expr(first_inner(p)?)?),
                other => return Err(unexpected(&format!("unexpected {other:?} in step"))),
            }
        }
        let test = test.ok_or_else(|| unexpected("step without node test"))?;
        Ok(ast::Step { axis, test, predicates })
    }
}

fn axis_from_spec(pair: Pair<Rule>) -> Result<ast::Axis, Error> {
    use ast::Axis;
    if pair.as_rule() == Rule::OP_AT {
        return Ok(Axis::Attribute);
    }
    Ok(match pair.as_str() {
        "ancestor" => Axis::Ancestor,
        "ancestor-or-self" => Axis::AncestorOrSelf,
        "attribute" => Axis::Attribute,
        "child" => Axis::Child,
        "descendant" => Axis::Descendant,
        "descendant-or-self" => Axis::DescendantOrSelf,
        "following" => Axis::Following,
        "following-sibling" => Axis::FollowingSibling,
        "namespace" => Axis::Namespace,
        "parent" => Axis::Parent,
        "preceding" => Axis::Preceding,
        "preceding-sibling" => Axis::PrecedingSibling,
        "self" => Axis::SelfAxis,
        other => return Err(unexpected(&format!("unknown axis '{other}'"))),
    })
}

fn node_test(pair: Pair<Rule>) -> Result<ast::NodeTest, Error> {
    use ast::{KindTest, NodeTest};
    match pair.as_rule() {
        Rule::kind_test => {
            let mut inner = pair.into_inner();
            let keyword = inner.next().ok_or_else(|| unexpected("empty kind test"))?;
            let kind = match keyword.as_str() {
                "node" => KindTest::AnyKind,
                "text" => KindTest::Text,
                "comment" => KindTest::Comment,
                _ => KindTest::ProcessingInstruction(inner.next().map(string_literal_value)),
            };
            Ok(NodeTest::Kind(kind))
        }
        Rule::name_test => {
            let inner = first_inner(pair)?;
            match inner.as_rule() {
                Rule::wildcard => Ok(NodeTest::Wildcard),
                Rule::prefixed_wildcard => Ok(NodeTest::PrefixWildcard(first_inner(inner)?.as_str().to_string())),
                _ => Ok(NodeTest::Name(qname_from_str(inner.as_str()))),
            }
        }
        other => Err(unexpected(&format!("unexpected node test {other:?}"))),
    }
}

fn string_literal_value(pair: Pair<Rule>) -> String {
    pair.into_inner().next().map(|p| p.as_str().to_string()).unwrap_or_default()
}

fn first_inner(pair: Pair<Rule>) -> Result<Pair<Rule>, Error> {
    let rule = pair.as_rule();
    pair.into_inner().next().ok_or_else(|| unexpected(&format!("{rule:?} has no content")))
}

fn qname_from_str(s: &str) -> ast::QName {
    match s.split_once(':') {
        Some((prefix, local)) => ast::QName { prefix: Some(prefix.to_string()), local: local.to_string() },
        None => ast::QName { prefix: None, local: s.to_string() },
    }
}

fn unexpected(msg: &str) -> Error {
    Error::static_code(ErrorCode::XPST0003, msg.to_string())
}

fn syntax_error(e: pest::error::Error<Rule>) -> Error {
    let col = match e.line_col {
        LineColLocation::Pos((_, c)) | LineColLocation::Span((_, c), _) => c,
    };
    Error::static_code(ErrorCode::XPST0003, format!("syntax error at column {col}: {}", e.variant.message()))
}
