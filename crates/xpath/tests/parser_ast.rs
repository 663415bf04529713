use findxml_xpath::parser::ast::{Axis, BinaryOp, Expr, GeneralComp, KindTest, Literal, NodeTest, PathStart, QName, Step};
use findxml_xpath::parser::parse_xpath;
use rstest::rstest;

fn name(local: &str) -> NodeTest {
    NodeTest::Name(QName { prefix: None, local: local.into() })
}

fn child(local: &str) -> Step {
    Step { axis: Axis::Child, test: name(local), predicates: vec![] }
}

#[rstest]
fn double_slash_expands_to_descendant_or_self() {
    let Expr::Path(p) = parse_xpath("//a/b").unwrap() else { panic!("expected path") };
    assert_eq!(p.start, PathStart::Root);
    assert_eq!(p.steps, vec![Step::descendant_or_self(), child("a"), child("b")]);
}

#[rstest]
#[case::dot(".", Axis::SelfAxis)]
#[case::dotdot("..", Axis::Parent)]
fn abbreviated_steps(#[case] input: &str, #[case] axis: Axis) {
    let Expr::Path(p) = parse_xpath(input).unwrap() else { panic!("expected path") };
    assert_eq!(p.start, PathStart::Relative);
    assert_eq!(p.steps, vec![Step { axis, test: NodeTest::Kind(KindTest::AnyKind), predicates: vec![] }]);
}

#[rstest]
fn operators_are_left_associative() {
    let e = parse_xpath("1 - 2 - 3").unwrap();
    let Expr::Binary { left, op: BinaryOp::Sub, right } = e else { panic!("expected subtraction") };
    assert_eq!(*right, Expr::Literal(Literal::Number(3.0)));
    assert!(matches!(*left, Expr::Binary { op: BinaryOp::Sub, .. }));
}

#[rstest]
fn and_binds_tighter_than_or() {
    let e = parse_xpath("a or b and c").unwrap();
    let Expr::Binary { op: BinaryOp::Or, right, .. } = e else { panic!("expected or") };
    assert!(matches!(*right, Expr::Binary { op: BinaryOp::And, .. }));
}

#[rstest]
fn attribute_predicate_and_comparison() {
    let Expr::Path(p) = parse_xpath("item[@k != 'v']").unwrap() else { panic!("expected path") };
    let pred = &p.steps[0].predicates[0];
    let Expr::GeneralComparison { left, op: GeneralComp::Ne, right } = pred else { panic!("expected !=") };
    assert_eq!(**right, Expr::Literal(Literal::String("v".into())));
    let Expr::Path(attr) = &**left else { panic!("expected attribute path") };
    assert_eq!(attr.steps[0].axis, Axis::Attribute);
}

#[rstest]
#[case::wildcard("*", NodeTest::Wildcard)]
#[case::ns_wildcard("p:*", NodeTest::PrefixWildcard("p".into()))]
#[case::prefixed("p:a", NodeTest::Name(QName { prefix: Some("p".into()), local: "a".into() }))]
#[case::text("text()", NodeTest::Kind(KindTest::Text))]
#[case::comment("comment()", NodeTest::Kind(KindTest::Comment))]
#[case::pi("processing-instruction('x')", NodeTest::Kind(KindTest::ProcessingInstruction(Some("x".into()))))]
#[case::element_named_like_keyword("text", name("text"))]
fn node_tests(#[case] input: &str, #[case] expected: NodeTest) {
    let Expr::Path(p) = parse_xpath(input).unwrap() else { panic!("expected path") };
    assert_eq!(p.steps[0].test, expected);
}

#[rstest]
fn function_call_with_hyphenated_name() {
    let e = parse_xpath("lower-case('A')").unwrap();
    let Expr::FunctionCall { name, args } = e else { panic!("expected call") };
    assert_eq!(name.local, "lower-case");
    assert_eq!(args, vec![Expr::Literal(Literal::String("A".into()))]);
}

#[rstest]
fn filter_with_trailing_steps() {
    let e = parse_xpath("(//a)[1]//b").unwrap();
    let Expr::Filter { predicates, steps, .. } = e else { panic!("expected filter") };
    assert_eq!(predicates, vec![Expr::Literal(Literal::Number(1.0))]);
    assert_eq!(steps, vec![Step::descendant_or_self(), child("b")]);
}
