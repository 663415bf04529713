mod common;

use common::{Node, library};
use findxml_xpath::runtime::{Error, ErrorCode, ResolvedFunction, StaticType};
use findxml_xpath::{
    CallCtx, EmptyQueryContext, ExpandedName, QueryContext, XdmItem, XdmSequence, compile_xpath, function_impl,
};
use rstest::rstest;
use std::sync::Mutex;

fn bind_error(expr: &str) -> Error {
    compile_xpath(expr).expect("compile").bind::<Node>(&EmptyQueryContext).unwrap_err()
}

#[rstest]
#[case::unknown_function("//a[frobnicate()]", ErrorCode::XPST0017)]
#[case::wrong_arity("count()", ErrorCode::XPST0017)]
#[case::count_of_string("count('x')", ErrorCode::XPTY0004)]
#[case::sum_of_number_result("sum(count(//a))", ErrorCode::XPTY0004)]
#[case::unbound_variable("$x", ErrorCode::XPST0008)]
fn bind_time_errors(#[case] expr: &str, #[case] code: ErrorCode) {
    assert_eq!(bind_error(expr).code_enum(), code);
}

#[rstest]
#[case::unclosed_predicate("//a[")]
#[case::dangling_operator("1 +")]
#[case::empty("")]
fn syntax_errors(#[case] expr: &str) {
    let err = compile_xpath(expr).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XPST0003);
}

#[rstest]
fn select_requires_node_set() {
    let bound = compile_xpath("1 + 1").unwrap().bind(&EmptyQueryContext).unwrap();
    let err = bound.select(&library()).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XPTY0004);
    assert_eq!(err.message, "expression must evaluate to a node-set");
}

/// Records the argument types it is asked about and answers `shout()`.
#[derive(Default)]
struct Recording {
    seen: Mutex<Vec<(String, Vec<StaticType>)>>,
}

impl QueryContext<Node> for Recording {
    fn resolve_function(
        &self,
        name: &ExpandedName,
        arg_types: &[StaticType],
    ) -> Result<Option<ResolvedFunction<Node>>, Error> {
        self.seen.lock().unwrap().push((name.local.clone(), arg_types.to_vec()));
        if name.local != "shout" {
            return Ok(None);
        }
        Ok(Some(ResolvedFunction {
            return_type: StaticType::String,
            func: function_impl(|_ctx: &CallCtx<Node>, args: &[XdmSequence<Node>]| {
                let s = findxml_xpath::convert::to_string(&args[0]);
                Ok(vec![XdmItem::string(s.to_uppercase())])
            }),
        }))
    }

    fn resolve_variable(&self, name: &ExpandedName) -> Result<XdmSequence<Node>, Error> {
        Ok(vec![XdmItem::string(format!("var-{}", name.local))])
    }
}

#[rstest]
fn context_sees_static_argument_types() {
    let ctx = Recording::default();
    let bound = compile_xpath("concat(shout(//title), shout(shout('x')), $v)").unwrap().bind(&ctx).unwrap();
    let seen = ctx.seen.lock().unwrap().clone();
    assert_eq!(
        seen,
        vec![
            ("shout".to_string(), vec![StaticType::NodeSet]),
            ("shout".to_string(), vec![StaticType::String]),
            ("shout".to_string(), vec![StaticType::String]),
        ]
    );
    let out = bound.evaluate(Some(&library())).unwrap();
    assert_eq!(out, vec![XdmItem::string("RUST IN ACTIONXvar-v")]);
}

#[rstest]
fn built_ins_shadow_the_context() {
    let ctx = Recording::default();
    compile_xpath("count(//a)").unwrap().bind(&ctx).unwrap();
    assert!(ctx.seen.lock().unwrap().is_empty());
}
