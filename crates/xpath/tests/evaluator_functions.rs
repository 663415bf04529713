mod common;

use common::{Node, library};
use findxml_xpath::convert::to_string;
use findxml_xpath::{EmptyQueryContext, compile_xpath};
use rstest::{fixture, rstest};

#[fixture]
fn doc() -> Node {
    library()
}

fn eval_string(expr: &str, doc: &Node) -> String {
    let bound = compile_xpath(expr).expect("compile").bind(&EmptyQueryContext).expect("bind");
    to_string(&bound.evaluate(Some(doc)).expect("evaluate"))
}

#[rstest]
#[case::count("count(//book)", "2")]
#[case::sum("sum(//price)", "42.5")]
#[case::local_name("local-name(/*)", "library")]
#[case::name_of_empty("name(//missing)", "")]
#[case::namespace_uri("namespace-uri(/*)", "")]
#[case::string_of_node("string(//book[2]/title)", "Der Prozess")]
#[case::concat("concat('a', 1, true())", "a1true")]
#[case::starts_with("starts-with('findxml', 'find')", "true")]
#[case::substring_before("substring-before('1999/04/01', '/')", "1999")]
#[case::substring_after("substring-after('1999/04/01', '/')", "04/01")]
#[case::substring("substring('12345', 2, 3)", "234")]
#[case::string_length("string-length('héllo')", "5")]
#[case::normalize_space("normalize-space('  a \n b  ')", "a b")]
#[case::translate("translate('bar', 'abc', 'ABC')", "BAr")]
#[case::translate_removes("translate('--aaa--', 'abc-', 'ABC')", "AAA")]
#[case::boolean_of_empty("boolean(//missing)", "false")]
#[case::number_of_text("number(//book[2]/price)", "12.5")]
#[case::number_nan("number('x')", "NaN")]
#[case::floor("floor(-1.5)", "-2")]
#[case::ceiling("ceiling(1.2)", "2")]
#[case::round("round(2.5)", "3")]
#[case::div("7 div 2", "3.5")]
#[case::modulo("7 mod -2", "1")]
#[case::negate("-(3 - 5)", "2")]
#[case::div_by_zero("1 div 0", "Infinity")]
fn functions_and_operators(#[case] expr: &str, #[case] expected: &str, doc: Node) {
    assert_eq!(eval_string(expr, &doc), expected);
}

#[rstest]
#[case::node_set_vs_string("//book/@lang = 'de'", "true")]
#[case::node_set_ne("//book/@lang != 'de'", "true")]
#[case::node_set_vs_number("//price = 30", "true")]
#[case::node_set_vs_node_set("//book[1]/title = //title", "true")]
#[case::empty_set_eq("//missing = ''", "false")]
#[case::empty_set_ne("//missing != ''", "false")]
#[case::boolean_vs_set("true() = //book", "true")]
#[case::string_vs_number("'2' = 2", "true")]
#[case::relational_strings("'10' > '9'", "true")]
#[case::flipped_relational("20 < //price", "true")]
fn comparisons(#[case] expr: &str, #[case] expected: &str, doc: Node) {
    assert_eq!(eval_string(expr, &doc), expected);
}

#[rstest]
fn context_functions_read_the_focus(doc: Node) {
    assert_eq!(eval_string("string(//book[position() = last()]/@id)", &doc), "b2");
    assert_eq!(eval_string("name(//book[1]/@*[2])", &doc), "lang");
}
