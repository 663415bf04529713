use findxml_core::{FindSettings, FindXml, FindXmlError};
use findxml_xpath::XdmNode;
use findxml_xpath::runtime::ErrorCode;
use rstest::rstest;

const PROJECT: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<Project xmlns="http://schemas.com/2021"><Reference Include="System" /></Project>"#;

const BOOKS: &str = r#"<library>
  <BOOK><title>My Wonderful Day</title></BOOK>
  <BOOK><title>A Rainy Night</title></BOOK>
  <magazine><title>Wonderful Gardens</title></magazine>
</library>"#;

fn find(query: &str, xml: &str) -> Vec<String> {
    find_with(FindSettings::with_query(query), xml)
}

fn find_with(settings: FindSettings, xml: &str) -> Vec<String> {
    FindXml::new(settings).find_in_str(xml).unwrap().iter().map(|n| n.outer_xml()).collect()
}

fn preserving(query: &str) -> FindSettings {
    FindSettings { ignore_namespaces: false, ..FindSettings::with_query(query) }
}

fn query_error(query: &str) -> FindXmlError {
    FindXml::new(FindSettings::with_query(query)).find_in_str(BOOKS).unwrap_err()
}

fn code(err: &FindXmlError) -> ErrorCode {
    match err {
        FindXmlError::Query(e) => e.code_enum(),
        other => panic!("expected a query error, got {other:?}"),
    }
}

#[rstest]
fn plain_names_match_namespaced_documents() {
    assert_eq!(find("/Project", PROJECT), vec![r#"<Project><Reference Include="System" /></Project>"#]);
    assert_eq!(find("//Reference", PROJECT), vec![r#"<Reference Include="System" />"#]);
}

#[rstest]
fn prefixed_xmlns_attributes_do_not_survive_normalization() {
    let xml = r#"<root xmlns:p="urn:p" p:xmlns="v"><c/></root>"#;
    assert_eq!(find("/root", xml), vec!["<root><c /></root>"]);
    assert!(find("/root/@*", xml).is_empty());
}

#[rstest]
fn crlf_line_ends_and_attribute_breaks_are_normalized() {
    let xml = "<a x=\"1\r\n2\">\r\n  <b>v</b>\r\n</a>";
    assert_eq!(find("/a", xml), vec!["<a x=\"1 2\">\n  <b>v</b>\n</a>"]);
    assert_eq!(find("/a[@x='1 2']/b[matches(., '^v$')]", xml), vec!["<b>v</b>"]);
    let nodes = FindXml::new(FindSettings::with_query("//b")).find_in_str(xml).unwrap();
    assert_eq!(nodes[0].position().line(), Some(2));
}

#[rstest]
fn preserved_namespaces_need_local_name() {
    assert!(find_with(preserving("/Project"), PROJECT).is_empty());
    assert_eq!(
        find_with(preserving("/*[local-name()='Project']"), PROJECT),
        vec![r#"<Project xmlns="http://schemas.com/2021"><Reference Include="System" /></Project>"#]
    );
}

#[rstest]
fn preserved_child_carries_its_namespace() {
    assert_eq!(
        find_with(preserving("//*[local-name()='Reference']"), PROJECT),
        vec![r#"<Reference Include="System" xmlns="http://schemas.com/2021" />"#]
    );
}

#[rstest]
fn matches_selects_by_text() {
    assert_eq!(
        find("//title[matches(string(),'Wonderful')]/..", BOOKS),
        vec!["<BOOK><title>My Wonderful Day</title></BOOK>", "<magazine><title>Wonderful Gardens</title></magazine>"]
    );
    assert_eq!(find("//BOOK[matches(title, '^a rainy', 'i')]/title", BOOKS), vec!["<title>A Rainy Night</title>"]);
    assert!(find("//BOOK[matches(title, '^a rainy')]", BOOKS).is_empty());
}

#[rstest]
fn prefixed_parents_come_back_without_namespace_markers() {
    let xml = r#"<book:BOOK xmlns:book="u1" xmlns:t="u2"><t:title>My Wonderful Day</t:title></book:BOOK>"#;
    assert_eq!(
        find("//title[matches(string(),'Wonderful')]/..", xml),
        vec!["<BOOK><title>My Wonderful Day</title></BOOK>"]
    );
    assert_eq!(
        find_with(preserving("//*[local-name()='title']"), xml),
        vec![r#"<t:title xmlns:t="u2">My Wonderful Day</t:title>"#]
    );
}

#[rstest]
#[case::attribute("//item[lower-case(@name)='abc']", 1)]
#[case::text("//item[lower-case(.)='x']", 2)]
#[case::literal("//item[lower-case('ABC')=@name]", 0)]
fn lower_case_in_predicates(#[case] query: &str, #[case] expected: usize) {
    let xml = r#"<r><item name="ABC">X</item><item name="abd">x</item></r>"#;
    assert_eq!(find(query, xml).len(), expected);
}

#[rstest]
fn empty_node_set_arguments_are_empty_strings() {
    assert_eq!(find("//title[matches(@missing, '^$')]", BOOKS).len(), 3);
    assert_eq!(find("//title[lower-case(@missing) = '']", BOOKS).len(), 3);
}

#[rstest]
fn results_are_in_document_order() {
    let settings = FindSettings::with_query("//title | //BOOK");
    let nodes = FindXml::new(settings).find_in_str(BOOKS).unwrap();
    let names: Vec<&str> = nodes.iter().map(|n| n.local_name()).collect();
    assert_eq!(names, vec!["BOOK", "title", "BOOK", "title", "title"]);
    let lines: Vec<usize> = nodes.iter().filter_map(|n| n.position().line()).collect();
    assert_eq!(lines, vec![2, 2, 3, 3, 4]);
    for pair in nodes.windows(2) {
        assert!(pair[0].compare_document_order(&pair[1]).is_lt());
    }
}

#[rstest]
fn argument_types_are_checked_when_binding() {
    let err = query_error("//title[lower-case(1)]");
    assert_eq!(code(&err), ErrorCode::XPTY0004);
    assert_eq!(err.category(), "InvalidFunctionArgumentType");
    assert!(err.to_string().contains("incorrect argument type"), "{err}");

    let err = query_error("//title[matches(., true())]");
    assert_eq!(err.category(), "InvalidFunctionArgumentType");
}

#[rstest]
#[case::unknown_function("//title[upper-case(.)]", ErrorCode::XPST0017)]
#[case::wrong_arity("//title[matches(.)]", ErrorCode::XPST0017)]
#[case::undeclared_prefix("//title[fn:lower-case(.)]", ErrorCode::XPST0081)]
#[case::variable("//title[. = $name]", ErrorCode::NYI0000)]
#[case::syntax("//title[", ErrorCode::XPST0003)]
#[case::bad_regex("//title[matches(., '(')]", ErrorCode::FORX0002)]
#[case::not_a_node_set("count(//title)", ErrorCode::XPTY0004)]
fn query_errors(#[case] query: &str, #[case] expected: ErrorCode) {
    let err = query_error(query);
    assert_eq!(code(&err), expected, "{err}");
    assert_eq!(err.category(), "XPathError");
}

#[rstest]
fn malformed_documents_are_xml_errors() {
    let err = FindXml::new(FindSettings::with_query("//a")).find_in_str("<a><b></a>").unwrap_err();
    assert_eq!(err.category(), "XmlError");
}
