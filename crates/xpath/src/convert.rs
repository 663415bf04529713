//! XPath 1.0 value conversions (`string()`, `number()`, `boolean()`).

use crate::model::XdmNode;
use crate::xdm::{XdmAtomicValue, XdmItem};

pub fn is_xml_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

/// A sequence counts as a node-set when every item is a node (the empty sequence included).
pub fn is_node_set<N>(seq: &[XdmItem<N>]) -> bool {
    seq.iter().all(|i| matches!(i, XdmItem::Node(_)))
}

pub fn item_to_string<N: XdmNode>(item: &XdmItem<N>) -> String {
    match item {
        XdmItem::Node(n) => n.string_value(),
        XdmItem::Atomic(a) => a.to_xpath_string(),
    }
}

/// String value of a sequence: its first item, or `""` when empty.
pub fn to_string<N: XdmNode>(seq: &[XdmItem<N>]) -> String {
    seq.first().map(item_to_string).unwrap_or_default()
}

/// Parses the XPath 1.0 `Number` production surrounded by optional whitespace;
/// anything else is NaN.
pub fn string_to_number(s: &str) -> f64 {
    let t = s.trim_matches(is_xml_whitespace);
    let digits = t.strip_prefix('-').unwrap_or(t);
    let mut seen_digit = false;
    let mut seen_dot = false;
    for c in digits.chars() {
        match c {
            '0'..='9' => seen_digit = true,
            '.' if !seen_dot => seen_dot = true,
            _ => return f64::NAN,
        }
    }
    if !seen_digit {
        return f64::NAN;
    }
    t.parse::<f64>().unwrap_or(f64::NAN)
}

pub fn atomic_to_number(a: &XdmAtomicValue) -> f64 {
    match a {
        XdmAtomicValue::Boolean(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        XdmAtomicValue::String(s) => string_to_number(s),
        XdmAtomicValue::Double(d) => *d,
    }
}

pub fn item_to_number<N: XdmNode>(item: &XdmItem<N>) -> f64 {
    match item {
        XdmItem::Node(n) => string_to_number(&n.string_value()),
        XdmItem::Atomic(a) => atomic_to_number(a),
    }
}

pub fn to_number<N: XdmNode>(seq: &[XdmItem<N>]) -> f64 {
    match seq.first() {
        Some(item) => item_to_number(item),
        None => f64::NAN,
    }
}

pub fn to_boolean<N>(seq: &[XdmItem<N>]) -> bool {
    match seq {
        [] => false,
        [XdmItem::Atomic(a)] => match a {
            XdmAtomicValue::Boolean(b) => *b,
            XdmAtomicValue::String(s) => !s.is_empty(),
            XdmAtomicValue::Double(d) => *d != 0.0 && !d.is_nan(),
        },
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("12", 12.0)]
    #[case("  -3.5 ", -3.5)]
    #[case(".5", 0.5)]
    #[case("7.", 7.0)]
    fn parses_xpath_numbers(#[case] input: &str, #[case] expected: f64) {
        assert_eq!(string_to_number(input), expected);
    }

    #[rstest]
    #[case("")]
    #[case("1e3")]
    #[case("inf")]
    #[case("+1")]
    #[case("1.2.3")]
    #[case("-")]
    fn rejects_non_xpath_numbers(#[case] input: &str) {
        assert!(string_to_number(input).is_nan());
    }

    #[test]
    fn boolean_of_atomics() {
        let t: Vec<XdmItem<()>> = vec![XdmItem::string("x")];
        let f: Vec<XdmItem<()>> = vec![XdmItem::double(f64::NAN)];
        assert!(to_boolean(&t));
        assert!(!to_boolean(&f));
        assert!(!to_boolean::<()>(&[]));
    }
}
