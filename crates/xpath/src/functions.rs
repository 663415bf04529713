use crate::convert::{is_xml_whitespace, item_to_number, to_boolean, to_number, to_string};
use crate::model::XdmNode;
use crate::runtime::StaticType::{Any, Boolean, NodeSet, Number, String as Str};
use crate::runtime::{CallCtx, Error, ErrorCode, FunctionRegistry};
use crate::xdm::{XdmItem, XdmSequence};

/// XPath 1.0 core function library. Every function lives in no namespace.
pub fn default_function_registry<N: XdmNode>() -> FunctionRegistry<N> {
    let mut reg: FunctionRegistry<N> = FunctionRegistry::new();

    // ===== Node-set functions =====
    reg.register_local("last", 0, &[], Number, |ctx, _args| Ok(vec![XdmItem::double(ctx.last as f64)]));
    reg.register_local("position", 0, &[], Number, |ctx, _args| {
        Ok(vec![XdmItem::double(ctx.position as f64)])
    });
    reg.register_local("count", 1, &[NodeSet], Number, |_ctx, args| {
        let nodes = expect_nodes(&args[0], "count")?;
        Ok(vec![XdmItem::double(nodes as f64)])
    });
    reg.register_local_range("local-name", 0, Some(1), &[NodeSet], Str, |ctx, args| {
        let name = target_node(ctx, args, "local-name")?.and_then(|n| n.name()).map(|q| q.local);
        Ok(vec![XdmItem::string(name.unwrap_or_default())])
    });
    reg.register_local_range("namespace-uri", 0, Some(1), &[NodeSet], Str, |ctx, args| {
        let uri = target_node(ctx, args, "namespace-uri")?.and_then(|n| n.name()).and_then(|q| q.ns_uri);
        Ok(vec![XdmItem::string(uri.unwrap_or_default())])
    });
    reg.register_local_range("name", 0, Some(1), &[NodeSet], Str, |ctx, args| {
        let name = target_node(ctx, args, "name")?.and_then(|n| n.name()).map(|q| q.lexical());
        Ok(vec![XdmItem::string(name.unwrap_or_default())])
    });

    // ===== String functions =====
    reg.register_local_range("string", 0, Some(1), &[Any], Str, |ctx, args| {
        Ok(vec![XdmItem::string(string_arg(ctx, args)?)])
    });
    reg.register_local_range("concat", 2, None, &[Any], Str, |_ctx, args| {
        let s: String = args.iter().map(|a| to_string(a)).collect();
        Ok(vec![XdmItem::string(s)])
    });
    reg.register_local("starts-with", 2, &[Any], Boolean, |_ctx, args| {
        Ok(vec![XdmItem::boolean(to_string(&args[0]).starts_with(to_string(&args[1]).as_str()))])
    });
    reg.register_local("contains", 2, &[Any], Boolean, |_ctx, args| {
        Ok(vec![XdmItem::boolean(to_string(&args[0]).contains(to_string(&args[1]).as_str()))])
    });
    reg.register_local("substring-before", 2, &[Any], Str, |_ctx, args| {
        let s = to_string(&args[0]);
        let needle = to_string(&args[1]);
        let out = s.find(needle.as_str()).map(|i| s[..i].to_string()).unwrap_or_default();
        Ok(vec![XdmItem::string(out)])
    });
    reg.register_local("substring-after", 2, &[Any], Str, |_ctx, args| {
        let s = to_string(&args[0]);
        let needle = to_string(&args[1]);
        let out = s.find(needle.as_str()).map(|i| s[i + needle.len()..].to_string()).unwrap_or_default();
        Ok(vec![XdmItem::string(out)])
    });
    reg.register_local_range("substring", 2, Some(3), &[Any], Str, |_ctx, args| {
        let s = to_string(&args[0]);
        let start = to_number(&args[1]);
        let len = args.get(2).map(|a| to_number(a));
        Ok(vec![XdmItem::string(substring(&s, start, len))])
    });
    reg.register_local_range("string-length", 0, Some(1), &[Any], Number, |ctx, args| {
        Ok(vec![XdmItem::double(string_arg(ctx, args)?.chars().count() as f64)])
    });
    reg.register_local_range("normalize-space", 0, Some(1), &[Any], Str, |ctx, args| {
        let s = string_arg(ctx, args)?;
        let parts: Vec<&str> = s.split(is_xml_whitespace).filter(|p| !p.is_empty()).collect();
        Ok(vec![XdmItem::string(parts.join(" "))])
    });
    reg.register_local("translate", 3, &[Any], Str, |_ctx, args| {
        let from: Vec<char> = to_string(&args[1]).chars().collect();
        let to: Vec<char> = to_string(&args[2]).chars().collect();
        let out: String = to_string(&args[0])
            .chars()
            .filter_map(|c| match from.iter().position(|f| *f == c) {
                Some(i) => to.get(i).copied(),
                None => Some(c),
            })
            .collect();
        Ok(vec![XdmItem::string(out)])
    });

    // ===== Boolean functions =====
    reg.register_local("boolean", 1, &[Any], Boolean, |_ctx, args| Ok(vec![XdmItem::boolean(to_boolean(&args[0]))]));
    reg.register_local("not", 1, &[Any], Boolean, |_ctx, args| Ok(vec![XdmItem::boolean(!to_boolean(&args[0]))]));
    reg.register_local("true", 0, &[], Boolean, |_ctx, _args| Ok(vec![XdmItem::boolean(true)]));
    reg.register_local("false", 0, &[], Boolean, |_ctx, _args| Ok(vec![XdmItem::boolean(false)]));

    // ===== Number functions =====
    reg.register_local_range("number", 0, Some(1), &[Any], Number, |ctx, args| {
        let n = match args.first() {
            Some(a) => to_number(a),
            None => item_to_number(context_item(ctx, "number")?),
        };
        Ok(vec![XdmItem::double(n)])
    });
    reg.register_local("sum", 1, &[NodeSet], Number, |_ctx, args| {
        expect_nodes(&args[0], "sum")?;
        Ok(vec![XdmItem::double(args[0].iter().map(item_to_number).sum())])
    });
    reg.register_local("floor", 1, &[Any], Number, |_ctx, args| Ok(vec![XdmItem::double(to_number(&args[0]).floor())]));
    reg.register_local("ceiling", 1, &[Any], Number, |_ctx, args| {
        Ok(vec![XdmItem::double(to_number(&args[0]).ceil())])
    });
    reg.register_local("round", 1, &[Any], Number, |_ctx, args| Ok(vec![XdmItem::double(round(to_number(&args[0])))]));

    reg
}

/// XPath 1.0 `round()`: halves round towards positive infinity.
fn round(d: f64) -> f64 {
    if d.is_nan() || d.is_infinite() { d } else { (d + 0.5).floor() }
}

fn substring(s: &str, start: f64, len: Option<f64>) -> String {
    let first = round(start);
    let end = match len {
        Some(l) => first + round(l),
        None => f64::INFINITY,
    };
    s.chars()
        .enumerate()
        .filter(|(i, _)| {
            let p = (*i + 1) as f64;
            p >= first && p < end
        })
        .map(|(_, c)| c)
        .collect()
}

fn context_item<'a, N>(ctx: &'a CallCtx<'_, N>, func: &str) -> Result<&'a XdmItem<N>, Error> {
    ctx.context_item
        .ok_or_else(|| Error::dynamic(ErrorCode::XPDY0002, format!("{func}() called without a context item")))
}

fn string_arg<N: XdmNode>(ctx: &CallCtx<N>, args: &[XdmSequence<N>]) -> Result<String, Error> {
    match args.first() {
        Some(a) => Ok(to_string(a)),
        None => Ok(to_string(std::slice::from_ref(context_item(ctx, "string")?))),
    }
}

fn expect_nodes<N>(seq: &[XdmItem<N>], func: &str) -> Result<usize, Error> {
    if seq.iter().all(|i| matches!(i, XdmItem::Node(_))) {
        Ok(seq.len())
    } else {
        Err(Error::dynamic(ErrorCode::XPTY0004, format!("argument of {func}() must be a node-set")))
    }
}

/// Node addressed by the optional node-set argument (its first node), or the context node.
fn target_node<N: XdmNode>(ctx: &CallCtx<N>, args: &[XdmSequence<N>], func: &str) -> Result<Option<N>, Error> {
    let item = match args.first() {
        Some(seq) => {
            expect_nodes(seq, func)?;
            seq.first()
        }
        None => Some(context_item(ctx, func)?),
    };
    match item {
        Some(XdmItem::Node(n)) => Ok(Some(n.clone())),
        Some(XdmItem::Atomic(_)) => {
            Err(Error::dynamic(ErrorCode::XPTY0004, format!("context item of {func}() is not a node")))
        }
        None => Ok(None),
    }
}
