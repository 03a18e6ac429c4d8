//! Static evaluation of Python literal expressions into JSON values.
//!
//! Accepts the same shapes as Python's `ast.literal_eval` minus sets, bytes
//! and complex numbers: strings, numbers, booleans, `None`, lists, tuples,
//! dicts, unary `+`/`-` on numbers and implicit string concatenation.

use serde_json::{Map, Number, Value};
use thiserror::Error;
use tree_sitter::Node;

#[derive(Error, Debug, PartialEq, Eq)]
pub(crate) enum LiteralError {
    #[error("not a literal: {0}")]
    NotLiteral(String),

    #[error("malformed literal: {0}")]
    Malformed(String),
}

type LiteralResult<T> = std::result::Result<T, LiteralError>;

/// Evaluate a literal expression node
pub(crate) fn literal_eval(node: Node, source: &str) -> LiteralResult<Value> {
    match node.kind() {
        "parenthesized_expression" => match first_named_child(node) {
            Some(inner) => literal_eval(inner, source),
            None => Err(LiteralError::Malformed("empty parentheses".to_string())),
        },
        "list" | "tuple" => {
            let mut cursor = node.walk();
            node.named_children(&mut cursor)
                .filter(|child| child.kind() != "comment")
                .map(|child| literal_eval(child, source))
                .collect::<LiteralResult<Vec<_>>>()
                .map(Value::Array)
        }
        "dictionary" => {
            let mut map = Map::new();
            let mut cursor = node.walk();
            for pair in node.named_children(&mut cursor) {
                match pair.kind() {
                    "pair" => {
                        let key = pair
                            .child_by_field_name("key")
                            .ok_or_else(|| LiteralError::Malformed("pair without key".into()))?;
                        let value = pair
                            .child_by_field_name("value")
                            .ok_or_else(|| LiteralError::Malformed("pair without value".into()))?;
                        map.insert(json_key(literal_eval(key, source)?)?, literal_eval(value, source)?);
                    }
                    "comment" => {}
                    other => return Err(LiteralError::NotLiteral(other.to_string())),
                }
            }
            Ok(Value::Object(map))
        }
        "unary_operator" => {
            let operator = node
                .child_by_field_name("operator")
                .map(|op| node_text(op, source))
                .unwrap_or_default();
            let argument = node
                .child_by_field_name("argument")
                .ok_or_else(|| LiteralError::Malformed("unary operator without operand".into()))?;
            match (operator, literal_eval(argument, source)?) {
                ("+", Value::Number(n)) => Ok(Value::Number(n)),
                ("-", Value::Number(n)) => negate(&n),
                (op, _) => Err(LiteralError::NotLiteral(format!("unary `{op}`"))),
            }
        }
        "concatenated_string" => {
            let mut joined = String::new();
            let mut cursor = node.walk();
            for part in node.named_children(&mut cursor) {
                match literal_eval(part, source)? {
                    Value::String(s) => joined.push_str(&s),
                    _ => return Err(LiteralError::Malformed("mixed concatenation".into())),
                }
            }
            Ok(Value::String(joined))
        }
        "string" => parse_string(node_text(node, source)).map(Value::String),
        "integer" => parse_integer(node_text(node, source)),
        "float" => parse_float(node_text(node, source)),
        "true" => Ok(Value::Bool(true)),
        "false" => Ok(Value::Bool(false)),
        "none" => Ok(Value::Null),
        other => Err(LiteralError::NotLiteral(other.to_string())),
    }
}

/// Whether `node` is a scalar constant Python would treat as true
pub(crate) fn is_truthy_constant(node: Node, source: &str) -> bool {
    if !matches!(
        node.kind(),
        "true" | "false" | "none" | "integer" | "float" | "string" | "concatenated_string"
    ) {
        return false;
    }

    match literal_eval(node, source) {
        Ok(Value::Bool(b)) => b,
        Ok(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Ok(Value::String(s)) => !s.is_empty(),
        _ => false,
    }
}

/// Decode the text of a Python string literal (prefix and quotes included)
pub(crate) fn parse_string(text: &str) -> LiteralResult<String> {
    let quote_start = text
        .find(['\'', '"'])
        .ok_or_else(|| LiteralError::Malformed(text.to_string()))?;
    let prefix = text[..quote_start].to_ascii_lowercase();

    if prefix.contains('f') || prefix.contains('b') {
        return Err(LiteralError::NotLiteral(format!("{prefix}-string")));
    }

    let body = &text[quote_start..];
    let delimiter = ["\"\"\"", "'''", "\"", "'"]
        .into_iter()
        .find(|d| body.starts_with(d) && body.len() >= 2 * d.len() && body.ends_with(d))
        .ok_or_else(|| LiteralError::Malformed(text.to_string()))?;
    let inner = &body[delimiter.len()..body.len() - delimiter.len()];

    if prefix.contains('r') {
        Ok(inner.to_string())
    } else {
        unescape(inner)
    }
}

fn unescape(inner: &str) -> LiteralResult<String> {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }

        let Some(escaped) = chars.next() else {
            return Err(LiteralError::Malformed("trailing backslash".into()));
        };

        match escaped {
            '\n' => {}
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'a' => out.push('\u{07}'),
            'b' => out.push('\u{08}'),
            'f' => out.push('\u{0C}'),
            'v' => out.push('\u{0B}'),
            'x' => out.push(hex_escape(&mut chars, 2)?),
            'u' => out.push(hex_escape(&mut chars, 4)?),
            'U' => out.push(hex_escape(&mut chars, 8)?),
            '0'..='7' => {
                let mut value = escaped.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek().and_then(|d| d.to_digit(8)) {
                        Some(digit) => {
                            value = value * 8 + digit;
                            chars.next();
                        }
                        None => break,
                    }
                }
                out.push(char::from_u32(value).ok_or_else(|| {
                    LiteralError::Malformed(format!("octal escape {value}"))
                })?);
            }
            // Unknown escapes are kept verbatim, as Python does.
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }

    Ok(out)
}

fn hex_escape(chars: &mut impl Iterator<Item = char>, digits: usize) -> LiteralResult<char> {
    let hex: String = chars.take(digits).collect();
    if hex.len() != digits {
        return Err(LiteralError::Malformed(format!("truncated escape `{hex}`")));
    }
    u32::from_str_radix(&hex, 16)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(|| LiteralError::Malformed(format!("invalid escape `{hex}`")))
}

fn parse_integer(text: &str) -> LiteralResult<Value> {
    let cleaned = text.replace('_', "");
    let cleaned = cleaned.trim_end_matches(['l', 'L']);
    let lower = cleaned.to_ascii_lowercase();

    if lower.ends_with('j') {
        return Err(LiteralError::NotLiteral("complex number".into()));
    }

    let parsed = if let Some(hex) = lower.strip_prefix("0x") {
        i64::from_str_radix(hex, 16)
    } else if let Some(oct) = lower.strip_prefix("0o") {
        i64::from_str_radix(oct, 8)
    } else if let Some(bin) = lower.strip_prefix("0b") {
        i64::from_str_radix(bin, 2)
    } else {
        lower.parse::<i64>()
    };

    match parsed {
        Ok(v) => Ok(Value::Number(v.into())),
        // Out-of-range integers degrade to floats.
        Err(_) => parse_float(&lower),
    }
}

fn parse_float(text: &str) -> LiteralResult<Value> {
    let cleaned = text.replace('_', "");
    if cleaned.ends_with(['j', 'J']) {
        return Err(LiteralError::NotLiteral("complex number".into()));
    }
    cleaned
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| LiteralError::Malformed(text.to_string()))
}

fn negate(n: &Number) -> LiteralResult<Value> {
    if let Some(i) = n.as_i64() {
        return Ok(Value::Number((-i).into()));
    }
    n.as_f64()
        .and_then(|f| Number::from_f64(-f))
        .map(Value::Number)
        .ok_or_else(|| LiteralError::Malformed(n.to_string()))
}

/// JSON object keys follow `json.dumps` conversion of scalar dict keys
fn json_key(key: Value) -> LiteralResult<String> {
    match key {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok("null".to_string()),
        _ => Err(LiteralError::NotLiteral("unhashable dict key".into())),
    }
}

pub(crate) fn node_text<'s>(node: Node, source: &'s str) -> &'s str {
    node.utf8_text(source.as_bytes()).unwrap_or_default()
}

fn first_named_child(node: Node) -> Option<Node> {
    let mut cursor = node.walk();
    let child = node
        .named_children(&mut cursor)
        .find(|child| child.kind() != "comment");
    child
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tree_sitter::Parser;

    fn eval(expr: &str) -> LiteralResult<Value> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .unwrap();
        let tree = parser.parse(expr, None).unwrap();
        let statement = tree.root_node().named_child(0).unwrap();
        let expression = statement.named_child(0).unwrap();
        literal_eval(expression, expr)
    }

    #[test]
    fn test_nested_literal() {
        let value = eval(
            r#"{"$schema": "https://vega.github.io/schema/vega-lite/v5.json", "mark": 'bar', "width": 400, "ratio": -0.5, "tags": ["a", ("b", None)], "ok": True}"#,
        )
        .unwrap();

        assert_eq!(
            value,
            json!({
                "$schema": "https://vega.github.io/schema/vega-lite/v5.json",
                "mark": "bar",
                "width": 400,
                "ratio": -0.5,
                "tags": ["a", ["b", null]],
                "ok": true
            })
        );
    }

    #[test]
    fn test_string_forms() {
        assert_eq!(eval(r#"'it\'s'"#).unwrap(), json!("it's"));
        assert_eq!(eval(r#"r'\d+'"#).unwrap(), json!("\\d+"));
        assert_eq!(eval(r#""a" 'b'"#).unwrap(), json!("ab"));
        assert_eq!(eval(r#""\x41é\n""#).unwrap(), json!("Aé\n"));
        assert_eq!(eval("'''multi\nline'''").unwrap(), json!("multi\nline"));
    }

    #[test]
    fn test_numbers() {
        assert_eq!(eval("0x1F").unwrap(), json!(31));
        assert_eq!(eval("1_000").unwrap(), json!(1000));
        assert_eq!(eval("2.5e3").unwrap(), json!(2500.0));
        assert_eq!(eval("-7").unwrap(), json!(-7));
    }

    #[test]
    fn test_non_literals_rejected() {
        assert!(eval("{'a': x}").is_err());
        assert!(eval("f'{name}'").is_err());
        assert!(eval("make_spec()").is_err());
        assert!(eval("{1, 2}").is_err());
        assert!(eval("3j").is_err());
    }
}
