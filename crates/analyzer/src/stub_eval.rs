//! Sandboxed evaluation of Altair chart-building code.
//!
//! The evaluator interprets a small subset of Python (assignments, imports,
//! attribute access, calls and literals) over an environment seeded with stub
//! `alt`, `pd` and `data` modules and an empty placeholder table `df`. Stub
//! charts render themselves to Vega-Lite the way `Chart.to_dict()` would.
//! There is no access to files, network or the host interpreter: anything
//! outside the supported subset is an error, and callers treat every error
//! as "no spec".

use crate::literal::{literal_eval, node_text};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use thiserror::Error;
use tree_sitter::Node;

const VEGA_LITE_SCHEMA: &str = "https://vega.github.io/schema/vega-lite/v5.json";
const VEGA_DATASETS_URL: &str = "https://cdn.jsdelivr.net/npm/vega-datasets@v1.29.0/data";

/// Altair encoding channel classes accepting a field shorthand
const CHANNELS: &[&str] = &[
    "X", "Y", "X2", "Y2", "Color", "Fill", "Stroke", "Opacity", "Size", "Shape", "Text",
    "Tooltip", "Row", "Column", "Facet", "Detail", "Order", "Theta", "Radius", "Latitude",
    "Longitude", "Href", "StrokeDash", "StrokeWidth",
];

#[derive(Error, Debug)]
pub(crate) enum EvalError {
    #[error("unsupported construct `{0}`")]
    Unsupported(String),

    #[error("name `{0}` is not defined")]
    UnknownName(String),

    #[error("`{0}` has no attribute `{1}`")]
    NoAttribute(String, String),

    #[error("bad arguments: {0}")]
    BadArguments(String),

    #[error("fragment does not end with an expression")]
    NoTrailingExpression,

    #[error("trailing expression is not a chart")]
    NotAChart,

    #[error("step limit of {0} exceeded")]
    StepLimit(usize),
}

type EvalResult<T> = std::result::Result<T, EvalError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Library {
    Altair,
    Pandas,
    Datasets,
    /// Imported but not stubbed; any use fails
    Opaque,
}

impl Library {
    fn from_module(module: &str) -> Self {
        match module {
            "altair" => Library::Altair,
            "pandas" => Library::Pandas,
            "vega_datasets" | "vega_datasets.data" => Library::Datasets,
            _ => Library::Opaque,
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            Library::Altair => "altair",
            Library::Pandas => "pandas",
            Library::Datasets => "vega_datasets.data",
            Library::Opaque => "<module>",
        }
    }
}

#[derive(Debug, Clone)]
enum Callee {
    Library(Library, String),
    Method(Box<Chart>, String),
}

#[derive(Debug, Clone)]
enum StubValue {
    Module(Library),
    Table(Vec<Value>),
    Json(Value),
    Chart(Box<Chart>),
    Function(Callee),
}

/// Stub of `altair.Chart`
#[derive(Debug, Clone, Default)]
struct Chart {
    data: Option<Value>,
    mark: Option<Value>,
    encoding: Map<String, Value>,
    properties: Map<String, Value>,
    params: Vec<Value>,
}

impl Chart {
    fn to_dict(&self) -> EvalResult<Value> {
        let mark = self
            .mark
            .clone()
            .ok_or_else(|| EvalError::BadArguments("'mark' is a required property".into()))?;

        let mut spec = Map::new();
        spec.insert("$schema".into(), Value::String(VEGA_LITE_SCHEMA.into()));
        spec.insert(
            "config".into(),
            json!({"view": {"continuousWidth": 300, "continuousHeight": 300}}),
        );
        if let Some(data) = &self.data {
            spec.insert("data".into(), data.clone());
        }
        spec.insert("mark".into(), mark);
        if !self.encoding.is_empty() {
            spec.insert("encoding".into(), Value::Object(self.encoding.clone()));
        }
        if !self.params.is_empty() {
            spec.insert("params".into(), Value::Array(self.params.clone()));
        }
        for (key, value) in &self.properties {
            spec.insert(key.clone(), value.clone());
        }
        Ok(Value::Object(spec))
    }
}

pub(crate) struct StubEvaluator<'a> {
    source: &'a str,
    env: HashMap<String, StubValue>,
    steps: usize,
    step_limit: usize,
}

impl<'a> StubEvaluator<'a> {
    pub(crate) fn new(source: &'a str, step_limit: usize) -> Self {
        let env = HashMap::from([
            ("alt".to_string(), StubValue::Module(Library::Altair)),
            ("pd".to_string(), StubValue::Module(Library::Pandas)),
            ("data".to_string(), StubValue::Module(Library::Datasets)),
            ("df".to_string(), StubValue::Table(Vec::new())),
        ]);

        Self {
            source,
            env,
            steps: 0,
            step_limit,
        }
    }

    /// Execute every statement but the last, then render the last expression
    pub(crate) fn render_trailing_chart(&mut self, root: Node<'_>) -> EvalResult<Value> {
        let mut cursor = root.walk();
        let statements: Vec<Node<'_>> = root
            .named_children(&mut cursor)
            .filter(|n| n.kind() != "comment")
            .collect();

        let (last, body) = statements
            .split_last()
            .ok_or(EvalError::NoTrailingExpression)?;
        let trailing = trailing_expression(*last).ok_or(EvalError::NoTrailingExpression)?;

        for &statement in body {
            self.exec(statement)?;
        }

        match self.eval(trailing)? {
            StubValue::Chart(chart) => chart.to_dict(),
            StubValue::Json(value) if value.get("$schema").is_some() => Ok(value),
            _ => Err(EvalError::NotAChart),
        }
    }

    fn exec(&mut self, statement: Node<'_>) -> EvalResult<()> {
        match statement.kind() {
            "expression_statement" => {
                let mut cursor = statement.walk();
                let children: Vec<_> = statement.named_children(&mut cursor).collect();
                for child in children {
                    if child.kind() == "assignment" {
                        self.assign(child)?;
                    } else {
                        self.eval(child)?;
                    }
                }
                Ok(())
            }
            "import_statement" => {
                let mut cursor = statement.walk();
                let names: Vec<_> = statement
                    .children_by_field_name("name", &mut cursor)
                    .collect();
                for name in names {
                    let (module, binding) = match name.kind() {
                        "aliased_import" => {
                            let module = field_text(name, "name", self.source)?;
                            (module, field_text(name, "alias", self.source)?)
                        }
                        _ => {
                            let module = node_text(name, self.source);
                            (module, module.split('.').next().unwrap_or(module))
                        }
                    };
                    self.env.insert(
                        binding.to_string(),
                        StubValue::Module(Library::from_module(module)),
                    );
                }
                Ok(())
            }
            "import_from_statement" => {
                let module = field_text(statement, "module_name", self.source)?;
                let mut cursor = statement.walk();
                let names: Vec<_> = statement
                    .children_by_field_name("name", &mut cursor)
                    .collect();
                for name in names {
                    let (imported, binding) = match name.kind() {
                        "aliased_import" => (
                            field_text(name, "name", self.source)?,
                            field_text(name, "alias", self.source)?,
                        ),
                        _ => {
                            let imported = node_text(name, self.source);
                            (imported, imported)
                        }
                    };
                    let library = Library::from_module(&format!("{module}.{imported}"));
                    let value = if library == Library::Opaque {
                        get_attr(StubValue::Module(Library::from_module(module)), imported)
                            .unwrap_or(StubValue::Module(Library::Opaque))
                    } else {
                        StubValue::Module(library)
                    };
                    self.env.insert(binding.to_string(), value);
                }
                Ok(())
            }
            "pass_statement" => Ok(()),
            other => Err(EvalError::Unsupported(other.to_string())),
        }
    }

    fn assign(&mut self, node: Node<'_>) -> EvalResult<()> {
        let mut targets = Vec::new();
        let mut current = node;
        let value = loop {
            let left = current
                .child_by_field_name("left")
                .ok_or_else(|| EvalError::Unsupported("assignment without target".into()))?;
            if left.kind() != "identifier" {
                return Err(EvalError::Unsupported(format!("{} target", left.kind())));
            }
            targets.push(node_text(left, self.source).to_string());

            match current.child_by_field_name("right") {
                Some(right) if right.kind() == "assignment" => current = right,
                other => break other,
            }
        };

        let Some(value) = value else {
            return Ok(());
        };
        let value = self.eval(value)?;
        for target in targets {
            self.env.insert(target, value.clone());
        }
        Ok(())
    }

    fn eval(&mut self, node: Node<'_>) -> EvalResult<StubValue> {
        self.steps += 1;
        if self.steps > self.step_limit {
            return Err(EvalError::StepLimit(self.step_limit));
        }

        match node.kind() {
            "identifier" => {
                let name = node_text(node, self.source);
                self.env
                    .get(name)
                    .cloned()
                    .ok_or_else(|| EvalError::UnknownName(name.to_string()))
            }
            "parenthesized_expression" => {
                let inner = node
                    .named_child(0)
                    .ok_or_else(|| EvalError::Unsupported("empty parentheses".into()))?;
                self.eval(inner)
            }
            "attribute" => {
                let object = node
                    .child_by_field_name("object")
                    .ok_or_else(|| EvalError::Unsupported("attribute without object".into()))?;
                let attribute = field_text(node, "attribute", self.source)?;
                let object = self.eval(object)?;
                get_attr(object, attribute)
            }
            "call" => {
                let function = node
                    .child_by_field_name("function")
                    .ok_or_else(|| EvalError::Unsupported("call without callee".into()))?;
                let callee = self.eval(function)?;
                let (args, kwargs) = match node.child_by_field_name("arguments") {
                    Some(arguments) => self.eval_arguments(arguments)?,
                    None => (Vec::new(), Vec::new()),
                };
                call(callee, args, kwargs)
            }
            "list" | "tuple" => {
                let mut cursor = node.walk();
                let items: Vec<_> = node.named_children(&mut cursor).collect();
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    let value = self.eval(item)?;
                    values.push(to_json(value)?);
                }
                Ok(StubValue::Json(Value::Array(values)))
            }
            "dictionary" => {
                let mut cursor = node.walk();
                let pairs: Vec<_> = node.named_children(&mut cursor).collect();
                let mut map = Map::new();
                for pair in pairs {
                    if pair.kind() != "pair" {
                        return Err(EvalError::Unsupported(pair.kind().to_string()));
                    }
                    let (Some(key), Some(value)) = (
                        pair.child_by_field_name("key"),
                        pair.child_by_field_name("value"),
                    ) else {
                        return Err(EvalError::Unsupported("incomplete pair".into()));
                    };
                    let key = match to_json(self.eval(key)?)? {
                        Value::String(s) => s,
                        other => other.to_string(),
                    };
                    let value = to_json(self.eval(value)?)?;
                    map.insert(key, value);
                }
                Ok(StubValue::Json(Value::Object(map)))
            }
            "string" | "concatenated_string" | "integer" | "float" | "true" | "false" | "none"
            | "unary_operator" => literal_eval(node, self.source)
                .map(StubValue::Json)
                .map_err(|e| EvalError::Unsupported(e.to_string())),
            other => Err(EvalError::Unsupported(other.to_string())),
        }
    }

    fn eval_arguments(
        &mut self,
        arguments: Node<'_>,
    ) -> EvalResult<(Vec<StubValue>, Vec<(String, StubValue)>)> {
        if arguments.kind() != "argument_list" {
            return Err(EvalError::Unsupported(arguments.kind().to_string()));
        }

        let mut cursor = arguments.walk();
        let children: Vec<_> = arguments.named_children(&mut cursor).collect();
        let mut args = Vec::new();
        let mut kwargs = Vec::new();

        for child in children {
            match child.kind() {
                "comment" => {}
                "keyword_argument" => {
                    let name = field_text(child, "name", self.source)?.to_string();
                    let value = child
                        .child_by_field_name("value")
                        .ok_or_else(|| EvalError::Unsupported("keyword without value".into()))?;
                    kwargs.push((name, self.eval(value)?));
                }
                "list_splat" | "dictionary_splat" => {
                    return Err(EvalError::Unsupported(child.kind().to_string()));
                }
                _ => args.push(self.eval(child)?),
            }
        }

        Ok((args, kwargs))
    }
}

fn trailing_expression(statement: Node<'_>) -> Option<Node<'_>> {
    if statement.kind() != "expression_statement" || statement.named_child_count() != 1 {
        return None;
    }
    statement
        .named_child(0)
        .filter(|child| !matches!(child.kind(), "assignment" | "augmented_assignment" | "yield"))
}

fn field_text<'s>(node: Node<'_>, field: &str, source: &'s str) -> EvalResult<&'s str> {
    node.child_by_field_name(field)
        .map(|child| node_text(child, source))
        .ok_or_else(|| EvalError::Unsupported(format!("{} without {field}", node.kind())))
}

fn get_attr(object: StubValue, attribute: &str) -> EvalResult<StubValue> {
    match object {
        StubValue::Module(Library::Opaque) => Err(EvalError::NoAttribute(
            Library::Opaque.as_str().into(),
            attribute.into(),
        )),
        StubValue::Module(library) => Ok(StubValue::Function(Callee::Library(
            library,
            attribute.to_string(),
        ))),
        StubValue::Chart(chart) => Ok(StubValue::Function(Callee::Method(
            chart,
            attribute.to_string(),
        ))),
        StubValue::Function(Callee::Library(Library::Datasets, name)) if attribute == "url" => Ok(
            StubValue::Json(Value::String(format!("{VEGA_DATASETS_URL}/{name}.json"))),
        ),
        _ => Err(EvalError::NoAttribute("value".into(), attribute.into())),
    }
}

fn call(
    callee: StubValue,
    args: Vec<StubValue>,
    kwargs: Vec<(String, StubValue)>,
) -> EvalResult<StubValue> {
    match callee {
        StubValue::Function(Callee::Library(Library::Altair, name)) => call_altair(&name, args, kwargs),
        StubValue::Function(Callee::Library(Library::Pandas, name)) => match name.as_str() {
            "DataFrame" => table_from(args.into_iter().next()),
            loader if loader.starts_with("read_") => Ok(StubValue::Table(Vec::new())),
            other => Err(EvalError::NoAttribute("pandas".into(), other.into())),
        },
        StubValue::Function(Callee::Library(Library::Datasets, _)) => {
            Ok(StubValue::Table(Vec::new()))
        }
        StubValue::Function(Callee::Method(chart, name)) => chart_method(*chart, &name, args, kwargs),
        _ => Err(EvalError::Unsupported("call of a non-callable value".into())),
    }
}

fn call_altair(
    name: &str,
    args: Vec<StubValue>,
    kwargs: Vec<(String, StubValue)>,
) -> EvalResult<StubValue> {
    match name {
        "Chart" => {
            let mut chart = Chart::default();
            let mut data = args.into_iter().next();
            for (key, value) in kwargs {
                match key.as_str() {
                    "data" => data = Some(value),
                    "mark" => chart.mark = Some(mark_object(to_json(value)?)),
                    _ => {
                        chart.properties.insert(key, to_json(value)?);
                    }
                }
            }
            chart.data = data.map(data_reference).transpose()?;
            Ok(StubValue::Chart(Box::new(chart)))
        }
        "value" => {
            let value = args
                .into_iter()
                .next()
                .ok_or_else(|| EvalError::BadArguments("alt.value() needs a value".into()))?;
            Ok(StubValue::Json(json!({ "value": to_json(value)? })))
        }
        class if class.starts_with(|c: char| c.is_ascii_uppercase()) => {
            let mut object = Map::new();
            if let Some(first) = args.into_iter().next() {
                match (CHANNELS.contains(&class), to_json(first)?) {
                    (true, Value::String(shorthand)) => {
                        if let Value::Object(parsed) = parse_shorthand(&shorthand) {
                            object.extend(parsed);
                        }
                    }
                    _ => {
                        return Err(EvalError::BadArguments(format!(
                            "positional argument to alt.{class}"
                        )))
                    }
                }
            }
            for (key, value) in kwargs {
                object.insert(key, to_json(value)?);
            }
            Ok(StubValue::Json(Value::Object(object)))
        }
        other => Err(EvalError::NoAttribute("altair".into(), other.into())),
    }
}

fn chart_method(
    mut chart: Chart,
    name: &str,
    args: Vec<StubValue>,
    kwargs: Vec<(String, StubValue)>,
) -> EvalResult<StubValue> {
    if let Some(mark) = name.strip_prefix("mark_") {
        let mut object = Map::new();
        object.insert("type".into(), Value::String(mark.to_string()));
        for (key, value) in kwargs {
            object.insert(key, to_json(value)?);
        }
        chart.mark = Some(Value::Object(object));
        return Ok(StubValue::Chart(Box::new(chart)));
    }

    match name {
        "encode" => {
            if !args.is_empty() {
                return Err(EvalError::BadArguments("positional encodings".into()));
            }
            for (channel, value) in kwargs {
                chart.encoding.insert(channel, encoding_entry(to_json(value)?)?);
            }
        }
        "properties" => {
            for (key, value) in kwargs {
                chart.properties.insert(key, to_json(value)?);
            }
        }
        "interactive" => {
            let name = format!("param_{}", chart.params.len() + 1);
            chart.params.push(json!({
                "name": name,
                "select": {"type": "interval", "encodings": ["x", "y"]},
                "bind": "scales"
            }));
        }
        "to_dict" => return chart.to_dict().map(StubValue::Json),
        other => return Err(EvalError::Unsupported(format!("Chart.{other}"))),
    }

    Ok(StubValue::Chart(Box::new(chart)))
}

fn to_json(value: StubValue) -> EvalResult<Value> {
    match value {
        StubValue::Json(value) => Ok(value),
        StubValue::Table(rows) => Ok(Value::Array(rows)),
        StubValue::Chart(chart) => chart.to_dict(),
        StubValue::Module(library) => Err(EvalError::Unsupported(format!(
            "module {} as a value",
            library.as_str()
        ))),
        StubValue::Function(_) => Err(EvalError::Unsupported("function as a value".into())),
    }
}

fn data_reference(value: StubValue) -> EvalResult<Value> {
    match value {
        StubValue::Table(rows) => Ok(json!({ "values": rows })),
        StubValue::Json(Value::String(url)) => Ok(json!({ "url": url })),
        StubValue::Json(object @ Value::Object(_)) => Ok(object),
        _ => Err(EvalError::BadArguments("unusable chart data".into())),
    }
}

fn table_from(argument: Option<StubValue>) -> EvalResult<StubValue> {
    match argument {
        None => Ok(StubValue::Table(Vec::new())),
        Some(StubValue::Table(rows)) => Ok(StubValue::Table(rows)),
        Some(StubValue::Json(Value::Array(rows))) if rows.iter().all(Value::is_object) => {
            Ok(StubValue::Table(rows))
        }
        Some(StubValue::Json(Value::Object(columns))) => {
            let height = columns
                .values()
                .map(|column| column.as_array().map_or(0, Vec::len))
                .max()
                .unwrap_or(0);
            let rows = (0..height)
                .map(|i| {
                    let row: Map<String, Value> = columns
                        .iter()
                        .map(|(name, column)| {
                            let cell = column.get(i).cloned().unwrap_or(Value::Null);
                            (name.clone(), cell)
                        })
                        .collect();
                    Value::Object(row)
                })
                .collect();
            Ok(StubValue::Table(rows))
        }
        Some(_) => Err(EvalError::BadArguments("pd.DataFrame input".into())),
    }
}

fn mark_object(mark: Value) -> Value {
    match mark {
        Value::String(kind) => json!({ "type": kind }),
        other => other,
    }
}

fn encoding_entry(value: Value) -> EvalResult<Value> {
    match value {
        Value::String(shorthand) => Ok(parse_shorthand(&shorthand)),
        Value::Array(items) => items
            .into_iter()
            .map(encoding_entry)
            .collect::<EvalResult<Vec<_>>>()
            .map(Value::Array),
        object @ Value::Object(_) => Ok(object),
        other => Err(EvalError::BadArguments(format!("encoding value {other}"))),
    }
}

fn encoding_type(code: &str) -> Option<&'static str> {
    match code {
        "Q" | "quantitative" => Some("quantitative"),
        "N" | "nominal" => Some("nominal"),
        "O" | "ordinal" => Some("ordinal"),
        "T" | "temporal" => Some("temporal"),
        "G" | "geojson" => Some("geojson"),
        _ => None,
    }
}

/// Expand Altair shorthand such as `"mean(price):Q"` into an encoding object
fn parse_shorthand(shorthand: &str) -> Value {
    let mut spec = Map::new();

    let (body, kind) = match shorthand.rsplit_once(':') {
        Some((body, code)) if encoding_type(code).is_some() => (body, encoding_type(code)),
        _ => (shorthand, None),
    };

    let aggregated = body
        .strip_suffix(')')
        .and_then(|inner| inner.split_once('('))
        .filter(|(op, _)| !op.is_empty() && op.chars().all(|c| c.is_ascii_alphanumeric()));

    match aggregated {
        Some((op, field)) => {
            spec.insert("aggregate".into(), Value::String(op.to_string()));
            if !field.is_empty() {
                spec.insert("field".into(), Value::String(field.to_string()));
            }
            let kind = kind.or(if op == "count" { Some("quantitative") } else { None });
            if let Some(kind) = kind {
                spec.insert("type".into(), Value::String(kind.to_string()));
            }
        }
        None => {
            spec.insert("field".into(), Value::String(body.to_string()));
            if let Some(kind) = kind {
                spec.insert("type".into(), Value::String(kind.to_string()));
            }
        }
    }

    Value::Object(spec)
}
