use nbflow_graph::{convert, Category, ConverterConfig, Fragment, GraphBuilder};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::Value;

fn fragments(cells: &[(&str, &str)]) -> Vec<Fragment> {
    cells
        .iter()
        .map(|(id, text)| Fragment::new(*id, *text))
        .collect()
}

const VARS: &[&str] = &["df", "x", "y", "model", "spec"];

/// Small statements over a shared pool of names, covering every category
fn statement() -> impl Strategy<Value = String> {
    let var = prop::sample::select(VARS);
    prop_oneof![
        (var.clone(), var.clone()).prop_map(|(a, b)| format!("{a} = {b} + 1")),
        var.clone().prop_map(|a| format!("{a} = 0")),
        var.clone().prop_map(|a| format!("{a} = pd.read_csv('{a}.csv')")),
        var.clone().prop_map(|a| format!("{a}.plot()")),
        var.clone().prop_map(|a| format!("{a}.dropna(inplace=True)")),
        (var.clone(), var.clone()).prop_map(|(a, b)| format!("{a}['k'] = {b}")),
        Just("import pandas as pd".to_string()),
        var.prop_map(|a| format!("def f_{a}():\n    return {a}")),
    ]
}

fn cell() -> impl Strategy<Value = String> {
    prop::collection::vec(statement(), 1..4).prop_map(|lines| lines.join("\n"))
}

proptest! {
    #[test]
    fn prop_graph_is_acyclic(cells in prop::collection::vec(cell(), 0..12)) {
        let fragments: Vec<Fragment> = cells
            .iter()
            .enumerate()
            .map(|(i, text)| Fragment::new(format!("cell_{i}"), text.clone()))
            .collect();

        let graph = GraphBuilder::new(&ConverterConfig::default())
            .unwrap()
            .build(&fragments);

        prop_assert_eq!(graph.node_count(), fragments.len());
        prop_assert!(graph.is_acyclic());
        for edge in graph.graph.edge_indices() {
            let (from, to) = graph.graph.edge_endpoints(edge).unwrap();
            prop_assert!(from.index() < to.index());
            prop_assert!(!graph.graph[edge].vars.is_empty());
        }
    }

    #[test]
    fn prop_document_drops_only_imports(cells in prop::collection::vec(cell(), 0..8)) {
        let fragments: Vec<Fragment> = cells
            .iter()
            .enumerate()
            .map(|(i, text)| Fragment::new(format!("cell_{i}"), text.clone()))
            .collect();
        let config = ConverterConfig::default();

        let graph = GraphBuilder::new(&config).unwrap().build(&fragments);
        let imports = graph.nodes().filter(|(_, n)| n.category == Category::Imports).count();
        let document = convert(&fragments, &config).unwrap();

        prop_assert_eq!(document.dataflow.nodes.len(), fragments.len() - imports);
    }
}

#[test]
fn test_empty_notebook() {
    let document = convert(&[], &ConverterConfig::default()).unwrap();
    let value = serde_json::to_value(&document).unwrap();

    assert_eq!(
        value,
        serde_json::json!({
            "dataflow": {"nodes": [], "edges": [], "name": "GeneratedWorkflow"}
        })
    );
}

#[test]
fn test_end_to_end_pipeline() {
    let document = convert(
        &fragments(&[
            ("c1", "import pandas as pd\nimport altair as alt"),
            ("c2", "%matplotlib inline\nsales = pd.read_csv('sales.csv')"),
            ("c3", "sales['total'] = sales.price * sales.qty"),
            ("c4", "df = sales.groupby('month').sum()"),
            (
                "c5",
                "alt.Chart(df).mark_line().encode(x='month:O', y='total:Q')",
            ),
        ]),
        &ConverterConfig::default(),
    )
    .unwrap();

    let flow = &document.dataflow;
    let types: Vec<&str> = flow.nodes.iter().map(|n| n.node_type.as_str()).collect();
    assert_eq!(types, vec!["DATA_LOADING", "DATA_CLEANING", "DATA_CLEANING", "VIS_VEGA"]);

    // c3 only mutates `sales`, so c4 still reads it from the load.
    assert_eq!(flow.edges.len(), 3);
    let positions: Vec<(f64, f64)> = flow.nodes.iter().map(|n| (n.x, n.y)).collect();
    assert_eq!(
        positions,
        vec![(0.0, 0.0), (800.0, -250.0), (800.0, 250.0), (1600.0, 0.0)]
    );

    assert_eq!(
        flow.nodes[1].content,
        "sales = arg\nsales['total'] = sales.price * sales.qty\nreturn sales"
    );
    assert_eq!(
        flow.nodes[2].content,
        "sales = arg\ndf = sales.groupby('month').sum()\nreturn df"
    );

    let spec: Value = serde_json::from_str(&flow.nodes[3].content).unwrap();
    assert_eq!(spec["data"], serde_json::json!({"name": "df"}));
    assert_eq!(spec["mark"]["type"], "line");
    assert_eq!(spec["encoding"]["y"]["field"], "total");
}

#[test]
fn test_logical_order_is_not_notebook_order() {
    // The load appears last in the notebook but still feeds the transform.
    let config = ConverterConfig::default();
    let graph = GraphBuilder::new(&config).unwrap().build(&fragments(&[
        ("transform", "df = df.fillna(0)"),
        ("load", "df = pd.read_excel('book.xlsx')"),
    ]));

    let transform = graph.find_node("transform").unwrap();
    let producers: Vec<_> = graph
        .incoming(transform)
        .into_iter()
        .map(|(p, _)| graph.get_node(p).unwrap().id.clone())
        .collect();
    assert_eq!(producers, vec!["load".to_string()]);
}

#[test]
fn test_invalid_config_is_rejected() {
    let mut config = ConverterConfig::default();
    config.layout.spacing_x = -1.0;
    assert!(convert(&[], &config).is_err());
}
