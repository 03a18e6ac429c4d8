use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn write_notebook(dir: &Path, cells: &[(&str, &str)]) -> PathBuf {
    let cells: Vec<Value> = cells
        .iter()
        .map(|(id, source)| {
            json!({
                "cell_type": "code",
                "metadata": {"id": id},
                "source": source,
                "outputs": [],
                "execution_count": null
            })
        })
        .collect();
    let notebook = json!({
        "nbformat": 4,
        "nbformat_minor": 5,
        "metadata": {},
        "cells": cells
    });

    let path = dir.join("analysis.ipynb");
    fs::write(&path, serde_json::to_string_pretty(&notebook).unwrap()).unwrap();
    path
}

#[allow(deprecated)]
fn nbflow() -> Command {
    let mut cmd = Command::cargo_bin("nbflow").expect("binary");
    cmd.env_remove("RUST_LOG");
    cmd
}

const PIPELINE: &[(&str, &str)] = &[
    ("imports", "import pandas as pd"),
    ("load", "df = pd.read_csv('data.csv')"),
    ("clean", "df = df.dropna()"),
    ("plot", "df.plot(kind='bar')"),
];

#[test]
fn convert_to_stdout() {
    let temp = tempdir().unwrap();
    let notebook = write_notebook(temp.path(), PIPELINE);

    let output = nbflow()
        .arg("--quiet")
        .arg("convert")
        .arg(&notebook)
        .output()
        .expect("command run");
    assert!(output.status.success());

    let body: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    let flow = &body["dataflow"];
    assert_eq!(flow["name"], "GeneratedWorkflow");
    assert_eq!(flow["nodes"].as_array().unwrap().len(), 3);
    assert_eq!(flow["edges"].as_array().unwrap().len(), 2);
    assert_eq!(flow["nodes"][0]["type"], "DATA_LOADING");
    assert_eq!(flow["nodes"][1]["content"], "df = arg\ndf = df.dropna()\nreturn df");
}

#[test]
fn convert_to_file() {
    let temp = tempdir().unwrap();
    let notebook = write_notebook(temp.path(), PIPELINE);
    let out = temp.path().join("flow.json");

    nbflow()
        .arg("convert")
        .arg(&notebook)
        .arg("-o")
        .arg(&out)
        .arg("--compact")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let raw = fs::read_to_string(&out).unwrap();
    assert_eq!(raw.lines().count(), 1);
    let body: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(body["dataflow"]["nodes"].as_array().unwrap().len(), 3);
}

#[test]
fn empty_notebook_warns_and_emits_empty_document() {
    let temp = tempdir().unwrap();
    let notebook = write_notebook(temp.path(), &[]);

    let output = nbflow()
        .arg("convert")
        .arg(&notebook)
        .output()
        .expect("command run");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("No code cells found"));

    let body: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(
        body,
        json!({"dataflow": {"nodes": [], "edges": [], "name": "GeneratedWorkflow"}})
    );
}

#[test]
fn inspect_json_summary() {
    let temp = tempdir().unwrap();
    let notebook = write_notebook(temp.path(), PIPELINE);

    let output = nbflow()
        .args(["-q", "inspect"])
        .arg(&notebook)
        .output()
        .expect("command run");
    assert!(output.status.success());

    let summary: Value = serde_json::from_slice(&output.stdout).unwrap();
    let ids: Vec<&str> = summary["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["imports", "load", "clean", "plot"]);
    assert_eq!(
        summary["edges"][0],
        json!({"source": "load", "target": "clean", "vars": ["df"]})
    );
}

#[test]
fn inspect_dot() {
    let temp = tempdir().unwrap();
    let notebook = write_notebook(temp.path(), PIPELINE);

    nbflow()
        .args(["-q", "inspect", "--format", "dot"])
        .arg(&notebook)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("digraph notebook {"))
        .stdout(predicate::str::contains("fillcolor=\"#cde4ff\""))
        .stdout(predicate::str::contains("[label=\"df\"]"))
        .stdout(predicate::str::contains("(imports)").not());
}

#[test]
fn config_file_changes_output() {
    let temp = tempdir().unwrap();
    let notebook = write_notebook(temp.path(), PIPELINE);
    let config = temp.path().join("nbflow.toml");
    fs::write(
        &config,
        "[export]\ninput_placeholder = \"inputs\"\nworkflow_name = \"Sales\"\n",
    )
    .unwrap();

    let output = nbflow()
        .arg("-q")
        .arg("--config")
        .arg(&config)
        .arg("convert")
        .arg(&notebook)
        .output()
        .expect("command run");
    assert!(output.status.success());

    let body: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(body["dataflow"]["name"], "Sales");
    assert_eq!(
        body["dataflow"]["nodes"][1]["content"],
        "df = inputs\ndf = df.dropna()\nreturn df"
    );
}

#[test]
fn missing_notebook_fails() {
    nbflow()
        .args(["convert", "/no/such/notebook.ipynb"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read notebook"));
}

#[test]
fn invalid_config_fails() {
    let temp = tempdir().unwrap();
    let notebook = write_notebook(temp.path(), PIPELINE);
    let config = temp.path().join("bad.toml");
    fs::write(&config, "[layout]\ncategory_order = [\"imports\"]\n").unwrap();

    nbflow()
        .arg("--config")
        .arg(&config)
        .arg("convert")
        .arg(&notebook)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid configuration"));
}
