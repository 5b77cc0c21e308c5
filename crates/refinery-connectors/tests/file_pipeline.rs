//! File-to-file pipelines built from JSON descriptions

use std::fs;

use refinery_connectors::full_catalog;
use refinery_core::{Pipeline, PipelineError, PipelineState};
use serde_json::json;

#[test]
fn test_csv_to_json_lines() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("people.csv");
    let output = dir.path().join("people.jsonl");
    fs::write(
        &input,
        "id;name;country\n1;Mr. Smith;US\n2;Ms. Jones;XX\n3;broken\n4;Mr. Brown;DROP\n",
    )
    .unwrap();

    let mut pipeline = Pipeline::from_config(
        &json!({
            "seeder": {"type": "csv", "path": input, "separator": ";"},
            "handlers": [
                {"type": "filter", "matcher": {"type": "key", "key": "country", "value": "DROP"}},
                {
                    "type": "converter",
                    "updater": [
                        {"type": "regex", "field": "name", "pattern": "^M(r|s)\\. ", "replace": ""},
                        {
                            "type": "mapper",
                            "dependence": {"country_name": {"key": "countries", "item_key": "country"}},
                            "value_maps": {"countries": {"US": "United States"}}
                        }
                    ]
                },
                {"type": "json_writer", "path": output, "headers": ["id", "name", "country_name"]}
            ]
        }),
        &full_catalog(),
    )
    .unwrap();

    let summary = pipeline.run().unwrap();
    assert_eq!(summary.read, 3);
    assert_eq!(summary.emitted, 2);
    assert_eq!(summary.dropped, 1);
    assert_eq!(pipeline.state(), PipelineState::Exited);

    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "{\"id\":\"1\",\"name\":\"Smith\",\"country_name\":\"United States\"}\n\
         {\"id\":\"2\",\"name\":\"Jones\",\"country_name\":null}\n"
    );
}

#[test]
fn test_json_to_csv() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("people.json");
    let output = dir.path().join("people.csv");
    fs::write(
        &input,
        r#"{"p1": {"first": "Ada", "last": "Lovelace"}, "p2": {"first": "Alan", "last": "Turing"}}"#,
    )
    .unwrap();

    let mut pipeline = Pipeline::from_config(
        &json!({
            "producer": {"type": "json", "path": input, "key": "id"},
            "handlers": [
                {"type": "string_formatter", "keys": ["first", "last"], "dst": "full", "format": "{first} {last}"},
                {"type": "string_cutter", "keys": {"last": {"end": 1}}},
                {"type": "csv_writer", "path": output, "headers": ["id", "full", "last"]}
            ]
        }),
        &full_catalog(),
    )
    .unwrap();
    pipeline.run().unwrap();

    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "id,full,last\np1,Ada Lovelace,L\np2,Alan Turing,T\n"
    );
}

#[test]
fn test_json_lines_sentinel_stops_before_sink() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.jsonl");
    let output = dir.path().join("out.csv");
    fs::write(&input, "{\"n\": 1}\nnull\n{\"n\": 2}\n").unwrap();

    let mut pipeline = Pipeline::from_config(
        &json!({
            "seeder": {"type": "json_lines", "path": input},
            "handlers": [{"type": "csv_writer", "path": output}]
        }),
        &full_catalog(),
    )
    .unwrap();
    let summary = pipeline.run().unwrap();

    assert_eq!(summary.read, 1);
    assert_eq!(fs::read_to_string(&output).unwrap(), "1\n");
}

#[test]
fn test_missing_input_fails_but_sinks_close() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.jsonl");

    let mut pipeline = Pipeline::from_config(
        &json!({
            "seeder": {"type": "csv", "path": dir.path().join("absent.csv")},
            "handlers": [{"type": "json_writer", "path": output}]
        }),
        &full_catalog(),
    )
    .unwrap();
    let err = pipeline.run().unwrap_err();

    assert!(matches!(err, PipelineError::Adapter(_)));
    assert_eq!(pipeline.state(), PipelineState::Exited);
    assert_eq!(fs::read_to_string(&output).unwrap(), "");
}
