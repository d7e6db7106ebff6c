use super::*;

fn write(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn format_from_extension_and_name() {
    assert_eq!(InputFormat::from_path(Path::new("a/costs.CSV")), InputFormat::Csv);
    assert_eq!(InputFormat::from_path(Path::new("costs.json")), InputFormat::Json);
    assert_eq!(InputFormat::from_path(Path::new("costs")), InputFormat::Json);
    assert_eq!("GUS".parse::<InputFormat>().unwrap(), InputFormat::Gus);
    assert!(matches!(
        "xml".parse::<InputFormat>(),
        Err(ImportError::UnknownFormat(_))
    ));
}

#[test]
fn json_records_accept_numbers_and_strings() {
    let records = parse_json_records(
        r#"[{"unit_code": "1465011", "cost_type_code": "MUNICIPAL", "year": 2023, "value": 150.5},
            {"unit_code": "1465011", "cost_type_code": "MUNICIPAL", "year": "2022", "value": null}]"#,
        "inline",
    )
    .unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].year.as_deref(), Some("2023"));
    assert_eq!(records[0].value.as_deref(), Some("150.5"));
    assert!(records[1].value_is_null());
}

#[test]
fn malformed_json_is_a_parse_error() {
    let err = parse_json_records("{not json", "broken.json").unwrap_err();
    assert!(matches!(err, ImportError::InputParse { ref source_name, .. } if source_name == "broken.json"));
}

#[test]
fn load_json_and_csv_files() {
    let db = StatsDb::open_memory().unwrap();
    let dir = tempfile::tempdir().unwrap();

    let json = write(
        &dir,
        "costs.json",
        r#"[{"unit_code": "1465011", "cost_type_code": "MUNICIPAL", "year": 2023, "value": 1}]"#,
    );
    let source = load_source(&db, &json, InputFormat::Json, 0).unwrap();
    assert_eq!(source.records.len(), 1);
    assert!(source.name.ends_with("costs.json"));

    let csv = write(
        &dir,
        "costs.csv",
        "unit_code,cost_type_code,year,value\n1465011,MUNICIPAL,2023,1\n1465011,MUNICIPAL,2022,2\n",
    );
    let source = load_source(&db, &csv, InputFormat::Csv, 0).unwrap();
    assert_eq!(source.records.len(), 2);
}

#[test]
fn load_gus_payload_maps_variables() {
    let db = StatsDb::open_memory().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        &dir,
        "gus.json",
        r#"[
            {"id": "011465011000", "name": "Powiat m. Warszawa",
             "variable_name": "zasoby gminne (komunalne)",
             "values": [{"year": "2022", "val": 10.5}, {"year": "2023", "val": null}]},
            {"id": "011465011000", "name": "Powiat m. Warszawa",
             "variable_name": "something else entirely",
             "values": [{"year": "2022", "val": 1}]}
        ]"#,
    );
    let source = load_source(&db, &path, InputFormat::Gus, 5).unwrap();
    assert_eq!(source.records.len(), 1);
    let record = &source.records[0];
    assert_eq!(record.unit_code.as_deref(), Some("0114650"));
    assert_eq!(record.unit_level.as_deref(), Some("DISTRICT"));
    assert_eq!(record.parent_code.as_deref(), Some("0100000"));
    assert_eq!(record.cost_type_code.as_deref(), Some("MUNICIPAL"));
    assert_eq!(record.year.as_deref(), Some("2022"));
}

#[test]
fn missing_file_reports_io_error() {
    let db = StatsDb::open_memory().unwrap();
    let err = load_source(&db, Path::new("/nonexistent/costs.json"), InputFormat::Json, 0)
        .unwrap_err();
    assert!(matches!(err, ImportError::Io { .. }));
}
