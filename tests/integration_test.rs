//! Integration test for the public API
//!
//! Run with: `cargo test --test integration_test`

use std::collections::HashSet;
use std::fs;
use std::sync::Arc;
use symbol_sql_connector::execution::row_stream::RowStream;
use symbol_sql_connector::metadata::build_schema;
use symbol_sql_connector::storage::demo::transport_store;
use symbol_sql_connector::{
    ConnectorConfig, ConnectorResult, ErrorKind, Row, StoreFile, SymbolConnector, SymbolKind,
    SymbolStore, WhereCondition,
};
use tempfile::TempDir;

fn setup() -> (TempDir, SymbolConnector) {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("models")).unwrap();
    transport_store()
        .unwrap()
        .write_to(dir.path().join("models").join("trnsport.sym"))
        .unwrap();
    let connector = SymbolConnector::new(ConnectorConfig::default().with_source_dir(dir.path()));
    (dir, connector)
}

fn rows(connector: &SymbolConnector, query: &str) -> Vec<Row> {
    connector
        .query(query)
        .unwrap()
        .collect::<ConnectorResult<Vec<Row>>>()
        .unwrap()
}

#[test]
fn test_list_tables_in_store_order() {
    let (_dir, connector) = setup();
    let tables = connector.list_tables("models/trnsport.sym").unwrap();
    let names: Vec<&str> = tables.iter().map(|t| t.table.as_str()).collect();
    assert_eq!(names, vec!["i", "j", "a", "b", "d", "f", "status", "x", "z", "supply"]);

    assert_eq!(tables[0].names(), vec!["*0", "Text"]);
    assert_eq!(tables[5].names(), vec!["Value", "Value (SV)", "Comments"]);
    assert_eq!(tables[7].kind, SymbolKind::Variable);
    assert_eq!(tables[7].len(), 12);
}

#[test]
fn test_extract_query_returns_schema_before_reading() {
    let (_dir, connector) = setup();
    let (schema, handle) = connector
        .extract_query(r#"SELECT i, j, "Value" FROM "d <models\trnsport.sym>""#)
        .unwrap();
    assert_eq!(schema.names(), vec!["i", "j", "Value", "Value (SV)"]);
    assert!(!handle.plan().is_filtered());

    let rows: Vec<Row> = connector.get_data(handle).unwrap().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 6);
    assert_eq!(rows[0].text(0), Some("seattle"));
    assert_eq!(rows[0].text(1), Some("new-york"));
    assert_eq!(rows[0].number(2), Some(2.5));
    assert_eq!(rows[0].get(3), None);
    assert_eq!(rows[5].number(2), Some(1.4));
}

#[test]
fn test_where_filter_on_dimension() {
    let (_dir, connector) = setup();
    let rows = rows(
        &connector,
        r#"SELECT j, Value FROM "d <models/trnsport.sym>" WHERE i='san-diego';"#,
    );
    let markets: Vec<&str> = rows.iter().map(|r| r.text(1).unwrap()).collect();
    assert_eq!(markets, vec!["new-york", "chicago", "topeka"]);
    assert!(rows.iter().all(|r| r.get(0).is_none()));
}

#[test]
fn test_position_reference_is_aliased_in_schema() {
    let (_dir, connector) = setup();
    let (schema, handle) = connector
        .extract_query(r#"SELECT @1, Value FROM "d <models/trnsport.sym>" WHERE @0="seattle""#)
        .unwrap();
    assert_eq!(schema.names(), vec!["@0", "@1", "Value", "Value (SV)"]);

    let stream = connector.get_data(handle).unwrap();
    assert_eq!(stream.schema().names()[0], "@0");
    assert_eq!(stream.schema().names()[1], "@1");
    let rows: Vec<Row> = stream.map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[1].text(1), Some("chicago"));
}

#[test]
fn test_set_text_and_scalar_comments() {
    let (_dir, connector) = setup();
    let plants = rows(&connector, r#"SELECT "*0", Text FROM "i <models/trnsport.sym>""#);
    assert_eq!(plants[0].text(1), Some("west coast"));
    assert_eq!(plants[1].text(0), Some("san-diego"));
    assert_eq!(plants[1].text(1), Some("Y"));

    let freight = rows(&connector, r#"SELECT Value, Comments FROM "f <models/trnsport.sym>""#);
    assert_eq!(freight.len(), 1);
    assert_eq!(freight[0].number(0), Some(90.0));
    assert_eq!(
        freight[0].text(2),
        Some("freight in dollars per case per thousand miles")
    );
}

#[test]
fn test_special_values_and_acronyms() {
    let (_dir, connector) = setup();
    let status = rows(
        &connector,
        r#"SELECT i, Value, "Value (SV)" FROM "status <models/trnsport.sym>""#,
    );
    assert_eq!(status[0].get(1), None);
    assert_eq!(status[0].text(2), Some("open"));
    assert_eq!(status[1].text(2), Some("NA"));

    let bounds = rows(
        &connector,
        r#"SELECT i, Lower, "Lower (SV)", "Upper (SV)" FROM "supply <models/trnsport.sym>""#,
    );
    assert_eq!(bounds[0].text(6), Some("-Inf"));
    assert_eq!(bounds[0].get(5), None);
    // finite upper bound: nothing in the SV column
    assert_eq!(bounds[0].get(8), None);
}

#[test]
fn test_ambiguous_special_value_after_earlier_rows() {
    let (_dir, connector) = setup();
    let results: Vec<ConnectorResult<Row>> = connector
        .query(r#"SELECT i, j, Marginal FROM "x <models/trnsport.sym>""#)
        .unwrap()
        .collect();
    assert_eq!(results.len(), 6);
    assert!(results[..5].iter().all(|r| r.is_ok()));
    assert_eq!(results[2].as_ref().unwrap().number(4), Some(0.036));
    assert_eq!(
        results[5].as_ref().unwrap_err().kind(),
        ErrorKind::AmbiguousSpecialValue
    );
}

#[test]
fn test_variable_slots_with_filter() {
    let (_dir, connector) = setup();
    let rows = rows(
        &connector,
        r#"SELECT i, Level, Marginal, "Marginal (SV)", "Upper (SV)" FROM "x <models/trnsport.sym>" WHERE j='topeka'"#,
    );
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].number(4), Some(0.036));
    assert_eq!(rows[0].text(9), Some("+Inf"));
    assert_eq!(rows[1].number(2), Some(275.0));
    assert_eq!(rows[1].get(4), None);
    assert_eq!(rows[1].text(5), Some("Eps"));
}

#[test]
fn test_pre_scan_errors() {
    let (_dir, connector) = setup();
    let kind = |query: &str| connector.extract_query(query).err().map(|e| e.kind());

    assert_eq!(kind(r#"SELECT i FROM "nope <models/trnsport.sym>""#), Some(ErrorKind::TableNotFound));
    assert_eq!(kind(r#"SELECT k FROM "d <models/trnsport.sym>""#), Some(ErrorKind::FieldNotFound));
    assert_eq!(kind(r#"SELECT @9 FROM "d <models/trnsport.sym>""#), Some(ErrorKind::FieldNotFound));
    assert_eq!(kind(r#"SELECT @0, i FROM "d <models/trnsport.sym>""#), Some(ErrorKind::FieldNotFound));
    assert_eq!(
        kind(r#"SELECT i FROM "d <models/trnsport.sym>" WHERE Value="2.5""#),
        Some(ErrorKind::UnsupportedFilter)
    );
    assert_eq!(kind(r#"SELECT i FROM "d <models/absent.sym>""#), Some(ErrorKind::Connect));
    assert_eq!(kind(r#"SELECT i FROM "d <../trnsport.sym>""#), Some(ErrorKind::Connect));
    assert_eq!(kind(r#"SELECT i FROM d"#), Some(ErrorKind::Syntax));
}

#[test]
fn test_symbol_lookup_is_case_insensitive() {
    let (_dir, connector) = setup();
    let rows = rows(&connector, r#"SELECT Value FROM "D <models/trnsport.sym>""#);
    assert_eq!(rows.len(), 6);
}

#[test]
fn test_record_batches() {
    let (_dir, connector) = setup();
    let batches = connector
        .query(r#"SELECT i, j, Value FROM "d <models/trnsport.sym>""#)
        .unwrap()
        .into_record_batches(4)
        .collect::<ConnectorResult<Vec<_>>>()
        .unwrap();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].num_rows(), 4);
    assert_eq!(batches[1].num_rows(), 2);
    assert_eq!(batches[0].schema().field(2).name(), "Value");
}

#[test]
fn test_scan_entry_point_on_opened_store() {
    let (dir, _connector) = setup();
    let store: Arc<dyn SymbolStore> =
        Arc::new(StoreFile::open(dir.path().join("models").join("trnsport.sym")).unwrap());
    let schema = store
        .symbols()
        .iter()
        .map(build_schema)
        .find(|t| t.table == "b")
        .unwrap();

    let selected: HashSet<String> = ["j".to_string(), "Value".to_string()].into_iter().collect();
    let stream = RowStream::scan(
        Arc::clone(&store),
        &schema,
        &selected,
        &[WhereCondition::new("j", "chicago")],
    )
    .unwrap();
    assert!(stream.is_filtered());
    let rows: Vec<Row> = stream.map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].number(1), Some(300.0));

    // the reader slot is free again once the stream is done
    assert!(store.read_raw(0).is_ok());
}

#[test]
fn test_queue_capacity_from_config_file() {
    let (dir, _connector) = setup();
    let config_path = dir.path().join("connector.json");
    fs::write(
        &config_path,
        format!(
            r#"{{"source_dir": {:?}, "queue_capacity": 0}}"#,
            dir.path().join("models").display().to_string()
        ),
    )
    .unwrap();

    let config = ConnectorConfig::load(&config_path).unwrap();
    assert_eq!(config.effective_queue_capacity(), 1);
    let connector = SymbolConnector::new(config);
    let rows = rows(&connector, r#"SELECT i, Value FROM "a <trnsport.sym>" WHERE i="seattle""#);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].number(1), Some(350.0));
}
