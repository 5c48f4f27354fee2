use hyperlens::shaping::{to_delimited, to_json, ExportFormat};
use hyperlens_protocol::ExportResult;
use hyperlens_test_utils::payloads::export_payload;
use hyperlens_test_utils::TableFixture;
use serde_json::{json, Value};

fn export_result(tables: &[TableFixture]) -> ExportResult {
    let document = export_payload("sales.hyper", tables, None);
    serde_json::from_value(document).expect("decode export payload")
}

fn read_section(text: &str) -> (Vec<String>, Vec<Vec<String>>) {
    let mut reader = csv::ReaderBuilder::new()
        .comment(Some(b'#'))
        .from_reader(text.as_bytes());
    let headers = reader
        .headers()
        .unwrap()
        .iter()
        .map(str::to_string)
        .collect();
    let rows = reader
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect();
    (headers, rows)
}

#[test]
fn test_delimited_round_trip_of_awkward_values() {
    let awkward = "Smith, \"Bob\"\nline two";
    let table = TableFixture::new("Extract", "People")
        .column("id", "integer")
        .column("name", "text")
        .column("score", "double")
        .row(vec![json!(1), json!(awkward), json!(2.5)])
        .row(vec![json!(2), Value::Null, json!(-1)]);
    let result = export_result(&[table]);

    let text = to_delimited(&result, b',').unwrap();
    let (headers, rows) = read_section(&text);

    assert_eq!(headers, ["id", "name", "score"]);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0], ["1", awkward, "2.5"]);
    assert_eq!(rows[1], ["2", "", "-1"]);
}

#[test]
fn test_empty_table_gets_header_only_section() {
    let empty = TableFixture::new("Extract", "Returns")
        .column("order_id", "integer")
        .column("reason", "text");
    let orders = TableFixture::numbered("Orders", 2);
    let result = export_result(&[empty, orders]);

    let text = to_delimited(&result, b',').unwrap();
    assert_eq!(
        text,
        "# Extract.Returns\norder_id,reason\n\n# Extract.Orders\nid,label\n1,row 1\n2,row 2\n"
    );
}

#[test]
fn test_custom_delimiter() {
    let table = TableFixture::new("Extract", "T")
        .column("a", "text")
        .column("b", "text")
        .row(vec![json!("x;y"), json!("plain")]);
    let text = to_delimited(&export_result(&[table]), b';').unwrap();
    assert!(text.ends_with("a;b\n\"x;y\";plain\n"), "{}", text);
}

#[test]
fn test_json_keeps_every_field_and_column_order() {
    let table = TableFixture::new("Extract", "Wide")
        .column("zeta", "text")
        .column("alpha", "integer")
        .column("mid", "text")
        .row(vec![json!("z"), json!(1), Value::Null]);
    let result = export_result(&[table]);

    let text = to_json(&result).unwrap();
    let zeta = text.find("\"zeta\"").unwrap();
    let alpha = text.find("\"alpha\"").unwrap();
    let mid = text.find("\"mid\"").unwrap();
    assert!(zeta < alpha && alpha < mid, "{}", text);

    let parsed: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed["tables"][0]["data"][0]["mid"], Value::Null);
    assert_eq!(parsed["total_rows_exported"], 1);
    assert_eq!(parsed["export_type"], "full_data");
    assert_eq!(ExportFormat::Json.render(&result).unwrap(), text);
}
