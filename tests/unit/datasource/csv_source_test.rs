/*!
# Delimited Source Tests

Reads through the public [`RowSource`] surface only: quoting rules, header
handling, tolerance options and typed values.
*/

use flatsql::datasource::{CsvReader, CsvSourceConfig, QuoteStyle, RowSource};
use flatsql::sql::{DataType, FieldValue, SqlError};
use std::collections::HashMap;

fn rows(text: &str, config: CsvSourceConfig) -> Vec<Vec<Option<FieldValue>>> {
    let mut reader = CsvReader::from_text(text, config).expect("reader opens");
    let mut rows = Vec::new();
    while let Some(row) = reader.next_row().expect("row reads") {
        rows.push(row);
    }
    rows
}

fn text_rows(text: &str, config: CsvSourceConfig) -> Vec<Vec<String>> {
    rows(text, config)
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|v| v.map_or_else(|| "NULL".to_string(), |v| v.to_string()))
                .collect()
        })
        .collect()
}

fn props(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn test_quoted_values_survive_separators_quotes_and_newlines() {
    let data = "a,b,c\na,\"b,c\",d\na,\"b\"\"c\",d\n1,\"two\nlines\",3\n";
    assert_eq!(
        text_rows(data, CsvSourceConfig::default()),
        vec![
            vec!["a", "b,c", "d"],
            vec!["a", "b\"c", "d"],
            vec!["1", "two\nlines", "3"],
        ]
    );
}

#[test]
fn test_c_style_escapes() {
    let config = CsvSourceConfig::default().with_quote_style(QuoteStyle::C);
    assert_eq!(
        text_rows("x,y\n\"say \\\"hi\\\"\",z\n", config),
        vec![vec!["say \"hi\"", "z"]]
    );
}

#[test]
fn test_c_style_escaped_line_break_is_one_newline() {
    let config = CsvSourceConfig::default().with_quote_style(QuoteStyle::C);
    let mut reader = CsvReader::from_text("a,b\n1,\"x\\\ny\"\n", config).unwrap();
    assert_eq!(
        reader.next_row().unwrap(),
        Some(vec![
            Some(FieldValue::String("1".into())),
            Some(FieldValue::String("x\ny".into()))
        ])
    );
    assert!(reader.next_row().unwrap().is_none());
}

#[test]
fn test_fixed_width_columns() {
    let config = CsvSourceConfig::default()
        .without_header()
        .with_fixed_widths("1-3,4-6");
    let mut reader = CsvReader::from_text("abcdef\nab\n", config).unwrap();
    assert_eq!(reader.columns(), &["COLUMN1", "COLUMN2"]);
    let first = reader.next_row().unwrap().unwrap();
    let second = reader.next_row().unwrap().unwrap();
    assert_eq!(
        first,
        vec![
            Some(FieldValue::String("abc".into())),
            Some(FieldValue::String("def".into()))
        ]
    );
    assert_eq!(
        second,
        vec![
            Some(FieldValue::String("ab".into())),
            Some(FieldValue::String(String::new()))
        ]
    );
    assert!(reader.next_row().unwrap().is_none());
}

#[test]
fn test_byte_order_mark_and_line_endings() {
    let reader =
        CsvReader::from_text("\u{feff}first,second\r\n1,2\r\n", CsvSourceConfig::default()).unwrap();
    assert_eq!(reader.columns(), &["first", "second"]);
    assert_eq!(
        text_rows("\u{feff}first,second\r\n1,2\r\n", CsvSourceConfig::default()),
        vec![vec!["1", "2"]]
    );
}

#[test]
fn test_header_handling() {
    // duplicates differ only in case
    let err = CsvReader::from_text("id,ID\n", CsvSourceConfig::default()).unwrap_err();
    let err: SqlError = err.into();
    assert!(matches!(err, SqlError::ConfigurationError { .. }));

    let mut repaired = CsvSourceConfig::default();
    repaired.defective_headers = true;
    let reader = CsvReader::from_text(",b,\n1,2,3\n", repaired).unwrap();
    assert_eq!(reader.columns(), &["COLUMN1", "b", "COLUMN3"]);

    // an explicit header line replaces the file's first record
    let mut replaced = CsvSourceConfig::default();
    replaced.header_line = Some("left,right".into());
    let mut reader = CsvReader::from_text("a,b\n1,2\n", replaced).unwrap();
    assert_eq!(reader.columns(), &["left", "right"]);
    assert!(reader.next_row().unwrap().is_some());
    assert!(reader.next_row().unwrap().is_none());
}

#[test]
fn test_short_and_malformed_records() {
    let data = "a,b,c\n1,2,3\n4\n5,6,7\n";

    let mut reader = CsvReader::from_text(data, CsvSourceConfig::default()).unwrap();
    assert!(reader.next_row().is_ok());
    assert!(matches!(
        reader.next_row(),
        Err(SqlError::DataError { line: Some(3), .. })
    ));

    let mut padded = CsvSourceConfig::default();
    padded.missing_value = Some("NA".into());
    assert_eq!(text_rows(data, padded)[1], vec!["4", "NA", "NA"]);

    let mut tolerant = CsvSourceConfig::default();
    tolerant.ignore_unparseable_lines = true;
    assert_eq!(
        text_rows(data, tolerant),
        vec![vec!["1", "2", "3"], vec!["5", "6", "7"]]
    );

    let mut limited = CsvSourceConfig::default();
    limited.max_data_lines = 1;
    assert_eq!(text_rows(data, limited), vec![vec!["1", "2", "3"]]);
}

#[test]
fn test_typed_columns_and_dates_round_trip() {
    let mut config = CsvSourceConfig::default().with_column_types("String,Date,Decimal");
    config.date_format = Some("dd.MM.yyyy".into());
    let data = "who,born,balance\nann,07.03.1990,12.50\nbob,,x\n";
    let mut reader = CsvReader::from_text(data, config).unwrap();
    let converter = reader.converter();

    let ann = reader.next_row().unwrap().unwrap();
    let born = ann[1].as_ref().unwrap();
    assert!(matches!(born, FieldValue::Date(_)));
    assert_eq!(converter.format(born), "07.03.1990");
    assert_eq!(ann[2].as_ref().map(|v| v.to_string()), Some("12.50".into()));

    // empty and unparseable text are NULL
    let bob = reader.next_row().unwrap().unwrap();
    assert_eq!(bob[1], None);
    assert_eq!(bob[2], None);
}

#[test]
fn test_inferred_types() {
    let data = "n,ratio,when,flag,note\n1,0.5,2024-01-31,true,x\n22,1.25,2024-02-29,false,7\n";
    let reader = CsvReader::from_text(data, CsvSourceConfig::default().infer_types()).unwrap();
    assert_eq!(
        reader.column_types(),
        vec![
            DataType::Integer,
            DataType::Double,
            DataType::Date,
            DataType::Boolean,
            DataType::String
        ]
    );
    // sampled records are still returned
    assert_eq!(rows(data, CsvSourceConfig::default().infer_types()).len(), 2);
}

#[test]
fn test_configuration_from_properties() {
    let config = CsvSourceConfig::from_properties(&props(&[
        ("separator", ";"),
        ("suppressHeaders", "true"),
        ("columnTypes", "Int,String"),
        ("skipLeadingLines", "1"),
        ("somethingElse", "ignored"),
    ]))
    .unwrap();
    let mut reader = CsvReader::from_text("banner\n7;seven\n", config).unwrap();
    assert_eq!(reader.columns(), &["COLUMN1", "COLUMN2"]);
    assert_eq!(
        reader.next_row().unwrap(),
        Some(vec![
            Some(FieldValue::Integer(7)),
            Some(FieldValue::String("seven".into()))
        ])
    );

    assert!(CsvSourceConfig::from_properties(&props(&[("maxDataLines", "-1")])).is_err());
    assert!(CsvSourceConfig::from_properties(&props(&[("separator", "\"")])).is_err());
}
