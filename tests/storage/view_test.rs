use std::collections::HashMap;

use pxread::{
    storage::{
        charset::Charset,
        view::{FieldCatalog, parse_expression, parse_view, read_view},
    },
    types::{
        error::{DatabaseError, Warning},
        field::Field,
    },
};

const CUSTOMER_VIEW: &str = r#"Query
ANSWER: :PRIV:ANSWER.DB

FIELDORDER: Customer.db->"Name", Customer.db->"City",
Orders.db->"Total"

SORT: Customer.db->"Region"

Customer.db | Customer No | Name  | City          |
            | _join1      | Check | Check as Town |

Orders.db | Customer No | Total                       |
          | _join1      | CALC [Total] * 2 AS Doubled |

EndQuery
"#;

fn catalog() -> HashMap<String, Vec<Field>> {
    let customer: Vec<Field> = ["Customer No", "Name", "City"]
        .iter()
        .enumerate()
        .map(|(i, n)| Field::new(i as u16 + 1, 0x01, 20, n.to_string(), "CUSTOMER".into()))
        .collect();
    let orders = vec![
        Field::new(1, 0x01, 20, "Customer No".into(), "orders".into()),
        Field::new(2, 0x05, 8, "Total".into(), "orders".into()),
    ];
    HashMap::from([
        ("CUSTOMER.DB".to_string(), customer),
        ("orders.db".to_string(), orders),
    ])
}

#[test]
fn test_catalog_lookup_ignores_case_and_extension() {
    let catalog = catalog();
    assert_eq!(catalog.table_fields("customer.db").map(|f| f.len()), Some(3));
    assert_eq!(catalog.table_fields("Orders").map(|f| f.len()), Some(2));
    assert!(catalog.table_fields("missing.db").is_none());
}

#[test]
fn test_parses_field_order_and_sort() {
    let result = parse_view(CUSTOMER_VIEW, "customer.qbe", &catalog());
    let view = &result.value;

    assert!(view.valid);
    assert_eq!(view.answer_table.as_deref(), Some(":PRIV:ANSWER.DB"));

    let order: Vec<(&str, &str)> = view
        .field_order
        .iter()
        .map(|f| (f.table_name.as_str(), f.field.name.as_str()))
        .collect();
    assert_eq!(
        order,
        vec![
            ("Customer.db", "Name"),
            ("Customer.db", "City"),
            ("Orders.db", "Total")
        ]
    );
    assert_eq!(view.field_order[2].field.type_tag, 0x05);
    assert_eq!(view.output_fields().len(), 3);
}

#[test]
fn test_unresolved_field_gets_placeholder_and_warning() {
    let result = parse_view(CUSTOMER_VIEW, "customer.qbe", &catalog());
    let region = &result.value.sort_order[0];
    assert_eq!(region.field.name, "Region");
    assert_eq!(region.field.type_tag, 0);
    assert_eq!(region.field.table, "Customer");
    assert_eq!(
        result.warnings,
        vec![Warning::UnresolvedViewField {
            table: "Customer.db".into(),
            field: "Region".into(),
        }]
    );
}

#[test]
fn test_table_blocks_carry_expressions() {
    let result = parse_view(CUSTOMER_VIEW, "customer.qbe", &catalog());
    let fields = &result.value.fields;
    assert_eq!(fields.len(), 5);

    let join = &fields[0];
    assert_eq!(join.field.name, "Customer No");
    assert_eq!(join.join_name.as_deref(), Some("join1"));
    assert!(!join.checked);

    assert!(fields[1].checked);
    assert_eq!(fields[1].alias, None);

    assert!(fields[2].checked);
    assert_eq!(fields[2].alias.as_deref(), Some("Town"));

    let total = &fields[4];
    assert_eq!(total.table_name, "Orders.db");
    assert!(total.checked);
    assert_eq!(total.expression.as_deref(), Some("CALC [Total] * 2"));
    assert_eq!(total.alias.as_deref(), Some("Doubled"));
}

#[test]
fn test_non_ascii_cells_are_kept_as_expressions() {
    let text = "Query\n\nCustomer.db | Name | City |\n | =\"M\u{fc}ller\" | ab\u{20ac} |\n\nEndQuery\n";
    let result = parse_view(text, "umlaut.qbe", &catalog());
    let fields = &result.value.fields;
    assert_eq!(fields.len(), 2);
    assert_eq!(fields[0].expression.as_deref(), Some("=\"M\u{fc}ller\""));
    assert_eq!(fields[1].expression.as_deref(), Some("ab\u{20ac}"));
    assert!(!fields[1].checked);

    let parsed = parse_expression("\u{e9}t\u{e9} as \u{c9}t\u{e9}");
    assert_eq!(parsed.expression.as_deref(), Some("\u{e9}t\u{e9}"));
    assert_eq!(parsed.alias.as_deref(), Some("\u{c9}t\u{e9}"));
    assert_eq!(parse_expression("\u{20ac}").expression.as_deref(), Some("\u{20ac}"));
}

#[test]
fn test_non_query_input_is_invalid_not_error() -> Result<(), DatabaseError> {
    let result = read_view(&b"Report\nwhatever\n"[..], "report.qbe", &catalog(), Charset::Cp437)?;
    assert!(!result.value.valid);
    assert!(result.value.fields.is_empty());
    assert!(!result.has_warnings());

    let empty = read_view(&b""[..], "empty.qbe", &catalog(), Charset::Cp437)?;
    assert!(!empty.value.valid);
    Ok(())
}

#[test]
fn test_read_view_decodes_legacy_charset() -> Result<(), DatabaseError> {
    let text = b"Query\r\n\r\nCaf\xE9.db | Name |\r\n        | Check |\r\n\r\nEndQuery\r\n";
    let windows_1252 = Charset::for_label("windows-1252")?;
    let result = read_view(&text[..], "cafe.qbe", &catalog(), windows_1252)?;
    assert!(result.value.valid);
    assert_eq!(result.value.fields[0].table_name, "Caf\u{e9}.db");
    assert!(result.value.fields[0].checked);
    Ok(())
}

#[test]
fn test_parsing_stops_at_end_query() {
    let text = "Query\nEndQuery\nCustomer.db | Name |\n| Check |\n";
    let result = parse_view(text, "short.qbe", &catalog());
    assert!(result.value.valid);
    assert!(result.value.fields.is_empty());
}
