use chrono::{NaiveDate, NaiveTime};
use pxread::{
    storage::blob::BlobReference,
    types::value::{DataType, LobValue, Value},
};

fn lob(reference: Option<u32>, text: bool) -> LobValue {
    LobValue {
        leader: b"hello".to_vec(),
        length: if reference.is_some() { 300 } else { 5 },
        modifier: 0,
        reference: reference.map(BlobReference::new),
        text,
    }
}

#[test]
fn test_value_creation_and_data_types() {
    let date = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
    let time = NaiveTime::from_hms_opt(12, 0, 0).unwrap();

    assert_eq!(Value::Null.data_type(), DataType::Null);
    assert_eq!(Value::Integer(42).data_type(), DataType::Integer);
    assert_eq!(Value::Real(3.5).data_type(), DataType::Real);
    assert_eq!(Value::Text("hello".to_string()).data_type(), DataType::Text);
    assert_eq!(Value::Blob(vec![1, 2, 3]).data_type(), DataType::Blob);
    assert_eq!(Value::Boolean(true).data_type(), DataType::Boolean);
    assert_eq!(Value::Date(date).data_type(), DataType::Date);
    assert_eq!(Value::Time(time).data_type(), DataType::Time);
    assert_eq!(
        Value::Timestamp(date.and_time(time)).data_type(),
        DataType::Timestamp
    );
    assert_eq!(Value::Lob(lob(None, true)).data_type(), DataType::Clob);
    assert_eq!(Value::Lob(lob(Some(0x10FF), false)).data_type(), DataType::Blob);
}

#[test]
fn test_value_comparison() {
    assert!(Value::Integer(5) < Value::Integer(10));
    assert!(Value::Integer(5) < Value::Real(5.5));
    assert!(Value::Real(3.5) < Value::Integer(4));
    assert!(Value::Text("apple".to_string()) < Value::Text("banana".to_string()));

    // nulls sort first
    assert!(Value::Null < Value::Integer(0));
    assert!(Value::Null < Value::Text(String::new()));

    let d1 = Value::Date(NaiveDate::from_ymd_opt(2022, 1, 1).unwrap());
    let d2 = Value::Date(NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
    assert!(d1 < d2);

    assert_eq!(Value::Integer(1).partial_cmp(&Value::Text("1".into())), None);
}

#[test]
fn test_inline_lob_bytes() {
    assert_eq!(lob(None, true).inline_bytes(), Some(&b"hello"[..]));
    assert_eq!(lob(Some(0x10FF), true).inline_bytes(), None);
}

#[test]
fn test_display_and_coercion() {
    assert_eq!(Value::Null.to_string(), "NULL");
    assert_eq!(Value::Integer(-7).to_string(), "-7");
    assert_eq!(Value::Lob(lob(Some(0x10FF), true)).to_string(), "<lob 300 bytes @0x000010FF>");
    assert_eq!(Value::Text(" 12.5 ".into()).coerce_to_number(), Some(12.5));
    assert_eq!(Value::Boolean(true).coerce_to_number(), Some(1.0));
    assert_eq!(Value::Null.coerce_to_number(), None);
    assert_eq!(DataType::Real.to_string(), "NUMERIC");
}
