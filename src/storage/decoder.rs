//! Per-type field decoding.
//!
//! Row payloads are big-endian. Numeric types store the value with the sign
//! bit flipped so that an all-zero slot can mean NULL. Every strategy
//! consumes exactly the field's on-disk size, null or not.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::{
    storage::{
        blob::BlobReference,
        buffer::{ByteCursor, Endian},
        charset::Charset,
    },
    types::{
        BLOB_POINTER_SIZE,
        error::DatabaseError,
        field::{Field, FieldType},
        value::{LobValue, Value},
    },
};

const MS_PER_DAY: f64 = 86_400_000.0;

/// Decodes one value of `field` at the cursor and advances by `field.real_size`.
pub fn decode_value(
    cursor: &mut ByteCursor<'_>,
    field: &Field,
    charset: Charset,
) -> Result<Value, DatabaseError> {
    let field_type = field.require_type()?;
    let start = cursor.position();
    let size = field.real_size as usize;

    let value = match field_type {
        FieldType::Alpha => decode_alpha(cursor.read_bytes(size)?, charset),
        FieldType::Date => decode_date(fixed::<4>(cursor, field)?, field)?,
        FieldType::Short => decode_short(fixed::<2>(cursor, field)?),
        FieldType::Long | FieldType::AutoIncrement => decode_long(fixed::<4>(cursor, field)?),
        FieldType::Currency | FieldType::Number => decode_number(fixed::<8>(cursor, field)?),
        FieldType::Logical => decode_logical(fixed::<1>(cursor, field)?),
        FieldType::Time => decode_time(fixed::<4>(cursor, field)?, field)?,
        FieldType::Timestamp => decode_timestamp(fixed::<8>(cursor, field)?, field)?,
        FieldType::Bytes => decode_bytes(cursor.read_bytes(size)?),
        FieldType::Memo
        | FieldType::Blob
        | FieldType::FormattedMemo
        | FieldType::Ole
        | FieldType::Graphic => decode_lob(cursor, field, field_type)?,
    };

    debug_assert_eq!(cursor.position(), start + size);
    Ok(value)
}

/// Advances past a field without decoding it.
pub fn skip_value(cursor: &mut ByteCursor<'_>, field: &Field) -> Result<(), DatabaseError> {
    cursor.skip(field.real_size as usize)
}

fn fixed<const N: usize>(cursor: &mut ByteCursor<'_>, field: &Field) -> Result<[u8; N], DatabaseError> {
    if field.real_size as usize != N {
        return Err(DatabaseError::InvalidValue {
            field: field.name.clone(),
            reason: format!("expected {} bytes, field declares {}", N, field.real_size),
        });
    }
    let mut raw = [0u8; N];
    raw.copy_from_slice(cursor.read_bytes(N)?);
    Ok(raw)
}

fn decode_alpha(raw: &[u8], charset: Charset) -> Value {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    let text = charset.decode(&raw[..end]);
    let text = text.trim_end_matches(' ');
    if text.is_empty() {
        Value::Null
    } else {
        Value::Text(text.to_string())
    }
}

fn decode_short(raw: [u8; 2]) -> Value {
    match u16::from_be_bytes(raw) {
        0 => Value::Null,
        v => Value::Integer((v ^ 0x8000) as i16 as i64),
    }
}

fn decode_long(raw: [u8; 4]) -> Value {
    match u32::from_be_bytes(raw) {
        0 => Value::Null,
        v => Value::Integer((v ^ 0x8000_0000) as i32 as i64),
    }
}

fn raw_double(raw: [u8; 8]) -> Option<f64> {
    let bits = u64::from_be_bytes(raw);
    if bits == 0 {
        return None;
    }
    let bits = if bits & (1 << 63) != 0 {
        bits & !(1 << 63)
    } else {
        !bits
    };
    Some(f64::from_bits(bits))
}

fn decode_number(raw: [u8; 8]) -> Value {
    raw_double(raw).map(Value::Real).unwrap_or(Value::Null)
}

fn decode_logical(raw: [u8; 1]) -> Value {
    match raw[0] {
        0 => Value::Null,
        v => Value::Boolean(v ^ 0x80 != 0),
    }
}

fn date_from_days(days: i32, field: &Field) -> Result<NaiveDate, DatabaseError> {
    NaiveDate::from_num_days_from_ce_opt(days).ok_or_else(|| DatabaseError::InvalidValue {
        field: field.name.clone(),
        reason: format!("day number {days} is out of range"),
    })
}

fn time_from_millis(ms: u32, field: &Field) -> Result<NaiveTime, DatabaseError> {
    NaiveTime::from_num_seconds_from_midnight_opt(ms / 1000, (ms % 1000) * 1_000_000).ok_or_else(
        || DatabaseError::InvalidValue {
            field: field.name.clone(),
            reason: format!("{ms} ms is past midnight"),
        },
    )
}

fn decode_date(raw: [u8; 4], field: &Field) -> Result<Value, DatabaseError> {
    match u32::from_be_bytes(raw) {
        0 => Ok(Value::Null),
        v => {
            let days = (v ^ 0x8000_0000) as i32;
            Ok(Value::Date(date_from_days(days, field)?))
        }
    }
}

fn decode_time(raw: [u8; 4], field: &Field) -> Result<Value, DatabaseError> {
    match u32::from_be_bytes(raw) {
        0 => Ok(Value::Null),
        v => Ok(Value::Time(time_from_millis(v ^ 0x8000_0000, field)?)),
    }
}

fn decode_timestamp(raw: [u8; 8], field: &Field) -> Result<Value, DatabaseError> {
    let Some(ms) = raw_double(raw) else {
        return Ok(Value::Null);
    };
    let days = (ms / MS_PER_DAY).floor();
    if !days.is_finite() || days < 1.0 || days > i32::MAX as f64 {
        return Err(DatabaseError::InvalidValue {
            field: field.name.clone(),
            reason: format!("timestamp {ms} is out of range"),
        });
    }
    let rest = (ms - days * MS_PER_DAY) as u32;
    let date = date_from_days(days as i32, field)?;
    let time = time_from_millis(rest, field)?;
    Ok(Value::Timestamp(NaiveDateTime::new(date, time)))
}

fn decode_bytes(raw: &[u8]) -> Value {
    if raw.iter().all(|&b| b == 0) {
        Value::Null
    } else {
        Value::Blob(raw.to_vec())
    }
}

fn read_blob_pointer(cursor: &mut ByteCursor<'_>) -> Result<(u32, u32, u16), DatabaseError> {
    let offset = cursor.read_u32()?;
    let length = cursor.read_u32()?;
    let modifier = cursor.read_u16()?;
    Ok((offset, length, modifier))
}

/// Leader bytes followed by a little-endian blob pointer.
fn decode_lob(
    cursor: &mut ByteCursor<'_>,
    field: &Field,
    field_type: FieldType,
) -> Result<Value, DatabaseError> {
    let size = field.real_size as usize;
    if size < BLOB_POINTER_SIZE {
        return Err(DatabaseError::InvalidValue {
            field: field.name.clone(),
            reason: format!("lob slot of {size} bytes cannot hold a blob pointer"),
        });
    }
    let leader = cursor.read_bytes(size - BLOB_POINTER_SIZE)?.to_vec();

    let order = cursor.order();
    cursor.set_order(Endian::Little);
    let pointer = read_blob_pointer(cursor);
    cursor.set_order(order);
    let (offset, length, modifier) = pointer?;

    if length == 0 {
        return Ok(Value::Null);
    }

    let reference = if length as usize <= leader.len() {
        None
    } else if offset == 0 {
        return Err(DatabaseError::InvalidValue {
            field: field.name.clone(),
            reason: format!("{length} byte lob has no blob pointer"),
        });
    } else {
        Some(BlobReference::new(offset))
    };

    Ok(Value::Lob(LobValue {
        leader,
        length,
        modifier,
        reference,
        text: field_type.is_text_lob(),
    }))
}
