//! Packs/unpacks a tuple of typed values to/from the leaf-cell payload byte
//! layout: a 1-byte header length `H`, `H-1` bytes of per-column type codes,
//! then the values themselves in declared order.
//!
//! Type codes: `0` = NULL, `1/2/4` = 1/2/4-byte signed integer, `n >= 13 odd`
//! = text of length `(n-13)/2`. This is a fixed-width simplification of real
//! SQLite's varint-coded record header; every type code here fits in a
//! single byte, so the header length itself never needs more than one byte
//! either, for the small column counts this engine supports.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    #[error("column {0} is out of range for a record with {1} columns")]
    ColumnOutOfRange(usize, usize),
    #[error("column {0} has type code {1}, which is not a supported serial type")]
    BadSerialType(usize, u8),
    #[error("column {0} was expected to hold {1:?} but holds a different type")]
    WrongType(usize, &'static str),
}

/// A decoded column value. Registers (`crate::register::Register`) have two
/// additional variants (`Unspecified`, `Binary`) that never appear inside a
/// stored record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Null,
    Int(i32),
    Text(String),
}

fn int_width(v: i32) -> u8 {
    if v >= i8::MIN as i32 && v <= i8::MAX as i32 {
        1
    } else if v >= i16::MIN as i32 && v <= i16::MAX as i32 {
        2
    } else {
        4
    }
}

fn serial_type_of(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Int(i) => int_width(*i),
        Value::Text(s) => (s.len() as u8)
            .checked_mul(2)
            .and_then(|x| x.checked_add(13))
            .expect("text too long to encode in one byte of length"),
    }
}

/// Packs `values` into a record payload. The caller is responsible for
/// storing `Value::Null` in the primary-key column (the key lives in the
/// cell's key field, not the record).
pub fn pack(values: &[Value]) -> Vec<u8> {
    let codes: Vec<u8> = values.iter().map(serial_type_of).collect();
    let header_len = 1 + codes.len();
    assert!(header_len <= u8::MAX as usize, "too many columns for one-byte record header");

    let mut out = Vec::with_capacity(header_len + values.len() * 4);
    out.push(header_len as u8);
    out.extend_from_slice(&codes);
    for v in values {
        match v {
            Value::Null => {}
            Value::Int(i) => match int_width(*i) {
                1 => out.write_i8(*i as i8).unwrap(),
                2 => out.write_i16::<BigEndian>(*i as i16).unwrap(),
                4 => out.write_i32::<BigEndian>(*i).unwrap(),
                _ => unreachable!(),
            },
            Value::Text(s) => out.extend_from_slice(s.as_bytes()),
        }
    }
    out
}

/// Unpacks a record payload into its column values.
pub fn unpack(bytes: &[u8]) -> Result<Vec<Value>, Error> {
    if bytes.is_empty() {
        return Ok(vec![]);
    }
    let header_len = bytes[0] as usize;
    let codes = &bytes[1..header_len];
    let mut offset = header_len;
    let mut out = Vec::with_capacity(codes.len());
    for (i, &code) in codes.iter().enumerate() {
        match code {
            0 => out.push(Value::Null),
            1 => {
                let v = bytes[offset] as i8 as i32;
                offset += 1;
                out.push(Value::Int(v));
            }
            2 => {
                let v = (&bytes[offset..offset + 2])
                    .read_i16::<BigEndian>()
                    .map_err(|_| Error::BadSerialType(i, code))? as i32;
                offset += 2;
                out.push(Value::Int(v));
            }
            4 => {
                let v = (&bytes[offset..offset + 4])
                    .read_i32::<BigEndian>()
                    .map_err(|_| Error::BadSerialType(i, code))?;
                offset += 4;
                out.push(Value::Int(v));
            }
            n if n >= 13 && n % 2 == 1 => {
                let len = ((n - 13) / 2) as usize;
                let s = String::from_utf8_lossy(&bytes[offset..offset + len]).into_owned();
                offset += len;
                out.push(Value::Text(s));
            }
            other => return Err(Error::BadSerialType(i, other)),
        }
    }
    Ok(out)
}

/// Returns column `col` of `record`, requiring it to be an `Int`.
pub fn get_int(record: &[Value], col: usize) -> Result<i32, Error> {
    match record.get(col) {
        Some(Value::Int(i)) => Ok(*i),
        Some(_) => Err(Error::WrongType(col, "int")),
        None => Err(Error::ColumnOutOfRange(col, record.len())),
    }
}

/// Returns column `col` of `record`, requiring it to be `Text`.
pub fn get_text<'a>(record: &'a [Value], col: usize) -> Result<&'a str, Error> {
    match record.get(col) {
        Some(Value::Text(s)) => Ok(s.as_str()),
        Some(_) => Err(Error::WrongType(col, "text")),
        None => Err(Error::ColumnOutOfRange(col, record.len())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_mixed_row() {
        let row = vec![
            Value::Null,
            Value::Int(42),
            Value::Int(70000),
            Value::Text("hello".to_string()),
        ];
        let packed = pack(&row);
        let unpacked = unpack(&packed).unwrap();
        assert_eq!(row, unpacked);
    }

    #[test]
    fn round_trips_negative_and_boundary_ints() {
        let row = vec![Value::Int(-1), Value::Int(i32::MIN), Value::Int(i32::MAX)];
        let packed = pack(&row);
        assert_eq!(unpack(&packed).unwrap(), row);
    }

    #[test]
    fn picks_minimal_int_width() {
        assert_eq!(serial_type_of(&Value::Int(1)), 1);
        assert_eq!(serial_type_of(&Value::Int(300)), 2);
        assert_eq!(serial_type_of(&Value::Int(100_000)), 4);
    }

    #[test]
    fn get_helpers_type_check() {
        let row = vec![Value::Int(5), Value::Text("x".to_string())];
        assert_eq!(get_int(&row, 0).unwrap(), 5);
        assert!(get_int(&row, 1).is_err());
        assert_eq!(get_text(&row, 1).unwrap(), "x");
        assert!(matches!(get_int(&row, 2), Err(Error::ColumnOutOfRange(2, 2))));
    }

    #[test]
    fn empty_record_round_trips() {
        assert_eq!(unpack(&pack(&[])).unwrap(), Vec::<Value>::new());
    }
}
