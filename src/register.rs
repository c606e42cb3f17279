//! A `Register` is the DBM's dynamically typed value: `{unspecified, null,
//! int32, text, binary}`. Registers form a dynamically grown indexed array
//! local to one prepared statement. Comparisons between mismatched tags
//! (including `Unspecified`/`Null` on either side) are "incomparable" and
//! must not jump — this is the one place SQL's `NULL`-comparison semantics
//! show up in this engine, per the non-goal on arithmetic/comparison NULL
//! handling.

use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq)]
pub enum Register {
    /// The initial state of every register slot: never written, and not a
    /// valid operand for any opcode that reads a register.
    Unspecified,
    Null,
    Int(i32),
    Text(String),
    Binary(Vec<u8>),
}

impl Register {
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Register::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Register::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            Register::Binary(b) => Some(b.as_slice()),
            _ => None,
        }
    }

    /// Compares two registers, returning `None` when they are not of the
    /// same comparable tag (different types, or either is `Null`/
    /// `Unspecified`). Callers (the DBM's `Eq`/`Ne`/`Lt`/`Le`/`Gt`/`Ge`
    /// handlers) treat `None` as "do not jump".
    pub fn partial_compare(&self, other: &Register) -> Option<Ordering> {
        match (self, other) {
            (Register::Int(a), Register::Int(b)) => a.partial_cmp(b),
            (Register::Text(a), Register::Text(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl From<&crate::record::Value> for Register {
    fn from(v: &crate::record::Value) -> Register {
        match v {
            crate::record::Value::Null => Register::Null,
            crate::record::Value::Int(i) => Register::Int(*i),
            crate::record::Value::Text(s) => Register::Text(s.clone()),
        }
    }
}

impl TryFrom<&Register> for crate::record::Value {
    type Error = ();

    fn try_from(r: &Register) -> Result<crate::record::Value, ()> {
        match r {
            Register::Null | Register::Unspecified => Ok(crate::record::Value::Null),
            Register::Int(i) => Ok(crate::record::Value::Int(*i)),
            Register::Text(s) => Ok(crate::record::Value::Text(s.clone())),
            Register::Binary(_) => Err(()),
        }
    }
}
