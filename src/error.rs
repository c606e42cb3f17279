//! Crate-wide error aggregation.
//!
//! Each architectural layer (pager, dbheader, btree, record, dbm, codegen,
//! parser) defines its own `thiserror`-derived `Error` enum local to that
//! layer. This module aggregates them into one type so that the API façade
//! can hand callers a single error type, and classifies every error into the
//! host-neutral error-code vocabulary used at the API boundary.

use crate::btree::Error as BtreeError;
use crate::codegen::Error as CodegenError;
use crate::dbheader::Error as DbHeaderError;
use crate::dbm::Error as DbmError;
use crate::pager::Error as PagerError;
use crate::parser::Error as ParseError;
use crate::record::Error as RecordError;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Pager(#[from] PagerError),
    #[error(transparent)]
    DbHeader(#[from] DbHeaderError),
    #[error(transparent)]
    Btree(#[from] BtreeError),
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error(transparent)]
    Dbm(#[from] DbmError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Codegen(#[from] CodegenError),
    #[error("invalid SQL: {0}")]
    InvalidSql(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// The host-neutral error vocabulary from the API boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Ok,
    Row,
    Done,
    NoMem,
    Io,
    CorruptHeader,
    PageOutOfRange,
    CellOutOfRange,
    NotFound,
    Duplicate,
    InvalidSql,
    ParseError,
}

impl Error {
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::Pager(PagerError::Io(_)) => ErrorCode::Io,
            Error::Pager(PagerError::TooManyWriters) => ErrorCode::Io,
            Error::Pager(PagerError::PageOutOfRange(_)) => ErrorCode::PageOutOfRange,
            Error::DbHeader(_) => ErrorCode::CorruptHeader,
            Error::Btree(BtreeError::NotFound) => ErrorCode::NotFound,
            Error::Btree(BtreeError::Duplicate) => ErrorCode::Duplicate,
            Error::Btree(BtreeError::CellOutOfRange) => ErrorCode::CellOutOfRange,
            Error::Btree(_) => ErrorCode::Io,
            Error::Record(_) => ErrorCode::Io,
            Error::Dbm(_) => ErrorCode::Io,
            Error::Parse(_) => ErrorCode::ParseError,
            Error::Codegen(_) => ErrorCode::InvalidSql,
            Error::InvalidSql(_) => ErrorCode::InvalidSql,
        }
    }
}
