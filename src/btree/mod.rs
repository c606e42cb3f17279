//! The B-Tree file layer: interprets pages as B-tree nodes of one of four
//! types, and implements search, preemptive-split insertion, and new-node
//! allocation on top of the pager.
//!
//! Submodule layout, leaves first:
//! * `cell` encodes/decodes the four fixed-width cell shapes.
//! * `node` loads/initializes/writes back one page as a typed node.
//! * `btree` (re-exported at this level) implements `find`/`insert`/`split`.

pub mod cell;
mod node;
mod tree;

pub use cell::Cell;
pub use node::Node;
pub use tree::{Btree, Key};

use crate::pager::PageNum;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    TableInterior,
    TableLeaf,
    IndexInterior,
    IndexLeaf,
}

impl PageType {
    pub fn type_byte(self) -> u8 {
        match self {
            PageType::TableInterior => 0x05,
            PageType::TableLeaf => 0x0D,
            PageType::IndexInterior => 0x02,
            PageType::IndexLeaf => 0x0A,
        }
    }

    pub fn from_type_byte(b: u8) -> Result<PageType, Error> {
        match b {
            0x05 => Ok(PageType::TableInterior),
            0x0D => Ok(PageType::TableLeaf),
            0x02 => Ok(PageType::IndexInterior),
            0x0A => Ok(PageType::IndexLeaf),
            other => Err(Error::BadPageType(other)),
        }
    }

    pub fn is_leaf(self) -> bool {
        matches!(self, PageType::TableLeaf | PageType::IndexLeaf)
    }

    pub fn is_table(self) -> bool {
        matches!(self, PageType::TableInterior | PageType::TableLeaf)
    }

    pub fn header_len(self) -> usize {
        if self.is_leaf() {
            8
        } else {
            12
        }
    }

    /// The node type a table/index B-tree uses for its internal nodes.
    pub fn internal_of_same_family(self) -> PageType {
        if self.is_table() {
            PageType::TableInterior
        } else {
            PageType::IndexInterior
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid b-tree page type byte: {0:#x}")]
    BadPageType(u8),
    #[error("cell index out of range")]
    CellOutOfRange,
    #[error("key already present in b-tree")]
    Duplicate,
    #[error("key not found in b-tree")]
    NotFound,
    #[error(transparent)]
    Pager(#[from] crate::pager::Error),
    #[error(transparent)]
    DbHeader(#[from] crate::dbheader::Error),
    #[error(transparent)]
    Record(#[from] crate::record::Error),
    #[error("I/O error decoding a b-tree page: {0}")]
    Io(#[from] std::io::Error),
}

pub type PageNumber = PageNum;
