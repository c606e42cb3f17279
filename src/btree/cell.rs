//! Encodes and decodes the four fixed-width cell shapes. Unlike real SQLite,
//! nothing here is varint-coded: every field is a plain 4-byte big-endian
//! integer, so a cell's encoded size is a function of its variant alone
//! (plus, for table-leaf cells, the payload length).

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

use super::PageType;

/// The fixed constant stamped into index cells, matching the `0B 03 04 04`
/// literal bytes.
const INDEX_CONST: [u8; 4] = [0x0B, 0x03, 0x04, 0x04];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    TableInterior {
        child_page: u32,
        key: i32,
    },
    TableLeaf {
        key: i32,
        payload: Vec<u8>,
    },
    IndexInterior {
        child_page: u32,
        key: i32,
        primary_key: i32,
    },
    IndexLeaf {
        key: i32,
        primary_key: i32,
    },
}

impl Cell {
    pub fn page_type(&self) -> PageType {
        match self {
            Cell::TableInterior { .. } => PageType::TableInterior,
            Cell::TableLeaf { .. } => PageType::TableLeaf,
            Cell::IndexInterior { .. } => PageType::IndexInterior,
            Cell::IndexLeaf { .. } => PageType::IndexLeaf,
        }
    }

    pub fn key(&self) -> i32 {
        match self {
            Cell::TableInterior { key, .. } => *key,
            Cell::TableLeaf { key, .. } => *key,
            Cell::IndexInterior { key, .. } => *key,
            Cell::IndexLeaf { key, .. } => *key,
        }
    }

    /// The child page a table/index-internal cell routes to. Panics if
    /// called on a leaf cell; callers only ever call this while walking
    /// internal nodes.
    pub fn child_page(&self) -> u32 {
        match self {
            Cell::TableInterior { child_page, .. } => *child_page,
            Cell::IndexInterior { child_page, .. } => *child_page,
            _ => panic!("child_page() called on a leaf cell"),
        }
    }

    /// The primary key carried by index cells; 0 for table cells (which
    /// don't carry one — the table key already *is* the primary key).
    pub fn primary_key(&self) -> i32 {
        match self {
            Cell::IndexInterior { primary_key, .. } => *primary_key,
            Cell::IndexLeaf { primary_key, .. } => *primary_key,
            _ => 0,
        }
    }

    /// The number of bytes this cell occupies once encoded: table-leaf = 8 +
    /// payload, table-internal = 8, index-leaf = 12, index-internal = 16.
    pub fn encoded_size(&self) -> usize {
        match self {
            Cell::TableInterior { .. } => 8,
            Cell::TableLeaf { payload, .. } => 8 + payload.len(),
            Cell::IndexLeaf { .. } => 12,
            Cell::IndexInterior { .. } => 16,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_size());
        match self {
            Cell::TableInterior { child_page, key } => {
                out.write_u32::<BigEndian>(*child_page).unwrap();
                out.write_i32::<BigEndian>(*key).unwrap();
            }
            Cell::TableLeaf { key, payload } => {
                out.write_u32::<BigEndian>(payload.len() as u32).unwrap();
                out.write_i32::<BigEndian>(*key).unwrap();
                out.extend_from_slice(payload);
            }
            Cell::IndexInterior {
                child_page,
                key,
                primary_key,
            } => {
                out.write_u32::<BigEndian>(*child_page).unwrap();
                out.extend_from_slice(&INDEX_CONST);
                out.write_i32::<BigEndian>(*key).unwrap();
                out.write_i32::<BigEndian>(*primary_key).unwrap();
            }
            Cell::IndexLeaf { key, primary_key } => {
                out.extend_from_slice(&INDEX_CONST);
                out.write_i32::<BigEndian>(*key).unwrap();
                out.write_i32::<BigEndian>(*primary_key).unwrap();
            }
        }
        out
    }

    pub fn decode(page_type: PageType, bytes: &[u8]) -> Cell {
        let mut c = Cursor::new(bytes);
        match page_type {
            PageType::TableInterior => {
                let child_page = c.read_u32::<BigEndian>().expect("short table-internal cell");
                let key = c.read_i32::<BigEndian>().expect("short table-internal cell");
                Cell::TableInterior { child_page, key }
            }
            PageType::TableLeaf => {
                let payload_size =
                    c.read_u32::<BigEndian>().expect("short table-leaf cell") as usize;
                let key = c.read_i32::<BigEndian>().expect("short table-leaf cell");
                let start = c.position() as usize;
                let payload = bytes[start..start + payload_size].to_vec();
                Cell::TableLeaf { key, payload }
            }
            PageType::IndexInterior => {
                let child_page = c.read_u32::<BigEndian>().expect("short index-internal cell");
                let mut konst = [0u8; 4];
                std::io::Read::read_exact(&mut c, &mut konst).expect("short index-internal cell");
                let key = c.read_i32::<BigEndian>().expect("short index-internal cell");
                let primary_key = c.read_i32::<BigEndian>().expect("short index-internal cell");
                Cell::IndexInterior {
                    child_page,
                    key,
                    primary_key,
                }
            }
            PageType::IndexLeaf => {
                let mut konst = [0u8; 4];
                std::io::Read::read_exact(&mut c, &mut konst).expect("short index-leaf cell");
                let key = c.read_i32::<BigEndian>().expect("short index-leaf cell");
                let primary_key = c.read_i32::<BigEndian>().expect("short index-leaf cell");
                Cell::IndexLeaf { key, primary_key }
            }
        }
    }

    /// The cell that points at `child_page` with an equal-or-bigger key than
    /// any cell that needs to route through it; used when promoting a median
    /// into a parent.
    pub fn new_internal_for_family(
        family_is_table: bool,
        child_page: u32,
        key: i32,
        primary_key: i32,
    ) -> Cell {
        if family_is_table {
            Cell::TableInterior { child_page, key }
        } else {
            Cell::IndexInterior {
                child_page,
                key,
                primary_key,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A table-leaf cell for `(key=66, payload=b"hi")`: a 4-byte payload
    /// size, a 4-byte key, then the payload bytes themselves.
    const TABLE_LEAF_HEX: &str = "00000002 00000042 6869";

    #[test]
    fn table_leaf_cell_matches_literal_byte_layout() {
        use hex::FromHex;
        let want = Vec::from_hex(TABLE_LEAF_HEX.replace(' ', "")).expect("valid hex fixture");
        let cell = Cell::TableLeaf {
            key: 66,
            payload: b"hi".to_vec(),
        };
        assert_eq!(cell.encode(), want);
        assert_eq!(Cell::decode(PageType::TableLeaf, &want), cell);
    }

    #[test]
    fn round_trips_table_leaf_cell() {
        let cell = Cell::TableLeaf {
            key: 7,
            payload: vec![1, 2, 3, 4, 5],
        };
        let encoded = cell.encode();
        assert_eq!(encoded.len(), cell.encoded_size());
        let decoded = Cell::decode(PageType::TableLeaf, &encoded);
        assert_eq!(cell, decoded);
    }

    #[test]
    fn round_trips_table_interior_cell() {
        let cell = Cell::TableInterior {
            child_page: 3,
            key: -5,
        };
        let encoded = cell.encode();
        assert_eq!(encoded.len(), 8);
        assert_eq!(Cell::decode(PageType::TableInterior, &encoded), cell);
    }

    #[test]
    fn round_trips_index_cells() {
        let leaf = Cell::IndexLeaf {
            key: 9,
            primary_key: 2,
        };
        assert_eq!(leaf.encoded_size(), 12);
        assert_eq!(Cell::decode(PageType::IndexLeaf, &leaf.encode()), leaf);

        let interior = Cell::IndexInterior {
            child_page: 4,
            key: 9,
            primary_key: 2,
        };
        assert_eq!(interior.encoded_size(), 16);
        assert_eq!(
            Cell::decode(PageType::IndexInterior, &interior.encode()),
            interior
        );
    }
}
