//! A `Node` is a typed view over one page: it owns the page's raw bytes plus
//! an in-memory copy of the cell offset array (so that shifting it on insert
//! is a `Vec` operation, not hand-rolled byte-shuffling), and knows how to
//! serialize itself back to the exact on-disk layout.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Seek, SeekFrom};

use super::cell::Cell;
use super::{Error, PageType};
use crate::pager::{PageNum, Pager};

/// Page 1 carries the 100-byte file header before its b-tree node header;
/// every other page's node header starts at byte 0.
fn header_offset(page_num: PageNum) -> usize {
    if page_num == 1 {
        crate::dbheader::HEADER_SIZE
    } else {
        0
    }
}

pub struct Node {
    pub page_num: PageNum,
    pub page_type: PageType,
    pub free_offset: u16,
    pub cells_offset: u16,
    pub right_page: u32,
    pub cell_offsets: Vec<u16>,
    raw: Vec<u8>,
}

impl Node {
    /// Loads and interprets page `page_num` as a b-tree node.
    pub fn load(pager: &mut Pager, page_num: PageNum) -> Result<Node, Error> {
        let raw = pager.get_page_ro(page_num)?.to_vec();
        let off = header_offset(page_num);
        let mut c = Cursor::new(&raw[off..]);

        let page_type = PageType::from_type_byte(c.read_u8()?)?;
        let free_offset = c.read_u16::<BigEndian>()?;
        let n_cells = c.read_u16::<BigEndian>()?;
        let cells_offset = c.read_u16::<BigEndian>()?;
        c.read_u8()?; // reserved
        let right_page = if page_type.is_leaf() {
            0
        } else {
            c.read_u32::<BigEndian>()?
        };

        c.seek(SeekFrom::Start((off + page_type.header_len()) as u64))?;
        let mut cell_offsets = Vec::with_capacity(n_cells as usize);
        for _ in 0..n_cells {
            cell_offsets.push(c.read_u16::<BigEndian>()?);
        }

        Ok(Node {
            page_num,
            page_type,
            free_offset,
            cells_offset,
            right_page,
            cell_offsets,
            raw,
        })
    }

    /// Allocates a fresh page and initializes it empty of `page_type`.
    pub fn new_empty(pager: &mut Pager, page_type: PageType) -> Result<Node, Error> {
        let page_num = pager.allocate_page();
        let page_size = pager.page_size();
        let off = header_offset(page_num);
        let mut raw = vec![0u8; page_size as usize];
        if page_num == 1 {
            crate::dbheader::DbHeader::new(page_size).write_into(&mut raw)?;
        }
        let node = Node {
            page_num,
            page_type,
            free_offset: (off + page_type.header_len()) as u16,
            cells_offset: page_size as u16,
            right_page: 0,
            cell_offsets: Vec::new(),
            raw,
        };
        Ok(node)
    }

    /// Re-initializes this node's backing page as empty of `page_type`,
    /// discarding all cells. Used when a node is split: its old content has
    /// already been copied elsewhere, and it is about to be refilled.
    pub fn reinit_empty(&mut self, page_type: PageType, page_size: u32) {
        let off = header_offset(self.page_num);
        self.page_type = page_type;
        self.free_offset = (off + page_type.header_len()) as u16;
        self.cells_offset = page_size as u16;
        self.right_page = 0;
        self.cell_offsets.clear();
    }

    pub fn n_cells(&self) -> usize {
        self.cell_offsets.len()
    }

    pub fn is_leaf(&self) -> bool {
        self.page_type.is_leaf()
    }

    /// Reads and decodes the cell at offset-array slot `i`.
    pub fn get_cell(&self, i: usize) -> Result<Cell, Error> {
        let off = *self.cell_offsets.get(i).ok_or(Error::CellOutOfRange)? as usize;
        Ok(Cell::decode(self.page_type, &self.raw[off..]))
    }

    pub fn has_room(&self, cell: &Cell) -> bool {
        self.cells_offset as i64 - self.free_offset as i64 >= cell.encoded_size() as i64
    }

    /// Inserts `cell` at offset-array slot `i`, shifting later entries right.
    /// The caller must have already checked `has_room`.
    pub fn insert_cell(&mut self, i: usize, cell: &Cell) {
        debug_assert!(self.has_room(cell));
        let encoded = cell.encode();
        let new_cells_offset = self.cells_offset - encoded.len() as u16;
        let start = new_cells_offset as usize;
        self.raw[start..start + encoded.len()].copy_from_slice(&encoded);
        self.cells_offset = new_cells_offset;
        self.cell_offsets.insert(i, new_cells_offset);
        self.free_offset += 2;
    }

    /// Serializes the in-memory header and offset array back into the raw
    /// page buffer, then commits it through the pager.
    pub fn write_back(&mut self, pager: &mut Pager) -> Result<(), Error> {
        let off = header_offset(self.page_num);
        {
            let mut c = Cursor::new(&mut self.raw[off..]);
            c.write_u8(self.page_type.type_byte())?;
            c.write_u16::<BigEndian>(self.free_offset)?;
            c.write_u16::<BigEndian>(self.cell_offsets.len() as u16)?;
            c.write_u16::<BigEndian>(self.cells_offset)?;
            c.write_u8(0)?; // reserved
            if !self.page_type.is_leaf() {
                c.write_u32::<BigEndian>(self.right_page)?;
            }
        }
        let array_start = off + self.page_type.header_len();
        let mut c = Cursor::new(&mut self.raw[array_start..]);
        for &o in &self.cell_offsets {
            c.write_u16::<BigEndian>(o)?;
        }
        let page_size = pager.page_size();
        pager.write_page(self.page_num, &self.raw[..page_size as usize])?;
        Ok(())
    }
}
