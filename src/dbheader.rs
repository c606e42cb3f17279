//! dbheader reads and writes the 100-byte file header that begins page 1.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read, Seek, SeekFrom, Write};

#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    #[error("The magic bytes for this file are wrong.")]
    WrongMagic,
    #[error("A fixed header constant did not match the expected value.")]
    BadConstant,
    #[error("The page size is not a supported power of two in [512, 65536].")]
    UnsupportedPagesize,
    #[error("The page-cache-size hint was not 20000.")]
    BadPageCacheSize,
    #[error("Error reading or writing the header.")]
    Io,
}

pub const HEADER_SIZE: usize = 100;
pub const DEFAULT_PAGE_SIZE: u32 = 1024;

const MAGIC: &[u8; 16] = b"SQLite format 3\0";
const SIX_BYTE_CONST: [u8; 6] = [0x01, 0x01, 0x00, 0x40, 0x20, 0x20];
const FOUR_BYTE_CONST: [u8; 4] = [0x00, 0x00, 0x00, 0x01];
const TAIL_CONST: [u8; 8] = [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01];
const PAGE_CACHE_SIZE: u32 = 20000;

/// The parsed contents of the 100-byte file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbHeader {
    pub page_size: u32,
    pub file_change_counter: u32,
    pub schema_version: u32,
    pub user_cookie: u32,
}

impl DbHeader {
    pub fn new(page_size: u32) -> Self {
        DbHeader {
            page_size,
            file_change_counter: 0,
            schema_version: 0,
            user_cookie: 0,
        }
    }

    fn is_valid_page_size(sz: u32) -> bool {
        matches!(sz, 512 | 1024 | 2048 | 4096 | 8192 | 16384 | 32768 | 65536)
    }

    /// Parses the first 100 bytes of page 1, validating every fixed constant.
    pub fn parse(bytes: &[u8]) -> Result<DbHeader, Error> {
        let mut c = Cursor::new(bytes);

        let mut magic = [0u8; 16];
        c.read_exact(&mut magic).map_err(|_| Error::Io)?;
        if &magic != MAGIC {
            return Err(Error::WrongMagic);
        }

        let page_size = c.read_u16::<BigEndian>().map_err(|_| Error::Io)? as u32;
        if !Self::is_valid_page_size(page_size) {
            return Err(Error::UnsupportedPagesize);
        }

        let mut six = [0u8; 6];
        c.read_exact(&mut six).map_err(|_| Error::Io)?;
        if six != SIX_BYTE_CONST {
            return Err(Error::BadConstant);
        }

        let file_change_counter = c.read_u32::<BigEndian>().map_err(|_| Error::Io)?;
        c.seek(SeekFrom::Current(4)).map_err(|_| Error::Io)?; // reserved
        c.seek(SeekFrom::Current(8)).map_err(|_| Error::Io)?; // reserved

        let schema_version = c.read_u32::<BigEndian>().map_err(|_| Error::Io)?;

        let mut four = [0u8; 4];
        c.read_exact(&mut four).map_err(|_| Error::Io)?;
        if four != FOUR_BYTE_CONST {
            return Err(Error::BadConstant);
        }

        let page_cache_size = c.read_u32::<BigEndian>().map_err(|_| Error::Io)?;
        if page_cache_size != PAGE_CACHE_SIZE {
            return Err(Error::BadPageCacheSize);
        }

        let mut tail = [0u8; 8];
        c.read_exact(&mut tail).map_err(|_| Error::Io)?;
        if tail != TAIL_CONST {
            return Err(Error::BadConstant);
        }

        let user_cookie = c.read_u32::<BigEndian>().map_err(|_| Error::Io)?;

        Ok(DbHeader {
            page_size,
            file_change_counter,
            schema_version,
            user_cookie,
        })
    }

    /// Serializes this header into the first 100 bytes of `page`. `page` must
    /// be at least `HEADER_SIZE` bytes long; the remaining bytes are left
    /// untouched (callers write the rest of page 1, the schema root, after
    /// this call).
    pub fn write_into(&self, page: &mut [u8]) -> Result<(), Error> {
        assert!(page.len() >= HEADER_SIZE);
        let mut c = Cursor::new(&mut page[..HEADER_SIZE]);
        c.write_all(MAGIC).map_err(|_| Error::Io)?;
        c.write_u16::<BigEndian>(self.page_size as u16)
            .map_err(|_| Error::Io)?;
        c.write_all(&SIX_BYTE_CONST).map_err(|_| Error::Io)?;
        c.write_u32::<BigEndian>(self.file_change_counter)
            .map_err(|_| Error::Io)?;
        c.write_all(&[0u8; 4]).map_err(|_| Error::Io)?;
        c.write_all(&[0u8; 8]).map_err(|_| Error::Io)?;
        c.write_u32::<BigEndian>(self.schema_version)
            .map_err(|_| Error::Io)?;
        c.write_all(&FOUR_BYTE_CONST).map_err(|_| Error::Io)?;
        c.write_u32::<BigEndian>(PAGE_CACHE_SIZE)
            .map_err(|_| Error::Io)?;
        c.write_all(&TAIL_CONST).map_err(|_| Error::Io)?;
        c.write_u32::<BigEndian>(self.user_cookie)
            .map_err(|_| Error::Io)?;
        c.write_all(&[0u8; 4]).map_err(|_| Error::Io)?;
        // Bytes 68..100 are unused padding; the page buffer is zero-initialized
        // already, so nothing further to write.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_default_header() {
        let h = DbHeader::new(DEFAULT_PAGE_SIZE);
        let mut page = vec![0u8; DEFAULT_PAGE_SIZE as usize];
        h.write_into(&mut page).unwrap();
        let h2 = DbHeader::parse(&page).unwrap();
        assert_eq!(h, h2);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut page = vec![0u8; DEFAULT_PAGE_SIZE as usize];
        DbHeader::new(DEFAULT_PAGE_SIZE)
            .write_into(&mut page)
            .unwrap();
        page[0] = b'X';
        assert!(matches!(DbHeader::parse(&page), Err(Error::WrongMagic)));
    }

    #[test]
    fn rejects_bad_page_cache_size_hint() {
        let mut page = vec![0u8; DEFAULT_PAGE_SIZE as usize];
        DbHeader::new(DEFAULT_PAGE_SIZE)
            .write_into(&mut page)
            .unwrap();
        page[48..52].copy_from_slice(&19999u32.to_be_bytes());
        assert!(matches!(DbHeader::parse(&page), Err(Error::BadPageCacheSize)));
    }

    #[test]
    fn rejects_unsupported_page_size() {
        let mut page = vec![0u8; DEFAULT_PAGE_SIZE as usize];
        DbHeader::new(DEFAULT_PAGE_SIZE)
            .write_into(&mut page)
            .unwrap();
        page[16..18].copy_from_slice(&999u16.to_be_bytes());
        assert!(matches!(
            DbHeader::parse(&page),
            Err(Error::UnsupportedPagesize)
        ));
    }
}
