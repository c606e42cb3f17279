//! Manages pages of a chidb-format file.
//!
//! The pager owns the data in each page, reads pages into memory on demand,
//! and is the sole writer back to disk. All pages share one fixed size,
//! fixed at database-creation time and read back from the file header on
//! every open (see `dbheader`).
//!
//! Page numbers are 1-based, to match the on-disk format.

use std::collections::{HashMap, HashSet};
use std::io::{Read, Seek, SeekFrom, Write};

use crate::dbheader::{DbHeader, DEFAULT_PAGE_SIZE, HEADER_SIZE};

pub type PageNum = usize;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("I/O error accessing database file: {0}")]
    Io(#[from] std::io::Error),
    #[error("The page number is higher than the file contains.")]
    PageOutOfRange(PageNum),
    #[error("Error in the database file header: {0}")]
    DbHeader(#[from] crate::dbheader::Error),
    #[error("Too many writers open for a single root page at once.")]
    TooManyWriters,
}

/// A pager manages the file locking and the memory use for one open database file.
pub struct Pager {
    f: std::fs::File,
    page_size: u32,
    n_pages: u32,
    pages: HashMap<PageNum, Vec<u8>>,
    dirty: HashSet<PageNum>,
    open_for_write: HashSet<PageNum>,
}

impl Pager {
    /// Opens `path`, creating it (as an empty one-page database) if it does
    /// not already exist.
    pub fn open(path: &str) -> Result<Self, Error> {
        let existed = std::path::Path::new(path).exists();
        let mut f = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;

        let len = f.metadata()?.len();
        if !existed || len == 0 {
            let page_size = DEFAULT_PAGE_SIZE;
            let mut pager = Pager {
                f,
                page_size,
                n_pages: 0,
                pages: HashMap::new(),
                dirty: HashSet::new(),
                open_for_write: HashSet::new(),
            };
            let pn = pager.allocate_page();
            debug_assert_eq!(pn, 1);
            let mut page = vec![0u8; page_size as usize];
            DbHeader::new(page_size).write_into(&mut page)?;
            pager.pages.insert(1, page);
            pager.dirty.insert(1);
            pager.flush()?;
            log::debug!("created new database file {path} with page size {page_size}");
            Ok(pager)
        } else {
            let mut header_bytes = vec![0u8; HEADER_SIZE];
            f.seek(SeekFrom::Start(0))?;
            f.read_exact(&mut header_bytes)?;
            let header = DbHeader::parse(&header_bytes)?;
            let n_pages = (len / header.page_size as u64) as u32;
            log::debug!(
                "opened existing database file {path}: page_size={} n_pages={}",
                header.page_size,
                n_pages
            );
            Ok(Pager {
                f,
                page_size: header.page_size,
                n_pages,
                pages: HashMap::new(),
                dirty: HashSet::new(),
                open_for_write: HashSet::new(),
            })
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn n_pages(&self) -> u32 {
        self.n_pages
    }

    fn read_page_from_file(&mut self, pn: PageNum) -> Result<Vec<u8>, Error> {
        let mut v = vec![0u8; self.page_size as usize];
        self.f
            .seek(SeekFrom::Start((pn - 1) as u64 * self.page_size as u64))?;
        self.f.read_exact(&mut v[..])?;
        Ok(v)
    }

    fn ensure_present(&mut self, pn: PageNum) -> Result<(), Error> {
        if pn == 0 || pn as u32 > self.n_pages {
            return Err(Error::PageOutOfRange(pn));
        }
        if !self.pages.contains_key(&pn) {
            let v = self.read_page_from_file(pn)?;
            self.pages.insert(pn, v);
        }
        Ok(())
    }

    /// Returns a read-only view of page `pn`. The page is cached on first
    /// access.
    pub fn get_page_ro(&mut self, pn: PageNum) -> Result<&[u8], Error> {
        self.ensure_present(pn)?;
        Ok(self.pages.get(&pn).unwrap().as_slice())
    }

    /// Returns a mutable view of page `pn`, marking it dirty. The caller is
    /// responsible for calling `write_page` (or leaving it to `flush`) once
    /// done mutating.
    pub fn get_page_rw(&mut self, pn: PageNum) -> Result<&mut [u8], Error> {
        self.ensure_present(pn)?;
        self.dirty.insert(pn);
        Ok(self.pages.get_mut(&pn).unwrap().as_mut_slice())
    }

    /// Persists all `page_size` bytes of `pn` at its offset in the file
    /// immediately (no write-back delay: there is no transaction boundary to
    /// flush at).
    pub fn write_page(&mut self, pn: PageNum, data: &[u8]) -> Result<(), Error> {
        assert_eq!(data.len(), self.page_size as usize);
        self.f
            .seek(SeekFrom::Start((pn - 1) as u64 * self.page_size as u64))?;
        self.f.write_all(data)?;
        self.pages.insert(pn, data.to_vec());
        self.dirty.remove(&pn);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Error> {
        let dirty: Vec<PageNum> = self.dirty.iter().copied().collect();
        for pn in dirty {
            let data = self.pages.get(&pn).unwrap().clone();
            self.write_page(pn, &data)?;
        }
        Ok(())
    }

    /// Returns `n_pages + 1` and increments the page count. Does not write
    /// anything; the new page exists only once a caller writes it.
    pub fn allocate_page(&mut self) -> PageNum {
        self.n_pages += 1;
        let pn = self.n_pages as PageNum;
        let page = vec![0u8; self.page_size as usize];
        self.pages.insert(pn, page);
        self.dirty.insert(pn);
        pn
    }

    /// Registers root page `root` as having an open write cursor. Fails if
    /// one is already open, per the single-writer-per-root-page contract.
    pub fn begin_write(&mut self, root: PageNum) -> Result<(), Error> {
        if !self.open_for_write.insert(root) {
            return Err(Error::TooManyWriters);
        }
        Ok(())
    }

    pub fn end_write(&mut self, root: PageNum) {
        self.open_for_write.remove(&root);
    }

    pub fn close(mut self) -> Result<(), Error> {
        self.flush()
    }
}

impl Drop for Pager {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            log::warn!("error flushing pager on drop: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_path() -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db").to_str().unwrap().to_string();
        (dir, path)
    }

    #[test]
    fn creates_new_file_with_one_page() {
        let (_dir, path) = tmp_path();
        let pager = Pager::open(&path).unwrap();
        assert_eq!(pager.n_pages(), 1);
        assert_eq!(pager.page_size(), DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn reopen_preserves_page_size_and_header_bytes() {
        let (_dir, path) = tmp_path();
        let page1_before = {
            let mut pager = Pager::open(&path).unwrap();
            pager.get_page_ro(1).unwrap().to_vec()
        };
        let mut pager2 = Pager::open(&path).unwrap();
        assert_eq!(pager2.page_size(), DEFAULT_PAGE_SIZE);
        let page1_after = pager2.get_page_ro(1).unwrap().to_vec();
        assert_eq!(page1_before, page1_after);
    }

    #[test]
    fn allocate_then_write_then_read_back() {
        let (_dir, path) = tmp_path();
        let mut pager = Pager::open(&path).unwrap();
        let pn = pager.allocate_page();
        assert_eq!(pn, 2);
        let mut data = vec![0u8; pager.page_size() as usize];
        data[0] = 0xAB;
        pager.write_page(pn, &data).unwrap();
        assert_eq!(pager.get_page_ro(pn).unwrap()[0], 0xAB);
    }

    #[test]
    fn refuses_second_concurrent_writer_on_same_root() {
        let (_dir, path) = tmp_path();
        let mut pager = Pager::open(&path).unwrap();
        pager.begin_write(2).unwrap();
        assert!(matches!(pager.begin_write(2), Err(Error::TooManyWriters)));
        pager.end_write(2);
        assert!(pager.begin_write(2).is_ok());
    }

    #[test]
    fn page_out_of_range_is_reported() {
        let (_dir, path) = tmp_path();
        let mut pager = Pager::open(&path).unwrap();
        assert!(matches!(
            pager.get_page_ro(5),
            Err(Error::PageOutOfRange(5))
        ));
    }
}
