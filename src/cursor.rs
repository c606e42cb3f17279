//! A `Cursor` is a stateful, read-only iterator over one b-tree: a stack
//! (the *trail*) of `(page, cell-index)` entries describing the current
//! descent path from root to the currently-selected cell. Cursors never
//! mutate the tree; writes go through `btree::Btree::insert` directly.
//!
//! This cursor recomputes its "current cell" by reloading the trail's top
//! page on demand rather than holding a live `Node` across calls — `Node`
//! here is an owned, page-sized value (see `btree::Node`'s doc comment), so
//! there is no long-lived borrow to keep alive, and recomputation keeps the
//! cursor's lifetime independent of the pager's.

use crate::btree::{Cell, Node, PageType};
use crate::pager::{PageNum, Pager};

pub use crate::btree::Error;

/// A comparator for `Cursor::seek`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekMode {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

/// `n_cells()` is used as a sentinel trail index meaning "descend via this
/// node's `right_page`" rather than via a numbered cell.
const RIGHT_PAGE_SENTINEL: usize = usize::MAX;

pub struct Cursor {
    pub root: PageNum,
    pub root_type: PageType,
    pub n_cols: usize,
    trail: Vec<(PageNum, usize)>,
}

impl Cursor {
    pub fn new(pager: &mut Pager, root: PageNum, n_cols: usize) -> Result<Cursor, Error> {
        let root_type = Node::load(pager, root)?.page_type;
        Ok(Cursor {
            root,
            root_type,
            n_cols,
            trail: Vec::new(),
        })
    }

    /// Resets the trail to the root and descends leftmost. Returns `false`
    /// (and leaves the cursor unusable for reads) if the tree is empty.
    pub fn rewind(&mut self, pager: &mut Pager) -> Result<bool, Error> {
        self.trail = vec![(self.root, 0)];
        let root_node = Node::load(pager, self.root)?;
        if root_node.is_leaf() && root_node.n_cells() == 0 {
            self.trail.clear();
            return Ok(false);
        }
        self.descend_leftmost(pager)?;
        Ok(true)
    }

    fn child_for_index(node: &Node, idx: usize) -> Result<PageNum, Error> {
        if idx < node.n_cells() {
            Ok(node.get_cell(idx)?.child_page() as PageNum)
        } else {
            Ok(node.right_page as PageNum)
        }
    }

    fn descend_leftmost(&mut self, pager: &mut Pager) -> Result<(), Error> {
        loop {
            let (page, idx) = *self.trail.last().unwrap();
            let node = Node::load(pager, page)?;
            if node.is_leaf() {
                return Ok(());
            }
            let child = Self::child_for_index(&node, idx)?;
            self.trail.push((child, 0));
        }
    }

    fn descend_rightmost(&mut self, pager: &mut Pager) -> Result<(), Error> {
        loop {
            let (page, idx) = *self.trail.last().unwrap();
            let node = Node::load(pager, page)?;
            let idx = if idx == RIGHT_PAGE_SENTINEL {
                node.n_cells()
            } else {
                idx
            };
            self.trail.last_mut().unwrap().1 = idx;
            if node.is_leaf() {
                self.trail.last_mut().unwrap().1 = node.n_cells().saturating_sub(1);
                return Ok(());
            }
            let child = Self::child_for_index(&node, idx)?;
            self.trail.push((child, RIGHT_PAGE_SENTINEL));
        }
    }

    /// Advances to the next cell in ascending key order. Returns `false`
    /// (restoring the prior position) if there is no successor.
    pub fn next(&mut self, pager: &mut Pager) -> Result<bool, Error> {
        let saved = self.trail.clone();
        if self.try_next(pager)? {
            Ok(true)
        } else {
            self.trail = saved;
            Ok(false)
        }
    }

    fn try_next(&mut self, pager: &mut Pager) -> Result<bool, Error> {
        loop {
            if self.trail.is_empty() {
                return Ok(false);
            }
            let (page, idx) = *self.trail.last().unwrap();
            let node = Node::load(pager, page)?;
            if node.is_leaf() {
                if idx + 1 < node.n_cells() {
                    self.trail.last_mut().unwrap().1 = idx + 1;
                    return Ok(true);
                }
                self.trail.pop();
                continue;
            }
            let new_idx = idx + 1;
            if new_idx <= node.n_cells() {
                self.trail.last_mut().unwrap().1 = new_idx;
                let child = Self::child_for_index(&node, new_idx)?;
                self.trail.push((child, 0));
                self.descend_leftmost(pager)?;
                return Ok(true);
            }
            self.trail.pop();
        }
    }

    /// Advances to the previous cell in descending key order. Returns
    /// `false` (restoring the prior position) if there is no predecessor.
    pub fn prev(&mut self, pager: &mut Pager) -> Result<bool, Error> {
        let saved = self.trail.clone();
        if self.try_prev(pager)? {
            Ok(true)
        } else {
            self.trail = saved;
            Ok(false)
        }
    }

    fn try_prev(&mut self, pager: &mut Pager) -> Result<bool, Error> {
        loop {
            if self.trail.is_empty() {
                return Ok(false);
            }
            let (page, idx) = *self.trail.last().unwrap();
            let node = Node::load(pager, page)?;
            if node.is_leaf() {
                if idx > 0 {
                    self.trail.last_mut().unwrap().1 = idx - 1;
                    return Ok(true);
                }
                self.trail.pop();
                continue;
            }
            if idx > 0 {
                let new_idx = idx - 1;
                self.trail.last_mut().unwrap().1 = new_idx;
                let child = node.get_cell(new_idx)?.child_page() as PageNum;
                self.trail.push((child, RIGHT_PAGE_SENTINEL));
                self.descend_rightmost(pager)?;
                return Ok(true);
            }
            self.trail.pop();
        }
    }

    /// Seeks to `key` per `mode`. Returns `false` on a miss (no cell
    /// satisfies the comparator); the cursor's resulting position on a miss
    /// is unspecified (the DBM jumps away and does not read it).
    pub fn seek(&mut self, pager: &mut Pager, key: i32, mode: SeekMode) -> Result<bool, Error> {
        self.trail = vec![(self.root, 0)];
        loop {
            let (page, idx) = *self.trail.last().unwrap();
            let node = Node::load(pager, page)?;
            if node.is_leaf() {
                let n = node.n_cells();
                if n == 0 {
                    return Ok(false);
                }
                let mut found = n;
                let mut hit = false;
                for i in 0..n {
                    let c = node.get_cell(i)?;
                    if c.key() == key {
                        found = i;
                        hit = true;
                        break;
                    }
                    if c.key() > key {
                        found = i;
                        break;
                    }
                }
                let overshoot = found == n;
                let pos = if overshoot { n - 1 } else { found };
                self.trail.last_mut().unwrap().1 = pos;
                return match mode {
                    SeekMode::Eq => Ok(hit),
                    SeekMode::Lt => {
                        if overshoot {
                            Ok(true)
                        } else {
                            self.try_prev(pager)
                        }
                    }
                    SeekMode::Le => {
                        if hit || overshoot {
                            Ok(true)
                        } else {
                            self.try_prev(pager)
                        }
                    }
                    SeekMode::Gt => {
                        if hit || overshoot {
                            self.try_next(pager)
                        } else {
                            Ok(true)
                        }
                    }
                    SeekMode::Ge => {
                        if overshoot {
                            self.try_next(pager)
                        } else {
                            Ok(true)
                        }
                    }
                };
            }
            let mut next_idx = node.n_cells();
            for i in 0..node.n_cells() {
                if node.get_cell(i)?.key() >= key {
                    next_idx = i;
                    break;
                }
            }
            let child = Self::child_for_index(&node, next_idx)?;
            self.trail.last_mut().unwrap().1 = next_idx;
            self.trail.push((child, 0));
            let _ = idx;
        }
    }

    /// The cell currently under the cursor. Panics if `rewind`/`seek` was
    /// never called or last reported no position — callers (the DBM) must
    /// not read a cursor that `rewind`ed empty or that `next`/`prev` just
    /// reported `false` from.
    pub fn current_cell(&self, pager: &mut Pager) -> Result<Cell, Error> {
        let (page, idx) = *self.trail.last().expect("cursor has no current position");
        let node = Node::load(pager, page)?;
        node.get_cell(idx)
    }

    pub fn current_key(&self, pager: &mut Pager) -> Result<i32, Error> {
        Ok(self.current_cell(pager)?.key())
    }
}
