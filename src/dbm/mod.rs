//! The Database Machine: a register-based virtual machine that drives
//! cursors over b-trees to execute a compiled program one opcode at a time.
//!
//! `step` is the only entry point a caller needs: it runs opcodes until the
//! program either produces a result row (`ResultRow`) or halts (`Halt`),
//! returning control to the caller in either case. The dispatch itself is a
//! plain `match` over the opcode enum rather than a literal array of
//! function pointers — Rust's exhaustiveness check on `match` gives the same
//! "every opcode must be handled" guarantee the reference design's
//! `handler_entry` table gives by construction.

use crate::btree::{Btree, Cell};
use crate::cursor::{Cursor, SeekMode};
use crate::pager::{PageNum, Pager};
use crate::record;
use crate::register::Register;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Btree(#[from] crate::btree::Error),
    #[error(transparent)]
    Record(#[from] record::Error),
    #[error(transparent)]
    Pager(#[from] crate::pager::Error),
    #[error("cursor {0} is not open")]
    CursorNotOpen(usize),
    #[error("jump target {0} is out of range for a program of length {1}")]
    BadJumpTarget(usize, usize),
    #[error("register {0} holds a value of the wrong kind for this opcode")]
    WrongRegisterKind(usize),
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Noop,
    Integer,
    String,
    Null,
    Copy,
    SCopy,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    OpenRead,
    OpenWrite,
    Close,
    Rewind,
    Next,
    Prev,
    Seek,
    SeekGt,
    SeekGe,
    SeekLt,
    SeekLe,
    Column,
    Key,
    ResultRow,
    MakeRecord,
    Insert,
    IdxGt,
    IdxGe,
    IdxLt,
    IdxLe,
    IdxPKey,
    IdxInsert,
    CreateTable,
    CreateIndex,
    Halt,
}

/// One compiled instruction: `P1`/`P3` are signed integer operands, `P2` is
/// a signed integer (most often a jump target), `P4` is an optional text
/// operand (used only by `String`).
#[derive(Debug, Clone, PartialEq)]
pub struct Instr {
    pub op: Opcode,
    pub p1: i64,
    pub p2: i64,
    pub p3: i64,
    pub p4: Option<String>,
}

impl Instr {
    pub fn new(op: Opcode, p1: i64, p2: i64, p3: i64, p4: Option<String>) -> Instr {
        Instr { op, p1, p2, p3, p4 }
    }
}

pub type Program = Vec<Instr>;

pub enum StepResult {
    Row,
    Done,
}

struct CursorSlot {
    cursor: Cursor,
    root: PageNum,
    writer: bool,
}

pub struct Dbm {
    pub program: Program,
    pc: usize,
    registers: Vec<Register>,
    cursors: Vec<Option<CursorSlot>>,
    pub start_rr: usize,
    pub n_rr: usize,
}

impl Dbm {
    pub fn new(program: Program) -> Dbm {
        Dbm {
            program,
            pc: 0,
            registers: Vec::new(),
            cursors: Vec::new(),
            start_rr: 0,
            n_rr: 0,
        }
    }

    pub fn result_row(&self) -> &[Register] {
        &self.registers[self.start_rr..self.start_rr + self.n_rr]
    }

    fn reg(&self, i: i64) -> Register {
        self.registers
            .get(i as usize)
            .cloned()
            .unwrap_or(Register::Unspecified)
    }

    fn set_reg(&mut self, i: i64, v: Register) {
        let i = i as usize;
        if i >= self.registers.len() {
            self.registers.resize(i + 1, Register::Unspecified);
        }
        self.registers[i] = v;
    }

    fn cursor_slot(&self, i: i64) -> Result<&CursorSlot> {
        self.cursors
            .get(i as usize)
            .and_then(|c| c.as_ref())
            .ok_or(Error::CursorNotOpen(i as usize))
    }

    fn cursor_slot_mut(&mut self, i: i64) -> Result<&mut CursorSlot> {
        self.cursors
            .get_mut(i as usize)
            .and_then(|c| c.as_mut())
            .ok_or(Error::CursorNotOpen(i as usize))
    }

    fn set_cursor(&mut self, i: i64, slot: CursorSlot) {
        let i = i as usize;
        if i >= self.cursors.len() {
            self.cursors.resize_with(i + 1, || None);
        }
        self.cursors[i] = Some(slot);
    }

    fn open_cursor(&mut self, pager: &mut Pager, i: i64, root: PageNum, n_cols: i64, writer: bool) -> Result<()> {
        if writer {
            pager.begin_write(root)?;
        }
        let cursor = Cursor::new(pager, root, n_cols as usize)?;
        self.set_cursor(i, CursorSlot { cursor, root, writer });
        Ok(())
    }

    fn jump(&mut self, target: i64) -> Result<()> {
        let target = target as usize;
        if target > self.program.len() {
            return Err(Error::BadJumpTarget(target, self.program.len()));
        }
        self.pc = target;
        Ok(())
    }

    /// Runs opcodes starting at the current `pc` until a result row is
    /// produced or the program halts.
    pub fn step(&mut self, pager: &mut Pager) -> Result<StepResult> {
        loop {
            if self.pc >= self.program.len() {
                return Ok(StepResult::Done);
            }
            let instr = self.program[self.pc].clone();
            self.pc += 1;

            match instr.op {
                Opcode::Noop => {}

                Opcode::Integer => self.set_reg(instr.p2, Register::Int(instr.p1 as i32)),
                Opcode::String => {
                    self.set_reg(instr.p2, Register::Text(instr.p4.clone().unwrap_or_default()))
                }
                Opcode::Null => self.set_reg(instr.p2, Register::Null),
                Opcode::Copy | Opcode::SCopy => {
                    let v = self.reg(instr.p1);
                    self.set_reg(instr.p2, v);
                }

                Opcode::Eq | Opcode::Ne | Opcode::Lt | Opcode::Le | Opcode::Gt | Opcode::Ge => {
                    // The relation reads right-to-left, `R[P3] op R[P1]`, matching
                    // the reference bytecode's operand order (a holdover from its
                    // stack-machine ancestry: P1 is conventionally the *second*
                    // operand).
                    let a = self.reg(instr.p3);
                    let b = self.reg(instr.p1);
                    if let Some(ord) = a.partial_compare(&b) {
                        use std::cmp::Ordering::*;
                        let holds = match instr.op {
                            Opcode::Eq => ord == Equal,
                            Opcode::Ne => ord != Equal,
                            Opcode::Lt => ord == Less,
                            Opcode::Le => ord != Greater,
                            Opcode::Gt => ord == Greater,
                            Opcode::Ge => ord != Less,
                            _ => unreachable!(),
                        };
                        if holds {
                            self.jump(instr.p2)?;
                        }
                    }
                }

                Opcode::OpenRead | Opcode::OpenWrite => {
                    let root = self.reg(instr.p2).as_int().ok_or(Error::WrongRegisterKind(instr.p2 as usize))? as PageNum;
                    let writer = instr.op == Opcode::OpenWrite;
                    self.open_cursor(pager, instr.p1, root, instr.p3, writer)?;
                }
                Opcode::Close => {
                    let i = instr.p1 as usize;
                    if let Some(Some(slot)) = self.cursors.get(i) {
                        if slot.writer {
                            pager.end_write(slot.root);
                        }
                    }
                    if i < self.cursors.len() {
                        self.cursors[i] = None;
                    }
                }
                Opcode::Rewind => {
                    let found = self.cursor_slot_mut(instr.p1)?.cursor.rewind(pager)?;
                    if !found {
                        self.jump(instr.p2)?;
                    }
                }
                Opcode::Next => {
                    let moved = self.cursor_slot_mut(instr.p1)?.cursor.next(pager)?;
                    if moved {
                        self.jump(instr.p2)?;
                    }
                }
                Opcode::Prev => {
                    let moved = self.cursor_slot_mut(instr.p1)?.cursor.prev(pager)?;
                    if moved {
                        self.jump(instr.p2)?;
                    }
                }
                Opcode::Seek
                | Opcode::SeekGt
                | Opcode::SeekGe
                | Opcode::SeekLt
                | Opcode::SeekLe => {
                    let mode = match instr.op {
                        Opcode::Seek => SeekMode::Eq,
                        Opcode::SeekGt => SeekMode::Gt,
                        Opcode::SeekGe => SeekMode::Ge,
                        Opcode::SeekLt => SeekMode::Lt,
                        Opcode::SeekLe => SeekMode::Le,
                        _ => unreachable!(),
                    };
                    let key = self
                        .reg(instr.p3)
                        .as_int()
                        .ok_or(Error::WrongRegisterKind(instr.p3 as usize))?;
                    let found = self.cursor_slot_mut(instr.p1)?.cursor.seek(pager, key, mode)?;
                    if !found {
                        self.jump(instr.p2)?;
                    }
                }

                Opcode::Column => {
                    let cell = self.cursor_slot(instr.p1)?.cursor.current_cell(pager)?;
                    let payload = match cell {
                        Cell::TableLeaf { payload, .. } => payload,
                        _ => Vec::new(),
                    };
                    let values = record::unpack(&payload)?;
                    let v = values
                        .get(instr.p2 as usize)
                        .ok_or(record::Error::ColumnOutOfRange(instr.p2 as usize, values.len()))?;
                    self.set_reg(instr.p3, Register::from(v));
                }
                Opcode::Key => {
                    let key = self.cursor_slot(instr.p1)?.cursor.current_key(pager)?;
                    self.set_reg(instr.p2, Register::Int(key));
                }
                Opcode::ResultRow => {
                    self.start_rr = instr.p1 as usize;
                    self.n_rr = instr.p2 as usize;
                    return Ok(StepResult::Row);
                }
                Opcode::MakeRecord => {
                    let start = instr.p1;
                    let n = instr.p2;
                    let mut values = Vec::with_capacity(n as usize);
                    for i in 0..n {
                        let r = self.reg(start + i);
                        let v = record::Value::try_from(&r).map_err(|_| Error::WrongRegisterKind((start + i) as usize))?;
                        values.push(v);
                    }
                    self.set_reg(instr.p3, Register::Binary(record::pack(&values)));
                }
                Opcode::Insert => {
                    let root = self.cursor_slot(instr.p1)?.root;
                    let payload = self
                        .reg(instr.p2)
                        .as_binary()
                        .ok_or(Error::WrongRegisterKind(instr.p2 as usize))?
                        .to_vec();
                    let key = self
                        .reg(instr.p3)
                        .as_int()
                        .ok_or(Error::WrongRegisterKind(instr.p3 as usize))?;
                    Btree::new(root).insert(pager, Cell::TableLeaf { key, payload })?;
                }

                Opcode::IdxGt | Opcode::IdxGe | Opcode::IdxLt | Opcode::IdxLe => {
                    let key = self.cursor_slot(instr.p1)?.cursor.current_key(pager)?;
                    let cmp = self
                        .reg(instr.p3)
                        .as_int()
                        .ok_or(Error::WrongRegisterKind(instr.p3 as usize))?;
                    let holds = match instr.op {
                        Opcode::IdxGt => key > cmp,
                        Opcode::IdxGe => key >= cmp,
                        Opcode::IdxLt => key < cmp,
                        Opcode::IdxLe => key <= cmp,
                        _ => unreachable!(),
                    };
                    if holds {
                        self.jump(instr.p2)?;
                    }
                }
                Opcode::IdxPKey => {
                    let cell = self.cursor_slot(instr.p1)?.cursor.current_cell(pager)?;
                    self.set_reg(instr.p2, Register::Int(cell.primary_key()));
                }
                Opcode::IdxInsert => {
                    let root = self.cursor_slot(instr.p1)?.root;
                    let key = self
                        .reg(instr.p2)
                        .as_int()
                        .ok_or(Error::WrongRegisterKind(instr.p2 as usize))?;
                    let primary_key = self
                        .reg(instr.p3)
                        .as_int()
                        .ok_or(Error::WrongRegisterKind(instr.p3 as usize))?;
                    Btree::new(root).insert(pager, Cell::IndexLeaf { key, primary_key })?;
                }

                Opcode::CreateTable => {
                    let root = Btree::create_table(pager)?;
                    self.set_reg(instr.p1, Register::Int(root as i32));
                }
                Opcode::CreateIndex => {
                    let root = Btree::create_index(pager)?;
                    self.set_reg(instr.p1, Register::Int(root as i32));
                }

                Opcode::Halt => return Ok(StepResult::Done),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_pager() -> (tempfile::TempDir, Pager) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("d.db").to_str().unwrap().to_string();
        (dir, Pager::open(&path).unwrap())
    }

    #[test]
    fn insert_then_scan_one_row() {
        let (_d, mut pager) = tmp_pager();
        let root = Btree::create_table(&mut pager).unwrap();

        let program = vec![
            Instr::new(Opcode::Integer, root as i64, 0, 0, None),
            Instr::new(Opcode::OpenWrite, 0, 0, 2, None),
            Instr::new(Opcode::Integer, 1, 1, 0, None),
            Instr::new(Opcode::Null, 0, 2, 0, None),
            Instr::new(Opcode::MakeRecord, 1, 2, 3, None),
            Instr::new(Opcode::Insert, 0, 3, 1, None),
            Instr::new(Opcode::Close, 0, 0, 0, None),
            Instr::new(Opcode::Halt, 0, 0, 0, None),
        ];
        let mut dbm = Dbm::new(program);
        assert!(matches!(dbm.step(&mut pager).unwrap(), StepResult::Done));

        let program = vec![
            Instr::new(Opcode::Integer, root as i64, 0, 0, None),
            Instr::new(Opcode::OpenRead, 0, 0, 2, None),
            Instr::new(Opcode::Rewind, 0, 8, 0, None),
            Instr::new(Opcode::Key, 0, 1, 0, None),
            Instr::new(Opcode::ResultRow, 1, 1, 0, None),
            Instr::new(Opcode::Next, 0, 3, 0, None),
            Instr::new(Opcode::Close, 0, 0, 0, None),
            Instr::new(Opcode::Halt, 0, 0, 0, None),
        ];
        let mut dbm = Dbm::new(program);
        match dbm.step(&mut pager).unwrap() {
            StepResult::Row => {
                assert_eq!(dbm.result_row()[0].as_int(), Some(1));
            }
            StepResult::Done => panic!("expected a row"),
        }
        assert!(matches!(dbm.step(&mut pager).unwrap(), StepResult::Done));
    }

    #[test]
    fn duplicate_insert_surfaces_as_error() {
        let (_d, mut pager) = tmp_pager();
        let root = Btree::create_table(&mut pager).unwrap();
        let insert_program = |key: i64| {
            vec![
                Instr::new(Opcode::Integer, root as i64, 0, 0, None),
                Instr::new(Opcode::OpenWrite, 0, 0, 1, None),
                Instr::new(Opcode::Integer, key, 1, 0, None),
                Instr::new(Opcode::MakeRecord, 1, 0, 3, None),
                Instr::new(Opcode::Insert, 0, 3, 1, None),
                Instr::new(Opcode::Close, 0, 0, 0, None),
                Instr::new(Opcode::Halt, 0, 0, 0, None),
            ]
        };
        let mut dbm = Dbm::new(insert_program(1));
        assert!(matches!(dbm.step(&mut pager).unwrap(), StepResult::Done));
        let mut dbm = Dbm::new(insert_program(1));
        assert!(matches!(dbm.step(&mut pager), Err(Error::Btree(crate::btree::Error::Duplicate))));
    }
}
