//! Abstract syntax tree types for the small SQL subset this crate supports:
//! `CREATE TABLE`, `INSERT INTO … VALUES`, and `SELECT … FROM … [NATURAL
//! JOIN …] [WHERE …]`, each optionally prefixed with `EXPLAIN`.
//!
//! The AST discards lexical detail (case, whitespace, position) that the
//! parse tree carries; `pt_to_ast` is the only place that looks at a parse
//! tree directly.

use enum_as_inner::EnumAsInner;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColName {
    pub name: String,
}

impl std::fmt::Display for ColName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.name.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelItem {
    ColName(ColName),
    Star,
}

impl std::fmt::Display for SelItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelItem::ColName(x) => x.fmt(f),
            SelItem::Star => "*".fmt(f),
        }
    }
}

/// A literal value as it appears in SQL text: an `INSERT` value or a `WHERE`
/// comparand. Floats are parsed (so the grammar need not special-case them)
/// but rejected by the code generator, per the non-goal on floating-point
/// storage.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Int(i64),
    String(String),
    Real(f64),
}

impl std::fmt::Display for Constant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Constant::Int(x) => x.fmt(f),
            Constant::String(x) => write!(f, "{:?}", x),
            Constant::Real(x) => x.fmt(f),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    /// The comparator that holds exactly when `self` does not, used by the
    /// code generator to turn a predicate into a skip-this-row test.
    pub fn negate(self) -> CmpOp {
        match self {
            CmpOp::Eq => CmpOp::Ne,
            CmpOp::Ne => CmpOp::Eq,
            CmpOp::Lt => CmpOp::Ge,
            CmpOp::Le => CmpOp::Gt,
            CmpOp::Gt => CmpOp::Le,
            CmpOp::Ge => CmpOp::Lt,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    pub column: ColName,
    pub op: CmpOp,
    pub value: Constant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FromClause {
    Table(String),
    NaturalJoin(String, String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub explain: bool,
    pub items: Vec<SelItem>,
    pub from: FromClause,
    pub r#where: Option<WhereClause>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColDef {
    pub colname: ColName,
    pub coltype: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateStatement {
    pub explain: bool,
    pub tablename: String,
    pub coldefs: Vec<ColDef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub explain: bool,
    pub tablename: String,
    pub values: Vec<Constant>,
}

#[derive(Debug, Clone, PartialEq, EnumAsInner)]
pub enum Statement {
    Create(CreateStatement),
    Insert(InsertStatement),
    Select(SelectStatement),
}

impl Statement {
    pub fn explain(&self) -> bool {
        match self {
            Statement::Create(s) => s.explain,
            Statement::Insert(s) => s.explain,
            Statement::Select(s) => s.explain,
        }
    }
}
