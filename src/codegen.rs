//! Lowers a parsed, optimized `ast::Statement` into a `dbm::Program`: fixed
//! instruction skeletons per statement kind. All name/type resolution
//! against the schema happens here, before any bytecode runs — an unknown
//! table/column or a type mismatch is reported as `invalid-sql` at this
//! stage, never at `step` time.

use crate::ast;
use crate::dbm::{Instr, Opcode, Program};
use crate::optimizer::{self, Pushdown};
use crate::schema::{ColType, Schema, TableSchema, SCHEMA_ROOT};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid SQL: {0}")]
    InvalidSql(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// One output column's name and type, as determined at codegen time.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultColumn {
    pub name: String,
    pub coltype: ColType,
}

pub struct Generated {
    pub program: Program,
    pub columns: Vec<ResultColumn>,
}

pub fn generate(schema: &Schema, stmt: &ast::Statement) -> Result<Generated> {
    match stmt {
        ast::Statement::Create(cs) => Ok(Generated {
            program: generate_create(schema, cs)?,
            columns: vec![],
        }),
        ast::Statement::Insert(ins) => Ok(Generated {
            program: generate_insert(schema, ins)?,
            columns: vec![],
        }),
        ast::Statement::Select(ss) => generate_select(schema, ss),
    }
}

fn i(op: Opcode, p1: i64, p2: i64, p3: i64) -> Instr {
    Instr::new(op, p1, p2, p3, None)
}

fn s(op: Opcode, p1: i64, p2: i64, p3: i64, text: &str) -> Instr {
    Instr::new(op, p1, p2, p3, Some(text.to_string()))
}

fn emit_const(c: &ast::Constant, reg: i64) -> Result<Instr> {
    match c {
        ast::Constant::Int(v) => Ok(i(Opcode::Integer, *v, reg, 0)),
        ast::Constant::String(v) => Ok(s(Opcode::String, 0, reg, 0, v)),
        ast::Constant::Real(_) => Err(Error::InvalidSql(
            "floating-point literals are not a supported column type".into(),
        )),
    }
}

fn render_create_sql(cs: &ast::CreateStatement) -> String {
    let cols: Vec<String> = cs
        .coldefs
        .iter()
        .map(|c| format!("{} {}", c.colname.name, c.coltype))
        .collect();
    format!("CREATE TABLE {} ({})", cs.tablename, cols.join(", "))
}

fn generate_create(schema: &Schema, cs: &ast::CreateStatement) -> Result<Program> {
    if schema.table(&cs.tablename).is_some() {
        return Err(Error::InvalidSql(format!("table {} already exists", cs.tablename)));
    }
    for cd in &cs.coldefs {
        if ColType::parse(&cd.coltype).is_none() {
            return Err(Error::InvalidSql(format!(
                "column {} has unsupported type {}",
                cd.colname.name, cd.coltype
            )));
        }
    }

    let sql_text = render_create_sql(cs);
    let next_key = schema.user_table_count() as i64 + 1;

    Ok(vec![
        i(Opcode::Integer, SCHEMA_ROOT as i64, 0, 0),
        i(Opcode::OpenWrite, 0, 0, 5),
        i(Opcode::CreateTable, 4, 0, 0),
        s(Opcode::String, 0, 1, 0, "table"),
        s(Opcode::String, 0, 2, 0, &cs.tablename),
        s(Opcode::String, 0, 3, 0, &cs.tablename),
        s(Opcode::String, 0, 5, 0, &sql_text),
        i(Opcode::MakeRecord, 1, 5, 6),
        i(Opcode::Integer, next_key, 7, 0),
        i(Opcode::Insert, 0, 6, 7),
        i(Opcode::Close, 0, 0, 0),
        i(Opcode::Halt, 0, 0, 0),
    ])
}

fn check_value_type(c: &ast::Constant, coltype: ColType) -> Result<()> {
    let ok = matches!(
        (c, coltype),
        (ast::Constant::Int(_), ColType::Integer) | (ast::Constant::String(_), ColType::Text)
    );
    if ok {
        Ok(())
    } else {
        Err(Error::InvalidSql(format!("value {c} does not match column type")))
    }
}

fn generate_insert(schema: &Schema, ins: &ast::InsertStatement) -> Result<Program> {
    let table = schema
        .table(&ins.tablename)
        .ok_or_else(|| Error::InvalidSql(format!("no such table: {}", ins.tablename)))?;
    let k = table.columns.len();
    if ins.values.len() != k {
        return Err(Error::InvalidSql(format!(
            "table {} has {} columns, {} values supplied",
            ins.tablename,
            k,
            ins.values.len()
        )));
    }
    for (v, col) in ins.values.iter().zip(&table.columns) {
        check_value_type(v, col.coltype)?;
    }

    let mut prog = vec![
        i(Opcode::Integer, table.root as i64, 0, 0),
        i(Opcode::OpenWrite, 0, 0, k as i64),
        emit_const(&ins.values[0], 1)?,
        i(Opcode::Null, 0, 2, 0),
    ];
    for (idx, v) in ins.values[1..].iter().enumerate() {
        prog.push(emit_const(v, 3 + idx as i64)?);
    }
    let record_reg = (2 + k) as i64;
    prog.push(i(Opcode::MakeRecord, 2, k as i64, record_reg));
    prog.push(i(Opcode::Insert, 0, record_reg, 1));
    prog.push(i(Opcode::Close, 0, 0, 0));
    prog.push(i(Opcode::Halt, 0, 0, 0));
    Ok(prog)
}

fn resolve_items(items: &[ast::SelItem], table: &TableSchema) -> Result<Vec<usize>> {
    if items.iter().any(|it| matches!(it, ast::SelItem::Star)) {
        return Ok((0..table.columns.len()).collect());
    }
    items
        .iter()
        .map(|it| match it {
            ast::SelItem::ColName(c) => table
                .column_index(&c.name)
                .ok_or_else(|| Error::InvalidSql(format!("no such column: {}", c.name))),
            ast::SelItem::Star => unreachable!(),
        })
        .collect()
}

fn cmp_opcode(op: ast::CmpOp) -> Opcode {
    match op {
        ast::CmpOp::Eq => Opcode::Eq,
        ast::CmpOp::Ne => Opcode::Ne,
        ast::CmpOp::Lt => Opcode::Lt,
        ast::CmpOp::Le => Opcode::Le,
        ast::CmpOp::Gt => Opcode::Gt,
        ast::CmpOp::Ge => Opcode::Ge,
    }
}

fn seek_opcode(op: ast::CmpOp) -> Opcode {
    match op {
        ast::CmpOp::Eq => Opcode::Seek,
        ast::CmpOp::Ne => Opcode::Seek, // Ne on a PK is never produced by this grammar's WHERE clause path in practice; fall back to exact seek.
        ast::CmpOp::Lt => Opcode::SeekLt,
        ast::CmpOp::Le => Opcode::SeekLe,
        ast::CmpOp::Gt => Opcode::SeekGt,
        ast::CmpOp::Ge => Opcode::SeekGe,
    }
}

/// `true` for the two comparators whose seek walks backwards (descending).
fn seek_is_reverse(op: ast::CmpOp) -> bool {
    matches!(op, ast::CmpOp::Lt | ast::CmpOp::Le)
}

fn output_columns(cols: &[usize], table: &TableSchema) -> Vec<ResultColumn> {
    cols.iter()
        .map(|&idx| ResultColumn {
            name: table.columns[idx].name.clone(),
            coltype: table.columns[idx].coltype,
        })
        .collect()
}

/// Emits the row-body output instructions (`Key`/`Column` into consecutive
/// registers from `base`, then `ResultRow`) for cursor `cursor_id`.
fn emit_row_output(prog: &mut Program, cursor_id: i64, cols: &[usize], base: i64) {
    for (off, &col) in cols.iter().enumerate() {
        let dest = base + off as i64;
        if col == 0 {
            prog.push(i(Opcode::Key, cursor_id, dest, 0));
        } else {
            prog.push(i(Opcode::Column, cursor_id, col as i64, dest));
        }
    }
    prog.push(i(Opcode::ResultRow, base, cols.len() as i64, 0));
}

fn generate_select(schema: &Schema, ss: &ast::SelectStatement) -> Result<Generated> {
    match &ss.from {
        ast::FromClause::Table(name) => generate_select_single(schema, ss, name),
        ast::FromClause::NaturalJoin(left, right) => generate_select_join(schema, ss, left, right),
    }
}

fn generate_select_single(schema: &Schema, ss: &ast::SelectStatement, table_name: &str) -> Result<Generated> {
    let table = schema
        .table(table_name)
        .ok_or_else(|| Error::InvalidSql(format!("no such table: {table_name}")))?;
    let cols = resolve_items(&ss.items, table)?;
    let columns = output_columns(&cols, table);

    let mut prog = vec![
        i(Opcode::Integer, table.root as i64, 0, 0),
        i(Opcode::OpenRead, 0, 0, table.columns.len() as i64),
    ];
    let rewind_idx = prog.len();
    prog.push(i(Opcode::Rewind, 0, 0, 0));

    let Some(w) = &ss.r#where else {
        let out_base = 1;
        let loop_start = prog.len() as i64;
        emit_row_output(&mut prog, 0, &cols, out_base);
        return finish_single_select(prog, rewind_idx, None, loop_start, Some(Opcode::Next), columns, None);
    };

    let pred_col = table
        .column_index(&w.column.name)
        .ok_or_else(|| Error::InvalidSql(format!("no such column: {}", w.column.name)))?;
    check_value_type(&w.value, table.columns[pred_col].coltype)?;

    if pred_col == 0 {
        // Predicate on the primary key: seek directly, no per-row test.
        let ast::Constant::Int(key) = &w.value else {
            return Err(Error::InvalidSql(
                "primary key predicate must compare against an integer".into(),
            ));
        };
        prog.push(i(Opcode::Integer, *key, 1, 0));
        let seek_idx = prog.len();
        prog.push(i(seek_opcode(w.op), 0, 0, 1));
        // Eq seeks at most one row, so there is nothing left to advance to;
        // any other comparator keeps scanning in the seek's direction.
        let advance_op = match w.op {
            ast::CmpOp::Eq => None,
            _ if seek_is_reverse(w.op) => Some(Opcode::Prev),
            _ => Some(Opcode::Next),
        };
        let out_base = 2;
        let loop_start = prog.len() as i64;
        emit_row_output(&mut prog, 0, &cols, out_base);
        finish_single_select(prog, rewind_idx, Some(seek_idx), loop_start, advance_op, columns, None)
    } else {
        prog.push(emit_const(&w.value, 1)?);
        let scratch = 2;
        let out_base = 3;
        let loop_start = prog.len() as i64;
        prog.push(i(Opcode::Column, 0, pred_col as i64, scratch));
        let skip_idx = prog.len();
        prog.push(i(cmp_opcode(w.op.negate()), 1, 0, scratch));
        emit_row_output(&mut prog, 0, &cols, out_base);
        finish_single_select(prog, rewind_idx, None, loop_start, Some(Opcode::Next), columns, Some(skip_idx))
    }
}

/// Emits the `Next`/`Prev` advance (if any) back to `loop_start`, the
/// `Close`/`Halt` epilogue, and patches the forward jump targets collected
/// while building the row body: `rewind_idx`'s empty-tree jump and an
/// optional PK-seek miss jump land on the epilogue's `Close`; an optional
/// per-row predicate-skip jump lands on the advance op (or, if there is no
/// advance op, on the epilogue).
fn finish_single_select(
    mut prog: Program,
    rewind_idx: usize,
    seek_idx: Option<usize>,
    loop_start: i64,
    advance_op: Option<Opcode>,
    columns: Vec<ResultColumn>,
    skip_idx: Option<usize>,
) -> Result<Generated> {
    let advance_idx = advance_op.map(|op| {
        let idx = prog.len();
        prog.push(i(op, 0, loop_start, 0));
        idx
    });
    let end = prog.len() as i64;
    prog.push(i(Opcode::Close, 0, 0, 0));
    prog.push(i(Opcode::Halt, 0, 0, 0));

    prog[rewind_idx].p2 = end;
    if let Some(idx) = seek_idx {
        prog[idx].p2 = end;
    }
    if let Some(idx) = skip_idx {
        // Skipping a row falls through to the advance op that follows the
        // row body, or straight to the epilogue if there is none.
        prog[idx].p2 = advance_idx.unwrap_or(end as usize) as i64;
    }

    Ok(Generated { program: prog, columns })
}

fn generate_select_join(
    schema: &Schema,
    ss: &ast::SelectStatement,
    left_name: &str,
    right_name: &str,
) -> Result<Generated> {
    let left = schema
        .table(left_name)
        .ok_or_else(|| Error::InvalidSql(format!("no such table: {left_name}")))?;
    let right = schema
        .table(right_name)
        .ok_or_else(|| Error::InvalidSql(format!("no such table: {right_name}")))?;

    let left_names: Vec<String> = left.columns.iter().map(|c| c.name.clone()).collect();
    let right_names: Vec<String> = right.columns.iter().map(|c| c.name.clone()).collect();

    let items_resolved: Vec<(bool, usize)> = if ss.items.iter().any(|it| matches!(it, ast::SelItem::Star)) {
        (0..left.columns.len())
            .map(|idx| (true, idx))
            .chain((0..right.columns.len()).map(|idx| (false, idx)))
            .collect()
    } else {
        ss.items
            .iter()
            .map(|it| match it {
                ast::SelItem::ColName(c) => {
                    let in_left = left.column_index(&c.name);
                    let in_right = right.column_index(&c.name);
                    match (in_left, in_right) {
                        (Some(i), None) => Ok((true, i)),
                        (None, Some(i)) => Ok((false, i)),
                        (Some(_), Some(_)) => {
                            Err(Error::InvalidSql(format!("column {} is ambiguous", c.name)))
                        }
                        (None, None) => Err(Error::InvalidSql(format!("no such column: {}", c.name))),
                    }
                }
                ast::SelItem::Star => unreachable!(),
            })
            .collect::<Result<_>>()?
    };

    let columns: Vec<ResultColumn> = items_resolved
        .iter()
        .map(|&(is_left, idx)| {
            let t = if is_left { left } else { right };
            ResultColumn {
                name: t.columns[idx].name.clone(),
                coltype: t.columns[idx].coltype,
            }
        })
        .collect();

    let shared: Vec<(usize, usize)> = left_names
        .iter()
        .enumerate()
        .filter_map(|(li, name)| right_names.iter().position(|r| r == name).map(|ri| (li, ri)))
        .collect();

    let pushdown = optimizer::plan_pushdown(&ss.from, ss.r#where.as_ref(), &left_names, &right_names);

    let mut prog = vec![
        i(Opcode::Integer, left.root as i64, 0, 0),
        i(Opcode::OpenRead, 0, 0, left.columns.len() as i64),
        i(Opcode::Integer, right.root as i64, 2, 0),
        i(Opcode::OpenRead, 1, 2, right.columns.len() as i64),
    ];
    let outer_rewind_idx = prog.len();
    prog.push(i(Opcode::Rewind, 0, 0, 0));

    // Scratch register layout: R3 = literal (if any predicate), R4 = scratch
    // column value for predicate/join-column comparisons, output registers
    // start at R5.
    const LITERAL_REG: i64 = 3;
    const SCRATCH_REG: i64 = 4;
    const OUT_BASE: i64 = 5;

    if let Pushdown::Left(w) = &pushdown {
        prog.push(emit_const(&w.value, LITERAL_REG)?);
    }

    let outer_loop_start = prog.len() as i64;
    let mut outer_skip_idx = None;
    if let Pushdown::Left(w) = &pushdown {
        let col = left.column_index(&w.column.name).expect("pushdown resolved this column on the left");
        prog.push(i(Opcode::Column, 0, col as i64, SCRATCH_REG));
        outer_skip_idx = Some(prog.len());
        prog.push(i(cmp_opcode(w.op.negate()), LITERAL_REG, 0, SCRATCH_REG));
    }

    let inner_rewind_idx = prog.len();
    prog.push(i(Opcode::Rewind, 1, 0, 0));

    if let Pushdown::Right(w) = &pushdown {
        prog.push(emit_const(&w.value, LITERAL_REG)?);
    }

    let inner_loop_start = prog.len() as i64;
    let mut inner_skip_idx = None;
    if let Pushdown::Right(w) = &pushdown {
        let col = right.column_index(&w.column.name).expect("pushdown resolved this column on the right");
        prog.push(i(Opcode::Column, 1, col as i64, SCRATCH_REG));
        inner_skip_idx = Some(prog.len());
        prog.push(i(cmp_opcode(w.op.negate()), LITERAL_REG, 0, SCRATCH_REG));
    }

    let mut join_skip_idxs = Vec::new();
    for &(li, ri) in &shared {
        if li == 0 {
            prog.push(i(Opcode::Key, 0, SCRATCH_REG, 0));
        } else {
            prog.push(i(Opcode::Column, 0, li as i64, SCRATCH_REG));
        }
        if ri == 0 {
            prog.push(i(Opcode::Key, 1, SCRATCH_REG + 1, 0));
        } else {
            prog.push(i(Opcode::Column, 1, ri as i64, SCRATCH_REG + 1));
        }
        join_skip_idxs.push(prog.len());
        prog.push(i(cmp_opcode(ast::CmpOp::Ne), SCRATCH_REG, 0, SCRATCH_REG + 1));
    }

    for (off, &(is_left, idx)) in items_resolved.iter().enumerate() {
        let dest = OUT_BASE + off as i64;
        let cursor_id = if is_left { 0 } else { 1 };
        if is_left && idx == 0 {
            prog.push(i(Opcode::Key, cursor_id, dest, 0));
        } else if !is_left && idx == 0 {
            prog.push(i(Opcode::Key, cursor_id, dest, 0));
        } else {
            prog.push(i(Opcode::Column, cursor_id, idx as i64, dest));
        }
    }
    prog.push(i(Opcode::ResultRow, OUT_BASE, items_resolved.len() as i64, 0));

    let inner_next_idx = prog.len();
    prog.push(i(Opcode::Next, 1, inner_loop_start, 0));
    let inner_end = prog.len() as i64;
    let outer_next_idx = prog.len();
    prog.push(i(Opcode::Next, 0, outer_loop_start, 0));
    let outer_end = prog.len() as i64;
    prog.push(i(Opcode::Close, 1, 0, 0));
    prog.push(i(Opcode::Close, 0, 0, 0));
    prog.push(i(Opcode::Halt, 0, 0, 0));

    prog[outer_rewind_idx].p2 = outer_end;
    prog[inner_rewind_idx].p2 = inner_end;
    if let Some(idx) = outer_skip_idx {
        prog[idx].p2 = outer_next_idx as i64;
    }
    if let Some(idx) = inner_skip_idx {
        prog[idx].p2 = inner_next_idx as i64;
    }
    for idx in join_skip_idxs {
        prog[idx].p2 = inner_next_idx as i64;
    }

    Ok(Generated { program: prog, columns })
}
