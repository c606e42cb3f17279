//! The one rewrite this crate's optimizer performs: for a statement shaped
//! as `π_cols(σ_p(t ⋈ u))` where predicate `p` references a column of
//! exactly one side of a natural join, push `p` down onto that side —
//! `π_cols((σ_p t) ⋈ u)` (or mirrored). Every other statement, and any
//! select whose predicate can't be attributed to a single side (or whose
//! `from` isn't a join at all), passes through unchanged.
//!
//! This operates directly on `crate::ast`'s `WhereClause`/`FromClause`
//! nodes: there is no separate relational-algebra IR stage in this crate,
//! so the AST itself plays that role for the one rewrite that needs it. The
//! code generator (`codegen`) reads the `Pushdown` this module computes to
//! decide which cursor's scan loop carries the filter.

use crate::ast;

/// Where (if anywhere) a select's `WHERE` predicate should be evaluated,
/// relative to a natural join's two sides.
#[derive(Debug, Clone, PartialEq)]
pub enum Pushdown<'a> {
    /// Not a join, no predicate, or the predicate can't be attributed to
    /// exactly one side (e.g. it names a column present on both, which is
    /// caught as ambiguous earlier and never reaches here; or there simply
    /// is no predicate to place).
    None,
    /// Evaluate while scanning the left (outer) table.
    Left(&'a ast::WhereClause),
    /// Evaluate while scanning the right (inner) table.
    Right(&'a ast::WhereClause),
}

/// Decides where `where_clause` (if any) should be evaluated for a select
/// over `from`. `left_columns`/`right_columns` are only consulted when
/// `from` is a natural join; for a single-table `from` the predicate always
/// stays where it is (codegen handles that case directly, without going
/// through this rewrite at all).
pub fn plan_pushdown<'a>(
    from: &ast::FromClause,
    where_clause: Option<&'a ast::WhereClause>,
    left_columns: &[String],
    right_columns: &[String],
) -> Pushdown<'a> {
    let w = match where_clause {
        Some(w) => w,
        None => return Pushdown::None,
    };
    if !matches!(from, ast::FromClause::NaturalJoin(_, _)) {
        return Pushdown::None;
    }
    let in_left = left_columns.iter().any(|c| c == &w.column.name);
    let in_right = right_columns.iter().any(|c| c == &w.column.name);
    match (in_left, in_right) {
        (true, false) => Pushdown::Left(w),
        (false, true) => Pushdown::Right(w),
        // Present on both sides (shared join column) or neither: not a
        // single-side rewrite. Ambiguity/unknown-column errors are raised by
        // codegen's own name resolution, not here.
        _ => Pushdown::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wc(col: &str) -> ast::WhereClause {
        ast::WhereClause {
            column: ast::ColName {
                name: col.to_string(),
            },
            op: ast::CmpOp::Gt,
            value: ast::Constant::Int(15),
        }
    }

    struct Case {
        desc: &'static str,
        from: ast::FromClause,
        where_clause: Option<ast::WhereClause>,
        left: Vec<String>,
        right: Vec<String>,
        expected_side: &'static str, // "none" | "left" | "right"
    }

    #[test]
    fn plans_pushdown_correctly() {
        let cases = vec![
            Case {
                desc: "no predicate passes through unchanged",
                from: ast::FromClause::NaturalJoin("t".into(), "u".into()),
                where_clause: None,
                left: vec!["a".into()],
                right: vec!["b".into()],
                expected_side: "none",
            },
            Case {
                desc: "predicate on left-only column pushes left",
                from: ast::FromClause::NaturalJoin("t".into(), "u".into()),
                where_clause: Some(wc("a")),
                left: vec!["id".into(), "a".into()],
                right: vec!["id".into(), "b".into()],
                expected_side: "left",
            },
            Case {
                desc: "predicate on right-only column pushes right",
                from: ast::FromClause::NaturalJoin("t".into(), "u".into()),
                where_clause: Some(wc("b")),
                left: vec!["id".into(), "a".into()],
                right: vec!["id".into(), "b".into()],
                expected_side: "right",
            },
            Case {
                desc: "predicate on shared join column is not rewritten",
                from: ast::FromClause::NaturalJoin("t".into(), "u".into()),
                where_clause: Some(wc("id")),
                left: vec!["id".into(), "a".into()],
                right: vec!["id".into(), "b".into()],
                expected_side: "none",
            },
            Case {
                desc: "single-table from is never rewritten",
                from: ast::FromClause::Table("t".into()),
                where_clause: Some(wc("a")),
                left: vec!["a".into()],
                right: vec![],
                expected_side: "none",
            },
        ];
        for case in cases {
            let got = plan_pushdown(&case.from, case.where_clause.as_ref(), &case.left, &case.right);
            let side = match got {
                Pushdown::None => "none",
                Pushdown::Left(_) => "left",
                Pushdown::Right(_) => "right",
            };
            assert_eq!(side, case.expected_side, "case: {}", case.desc);
        }
    }
}
