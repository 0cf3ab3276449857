//! Detects the operation of raw SQL so untyped statements can still be tagged.

use crate::event::QueryOp;

/// Tags a statement by its leading keyword.
///
/// `WITH` is treated as a read. Anything outside the four tagged operations
/// (DDL, transaction control, `SET`, ...) stays untagged and is named from its
/// text by the hook.
pub fn detect_operation(sql: &str) -> Option<QueryOp> {
    let keyword = sql.split_whitespace().next()?;

    if keyword.eq_ignore_ascii_case("SELECT") || keyword.eq_ignore_ascii_case("WITH") {
        Some(QueryOp::Select)
    } else if keyword.eq_ignore_ascii_case("INSERT") {
        Some(QueryOp::Insert)
    } else if keyword.eq_ignore_ascii_case("UPDATE") {
        Some(QueryOp::Update)
    } else if keyword.eq_ignore_ascii_case("DELETE") {
        Some(QueryOp::Delete)
    } else {
        None
    }
}
