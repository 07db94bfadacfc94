//! Splits the text of one migration file into executable statements.
//!
//! `$$` delimits PostgreSQL function bodies and `DO` blocks. Semicolons
//! between a pair of `$$` tokens belong to the body and never end a
//! statement. Every `$$` sighting toggles the state, including ones that sit
//! inside string literals or comments; tagged quotes (`$body$`) are not
//! recognised.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Normal,
    InDollarQuote,
}

impl ScanState {
    fn toggled(self) -> Self {
        match self {
            ScanState::Normal => ScanState::InDollarQuote,
            ScanState::InDollarQuote => ScanState::Normal,
        }
    }
}

/// Split `sql` into trimmed, non-empty statements in file order.
///
/// The terminating `;` is not part of the returned text. Fragments made only
/// of blank lines and `--` comments are dropped, and a trailing fragment
/// without a `;` is still returned.
pub fn split_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut state = ScanState::Normal;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '$' if chars.peek() == Some(&'$') => {
                chars.next();
                current.push_str("$$");
                state = state.toggled();
            }
            ';' if state == ScanState::Normal => {
                push_statement(&mut statements, &current);
                current.clear();
            }
            _ => current.push(c),
        }
    }
    push_statement(&mut statements, &current);

    statements
}

fn push_statement(out: &mut Vec<String>, fragment: &str) {
    let trimmed = fragment.trim();
    if trimmed.is_empty() || is_comment_only(trimmed) {
        return;
    }
    out.push(trimmed.to_string());
}

/// True when every line of `fragment` is blank or a `--` comment.
pub fn is_comment_only(fragment: &str) -> bool {
    fragment.lines().all(|line| {
        let t = line.trim_start();
        t.is_empty() || t.starts_with("--")
    })
}
