// src/process/matrix.rs

/// Ordered rows of raw string cells. Rows may be ragged.
pub type Matrix = Vec<Vec<String>>;

/// Scan `text` into a [`Matrix`].
///
/// - `""` inside a quoted field is a literal quote; any other `"` toggles quoting.
/// - Outside quotes, `,` ends a cell and `\n`, `\r` or `\r\n` ends a row.
/// - An unterminated quote is not an error: the accumulated cell is flushed at EOF.
/// - Rows made only of empty or whitespace cells are dropped.
///
/// Cells are returned untrimmed.
pub fn parse_matrix(text: &str) -> Matrix {
    let mut rows: Matrix = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut cell = String::new();
    let mut in_quotes = false;

    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    cell.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => cell.push(c),
            }
            continue;
        }

        match c {
            '"' => in_quotes = true,
            ',' => row.push(std::mem::take(&mut cell)),
            '\n' | '\r' => {
                row.push(std::mem::take(&mut cell));
                rows.push(std::mem::take(&mut row));
                if c == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
            }
            _ => cell.push(c),
        }
    }

    if !cell.is_empty() || !row.is_empty() {
        row.push(cell);
        rows.push(row);
    }

    rows.retain(|r| !is_blank_row(r));
    rows
}

/// True when every cell is empty or whitespace.
pub fn is_blank_row(row: &[String]) -> bool {
    row.iter().all(|c| c.trim().is_empty())
}
