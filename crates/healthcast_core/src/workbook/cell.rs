//! A1-style cell addressing and sheet-name rules

/// Longest sheet name spreadsheet applications accept
pub const MAX_SHEET_NAME_LEN: usize = 31;

/// Last column in the format (`XFD`), zero-based
pub const MAX_COLUMN: usize = 16_383;

/// Stand-in for a name with nothing left after cleaning
pub const DEFAULT_SHEET_NAME: &str = "Sheet";

const INVALID_SHEET_CHARS: &[char] = &['[', ']', ':', '*', '?', '/', '\\'];

/// Column letters for a zero-based index: 0 → `A`, 25 → `Z`, 26 → `AA`
#[must_use]
pub fn column_name(index: usize) -> String {
    let mut letters = Vec::new();
    let mut n = index + 1;
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Zero-based column of a reference such as `B7` or `AA12`
#[must_use]
pub fn column_index(reference: &str) -> Option<usize> {
    let mut col = 0usize;
    let mut seen = false;
    for c in reference.chars().take_while(char::is_ascii_alphabetic) {
        col = col * 26 + usize::from(c.to_ascii_uppercase() as u8 - b'A') + 1;
        if col > MAX_COLUMN + 1 {
            return None;
        }
        seen = true;
    }
    seen.then(|| col - 1)
}

/// `A1`-style reference for a zero-based column and one-based row
#[must_use]
pub fn cell_ref(column: usize, row: usize) -> String {
    format!("{}{row}", column_name(column))
}

/// Replace characters the format forbids with `_` and cut to 31 characters.
/// A blank name becomes [`DEFAULT_SHEET_NAME`]. Distinct names may collide
/// after truncation.
#[must_use]
pub fn sanitize_sheet_name(name: &str) -> String {
    let clean: String = name
        .chars()
        .map(|c| if INVALID_SHEET_CHARS.contains(&c) { '_' } else { c })
        .take(MAX_SHEET_NAME_LEN)
        .collect();
    if clean.trim().is_empty() {
        DEFAULT_SHEET_NAME.to_string()
    } else {
        clean
    }
}
