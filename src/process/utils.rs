use std::cmp::Ordering;

/// Parse a French-formatted number such as `"1 000,50 %"`, `"120 €"` or
/// `"-1,74 %"`.
///
/// Whitespace (including non-breaking spaces), `%`, `€` and `$` are removed,
/// the first `,` becomes the decimal point and the longest numeric prefix is
/// read. Returns `None` when no number can be read.
pub fn parse_locale_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '\u{a0}' | '%' | '€' | '$'))
        .collect();
    let cleaned = cleaned.replacen(',', ".", 1);
    numeric_prefix(&cleaned)?.parse::<f64>().ok()
}

/// Like [`parse_locale_number`] but treats anything unreadable as zero.
pub fn locale_number_or_zero(raw: &str) -> f64 {
    parse_locale_number(raw).unwrap_or(0.0)
}

fn numeric_prefix(s: &str) -> Option<&str> {
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if frac_end > frac_start || digits > 0 {
            end = frac_end;
        }
    }
    (digits > 0).then(|| &s[..end])
}

/// A bare non-negative integer: digits only, nothing else.
pub fn is_bare_integer(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

pub fn has_digit(s: &str) -> bool {
    s.bytes().any(|b| b.is_ascii_digit())
}

/// Compare two cell values the way a spreadsheet user expects: when both
/// carry a readable number they compare numerically, otherwise they compare
/// as text with embedded digit runs ordered by value.
pub fn compare_cells(a: &str, b: &str) -> Ordering {
    if has_digit(a) && has_digit(b) {
        if let (Some(x), Some(y)) = (parse_locale_number(a), parse_locale_number(b)) {
            return x.partial_cmp(&y).unwrap_or(Ordering::Equal);
        }
    }
    natural_cmp(a, b)
}

/// Case-insensitive comparison where runs of ASCII digits compare numerically.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut xs = a.chars().peekable();
    let mut ys = b.chars().peekable();
    loop {
        match (xs.peek().copied(), ys.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let nx = take_digits(&mut xs);
                let ny = take_digits(&mut ys);
                let ord = compare_digit_runs(&nx, &ny);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(x), Some(y)) => {
                let ord = fold_char(x).cmp(&fold_char(y));
                if ord != Ordering::Equal {
                    return ord;
                }
                xs.next();
                ys.next();
            }
        }
    }
}

fn take_digits(it: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut out = String::new();
    while let Some(c) = it.peek().copied().filter(char::is_ascii_digit) {
        out.push(c);
        it.next();
    }
    out
}

fn compare_digit_runs(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Lowercase and strip the common French accents so `é` sorts beside `e`.
pub fn fold_char(c: char) -> char {
    match c {
        'à' | 'â' | 'ä' | 'À' | 'Â' | 'Ä' => 'a',
        'é' | 'è' | 'ê' | 'ë' | 'É' | 'È' | 'Ê' | 'Ë' => 'e',
        'î' | 'ï' | 'Î' | 'Ï' => 'i',
        'ô' | 'ö' | 'Ô' | 'Ö' => 'o',
        'ù' | 'û' | 'ü' | 'Ù' | 'Û' | 'Ü' => 'u',
        'ç' | 'Ç' => 'c',
        _ => c.to_lowercase().next().unwrap_or(c),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_french_formats() {
        assert_eq!(parse_locale_number("1 000,50"), Some(1000.5));
        assert_eq!(parse_locale_number("1\u{a0}200,00 %"), Some(1200.0));
        assert_eq!(parse_locale_number("-1,74 %"), Some(-1.74));
        assert_eq!(parse_locale_number("120 €"), Some(120.0));
        assert_eq!(parse_locale_number("12.5%"), Some(12.5));
        assert_eq!(parse_locale_number(",5"), Some(0.5));
    }

    #[test]
    fn reads_numeric_prefix_only() {
        assert_eq!(parse_locale_number("12abc"), Some(12.0));
        assert_eq!(parse_locale_number("abc"), None);
        assert_eq!(parse_locale_number(""), None);
        assert_eq!(parse_locale_number("-"), None);
        assert_eq!(locale_number_or_zero("n/a"), 0.0);
    }

    #[test]
    fn bare_integer() {
        assert!(is_bare_integer("10"));
        assert!(is_bare_integer("007"));
        assert!(!is_bare_integer(""));
        assert!(!is_bare_integer("-1"));
        assert!(!is_bare_integer("1.5"));
        assert!(!is_bare_integer("Rang"));
    }

    #[test]
    fn numbers_compare_by_value() {
        assert_eq!(compare_cells("9", "10"), Ordering::Less);
        assert_eq!(compare_cells("1 000,00", "999"), Ordering::Greater);
        assert_eq!(compare_cells("-3,45 %", "11,54 %"), Ordering::Less);
    }

    #[test]
    fn text_compares_naturally() {
        assert_eq!(compare_cells("Nike", "adidas"), Ordering::Greater);
        assert_eq!(natural_cmp("Rayon 2", "Rayon 10"), Ordering::Less);
        assert_eq!(natural_cmp("Équipement", "Evolution"), Ordering::Less);
        assert_eq!(natural_cmp("abc", "abc"), Ordering::Equal);
        assert_eq!(compare_cells("", "Textile"), Ordering::Less);
    }
}
