//! Miscellaneous formatting tools for numbers, byte counts and ratios.
//!
//! Used by `Display` implementations and log lines all over the ScopeTrace
//! crates; nothing in here is performance sensitive.

// ---

/// Format a count with thousands separators for readability.
pub fn format_uint(number: u64) -> String {
    let number = number.to_string();
    let mut chars = number.chars().rev().peekable();

    let mut result = vec![];
    while chars.peek().is_some() {
        if !result.is_empty() {
            // thousands-deliminator:
            let thin_space = '\u{2009}'; // https://en.wikipedia.org/wiki/Thin_space
            result.push(thin_space);
        }
        for _ in 0..3 {
            if let Some(c) = chars.next() {
                result.push(c);
            }
        }
    }

    result.reverse();
    result.into_iter().collect()
}

#[test]
fn test_format_uint() {
    assert_eq!(format_uint(42), "42");
    assert_eq!(format_uint(999), "999");
    assert_eq!(format_uint(1_000), "1\u{2009}000");
    assert_eq!(format_uint(123_456), "123\u{2009}456");
    assert_eq!(format_uint(1_234_567), "1\u{2009}234\u{2009}567");
}

// ---

/// Pretty format a byte count, e.g. `1.2 MB`.
pub fn format_bytes(number_of_bytes: f64) -> String {
    if number_of_bytes < 0.0 {
        return format!("-{}", format_bytes(-number_of_bytes));
    }

    if number_of_bytes < 1000.0 {
        format!("{number_of_bytes:.0} B")
    } else if number_of_bytes < 1_000_000.0 {
        let decimals = (number_of_bytes < 10_000.0) as usize;
        format!("{:.*} kB", decimals, number_of_bytes / 1_000.0)
    } else if number_of_bytes < 1_000_000_000.0 {
        let decimals = (number_of_bytes < 10_000_000.0) as usize;
        format!("{:.*} MB", decimals, number_of_bytes / 1_000_000.0)
    } else {
        let decimals = (number_of_bytes < 10_000_000_000.0) as usize;
        format!("{:.*} GB", decimals, number_of_bytes / 1_000_000_000.0)
    }
}

#[test]
fn test_format_bytes() {
    assert_eq!(format_bytes(123.0), "123 B");
    assert_eq!(format_bytes(12_345.0), "12 kB");
    assert_eq!(format_bytes(1_234_567.0), "1.2 MB");
    assert_eq!(format_bytes(123_456_789.0), "123 MB");
    assert_eq!(format_bytes(-500.0), "-500 B");
}

// ---

/// Format a float with a sensible number of decimals, for log lines.
pub fn format_f64(value: f64) -> String {
    let decimals = if value.fract() == 0.0 { 0 } else { 3 };
    format!("{value:.decimals$}")
}

#[test]
fn test_format_f64() {
    assert_eq!(format_f64(1.0), "1");
    assert_eq!(format_f64(0.9), "0.900");
    assert_eq!(format_f64(12.345_678), "12.346");
}
