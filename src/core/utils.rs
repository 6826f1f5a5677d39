//! Small shared helpers: filename escaping and display formatting.

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Makes a media title safe to use as a filename.
///
/// Path separators and Windows-reserved characters become underscores,
/// double quotes become single quotes, control characters are dropped to
/// underscores, and leading/trailing dots and whitespace are trimmed.
///
/// # Example
///
/// ```
/// use downline::core::utils::escape_filename;
///
/// assert_eq!(escape_filename("AC/DC: Live"), "AC_DC_ Live");
/// assert_eq!(escape_filename("  ...  "), "unnamed");
/// ```
pub fn escape_filename(filename: &str) -> String {
    let mut result = String::with_capacity(filename.len());

    for c in filename.chars() {
        match c {
            '/' | '\\' => result.push('_'),
            ':' | '*' | '?' | '<' | '>' | '|' => result.push('_'),
            '"' => result.push('\''),
            c if c.is_control() => result.push('_'),
            _ => result.push(c),
        }
    }

    // Leading/trailing dots and spaces are a problem on Windows
    let result = result.trim_matches(|c: char| c.is_whitespace() || c == '.');

    if result.is_empty() {
        "unnamed".to_string()
    } else {
        result.to_string()
    }
}

/// Formats a byte count as megabytes for table display, e.g. `"12.34 MB"`.
pub fn format_size(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / BYTES_PER_MB)
}

/// Formats a transfer rate as `"1.25 MB/s"`.
pub fn format_speed(bytes_per_sec: f64) -> String {
    format!("{:.2} MB/s", bytes_per_sec / BYTES_PER_MB)
}
