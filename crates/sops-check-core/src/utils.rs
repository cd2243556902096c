//! Text helpers shared by the formatters.

/// Indents every non-empty line of `s` by `count` spaces.
///
/// Lines consisting only of a line break are left alone. With
/// `indent_first` set to `false` the first line is not indented, which lets
/// callers continue a line that already carries a prefix such as `"1) "`.
///
/// # Example
///
/// ```
/// use sops_check_core::utils::indent;
///
/// assert_eq!(indent("a\n\nb\n", 2, true), "  a\n\n  b\n");
/// assert_eq!(indent("a\nb", 2, false), "a\n  b");
/// ```
#[must_use]
pub fn indent(s: &str, count: usize, indent_first: bool) -> String {
    if count == 0 || s.is_empty() {
        return s.to_string();
    }

    let pad = " ".repeat(count);
    let mut out = String::with_capacity(s.len() + count);

    for (i, line) in s.split_inclusive('\n').enumerate() {
        // Only indent non-empty lines.
        if line != "\n" && line != "\r\n" && (i != 0 || indent_first) {
            out.push_str(&pad);
        }
        out.push_str(line);
    }

    out
}
