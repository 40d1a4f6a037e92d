//! Line-oriented helpers shared by the adapter output parsers
//!
//! Every helper here is lenient: lines that do not fit the expected shape are
//! dropped, never reported as errors.

use crate::utils::regex_cache::get_cached_regex;
use std::borrow::Cow;

const MULTI_SPACE: &str = r" {2,}";

/// Collapse runs of two or more spaces into one, the way fixed-width tables
/// are turned into splittable rows
pub fn collapse_spaces(line: &str) -> Cow<'_, str> {
    match get_cached_regex(MULTI_SPACE) {
        Ok(re) => re.replace_all(line, " "),
        Err(_) => Cow::Borrowed(line),
    }
}

/// Whitespace-separated columns of a fixed-width table row
pub fn table_columns(line: &str) -> Vec<String> {
    collapse_spaces(line.trim())
        .split(' ')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Rows of a dashed table: everything after the first line containing
/// `separator`, split into columns. Blank rows are skipped.
pub fn dashed_table_rows(lines: &[String], separator: &str) -> Vec<Vec<String>> {
    lines
        .iter()
        .skip_while(|l| !l.contains(separator))
        .skip(1)
        .filter(|l| !l.trim().is_empty())
        .map(|l| table_columns(l))
        .collect()
}

/// Split on `delimiter` and trim every field
pub fn split_trimmed(line: &str, delimiter: char) -> Vec<String> {
    line.split(delimiter).map(|s| s.trim().to_string()).collect()
}

pub fn is_false_token(tokens: &[&str], value: &str) -> bool {
    tokens.contains(&value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    #[test]
    fn test_collapse_spaces_keeps_single_spaces() {
        assert_eq!(collapse_spaces("a    b c  d"), "a b c d");
    }

    #[test]
    fn test_dashed_table_skips_header_and_blank_rows() {
        let output = lines(
            "Package    Version\n\
             ---------- -------\n\
             requests   2.31.0\n\
             \n\
             urllib3    2.0.7\n",
        );
        let rows = dashed_table_rows(&output, "----");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec!["requests", "2.31.0"]);
        assert_eq!(rows[1], vec!["urllib3", "2.0.7"]);
    }

    #[test]
    fn test_dashed_table_without_separator_is_empty() {
        let output = lines("nothing to see\nhere\n");
        assert!(dashed_table_rows(&output, "---").is_empty());
    }

    #[test]
    fn test_split_trimmed() {
        assert_eq!(
            split_trimmed(" foo | 1.0 | 2.0 ", '|'),
            vec!["foo", "1.0", "2.0"]
        );
    }
}
