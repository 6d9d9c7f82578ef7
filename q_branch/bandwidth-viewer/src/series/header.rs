//! Column labels from the companion header file.
//!
//! The logger keeps the header separate from the data so new devices can be
//! appended without rewriting the log. Its single line looks like
//! `,aa:bb:cc:dd:ee:ff,11:22:33:44:55:66,` - an empty timestamp cell, one
//! hardware address per data column, and a trailing delimiter.

/// Hardware address per data column, in column order.
pub fn parse_header(text: &str) -> Vec<String> {
    let Some(line) = text.lines().find(|l| !l.trim().is_empty()) else {
        return Vec::new();
    };

    let mut cells: Vec<&str> = line.split(',').skip(1).collect();
    if cells.last().is_some_and(|c| c.trim().is_empty()) {
        cells.pop();
    }
    cells.into_iter().map(|c| c.trim().to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_with_trailing_delimiter() {
        assert_eq!(
            parse_header(",aa:bb:cc:dd:ee:ff,11:22:33:44:55:66,\n"),
            vec!["aa:bb:cc:dd:ee:ff", "11:22:33:44:55:66"]
        );
    }

    #[test]
    fn test_header_crlf_and_leading_blank_lines() {
        assert_eq!(parse_header("\n,aa,bb,\r\n"), vec!["aa", "bb"]);
    }

    #[test]
    fn test_empty_header() {
        assert!(parse_header("").is_empty());
        assert!(parse_header(",\n").is_empty());
    }
}
