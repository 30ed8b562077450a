//! Splits a batched SQL script into individual statements.

/// Split `script` on semicolons that sit outside quoted literals and comments.
///
/// Statements come back trimmed, in source order, without their terminating
/// semicolon. Segments holding only whitespace or comments are dropped.
pub fn split_statements(script: &str) -> Vec<String> {
    let bytes = script.as_bytes();
    let mut stmts = Vec::new();
    let mut start = 0;
    let mut has_code = false;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'\'' | b'"' | b'`') => {
                has_code = true;
                i = skip_quoted(bytes, i, quote);
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                i += 2;
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i < bytes.len() && !(bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/')) {
                    i += 1;
                }
                // Unterminated block comments run to the end of input.
                i = (i + 2).min(bytes.len());
            }
            b';' => {
                push_segment(&mut stmts, &script[start..i], has_code);
                has_code = false;
                i += 1;
                start = i;
            }
            b if b.is_ascii_whitespace() => i += 1,
            _ => {
                has_code = true;
                i += 1;
            }
        }
    }

    push_segment(&mut stmts, &script[start..], has_code);
    stmts
}

/// Return the index just past the literal opened at `open`. A doubled quote
/// character is an escaped quote and does not close the literal.
fn skip_quoted(bytes: &[u8], open: usize, quote: u8) -> usize {
    let mut i = open + 1;
    while i < bytes.len() {
        if bytes[i] == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

fn push_segment(stmts: &mut Vec<String>, segment: &str, has_code: bool) {
    let trimmed = segment.trim();
    if has_code && !trimmed.is_empty() {
        stmts.push(trimmed.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_split() {
        let stmts = split_statements("SELECT 1; SELECT 2;");
        assert_eq!(stmts, vec!["SELECT 1", "SELECT 2"]);
    }

    #[test]
    fn test_semicolons_in_literal_and_comment() {
        let stmts =
            split_statements("INSERT INTO t VALUES ('a;b'); -- c;d\nINSERT INTO t VALUES (2);");
        assert_eq!(stmts.len(), 2);
        assert_eq!(stmts[0], "INSERT INTO t VALUES ('a;b')");
        assert!(stmts[1].ends_with("INSERT INTO t VALUES (2)"));
    }

    #[test]
    fn test_escaped_quotes() {
        let stmts = split_statements("INSERT INTO t VALUES ('it''s; fine'); SELECT 1");
        assert_eq!(stmts, vec!["INSERT INTO t VALUES ('it''s; fine')", "SELECT 1"]);
    }

    #[test]
    fn test_double_and_backtick_quotes() {
        let stmts = split_statements("SELECT \"a;b\" FROM `t;1`; SELECT 2");
        assert_eq!(stmts, vec!["SELECT \"a;b\" FROM `t;1`", "SELECT 2"]);
    }

    #[test]
    fn test_block_comment() {
        let stmts = split_statements("/* one; two */ SELECT 1; /* trailing; */");
        assert_eq!(stmts, vec!["/* one; two */ SELECT 1"]);
    }

    #[test]
    fn test_empty_and_whitespace() {
        assert!(split_statements("").is_empty());
        assert!(split_statements("  ;\n ;\t").is_empty());
        assert!(split_statements("-- only a comment;\n").is_empty());
    }

    #[test]
    fn test_no_trailing_semicolon() {
        let stmts = split_statements("CREATE TABLE a (id INTEGER);\nCREATE TABLE b (id INTEGER)");
        assert_eq!(stmts.len(), 2);
        assert_eq!(stmts[1], "CREATE TABLE b (id INTEGER)");
    }

    #[test]
    fn test_unterminated_literal_is_kept_whole() {
        let stmts = split_statements("SELECT 'open; still open");
        assert_eq!(stmts, vec!["SELECT 'open; still open"]);
    }
}
