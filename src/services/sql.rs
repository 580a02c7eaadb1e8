//! SQL statement splitting
//!
//! Splits a migration file into individual statements at top-level semicolons.
//! Semicolons inside single-quoted literals, double-quoted identifiers,
//! dollar-quoted bodies and comments do not terminate a statement, so function
//! bodies and string data survive intact. Fragments that contain nothing but
//! whitespace and comments are discarded.

/// Split SQL text into executable statements, in file order.
pub fn split_statements(sql: &str) -> Vec<String> {
    let chars: Vec<char> = sql.chars().collect();
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut has_token = false;
    let mut i = 0;

    let flush = |current: &mut String, has_token: &mut bool, statements: &mut Vec<String>| {
        let stmt = current.trim();
        if *has_token && !stmt.is_empty() {
            statements.push(stmt.to_string());
        }
        current.clear();
        *has_token = false;
    };

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\'' => {
                has_token = true;
                current.push(c);
                i += 1;
                while i < chars.len() {
                    current.push(chars[i]);
                    if chars[i] == '\'' {
                        // '' is an escaped quote, not a terminator
                        if chars.get(i + 1) == Some(&'\'') {
                            current.push('\'');
                            i += 2;
                            continue;
                        }
                        i += 1;
                        break;
                    }
                    i += 1;
                }
            }
            '"' => {
                has_token = true;
                current.push(c);
                i += 1;
                while i < chars.len() {
                    current.push(chars[i]);
                    if chars[i] == '"' {
                        i += 1;
                        break;
                    }
                    i += 1;
                }
            }
            '-' if chars.get(i + 1) == Some(&'-') => {
                // Line comment, kept in the statement text but never a token
                while i < chars.len() && chars[i] != '\n' {
                    current.push(chars[i]);
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                let mut depth = 0usize;
                while i < chars.len() {
                    if chars[i] == '/' && chars.get(i + 1) == Some(&'*') {
                        depth += 1;
                        current.push('/');
                        current.push('*');
                        i += 2;
                    } else if chars[i] == '*' && chars.get(i + 1) == Some(&'/') {
                        depth -= 1;
                        current.push('*');
                        current.push('/');
                        i += 2;
                        if depth == 0 {
                            break;
                        }
                    } else {
                        current.push(chars[i]);
                        i += 1;
                    }
                }
            }
            '$' => {
                if let Some(tag) = dollar_tag(&chars, i) {
                    has_token = true;
                    current.push_str(&tag);
                    i += tag.chars().count();
                    // Copy until the matching closing tag
                    loop {
                        if i >= chars.len() {
                            break;
                        }
                        if chars[i] == '$' {
                            if let Some(close) = dollar_tag(&chars, i) {
                                if close == tag {
                                    current.push_str(&close);
                                    i += close.chars().count();
                                    break;
                                }
                            }
                        }
                        current.push(chars[i]);
                        i += 1;
                    }
                } else {
                    has_token = true;
                    current.push(c);
                    i += 1;
                }
            }
            ';' => {
                flush(&mut current, &mut has_token, &mut statements);
                i += 1;
            }
            _ => {
                if !c.is_whitespace() {
                    has_token = true;
                }
                current.push(c);
                i += 1;
            }
        }
    }

    // Final fragment without a trailing semicolon
    flush(&mut current, &mut has_token, &mut statements);

    statements
}

/// Read a dollar-quote tag (`$$` or `$tag$`) starting at `start`, if present.
fn dollar_tag(chars: &[char], start: usize) -> Option<String> {
    debug_assert_eq!(chars.get(start), Some(&'$'));
    let mut tag = String::from('$');
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i];
        if c == '$' {
            tag.push('$');
            return Some(tag);
        }
        if c.is_alphanumeric() || c == '_' {
            tag.push(c);
            i += 1;
        } else {
            return None;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splits_on_semicolons() {
        let stmts = split_statements("CREATE TABLE a (id INT); CREATE TABLE b (id INT);");
        assert_eq!(stmts.len(), 2);
        assert_eq!(stmts[0], "CREATE TABLE a (id INT)");
        assert_eq!(stmts[1], "CREATE TABLE b (id INT)");
    }

    #[test]
    fn test_semicolon_inside_string_literal() {
        let stmts = split_statements("INSERT INTO t VALUES ('a;b'); SELECT 1;");
        assert_eq!(stmts.len(), 2);
        assert_eq!(stmts[0], "INSERT INTO t VALUES ('a;b')");
    }

    #[test]
    fn test_escaped_quote_in_literal() {
        let stmts = split_statements("INSERT INTO t VALUES ('it''s; fine'); SELECT 1;");
        assert_eq!(stmts.len(), 2);
        assert_eq!(stmts[0], "INSERT INTO t VALUES ('it''s; fine')");
    }

    #[test]
    fn test_semicolon_inside_dollar_quoted_body() {
        let sql = r#"
CREATE FUNCTION touch_updated_at() RETURNS trigger AS $$
BEGIN
    NEW.updated_at = NOW();
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;
SELECT 1;
"#;
        let stmts = split_statements(sql);
        assert_eq!(stmts.len(), 2);
        assert!(stmts[0].contains("RETURN NEW;"));
        assert_eq!(stmts[1], "SELECT 1");
    }

    #[test]
    fn test_tagged_dollar_quote() {
        let sql = "CREATE FUNCTION f() RETURNS text AS $fn$ SELECT 'x;y'; $fn$ LANGUAGE sql; SELECT 2;";
        let stmts = split_statements(sql);
        assert_eq!(stmts.len(), 2);
        assert!(stmts[0].contains("$fn$"));
    }

    #[test]
    fn test_semicolon_inside_comments() {
        let sql = "SELECT 1 -- trailing; note\n; /* block; comment */ SELECT 2;";
        let stmts = split_statements(sql);
        assert_eq!(stmts.len(), 2);
        assert!(stmts[1].ends_with("SELECT 2"));
    }

    #[test]
    fn test_comment_only_fragments_are_dropped() {
        let sql = "-- header comment\n;\n/* nothing here */;\nSELECT 1;";
        let stmts = split_statements(sql);
        assert_eq!(stmts.len(), 1);
        assert_eq!(stmts[0], "SELECT 1");
    }

    #[test]
    fn test_nested_block_comment() {
        let sql = "/* outer /* inner; */ still; outer */ SELECT 1;";
        let stmts = split_statements(sql);
        assert_eq!(stmts.len(), 1);
        assert!(stmts[0].ends_with("SELECT 1"));
    }

    #[test]
    fn test_final_statement_without_semicolon() {
        let stmts = split_statements("SELECT 1;\nSELECT 2");
        assert_eq!(stmts.len(), 2);
        assert_eq!(stmts[1], "SELECT 2");
    }

    #[test]
    fn test_empty_input() {
        assert!(split_statements("").is_empty());
        assert!(split_statements("   \n\n  ").is_empty());
        assert!(split_statements(";;;").is_empty());
    }

    #[test]
    fn test_quoted_identifier() {
        let stmts = split_statements(r#"ALTER TABLE "odd;name" ADD COLUMN x INT; SELECT 1;"#);
        assert_eq!(stmts.len(), 2);
        assert!(stmts[0].contains(r#""odd;name""#));
    }
}
