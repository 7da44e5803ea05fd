//! Placeholder translation.
//!
//! Statements are written with the portable `?` placeholder. Before they
//! reach a connection, each `?` outside a quoted literal or identifier is
//! rewritten into the backend's own positional syntax.

/// SQL dialect of a driver.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Flavor {
    /// `?`
    Mysql,
    /// `?1`, `?2`, …
    Sqlite,
}

impl Flavor {
    pub fn translate(self, sql: &str) -> String {
        let mut out = String::with_capacity(sql.len() + 8);
        let mut quote: Option<char> = None;
        let mut n = 0;

        for c in sql.chars() {
            match quote {
                Some(q) => {
                    if c == q {
                        quote = None;
                    }
                    out.push(c);
                }
                None => match c {
                    '\'' | '"' | '`' => {
                        quote = Some(c);
                        out.push(c);
                    }
                    '?' => {
                        n += 1;
                        self.placeholder(n, &mut out);
                    }
                    _ => out.push(c),
                },
            }
        }
        out
    }

    fn placeholder(self, n: usize, out: &mut String) {
        match self {
            Self::Mysql => out.push('?'),
            Self::Sqlite => {
                out.push('?');
                out.push_str(&n.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_sqlite_placeholders() {
        assert_eq!(
            Flavor::Sqlite.translate("UPDATE `t` SET `a`=?, `b`=? WHERE `id`=?"),
            "UPDATE `t` SET `a`=?1, `b`=?2 WHERE `id`=?3"
        );
    }

    #[test]
    fn mysql_keeps_question_marks() {
        let sql = "SELECT `id` FROM `t` WHERE `id`=? LIMIT ?, ?";
        assert_eq!(Flavor::Mysql.translate(sql), sql);
    }

    #[test]
    fn quoted_question_marks_are_literal() {
        assert_eq!(
            Flavor::Sqlite.translate("SELECT '?', `a?` FROM t WHERE x=?"),
            "SELECT '?', `a?` FROM t WHERE x=?1"
        );
    }

    #[test]
    fn doubled_quotes_stay_inside_literal() {
        // '' closes and reopens the literal, so the inner ? stays literal.
        assert_eq!(
            Flavor::Sqlite.translate("SELECT 'it''s ?' WHERE a=?"),
            "SELECT 'it''s ?' WHERE a=?1"
        );
    }
}
