//! FTS5 query builder
//!
//! Turns caller-supplied text into a `MATCH` expression that the FTS5 parser
//! accepts verbatim.
//!
//! # Syntax Generated
//!
//! ```text
//! hello world          →  "hello" "world"               -- implicit AND
//! apple OR banana      →  "apple" OR "banana"           -- boolean operators kept
//! deploy*              →  "deploy"*                     -- prefix match
//! say "hi"             →  "say" """hi"""                -- quotes doubled
//! sender Ann Lee       →  sender_name:"Ann Lee"         -- column-scoped phrase
//! ```
//!
//! Bare uppercase `AND`, `OR` and `NOT` between two terms and a trailing `*`
//! on a term are passed through as FTS5 syntax. Everything else becomes part
//! of an FTS5 string, so `(`, `:`, `-`, `^` and stray quotes never reach the
//! parser as syntax. An operator with no term on one side is dropped; of
//! consecutive operators the last one wins.

/// FTS5 column that holds the sender's display name.
pub const SENDER_COLUMN: &str = "sender_name";

const OPERATORS: [&str; 3] = ["AND", "OR", "NOT"];

/// A ready-to-bind FTS5 `MATCH` argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtsQuery(String);

impl FtsQuery {
    /// Free-text query across all indexed columns.
    ///
    /// Adjacent terms must all match unless joined by `OR`/`NOT`. Terms
    /// without a single alphanumeric character would tokenize to nothing and
    /// are dropped. Returns `None` when nothing is left.
    ///
    /// ```
    /// use message_cache::search::FtsQuery;
    ///
    /// let q = FtsQuery::text("release notes").unwrap();
    /// assert_eq!(q.as_str(), "\"release\" \"notes\"");
    ///
    /// let q = FtsQuery::text("deploy* OR rollback").unwrap();
    /// assert_eq!(q.as_str(), "\"deploy\"* OR \"rollback\"");
    ///
    /// assert!(FtsQuery::text("   ").is_none());
    /// ```
    #[must_use]
    pub fn text(input: &str) -> Option<Self> {
        let cleaned = strip_control(input);
        let mut parts: Vec<String> = Vec::new();
        let mut pending_op: Option<&str> = None;

        for token in cleaned.split_whitespace() {
            if OPERATORS.contains(&token) {
                if !parts.is_empty() {
                    pending_op = Some(token);
                }
                continue;
            }
            let Some(term) = term(token) else {
                continue;
            };
            if let Some(op) = pending_op.take() {
                parts.push(op.to_string());
            }
            parts.push(term);
        }

        if parts.is_empty() {
            return None;
        }
        Some(Self(parts.join(" ")))
    }

    /// Column-scoped phrase query against the sender name.
    ///
    /// ```
    /// use message_cache::search::FtsQuery;
    ///
    /// let q = FtsQuery::sender("Ann \"Bee\"").unwrap();
    /// assert_eq!(q.as_str(), "sender_name:\"Ann \"\"Bee\"\"\"");
    /// ```
    #[must_use]
    pub fn sender(name: &str) -> Option<Self> {
        let cleaned = strip_control(name);
        let trimmed = cleaned.trim();
        if !has_token(trimmed) {
            return None;
        }
        Some(Self(format!("{}:{}", SENDER_COLUMN, quote(trimmed))))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FtsQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Double embedded quotes so the text survives inside an FTS5 string.
#[must_use]
pub fn escape_quotes(input: &str) -> String {
    input.replace('"', "\"\"")
}

/// Control characters (NUL in particular) end the query early inside the
/// FTS5 parser; they carry no searchable text.
fn strip_control(input: &str) -> String {
    input
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect()
}

/// Quote one search term, keeping a trailing `*` as a prefix operator.
fn term(token: &str) -> Option<String> {
    let (stem, prefix) = match token.strip_suffix('*') {
        Some(stem) => (stem, true),
        None => (token, false),
    };
    if !has_token(stem) {
        return None;
    }
    let quoted = quote(stem);
    Some(if prefix { format!("{quoted}*") } else { quoted })
}

fn has_token(input: &str) -> bool {
    input.chars().any(char::is_alphanumeric)
}

fn quote(input: &str) -> String {
    format!("\"{}\"", escape_quotes(input))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_quoted() {
        let q = FtsQuery::text("hello").unwrap();
        assert_eq!(q.as_str(), "\"hello\"");
    }

    #[test]
    fn test_terms_are_quoted_individually() {
        let q = FtsQuery::text("hello   world").unwrap();
        assert_eq!(q.as_str(), "\"hello\" \"world\"");
    }

    #[test]
    fn test_embedded_quotes_are_doubled() {
        let q = FtsQuery::text("she said \"hi\"").unwrap();
        assert_eq!(q.as_str(), "\"she\" \"said\" \"\"\"hi\"\"\"");
    }

    #[test]
    fn test_boolean_operators_pass_through() {
        assert_eq!(FtsQuery::text("apple OR banana").unwrap().as_str(), "\"apple\" OR \"banana\"");
        assert_eq!(FtsQuery::text("pie NOT apple").unwrap().as_str(), "\"pie\" NOT \"apple\"");
        assert_eq!(FtsQuery::text("a AND b").unwrap().as_str(), "\"a\" AND \"b\"");
        // Lowercase words are ordinary terms
        assert_eq!(FtsQuery::text("this or that").unwrap().as_str(), "\"this\" \"or\" \"that\"");
    }

    #[test]
    fn test_dangling_operators_dropped() {
        assert_eq!(FtsQuery::text("OR apple").unwrap().as_str(), "\"apple\"");
        assert_eq!(FtsQuery::text("apple NOT").unwrap().as_str(), "\"apple\"");
        assert_eq!(FtsQuery::text("a OR NOT b").unwrap().as_str(), "\"a\" NOT \"b\"");
        assert_eq!(FtsQuery::text("a OR * b").unwrap().as_str(), "\"a\" OR \"b\"");
        assert!(FtsQuery::text("AND OR NOT").is_none());
    }

    #[test]
    fn test_trailing_star_is_prefix() {
        assert_eq!(FtsQuery::text("deploy*").unwrap().as_str(), "\"deploy\"*");
        assert_eq!(FtsQuery::text("de*ploy").unwrap().as_str(), "\"de*ploy\"");
        assert!(FtsQuery::text("*").is_none());
    }

    #[test]
    fn test_other_syntax_stays_inside_strings() {
        let q = FtsQuery::text("foo (bar col:x -y ^z").unwrap();
        assert_eq!(q.as_str(), "\"foo\" \"(bar\" \"col:x\" \"-y\" \"^z\"");
    }

    #[test]
    fn test_control_characters_removed() {
        assert_eq!(FtsQuery::text("x\0y").unwrap().as_str(), "\"x\" \"y\"");
        assert_eq!(FtsQuery::sender("a\0b").unwrap().as_str(), "sender_name:\"a b\"");
        assert!(FtsQuery::text("\0\u{7}").is_none());
    }

    #[test]
    fn test_whitespace_is_trimmed() {
        assert_eq!(FtsQuery::text("  rust  ").unwrap().as_str(), "\"rust\"");
        assert!(FtsQuery::text("").is_none());
        assert!(FtsQuery::text("\t\n").is_none());
    }

    #[test]
    fn test_punctuation_only_terms_dropped() {
        assert!(FtsQuery::text("* - \"").is_none());
        assert_eq!(FtsQuery::text("rust * -").unwrap().as_str(), "\"rust\"");
        assert!(FtsQuery::sender("--").is_none());
    }

    #[test]
    fn test_sender_is_column_scoped() {
        let q = FtsQuery::sender("Alice").unwrap();
        assert_eq!(q.to_string(), "sender_name:\"Alice\"");
        assert!(FtsQuery::sender(" ").is_none());
    }

    #[test]
    fn test_escape_quotes() {
        assert_eq!(escape_quotes("a\"b"), "a\"\"b");
        assert_eq!(escape_quotes("plain"), "plain");
    }
}
