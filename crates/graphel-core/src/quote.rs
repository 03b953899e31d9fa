//! EdgeQL identifier and literal quoting.

use std::sync::OnceLock;

use regex::Regex;

/// Keywords that must be backtick-quoted even when lexically plain.
const RESERVED: &[&str] = &[
    "all", "alter", "and", "anytype", "by", "case", "commit", "configure", "create", "delete",
    "describe", "detached", "distinct", "drop", "else", "exists", "extending", "filter", "for",
    "global", "if", "ilike", "in", "insert", "introspect", "is", "like", "limit", "module", "not",
    "offset", "on", "optional", "or", "rollback", "select", "set", "single", "typeof", "union",
    "update", "variadic", "with",
];

fn plain_ident_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid"))
}

fn is_plain(name: &str) -> bool {
    plain_ident_re().is_match(name) && !RESERVED.contains(&name.to_ascii_lowercase().as_str())
}

/// Quote a single identifier. Plain, non-reserved identifiers pass through
/// unchanged; everything else is backtick-quoted with backticks doubled.
pub fn quote_ident(name: &str) -> String {
    if is_plain(name) {
        name.to_string()
    } else {
        format!("`{}`", name.replace('`', "``"))
    }
}

/// Quote a string literal: single quotes, with backslash and quote escaped.
pub fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// Quote a schema-qualified type name, part by part.
pub fn quote_type_name(name: &str) -> String {
    name.split("::")
        .map(quote_ident)
        .collect::<Vec<_>>()
        .join("::")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_identifiers_pass_through() {
        assert_eq!(quote_ident("name"), "name");
        assert_eq!(quote_ident("user_name"), "user_name");
        assert_eq!(quote_ident("_private2"), "_private2");
    }

    #[test]
    fn reserved_words_are_quoted() {
        assert_eq!(quote_ident("select"), "`select`");
        assert_eq!(quote_ident("Filter"), "`Filter`");
    }

    #[test]
    fn non_plain_identifiers_are_quoted() {
        assert_eq!(quote_ident("weird name"), "`weird name`");
        assert_eq!(quote_ident("1abc"), "`1abc`");
        assert_eq!(quote_ident("tick`tock"), "`tick``tock`");
    }

    #[test]
    fn literals_escape_quotes_and_backslashes() {
        assert_eq!(quote_literal("plain"), "'plain'");
        assert_eq!(quote_literal("it's"), "'it\\'s'");
        assert_eq!(quote_literal(r"a\b"), "'a\\\\b'");
    }

    #[test]
    fn type_names_quote_each_part() {
        assert_eq!(quote_type_name("default::User"), "default::User");
        assert_eq!(quote_type_name("default::select"), "default::`select`");
    }
}
