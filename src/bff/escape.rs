//! Literal escaping for values handed to [`super::writer::BffWriter`].
//!
//! FASTBuild uses `$` for variable substitution and `^` as its escape
//! character. The writer never escapes anything itself, so every literal
//! string must pass through one of these helpers first.

/// Default quotation character for string literals.
pub const QUOTE: char = '\'';

/// Quote `value` as a single-quoted string literal.
///
/// # Examples
///
/// ```
/// use bffgen::bff::escape::quote;
///
/// assert_eq!(quote("cost $5 'each'"), "'cost ^$5 ^'each^''");
/// ```
#[must_use]
pub fn quote(value: &str) -> String {
    quote_with(value, QUOTE)
}

/// Quote `value` using `quotation` as the delimiter.
#[must_use]
pub fn quote_with(value: &str, quotation: char) -> String {
    let escaped = value
        .replace('^', "^^")
        .replace(quotation, &format!("^{quotation}"))
        .replace('$', "^$");
    format!("{quotation}{escaped}{quotation}")
}

/// Escape the substitution sigil without adding quotes.
#[must_use]
pub fn encode_literal(value: &str) -> String {
    value.replace('$', "^$")
}

/// Decorate each value with `prefix` and `suffix`.
///
/// ```
/// use bffgen::bff::escape::wrap;
///
/// assert_eq!(wrap(["Debug", "Release"], ".config_", ""), [".config_Debug", ".config_Release"]);
/// ```
#[must_use]
pub fn wrap<I, S>(values: I, prefix: &str, suffix: &str) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .map(|value| format!("{prefix}{}{suffix}", value.as_ref()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("plain", "'plain'")]
    #[case("", "''")]
    #[case("a^b", "'a^^b'")]
    #[case("it's", "'it^'s'")]
    #[case("$(Var)", "'^$(Var)'")]
    #[case("^$", "'^^^$'")]
    fn quote_escapes_caret_quote_and_dollar(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(quote(input), expected);
    }

    #[rstest]
    fn quote_with_double_quotes_leaves_single_quotes_alone() {
        assert_eq!(quote_with("say \"hi\" 'x'", '"'), "\"say ^\"hi^\" 'x'\"");
    }

    #[rstest]
    fn encode_literal_only_touches_dollar() {
        assert_eq!(encode_literal("a'$b^"), "a'^$b^");
    }
}
