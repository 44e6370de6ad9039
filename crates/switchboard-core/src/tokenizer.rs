//! Shell-style tokenizing for command lines and their autocompletion.
//!
//! Dispatch uses the strict [`split`]. Completion runs on half-typed input,
//! so [`split_tolerant`] closes a dangling quote or drops a dangling
//! backslash instead of failing.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenizeError {
    #[error("Invalid command syntax: {input}")]
    InvalidSyntax { input: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tokens {
    pub tokens: Vec<String>,
    /// The input ended inside a quote that had to be closed to tokenize it.
    pub in_quote: bool,
}

/// A completion candidate ready to be inserted at the cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    /// Text to insert, quoted when needed.
    pub text: String,
    /// Text to show in a completion menu.
    pub display: String,
    /// Where insertion starts, in characters relative to the cursor (`<= 0`).
    pub position: isize,
}

/// Strict shell-style split. A `#` is literal, never a comment.
pub fn split(input: &str) -> Result<Vec<String>, TokenizeError> {
    shell_words::split(&escape_comments(input)).map_err(|_| TokenizeError::InvalidSyntax {
        input: input.to_string(),
    })
}

/// Best-effort shell-style split of a partially typed line.
///
/// An unterminated quote is closed with `'` or else `"` and the result is
/// flagged `in_quote`. A trailing unescaped backslash is dropped and the split
/// retried.
pub fn split_tolerant(input: &str) -> Result<Tokens, TokenizeError> {
    if scan(input).dangling_escape {
        let trimmed = &input[..input.len() - 1];
        return split_tolerant(trimmed);
    }

    let escaped = escape_comments(input);
    if let Ok(tokens) = shell_words::split(&escaped) {
        return Ok(Tokens {
            tokens,
            in_quote: false,
        });
    }

    for closing in ['\'', '"'] {
        if let Ok(tokens) = shell_words::split(&format!("{escaped}{closing}")) {
            return Ok(Tokens {
                tokens,
                in_quote: true,
            });
        }
    }

    Err(TokenizeError::InvalidSyntax {
        input: input.to_string(),
    })
}

/// Character offset at which token number `token_count` (1-based) begins.
///
/// Returns the length of `input` in characters when there is no such token,
/// which is where a new token would start.
pub fn last_token_offset(input: &str, token_count: usize) -> usize {
    let byte_offset = token_count
        .checked_sub(1)
        .and_then(|index| scan(input).token_starts.get(index).copied())
        .unwrap_or(input.len());
    input[..byte_offset].chars().count()
}

/// The argument under the cursor of a partially typed line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    /// Complete arguments before the one being typed.
    pub preceding: Vec<String>,
    /// The partially typed argument, empty when a new one is starting.
    pub partial: String,
    pub in_quote: bool,
    offset: usize,
    input_chars: usize,
}

impl Cursor {
    pub fn parse(input: &str) -> Result<Self, TokenizeError> {
        let Tokens { mut tokens, in_quote } = split_tolerant(input)?;
        let effective = strip_dangling_escape(input);
        let input_chars = input.chars().count();

        let starts_new_token = !in_quote && scan(effective).at_delimiter;
        if starts_new_token || tokens.is_empty() {
            return Ok(Self {
                preceding: tokens,
                partial: String::new(),
                in_quote,
                offset: input_chars,
                input_chars,
            });
        }

        let offset = last_token_offset(effective, tokens.len());
        let partial = tokens.pop().unwrap_or_default();
        Ok(Self {
            preceding: tokens,
            partial,
            in_quote,
            offset,
            input_chars,
        })
    }

    /// Index of the argument being typed.
    pub fn position(&self) -> usize {
        self.preceding.len()
    }

    /// Keeps candidates that extend the partial argument, case-sensitively.
    pub fn complete<I>(&self, candidates: I) -> Vec<Completion>
    where
        I: IntoIterator<Item = String>,
    {
        let position = -((self.input_chars - self.offset) as isize);
        candidates
            .into_iter()
            .filter(|candidate| candidate.starts_with(&self.partial))
            .map(|candidate| Completion {
                text: shell_words::quote(&candidate).into_owned(),
                display: candidate,
                position,
            })
            .collect()
    }
}

/// Escapes every `#` that starts a word, which `shell_words` would otherwise
/// read as the start of a comment.
fn escape_comments(input: &str) -> String {
    let token_starts = scan(input).token_starts;
    let mut escaped = String::with_capacity(input.len() + token_starts.len());
    for (index, c) in input.char_indices() {
        if c == '#' && token_starts.contains(&index) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Word separators, exactly the ones `shell_words` splits on.
fn is_separator(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n')
}

fn strip_dangling_escape(input: &str) -> &str {
    let mut input = input;
    while scan(input).dangling_escape {
        input = &input[..input.len() - 1];
    }
    input
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexState {
    Delimiter,
    Unquoted,
    SingleQuoted,
    DoubleQuoted,
}

#[derive(Debug)]
struct Scan {
    /// Byte offsets at which each token begins.
    token_starts: Vec<usize>,
    /// The input ends with a backslash that escapes nothing.
    dangling_escape: bool,
    /// The input ends between tokens.
    at_delimiter: bool,
}

fn scan(input: &str) -> Scan {
    let mut state = LexState::Delimiter;
    let mut escaped = false;
    let mut token_starts = Vec::new();

    for (index, c) in input.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }

        state = match state {
            LexState::Delimiter if is_separator(c) => LexState::Delimiter,
            LexState::Delimiter => {
                token_starts.push(index);
                lex_word_char(c, &mut escaped)
            }
            LexState::Unquoted if is_separator(c) => LexState::Delimiter,
            LexState::Unquoted => lex_word_char(c, &mut escaped),
            LexState::SingleQuoted if c == '\'' => LexState::Unquoted,
            LexState::SingleQuoted => LexState::SingleQuoted,
            LexState::DoubleQuoted if c == '"' => LexState::Unquoted,
            LexState::DoubleQuoted => {
                escaped = c == '\\';
                LexState::DoubleQuoted
            }
        };
    }

    Scan {
        token_starts,
        dangling_escape: escaped,
        at_delimiter: state == LexState::Delimiter && !escaped,
    }
}

fn lex_word_char(c: char, escaped: &mut bool) -> LexState {
    match c {
        '\'' => LexState::SingleQuoted,
        '"' => LexState::DoubleQuoted,
        '\\' => {
            *escaped = true;
            LexState::Unquoted
        }
        _ => LexState::Unquoted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[rstest]
    #[case("say hello", &["say", "hello"], false)]
    #[case("say \"hello", &["say", "hello"], true)]
    #[case("say 'hello world", &["say", "hello world"], true)]
    #[case("say \"it's", &["say", "it's"], true)]
    #[case("say hello\\", &["say", "hello"], false)]
    #[case("say hello \\", &["say", "hello"], false)]
    #[case("say \"hi\\", &["say", "hi"], true)]
    #[case("a\\ b", &["a b"], false)]
    #[case("", &[], false)]
    #[case("config exit_words #", &["config", "exit_words", "#"], false)]
    #[case("say #tag 'a #b", &["say", "#tag", "a #b"], true)]
    #[case("say a#b", &["say", "a#b"], false)]
    #[case("x\u{a0}y\rz st", &["x\u{a0}y\rz", "st"], false)]
    fn test_split_tolerant(#[case] input: &str, #[case] expected: &[&str], #[case] in_quote: bool) {
        let tokens = split_tolerant(input).unwrap();
        assert_eq!(tokens.tokens, strings(expected));
        assert_eq!(tokens.in_quote, in_quote);
    }

    #[test]
    fn test_split_keeps_hash_literal() {
        assert_eq!(
            split("config exit_words #").unwrap(),
            strings(&["config", "exit_words", "#"])
        );
        assert_eq!(split("a \\#b '#c'").unwrap(), strings(&["a", "#b", "#c"]));
    }

    #[test]
    fn test_split_strict_rejects_open_quote() {
        assert!(matches!(
            split("say \"hello"),
            Err(TokenizeError::InvalidSyntax { .. })
        ));
        assert_eq!(split("say 'two words'").unwrap(), strings(&["say", "two words"]));
    }

    #[rstest]
    #[case("config key", 2, 7)]
    #[case("config key", 1, 0)]
    #[case("  config   key", 2, 11)]
    #[case("help \"two wo", 2, 5)]
    #[case("é key", 2, 2)]
    #[case("help ", 2, 5)]
    #[case("", 0, 0)]
    #[case("x\u{a0}y st", 2, 4)]
    #[case("help #cl", 2, 5)]
    fn test_last_token_offset(#[case] input: &str, #[case] count: usize, #[case] expected: usize) {
        assert_eq!(last_token_offset(input, count), expected);
    }

    #[test]
    fn test_cursor_on_partial_argument() {
        let cursor = Cursor::parse("conf str").unwrap();
        assert_eq!(cursor.preceding, strings(&["conf"]));
        assert_eq!(cursor.partial, "str");
        assert_eq!(cursor.position(), 1);

        let completions = cursor.complete(strings(&["stream_delay_ms", "confirm_clear", "Stream"]));
        assert_eq!(
            completions,
            vec![Completion {
                text: "stream_delay_ms".to_string(),
                display: "stream_delay_ms".to_string(),
                position: -3,
            }]
        );
    }

    #[test]
    fn test_cursor_after_trailing_space_starts_new_argument() {
        let cursor = Cursor::parse("config ").unwrap();
        assert_eq!(cursor.preceding, strings(&["config"]));
        assert_eq!(cursor.partial, "");
        assert_eq!(cursor.position(), 1);

        let completions = cursor.complete(strings(&["a", "b"]));
        assert_eq!(completions.len(), 2);
        assert!(completions.iter().all(|c| c.position == 0));
    }

    #[test]
    fn test_cursor_inside_open_quote_keeps_trailing_space() {
        let cursor = Cursor::parse("say \"hello ").unwrap();
        assert!(cursor.in_quote);
        assert_eq!(cursor.partial, "hello ");

        let completions = cursor.complete(strings(&["hello world", "help"]));
        assert_eq!(completions.len(), 1);
        assert_eq!(completions[0].text, "'hello world'");
        assert_eq!(completions[0].display, "hello world");
        assert_eq!(completions[0].position, -7);
    }

    #[test]
    fn test_cursor_with_trailing_backslash_replaces_it() {
        let cursor = Cursor::parse("help co\\").unwrap();
        assert_eq!(cursor.partial, "co");

        let completions = cursor.complete(strings(&["config", "clear"]));
        assert_eq!(completions.len(), 1);
        assert_eq!(completions[0].position, -3);
    }

    #[test]
    fn test_cursor_on_hash_argument() {
        let cursor = Cursor::parse("help #cl").unwrap();
        assert_eq!(cursor.preceding, strings(&["help"]));
        assert_eq!(cursor.partial, "#cl");

        let completions = cursor.complete(strings(&["#clear", "clear"]));
        assert_eq!(completions.len(), 1);
        assert_eq!(completions[0].position, -3);
    }

    #[test]
    fn test_cursor_with_non_separator_whitespace_in_word() {
        let cursor = Cursor::parse("x\u{a0}y st").unwrap();
        assert_eq!(cursor.preceding, strings(&["x\u{a0}y"]));
        assert_eq!(cursor.partial, "st");

        let completions = cursor.complete(strings(&["stream_delay_ms"]));
        assert_eq!(completions[0].position, -2);
    }

    #[test]
    fn test_empty_input_completes_everything() {
        let cursor = Cursor::parse("").unwrap();
        assert_eq!(cursor.position(), 0);
        assert_eq!(cursor.complete(strings(&["x", "y"])).len(), 2);
    }
}
