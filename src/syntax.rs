//! Lightweight pattern syntax analysis.
//!
//! The engine does not report whether more input could have changed a
//! match, so the matcher approximates it from the pattern text. The
//! tokenizer here understands just enough syntax to tell anchors,
//! quantifiers and groups apart from literal text: escapes, `\Q...\E`
//! quoting, character classes (including POSIX `[:name:]` brackets), group
//! headers, comments and extended-mode whitespace.
//!
//! Three facts are derived from the tokens:
//!
//! - [`could_extend`]: some alternative ends in an open-ended quantifier,
//!   so a match reaching the end of input might extend with more input.
//! - [`could_invalidate`]: the pattern contains an end anchor, so more
//!   input might turn a match into a non-match.
//! - [`rewrite_for_region`]: the pattern with its start anchors rebound to
//!   the start of a region search.

/// Kind of a lexical unit of a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenKind {
    /// A single literal character, back-reference or subroutine call.
    Literal,
    Dot,
    Class,
    /// A backslash escape naming a character type or an assertion.
    Escape(char),
    /// `\Q...\E` quoted text.
    Quoted,
    GroupOpen,
    GroupClose,
    Alternation,
    /// A quantifier, with `open` set when its upper bound exceeds its
    /// lower bound.
    Quantifier { open: bool },
    StartAnchor,
    EndAnchor,
    /// Comments, extended-mode whitespace, option settings and verbs.
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
}

/// Pattern text with its start anchors rebound to a region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionRewrite {
    pub pattern: String,
    /// A `^` was replaced by a start-of-search assertion.
    pub start_anchor_replaced: bool,
}

/// Facts about a pattern the matcher needs at match time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Analysis {
    pub could_extend: bool,
    pub could_invalidate: bool,
    pub has_start_anchor: bool,
}

impl Analysis {
    pub fn of(pattern: &str, extended: bool) -> Self {
        let tokens = tokenize(pattern, extended);
        Self {
            could_extend: alternatives_extend(&tokens),
            could_invalidate: tokens.iter().any(is_end_anchor),
            has_start_anchor: tokens.iter().any(|t| t.kind == TokenKind::StartAnchor),
        }
    }
}

/// True when a match ending at the end of input might extend with more
/// input: some top-level alternative ends in `*`, `+`, `?`, `{n,}` or
/// `{n,m}` with `n < m`, looking through a trailing group.
pub fn could_extend(pattern: &str, extended: bool) -> bool {
    alternatives_extend(&tokenize(pattern, extended))
}

/// True when the pattern contains `$` or `\Z`.
pub fn could_invalidate(pattern: &str, extended: bool) -> bool {
    tokenize(pattern, extended).iter().any(is_end_anchor)
}

/// Rebind `^` to a region start: it becomes `\G`, or `(?:\G|^)` in
/// multiline mode where `^` also matches after line breaks.
///
/// `$` is left alone. Every `$`, wherever it sits, binds to the end of the
/// subject the engine sees, and the matcher passes a subject truncated at
/// the region end.
pub fn rewrite_for_region(pattern: &str, extended: bool, multiline: bool) -> RegionRewrite {
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut start_anchor_replaced = false;

    for token in tokenize(pattern, extended) {
        match token.kind {
            TokenKind::StartAnchor => {
                out.push_str(if multiline { r"(?:\G|^)" } else { r"\G" });
                start_anchor_replaced = true;
            }
            _ => out.push_str(&pattern[token.start..token.end]),
        }
    }

    RegionRewrite {
        pattern: out,
        start_anchor_replaced,
    }
}

fn is_end_anchor(token: &Token) -> bool {
    matches!(token.kind, TokenKind::EndAnchor | TokenKind::Escape('Z'))
}

fn alternatives_extend(tokens: &[Token]) -> bool {
    let mut depth = 0usize;
    let mut begin = 0;
    for (i, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::GroupOpen => depth += 1,
            TokenKind::GroupClose => depth = depth.saturating_sub(1),
            TokenKind::Alternation if depth == 0 => {
                if sequence_extends(&tokens[begin..i]) {
                    return true;
                }
                begin = i + 1;
            }
            _ => {}
        }
    }
    sequence_extends(&tokens[begin..])
}

fn sequence_extends(tokens: &[Token]) -> bool {
    // Zero-width items at the end do not change what the last construct is.
    let Some(last) = tokens.iter().rposition(|t| !is_zero_width(t)) else {
        return false;
    };
    match tokens[last].kind {
        TokenKind::Quantifier { open } => open,
        TokenKind::GroupClose => match matching_open(tokens, last) {
            Some(open) => alternatives_extend(&tokens[open + 1..last]),
            None => false,
        },
        _ => false,
    }
}

fn is_zero_width(token: &Token) -> bool {
    matches!(
        token.kind,
        TokenKind::Ignored
            | TokenKind::StartAnchor
            | TokenKind::EndAnchor
            | TokenKind::Escape('b' | 'B' | 'A' | 'z' | 'Z' | 'G')
    )
}

fn matching_open(tokens: &[Token], close: usize) -> Option<usize> {
    let mut depth = 0usize;
    for i in (0..close).rev() {
        match tokens[i].kind {
            TokenKind::GroupClose => depth += 1,
            TokenKind::GroupOpen if depth == 0 => return Some(i),
            TokenKind::GroupOpen => depth -= 1,
            _ => {}
        }
    }
    None
}

/// Split `pattern` into tokens covering every byte, in order.
pub(crate) fn tokenize(pattern: &str, extended: bool) -> Vec<Token> {
    let bytes = pattern.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let start = i;
        let kind = match bytes[i] {
            b'\\' => {
                let (end, kind) = scan_escape(pattern, i);
                i = end;
                kind
            }
            b'[' => {
                i = scan_class(pattern, i);
                TokenKind::Class
            }
            b'(' => {
                let (end, kind) = scan_group_open(bytes, i);
                i = end;
                kind
            }
            b')' => {
                i += 1;
                TokenKind::GroupClose
            }
            b'|' => {
                i += 1;
                TokenKind::Alternation
            }
            b'.' => {
                i += 1;
                TokenKind::Dot
            }
            b'^' => {
                i += 1;
                TokenKind::StartAnchor
            }
            b'$' => {
                i += 1;
                TokenKind::EndAnchor
            }
            b'*' | b'+' | b'?' => {
                i = skip_quantifier_suffix(bytes, i + 1);
                TokenKind::Quantifier { open: true }
            }
            b'{' => match scan_counted(bytes, i) {
                Some((end, open)) => {
                    i = skip_quantifier_suffix(bytes, end);
                    TokenKind::Quantifier { open }
                }
                None => {
                    i += 1;
                    TokenKind::Literal
                }
            },
            b'#' if extended => {
                i = bytes[i..]
                    .iter()
                    .position(|&b| b == b'\n')
                    .map_or(bytes.len(), |n| i + n + 1);
                TokenKind::Ignored
            }
            b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c if extended => {
                i += 1;
                TokenKind::Ignored
            }
            _ => {
                i += char_len(pattern, i);
                TokenKind::Literal
            }
        };
        tokens.push(Token {
            kind,
            start,
            end: i,
        });
    }
    tokens
}

fn char_len(pattern: &str, at: usize) -> usize {
    pattern[at..].chars().next().map_or(1, char::len_utf8)
}

/// Index just past the first `close` at or after `from`, or the end.
fn skip_past(bytes: &[u8], from: usize, close: u8) -> usize {
    bytes[from.min(bytes.len())..]
        .iter()
        .position(|&b| b == close)
        .map_or(bytes.len(), |n| from + n + 1)
}

fn skip_quantifier_suffix(bytes: &[u8], at: usize) -> usize {
    match bytes.get(at) {
        Some(b'?') | Some(b'+') => at + 1,
        _ => at,
    }
}

/// `{n}`, `{n,}` or `{n,m}` starting at `at`: the end index and whether the
/// quantifier is open-ended (upper bound above lower bound).
fn scan_counted(bytes: &[u8], at: usize) -> Option<(usize, bool)> {
    let digits = |from: usize| {
        bytes[from..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count()
    };

    let mut i = at + 1;
    let min_len = digits(i);
    if min_len == 0 {
        return None;
    }
    let min: u64 = std::str::from_utf8(&bytes[i..i + min_len]).ok()?.parse().ok()?;
    i += min_len;

    match bytes.get(i) {
        Some(b'}') => Some((i + 1, false)),
        Some(b',') => {
            i += 1;
            let max_len = digits(i);
            let max: Option<u64> = if max_len == 0 {
                None
            } else {
                std::str::from_utf8(&bytes[i..i + max_len]).ok()?.parse().ok()
            };
            i += max_len;
            if bytes.get(i) != Some(&b'}') {
                return None;
            }
            let open = max.map_or(true, |max| max > min);
            Some((i + 1, open))
        }
        _ => None,
    }
}

fn scan_escape(pattern: &str, at: usize) -> (usize, TokenKind) {
    let bytes = pattern.as_bytes();
    let Some(&next) = bytes.get(at + 1) else {
        return (bytes.len(), TokenKind::Literal);
    };
    let after = at + 2;

    match next {
        b'Q' => {
            let end = pattern[after..]
                .find(r"\E")
                .map_or(bytes.len(), |n| after + n + 2);
            (end, TokenKind::Quoted)
        }
        b'E' => (after, TokenKind::Ignored),
        b'x' | b'o' | b'N' if bytes.get(after) == Some(&b'{') => {
            (skip_past(bytes, after, b'}'), TokenKind::Literal)
        }
        b'x' => {
            let hex = bytes[after..]
                .iter()
                .take(2)
                .take_while(|b| b.is_ascii_hexdigit())
                .count();
            (after + hex, TokenKind::Literal)
        }
        b'c' if after < bytes.len() => (after + char_len(pattern, after), TokenKind::Literal),
        b'0' => {
            let octal = bytes[after..]
                .iter()
                .take(2)
                .take_while(|b| (b'0'..=b'7').contains(b))
                .count();
            (after + octal, TokenKind::Literal)
        }
        b'1'..=b'9' => {
            let more = bytes[after..]
                .iter()
                .take_while(|b| b.is_ascii_digit())
                .count();
            (after + more, TokenKind::Literal)
        }
        b'p' | b'P' => match bytes.get(after) {
            Some(b'{') => (skip_past(bytes, after, b'}'), TokenKind::Escape(next as char)),
            Some(_) => (after + char_len(pattern, after), TokenKind::Escape(next as char)),
            None => (bytes.len(), TokenKind::Escape(next as char)),
        },
        b'g' | b'k' => {
            let end = match bytes.get(after) {
                Some(b'{') => skip_past(bytes, after, b'}'),
                Some(b'<') => skip_past(bytes, after, b'>'),
                Some(b'\'') => skip_past(bytes, after + 1, b'\''),
                Some(b'+') | Some(b'-') => {
                    after
                        + 1
                        + bytes[after + 1..]
                            .iter()
                            .take_while(|b| b.is_ascii_digit())
                            .count()
                }
                _ => {
                    after
                        + bytes[after..]
                            .iter()
                            .take_while(|b| b.is_ascii_digit())
                            .count()
                }
            };
            (end, TokenKind::Literal)
        }
        c if c.is_ascii_alphabetic() => (after, TokenKind::Escape(c as char)),
        _ => (after - 1 + char_len(pattern, at + 1), TokenKind::Literal),
    }
}

fn scan_class(pattern: &str, at: usize) -> usize {
    let bytes = pattern.as_bytes();
    let mut i = at + 1;
    if bytes.get(i) == Some(&b'^') {
        i += 1;
    }
    // A leading `]` is a literal member.
    if bytes.get(i) == Some(&b']') {
        i += 1;
    }

    let mut depth = 1usize;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if bytes.get(i + 1) == Some(&b'Q') => {
                i = pattern[i + 2..]
                    .find(r"\E")
                    .map_or(bytes.len(), |n| i + 2 + n + 2);
            }
            b'\\' if i + 1 < bytes.len() => i += 1 + char_len(pattern, i + 1),
            b'[' if matches!(bytes.get(i + 1), Some(b':' | b'.' | b'=')) => {
                depth += 1;
                i += 2;
            }
            b']' => {
                depth -= 1;
                i += 1;
                if depth == 0 {
                    return i;
                }
            }
            _ => i += char_len(pattern, i),
        }
    }
    bytes.len()
}

fn scan_group_open(bytes: &[u8], at: usize) -> (usize, TokenKind) {
    let after = at + 1;
    match bytes.get(after) {
        // Verbs such as (*UTF) or (*SKIP).
        Some(b'*') => (skip_past(bytes, after, b')'), TokenKind::Ignored),
        Some(b'?') => scan_extended_group(bytes, after + 1),
        _ => (after, TokenKind::GroupOpen),
    }
}

/// Classify `(?` constructs; `at` is the index after the `?`.
fn scan_extended_group(bytes: &[u8], at: usize) -> (usize, TokenKind) {
    match bytes.get(at) {
        Some(b'#') | Some(b'C') => (skip_past(bytes, at, b')'), TokenKind::Ignored),
        Some(b':' | b'=' | b'!' | b'>' | b'|') => (at + 1, TokenKind::GroupOpen),
        Some(b'<') if matches!(bytes.get(at + 1), Some(b'=' | b'!')) => {
            (at + 2, TokenKind::GroupOpen)
        }
        // Named groups: (?<name>, (?'name', (?P<name>
        Some(b'<') => (skip_past(bytes, at, b'>'), TokenKind::GroupOpen),
        Some(b'\'') => (skip_past(bytes, at + 1, b'\''), TokenKind::GroupOpen),
        Some(b'P') if bytes.get(at + 1) == Some(&b'<') => {
            (skip_past(bytes, at + 1, b'>'), TokenKind::GroupOpen)
        }
        // Back-references and subroutine calls: (?P=name) (?P>name)
        // (?&name) (?R) (?1) (?+1) (?-1)
        Some(b'P' | b'&' | b'R' | b'+' | b'-' | b'0'..=b'9')
            if is_call(bytes, at) =>
        {
            (skip_past(bytes, at, b')'), TokenKind::Literal)
        }
        // Conditionals: the condition is part of the group header.
        Some(b'(') => (skip_past(bytes, at, b')'), TokenKind::GroupOpen),
        _ => {
            // Option settings: (?i) applies in place, (?i:...) opens a group.
            let flags = bytes[at..]
                .iter()
                .take_while(|b| b.is_ascii_alphabetic() || **b == b'-' || **b == b'^')
                .count();
            match bytes.get(at + flags) {
                Some(b':') => (at + flags + 1, TokenKind::GroupOpen),
                Some(b')') => (at + flags + 1, TokenKind::Ignored),
                _ => (at + flags, TokenKind::GroupOpen),
            }
        }
    }
}

fn is_call(bytes: &[u8], at: usize) -> bool {
    match bytes[at] {
        b'P' => matches!(bytes.get(at + 1), Some(b'=' | b'>')),
        b'&' | b'R' => true,
        b'+' | b'-' => bytes.get(at + 1).map_or(false, u8::is_ascii_digit),
        _ => true,
    }
}
