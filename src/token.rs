//! Format tokens: the atomic unit the rest of the core operates on.
//!
//! Grounded in `common/formatting/unwrapped_line.h` and `format_token.h`
//! from the original source (`PreFormatToken`/`FormattedToken`): a lexer
//! token's text is immutable, while the whitespace contract that precedes it
//! is mutated in place as wrap/layout/align decisions are committed.

use std::ops::Range;

/// Opaque token classification handed down by the (external) lexer. The
/// core never branches on concrete kinds — only the partition tree's
/// precomputed `break_decision`s and the style's penalties matter here —
/// but the kind is kept so callers can recover it when rendering diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenKind(pub u32);

/// How a format token's leading whitespace is decided.
///
/// Invariant: `MustAppend` forbids a preceding newline; `MustWrap` requires
/// one; `Preserve` copies the original inter-token text verbatim;
/// `AppendAligned` forbids a newline and makes `required_spaces` the
/// authoritative leading width, set by the column aligner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BreakDecision {
    #[default]
    Undecided,
    MustAppend,
    MustWrap,
    Preserve,
    AppendAligned,
}

/// A byte range into the shared original-source buffer, used only when
/// `break_decision == Preserve`. Keeping an offset+length instead of an
/// owned `String` avoids copying source text that will be emitted verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreservedSpan {
    pub start: u32,
    pub end: u32,
}

/// The mutable whitespace contract preceding a format token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeforeContract {
    pub required_spaces: u32,
    /// 0 or 1: whether a newline is required before this token. Never more
    /// than one — blank-line preservation between partitions is a driver
    /// concern, not a per-token one.
    pub required_newlines: u8,
    pub preserved_span: Option<PreservedSpan>,
    pub break_decision: BreakDecision,
}

impl Default for BeforeContract {
    fn default() -> Self {
        Self {
            required_spaces: 1,
            required_newlines: 0,
            preserved_span: None,
            break_decision: BreakDecision::Undecided,
        }
    }
}

impl BeforeContract {
    /// A contract for the very first token of a line: no leading space, no
    /// wrap is ever considered for it.
    pub fn first_on_line() -> Self {
        Self {
            required_spaces: 0,
            required_newlines: 0,
            preserved_span: None,
            break_decision: BreakDecision::MustAppend,
        }
    }
}

/// One lexer token plus its mutable spacing contract and the penalty for
/// placing a discretionary newline before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatToken {
    pub text: Box<str>,
    pub kind: TokenKind,
    pub break_penalty: i64,
    pub before: BeforeContract,
}

impl FormatToken {
    pub fn new(text: impl Into<Box<str>>, kind: TokenKind) -> Self {
        Self {
            text: text.into(),
            kind,
            break_penalty: 0,
            before: BeforeContract::default(),
        }
    }

    pub fn with_break_penalty(mut self, penalty: i64) -> Self {
        self.break_penalty = penalty;
        self
    }

    pub fn with_before(mut self, before: BeforeContract) -> Self {
        self.before = before;
        self
    }

    /// Visible column width of this token's text. Unicode-aware by way of
    /// `textwrap`'s display-width routine, the same helper the teacher uses
    /// to measure cell contents.
    pub fn width(&self) -> i64 {
        textwrap::core::display_width(&self.text) as i64
    }
}

/// The shared, append-only array of format tokens that unwrapped lines and
/// partitions index into. Allocated once per formatting run; every pass
/// from here on mutates only `FormatToken::before` fields, through
/// non-overlapping ranges, per the single-threaded resource model.
#[derive(Debug, Default, Clone)]
pub struct TokenBuffer {
    tokens: Vec<FormatToken>,
    /// Original source text, used only to resolve `Preserve` spans.
    source: String,
}

impl TokenBuffer {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            tokens: Vec::new(),
            source: source.into(),
        }
    }

    pub fn push(&mut self, token: FormatToken) -> usize {
        self.tokens.push(token);
        self.tokens.len() - 1
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn get(&self, index: usize) -> &FormatToken {
        &self.tokens[index]
    }

    pub fn get_mut(&mut self, index: usize) -> &mut FormatToken {
        &mut self.tokens[index]
    }

    pub fn slice(&self, range: Range<usize>) -> &[FormatToken] {
        &self.tokens[range]
    }

    pub fn slice_mut(&mut self, range: Range<usize>) -> &mut [FormatToken] {
        &mut self.tokens[range]
    }

    pub fn preserved_text(&self, span: PreservedSpan) -> &str {
        &self.source[span.start as usize..span.end as usize]
    }

    pub fn iter(&self) -> impl Iterator<Item = &FormatToken> {
        self.tokens.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_is_unicode_aware() {
        let ascii = FormatToken::new("hello", TokenKind(0));
        assert_eq!(ascii.width(), 5);

        // A full-width character occupies two display columns.
        let wide = FormatToken::new("\u{FF21}", TokenKind(0));
        assert_eq!(wide.width(), 2);
    }

    #[test]
    fn preserved_span_reads_through_buffer() {
        let mut buf = TokenBuffer::new("module m; endmodule");
        buf.push(FormatToken::new("module", TokenKind(0)));
        let span = PreservedSpan { start: 10, end: 11 };
        assert_eq!(buf.preserved_text(span), ";");
    }
}
