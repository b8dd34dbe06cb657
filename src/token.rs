//! Optional key tokenization.
//!
//! Splitting a composite key at a separator lets keys that share
//! sub-sequences reuse each other's atlas regions. Disabled by default;
//! the whole key is then a single piece.

/// One cacheable unit of a composite key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    /// A non-empty sub-key, cached independently.
    Piece(&'a str),
    /// An empty sub-sequence between consecutive separators: advance the
    /// cursor by one separator width, cache nothing.
    Skip,
}

/// Split `key` at `separator`, or yield it whole when `separator` is
/// `None`.
pub fn tokenize(key: &str, separator: Option<char>) -> Vec<Token<'_>> {
    match separator {
        None => vec![Token::Piece(key)],
        Some(sep) => key
            .split(sep)
            .map(|piece| {
                if piece.is_empty() {
                    Token::Skip
                } else {
                    Token::Piece(piece)
                }
            })
            .collect(),
    }
}
