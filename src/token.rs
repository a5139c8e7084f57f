//! Resolved metadata tokens.
//!
//! The emitter never resolves names. Whatever layer builds the surrounding type and module
//! graph hands it 32-bit tokens for strings, fields, methods, types and signatures, and the
//! emitter writes them into the instruction stream verbatim as little-endian `u32`s.
//!
//! A token packs the metadata table in its high byte and the 1-based row in the low 24 bits
//! (ECMA-335 II.22). User-string tokens use table `0x70` and carry a heap offset instead.

use std::fmt;

/// A resolved ECMA-335 metadata token.
///
/// # Examples
///
/// ```rust
/// use dotemit::Token;
///
/// let token = Token::new(0x0600_0001);
/// assert_eq!(token.table(), 0x06);
/// assert_eq!(token.row(), 1);
/// assert_eq!(token.to_string(), "0x06000001");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Token(pub u32);

impl Token {
    /// Create a token from its raw 32-bit value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Token(value)
    }

    /// Raw 32-bit value, as written into the instruction stream.
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.0
    }

    /// Metadata table identifier stored in the high byte.
    #[must_use]
    pub const fn table(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Row index (or heap offset for user strings) stored in the low 24 bits.
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    /// Whether this is the nil token.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        self.0 == 0
    }
}

impl From<u32> for Token {
    fn from(value: u32) -> Self {
        Token(value)
    }
}

impl From<Token> for u32 {
    fn from(token: Token) -> Self {
        token.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token(0x{:08x}, table: 0x{:02x}, row: {})",
            self.0,
            self.table(),
            self.row()
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}
