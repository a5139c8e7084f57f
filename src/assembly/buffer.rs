//! Growable instruction buffer.
//!
//! [`CodeBuffer`] is the append-only byte sequence a method body is assembled into. All
//! multi-byte values are written little-endian, byte by byte, with no alignment. Capacity
//! doubles whenever the buffer is full.
//!
//! The only way to modify bytes that were already written is [`CodeBuffer::patch_u32`], which
//! the branch relocator uses to fill in the 4-byte displacement placeholders it reserved.

use crate::{Error, Result};

/// Capacity used when the buffer is created without an explicit size.
pub const DEFAULT_CAPACITY: usize = 64;

/// Append-only bytecode buffer with a write cursor.
///
/// # Examples
///
/// ```rust
/// use dotemit::assembly::CodeBuffer;
///
/// let mut buffer = CodeBuffer::new();
/// buffer.emit_u8(0x38);
/// let placeholder = buffer.offset();
/// buffer.emit_u32(0);
/// buffer.patch_u32(placeholder, 0x10)?;
/// assert_eq!(buffer.snapshot(), &[0x38, 0x10, 0x00, 0x00, 0x00]);
/// # Ok::<(), dotemit::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct CodeBuffer {
    data: Vec<u8>,
}

impl CodeBuffer {
    /// Create an empty buffer with [`DEFAULT_CAPACITY`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create an empty buffer with room for `capacity` bytes (at least one).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        CodeBuffer {
            data: Vec::with_capacity(capacity.max(1)),
        }
    }

    /// Current write offset, equal to the number of bytes written.
    ///
    /// Method bodies are addressed with 32-bit offsets; the emitter rejects bodies
    /// larger than that in `finalize`.
    #[must_use]
    pub fn offset(&self) -> u32 {
        #[allow(clippy::cast_possible_truncation)]
        let offset = self.data.len() as u32;
        offset
    }

    /// Number of bytes the buffer can hold before it grows again.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    /// Whether nothing has been written yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Append a single byte, doubling the capacity first when full.
    pub fn emit_u8(&mut self, value: u8) {
        if self.data.len() == self.data.capacity() {
            let additional = self.data.capacity().max(1);
            self.data.reserve_exact(additional);
        }
        self.data.push(value);
    }

    /// Append a signed byte.
    pub fn emit_i8(&mut self, value: i8) {
        self.emit_bytes(&value.to_le_bytes());
    }

    /// Append a little-endian `u16`.
    pub fn emit_u16(&mut self, value: u16) {
        self.emit_bytes(&value.to_le_bytes());
    }

    /// Append a little-endian `i16`.
    pub fn emit_i16(&mut self, value: i16) {
        self.emit_bytes(&value.to_le_bytes());
    }

    /// Append a little-endian `u32`.
    pub fn emit_u32(&mut self, value: u32) {
        self.emit_bytes(&value.to_le_bytes());
    }

    /// Append a little-endian `i32`.
    pub fn emit_i32(&mut self, value: i32) {
        self.emit_bytes(&value.to_le_bytes());
    }

    /// Append a little-endian `u64`.
    pub fn emit_u64(&mut self, value: u64) {
        self.emit_bytes(&value.to_le_bytes());
    }

    /// Append a little-endian `i64`.
    pub fn emit_i64(&mut self, value: i64) {
        self.emit_bytes(&value.to_le_bytes());
    }

    /// Append a little-endian IEEE 754 single.
    pub fn emit_f32(&mut self, value: f32) {
        self.emit_bytes(&value.to_le_bytes());
    }

    /// Append a little-endian IEEE 754 double.
    pub fn emit_f64(&mut self, value: f64) {
        self.emit_bytes(&value.to_le_bytes());
    }

    fn emit_bytes(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.emit_u8(*byte);
        }
    }

    /// Overwrite the 4 bytes at `address` with the little-endian `value`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if `address..address + 4` is not fully inside
    /// the bytes written so far.
    pub fn patch_u32(&mut self, address: u32, value: u32) -> Result<()> {
        let start = address as usize;
        let window = self
            .data
            .get_mut(start..start.saturating_add(4))
            .ok_or(Error::OutOfBounds)?;
        window.copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// The bytes written so far.
    #[must_use]
    pub fn snapshot(&self) -> &[u8] {
        &self.data
    }
}

impl Default for CodeBuffer {
    fn default() -> Self {
        Self::new()
    }
}
