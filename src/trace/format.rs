//! Bounded-buffer formatting.
//!
//! Replaces the original's printf/vsnprintf formatter with a native
//! formatted write that targets a fixed-size buffer and reports
//! truncation as `bytes_written`, matching the `(buffer, len, data) ->
//! bytes_written` contract described for the C runtime.

use core::fmt;

/// A `fmt::Write` sink bounded to a fixed byte capacity.
///
/// Writes past the capacity are silently dropped (never an error, never a
/// panic) so that callers can always observe how many bytes actually made
/// it in via [`BoundedWriter::bytes_written`].
pub struct BoundedWriter<'a> {
    buf: &'a mut [u8],
    len: usize,
}

impl<'a> BoundedWriter<'a> {
    /// Creates a writer bounded to the capacity of `buf`.
    #[must_use]
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, len: 0 }
    }

    /// Returns the number of bytes actually written so far.
    #[must_use]
    pub const fn bytes_written(&self) -> usize {
        self.len
    }

    /// Returns `true` if at least one write had to be truncated.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.len == self.buf.len() && !self.buf.is_empty()
    }

    /// Returns the written bytes as a `str` (always valid UTF-8, since
    /// writes never split a multi-byte character across the boundary).
    #[must_use]
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.buf[..self.len]).unwrap_or("")
    }
}

impl fmt::Write for BoundedWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let remaining = self.buf.len() - self.len;
        if remaining == 0 {
            return Ok(());
        }
        let mut take = s.len().min(remaining);
        while take > 0 && !s.is_char_boundary(take) {
            take -= 1;
        }
        self.buf[self.len..self.len + take].copy_from_slice(&s.as_bytes()[..take]);
        self.len += take;
        Ok(())
    }
}

/// Formats `args` into a buffer of at most `capacity` bytes, returning the
/// truncated message and the number of bytes written.
///
/// A `capacity` of zero disables formatting entirely (dispatch itself is
/// unaffected; only the message text is suppressed), returning an empty
/// string.
#[must_use]
pub fn format_bounded(capacity: usize, args: fmt::Arguments<'_>) -> (String, usize) {
    if capacity == 0 {
        return (String::new(), 0);
    }
    let mut buf = vec![0u8; capacity];
    let mut writer = BoundedWriter::new(&mut buf);
    let _ = fmt::Write::write_fmt(&mut writer, args);
    let written = writer.bytes_written();
    let s = writer.as_str().to_owned();
    (s, written)
}
