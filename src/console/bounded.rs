//! Measure-while-formatting sink for the console fast path

use std::fmt;

/// `fmt::Write` sink that fills a fixed slice and keeps counting past its end.
///
/// After formatting, [`len`](Self::len) is the true rendered length even when
/// only a prefix fit, so the caller learns the exact message size from a
/// single formatting pass.
pub(crate) struct BoundedWriter<'a> {
    buf: &'a mut [u8],
    len: usize,
}

impl<'a> BoundedWriter<'a> {
    pub(crate) fn new(buf: &'a mut [u8]) -> Self {
        BoundedWriter { buf, len: 0 }
    }

    /// Full rendered length, including bytes that did not fit
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Whether the whole rendered text landed in the slice
    pub(crate) fn fits(&self) -> bool {
        self.len <= self.buf.len()
    }
}

impl fmt::Write for BoundedWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let bytes = s.as_bytes();
        if self.len < self.buf.len() {
            let n = (self.buf.len() - self.len).min(bytes.len());
            self.buf[self.len..self.len + n].copy_from_slice(&bytes[..n]);
        }
        self.len += bytes.len();
        Ok(())
    }
}
