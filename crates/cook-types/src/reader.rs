//! Consume-once byte-stream values.

use std::cell::RefCell;
use std::fmt;
use std::io::{self, Read};
use std::rc::Rc;

/// An opaque byte source carried as a runtime value.
///
/// Readers are produced by file reads (`~'path'`), captured command output,
/// and HTTP bodies. A reader is consumed at most once: the first consumer
/// (redirect, pipe, CLI printing) takes the underlying stream, subsequent
/// takes observe an already-drained reader.
///
/// Cloning is shallow: clones share the same underlying stream.
#[derive(Clone)]
pub struct Reader {
    inner: Rc<RefCell<Option<Box<dyn Read>>>>,
}

impl Reader {
    /// Wrap an arbitrary byte stream.
    pub fn new(read: Box<dyn Read>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Some(read))),
        }
    }

    /// A reader over an in-memory string.
    pub fn from_string(s: String) -> Self {
        Self::new(Box::new(io::Cursor::new(s.into_bytes())))
    }

    /// A reader over in-memory bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self::new(Box::new(io::Cursor::new(bytes)))
    }

    /// Take the underlying stream, leaving the reader drained.
    pub fn take(&self) -> Option<Box<dyn Read>> {
        self.inner.borrow_mut().take()
    }

    /// Whether the stream has already been consumed.
    pub fn is_drained(&self) -> bool {
        self.inner.borrow().is_none()
    }

    /// Drain the stream into a string. A consumed reader drains to "".
    pub fn read_to_string(&self) -> io::Result<String> {
        match self.take() {
            Some(mut read) => {
                let mut buf = String::new();
                read.read_to_string(&mut buf)?;
                Ok(buf)
            }
            None => Ok(String::new()),
        }
    }

    /// Copy the stream into a writer, returning the number of bytes copied.
    pub fn copy_to(&self, w: &mut dyn io::Write) -> io::Result<u64> {
        match self.take() {
            Some(mut read) => io::copy(&mut read, w),
            None => Ok(0),
        }
    }
}

impl fmt::Debug for Reader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reader")
            .field("drained", &self.is_drained())
            .finish()
    }
}

impl PartialEq for Reader {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_once_then_drained() {
        let r = Reader::from_string("hello".into());
        assert!(!r.is_drained());
        assert_eq!(r.read_to_string().unwrap(), "hello");
        assert!(r.is_drained());
        assert_eq!(r.read_to_string().unwrap(), "");
    }

    #[test]
    fn clones_share_the_stream() {
        let r = Reader::from_string("once".into());
        let c = r.clone();
        assert_eq!(c.read_to_string().unwrap(), "once");
        assert!(r.is_drained());
    }

    #[test]
    fn copy_to_writes_all_bytes() {
        let r = Reader::from_bytes(vec![1, 2, 3]);
        let mut out = Vec::new();
        assert_eq!(r.copy_to(&mut out).unwrap(), 3);
        assert_eq!(out, vec![1, 2, 3]);
    }
}
