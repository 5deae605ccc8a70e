//! Bounded-memory, cancellable byte copying.

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use zeroize::Zeroizing;

use crate::error::QfeError;

/// Size of the copy buffer. Matches the age STREAM chunk size.
pub const CHUNK_SIZE: usize = 64 * 1024;

const RUNNING: u8 = 0;
const CANCELLED: u8 = 1;
const COMMITTED: u8 = 2;

/// Shared flag used to stop a long-running operation.
///
/// An operation checks it between chunks and claims it with
/// [`begin_commit`](Self::begin_commit) right before its first durable write.
/// Cancellation and commit are mutually exclusive: whichever comes first wins.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicU8>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Every clone observes it.
    ///
    /// Returns `false` if the operation already passed its commit point, in
    /// which case it will run to completion.
    pub fn cancel(&self) -> bool {
        match self
            .0
            .compare_exchange(RUNNING, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => true,
            Err(state) => state == CANCELLED,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire) == CANCELLED
    }

    /// Pass the commit point. Later calls to [`cancel`](Self::cancel) have no
    /// effect.
    ///
    /// # Errors
    ///
    /// Returns `QfeError::Cancelled` if cancellation was requested first.
    pub fn begin_commit(&self) -> Result<(), QfeError> {
        match self
            .0
            .compare_exchange(RUNNING, COMMITTED, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) | Err(COMMITTED) => Ok(()),
            Err(_) => Err(QfeError::Cancelled),
        }
    }
}

/// Why a chunked copy stopped.
#[derive(Debug)]
pub enum CopyError {
    /// The source failed (for decryption this is an authentication failure)
    Read(io::Error),
    /// The sink failed
    Write(io::Error),
    Cancelled,
}

/// Copy `reader` into `writer` one chunk at a time, checking `cancel` before
/// each chunk. The buffer is zeroized on return since it may hold plaintext.
pub fn copy_chunked(
    reader: &mut dyn Read,
    writer: &mut dyn Write,
    cancel: &CancelFlag,
) -> Result<u64, CopyError> {
    let mut buf = Zeroizing::new(vec![0u8; CHUNK_SIZE]);
    let mut total = 0u64;

    loop {
        if cancel.is_cancelled() {
            return Err(CopyError::Cancelled);
        }

        let read = match reader.read(&mut buf[..]) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(CopyError::Read(e)),
        };

        writer.write_all(&buf[..read]).map_err(CopyError::Write)?;
        total += read as u64;
    }

    writer.flush().map_err(CopyError::Write)?;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::InvalidData, "bad chunk"))
        }
    }

    #[test]
    fn test_copies_multiple_chunks() {
        let data = vec![7u8; CHUNK_SIZE * 2 + 17];
        let mut out = Vec::new();
        let copied = copy_chunked(&mut Cursor::new(&data), &mut out, &CancelFlag::new()).unwrap();
        assert_eq!(copied, data.len() as u64);
        assert_eq!(out, data);
    }

    #[test]
    fn test_cancelled_before_first_chunk() {
        let cancel = CancelFlag::new();
        cancel.clone().cancel();
        let mut out = Vec::new();
        let result = copy_chunked(&mut Cursor::new(vec![1u8; 10]), &mut out, &cancel);
        assert!(matches!(result, Err(CopyError::Cancelled)));
        assert!(out.is_empty());
    }

    #[test]
    fn test_commit_and_cancel_are_exclusive() {
        let committed = CancelFlag::new();
        committed.begin_commit().unwrap();
        assert!(!committed.cancel());
        assert!(!committed.is_cancelled());
        committed.begin_commit().unwrap();

        let cancelled = CancelFlag::new();
        assert!(cancelled.cancel());
        assert!(cancelled.cancel());
        assert!(matches!(cancelled.begin_commit(), Err(QfeError::Cancelled)));
    }

    #[test]
    fn test_read_failure_is_reported_as_read() {
        let mut out = Vec::new();
        let result = copy_chunked(&mut FailingReader, &mut out, &CancelFlag::new());
        assert!(matches!(result, Err(CopyError::Read(_))));
    }
}
