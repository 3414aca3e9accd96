//! Stream utilities.

use std::marker::Unpin;
use std::pin::Pin;
use std::task::{Context, Poll};

use digest::Digest;
use tokio::io::{AsyncRead, ReadBuf};

use crate::hash::ContentHash;

/// Stream filter that hashes the bytes that have been read.
///
/// The hash is finalized when EOF is reached and can then be taken
/// with [`HashingReader::finalize`].
pub struct HashingReader<R: AsyncRead + Unpin, D: Digest + Unpin> {
    inner: R,
    digest: Option<D>,
    algorithm: &'static str,
    bytes_read: u64,
    finalized: Option<(ContentHash, u64)>,
}

impl<R: AsyncRead + Unpin, D: Digest + Unpin> HashingReader<R, D> {
    /// Wraps a reader, labelling the resulting hash with `algorithm`.
    pub fn new(inner: R, digest: D, algorithm: &'static str) -> Self {
        Self {
            inner,
            digest: Some(digest),
            algorithm,
            bytes_read: 0,
            finalized: None,
        }
    }

    /// Returns the hash and size of the content, once EOF has been reached.
    pub fn finalize(&self) -> Option<(ContentHash, u64)> {
        self.finalized.clone()
    }
}

impl<R: AsyncRead + Unpin, D: Digest + Unpin> AsyncRead for HashingReader<R, D> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<tokio::io::Result<()>> {
        let this = self.get_mut();
        let old_filled = buf.filled().len();
        let r = Pin::new(&mut this.inner).poll_read(cx, buf);
        let read_len = buf.filled().len() - old_filled;

        if let Poll::Ready(Ok(())) = r {
            if read_len == 0 {
                // EOF
                if let Some(digest) = this.digest.take() {
                    let hash = ContentHash::new(hex::encode(digest.finalize()), this.algorithm);
                    this.finalized = Some((hash, this.bytes_read));
                }
            } else if let Some(digest) = this.digest.as_mut() {
                let filled = buf.filled();
                digest.update(&filled[filled.len() - read_len..]);
                this.bytes_read += read_len as u64;
            }
        }

        r
    }
}
