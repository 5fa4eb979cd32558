//! A writer that hashes everything it writes.

use sha2::{Digest, Sha256};
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Writes chunks to an inner sink and feeds the same bytes to SHA-256.
///
/// The fetch loop pushes each body chunk through [`HashingWriter::write_chunk`]
/// exactly once, so the digest always describes the bytes on disk.
#[derive(Debug)]
pub struct HashingWriter<W> {
    inner: W,
    hasher: Sha256,
    written: u64,
}

impl<W: AsyncWrite + Unpin> HashingWriter<W> {
    /// Wrap a sink.
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
            written: 0,
        }
    }

    /// Write a chunk to the sink and the hasher.
    ///
    /// # Errors
    ///
    /// Returns the sink's I/O error; the hasher is only updated after the
    /// chunk was written.
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> std::io::Result<()> {
        self.inner.write_all(chunk).await?;
        self.hasher.update(chunk);
        self.written = self.written.saturating_add(chunk.len() as u64);
        Ok(())
    }

    /// Bytes written so far.
    pub const fn written(&self) -> u64 {
        self.written
    }

    /// Flush the sink and return it with the lowercase hex digest.
    ///
    /// # Errors
    ///
    /// Returns the sink's flush error.
    pub async fn finish(mut self) -> std::io::Result<(W, String)> {
        self.inner.flush().await?;
        let digest = hex::encode(self.hasher.finalize());
        Ok((self.inner, digest))
    }
}

/// Lowercase hex SHA-256 of a byte slice.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    const HELLO_WORLD_SHA256: &str =
        "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    #[test]
    fn test_sha256_hex_known_vector() {
        assert_eq!(sha256_hex(b"hello world"), HELLO_WORLD_SHA256);
    }

    #[tokio::test]
    async fn test_chunked_writes_match_single_digest() {
        let mut writer = HashingWriter::new(Vec::new());
        writer.write_chunk(b"hello").await.unwrap();
        writer.write_chunk(b" ").await.unwrap();
        writer.write_chunk(b"world").await.unwrap();
        assert_eq!(writer.written(), 11);

        let (sink, digest) = writer.finish().await.unwrap();
        assert_eq!(sink, b"hello world");
        assert_eq!(digest, HELLO_WORLD_SHA256);
    }

    #[tokio::test]
    async fn test_empty_payload() {
        let writer = HashingWriter::new(Vec::new());
        let (_, digest) = writer.finish().await.unwrap();
        assert_eq!(
            digest,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
