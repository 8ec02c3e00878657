//! SHA-256 digests computed while a stream is consumed

use sha2::{Digest, Sha256};
use std::io::{self, Read};

/// Algorithm prefix of every digest this store produces
pub const SHA256_PREFIX: &str = "sha256:";

/// Reader adapter that hashes every byte passing through it.
///
/// The digest only describes the whole stream once the consumer has read it
/// to the end; call [`DigestReader::drain`] before [`DigestReader::finalize`]
/// when the consumer may stop early.
pub struct DigestReader<R> {
    inner: R,
    hasher: Sha256,
    bytes_read: u64,
}

impl<R: Read> DigestReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
            bytes_read: 0,
        }
    }

    /// Number of bytes hashed so far
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Read and hash whatever is left in the inner reader.
    pub fn drain(&mut self) -> io::Result<u64> {
        io::copy(self, &mut io::sink())
    }

    /// Finish hashing and return the `sha256:<hex>` digest.
    pub fn finalize(self) -> String {
        format!("{}{}", SHA256_PREFIX, hex::encode(self.hasher.finalize()))
    }
}

impl<R: Read> Read for DigestReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        self.bytes_read += n as u64;
        Ok(n)
    }
}

/// Digest of an in-memory buffer, in the same form as [`DigestReader::finalize`].
pub fn sha256_digest(bytes: &[u8]) -> String {
    format!("{}{}", SHA256_PREFIX, hex::encode(Sha256::digest(bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_stream() {
        let mut reader = DigestReader::new(io::empty());
        assert_eq!(reader.drain().unwrap(), 0);
        assert_eq!(
            reader.finalize(),
            "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_hash_matches_consumed_bytes() {
        let data = b"{\"schemaVersion\":2}\n".to_vec();
        let mut reader = DigestReader::new(data.as_slice());

        let mut first = [0u8; 5];
        reader.read_exact(&mut first).unwrap();
        assert_eq!(reader.bytes_read(), 5);

        reader.drain().unwrap();
        assert_eq!(reader.bytes_read(), data.len() as u64);
        assert_eq!(reader.finalize(), sha256_digest(&data));
    }

    #[test]
    fn test_tee_under_json_decoder() {
        let data = b"  {\"a\": [1, 2, 3]}  \n\n".to_vec();
        let mut reader = io::BufReader::new(DigestReader::new(data.as_slice()));

        let value: serde_json::Value = serde_json::from_reader(&mut reader).unwrap();
        assert_eq!(value["a"][2], 3);

        let mut tee = reader.into_inner();
        tee.drain().unwrap();
        assert_eq!(tee.finalize(), sha256_digest(&data));
    }
}
