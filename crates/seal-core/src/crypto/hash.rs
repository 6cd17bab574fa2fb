//! SHA-512 content digests rendered as lowercase hex.
//!
//! Used for identity and integrity checks; independent of encryption.

use std::io::{self, Read};

use sha2::{Digest, Sha512};

/// Read size for [`hash_reader`].
pub const CHUNK_SIZE: usize = 1024 * 1024;

/// Digest an in-memory byte slice.
pub fn hash_bytes(content: &[u8]) -> String {
    hex::encode(Sha512::digest(content))
}

/// Digest the UTF-8 bytes of `content`.
pub fn hash_text(content: &str) -> String {
    hash_bytes(content.as_bytes())
}

/// Digest a byte stream incrementally in [`CHUNK_SIZE`] reads.
///
/// The reader is taken by value and dropped (closed) before this function
/// returns, whether or not reading succeeded.
///
/// # Errors
///
/// Returns any I/O error raised by the reader other than `Interrupted`.
pub fn hash_reader<R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = Sha512::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => hasher.update(&buf[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Digest `content`, streaming it when it is larger than `threshold` bytes.
///
/// Both paths produce the same digest.
pub fn hash_auto(content: &[u8], threshold: u64) -> String {
    if content.len() as u64 <= threshold {
        return hash_bytes(content);
    }
    // Reading from a slice cannot fail.
    hash_reader(content).unwrap_or_else(|_| hash_bytes(content))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use super::*;

    const ABC_SHA512: &str = "ddaf35a193617abacc417349ae20413112e6fa4e89a97ea20a9eeee64b55d39a\
                              2192992a274fc1a836ba3c23a3feebbd454d4423643ce80e2a9ac94fa54ca49f";

    /// Reader that records when it is dropped and can fail mid-stream.
    struct TrackedReader {
        data: io::Cursor<Vec<u8>>,
        fail_after: Option<usize>,
        read_calls: usize,
        closed: Arc<AtomicBool>,
    }

    impl Read for TrackedReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.read_calls += 1;
            if self.fail_after.is_some_and(|n| self.read_calls > n) {
                return Err(io::Error::other("disk on fire"));
            }
            self.data.read(buf)
        }
    }

    impl Drop for TrackedReader {
        fn drop(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    fn reader(data: Vec<u8>, fail_after: Option<usize>) -> (TrackedReader, Arc<AtomicBool>) {
        let closed = Arc::new(AtomicBool::new(false));
        let r = TrackedReader {
            data: io::Cursor::new(data),
            fail_after,
            read_calls: 0,
            closed: closed.clone(),
        };
        (r, closed)
    }

    #[test]
    fn known_answer() {
        assert_eq!(hash_text("abc"), ABC_SHA512);
        assert_eq!(hash_bytes(b"abc"), ABC_SHA512);
    }

    #[test]
    fn digest_is_lowercase_hex() {
        let d = hash_bytes(b"anything");
        assert_eq!(d.len(), 128);
        assert!(d.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn stream_matches_in_memory_across_chunks() {
        let data: Vec<u8> = (0..(CHUNK_SIZE * 2 + 17)).map(|i| (i % 251) as u8).collect();
        let (r, closed) = reader(data.clone(), None);
        assert_eq!(hash_reader(r).unwrap(), hash_bytes(&data));
        assert!(closed.load(Ordering::SeqCst));
    }

    #[test]
    fn reader_is_closed_on_error() {
        let (r, closed) = reader(vec![1u8; CHUNK_SIZE * 3], Some(1));
        assert!(hash_reader(r).is_err());
        assert!(closed.load(Ordering::SeqCst));
    }

    #[test]
    fn auto_paths_agree() {
        let data = vec![42u8; 4096];
        assert_eq!(hash_auto(&data, 1024), hash_auto(&data, 1 << 20));
        assert_eq!(hash_auto(&data, 1024), hash_bytes(&data));
    }
}
