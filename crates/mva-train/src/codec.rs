//! Artifact payload embedding: zlib recompression with a capped buffer.
//!
//! The external toolkit leaves a textual weights description on disk; the
//! calibration artifact stores it recompressed so the downstream evaluation
//! engine can inflate it with any standard zlib decoder. Compression runs
//! in a single pass into a buffer sized with fixed headroom; overflowing
//! that buffer is an error, never a truncation.

use std::io::{self, Write};
use std::path::Path;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use mva_core::{Error, Result};

/// One-pass buffer headroom: payload size plus ~3% plus a small constant.
fn buffer_capacity(len: usize) -> usize {
    len + len / 32 + 128
}

/// Read a weights file and compress its content into an artifact payload.
///
/// # Errors
///
/// [`Error::Io`] when the file is missing or unreadable, [`Error::Codec`]
/// when the compressed stream would not fit the headroom buffer.
pub fn embed_file(path: &Path) -> Result<Vec<u8>> {
    let raw = std::fs::read(path)
        .map_err(|e| io::Error::new(e.kind(), format!("reading {}: {e}", path.display())))?;
    compress_payload(&raw)
}

/// Compress `raw` into a buffer sized by the headroom formula.
pub fn compress_payload(raw: &[u8]) -> Result<Vec<u8>> {
    compress_capped(raw, buffer_capacity(raw.len()))
}

/// Compress `raw` into a buffer hard-capped at `capacity` bytes.
///
/// # Errors
///
/// [`Error::Codec`] when the compressed stream exceeds `capacity`.
pub fn compress_capped(raw: &[u8], capacity: usize) -> Result<Vec<u8>> {
    let cap_exceeded =
        |_| Error::Codec(format!("compressed payload exceeds {capacity}-byte buffer"));

    let mut encoder = ZlibEncoder::new(CappedBuffer::new(capacity), Compression::default());
    encoder.write_all(raw).map_err(cap_exceeded)?;
    let buffer = encoder.finish().map_err(cap_exceeded)?;
    Ok(buffer.into_inner())
}

/// In-memory sink that refuses writes past a fixed capacity.
struct CappedBuffer {
    buf: Vec<u8>,
    capacity: usize,
}

impl CappedBuffer {
    fn new(capacity: usize) -> Self {
        Self { buf: Vec::with_capacity(capacity), capacity }
    }

    fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

impl Write for CappedBuffer {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.buf.len() + data.len() > self.capacity {
            return Err(io::Error::new(io::ErrorKind::WriteZero, "buffer capacity exceeded"));
        }
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::ZlibDecoder;
    use rand::{Rng, SeedableRng};
    use std::io::Read;

    fn inflate(payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        ZlibDecoder::new(payload).read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn round_trips_empty_input() {
        let payload = compress_payload(b"").unwrap();
        assert!(!payload.is_empty());
        assert_eq!(inflate(&payload), b"");
    }

    #[test]
    fn round_trips_text() {
        let raw = b"weights: 0.25 -1.5 3.75\nbias: 0.5\n".repeat(40);
        let payload = compress_payload(&raw).unwrap();
        assert!(payload.len() < raw.len());
        assert_eq!(inflate(&payload), raw);
    }

    #[test]
    fn round_trips_incompressible_input() {
        // Random bytes barely compress; the headroom formula must still
        // leave room for the stored-block overhead.
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let raw: Vec<u8> = (0..64 * 1024).map(|_| rng.random()).collect();
        let payload = compress_payload(&raw).unwrap();
        assert_eq!(inflate(&payload), raw);
    }

    #[test]
    fn undersized_buffer_fails_instead_of_truncating() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(11);
        let raw: Vec<u8> = (0..4096).map(|_| rng.random()).collect();
        let err = compress_capped(&raw, 64).unwrap_err();
        assert!(matches!(err, Error::Codec(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = embed_file(Path::new("/no/such/weights.txt")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("weights.txt"));
    }
}
