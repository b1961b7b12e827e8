//! Bitstream image

use alloc::vec::Vec;

/// Immutable bitstream contents, treated as opaque bytes
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BitstreamImage {
    data: Vec<u8>,
}

impl BitstreamImage {
    /// Wrap image bytes
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Read a stream into memory, stopping one byte past `limit`
    ///
    /// `declared_len` only sizes the initial allocation. A result longer
    /// than `limit` means the stream holds more than the caller can use.
    #[cfg(feature = "std")]
    pub fn from_reader<R: std::io::Read>(
        reader: R,
        declared_len: usize,
        limit: usize,
    ) -> std::io::Result<Self> {
        let cap = limit.saturating_add(1);
        let mut data = Vec::with_capacity(declared_len.min(cap));
        let mut limited = std::io::Read::take(reader, cap as u64);
        std::io::Read::read_to_end(&mut limited, &mut data)?;
        Ok(Self { data })
    }

    /// Image length in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True for a zero-length image
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Image contents
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl From<Vec<u8>> for BitstreamImage {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl AsRef<[u8]> for BitstreamImage {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use std::io::Read;

    /// Endless stream of 0xA5 that counts what it hands out
    struct Endless {
        served: usize,
    }

    impl Read for Endless {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            buf.fill(0xA5);
            self.served += buf.len();
            Ok(buf.len())
        }
    }

    #[test]
    fn test_reader_stops_past_limit() {
        let mut stream = Endless { served: 0 };
        let image = BitstreamImage::from_reader(&mut stream, 0, 4096).unwrap();
        assert_eq!(image.len(), 4097);
        assert_eq!(stream.served, 4097);
    }

    #[test]
    fn test_short_reader_is_read_whole() {
        let bytes = [1u8, 2, 3];
        let image = BitstreamImage::from_reader(&bytes[..], 3, 4096).unwrap();
        assert_eq!(image.as_bytes(), &bytes);
    }
}
