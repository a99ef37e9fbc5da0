//! Compression support for the COLD/BACKUP object-store adapter.
//!
//! Compression is an adapter-level responsibility: the cold tier
//! value carries a `compressed` boolean so decoders pick the right path
//! on read.

use crate::error::{Error, Result};
use bytes::Bytes;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionAlgorithm {
    None,
    Lz4,
    Zstd,
    Snappy,
}

#[derive(Debug, Clone)]
pub struct CompressionConfig {
    pub default_algorithm: CompressionAlgorithm,
    pub min_size_bytes: u64,
    pub level: i32,
    pub fallback_on_failure: bool,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            default_algorithm: CompressionAlgorithm::Zstd,
            min_size_bytes: 256,
            level: 3,
            fallback_on_failure: true,
        }
    }
}

pub trait Compressor: Send + Sync {
    fn algorithm(&self) -> CompressionAlgorithm;
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>>;
}

pub struct NoopCompressor;

impl Compressor for NoopCompressor {
    fn algorithm(&self) -> CompressionAlgorithm {
        CompressionAlgorithm::None
    }
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }
}

pub struct Lz4Compressor {
    level: i32,
}

impl Lz4Compressor {
    pub fn with_level(level: i32) -> Self {
        Self { level }
    }
}

impl Compressor for Lz4Compressor {
    fn algorithm(&self) -> CompressionAlgorithm {
        CompressionAlgorithm::Lz4
    }
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        lz4::block::compress(
            data,
            Some(lz4::block::CompressionMode::HIGHCOMPRESSION(self.level)),
            true,
        )
        .map_err(|e| Error::Internal(format!("lz4 compression failed: {e}")))
    }
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        lz4::block::decompress(data, None)
            .map_err(|e| Error::Internal(format!("lz4 decompression failed: {e}")))
    }
}

pub struct ZstdCompressor {
    level: i32,
}

impl ZstdCompressor {
    pub fn with_level(level: i32) -> Self {
        Self { level }
    }
}

impl Compressor for ZstdCompressor {
    fn algorithm(&self) -> CompressionAlgorithm {
        CompressionAlgorithm::Zstd
    }
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        zstd::encode_all(data, self.level)
            .map_err(|e| Error::Internal(format!("zstd compression failed: {e}")))
    }
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        zstd::decode_all(data).map_err(|e| Error::Internal(format!("zstd decompression failed: {e}")))
    }
}

pub struct SnappyCompressor;

impl Compressor for SnappyCompressor {
    fn algorithm(&self) -> CompressionAlgorithm {
        CompressionAlgorithm::Snappy
    }
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        snap::raw::Encoder::new()
            .compress_vec(data)
            .map_err(|e| Error::Internal(format!("snappy compression failed: {e}")))
    }
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        snap::raw::Decoder::new()
            .decompress_vec(data)
            .map_err(|e| Error::Internal(format!("snappy decompression failed: {e}")))
    }
}

/// Picks an algorithm, compresses, and falls back to uncompressed when
/// compression doesn't help or the configured algorithm fails.
pub struct CompressionManager {
    config: CompressionConfig,
    lz4: Lz4Compressor,
    zstd: ZstdCompressor,
    snappy: SnappyCompressor,
    noop: NoopCompressor,
}

impl CompressionManager {
    pub fn new() -> Self {
        Self::with_config(CompressionConfig::default())
    }

    pub fn with_config(config: CompressionConfig) -> Self {
        Self {
            lz4: Lz4Compressor::with_level(config.level),
            zstd: ZstdCompressor::with_level(config.level),
            snappy: SnappyCompressor,
            noop: NoopCompressor,
            config,
        }
    }

    fn compressor(&self, algorithm: CompressionAlgorithm) -> &dyn Compressor {
        match algorithm {
            CompressionAlgorithm::None => &self.noop,
            CompressionAlgorithm::Lz4 => &self.lz4,
            CompressionAlgorithm::Zstd => &self.zstd,
            CompressionAlgorithm::Snappy => &self.snappy,
        }
    }

    /// Compress with the configured default algorithm, returning the
    /// algorithm actually used (`None` if skipped or it didn't help).
    pub fn compress(&self, data: &[u8]) -> (Bytes, CompressionAlgorithm) {
        if (data.len() as u64) < self.config.min_size_bytes {
            return (Bytes::copy_from_slice(data), CompressionAlgorithm::None);
        }
        let compressor = self.compressor(self.config.default_algorithm);
        match compressor.compress(data) {
            Ok(compressed) if compressed.len() < data.len() => {
                (Bytes::from(compressed), self.config.default_algorithm)
            }
            Ok(_) => (Bytes::copy_from_slice(data), CompressionAlgorithm::None),
            Err(e) => {
                if !self.config.fallback_on_failure {
                    tracing::warn!("compression failed, using uncompressed: {e}");
                }
                (Bytes::copy_from_slice(data), CompressionAlgorithm::None)
            }
        }
    }

    pub fn decompress(&self, data: &[u8], algorithm: CompressionAlgorithm) -> Result<Bytes> {
        Ok(Bytes::from(self.compressor(algorithm).decompress(data)?))
    }
}

impl Default for CompressionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_DATA: &[u8] = b"repeat repeat repeat repeat repeat repeat repeat repeat repeat";

    #[test]
    fn lz4_roundtrip() {
        let c = Lz4Compressor::with_level(4);
        let compressed = c.compress(TEST_DATA).unwrap();
        assert_eq!(c.decompress(&compressed).unwrap(), TEST_DATA);
    }

    #[test]
    fn zstd_roundtrip() {
        let c = ZstdCompressor::with_level(3);
        let compressed = c.compress(TEST_DATA).unwrap();
        assert_eq!(c.decompress(&compressed).unwrap(), TEST_DATA);
    }

    #[test]
    fn manager_skips_small_payloads() {
        let manager = CompressionManager::new();
        let (out, algo) = manager.compress(b"tiny");
        assert_eq!(algo, CompressionAlgorithm::None);
        assert_eq!(out.as_ref(), b"tiny");
    }

    #[test]
    fn manager_roundtrip() {
        let manager = CompressionManager::new();
        let (compressed, algo) = manager.compress(TEST_DATA);
        let back = manager.decompress(&compressed, algo).unwrap();
        assert_eq!(back.as_ref(), TEST_DATA);
    }
}
