use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;

#[derive(Debug, Clone)]
pub struct CompressionConfig {
    pub enabled: bool,
    pub min_size_bytes: usize,
    pub level: u32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_size_bytes: 1024,
            level: 6,
        }
    }
}

pub struct CompressionOutcome {
    pub bytes: Vec<u8>,
    pub compressed: bool,
    pub original_size: usize,
}

/// Gzips `data` when it clears the threshold; falls back to the original
/// bytes if compression doesn't actually shrink the payload.
pub fn compress_payload(data: &[u8], config: &CompressionConfig) -> CompressionOutcome {
    let original_size = data.len();
    if !config.enabled || original_size < config.min_size_bytes {
        return CompressionOutcome {
            bytes: data.to_vec(),
            compressed: false,
            original_size,
        };
    }

    let mut encoder = GzEncoder::new(Vec::new(), Compression::new(config.level));
    let compressed = encoder
        .write_all(data)
        .and_then(|_| encoder.finish())
        .unwrap_or_else(|_| data.to_vec());

    if compressed.len() < original_size {
        CompressionOutcome {
            bytes: compressed,
            compressed: true,
            original_size,
        }
    } else {
        CompressionOutcome {
            bytes: data.to_vec(),
            compressed: false,
            original_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_payload_stays_uncompressed() {
        let outcome = compress_payload(b"tiny", &CompressionConfig::default());
        assert!(!outcome.compressed);
        assert_eq!(outcome.bytes, b"tiny");
    }

    #[test]
    fn large_repetitive_payload_compresses() {
        let data = "a".repeat(4096);
        let outcome = compress_payload(data.as_bytes(), &CompressionConfig::default());
        assert!(outcome.compressed);
        assert!(outcome.bytes.len() < outcome.original_size);
    }

    #[test]
    fn disabled_compression_is_noop() {
        let data = "a".repeat(4096);
        let config = CompressionConfig {
            enabled: false,
            ..Default::default()
        };
        let outcome = compress_payload(data.as_bytes(), &config);
        assert!(!outcome.compressed);
    }

    #[test]
    fn output_never_exceeds_input_even_when_incompressible() {
        // Pseudo-random bytes gzip likely can't shrink; the "only use
        // compressed if smaller" branch must still return something no
        // larger than the input.
        let data: Vec<u8> = (0..1100u32).map(|i| (i.wrapping_mul(2654435761) % 251) as u8).collect();
        let outcome = compress_payload(&data, &CompressionConfig::default());
        assert!(outcome.bytes.len() <= data.len());
    }
}
