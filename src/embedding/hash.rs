//! Deterministic embedding provider that needs no model files.
//!
//! Text is lowercased and split into alphanumeric tokens; each token
//! contributes its character trigrams (or the whole token when shorter than
//! three characters) to an FNV-1a hashed bucket. Text with no alphanumeric
//! token at all falls back to its individual non-space characters. The bucket
//! counts are L2-normalized. Texts sharing word stems land close together,
//! which is enough for offline use and for reproducible tests.

use anyhow::Result;

use super::{l2_normalize, EmbeddingProvider};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

#[derive(Debug, Clone)]
pub struct HashEmbeddingProvider {
    dimensions: usize,
}

impl HashEmbeddingProvider {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }
}

impl EmbeddingProvider for HashEmbeddingProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut buckets = vec![0.0f32; self.dimensions];
        let lowered = text.to_lowercase();
        let mut grams = 0usize;

        for token in lowered.split(|c: char| !c.is_alphanumeric()) {
            if token.is_empty() {
                continue;
            }
            let chars: Vec<char> = token.chars().collect();
            if chars.len() < 3 {
                buckets[self.bucket(token)] += 1.0;
                grams += 1;
                continue;
            }
            for window in chars.windows(3) {
                let gram: String = window.iter().collect();
                buckets[self.bucket(&gram)] += 1.0;
                grams += 1;
            }
        }

        if grams == 0 {
            for c in lowered.chars().filter(|c| !c.is_whitespace()) {
                buckets[self.bucket(c.encode_utf8(&mut [0u8; 4]))] += 1.0;
            }
        }

        Ok(l2_normalize(&buckets))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

impl HashEmbeddingProvider {
    fn bucket(&self, gram: &str) -> usize {
        (fnv1a(gram.as_bytes()) % self.dimensions as u64) as usize
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, &b| {
        (hash ^ u64::from(b)).wrapping_mul(FNV_PRIME)
    })
}
