//! Difficulty classification: how far up the hierarchy a header's
//! proof-of-work reaches, regardless of which chain served it.

use crate::error::{Result, VisualizerError};
use crate::types::{BlockHash, Header, Level, HASH_BYTES_LENGTH, U256, U512};

const SEAL_DOMAIN: &[u8] = b"quai-header-seal-v1:";

struct SealEncoder {
    hasher: blake3::Hasher,
}

impl SealEncoder {
    fn new() -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(SEAL_DOMAIN);
        Self { hasher }
    }

    fn bytes(&mut self, data: &[u8]) {
        self.hasher.update(&(data.len() as u64).to_le_bytes());
        self.hasher.update(data);
    }

    fn count(&mut self, len: usize) {
        self.hasher.update(&(len as u64).to_le_bytes());
    }

    fn hashes(&mut self, values: &[BlockHash]) {
        self.count(values.len());
        for value in values {
            self.bytes(value.as_bytes());
        }
    }

    fn blobs(&mut self, values: &[Vec<u8>]) {
        self.count(values.len());
        for value in values {
            self.bytes(value);
        }
    }

    fn bigs(&mut self, values: &[U256]) {
        self.count(values.len());
        let mut buf = [0u8; HASH_BYTES_LENGTH];
        for value in values {
            value.to_big_endian(&mut buf);
            self.bytes(&buf);
        }
    }

    fn quantities(&mut self, values: &[u64]) {
        self.count(values.len());
        for value in values {
            self.bytes(&value.to_be_bytes());
        }
    }

    fn finish(self) -> BlockHash {
        BlockHash(*self.hasher.finalize().as_bytes())
    }
}

/// Hash of the header fields committed to by the proof-of-work, i.e. every
/// field except the header hash itself.
pub fn seal_hash(header: &Header) -> BlockHash {
    let mut enc = SealEncoder::new();
    enc.hashes(&header.parent_hash);
    enc.hashes(&header.state_root);
    enc.hashes(&header.tx_root);
    enc.hashes(&header.receipt_root);
    enc.blobs(&header.bloom);
    enc.bigs(&header.difficulty);
    enc.quantities(&header.number);
    enc.quantities(&header.gas_limit);
    enc.quantities(&header.gas_used);
    enc.bytes(&header.time.to_be_bytes());
    enc.bytes(&header.extra);
    enc.bytes(&header.location);
    if let Some(base_fee) = &header.base_fee {
        enc.bigs(base_fee);
    }
    enc.bytes(&header.nonce.to_be_bytes());
    enc.finish()
}

fn widen(value: &U256) -> U512 {
    let mut buf = [0u8; HASH_BYTES_LENGTH];
    value.to_big_endian(&mut buf);
    U512::from_big_endian(&buf)
}

/// `2^256 / difficulty`, which does not fit in 256 bits when the difficulty is 1.
fn target(difficulty: &U256) -> U512 {
    let mut two_pow_256 = [0u8; HASH_BYTES_LENGTH + 1];
    two_pow_256[0] = 1;
    U512::from_big_endian(&two_pow_256) / widen(difficulty)
}

/// Returns the most selective level whose target the header's seal hash meets.
///
/// Levels with a zero or missing difficulty are skipped.
pub fn classify(header: Option<&Header>) -> Result<Level> {
    let header = header.ok_or(VisualizerError::MissingHeader)?;
    let sealed = U512::from_big_endian(seal_hash(header).as_bytes());

    for level in Level::ALL {
        let Some(difficulty) = header.difficulty_at(level) else {
            continue;
        };
        if difficulty.is_zero() {
            continue;
        }
        if sealed <= target(&difficulty) {
            return Ok(level);
        }
    }

    Err(VisualizerError::NoQualifyingLevel(header.hash))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_with(difficulty: Vec<U256>) -> Header {
        Header {
            hash: BlockHash([7; HASH_BYTES_LENGTH]),
            difficulty,
            number: vec![1, 2, 3],
            nonce: 42,
            ..Header::default()
        }
    }

    #[test]
    fn unit_difficulty_always_qualifies() {
        let header = header_with(vec![U256::one(), U256::one(), U256::one()]);
        assert_eq!(classify(Some(&header)).unwrap(), Level::Prime);
    }

    #[test]
    fn zero_difficulty_levels_are_skipped() {
        let header = header_with(vec![U256::zero(), U256::zero(), U256::one()]);
        assert_eq!(classify(Some(&header)).unwrap(), Level::Zone);
    }

    #[test]
    fn falls_through_to_first_satisfied_level() {
        let header = header_with(vec![U256::max_value(), U256::one(), U256::one()]);
        assert_eq!(classify(Some(&header)).unwrap(), Level::Region);
    }

    #[test]
    fn unreachable_targets_fail() {
        let header = header_with(vec![U256::max_value(), U256::max_value(), U256::max_value()]);
        assert!(matches!(
            classify(Some(&header)),
            Err(VisualizerError::NoQualifyingLevel(_))
        ));

        let empty = header_with(vec![]);
        assert!(matches!(
            classify(Some(&empty)),
            Err(VisualizerError::NoQualifyingLevel(_))
        ));
    }

    #[test]
    fn missing_header_is_reported() {
        assert!(matches!(classify(None), Err(VisualizerError::MissingHeader)));
    }

    #[test]
    fn target_halves_with_difficulty() {
        let one = target(&U256::one());
        let two = target(&U256::from(2u64));
        assert_eq!(two + two, one);
    }

    #[test]
    fn seal_hash_ignores_header_hash_but_not_nonce() {
        let a = header_with(vec![U256::one()]);
        let mut b = a.clone();
        b.hash = BlockHash([9; HASH_BYTES_LENGTH]);
        assert_eq!(seal_hash(&a), seal_hash(&b));

        b.nonce += 1;
        assert_ne!(seal_hash(&a), seal_hash(&b));

        let mut c = a.clone();
        c.base_fee = Some(vec![]);
        assert_ne!(seal_hash(&a), seal_hash(&c));
    }
}
