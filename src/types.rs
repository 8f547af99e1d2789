//! Core value types shared across the crate

/// Hash type: 256-bit digest
pub type Hash = [u8; 32];

/// 160-bit digest used for key and script hashes
pub type Hash160 = [u8; 20];

/// Byte string type
pub type ByteString = Vec<u8>;

/// Witness stack of one input: 𝒲 = 𝕊*
pub type Witness = Vec<ByteString>;

/// Validation result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Valid,
    Invalid(String),
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }
}

/// Lock time interpretation: 𝓁 < 5×10⁸ ⟹ height, otherwise UNIX timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockTime {
    BlockHeight(u32),
    Timestamp(u32),
}

/// Null previous transaction id, used by coinbase inputs
pub const NULL_HASH: Hash = [0u8; 32];
