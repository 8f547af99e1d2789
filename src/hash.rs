//! Hash primitives used by scripts, addresses and signature digests

use crate::types::{Hash, Hash160};
use bitcoin_hashes::{hash160, ripemd160, sha1, sha256, sha256d, Hash as BitcoinHash};

/// SHA256(x)
pub fn sha256(data: &[u8]) -> Hash {
    sha256::Hash::hash(data).into_inner()
}

/// SHA256(SHA256(x))
pub fn sha256d(data: &[u8]) -> Hash {
    sha256d::Hash::hash(data).into_inner()
}

/// RIPEMD160(x)
pub fn ripemd160(data: &[u8]) -> Hash160 {
    ripemd160::Hash::hash(data).into_inner()
}

/// SHA1(x)
pub fn sha1(data: &[u8]) -> [u8; 20] {
    sha1::Hash::hash(data).into_inner()
}

/// RIPEMD160(SHA256(x))
pub fn hash160(data: &[u8]) -> Hash160 {
    hash160::Hash::hash(data).into_inner()
}

/// Reverse a digest between internal and display byte order
pub fn reversed(hash: &Hash) -> Hash {
    let mut out = *hash;
    out.reverse();
    out
}
