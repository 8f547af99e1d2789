//! Private and public keys with WIF encoding

use crate::address::Address;
use crate::error::{Result, TxError};
use crate::hash::{hash160, sha256d};
use crate::network::Network;
use crate::types::Hash160;
use base58::{FromBase58, ToBase58};
use secp256k1::{Secp256k1, SecretKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Public key, remembering whether it was given in compressed form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey {
    pub inner: secp256k1::PublicKey,
    pub compressed: bool,
}

impl PublicKey {
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        let inner = secp256k1::PublicKey::from_slice(data)
            .map_err(|e| TxError::InvalidKey(e.to_string()))?;
        Ok(Self {
            inner,
            compressed: data.len() == 33,
        })
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        Self::from_slice(&hex::decode(s)?)
    }

    /// SEC1 encoding in the form the key was created with
    pub fn to_bytes(&self) -> Vec<u8> {
        if self.compressed {
            self.inner.serialize().to_vec()
        } else {
            self.inner.serialize_uncompressed().to_vec()
        }
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// HASH160 of the encoded key
    pub fn pubkey_hash(&self) -> Hash160 {
        hash160(&self.to_bytes())
    }

    pub fn to_address(&self, network: Network) -> Address {
        Address::PublicKeyHash {
            hash: self.pubkey_hash(),
            network,
        }
    }
}

/// Keys order by their serialized bytes, which is also their hex order
impl Ord for PublicKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_bytes().cmp(&other.to_bytes())
    }
}

impl PartialOrd for PublicKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for PublicKey {
    type Err = TxError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        PublicKey::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Secret key bound to the network it was encoded for
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey {
    pub secret: SecretKey,
    pub compressed: bool,
    pub network: Network,
}

impl PrivateKey {
    pub fn new(secret: SecretKey, network: Network) -> Self {
        Self {
            secret,
            compressed: true,
            network,
        }
    }

    /// Raw 32-byte hex secret, compressed public key
    pub fn from_hex(s: &str, network: Network) -> Result<Self> {
        let secret = SecretKey::from_slice(&hex::decode(s)?)
            .map_err(|e| TxError::InvalidKey(e.to_string()))?;
        Ok(Self::new(secret, network))
    }

    /// Wallet import format: version ‖ secret ‖ [0x01 if compressed] ‖ checksum
    pub fn from_wif(wif: &str) -> Result<Self> {
        let data = wif
            .from_base58()
            .map_err(|e| TxError::InvalidKey(format!("invalid base58: {:?}", e)))?;
        let payload = check_payload(&data).map_err(TxError::InvalidKey)?;
        let compressed = match payload.len() {
            33 => false,
            34 if payload[33] == 0x01 => true,
            _ => return Err(TxError::InvalidKey("invalid WIF length".to_string())),
        };
        let network = Network::from_private_key_version(payload[0])
            .ok_or_else(|| TxError::InvalidKey(format!("unknown WIF version {}", payload[0])))?;
        let secret = SecretKey::from_slice(&payload[1..33])
            .map_err(|e| TxError::InvalidKey(e.to_string()))?;
        Ok(Self {
            secret,
            compressed,
            network,
        })
    }

    pub fn to_wif(&self) -> String {
        let mut payload = vec![self.network.params().private_key];
        payload.extend_from_slice(&self.secret.secret_bytes());
        if self.compressed {
            payload.push(0x01);
        }
        with_checksum(payload).to_base58()
    }

    pub fn public_key(&self) -> PublicKey {
        let secp = Secp256k1::signing_only();
        PublicKey {
            inner: secp256k1::PublicKey::from_secret_key(&secp, &self.secret),
            compressed: self.compressed,
        }
    }

    pub fn to_address(&self) -> Address {
        self.public_key().to_address(self.network)
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("public_key", &self.public_key().to_hex())
            .field("network", &self.network)
            .finish()
    }
}

impl FromStr for PrivateKey {
    type Err = TxError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_wif(s)
    }
}

/// Append the 4-byte double-SHA256 checksum
pub(crate) fn with_checksum(mut payload: Vec<u8>) -> Vec<u8> {
    let checksum = sha256d(&payload);
    payload.extend_from_slice(&checksum[..4]);
    payload
}

/// Strip and validate the 4-byte checksum
pub(crate) fn check_payload(data: &[u8]) -> std::result::Result<&[u8], String> {
    if data.len() < 5 {
        return Err("payload too short".to_string());
    }
    let (payload, checksum) = data.split_at(data.len() - 4);
    if sha256d(payload)[..4] != *checksum {
        return Err("checksum mismatch".to_string());
    }
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WIF: &str = "cSY2jbTDyPhmEx94TD72NwuHQ4J4pxzMEjj8G1Nc7c1eptCnevza";

    #[test]
    fn test_wif_roundtrip() {
        let key = PrivateKey::from_wif(WIF).unwrap();
        assert_eq!(key.network, Network::Testnet);
        assert!(key.compressed);
        assert_eq!(key.to_wif(), WIF);
    }

    #[test]
    fn test_wif_address() {
        let key = PrivateKey::from_wif(WIF).unwrap();
        assert_eq!(key.to_address().to_string(), "oPoBiZJxdHtNYVNhNTspRE8a4id6ytMKzY");
    }

    #[test]
    fn test_bad_checksum_rejected() {
        let mut wif = WIF.to_string();
        wif.pop();
        wif.push('b');
        assert!(PrivateKey::from_wif(&wif).is_err());
    }

    #[test]
    fn test_public_key_ordering_follows_bytes() {
        let a = PublicKey::from_hex(
            "0235f6364aca36f01702b8dab94060acf431feaf94e24668c350c747c24ea57d14",
        )
        .unwrap();
        let b = PublicKey::from_hex(
            "025d5fdce77bdbff09d3139d5716bfb4d1a269cf642c34b2049f6c5558b59006e4",
        )
        .unwrap();
        assert!(a < b);
    }
}
