//! Signatures bound to one input of a transaction

use crate::encoding::{hex_bytes, hex_hash};
use crate::error::{Result, TxError};
use crate::keys::{PrivateKey, PublicKey};
use crate::sighash::SIGHASH_ALL;
use crate::types::Hash;
use secp256k1::{ecdsa::Signature, Message, Secp256k1};
use serde::{Deserialize, Serialize};

/// A signature over one input's sighash, together with the key and outpoint it covers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSignature {
    pub public_key: PublicKey,
    #[serde(with = "hex_hash")]
    pub prev_tx_id: Hash,
    pub output_index: u32,
    pub input_index: usize,
    /// DER encoding, without the sighash type byte
    #[serde(with = "hex_bytes")]
    pub signature: Vec<u8>,
    #[serde(default = "default_sigtype")]
    pub sigtype: u32,
}

fn default_sigtype() -> u32 {
    SIGHASH_ALL
}

impl TransactionSignature {
    /// DER ‖ sighash type, as pushed by unlocking scripts and witnesses
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.signature.clone();
        out.push(self.sigtype as u8);
        out
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Deterministic (RFC6979) low-S ECDSA signature of a 32-byte digest, DER encoded
pub fn sign_digest(digest: &Hash, key: &PrivateKey) -> Result<Vec<u8>> {
    let secp = Secp256k1::signing_only();
    let msg = Message::from_digest_slice(digest).map_err(|e| TxError::InvalidSignature(e.to_string()))?;
    let sig: Signature = secp.sign_ecdsa(&msg, &key.secret);
    Ok(sig.serialize_der().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::verify_ecdsa;

    #[test]
    fn test_sign_digest_verifies() {
        let key = PrivateKey::from_wif("cSY2jbTDyPhmEx94TD72NwuHQ4J4pxzMEjj8G1Nc7c1eptCnevza").unwrap();
        let digest = [7u8; 32];
        let der = sign_digest(&digest, &key).unwrap();
        assert!(verify_ecdsa(&digest, &der, &key.public_key().to_bytes()));
        assert!(!verify_ecdsa(&[8u8; 32], &der, &key.public_key().to_bytes()));
    }

    #[test]
    fn test_object_form() {
        let key = PrivateKey::from_wif("cSY2jbTDyPhmEx94TD72NwuHQ4J4pxzMEjj8G1Nc7c1eptCnevza").unwrap();
        let sig = TransactionSignature {
            public_key: key.public_key(),
            prev_tx_id: [0xab; 32],
            output_index: 1,
            input_index: 0,
            signature: sign_digest(&[1u8; 32], &key).unwrap(),
            sigtype: SIGHASH_ALL,
        };
        let json = sig.to_json().unwrap();
        assert!(json.contains("\"prevTxId\""));
        assert!(json.contains("\"publicKey\":\"038cf340b469648f6ad7172eba59228e38a3fe5df80c106da19c4dbf1bcab938bb\""));
        assert_eq!(TransactionSignature::from_json(&json).unwrap(), sig);
        assert_eq!(*sig.to_bytes().last().unwrap(), 0x01);
    }
}
