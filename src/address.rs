//! Base58check addresses for pay-to-pubkey-hash and pay-to-script-hash targets

use crate::error::{Result, TxError};
use crate::hash::hash160;
use crate::keys::{check_payload, with_checksum, PublicKey};
use crate::network::Network;
use crate::script::Script;
use crate::types::Hash160;
use base58::{FromBase58, ToBase58};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Address {
    PublicKeyHash { hash: Hash160, network: Network },
    ScriptHash { hash: Hash160, network: Network },
}

impl Address {
    pub fn from_script_hash(redeem_script: &Script, network: Network) -> Self {
        Address::ScriptHash {
            hash: hash160(&redeem_script.to_bytes()),
            network,
        }
    }

    /// P2SH address of an M-of-N multisig, optionally wrapped as a nested witness program
    pub fn create_multisig(
        public_keys: &[PublicKey],
        threshold: usize,
        network: Network,
        nested_witness: bool,
    ) -> Result<Self> {
        let redeem = Script::build_multisig_out(public_keys, threshold, true)?;
        let wrapped = if nested_witness {
            Script::build_witness_multisig_out_from_script(&redeem)
        } else {
            redeem
        };
        Ok(Self::from_script_hash(&wrapped, network))
    }

    /// Address paid by a standard locking script, if it has one
    pub fn from_script(script: &Script, network: Network) -> Option<Self> {
        if script.is_public_key_hash_out() {
            let mut hash = [0u8; 20];
            hash.copy_from_slice(script.chunks()[2].data.as_deref()?);
            Some(Address::PublicKeyHash { hash, network })
        } else if script.is_script_hash_out() {
            let mut hash = [0u8; 20];
            hash.copy_from_slice(script.chunks()[1].data.as_deref()?);
            Some(Address::ScriptHash { hash, network })
        } else {
            None
        }
    }

    pub fn network(&self) -> Network {
        match self {
            Address::PublicKeyHash { network, .. } | Address::ScriptHash { network, .. } => *network,
        }
    }

    pub fn hash(&self) -> &Hash160 {
        match self {
            Address::PublicKeyHash { hash, .. } | Address::ScriptHash { hash, .. } => hash,
        }
    }

    pub fn is_script_hash(&self) -> bool {
        matches!(self, Address::ScriptHash { .. })
    }

    fn version(&self) -> u8 {
        let params = self.network().params();
        match self {
            Address::PublicKeyHash { .. } => params.pubkey_hash,
            Address::ScriptHash { .. } => params.script_hash,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut payload = vec![self.version()];
        payload.extend_from_slice(self.hash());
        f.write_str(&with_checksum(payload).to_base58())
    }
}

impl FromStr for Address {
    type Err = TxError;

    fn from_str(s: &str) -> Result<Self> {
        let data = s
            .from_base58()
            .map_err(|e| TxError::InvalidAddress(format!("{}: invalid base58 {:?}", s, e)))?;
        let payload =
            check_payload(&data).map_err(|e| TxError::InvalidAddress(format!("{}: {}", s, e)))?;
        if payload.len() != 21 {
            return Err(TxError::InvalidAddress(format!("{}: wrong payload length", s)));
        }
        let (network, script_hash) = Network::from_address_version(payload[0])
            .ok_or_else(|| TxError::InvalidAddress(format!("{}: unknown version byte", s)))?;
        let mut hash = [0u8; 20];
        hash.copy_from_slice(&payload[1..]);
        Ok(if script_hash {
            Address::ScriptHash { hash, network }
        } else {
            Address::PublicKeyHash { hash, network }
        })
    }
}
