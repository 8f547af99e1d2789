//! Network parameter tables
//!
//! Parameters are immutable and looked up by name. There is no process-wide default
//! network; callers pass a [`Network`] wherever an encoding depends on it.

use crate::error::{Result, TxError};
use std::fmt;
use std::str::FromStr;

/// Named FLO network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Network {
    Livenet,
    Testnet,
}

/// Version bytes, magic and port of one network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkParams {
    pub name: &'static str,
    pub pubkey_hash: u8,
    pub script_hash: u8,
    /// Alternate script-hash version byte still accepted when decoding
    pub script_hash_alt: u8,
    pub private_key: u8,
    pub magic: u32,
    pub port: u16,
}

static LIVENET: NetworkParams = NetworkParams {
    name: "livenet",
    pubkey_hash: 0x23,
    script_hash: 0x5e,
    script_hash_alt: 0x08,
    private_key: 0xa3,
    magic: 0xfdc0_a5f1,
    port: 7312,
};

static TESTNET: NetworkParams = NetworkParams {
    name: "testnet",
    pubkey_hash: 0x73,
    script_hash: 0x3a,
    script_hash_alt: 0xc6,
    private_key: 0xef,
    magic: 0xfdc0_5af2,
    port: 17312,
};

impl Network {
    pub const ALL: [Network; 2] = [Network::Livenet, Network::Testnet];

    pub fn params(self) -> &'static NetworkParams {
        match self {
            Network::Livenet => &LIVENET,
            Network::Testnet => &TESTNET,
        }
    }

    /// Network whose private key (WIF) prefix is `version`
    pub fn from_private_key_version(version: u8) -> Option<Network> {
        Self::ALL
            .into_iter()
            .find(|n| n.params().private_key == version)
    }

    /// Network and address kind for an address version byte
    pub fn from_address_version(version: u8) -> Option<(Network, bool)> {
        Self::ALL.into_iter().find_map(|n| {
            let p = n.params();
            if p.pubkey_hash == version {
                Some((n, false))
            } else if p.script_hash == version || p.script_hash_alt == version {
                Some((n, true))
            } else {
                None
            }
        })
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.params().name)
    }
}

impl FromStr for Network {
    type Err = TxError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "livenet" | "mainnet" => Ok(Network::Livenet),
            "testnet" | "regtest" => Ok(Network::Testnet),
            other => Err(TxError::InvalidArgument(format!("unknown network {}", other))),
        }
    }
}
