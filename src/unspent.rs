//! Spendable outputs handed to `Transaction::from`

use crate::address::Address;
use crate::constants::{MAX_MONEY, SATOSHIS_PER_FLO};
use crate::encoding::hex_hash;
use crate::error::{Result, TxError};
use crate::output::Output;
use crate::script::Script;
use crate::types::Hash;
use serde::{Deserialize, Serialize};

/// A previous output together with its outpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnspentOutput {
    /// Transaction id in display order
    pub tx_id: Hash,
    pub output_index: u32,
    pub script: Script,
    pub satoshis: u64,
    pub address: Option<Address>,
}

/// JSON shape, accepting both the library's and the node RPC's field names
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnspentOutputObject {
    #[serde(alias = "txid", with = "hex_hash")]
    pub tx_id: Hash,
    #[serde(alias = "vout")]
    pub output_index: u32,
    #[serde(alias = "scriptPubKey", default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub satoshis: Option<u64>,
    /// Coin units
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl UnspentOutput {
    pub fn new(tx_id: Hash, output_index: u32, script: Script, satoshis: u64) -> Self {
        Self {
            tx_id,
            output_index,
            script,
            satoshis,
            address: None,
        }
    }

    /// From a hex txid as printed by explorers
    pub fn from_hex_txid(tx_id: &str, output_index: u32, script: Script, satoshis: u64) -> Result<Self> {
        let mut hash = [0u8; 32];
        hex::decode_to_slice(tx_id, &mut hash)?;
        Ok(Self::new(hash, output_index, script, satoshis))
    }

    pub fn output(&self) -> Output {
        Output::new(self.satoshis, self.script.clone())
    }

    pub fn from_object(obj: UnspentOutputObject) -> Result<Self> {
        let address = obj
            .address
            .as_deref()
            .map(str::parse::<Address>)
            .transpose()?;
        let script = match (&obj.script, &address) {
            (Some(s), _) => Script::from_hex_or_mnemonic(s)?,
            (None, Some(addr)) => Script::from_address(addr),
            (None, None) => return Err(TxError::InvalidArgument("unspent output needs a script or an address".into())),
        };
        let satoshis = match (obj.satoshis, obj.amount) {
            (Some(s), _) => s,
            (None, Some(amount)) => coins_to_satoshis(amount)?,
            (None, None) => return Err(TxError::InvalidArgument("unspent output needs satoshis or amount".into())),
        };
        if satoshis > MAX_MONEY {
            return Err(TxError::InvalidAmount(format!("{} exceeds the supply ceiling", satoshis)));
        }
        Ok(Self {
            tx_id: obj.tx_id,
            output_index: obj.output_index,
            script,
            satoshis,
            address,
        })
    }

    pub fn to_object(&self) -> UnspentOutputObject {
        UnspentOutputObject {
            tx_id: self.tx_id,
            output_index: self.output_index,
            script: Some(self.script.to_hex()),
            satoshis: Some(self.satoshis),
            amount: None,
            address: self.address.map(|a| a.to_string()),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_object(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_object())?)
    }
}

/// Coin amount to the smallest unit, rounded to the nearest unit
fn coins_to_satoshis(amount: f64) -> Result<u64> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(TxError::InvalidAmount(format!("invalid amount {}", amount)));
    }
    let satoshis = (amount * SATOSHIS_PER_FLO as f64).round();
    if satoshis > MAX_MONEY as f64 {
        return Err(TxError::InvalidAmount(format!("{} exceeds the supply ceiling", amount)));
    }
    Ok(satoshis as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_field_names() {
        let json = r#"{
            "txid": "a477af6b2667c29670467e4e0728b685ee07b240235771862318e29ddbe58458",
            "vout": 1,
            "scriptPubKey": "76a914089acaba6af8b2b4fb4bed2b747de8ef2c49b5ca88ac",
            "amount": 0.00070000
        }"#;
        let utxo = UnspentOutput::from_json(json).unwrap();
        assert_eq!(utxo.output_index, 1);
        assert_eq!(utxo.satoshis, 70000);
        assert!(utxo.script.is_public_key_hash_out());
        assert_eq!(hex::encode(utxo.tx_id), "a477af6b2667c29670467e4e0728b685ee07b240235771862318e29ddbe58458");
    }

    #[test]
    fn test_amount_rounding() {
        assert_eq!(coins_to_satoshis(0.1 + 0.2).unwrap(), 30_000_000);
        assert!(coins_to_satoshis(-1.0).is_err());
        assert!(coins_to_satoshis(f64::NAN).is_err());
    }

    #[test]
    fn test_script_from_address() {
        let json = r#"{"txId":"0fa147b287dacf753fd5f0e9aaf342464555b78960352ec043b9f7289e82e60f","outputIndex":0,"address":"QeJdou13jd18ghcr3F2ktDff1nvbjJnGrS","satoshis":1000000}"#;
        let utxo = UnspentOutput::from_json(json).unwrap();
        assert!(utxo.script.is_script_hash_out());
        assert!(utxo.address.is_some());
    }

    #[test]
    fn test_missing_value_rejected() {
        let json = r#"{"txId":"0fa147b287dacf753fd5f0e9aaf342464555b78960352ec043b9f7289e82e60f","outputIndex":0,"script":"51"}"#;
        assert!(matches!(UnspentOutput::from_json(json), Err(TxError::InvalidArgument(_))));
    }
}
