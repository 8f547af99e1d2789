//! Transaction outputs

use crate::constants::{DUST_AMOUNT, MAX_MONEY};
use crate::encoding::{write_var_bytes, Reader};
use crate::error::{Result, TxError};
use crate::script::Script;
use serde::{Deserialize, Serialize};

/// Value locked by a script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    pub satoshis: u64,
    pub script: Script,
}

/// Plain-object form: amount and hex script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputObject {
    pub satoshis: u64,
    pub script: String,
}

impl Output {
    pub fn new(satoshis: u64, script: Script) -> Self {
        Self { satoshis, script }
    }

    /// Amount is within the supply ceiling
    pub fn is_valid_satoshis(&self) -> bool {
        self.satoshis <= MAX_MONEY
    }

    /// Below the dust threshold and spendable
    pub fn is_dust(&self) -> bool {
        self.satoshis < DUST_AMOUNT && !self.script.is_data_out()
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.satoshis.to_le_bytes());
        write_var_bytes(out, &self.script.to_bytes());
    }

    pub fn read_from(reader: &mut Reader<'_>) -> Result<Self> {
        let satoshis = reader.read_u64_le()?;
        let script_start = reader.position();
        let script_bytes = reader.read_var_bytes()?;
        let script = Script::from_bytes(&script_bytes).map_err(|e| match e {
            TxError::Decode { offset, reason } => TxError::decode(script_start + offset, reason),
            other => other,
        })?;
        Ok(Self { satoshis, script })
    }

    pub fn to_object(&self) -> OutputObject {
        OutputObject {
            satoshis: self.satoshis,
            script: self.script.to_hex(),
        }
    }

    pub fn from_object(obj: &OutputObject) -> Result<Self> {
        if obj.satoshis > MAX_MONEY {
            return Err(TxError::InvalidAmount(format!("{} exceeds the supply ceiling", obj.satoshis)));
        }
        Ok(Self::new(obj.satoshis, Script::from_hex_or_mnemonic(&obj.script)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dust_threshold() {
        let script = Script::build_public_key_hash_out(&[1u8; 20]);
        assert!(Output::new(545, script.clone()).is_dust());
        assert!(!Output::new(546, script).is_dust());
        assert!(!Output::new(0, Script::build_data_out(b"hello")).is_dust());
    }

    #[test]
    fn test_wire_form() {
        let out = Output::new(50000, Script::build_public_key_hash_out(&[0xef; 20]));
        let mut buf = Vec::new();
        out.write_to(&mut buf);
        assert_eq!(&buf[..8], &50000u64.to_le_bytes());
        assert_eq!(buf[8], 25);
        let mut reader = Reader::new(&buf);
        assert_eq!(Output::read_from(&mut reader).unwrap(), out);
        assert!(reader.is_finished());
    }

    #[test]
    fn test_object_rejects_excess_amount() {
        let obj = OutputObject {
            satoshis: MAX_MONEY + 1,
            script: String::new(),
        };
        assert!(matches!(Output::from_object(&obj), Err(TxError::InvalidAmount(_))));
    }
}
