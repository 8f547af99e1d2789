//! Transaction inputs and their signing protocols
//!
//! An [`Input`] spends one previous output. When that output is known, the shape of its
//! locking script selects an [`InputKind`], which knows how to sign for it, how to build
//! the unlocking script (and witness) from signatures, and how large the result will be.

mod multisig_script_hash;
mod public_key;
mod public_key_hash;

pub use multisig_script_hash::MultiSigScriptHashInput;

use crate::constants::DEFAULT_SEQNUMBER;
use crate::encoding::{hex_hash, write_var_bytes, Reader};
use crate::error::{Result, TxError};
use crate::hash::reversed;
use crate::interpreter::verify_ecdsa;
use crate::keys::{PrivateKey, PublicKey};
use crate::output::{Output, OutputObject};
use crate::script::Script;
use crate::sighash::compute_sighash;
use crate::signature::{sign_digest, TransactionSignature};
use crate::transaction::Transaction;
use crate::types::{Hash, Witness, NULL_HASH};
use crate::unspent::UnspentOutput;
use serde::{Deserialize, Serialize};

/// Signing protocol of an input, chosen from the locking script it redeems
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputKind {
    /// Unrecognised or unknown locking script: serializable, not signable
    Generic,
    /// `<pubkey> OP_CHECKSIG`
    PublicKey,
    /// Pay-to-pubkey-hash, or its native witness v0 form
    PublicKeyHash,
    /// M-of-N multisig behind pay-to-script-hash, optionally nested witness
    MultiSigScriptHash(MultiSigScriptHashInput),
}

/// Reference to a previous output plus the data that unlocks it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Input {
    /// Previous transaction id, display order
    pub prev_tx_id: Hash,
    pub output_index: u32,
    pub sequence_number: u32,
    script: Script,
    witnesses: Witness,
    output: Option<Output>,
    kind: InputKind,
}

/// Plain-object form of an input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputObject {
    #[serde(with = "hex_hash")]
    pub prev_tx_id: Hash,
    pub output_index: u32,
    #[serde(default = "default_sequence")]
    pub sequence_number: u32,
    #[serde(default)]
    pub script: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub witnesses: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_keys: Option<Vec<PublicKey>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signatures: Option<Vec<Option<TransactionSignature>>>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub nested_witness: bool,
}

fn default_sequence() -> u32 {
    DEFAULT_SEQNUMBER
}

impl Input {
    /// Input with no previous-output information
    pub fn new(prev_tx_id: Hash, output_index: u32, script: Script) -> Self {
        Self {
            prev_tx_id,
            output_index,
            sequence_number: DEFAULT_SEQNUMBER,
            script,
            witnesses: Vec::new(),
            output: None,
            kind: InputKind::Generic,
        }
    }

    /// Input spending `utxo`, its kind inferred from the locking script
    pub fn from_unspent(utxo: &UnspentOutput) -> Self {
        let script = &utxo.script;
        let kind = if script.is_public_key_hash_out() || script.is_witness_public_key_hash_out() {
            InputKind::PublicKeyHash
        } else if script.is_public_key_out() {
            InputKind::PublicKey
        } else {
            InputKind::Generic
        };
        Self {
            prev_tx_id: utxo.tx_id,
            output_index: utxo.output_index,
            sequence_number: DEFAULT_SEQNUMBER,
            script: Script::new(),
            witnesses: Vec::new(),
            output: Some(utxo.output()),
            kind,
        }
    }

    /// Input spending a P2SH (or nested witness) multisig output
    pub fn from_multisig(
        utxo: &UnspentOutput,
        public_keys: &[PublicKey],
        threshold: usize,
        nested_witness: bool,
    ) -> Result<Self> {
        if !utxo.script.is_script_hash_out() {
            return Err(TxError::UnsupportedScript(utxo.script.to_string()));
        }
        let multisig = MultiSigScriptHashInput::new(public_keys, threshold, nested_witness)?;
        if multisig.locking_script() != utxo.script {
            return Err(TxError::InvalidArgument(
                "provided public keys don't hash to the provided output".into(),
            ));
        }
        let mut input = Self {
            prev_tx_id: utxo.tx_id,
            output_index: utxo.output_index,
            sequence_number: DEFAULT_SEQNUMBER,
            script: Script::new(),
            witnesses: Vec::new(),
            output: Some(utxo.output()),
            kind: InputKind::MultiSigScriptHash(multisig),
        };
        input.rebuild_multisig_script();
        Ok(input)
    }

    pub fn kind(&self) -> &InputKind {
        &self.kind
    }

    pub fn multisig(&self) -> Option<&MultiSigScriptHashInput> {
        match &self.kind {
            InputKind::MultiSigScriptHash(m) => Some(m),
            _ => None,
        }
    }

    pub fn script(&self) -> &Script {
        &self.script
    }

    pub fn set_script(&mut self, script: Script) {
        self.script = script;
    }

    pub fn witnesses(&self) -> &Witness {
        &self.witnesses
    }

    pub fn set_witnesses(&mut self, witnesses: Witness) {
        self.witnesses = witnesses;
    }

    pub fn has_witnesses(&self) -> bool {
        !self.witnesses.is_empty()
    }

    pub fn output(&self) -> Option<&Output> {
        self.output.as_ref()
    }

    /// Attach the spent output; the kind is re-inferred from its script
    pub fn set_output(&mut self, output: Output) {
        let utxo = UnspentOutput::new(self.prev_tx_id, self.output_index, output.script.clone(), output.satoshis);
        let inferred = Self::from_unspent(&utxo);
        if !matches!(self.kind, InputKind::MultiSigScriptHash(_)) {
            self.kind = inferred.kind;
        }
        self.output = Some(output);
    }

    /// Coinbase marker: null txid and index 0xffffffff
    pub fn is_null(&self) -> bool {
        self.prev_tx_id == NULL_HASH && self.output_index == 0xffff_ffff
    }

    pub fn is_final(&self) -> bool {
        self.sequence_number == DEFAULT_SEQNUMBER
    }

    /// txid (wire order) ‖ index
    pub fn write_outpoint(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&reversed(&self.prev_tx_id));
        out.extend_from_slice(&self.output_index.to_le_bytes());
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        self.write_outpoint(out);
        write_var_bytes(out, &self.script.to_bytes());
        out.extend_from_slice(&self.sequence_number.to_le_bytes());
    }

    pub fn read_from(reader: &mut Reader<'_>) -> Result<Self> {
        let prev_tx_id = reversed(&reader.read_array::<32>()?);
        let output_index = reader.read_u32_le()?;
        let script_start = reader.position();
        let script_bytes = reader.read_var_bytes()?;
        let script = Script::from_bytes(&script_bytes).map_err(|e| match e {
            TxError::Decode { offset, reason } => TxError::decode(script_start + offset, reason),
            other => other,
        })?;
        let mut input = Self::new(prev_tx_id, output_index, script);
        input.sequence_number = reader.read_u32_le()?;
        Ok(input)
    }

    /// Estimated size of the unlocking data once signed
    pub fn estimate_size(&self) -> usize {
        match &self.kind {
            InputKind::Generic => self.script.byte_len(),
            InputKind::PublicKey => public_key::ESTIMATED_SIZE,
            InputKind::PublicKeyHash => public_key_hash::ESTIMATED_SIZE,
            InputKind::MultiSigScriptHash(m) => m.estimate_size(),
        }
    }

    /// Varint-prefixed redeem script of a multisig input
    pub fn script_code(&self) -> Option<Vec<u8>> {
        self.multisig().map(MultiSigScriptHashInput::script_code)
    }

    /// Spent amount, 8 bytes little-endian, as fed to the witness digest
    pub fn satoshis_buffer(&self) -> Option<[u8; 8]> {
        self.output.as_ref().map(|o| o.satoshis.to_le_bytes())
    }

    fn spent_output(&self) -> Result<&Output> {
        self.output
            .as_ref()
            .ok_or_else(|| TxError::NeedMoreInfo("input has no previous output information".into()))
    }

    /// Digest a signature of this input commits to
    pub fn sighash(&self, tx: &Transaction, input_index: usize, sighash_type: u32) -> Result<Hash> {
        let output = self.spent_output()?;
        let (subscript, is_witness) = match &self.kind {
            InputKind::Generic => return Err(TxError::UnsupportedScript(output.script.to_string())),
            InputKind::PublicKey => (output.script.clone(), false),
            InputKind::PublicKeyHash => public_key_hash::subscript(&output.script),
            InputKind::MultiSigScriptHash(m) => (m.redeem_script().clone(), m.nested_witness()),
        };
        Ok(compute_sighash(tx, input_index, &subscript, sighash_type, output.satoshis, is_witness))
    }

    /// Signatures `key` can contribute; empty when the key does not authorize this input
    pub fn get_signatures(
        &self,
        tx: &Transaction,
        key: &PrivateKey,
        input_index: usize,
        sighash_type: u32,
    ) -> Result<Vec<TransactionSignature>> {
        let public_key = key.public_key();
        let authorized = match (&self.kind, &self.output) {
            (InputKind::PublicKey, Some(output)) => public_key::authorizes(&output.script, &public_key),
            (InputKind::PublicKeyHash, Some(output)) => public_key_hash::authorizes(&output.script, &public_key),
            (InputKind::MultiSigScriptHash(m), Some(_)) => m.public_keys().contains(&public_key),
            _ => false,
        };
        if !authorized {
            return Ok(Vec::new());
        }
        let digest = self.sighash(tx, input_index, sighash_type)?;
        Ok(vec![TransactionSignature {
            public_key,
            prev_tx_id: self.prev_tx_id,
            output_index: self.output_index,
            input_index,
            signature: sign_digest(&digest, key)?,
            sigtype: sighash_type,
        }])
    }

    /// Signature verifies against this input's digest
    pub fn is_valid_signature(&self, tx: &Transaction, signature: &TransactionSignature) -> bool {
        match self.sighash(tx, signature.input_index, signature.sigtype) {
            Ok(digest) => verify_ecdsa(&digest, &signature.signature, &signature.public_key.to_bytes()),
            Err(_) => false,
        }
    }

    /// Record a signature and rebuild the unlocking script; the caller verifies it first
    pub fn add_signature(&mut self, signature: &TransactionSignature) -> Result<()> {
        match &mut self.kind {
            InputKind::Generic => {
                return Err(TxError::UnsupportedScript(self.script.to_string()));
            }
            InputKind::PublicKey => {
                self.script = public_key::unlocking_script(signature);
            }
            InputKind::PublicKeyHash => {
                let output = self
                    .output
                    .as_ref()
                    .ok_or_else(|| TxError::NeedMoreInfo("input has no previous output information".into()))?;
                let (script, witnesses) = public_key_hash::unlocking_data(&output.script, signature);
                self.script = script;
                self.witnesses = witnesses;
            }
            InputKind::MultiSigScriptHash(m) => {
                m.add_signature(signature)?;
                self.rebuild_multisig_script();
            }
        }
        Ok(())
    }

    pub fn clear_signatures(&mut self) {
        match &mut self.kind {
            InputKind::Generic => {}
            InputKind::PublicKey | InputKind::PublicKeyHash => {
                self.script = Script::new();
                self.witnesses.clear();
            }
            InputKind::MultiSigScriptHash(m) => {
                m.clear_signatures();
                self.rebuild_multisig_script();
            }
        }
    }

    fn rebuild_multisig_script(&mut self) {
        if let InputKind::MultiSigScriptHash(m) = &self.kind {
            let (script, witnesses) = m.unlocking_data();
            self.script = script;
            self.witnesses = witnesses;
        }
    }

    pub fn is_fully_signed(&self) -> Result<bool> {
        match &self.kind {
            InputKind::Generic => Err(TxError::UnableToVerifySignature(format!(
                "unrecognized script kind of input {}:{}, can't determine if it is fully signed",
                hex::encode(self.prev_tx_id),
                self.output_index
            ))),
            InputKind::PublicKey => Ok(self.script.is_public_key_in()),
            InputKind::PublicKeyHash => Ok(self.script.is_public_key_hash_in() || self.witnesses.len() == 2),
            InputKind::MultiSigScriptHash(m) => Ok(m.is_fully_signed()),
        }
    }

    pub fn count_signatures(&self) -> usize {
        match &self.kind {
            InputKind::MultiSigScriptHash(m) => m.count_signatures(),
            _ => usize::from(self.is_fully_signed().unwrap_or(false)),
        }
    }

    pub fn count_missing_signatures(&self) -> usize {
        match &self.kind {
            InputKind::MultiSigScriptHash(m) => m.count_missing_signatures(),
            InputKind::Generic => 0,
            _ => 1 - self.count_signatures(),
        }
    }

    /// Keys that may still sign this input
    pub fn public_keys_without_signature(&self) -> Vec<PublicKey> {
        match &self.kind {
            InputKind::MultiSigScriptHash(m) => m.public_keys_without_signature(),
            _ => Vec::new(),
        }
    }

    pub fn to_object(&self) -> InputObject {
        let multisig = self.multisig();
        InputObject {
            prev_tx_id: self.prev_tx_id,
            output_index: self.output_index,
            sequence_number: self.sequence_number,
            script: self.script.to_hex(),
            witnesses: self.witnesses.iter().map(hex::encode).collect(),
            output: self.output.as_ref().map(Output::to_object),
            public_keys: multisig.map(|m| m.public_keys().to_vec()),
            threshold: multisig.map(|m| m.threshold()),
            signatures: multisig.map(|m| m.signatures().to_vec()),
            nested_witness: multisig.map_or(false, |m| m.nested_witness()),
        }
    }

    pub fn from_object(obj: &InputObject) -> Result<Self> {
        let script = Script::from_hex_or_mnemonic(&obj.script)?;
        let witnesses = obj
            .witnesses
            .iter()
            .map(hex::decode)
            .collect::<std::result::Result<Witness, _>>()?;
        let mut input = Self::new(obj.prev_tx_id, obj.output_index, script);
        input.sequence_number = obj.sequence_number;
        if let Some(out) = &obj.output {
            let output = Output::from_object(out)?;
            let utxo = UnspentOutput::new(obj.prev_tx_id, obj.output_index, output.script.clone(), output.satoshis);
            input = match (&obj.public_keys, obj.threshold) {
                (Some(keys), Some(threshold)) if output.script.is_script_hash_out() => {
                    let mut multisig = Self::from_multisig(&utxo, keys, threshold, obj.nested_witness)?;
                    if let (Some(sigs), InputKind::MultiSigScriptHash(m)) = (&obj.signatures, &mut multisig.kind) {
                        m.restore_signatures(sigs)?;
                    }
                    multisig
                }
                _ => Self::from_unspent(&utxo),
            };
            input.sequence_number = obj.sequence_number;
            input.script = Script::from_hex_or_mnemonic(&obj.script)?;
        }
        input.witnesses = witnesses;
        Ok(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Network;

    fn p2pkh_utxo(key: &PrivateKey) -> UnspentOutput {
        UnspentOutput::new(
            [0x11; 32],
            0,
            Script::build_public_key_hash_out(&key.public_key().pubkey_hash()),
            100_000,
        )
    }

    #[test]
    fn test_kind_inferred_from_script() {
        let key = PrivateKey::from_wif("cSY2jbTDyPhmEx94TD72NwuHQ4J4pxzMEjj8G1Nc7c1eptCnevza").unwrap();
        assert_eq!(*Input::from_unspent(&p2pkh_utxo(&key)).kind(), InputKind::PublicKeyHash);

        let p2pk = UnspentOutput::new([0x11; 32], 0, Script::build_public_key_out(&key.public_key()), 1);
        assert_eq!(*Input::from_unspent(&p2pk).kind(), InputKind::PublicKey);

        let mut anyone = Script::new();
        anyone.add_opcode(crate::opcode::OP_TRUE);
        let generic = Input::from_unspent(&UnspentOutput::new([0x11; 32], 0, anyone, 1));
        assert_eq!(*generic.kind(), InputKind::Generic);
        assert!(matches!(generic.is_fully_signed(), Err(TxError::UnableToVerifySignature(_))));
    }

    #[test]
    fn test_outpoint_wire_order() {
        let mut id = [0u8; 32];
        id[0] = 0xaa;
        id[31] = 0xbb;
        let input = Input::new(id, 2, Script::new());
        let mut buf = Vec::new();
        input.write_outpoint(&mut buf);
        assert_eq!(buf[0], 0xbb);
        assert_eq!(buf[31], 0xaa);
        assert_eq!(&buf[32..], &[2, 0, 0, 0]);
    }

    #[test]
    fn test_null_input() {
        let input = Input::new(NULL_HASH, 0xffff_ffff, Script::new());
        assert!(input.is_null());
        assert!(!Input::new(NULL_HASH, 0, Script::new()).is_null());
    }

    #[test]
    fn test_multisig_requires_matching_script() {
        let keys: Vec<PublicKey> = ["cNSvQov1Qrh2sqGaCRWzs1ppPKKEDfKQbS95E7Y4Da7c4fuSx92R", "cSCT2jteFyKSJiSpCmEtCz88zkCmxvyjzF8wDkCDiBak2fhULoMo"]
            .iter()
            .map(|w| PrivateKey::from_wif(w).unwrap().public_key())
            .collect();
        let other = Script::build_script_hash_out(&[0u8; 20]);
        let utxo = UnspentOutput::new([1; 32], 0, other, 1000);
        assert!(matches!(
            Input::from_multisig(&utxo, &keys, 1, false),
            Err(TxError::InvalidArgument(_))
        ));
        let p2pkh = UnspentOutput::new([1; 32], 0, Script::from_address(&keys[0].to_address(Network::Testnet)), 1000);
        assert!(matches!(
            Input::from_multisig(&p2pkh, &keys, 1, false),
            Err(TxError::UnsupportedScript(_))
        ));
    }
}
