//! M-of-N multisig redeemed through pay-to-script-hash
//!
//! Signatures are kept in one slot per public key, so they can be added in any order and
//! still land in the unlocking script in key order, as CHECKMULTISIG requires. With
//! `nested_witness`, the redeem script lives in the witness behind a P2SH-wrapped
//! witness script-hash program.

use crate::constants::{MULTISIG_OPCODES_SIZE, MULTISIG_PUBKEY_SIZE, MULTISIG_SIGNATURE_SIZE};
use crate::encoding::write_var_bytes;
use crate::error::{Result, TxError};
use crate::hash::hash160;
use crate::keys::PublicKey;
use crate::script::Script;
use crate::signature::TransactionSignature;
use crate::types::Witness;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiSigScriptHashInput {
    public_keys: Vec<PublicKey>,
    threshold: usize,
    signatures: Vec<Option<TransactionSignature>>,
    nested_witness: bool,
    redeem_script: Script,
}

impl MultiSigScriptHashInput {
    /// Keys are sorted by their serialized form
    pub fn new(public_keys: &[PublicKey], threshold: usize, nested_witness: bool) -> Result<Self> {
        if threshold > public_keys.len() {
            return Err(TxError::ThresholdExceedsKeys);
        }
        let mut keys = public_keys.to_vec();
        keys.sort();
        let redeem_script = Script::build_multisig_out(&keys, threshold, false)?;
        Ok(Self {
            signatures: vec![None; keys.len()],
            public_keys: keys,
            threshold,
            nested_witness,
            redeem_script,
        })
    }

    pub fn public_keys(&self) -> &[PublicKey] {
        &self.public_keys
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn nested_witness(&self) -> bool {
        self.nested_witness
    }

    pub fn redeem_script(&self) -> &Script {
        &self.redeem_script
    }

    /// Signature slots in key order
    pub fn signatures(&self) -> &[Option<TransactionSignature>] {
        &self.signatures
    }

    fn witness_program(&self) -> Script {
        Script::build_witness_multisig_out_from_script(&self.redeem_script)
    }

    /// The P2SH script this input spends
    pub fn locking_script(&self) -> Script {
        let committed = if self.nested_witness {
            self.witness_program()
        } else {
            self.redeem_script.clone()
        };
        Script::build_script_hash_out(&hash160(&committed.to_bytes()))
    }

    /// Varint-prefixed redeem script, the scriptCode of the witness digest
    pub fn script_code(&self) -> Vec<u8> {
        let mut out = Vec::new();
        write_var_bytes(&mut out, &self.redeem_script.to_bytes());
        out
    }

    /// OP_0 + M signatures + N keys + redeem overhead
    pub fn estimate_size(&self) -> usize {
        MULTISIG_OPCODES_SIZE
            + self.threshold * MULTISIG_SIGNATURE_SIZE
            + self.public_keys.len() * MULTISIG_PUBKEY_SIZE
    }

    pub fn add_signature(&mut self, signature: &TransactionSignature) -> Result<()> {
        if self.is_fully_signed() {
            return Err(TxError::AlreadyFullySigned(signature.input_index));
        }
        let slot = self
            .public_keys
            .iter()
            .position(|k| *k == signature.public_key)
            .ok_or_else(|| TxError::InvalidSignature("signature has no matching public key".into()))?;
        self.signatures[slot] = Some(signature.clone());
        Ok(())
    }

    /// Put signatures from a saved object back in their slots
    pub(super) fn restore_signatures(&mut self, signatures: &[Option<TransactionSignature>]) -> Result<()> {
        for sig in signatures.iter().flatten() {
            self.add_signature(sig)?;
        }
        Ok(())
    }

    pub fn clear_signatures(&mut self) {
        self.signatures = vec![None; self.public_keys.len()];
    }

    pub fn count_signatures(&self) -> usize {
        self.signatures.iter().filter(|s| s.is_some()).count()
    }

    pub fn count_missing_signatures(&self) -> usize {
        self.threshold.saturating_sub(self.count_signatures())
    }

    pub fn is_fully_signed(&self) -> bool {
        self.count_signatures() >= self.threshold
    }

    pub fn public_keys_without_signature(&self) -> Vec<PublicKey> {
        self.public_keys
            .iter()
            .zip(&self.signatures)
            .filter(|(_, s)| s.is_none())
            .map(|(k, _)| *k)
            .collect()
    }

    fn ordered_signatures(&self) -> Vec<Vec<u8>> {
        self.signatures.iter().flatten().map(TransactionSignature::to_bytes).collect()
    }

    /// Unlocking script and witness for the signatures collected so far
    pub(super) fn unlocking_data(&self) -> (Script, Witness) {
        if self.nested_witness {
            let mut script = Script::new();
            script.add_data(&self.witness_program().to_bytes());
            let sigs = self.ordered_signatures();
            if sigs.is_empty() {
                return (script, Vec::new());
            }
            let mut witnesses: Witness = vec![Vec::new()];
            witnesses.extend(sigs);
            witnesses.push(self.redeem_script.to_bytes());
            (script, witnesses)
        } else {
            (
                Script::build_p2sh_multisig_in(&self.ordered_signatures(), &self.redeem_script),
                Vec::new(),
            )
        }
    }
}
