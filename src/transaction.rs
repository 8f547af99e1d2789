//! Transactions: construction, signing, serialization and validation
//!
//! A [`Transaction`] owns its inputs and outputs. Spending targets are added with
//! [`Transaction::from_utxo`] / [`Transaction::from_multisig`], payments with
//! [`Transaction::to`], and an optional change script absorbs whatever the fee leaves.
//! The change output is recomputed whenever inputs, outputs or the fee policy change,
//! which also clears every signature, since they commit to the outputs.

use crate::address::Address;
use crate::constants::*;
use crate::encoding::{write_var_bytes, write_varint, Reader};
use crate::error::{Result, TxError};
use crate::hash::{reversed, sha256d};
use crate::input::{Input, InputKind, InputObject};
use crate::interpreter::{self, VerifyFlags};
use crate::keys::{PrivateKey, PublicKey};
use crate::output::{Output, OutputObject};
use crate::script::Script;
use crate::sighash::SIGHASH_ALL;
use crate::signature::TransactionSignature;
use crate::types::{Hash, LockTime, ValidationResult};
use crate::unspent::UnspentOutput;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// How the fee is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeePolicy {
    /// Estimated from size at the default rate
    #[default]
    Default,
    /// Exactly this many satoshis
    Fixed(u64),
    /// Estimated from size at this rate per 1,000 bytes
    PerKb(u64),
}

/// Checks of [`Transaction::serialize_with`] that may be skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SerializeOptions {
    pub disable_large_fees: bool,
    pub disable_small_fees: bool,
    pub disable_dust_outputs: bool,
    pub disable_more_output_than_input: bool,
    pub disable_is_fully_signed: bool,
}

impl SerializeOptions {
    /// Every skippable check disabled
    pub fn unchecked() -> Self {
        Self {
            disable_large_fees: true,
            disable_small_fees: true,
            disable_dust_outputs: true,
            disable_more_output_than_input: true,
            disable_is_fully_signed: true,
        }
    }
}

/// Plain-object form, for persistence and JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionObject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    pub version: i32,
    pub inputs: Vec<InputObject>,
    pub outputs: Vec<OutputObject>,
    #[serde(rename = "nLockTime")]
    pub n_lock_time: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_script: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_per_kb: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct Transaction {
    version: i32,
    inputs: Vec<Input>,
    outputs: Vec<Output>,
    lock_time: u32,
    change_script: Option<Script>,
    change_index: Option<usize>,
    fee_policy: FeePolicy,
    hash_cache: OnceLock<Hash>,
    witness_hash_cache: OnceLock<Hash>,
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}

impl Transaction {
    pub fn new() -> Self {
        Self {
            version: DEFAULT_VERSION,
            inputs: Vec::new(),
            outputs: Vec::new(),
            lock_time: 0,
            change_script: None,
            change_index: None,
            fee_policy: FeePolicy::Default,
            hash_cache: OnceLock::new(),
            witness_hash_cache: OnceLock::new(),
        }
    }

    fn invalidate(&mut self) {
        self.hash_cache = OnceLock::new();
        self.witness_hash_cache = OnceLock::new();
    }

    // ----- accessors -----

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn set_version(&mut self, version: i32) -> &mut Self {
        self.version = version;
        self.clear_signatures();
        self.invalidate();
        self
    }

    pub fn lock_time(&self) -> u32 {
        self.lock_time
    }

    pub fn set_lock_time(&mut self, lock_time: u32) -> &mut Self {
        self.lock_time = lock_time;
        self.clear_signatures();
        self.invalidate();
        self
    }

    pub fn inputs(&self) -> &[Input] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    /// Mutable access to an input; existing signatures are dropped
    pub fn input_mut(&mut self, index: usize) -> Result<&mut Input> {
        self.clear_signatures();
        self.invalidate();
        self.inputs.get_mut(index).ok_or(TxError::InvalidIndex(index))
    }

    /// Mutable access to an output; existing signatures are dropped
    pub fn output_mut(&mut self, index: usize) -> Result<&mut Output> {
        self.clear_signatures();
        self.invalidate();
        self.outputs.get_mut(index).ok_or(TxError::InvalidIndex(index))
    }

    pub fn fee_policy(&self) -> FeePolicy {
        self.fee_policy
    }

    pub fn change_script_ref(&self) -> Option<&Script> {
        self.change_script.as_ref()
    }

    // ----- wire format -----

    /// Parse the wire format, with or without witness data
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let mut tx = Transaction::new();
        tx.version = reader.read_i32_le()?;

        let mut input_count = reader.read_varint()?;
        let mut segwit = false;
        // Zero inputs followed by a non-zero byte is the segwit marker and flag
        if input_count == 0 && matches!(reader.peek_u8(), Some(flag) if flag != 0) {
            reader.read_u8()?;
            segwit = true;
            input_count = reader.read_varint()?;
        }
        for _ in 0..input_count {
            tx.inputs.push(Input::read_from(&mut reader)?);
        }
        let output_count = reader.read_varint()?;
        for _ in 0..output_count {
            tx.outputs.push(Output::read_from(&mut reader)?);
        }
        if segwit {
            for input in tx.inputs.iter_mut() {
                let items = reader.read_varint()?;
                let mut witness = Vec::new();
                for _ in 0..items {
                    witness.push(reader.read_var_bytes()?);
                }
                input.set_witnesses(witness);
            }
        }
        tx.lock_time = reader.read_u32_le()?;
        if !reader.is_finished() {
            return Err(TxError::decode(reader.position(), "unexpected trailing data"));
        }
        Ok(tx)
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        Self::from_bytes(&hex::decode(s.trim())?)
    }

    fn write(&self, out: &mut Vec<u8>, with_witness: bool) {
        let segwit = with_witness && self.has_witnesses();
        out.extend_from_slice(&self.version.to_le_bytes());
        if segwit {
            out.extend_from_slice(&[0x00, 0x01]);
        }
        write_varint(out, self.inputs.len() as u64);
        for input in &self.inputs {
            input.write_to(out);
        }
        write_varint(out, self.outputs.len() as u64);
        for output in &self.outputs {
            output.write_to(out);
        }
        if segwit {
            for input in &self.inputs {
                write_varint(out, input.witnesses().len() as u64);
                for item in input.witnesses() {
                    write_var_bytes(out, item);
                }
            }
        }
        out.extend_from_slice(&self.lock_time.to_le_bytes());
    }

    /// Full serialization, witness data included when present
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write(&mut out, true);
        out
    }

    /// Serialization without witness data, the form the txid commits to
    pub fn to_bytes_no_witness(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write(&mut out, false);
        out
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Hex serialization, no checks
    pub fn unchecked_serialize(&self) -> String {
        self.to_hex()
    }

    /// Hex serialization after every check passes
    pub fn serialize(&self) -> Result<String> {
        self.serialize_with(SerializeOptions::default())
    }

    pub fn serialize_with(&self, opts: SerializeOptions) -> Result<String> {
        if let Err(e) = self.check_serialization(opts) {
            log::warn!("refusing to serialize transaction {}: {}", self.txid(), e);
            return Err(e);
        }
        Ok(self.to_hex())
    }

    /// Transaction id, display order
    pub fn hash(&self) -> Hash {
        *self
            .hash_cache
            .get_or_init(|| reversed(&sha256d(&self.to_bytes_no_witness())))
    }

    pub fn txid(&self) -> String {
        hex::encode(self.hash())
    }

    /// Hash of the full serialization, display order
    pub fn witness_hash(&self) -> Hash {
        *self
            .witness_hash_cache
            .get_or_init(|| reversed(&sha256d(&self.to_bytes())))
    }

    pub fn has_witnesses(&self) -> bool {
        self.inputs.iter().any(Input::has_witnesses)
    }

    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].is_null()
    }

    // ----- inputs -----

    fn has_outpoint(&self, prev_tx_id: &Hash, output_index: u32) -> bool {
        self.inputs
            .iter()
            .any(|i| i.prev_tx_id == *prev_tx_id && i.output_index == output_index)
    }

    fn push_input(&mut self, input: Input) {
        if self.has_outpoint(&input.prev_tx_id, input.output_index) {
            log::debug!(
                "input {}:{} already present, ignoring",
                hex::encode(input.prev_tx_id),
                input.output_index
            );
            return;
        }
        log::debug!("adding input {}:{}", hex::encode(input.prev_tx_id), input.output_index);
        self.inputs.push(input);
        self.invalidate();
        self.update_change_output();
    }

    /// Spend `utxo`; its signing protocol follows its locking script
    pub fn from_utxo(&mut self, utxo: &UnspentOutput) -> &mut Self {
        self.push_input(Input::from_unspent(utxo));
        self
    }

    pub fn from_utxos(&mut self, utxos: &[UnspentOutput]) -> &mut Self {
        for utxo in utxos {
            self.from_utxo(utxo);
        }
        self
    }

    /// Spend a P2SH multisig `utxo`, optionally nested witness
    pub fn from_multisig(
        &mut self,
        utxo: &UnspentOutput,
        public_keys: &[PublicKey],
        threshold: usize,
        nested_witness: bool,
    ) -> Result<&mut Self> {
        if !self.has_outpoint(&utxo.tx_id, utxo.output_index) {
            let input = Input::from_multisig(utxo, public_keys, threshold, nested_witness)?;
            self.push_input(input);
        }
        Ok(self)
    }

    /// Add an input that knows the output it spends
    pub fn add_input(&mut self, input: Input) -> Result<&mut Self> {
        if input.output().is_none() {
            return Err(TxError::NeedMoreInfo(
                "need information about the output the input spends".into(),
            ));
        }
        self.push_input(input);
        Ok(self)
    }

    pub fn add_input_with_output(&mut self, mut input: Input, output: Output) -> Result<&mut Self> {
        input.set_output(output);
        self.add_input(input)
    }

    /// Add an input as-is: no previous output required, no deduplication
    pub fn unchecked_add_input(&mut self, input: Input) -> &mut Self {
        self.inputs.push(input);
        self.invalidate();
        self.update_change_output();
        self
    }

    pub fn remove_input(&mut self, index: usize) -> Result<Input> {
        if index >= self.inputs.len() {
            return Err(TxError::InvalidIndex(index));
        }
        let input = self.inputs.remove(index);
        self.invalidate();
        self.update_change_output();
        Ok(input)
    }

    pub fn remove_input_by_outpoint(&mut self, prev_tx_id: &Hash, output_index: u32) -> Result<Input> {
        let index = self
            .inputs
            .iter()
            .position(|i| i.prev_tx_id == *prev_tx_id && i.output_index == output_index)
            .ok_or_else(|| {
                TxError::InvalidArgument(format!(
                    "no input spends {}:{}",
                    hex::encode(prev_tx_id),
                    output_index
                ))
            })?;
        self.remove_input(index)
    }

    // ----- outputs -----

    /// Append `output`; amounts above the supply ceiling are rejected
    pub fn add_output(&mut self, output: Output) -> Result<&mut Self> {
        if !output.is_valid_satoshis() {
            return Err(TxError::InvalidAmount(format!(
                "{} exceeds the supply ceiling",
                output.satoshis
            )));
        }
        Ok(self.unchecked_add_output(output))
    }

    /// Append `output` as-is
    pub fn unchecked_add_output(&mut self, output: Output) -> &mut Self {
        self.outputs.push(output);
        self.invalidate();
        self.update_change_output();
        self
    }

    /// Pay `satoshis` to `address`
    pub fn to(&mut self, address: &Address, satoshis: u64) -> Result<&mut Self> {
        if satoshis > MAX_MONEY {
            return Err(TxError::InvalidAmount(format!("{} exceeds the supply ceiling", satoshis)));
        }
        self.add_output(Output::new(satoshis, Script::from_address(address)))
    }

    pub fn to_many(&mut self, payments: &[(Address, u64)]) -> Result<&mut Self> {
        for (address, satoshis) in payments {
            self.to(address, *satoshis)?;
        }
        Ok(self)
    }

    /// Zero-value OP_RETURN output carrying `data`
    pub fn add_data(&mut self, data: &[u8]) -> &mut Self {
        self.unchecked_add_output(Output::new(0, Script::build_data_out(data)))
    }

    pub fn remove_output(&mut self, index: usize) -> Result<Output> {
        if index >= self.outputs.len() {
            return Err(TxError::InvalidIndex(index));
        }
        let output = self.outputs.remove(index);
        self.change_index = match self.change_index {
            Some(c) if c == index => None,
            Some(c) if c > index => Some(c - 1),
            other => other,
        };
        self.invalidate();
        self.update_change_output();
        Ok(output)
    }

    pub fn clear_outputs(&mut self) -> &mut Self {
        self.outputs.clear();
        self.change_index = None;
        self.invalidate();
        self.update_change_output();
        self
    }

    // ----- fee and change -----

    /// Explicit fee
    pub fn fee(&mut self, satoshis: u64) -> &mut Self {
        self.fee_policy = FeePolicy::Fixed(satoshis);
        self.update_change_output();
        self
    }

    /// Fee estimated from size at `rate` per 1,000 bytes
    pub fn fee_per_kb(&mut self, rate: u64) -> &mut Self {
        self.fee_policy = FeePolicy::PerKb(rate);
        self.update_change_output();
        self
    }

    /// Send change to `address`
    pub fn change(&mut self, address: &Address) -> &mut Self {
        self.change_script(Script::from_address(address))
    }

    pub fn change_script(&mut self, script: Script) -> &mut Self {
        self.change_script = Some(script);
        self.update_change_output();
        self
    }

    pub fn get_change_output(&self) -> Option<&Output> {
        self.change_index.and_then(|i| self.outputs.get(i))
    }

    /// Σ spent amounts; every input must know its previous output
    pub fn input_amount(&self) -> Result<u64> {
        self.inputs.iter().enumerate().try_fold(0u64, |acc, (i, input)| {
            let output = input.output().ok_or(TxError::MissingPreviousOutput(i))?;
            Ok(acc.saturating_add(output.satoshis))
        })
    }

    pub fn output_amount(&self) -> u64 {
        self.outputs.iter().fold(0u64, |acc, o| acc.saturating_add(o.satoshis))
    }

    /// inputs − outputs, negative when outputs exceed inputs
    fn unspent_value(&self) -> Result<i128> {
        Ok(i128::from(self.input_amount()?) - i128::from(self.output_amount()))
    }

    /// Fee paid: explicit if set, estimated when change absorbs the rest, otherwise the unspent value
    pub fn get_fee(&self) -> Result<u64> {
        if self.is_coinbase() {
            return Ok(0);
        }
        if let FeePolicy::Fixed(fee) = self.fee_policy {
            return Ok(fee);
        }
        if self.change_script.is_some() {
            return self.estimate_fee();
        }
        let inputs = self.input_amount()?;
        let outputs = self.output_amount();
        inputs
            .checked_sub(outputs)
            .ok_or(TxError::InvalidOutputAmountSum { inputs, outputs })
    }

    /// EstimateSize: 26 + Σ input estimates + Σ (|script| + 9)
    pub fn estimate_size(&self) -> usize {
        let inputs: usize = self.inputs.iter().map(Input::estimate_size).sum();
        let outputs: usize = self.outputs.iter().map(|o| o.script.byte_len() + 9).sum();
        MAXIMUM_EXTRA_SIZE + inputs + outputs
    }

    /// EstimateFee: ⌈size / 1000⌉ × rate, with room for a change output when funds allow
    pub fn estimate_fee(&self) -> Result<u64> {
        let rate = match self.fee_policy {
            FeePolicy::PerKb(rate) => rate,
            _ => FEE_PER_KB,
        };
        let mut size = self.estimate_size();
        let available = self.unspent_value()?;
        let fee = size.div_ceil(1000) as u64 * rate;
        if available > i128::from(fee) {
            size += CHANGE_OUTPUT_MAX_SIZE;
        }
        Ok(size.div_ceil(1000) as u64 * rate)
    }

    fn clear_signatures(&mut self) {
        for input in self.inputs.iter_mut() {
            input.clear_signatures();
        }
    }

    /// Drop signatures and the old change output, then append a fresh change output if
    /// anything is left over
    fn update_change_output(&mut self) {
        self.clear_signatures();
        if self.change_script.is_none() {
            return;
        }
        if let Some(index) = self.change_index.take() {
            if index < self.outputs.len() {
                self.outputs.remove(index);
            }
        }
        self.invalidate();

        let available = match self.unspent_value() {
            Ok(v) => v,
            Err(e) => {
                log::debug!("change not computed: {}", e);
                return;
            }
        };
        let fee = match self.get_fee() {
            Ok(fee) => fee,
            Err(e) => {
                log::debug!("change not computed: {}", e);
                return;
            }
        };
        let change = match u64::try_from(available - i128::from(fee)) {
            Ok(change) if change > 0 => change,
            _ => return,
        };
        if let Some(script) = self.change_script.clone() {
            log::debug!("change output of {} satoshis at index {}", change, self.outputs.len());
            self.change_index = Some(self.outputs.len());
            self.outputs.push(Output::new(change, script));
        }
    }

    // ----- checked serialization -----

    /// Validation gate of [`Transaction::serialize_with`]
    ///
    /// 1. every output amount within the supply ceiling
    /// 2. serialized size within the maximum
    /// 3. no null previous output outside a coinbase
    /// 4. inputs cover outputs
    /// 5. fee matches an explicit fee and lies within [⌈est/150⌉, 150 × est]
    /// 6. no dust outputs
    /// 7. every input fully signed, and every input with a known previous output passes
    ///    the interpreter
    pub fn check_serialization(&self, opts: SerializeOptions) -> Result<()> {
        // 1. Output amounts
        for (index, output) in self.outputs.iter().enumerate() {
            if !output.is_valid_satoshis() {
                return Err(TxError::InvalidSatoshis {
                    index,
                    satoshis: output.satoshis,
                });
            }
        }

        // 2. Size
        let size = self.to_bytes().len();
        if size > MAX_BLOCK_SIZE {
            return Err(TxError::TransactionTooLarge(size));
        }

        // 3. Null inputs
        if !self.is_coinbase() {
            if let Some(i) = self.inputs.iter().position(Input::is_null) {
                return Err(TxError::NullInput(i));
            }
        }

        // 4-5. Amounts and fee
        if !self.is_coinbase() {
            let inputs = self.input_amount()?;
            let outputs = self.output_amount();
            match inputs.checked_sub(outputs) {
                None => {
                    if !opts.disable_more_output_than_input {
                        return Err(TxError::InvalidOutputAmountSum { inputs, outputs });
                    }
                }
                Some(unspent) => self.check_fee(opts, unspent)?,
            }
        }

        // 6. Dust
        if !opts.disable_dust_outputs && self.outputs.iter().any(Output::is_dust) {
            return Err(TxError::DustOutputs);
        }

        // 7. Signatures
        if !opts.disable_is_fully_signed {
            if !self.is_fully_signed()? {
                return Err(TxError::MissingSignatures);
            }
            self.check_scripts()?;
        }
        Ok(())
    }

    /// Run every input with a known previous output through the interpreter
    fn check_scripts(&self) -> Result<()> {
        for (i, input) in self.inputs.iter().enumerate() {
            let output = match input.output() {
                Some(output) => output,
                None => continue,
            };
            interpreter::verify(
                input.script(),
                &output.script,
                self,
                i,
                VerifyFlags::STANDARD,
                input.witnesses(),
                output.satoshis,
            )
            .map_err(|e| TxError::InvalidSignature(format!("input {} does not verify: {}", i, e)))?;
        }
        Ok(())
    }

    fn check_fee(&self, opts: SerializeOptions, unspent: u64) -> Result<()> {
        if let FeePolicy::Fixed(fee) = self.fee_policy {
            if fee != unspent {
                return Err(TxError::FeeDifferent { unspent, fee });
            }
        }
        if !opts.disable_large_fees {
            let max = FEE_SECURITY_MARGIN * self.estimate_fee()?;
            if unspent > max {
                if self.change_script.is_none() {
                    return Err(TxError::ChangeAddressMissing);
                }
                return Err(TxError::FeeTooLarge { unspent, max });
            }
        }
        if !opts.disable_small_fees {
            let min = self.estimate_fee()?.div_ceil(FEE_SECURITY_MARGIN);
            if unspent < min {
                return Err(TxError::FeeTooSmall { unspent, min });
            }
        }
        Ok(())
    }

    // ----- signing -----

    /// Sign every input `keys` can authorize, SIGHASH_ALL
    pub fn sign(&mut self, keys: &[PrivateKey]) -> Result<&mut Self> {
        self.sign_with(keys, SIGHASH_ALL)
    }

    pub fn sign_with(&mut self, keys: &[PrivateKey], sighash_type: u32) -> Result<&mut Self> {
        if let Some(i) = self.inputs.iter().position(|input| input.output().is_none()) {
            return Err(TxError::MissingPreviousOutput(i));
        }
        for key in keys {
            for signature in self.get_signatures(key, sighash_type)? {
                self.apply_signature(&signature)?;
            }
        }
        Ok(self)
    }

    /// Signatures `key` can contribute across all inputs
    pub fn get_signatures(&self, key: &PrivateKey, sighash_type: u32) -> Result<Vec<TransactionSignature>> {
        let mut signatures = Vec::new();
        for (index, input) in self.inputs.iter().enumerate() {
            if let InputKind::MultiSigScriptHash(m) = input.kind() {
                if m.is_fully_signed() {
                    continue;
                }
            }
            signatures.extend(input.get_signatures(self, key, index, sighash_type)?);
        }
        Ok(signatures)
    }

    /// Verify `signature` and attach it to its input
    pub fn apply_signature(&mut self, signature: &TransactionSignature) -> Result<&mut Self> {
        let index = signature.input_index;
        let input = self.inputs.get(index).ok_or(TxError::InvalidIndex(index))?;
        if !input.is_valid_signature(self, signature) {
            return Err(TxError::InvalidSignature(format!(
                "signature for input {} does not verify",
                index
            )));
        }
        self.inputs[index].add_signature(signature)?;
        self.invalidate();
        log::debug!("signature by {} applied to input {}", signature.public_key, index);
        Ok(self)
    }

    pub fn is_valid_signature(&self, signature: &TransactionSignature) -> bool {
        self.inputs
            .get(signature.input_index)
            .map_or(false, |input| input.is_valid_signature(self, signature))
    }

    pub fn is_fully_signed(&self) -> Result<bool> {
        for input in &self.inputs {
            if !input.is_fully_signed()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    // ----- ordering -----

    /// BIP69: inputs by (txid, index), outputs by (amount, script bytes)
    pub fn sort(&mut self) -> &mut Self {
        self.inputs
            .sort_by(|a, b| a.prev_tx_id.cmp(&b.prev_tx_id).then(a.output_index.cmp(&b.output_index)));
        let change = self.get_change_output().cloned();
        self.outputs.sort_by(|a, b| {
            a.satoshis
                .cmp(&b.satoshis)
                .then_with(|| a.script.to_bytes().cmp(&b.script.to_bytes()))
        });
        if let Some(change) = change {
            self.change_index = self.outputs.iter().position(|o| *o == change);
        }
        self.clear_signatures();
        self.invalidate();
        self
    }

    /// Reorder outputs with `f`, which must return a permutation of them
    pub fn sort_outputs_by<F>(&mut self, f: F) -> Result<&mut Self>
    where
        F: FnOnce(&[Output]) -> Vec<Output>,
    {
        let sorted = f(&self.outputs);
        if sorted.len() != self.outputs.len() {
            return Err(TxError::InvalidSorting);
        }
        // new position -> old position
        let mut taken = vec![false; self.outputs.len()];
        let mut origin = Vec::with_capacity(sorted.len());
        for output in &sorted {
            let old = (0..self.outputs.len())
                .find(|&j| !taken[j] && self.outputs[j] == *output)
                .ok_or(TxError::InvalidSorting)?;
            taken[old] = true;
            origin.push(old);
        }
        self.change_index = self
            .change_index
            .and_then(|c| origin.iter().position(|&old| old == c));
        self.outputs = sorted;
        self.clear_signatures();
        self.invalidate();
        Ok(self)
    }

    // ----- replace-by-fee and lock time -----

    /// Signal replaceability on every input still at a final sequence number
    pub fn enable_rbf(&mut self) -> &mut Self {
        for input in self.inputs.iter_mut() {
            if input.sequence_number >= DEFAULT_LOCKTIME_SEQNUMBER {
                input.sequence_number = DEFAULT_RBF_SEQNUMBER;
            }
        }
        self.clear_signatures();
        self.invalidate();
        self
    }

    pub fn is_rbf(&self) -> bool {
        self.inputs
            .iter()
            .any(|i| i.sequence_number < DEFAULT_LOCKTIME_SEQNUMBER)
    }

    fn lower_final_sequences(&mut self) {
        for input in self.inputs.iter_mut() {
            if input.sequence_number == DEFAULT_SEQNUMBER {
                input.sequence_number = DEFAULT_LOCKTIME_SEQNUMBER;
            }
        }
    }

    /// Not valid before block `height`
    pub fn lock_until_block_height(&mut self, height: i64) -> Result<&mut Self> {
        if height >= NLOCKTIME_BLOCKHEIGHT_LIMIT as i64 {
            return Err(TxError::BlockHeightTooHigh {
                height,
                max: NLOCKTIME_BLOCKHEIGHT_LIMIT - 1,
            });
        }
        if height < 0 {
            return Err(TxError::LockTimeOutOfRange(height));
        }
        self.lower_final_sequences();
        self.lock_time = height as u32;
        self.clear_signatures();
        self.invalidate();
        Ok(self)
    }

    /// Not valid before UNIX time `timestamp`
    pub fn lock_until_date(&mut self, timestamp: u32) -> Result<&mut Self> {
        if timestamp < NLOCKTIME_BLOCKHEIGHT_LIMIT {
            return Err(TxError::LockTimeTooEarly(timestamp));
        }
        self.lower_final_sequences();
        self.lock_time = timestamp;
        self.clear_signatures();
        self.invalidate();
        Ok(self)
    }

    /// Lock time interpretation, none when unset
    pub fn get_lock_time(&self) -> Option<LockTime> {
        match self.lock_time {
            0 => None,
            t if t < NLOCKTIME_BLOCKHEIGHT_LIMIT => Some(LockTime::BlockHeight(t)),
            t => Some(LockTime::Timestamp(t)),
        }
    }

    // ----- validation -----

    /// CheckTransaction: 𝒯𝒳 → {valid, invalid(reason)}
    ///
    /// 1. |ins| > 0 ∧ |outs| > 0
    /// 2. ∀o ∈ outs: o.value ≤ M_max, Σ o.value ≤ M_max
    /// 3. |tx| ≤ max block size
    /// 4. no outpoint spent twice
    /// 5. coinbase: 2 ≤ |scriptSig| ≤ 100; otherwise no null outpoint
    /// 6. every input with a known previous output and unlocking data passes the interpreter
    pub fn verify(&self) -> ValidationResult {
        // 1. Non-empty
        if self.inputs.is_empty() {
            return ValidationResult::Invalid("transaction txins empty".to_string());
        }
        if self.outputs.is_empty() {
            return ValidationResult::Invalid("transaction txouts empty".to_string());
        }

        // 2. Amounts
        let mut total = 0u64;
        for (i, output) in self.outputs.iter().enumerate() {
            if output.satoshis > MAX_MONEY {
                return ValidationResult::Invalid(format!("transaction txout {} greater than MAX_MONEY", i));
            }
            total += output.satoshis;
            if total > MAX_MONEY {
                return ValidationResult::Invalid(format!(
                    "transaction txout {} total output greater than MAX_MONEY",
                    i
                ));
            }
        }

        // 3. Size
        if self.to_bytes_no_witness().len() > MAX_BLOCK_SIZE {
            return ValidationResult::Invalid("transaction over the maximum block size".to_string());
        }

        // 4. Duplicates
        let mut seen = HashSet::new();
        for (i, input) in self.inputs.iter().enumerate() {
            if !seen.insert((input.prev_tx_id, input.output_index)) {
                return ValidationResult::Invalid(format!("transaction input {} duplicate input", i));
            }
        }

        // 5. Coinbase / null outpoints
        if self.is_coinbase() {
            let len = self.inputs[0].script().byte_len();
            if !(COINBASE_SCRIPT_MIN..=COINBASE_SCRIPT_MAX).contains(&len) {
                return ValidationResult::Invalid("coinbase transaction script size invalid".to_string());
            }
            return ValidationResult::Valid;
        }
        for (i, input) in self.inputs.iter().enumerate() {
            if input.is_null() {
                return ValidationResult::Invalid(format!("transaction input {} has null input", i));
            }
        }

        // 6. Scripts
        for (i, input) in self.inputs.iter().enumerate() {
            let output = match input.output() {
                Some(output) => output,
                None => continue,
            };
            if input.script().is_empty() && !input.has_witnesses() {
                continue;
            }
            if let Err(e) = interpreter::verify(
                input.script(),
                &output.script,
                self,
                i,
                VerifyFlags::STANDARD,
                input.witnesses(),
                output.satoshis,
            ) {
                return ValidationResult::Invalid(format!("transaction input {} script verification failed: {}", i, e));
            }
        }
        ValidationResult::Valid
    }

    // ----- object form -----

    pub fn to_object(&self) -> TransactionObject {
        TransactionObject {
            hash: Some(self.txid()),
            version: self.version,
            inputs: self.inputs.iter().map(Input::to_object).collect(),
            outputs: self.outputs.iter().map(Output::to_object).collect(),
            n_lock_time: self.lock_time,
            change_script: self.change_script.as_ref().map(Script::to_string),
            change_index: self.change_index,
            fee: match self.fee_policy {
                FeePolicy::Fixed(fee) => Some(fee),
                _ => None,
            },
            fee_per_kb: match self.fee_policy {
                FeePolicy::PerKb(rate) => Some(rate),
                _ => None,
            },
        }
    }

    /// Rebuild from the object form; a `hash` that disagrees with the result is an error
    pub fn from_object(obj: &TransactionObject) -> Result<Self> {
        let mut tx = Transaction::new();
        tx.version = obj.version;
        tx.lock_time = obj.n_lock_time;
        for input in &obj.inputs {
            tx.inputs.push(Input::from_object(input)?);
        }
        for output in &obj.outputs {
            tx.outputs.push(Output::from_object(output)?);
        }
        tx.change_script = obj
            .change_script
            .as_deref()
            .map(Script::from_hex_or_mnemonic)
            .transpose()?;
        tx.change_index = obj.change_index.filter(|i| *i < tx.outputs.len());
        tx.fee_policy = match (obj.fee, obj.fee_per_kb) {
            (Some(fee), _) => FeePolicy::Fixed(fee),
            (None, Some(rate)) => FeePolicy::PerKb(rate),
            (None, None) => FeePolicy::Default,
        };
        if let Some(hash) = &obj.hash {
            if *hash != tx.txid() {
                return Err(TxError::HashMismatch);
            }
        }
        Ok(tx)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_object())?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_object(&serde_json::from_str(json)?)
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Transaction {
    type Err = TxError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Network;

    const KEY: &str = "cSY2jbTDyPhmEx94TD72NwuHQ4J4pxzMEjj8G1Nc7c1eptCnevza";
    const OTHER: &str = "cNuW8LX2oeQXfKKCGxajGvqwhCgBtacwTQqiCGHzzKfmpHGY4TE9";

    fn funded(satoshis: u64) -> (Transaction, PrivateKey) {
        let key = PrivateKey::from_wif(KEY).unwrap();
        let utxo = UnspentOutput::new(
            [0x42; 32],
            0,
            Script::from_address(&key.to_address()),
            satoshis,
        );
        let mut tx = Transaction::new();
        tx.from_utxo(&utxo);
        (tx, key)
    }

    #[test]
    fn test_empty_transaction_wire_form() {
        let tx = Transaction::from_hex("ffffffff0000ffffffff").unwrap();
        assert_eq!(tx.version(), -1);
        assert_eq!(tx.lock_time(), 0xffff_ffff);
        assert_eq!(tx.to_hex(), "ffffffff0000ffffffff");
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        assert!(matches!(
            Transaction::from_hex("ffffffff0000ffffffff00"),
            Err(TxError::Decode { offset: 10, .. })
        ));
    }

    #[test]
    fn test_truncated_input_reports_offset() {
        match Transaction::from_hex("0100000001aa") {
            Err(TxError::Decode { offset, .. }) => assert_eq!(offset, 5),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_utxo_ignored() {
        let (mut tx, key) = funded(100_000);
        let utxo = UnspentOutput::new([0x42; 32], 0, Script::from_address(&key.to_address()), 100_000);
        tx.from_utxo(&utxo);
        assert_eq!(tx.inputs().len(), 1);
    }

    #[test]
    fn test_change_and_zero_fee() {
        let (mut tx, key) = funded(100_000);
        let to = PrivateKey::from_wif(OTHER).unwrap().to_address();
        tx.to(&to, 50_000).unwrap().change(&key.to_address()).fee(0);
        tx.sign(&[key]).unwrap();
        assert_eq!(tx.outputs().len(), 2);
        assert_eq!(tx.get_change_output().map(|o| o.satoshis), Some(50_000));
        assert!(tx.is_fully_signed().unwrap());
    }

    #[test]
    fn test_hash_cache_invalidated_by_mutation() {
        let (mut tx, _) = funded(100_000);
        let before = tx.hash();
        tx.add_data(b"floData");
        assert_ne!(tx.hash(), before);
        let again = tx.hash();
        tx.set_lock_time(10);
        assert_ne!(tx.hash(), again);
    }

    #[test]
    fn test_remove_output_keeps_change_index() {
        let (mut tx, key) = funded(10_000_000);
        let to = PrivateKey::from_wif(OTHER).unwrap().to_address();
        tx.to(&to, 1000).unwrap().to(&to, 2000).unwrap();
        tx.change(&key.to_address());
        assert_eq!(tx.get_change_output().map(|o| o.script.clone()), Some(Script::from_address(&key.to_address())));
        tx.remove_output(0).unwrap();
        assert_eq!(tx.outputs()[0].satoshis, 2000);
        assert_eq!(tx.get_change_output().map(|o| o.script.clone()), Some(Script::from_address(&key.to_address())));
        assert_eq!(tx.outputs().len(), 2);
    }

    #[test]
    fn test_estimate_size_counts_nine_bytes_per_output() {
        let (mut tx, _) = funded(1_000_000);
        tx.add_data(&[0u8; 300]);
        let script_len = tx.outputs()[0].script.byte_len();
        assert_eq!(script_len, 304);
        assert_eq!(tx.estimate_size(), MAXIMUM_EXTRA_SIZE + PUBLIC_KEY_HASH_INPUT_SIZE + script_len + 9);
    }

    #[test]
    fn test_lock_time_interpretation() {
        let mut tx = Transaction::new();
        assert_eq!(tx.get_lock_time(), None);
        tx.set_lock_time(499_999_999);
        assert_eq!(tx.get_lock_time(), Some(LockTime::BlockHeight(499_999_999)));
        tx.set_lock_time(500_000_000);
        assert_eq!(tx.get_lock_time(), Some(LockTime::Timestamp(500_000_000)));
    }

    #[test]
    fn test_to_rejects_excess_amount() {
        let mut tx = Transaction::new();
        let to = PrivateKey::from_wif(KEY).unwrap().public_key().to_address(Network::Testnet);
        assert!(matches!(tx.to(&to, MAX_MONEY + 1), Err(TxError::InvalidAmount(_))));
        assert!(tx.to(&to, 0).is_ok());
    }
}
