//! Script interpreter
//!
//! Executes an unlocking script, then the locking script it redeems, over a main stack
//! and an alt stack. Pay-to-script-hash and version 0 witness programs (native and
//! P2SH-nested) are redeemed when the matching [`VerifyFlags`] are set. Every failure
//! carries a specific [`ScriptError`].

use crate::constants::*;
use crate::hash::{hash160, ripemd160, sha1, sha256, sha256d};
use crate::opcode::*;
use crate::script::{Script, ScriptChunk};
use crate::script_num::{self, cast_to_bool, DEFAULT_MAX_NUM_SIZE, LOCKTIME_MAX_NUM_SIZE};
use crate::sighash::{sighash_legacy, sighash_witness_v0, SIGHASH_ANYONECANPAY, SIGHASH_SINGLE};
use crate::transaction::Transaction;
use crate::types::{ByteString, Witness};
use secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1};
use std::ops::{BitOr, BitOrAssign};
use thiserror::Error;

/// Verification flags: 𝔽 = 2^{rules}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VerifyFlags(u32);

impl VerifyFlags {
    pub const NONE: VerifyFlags = VerifyFlags(0);
    pub const P2SH: VerifyFlags = VerifyFlags(1 << 0);
    pub const STRICTENC: VerifyFlags = VerifyFlags(1 << 1);
    pub const DERSIG: VerifyFlags = VerifyFlags(1 << 2);
    pub const LOW_S: VerifyFlags = VerifyFlags(1 << 3);
    pub const NULLDUMMY: VerifyFlags = VerifyFlags(1 << 4);
    pub const SIGPUSHONLY: VerifyFlags = VerifyFlags(1 << 5);
    pub const MINIMALDATA: VerifyFlags = VerifyFlags(1 << 6);
    pub const DISCOURAGE_UPGRADABLE_NOPS: VerifyFlags = VerifyFlags(1 << 7);
    pub const CLEANSTACK: VerifyFlags = VerifyFlags(1 << 8);
    pub const CHECKLOCKTIMEVERIFY: VerifyFlags = VerifyFlags(1 << 9);
    pub const CHECKSEQUENCEVERIFY: VerifyFlags = VerifyFlags(1 << 10);
    pub const WITNESS: VerifyFlags = VerifyFlags(1 << 11);
    pub const DISCOURAGE_UPGRADABLE_WITNESS_PROGRAM: VerifyFlags = VerifyFlags(1 << 12);
    pub const MINIMALIF: VerifyFlags = VerifyFlags(1 << 13);
    pub const NULLFAIL: VerifyFlags = VerifyFlags(1 << 14);
    pub const WITNESS_PUBKEYTYPE: VerifyFlags = VerifyFlags(1 << 15);

    /// Rules applied by transaction-level verification
    pub const STANDARD: VerifyFlags = VerifyFlags(
        Self::P2SH.0
            | Self::STRICTENC.0
            | Self::DERSIG.0
            | Self::LOW_S.0
            | Self::NULLDUMMY.0
            | Self::MINIMALDATA.0
            | Self::DISCOURAGE_UPGRADABLE_NOPS.0
            | Self::CLEANSTACK.0
            | Self::CHECKLOCKTIMEVERIFY.0
            | Self::CHECKSEQUENCEVERIFY.0
            | Self::WITNESS.0
            | Self::DISCOURAGE_UPGRADABLE_WITNESS_PROGRAM.0
            | Self::MINIMALIF.0
            | Self::NULLFAIL.0
            | Self::WITNESS_PUBKEYTYPE.0,
    );

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn from_bits(bits: u32) -> Self {
        VerifyFlags(bits)
    }

    pub const fn contains(self, other: VerifyFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for VerifyFlags {
    type Output = VerifyFlags;

    fn bitor(self, rhs: VerifyFlags) -> VerifyFlags {
        VerifyFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for VerifyFlags {
    fn bitor_assign(&mut self, rhs: VerifyFlags) {
        self.0 |= rhs.0;
    }
}

/// Reason a script failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    #[error("Script evaluated without error but finished with a false/empty top stack element")]
    EvalFalse,
    #[error("OP_RETURN was encountered")]
    OpReturn,
    #[error("Script is too big")]
    ScriptSize,
    #[error("Push value size limit exceeded")]
    PushSize,
    #[error("Operation limit exceeded")]
    OpCount,
    #[error("Stack size limit exceeded")]
    StackSize,
    #[error("Signature count negative or greater than pubkey count")]
    SigCount,
    #[error("Pubkey count negative or limit exceeded")]
    PubkeyCount,
    #[error("Script failed an OP_VERIFY operation")]
    Verify,
    #[error("Script failed an OP_EQUALVERIFY operation")]
    EqualVerify,
    #[error("Script failed an OP_CHECKMULTISIGVERIFY operation")]
    CheckMultisigVerify,
    #[error("Script failed an OP_CHECKSIGVERIFY operation")]
    CheckSigVerify,
    #[error("Script failed an OP_NUMEQUALVERIFY operation")]
    NumEqualVerify,
    #[error("Opcode missing or not understood")]
    BadOpcode,
    #[error("Attempted to use a disabled opcode")]
    DisabledOpcode,
    #[error("Operation not valid with the current stack size")]
    InvalidStackOperation,
    #[error("Operation not valid with the current altstack size")]
    InvalidAltstackOperation,
    #[error("Invalid OP_IF construction")]
    UnbalancedConditional,
    #[error("Negative locktime")]
    NegativeLocktime,
    #[error("Locktime requirement not satisfied")]
    UnsatisfiedLocktime,
    #[error("Signature hash type missing or not understood")]
    SigHashType,
    #[error("Non-canonical DER signature")]
    SigDer,
    #[error("Data push larger than necessary")]
    MinimalData,
    #[error("Only non-push operators allowed in signatures")]
    SigPushOnly,
    #[error("Non-canonical signature: S value is unnecessarily high")]
    SigHighS,
    #[error("Dummy CHECKMULTISIG argument must be zero")]
    SigNullDummy,
    #[error("Public key is neither compressed or uncompressed")]
    PubkeyType,
    #[error("Extra items left on stack after execution")]
    CleanStack,
    #[error("OP_IF/NOTIF argument must be minimal")]
    MinimalIf,
    #[error("Signature must be zero for failed CHECK(MULTI)SIG operation")]
    SigNullFail,
    #[error("NOPx reserved for soft-fork upgrades")]
    DiscourageUpgradableNops,
    #[error("Witness version reserved for soft-fork upgrades")]
    DiscourageUpgradableWitnessProgram,
    #[error("Witness program has incorrect length")]
    WitnessProgramWrongLength,
    #[error("Witness program was passed an empty witness")]
    WitnessProgramWitnessEmpty,
    #[error("Witness program hash mismatch")]
    WitnessProgramMismatch,
    #[error("Witness requires empty scriptSig")]
    WitnessMalleated,
    #[error("Witness requires only-redeemscript scriptSig")]
    WitnessMalleatedP2sh,
    #[error("Witness provided for non-witness script")]
    WitnessUnexpected,
    #[error("Using non-compressed keys in segwit")]
    WitnessPubkeyType,
    #[error("Script number overflow")]
    NumOverflow,
    #[error("Non-minimally encoded script number")]
    NumNonMinimal,
    #[error("Input {0} is out of range")]
    InputIndex(usize),
}

/// Signature version: which sighash algorithm a CHECKSIG uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigVersion {
    Base,
    WitnessV0,
}

/// The transaction-dependent checks the interpreter delegates
pub trait SignatureChecker {
    fn check_sig(&self, sig: &[u8], pubkey: &[u8], script_code: &Script, sigversion: SigVersion) -> bool;

    fn check_lock_time(&self, _lock_time: i64) -> bool {
        false
    }

    fn check_sequence(&self, _sequence: i64) -> bool {
        false
    }
}

/// Checker that fails every signature and lock-time check
pub struct NullChecker;

impl SignatureChecker for NullChecker {
    fn check_sig(&self, _: &[u8], _: &[u8], _: &Script, _: SigVersion) -> bool {
        false
    }
}

/// Checks signatures against one input of a transaction
pub struct TransactionSignatureChecker<'a> {
    pub tx: &'a Transaction,
    pub input_index: usize,
    pub amount: u64,
}

impl<'a> SignatureChecker for TransactionSignatureChecker<'a> {
    fn check_sig(&self, sig: &[u8], pubkey: &[u8], script_code: &Script, sigversion: SigVersion) -> bool {
        let (hash_type, der) = match sig.split_last() {
            Some((t, der)) => (*t as u32, der),
            None => return false,
        };
        let digest = match sigversion {
            SigVersion::Base => sighash_legacy(self.tx, self.input_index, script_code, hash_type),
            SigVersion::WitnessV0 => sighash_witness_v0(
                self.tx,
                self.input_index,
                &script_code.to_bytes(),
                self.amount,
                hash_type,
            ),
        };
        verify_ecdsa(&digest, der, pubkey)
    }

    /// nLockTime of the transaction must be of the same kind and at least `lock_time`
    fn check_lock_time(&self, lock_time: i64) -> bool {
        let threshold = NLOCKTIME_BLOCKHEIGHT_LIMIT as i64;
        let tx_lock_time = self.tx.lock_time() as i64;
        if !((tx_lock_time < threshold && lock_time < threshold)
            || (tx_lock_time >= threshold && lock_time >= threshold))
        {
            return false;
        }
        if lock_time > tx_lock_time {
            return false;
        }
        match self.tx.inputs().get(self.input_index) {
            Some(input) => input.sequence_number != DEFAULT_SEQNUMBER,
            None => false,
        }
    }

    /// Relative lock time (BIP68/112)
    fn check_sequence(&self, sequence: i64) -> bool {
        let tx_sequence = match self.tx.inputs().get(self.input_index) {
            Some(input) => input.sequence_number as i64,
            None => return false,
        };
        if self.tx.version() < 2 {
            return false;
        }
        if tx_sequence & SEQUENCE_LOCKTIME_DISABLE_FLAG as i64 != 0 {
            return false;
        }
        let mask = (SEQUENCE_LOCKTIME_TYPE_FLAG | SEQUENCE_LOCKTIME_MASK) as i64;
        let type_flag = SEQUENCE_LOCKTIME_TYPE_FLAG as i64;
        let tx_masked = tx_sequence & mask;
        let masked = sequence & mask;
        if !((tx_masked < type_flag && masked < type_flag) || (tx_masked >= type_flag && masked >= type_flag)) {
            return false;
        }
        masked <= tx_masked
    }
}

/// ECDSA verification over a 32-byte digest; high-S signatures are normalised first
pub fn verify_ecdsa(digest: &[u8; 32], der: &[u8], pubkey: &[u8]) -> bool {
    let secp = Secp256k1::verification_only();
    let pubkey = match PublicKey::from_slice(pubkey) {
        Ok(pk) => pk,
        Err(_) => return false,
    };
    let mut sig = match Signature::from_der_lax(der) {
        Ok(sig) => sig,
        Err(_) => return false,
    };
    sig.normalize_s();
    let msg = match Message::from_digest_slice(digest) {
        Ok(m) => m,
        Err(_) => return false,
    };
    secp.verify_ecdsa(&msg, &sig, &pubkey).is_ok()
}

/// BIP66 strict DER check of a signature including its trailing hash type byte
pub fn is_valid_signature_encoding(sig: &[u8]) -> bool {
    // 0x30 [total-length] 0x02 [R-length] [R] 0x02 [S-length] [S] [sighash]
    if sig.len() < 9 || sig.len() > 73 {
        return false;
    }
    if sig[0] != 0x30 || sig[1] as usize != sig.len() - 3 {
        return false;
    }
    let len_r = sig[3] as usize;
    if 5 + len_r >= sig.len() {
        return false;
    }
    let len_s = sig[5 + len_r] as usize;
    if len_r + len_s + 7 != sig.len() {
        return false;
    }
    if sig[2] != 0x02 || len_r == 0 || sig[4] & 0x80 != 0 {
        return false;
    }
    if len_r > 1 && sig[4] == 0x00 && sig[5] & 0x80 == 0 {
        return false;
    }
    if sig[len_r + 4] != 0x02 || len_s == 0 || sig[len_r + 6] & 0x80 != 0 {
        return false;
    }
    if len_s > 1 && sig[len_r + 6] == 0x00 && sig[len_r + 7] & 0x80 == 0 {
        return false;
    }
    true
}

fn is_low_der_signature(sig: &[u8]) -> bool {
    let der = &sig[..sig.len() - 1];
    match Signature::from_der_lax(der) {
        Ok(parsed) => {
            let mut normalized = parsed;
            normalized.normalize_s();
            normalized == parsed
        }
        Err(_) => false,
    }
}

fn is_defined_hashtype_signature(sig: &[u8]) -> bool {
    match sig.last() {
        Some(t) => {
            let base = (*t as u32) & !SIGHASH_ANYONECANPAY;
            (1..=SIGHASH_SINGLE).contains(&base)
        }
        None => false,
    }
}

fn check_signature_encoding(sig: &[u8], flags: VerifyFlags) -> Result<(), ScriptError> {
    // Empty signature: an explicitly failing CHECKSIG, not an encoding error
    if sig.is_empty() {
        return Ok(());
    }
    if (flags.contains(VerifyFlags::DERSIG)
        || flags.contains(VerifyFlags::LOW_S)
        || flags.contains(VerifyFlags::STRICTENC))
        && !is_valid_signature_encoding(sig)
    {
        return Err(ScriptError::SigDer);
    }
    if flags.contains(VerifyFlags::LOW_S) && !is_low_der_signature(sig) {
        return Err(ScriptError::SigHighS);
    }
    if flags.contains(VerifyFlags::STRICTENC) && !is_defined_hashtype_signature(sig) {
        return Err(ScriptError::SigHashType);
    }
    Ok(())
}

fn is_compressed_or_uncompressed_pubkey(pubkey: &[u8]) -> bool {
    match pubkey.first() {
        Some(0x04) => pubkey.len() == 65,
        Some(0x02) | Some(0x03) => pubkey.len() == 33,
        _ => false,
    }
}

fn check_pubkey_encoding(pubkey: &[u8], flags: VerifyFlags, sigversion: SigVersion) -> Result<(), ScriptError> {
    if flags.contains(VerifyFlags::STRICTENC) && !is_compressed_or_uncompressed_pubkey(pubkey) {
        return Err(ScriptError::PubkeyType);
    }
    if flags.contains(VerifyFlags::WITNESS_PUBKEYTYPE)
        && sigversion == SigVersion::WitnessV0
        && !(pubkey.len() == 33 && matches!(pubkey[0], 0x02 | 0x03))
    {
        return Err(ScriptError::WitnessPubkeyType);
    }
    Ok(())
}

/// The push used is the shortest encoding of its data
fn check_minimal_push(chunk: &ScriptChunk) -> bool {
    let data = match chunk.push_data() {
        Some(d) => d,
        None => return true,
    };
    let op = chunk.opcode;
    if data.is_empty() {
        return op == OP_0;
    }
    if data.len() == 1 && (1..=16).contains(&data[0]) {
        return false;
    }
    if data.len() == 1 && data[0] == 0x81 {
        return false;
    }
    if data.len() <= 75 {
        return op as usize == data.len();
    }
    if data.len() <= 255 {
        return op == OP_PUSHDATA1;
    }
    if data.len() <= 65535 {
        return op == OP_PUSHDATA2;
    }
    true
}

fn bool_bytes(v: bool) -> ByteString {
    if v {
        vec![1]
    } else {
        Vec::new()
    }
}

/// Element `depth` from the top (1 = top)
fn top(stack: &[ByteString], depth: usize) -> Result<&ByteString, ScriptError> {
    if depth == 0 || depth > stack.len() {
        return Err(ScriptError::InvalidStackOperation);
    }
    Ok(&stack[stack.len() - depth])
}

fn pop(stack: &mut Vec<ByteString>) -> Result<ByteString, ScriptError> {
    stack.pop().ok_or(ScriptError::InvalidStackOperation)
}

fn pop_num(stack: &mut Vec<ByteString>, minimal: bool) -> Result<i64, ScriptError> {
    let v = pop(stack)?;
    script_num::decode(&v, minimal, DEFAULT_MAX_NUM_SIZE)
}

/// EvalScript: 𝒮𝒞 × 𝒮𝒯 → 𝒮𝒯 ∪ {error}
///
/// Runs `script` on `stack`:
/// 1. |script| ≤ 10,000 bytes, every push ≤ 520 bytes, ≤ 201 non-push opcodes
/// 2. disabled opcodes fail even inside an unexecuted branch
/// 3. |stack| + |altstack| ≤ 1,000 after every step
/// 4. all IF/NOTIF branches closed at the end
pub fn eval_script(
    script: &Script,
    stack: &mut Vec<ByteString>,
    flags: VerifyFlags,
    checker: &dyn SignatureChecker,
    sigversion: SigVersion,
) -> Result<(), ScriptError> {
    if script.byte_len() > MAX_SCRIPT_SIZE {
        return Err(ScriptError::ScriptSize);
    }
    let chunks = script.chunks();
    let minimal = flags.contains(VerifyFlags::MINIMALDATA);
    let mut altstack: Vec<ByteString> = Vec::new();
    let mut vf_exec: Vec<bool> = Vec::new();
    let mut op_count = 0usize;
    let mut begin_code_hash = 0usize;

    for (pc, chunk) in chunks.iter().enumerate() {
        let op = chunk.opcode;
        let executing = !vf_exec.contains(&false);

        if chunk.data.as_ref().map_or(false, |d| d.len() > MAX_SCRIPT_ELEMENT_SIZE) {
            return Err(ScriptError::PushSize);
        }
        if op > OP_16 {
            op_count += 1;
            if op_count > MAX_SCRIPT_OPS {
                return Err(ScriptError::OpCount);
            }
        }
        if is_disabled(op) {
            return Err(ScriptError::DisabledOpcode);
        }

        if executing && op <= OP_PUSHDATA4 {
            if minimal && !check_minimal_push(chunk) {
                return Err(ScriptError::MinimalData);
            }
            stack.push(chunk.push_data().map(<[u8]>::to_vec).unwrap_or_default());
        } else if executing || (OP_IF..=OP_ENDIF).contains(&op) {
            match op {
                // Constants
                OP_1NEGATE | OP_1..=OP_16 => {
                    let n = op as i64 - (OP_1 as i64 - 1);
                    stack.push(script_num::encode(n));
                }

                // Control
                OP_NOP => {}
                OP_CHECKLOCKTIMEVERIFY => {
                    if !flags.contains(VerifyFlags::CHECKLOCKTIMEVERIFY) {
                        if flags.contains(VerifyFlags::DISCOURAGE_UPGRADABLE_NOPS) {
                            return Err(ScriptError::DiscourageUpgradableNops);
                        }
                    } else {
                        let lock_time = script_num::decode(top(stack, 1)?, minimal, LOCKTIME_MAX_NUM_SIZE)?;
                        if lock_time < 0 {
                            return Err(ScriptError::NegativeLocktime);
                        }
                        if !checker.check_lock_time(lock_time) {
                            return Err(ScriptError::UnsatisfiedLocktime);
                        }
                    }
                }
                OP_CHECKSEQUENCEVERIFY => {
                    if !flags.contains(VerifyFlags::CHECKSEQUENCEVERIFY) {
                        if flags.contains(VerifyFlags::DISCOURAGE_UPGRADABLE_NOPS) {
                            return Err(ScriptError::DiscourageUpgradableNops);
                        }
                    } else {
                        let sequence = script_num::decode(top(stack, 1)?, minimal, LOCKTIME_MAX_NUM_SIZE)?;
                        if sequence < 0 {
                            return Err(ScriptError::NegativeLocktime);
                        }
                        if sequence & SEQUENCE_LOCKTIME_DISABLE_FLAG as i64 == 0
                            && !checker.check_sequence(sequence)
                        {
                            return Err(ScriptError::UnsatisfiedLocktime);
                        }
                    }
                }
                OP_NOP1 | OP_NOP4..=OP_NOP10 => {
                    if flags.contains(VerifyFlags::DISCOURAGE_UPGRADABLE_NOPS) {
                        return Err(ScriptError::DiscourageUpgradableNops);
                    }
                }
                OP_IF | OP_NOTIF => {
                    let mut value = false;
                    if executing {
                        let cond = top(stack, 1).map_err(|_| ScriptError::UnbalancedConditional)?;
                        if sigversion == SigVersion::WitnessV0 && flags.contains(VerifyFlags::MINIMALIF) {
                            if cond.len() > 1 || (cond.len() == 1 && cond[0] != 1) {
                                return Err(ScriptError::MinimalIf);
                            }
                        }
                        value = cast_to_bool(cond);
                        if op == OP_NOTIF {
                            value = !value;
                        }
                        stack.pop();
                    }
                    vf_exec.push(value);
                }
                OP_ELSE => match vf_exec.last_mut() {
                    Some(last) => *last = !*last,
                    None => return Err(ScriptError::UnbalancedConditional),
                },
                OP_ENDIF => {
                    if vf_exec.pop().is_none() {
                        return Err(ScriptError::UnbalancedConditional);
                    }
                }
                OP_VERIFY => {
                    if cast_to_bool(top(stack, 1)?) {
                        stack.pop();
                    } else {
                        return Err(ScriptError::Verify);
                    }
                }
                OP_RETURN => return Err(ScriptError::OpReturn),

                // Stack ops
                OP_TOALTSTACK => altstack.push(pop(stack)?),
                OP_FROMALTSTACK => {
                    let v = altstack.pop().ok_or(ScriptError::InvalidAltstackOperation)?;
                    stack.push(v);
                }
                OP_2DROP => {
                    top(stack, 2)?;
                    stack.truncate(stack.len() - 2);
                }
                OP_2DUP => {
                    let a = top(stack, 2)?.clone();
                    let b = top(stack, 1)?.clone();
                    stack.push(a);
                    stack.push(b);
                }
                OP_3DUP => {
                    let a = top(stack, 3)?.clone();
                    let b = top(stack, 2)?.clone();
                    let c = top(stack, 1)?.clone();
                    stack.push(a);
                    stack.push(b);
                    stack.push(c);
                }
                OP_2OVER => {
                    let a = top(stack, 4)?.clone();
                    let b = top(stack, 3)?.clone();
                    stack.push(a);
                    stack.push(b);
                }
                OP_2ROT => {
                    top(stack, 6)?;
                    let start = stack.len() - 6;
                    let moved: Vec<ByteString> = stack.drain(start..start + 2).collect();
                    stack.extend(moved);
                }
                OP_2SWAP => {
                    top(stack, 4)?;
                    let n = stack.len();
                    stack.swap(n - 4, n - 2);
                    stack.swap(n - 3, n - 1);
                }
                OP_IFDUP => {
                    let v = top(stack, 1)?.clone();
                    if cast_to_bool(&v) {
                        stack.push(v);
                    }
                }
                OP_DEPTH => stack.push(script_num::encode(stack.len() as i64)),
                OP_DROP => {
                    pop(stack)?;
                }
                OP_DUP => {
                    let v = top(stack, 1)?.clone();
                    stack.push(v);
                }
                OP_NIP => {
                    top(stack, 2)?;
                    let n = stack.len();
                    stack.remove(n - 2);
                }
                OP_OVER => {
                    let v = top(stack, 2)?.clone();
                    stack.push(v);
                }
                OP_PICK | OP_ROLL => {
                    top(stack, 2)?;
                    let n = pop_num(stack, minimal)?;
                    if n < 0 || n as usize >= stack.len() {
                        return Err(ScriptError::InvalidStackOperation);
                    }
                    let idx = stack.len() - 1 - n as usize;
                    let v = if op == OP_ROLL {
                        stack.remove(idx)
                    } else {
                        stack[idx].clone()
                    };
                    stack.push(v);
                }
                OP_ROT => {
                    top(stack, 3)?;
                    let n = stack.len();
                    stack.swap(n - 3, n - 2);
                    stack.swap(n - 2, n - 1);
                }
                OP_SWAP => {
                    top(stack, 2)?;
                    let n = stack.len();
                    stack.swap(n - 2, n - 1);
                }
                OP_TUCK => {
                    top(stack, 2)?;
                    let v = top(stack, 1)?.clone();
                    let n = stack.len();
                    stack.insert(n - 2, v);
                }

                // Splice
                OP_SIZE => {
                    let len = top(stack, 1)?.len();
                    stack.push(script_num::encode(len as i64));
                }

                // Bitwise logic
                OP_EQUAL | OP_EQUALVERIFY => {
                    top(stack, 2)?;
                    let b = pop(stack)?;
                    let a = pop(stack)?;
                    let equal = a == b;
                    stack.push(bool_bytes(equal));
                    if op == OP_EQUALVERIFY {
                        if equal {
                            stack.pop();
                        } else {
                            return Err(ScriptError::EqualVerify);
                        }
                    }
                }

                // Numeric
                OP_1ADD | OP_1SUB | OP_NEGATE | OP_ABS | OP_NOT | OP_0NOTEQUAL => {
                    let n = pop_num(stack, minimal)?;
                    let r = match op {
                        OP_1ADD => n + 1,
                        OP_1SUB => n - 1,
                        OP_NEGATE => -n,
                        OP_ABS => n.abs(),
                        OP_NOT => (n == 0) as i64,
                        _ => (n != 0) as i64,
                    };
                    stack.push(script_num::encode(r));
                }
                OP_ADD | OP_SUB | OP_BOOLAND | OP_BOOLOR | OP_NUMEQUAL | OP_NUMEQUALVERIFY
                | OP_NUMNOTEQUAL | OP_LESSTHAN | OP_GREATERTHAN | OP_LESSTHANOREQUAL
                | OP_GREATERTHANOREQUAL | OP_MIN | OP_MAX => {
                    top(stack, 2)?;
                    let b = pop_num(stack, minimal)?;
                    let a = pop_num(stack, minimal)?;
                    let r = match op {
                        OP_ADD => a + b,
                        OP_SUB => a - b,
                        OP_BOOLAND => (a != 0 && b != 0) as i64,
                        OP_BOOLOR => (a != 0 || b != 0) as i64,
                        OP_NUMEQUAL | OP_NUMEQUALVERIFY => (a == b) as i64,
                        OP_NUMNOTEQUAL => (a != b) as i64,
                        OP_LESSTHAN => (a < b) as i64,
                        OP_GREATERTHAN => (a > b) as i64,
                        OP_LESSTHANOREQUAL => (a <= b) as i64,
                        OP_GREATERTHANOREQUAL => (a >= b) as i64,
                        OP_MIN => a.min(b),
                        _ => a.max(b),
                    };
                    stack.push(script_num::encode(r));
                    if op == OP_NUMEQUALVERIFY {
                        if r != 0 {
                            stack.pop();
                        } else {
                            return Err(ScriptError::NumEqualVerify);
                        }
                    }
                }
                OP_WITHIN => {
                    top(stack, 3)?;
                    let max = pop_num(stack, minimal)?;
                    let min = pop_num(stack, minimal)?;
                    let x = pop_num(stack, minimal)?;
                    stack.push(bool_bytes(min <= x && x < max));
                }

                // Crypto
                OP_RIPEMD160 | OP_SHA1 | OP_SHA256 | OP_HASH160 | OP_HASH256 => {
                    let v = pop(stack)?;
                    let h = match op {
                        OP_RIPEMD160 => ripemd160(&v).to_vec(),
                        OP_SHA1 => sha1(&v).to_vec(),
                        OP_SHA256 => sha256(&v).to_vec(),
                        OP_HASH160 => hash160(&v).to_vec(),
                        _ => sha256d(&v).to_vec(),
                    };
                    stack.push(h);
                }
                OP_CODESEPARATOR => begin_code_hash = pc + 1,
                OP_CHECKSIG | OP_CHECKSIGVERIFY => {
                    let sig = top(stack, 2)?.clone();
                    let pubkey = top(stack, 1)?.clone();
                    let mut script_code = Script::from_chunks(chunks[begin_code_hash..].to_vec());
                    if sigversion == SigVersion::Base {
                        script_code = script_code.find_and_delete(&sig);
                    }
                    check_signature_encoding(&sig, flags)?;
                    check_pubkey_encoding(&pubkey, flags, sigversion)?;
                    let success = checker.check_sig(&sig, &pubkey, &script_code, sigversion);
                    if !success && flags.contains(VerifyFlags::NULLFAIL) && !sig.is_empty() {
                        return Err(ScriptError::SigNullFail);
                    }
                    stack.truncate(stack.len() - 2);
                    if op == OP_CHECKSIGVERIFY {
                        if !success {
                            return Err(ScriptError::CheckSigVerify);
                        }
                    } else {
                        stack.push(bool_bytes(success));
                    }
                }
                OP_CHECKMULTISIG | OP_CHECKMULTISIGVERIFY => {
                    let success = check_multisig(
                        stack,
                        &chunks[begin_code_hash..],
                        &mut op_count,
                        flags,
                        checker,
                        sigversion,
                    )?;
                    if op == OP_CHECKMULTISIGVERIFY {
                        if !success {
                            return Err(ScriptError::CheckMultisigVerify);
                        }
                    } else {
                        stack.push(bool_bytes(success));
                    }
                }
                _ => return Err(ScriptError::BadOpcode),
            }
        }

        if stack.len() + altstack.len() > MAX_STACK_SIZE {
            return Err(ScriptError::StackSize);
        }
    }

    if !vf_exec.is_empty() {
        return Err(ScriptError::UnbalancedConditional);
    }
    Ok(())
}

/// CHECKMULTISIG: ([dummy] sig₁..sigₘ m key₁..keyₙ n) → bool
///
/// Signatures must appear in the same order as their keys; each key is tried at most
/// once, so the walk fails early when too few keys remain for the remaining signatures.
fn check_multisig(
    stack: &mut Vec<ByteString>,
    code: &[ScriptChunk],
    op_count: &mut usize,
    flags: VerifyFlags,
    checker: &dyn SignatureChecker,
    sigversion: SigVersion,
) -> Result<bool, ScriptError> {
    let minimal = flags.contains(VerifyFlags::MINIMALDATA);
    let mut i = 1usize;
    let key_count = script_num::decode(top(stack, i)?, minimal, DEFAULT_MAX_NUM_SIZE)?;
    if key_count < 0 || key_count as usize > MAX_PUBKEYS_PER_MULTISIG {
        return Err(ScriptError::PubkeyCount);
    }
    let key_count = key_count as usize;
    *op_count += key_count;
    if *op_count > MAX_SCRIPT_OPS {
        return Err(ScriptError::OpCount);
    }
    i += 1;
    let mut ikey = i;
    // Keys beyond this index may be left unchecked when a signature fails (NULLFAIL)
    let mut ikey2 = key_count + 2;
    i += key_count;
    let sig_count = script_num::decode(top(stack, i)?, minimal, DEFAULT_MAX_NUM_SIZE)?;
    if sig_count < 0 || sig_count as usize > key_count {
        return Err(ScriptError::SigCount);
    }
    let sig_count = sig_count as usize;
    i += 1;
    let mut isig = i;
    i += sig_count;
    // Dummy element must exist
    top(stack, i)?;

    let mut script_code = Script::from_chunks(code.to_vec());
    if sigversion == SigVersion::Base {
        for k in 0..sig_count {
            let sig = top(stack, isig + k)?.clone();
            script_code = script_code.find_and_delete(&sig);
        }
    }

    let mut success = true;
    let mut sigs_left = sig_count;
    let mut keys_left = key_count;
    while success && sigs_left > 0 {
        let sig = top(stack, isig)?.clone();
        let pubkey = top(stack, ikey)?.clone();
        check_signature_encoding(&sig, flags)?;
        check_pubkey_encoding(&pubkey, flags, sigversion)?;
        if checker.check_sig(&sig, &pubkey, &script_code, sigversion) {
            isig += 1;
            sigs_left -= 1;
        }
        ikey += 1;
        keys_left -= 1;
        if sigs_left > keys_left {
            success = false;
        }
    }

    // Pop everything, checking NULLFAIL on the signatures on the way
    while i > 1 {
        if !success && flags.contains(VerifyFlags::NULLFAIL) && ikey2 == 0 && !top(stack, 1)?.is_empty() {
            return Err(ScriptError::SigNullFail);
        }
        if ikey2 > 0 {
            ikey2 -= 1;
        }
        stack.pop();
        i -= 1;
    }

    // The dummy is consumed too; it must be empty under NULLDUMMY
    if flags.contains(VerifyFlags::NULLDUMMY) && !top(stack, 1)?.is_empty() {
        return Err(ScriptError::SigNullDummy);
    }
    stack.pop();
    Ok(success)
}

fn verify_witness_program(
    witness: &Witness,
    version: u8,
    program: &[u8],
    flags: VerifyFlags,
    checker: &dyn SignatureChecker,
) -> Result<(), ScriptError> {
    let (script, mut stack) = if version == 0 {
        if program.len() == 32 {
            let (witness_script, rest) = witness
                .split_last()
                .ok_or(ScriptError::WitnessProgramWitnessEmpty)?;
            if sha256(witness_script)[..] != *program {
                return Err(ScriptError::WitnessProgramMismatch);
            }
            let script = Script::from_bytes(witness_script).map_err(|_| ScriptError::BadOpcode)?;
            (script, rest.to_vec())
        } else if program.len() == 20 {
            if witness.len() != 2 {
                return Err(ScriptError::WitnessProgramMismatch);
            }
            let mut hash = [0u8; 20];
            hash.copy_from_slice(program);
            (Script::build_public_key_hash_out(&hash), witness.clone())
        } else {
            return Err(ScriptError::WitnessProgramWrongLength);
        }
    } else if flags.contains(VerifyFlags::DISCOURAGE_UPGRADABLE_WITNESS_PROGRAM) {
        return Err(ScriptError::DiscourageUpgradableWitnessProgram);
    } else {
        // Future versions are anyone-can-spend until they are defined
        return Ok(());
    };

    if stack.iter().any(|e| e.len() > MAX_SCRIPT_ELEMENT_SIZE) {
        return Err(ScriptError::PushSize);
    }
    eval_script(&script, &mut stack, flags, checker, SigVersion::WitnessV0)?;
    if stack.len() != 1 || !cast_to_bool(&stack[0]) {
        return Err(ScriptError::EvalFalse);
    }
    Ok(())
}

/// VerifyScript: 𝒮𝒞 × 𝒮𝒞 × 𝒲 × 𝔽 → {ok} ∪ {error}
///
/// 1. run the unlocking script, then the locking script on the resulting stack
/// 2. top of stack must be true
/// 3. witness program in the locking script: redeem it from the witness (empty unlocking script)
/// 4. P2SH (flag): run the redeem script popped from a copy of the unlocking stack,
///    itself possibly a witness program (unlocking script must be exactly its push)
/// 5. CLEANSTACK leaves exactly one element; a witness on a non-witness spend fails
pub fn verify_script(
    script_sig: &Script,
    script_pubkey: &Script,
    witness: &Witness,
    flags: VerifyFlags,
    checker: &dyn SignatureChecker,
) -> Result<(), ScriptError> {
    let mut had_witness = false;
    if flags.contains(VerifyFlags::SIGPUSHONLY) && !script_sig.is_push_only() {
        return Err(ScriptError::SigPushOnly);
    }

    let mut stack: Vec<ByteString> = Vec::new();
    eval_script(script_sig, &mut stack, flags, checker, SigVersion::Base)?;
    let stack_copy = if flags.contains(VerifyFlags::P2SH) {
        stack.clone()
    } else {
        Vec::new()
    };
    eval_script(script_pubkey, &mut stack, flags, checker, SigVersion::Base)?;
    match stack.last() {
        Some(v) if cast_to_bool(v) => {}
        _ => return Err(ScriptError::EvalFalse),
    }

    if flags.contains(VerifyFlags::WITNESS) {
        if let Some((version, program)) = script_pubkey.witness_program() {
            had_witness = true;
            if !script_sig.is_empty() {
                return Err(ScriptError::WitnessMalleated);
            }
            verify_witness_program(witness, version, &program, flags, checker)?;
            stack.truncate(1);
        }
    }

    if flags.contains(VerifyFlags::P2SH) && script_pubkey.is_script_hash_out() {
        if !script_sig.is_push_only() {
            return Err(ScriptError::SigPushOnly);
        }
        stack = stack_copy;
        let redeem_bytes = pop(&mut stack)?;
        let redeem = Script::from_bytes(&redeem_bytes).map_err(|_| ScriptError::BadOpcode)?;
        eval_script(&redeem, &mut stack, flags, checker, SigVersion::Base)?;
        match stack.last() {
            Some(v) if cast_to_bool(v) => {}
            _ => return Err(ScriptError::EvalFalse),
        }

        if flags.contains(VerifyFlags::WITNESS) {
            if let Some((version, program)) = redeem.witness_program() {
                had_witness = true;
                let mut expected = Script::new();
                expected.add_data(&redeem_bytes);
                if script_sig.to_bytes() != expected.to_bytes() {
                    return Err(ScriptError::WitnessMalleatedP2sh);
                }
                verify_witness_program(witness, version, &program, flags, checker)?;
                stack.truncate(1);
            }
        }
    }

    if flags.contains(VerifyFlags::CLEANSTACK) && stack.len() != 1 {
        return Err(ScriptError::CleanStack);
    }

    if flags.contains(VerifyFlags::WITNESS) && !had_witness && !witness.is_empty() {
        return Err(ScriptError::WitnessUnexpected);
    }
    Ok(())
}

/// Verify one input of `tx`: unlocking script, locking script, witness and spent amount
pub fn verify(
    script_sig: &Script,
    script_pubkey: &Script,
    tx: &Transaction,
    input_index: usize,
    flags: VerifyFlags,
    witness: &Witness,
    amount: u64,
) -> Result<(), ScriptError> {
    if input_index >= tx.inputs().len() {
        return Err(ScriptError::InputIndex(input_index));
    }
    let checker = TransactionSignatureChecker {
        tx,
        input_index,
        amount,
    };
    let result = verify_script(script_sig, script_pubkey, witness, flags, &checker);
    log::trace!("input {} script verification: {:?}", input_index, result);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(script: &Script) -> Result<Vec<ByteString>, ScriptError> {
        let mut stack = Vec::new();
        eval_script(script, &mut stack, VerifyFlags::STANDARD, &NullChecker, SigVersion::Base)?;
        Ok(stack)
    }

    fn ops(list: &[u8]) -> Script {
        let mut s = Script::new();
        for op in list {
            s.add_opcode(*op);
        }
        s
    }

    #[test]
    fn test_arithmetic() {
        let stack = run(&ops(&[OP_2, OP_3, OP_ADD, OP_5, OP_NUMEQUAL])).unwrap();
        assert_eq!(stack, vec![vec![1]]);
    }

    #[test]
    fn test_stack_underflow() {
        assert_eq!(run(&ops(&[OP_DUP])), Err(ScriptError::InvalidStackOperation));
        assert_eq!(run(&ops(&[OP_1, OP_ADD])), Err(ScriptError::InvalidStackOperation));
    }

    #[test]
    fn test_disabled_opcode_fails_in_unexecuted_branch() {
        let s = ops(&[OP_0, OP_IF, OP_CAT, OP_ENDIF]);
        assert_eq!(run(&s), Err(ScriptError::DisabledOpcode));
    }

    #[test]
    fn test_unexecuted_branch_skips_ops() {
        let stack = run(&ops(&[OP_0, OP_IF, OP_RETURN, OP_ELSE, OP_7, OP_ENDIF])).unwrap();
        assert_eq!(stack, vec![vec![7]]);
    }

    #[test]
    fn test_unbalanced_conditional() {
        assert_eq!(run(&ops(&[OP_1, OP_IF])), Err(ScriptError::UnbalancedConditional));
        assert_eq!(run(&ops(&[OP_ENDIF])), Err(ScriptError::UnbalancedConditional));
    }

    #[test]
    fn test_numeric_operand_overflow() {
        let mut s = Script::new();
        s.add_data(&[1, 2, 3, 4, 5]).add_opcode(OP_1ADD);
        assert_eq!(run(&s), Err(ScriptError::NumOverflow));
    }

    #[test]
    fn test_arithmetic_result_width_checked_on_reuse() {
        // 0x7fffffff + 0x7fffffff needs 5 bytes; using it again fails
        let mut s = Script::new();
        s.add_data(&[0xff, 0xff, 0xff, 0x7f])
            .add_opcode(OP_DUP)
            .add_opcode(OP_ADD)
            .add_opcode(OP_1ADD);
        assert_eq!(run(&s), Err(ScriptError::NumOverflow));
    }

    #[test]
    fn test_minimal_data() {
        let mut s = Script::new();
        s.add_chunk(ScriptChunk {
            opcode: 0x01,
            data: Some(vec![0x05]),
        });
        assert_eq!(run(&s), Err(ScriptError::MinimalData));
        let mut stack = Vec::new();
        assert!(eval_script(&s, &mut stack, VerifyFlags::NONE, &NullChecker, SigVersion::Base).is_ok());
    }

    #[test]
    fn test_op_return() {
        assert_eq!(run(&ops(&[OP_RETURN])), Err(ScriptError::OpReturn));
    }

    #[test]
    fn test_push_size_limit() {
        let mut s = Script::new();
        s.add_data(&[0u8; 521]);
        assert_eq!(run(&s), Err(ScriptError::PushSize));
    }

    #[test]
    fn test_op_count_limit() {
        let s = ops(&vec![OP_NOP; MAX_SCRIPT_OPS + 1]);
        assert_eq!(run(&s), Err(ScriptError::OpCount));
    }

    #[test]
    fn test_hash_ops() {
        let mut s = Script::new();
        s.add_opcode(OP_0).add_opcode(OP_SHA256);
        let stack = run(&s).unwrap();
        assert_eq!(stack[0], sha256(&[]).to_vec());
    }

    #[test]
    fn test_pick_roll() {
        let stack = run(&ops(&[OP_1, OP_2, OP_3, OP_2, OP_ROLL])).unwrap();
        assert_eq!(stack, vec![vec![2], vec![3], vec![1]]);
        let stack = run(&ops(&[OP_1, OP_2, OP_3, OP_2, OP_PICK])).unwrap();
        assert_eq!(stack, vec![vec![1], vec![2], vec![3], vec![1]]);
    }

    #[test]
    fn test_rot_and_2rot() {
        let stack = run(&ops(&[OP_1, OP_2, OP_3, OP_ROT])).unwrap();
        assert_eq!(stack, vec![vec![2], vec![3], vec![1]]);
        let stack = run(&ops(&[OP_1, OP_2, OP_3, OP_4, OP_5, OP_6, OP_2ROT])).unwrap();
        assert_eq!(stack, vec![vec![3], vec![4], vec![5], vec![6], vec![1], vec![2]]);
    }

    #[test]
    fn test_checkmultisig_pubkey_count() {
        let mut s = Script::new();
        s.add_opcode(OP_0).add_opcode(OP_0).add_data(&script_num::encode(21)).add_opcode(OP_CHECKMULTISIG);
        assert_eq!(run(&s), Err(ScriptError::PubkeyCount));
    }

    #[test]
    fn test_checkmultisig_zero_of_zero() {
        let stack = run(&ops(&[OP_0, OP_0, OP_0, OP_CHECKMULTISIG])).unwrap();
        assert_eq!(stack, vec![vec![1]]);
    }

    #[test]
    fn test_checkmultisig_nulldummy() {
        let s = ops(&[OP_1, OP_0, OP_0, OP_CHECKMULTISIG]);
        assert_eq!(run(&s), Err(ScriptError::SigNullDummy));
    }

    #[test]
    fn test_nop_upgrades_discouraged() {
        assert_eq!(run(&ops(&[OP_NOP5])), Err(ScriptError::DiscourageUpgradableNops));
        let mut stack = Vec::new();
        assert!(eval_script(&ops(&[OP_NOP5]), &mut stack, VerifyFlags::NONE, &NullChecker, SigVersion::Base).is_ok());
    }

    #[test]
    fn test_strict_der_encoding() {
        let good = hex::decode("3044022022494a75e86ead0feef9508414b7b796ab829176647828abfbd32b9e1a5697fe02201426fd3a13f1ce0f30eac0bc1689ddbbf331e812c280d2b24af7d67cb411fe3001").unwrap();
        assert!(is_valid_signature_encoding(&good));
        let mut bad = good.clone();
        bad[1] += 1;
        assert!(!is_valid_signature_encoding(&bad));
        assert!(is_defined_hashtype_signature(&good));
        let mut undefined = good.clone();
        *undefined.last_mut().unwrap() = 0x04;
        assert!(!is_defined_hashtype_signature(&undefined));
    }

    #[test]
    fn test_flags_compose() {
        let f = VerifyFlags::P2SH | VerifyFlags::WITNESS;
        assert!(f.contains(VerifyFlags::P2SH));
        assert!(!f.contains(VerifyFlags::CLEANSTACK));
        assert!(VerifyFlags::STANDARD.contains(f));
    }

    #[test]
    fn test_verify_script_p2sh_redeem() {
        let redeem = ops(&[OP_2, OP_3, OP_ADD, OP_5, OP_EQUAL]);
        let script_pubkey = Script::build_script_hash_out(&hash160(&redeem.to_bytes()));
        let mut script_sig = Script::new();
        script_sig.add_data(&redeem.to_bytes());
        let flags = VerifyFlags::P2SH;
        assert!(verify_script(&script_sig, &script_pubkey, &Vec::new(), flags, &NullChecker).is_ok());

        let wrong = ops(&[OP_2, OP_2, OP_ADD, OP_5, OP_EQUAL]);
        let mut bad_sig = Script::new();
        bad_sig.add_data(&wrong.to_bytes());
        assert_eq!(
            verify_script(&bad_sig, &script_pubkey, &Vec::new(), flags, &NullChecker),
            Err(ScriptError::EvalFalse)
        );
    }

    #[test]
    fn test_witness_unexpected() {
        let flags = VerifyFlags::P2SH | VerifyFlags::WITNESS;
        let witness = vec![vec![1u8]];
        assert_eq!(
            verify_script(&Script::new(), &ops(&[OP_1]), &witness, flags, &NullChecker),
            Err(ScriptError::WitnessUnexpected)
        );
    }

    #[test]
    fn test_cleanstack() {
        let flags = VerifyFlags::P2SH | VerifyFlags::WITNESS | VerifyFlags::CLEANSTACK;
        assert_eq!(
            verify_script(&ops(&[OP_1]), &ops(&[OP_1]), &Vec::new(), flags, &NullChecker),
            Err(ScriptError::CleanStack)
        );
    }
}
