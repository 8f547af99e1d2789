//! Script representation: chunked opcodes and data pushes
//!
//! A [`Script`] keeps every push exactly as it was encoded, so non-minimal pushes and
//! unknown opcodes survive a decode/encode round trip byte for byte.

use crate::address::Address;
use crate::encoding::Reader;
use crate::error::{Result, TxError};
use crate::hash::sha256;
use crate::keys::PublicKey;
use crate::opcode::*;
use std::fmt;
use std::str::FromStr;

/// Standard size limit of an OP_RETURN payload
pub const OP_RETURN_STANDARD_SIZE: usize = 80;

/// One opcode, or one data push together with the opcode that encoded it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptChunk {
    pub opcode: u8,
    pub data: Option<Vec<u8>>,
}

impl ScriptChunk {
    pub fn op(opcode: u8) -> Self {
        Self { opcode, data: None }
    }

    /// Minimal push of `data`
    pub fn push(data: &[u8]) -> Self {
        let opcode = match data.len() {
            0 => return Self::op(OP_0),
            n if n < OP_PUSHDATA1 as usize => n as u8,
            n if n <= 0xff => OP_PUSHDATA1,
            n if n <= 0xffff => OP_PUSHDATA2,
            _ => OP_PUSHDATA4,
        };
        Self {
            opcode,
            data: Some(data.to_vec()),
        }
    }

    pub fn is_push(&self) -> bool {
        self.data.is_some() || self.opcode == OP_0
    }

    /// Pushed bytes; OP_0 pushes the empty string
    pub fn push_data(&self) -> Option<&[u8]> {
        match &self.data {
            Some(d) => Some(d),
            None if self.opcode == OP_0 => Some(&[]),
            None => None,
        }
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.push(self.opcode);
        if let Some(data) = &self.data {
            match self.opcode {
                OP_PUSHDATA1 => out.push(data.len() as u8),
                OP_PUSHDATA2 => out.extend_from_slice(&(data.len() as u16).to_le_bytes()),
                OP_PUSHDATA4 => out.extend_from_slice(&(data.len() as u32).to_le_bytes()),
                _ => {}
            }
            out.extend_from_slice(data);
        }
    }
}

/// Shape of a standard script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptType {
    PublicKeyHashOut,
    PublicKeyOut,
    ScriptHashOut,
    MultisigOut,
    DataOut,
    WitnessPublicKeyHashOut,
    WitnessScriptHashOut,
    PublicKeyHashIn,
    PublicKeyIn,
    ScriptHashIn,
    MultisigIn,
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script {
    chunks: Vec<ScriptChunk>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_chunks(chunks: Vec<ScriptChunk>) -> Self {
        Self { chunks }
    }

    pub fn chunks(&self) -> &[ScriptChunk] {
        &self.chunks
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// fromBuffer: decode chunks, failing on a push that runs past the end
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let mut chunks = Vec::new();
        while !reader.is_finished() {
            let start = reader.position();
            let opcode = reader.read_u8()?;
            let len = match opcode {
                1..=0x4b => Some(opcode as usize),
                OP_PUSHDATA1 => Some(reader.read_u8()? as usize),
                OP_PUSHDATA2 => Some(reader.read_u16_le()? as usize),
                OP_PUSHDATA4 => Some(reader.read_u32_le()? as usize),
                _ => None,
            };
            let data = match len {
                Some(len) => Some(
                    reader
                        .read_bytes(len)
                        .map_err(|_| {
                            TxError::decode(start, format!("push of {} bytes runs past end of script", len))
                        })?
                        .to_vec(),
                ),
                None => None,
            };
            chunks.push(ScriptChunk { opcode, data });
        }
        Ok(Self { chunks })
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        Self::from_bytes(&hex::decode(s)?)
    }

    /// toBuffer
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for chunk in &self.chunks {
            chunk.write(&mut out);
        }
        out
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub fn byte_len(&self) -> usize {
        self.to_bytes().len()
    }

    /// Hex if the string is a hex script, mnemonic form otherwise
    pub fn from_hex_or_mnemonic(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.len() % 2 == 0 && trimmed.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Self::from_hex(trimmed);
        }
        trimmed.parse()
    }

    pub fn add_opcode(&mut self, opcode: u8) -> &mut Self {
        self.chunks.push(ScriptChunk::op(opcode));
        self
    }

    pub fn add_data(&mut self, data: &[u8]) -> &mut Self {
        self.chunks.push(ScriptChunk::push(data));
        self
    }

    pub fn add_chunk(&mut self, chunk: ScriptChunk) -> &mut Self {
        self.chunks.push(chunk);
        self
    }

    /// Copy without any OP_CODESEPARATOR
    pub fn remove_codeseparators(&self) -> Script {
        Script::from_chunks(
            self.chunks
                .iter()
                .filter(|c| c.opcode != OP_CODESEPARATOR)
                .cloned()
                .collect(),
        )
    }

    /// Copy without any minimal push of `data`
    pub fn find_and_delete(&self, data: &[u8]) -> Script {
        let target = ScriptChunk::push(data);
        Script::from_chunks(self.chunks.iter().filter(|c| **c != target).cloned().collect())
    }

    // ----- builders -----

    /// OP_DUP OP_HASH160 <20> OP_EQUALVERIFY OP_CHECKSIG
    pub fn build_public_key_hash_out(hash: &[u8; 20]) -> Script {
        let mut s = Script::new();
        s.add_opcode(OP_DUP)
            .add_opcode(OP_HASH160)
            .add_data(hash)
            .add_opcode(OP_EQUALVERIFY)
            .add_opcode(OP_CHECKSIG);
        s
    }

    /// <pubkey> OP_CHECKSIG
    pub fn build_public_key_out(public_key: &PublicKey) -> Script {
        let mut s = Script::new();
        s.add_data(&public_key.to_bytes()).add_opcode(OP_CHECKSIG);
        s
    }

    /// OP_HASH160 <20> OP_EQUAL
    pub fn build_script_hash_out(hash: &[u8; 20]) -> Script {
        let mut s = Script::new();
        s.add_opcode(OP_HASH160).add_data(hash).add_opcode(OP_EQUAL);
        s
    }

    /// OP_M <pubkey>... OP_N OP_CHECKMULTISIG, keys sorted by encoding unless `sort` is false
    pub fn build_multisig_out(public_keys: &[PublicKey], threshold: usize, sort: bool) -> Result<Script> {
        if threshold > public_keys.len() {
            return Err(TxError::ThresholdExceedsKeys);
        }
        let m = for_small_int(threshold)
            .filter(|_| threshold > 0)
            .ok_or_else(|| TxError::InvalidArgument(format!("invalid threshold {}", threshold)))?;
        let n = for_small_int(public_keys.len()).ok_or_else(|| {
            TxError::InvalidArgument(format!("too many public keys: {}", public_keys.len()))
        })?;
        let mut keys = public_keys.to_vec();
        if sort {
            keys.sort();
        }
        let mut s = Script::new();
        s.add_opcode(m);
        for key in &keys {
            s.add_data(&key.to_bytes());
        }
        s.add_opcode(n).add_opcode(OP_CHECKMULTISIG);
        Ok(s)
    }

    /// OP_<version> <program>
    pub fn build_witness_v0_out(program: &[u8]) -> Script {
        let mut s = Script::new();
        s.add_opcode(OP_0).add_data(program);
        s
    }

    /// Witness script-hash program committing to `script`
    pub fn build_witness_multisig_out_from_script(script: &Script) -> Script {
        Self::build_witness_v0_out(&sha256(&script.to_bytes()))
    }

    /// OP_RETURN <data>
    pub fn build_data_out(data: &[u8]) -> Script {
        let mut s = Script::new();
        s.add_opcode(OP_RETURN);
        if !data.is_empty() {
            s.add_data(data);
        }
        s
    }

    /// <sig‖hashtype> <pubkey>
    pub fn build_public_key_hash_in(public_key: &PublicKey, signature: &[u8]) -> Script {
        let mut s = Script::new();
        s.add_data(signature).add_data(&public_key.to_bytes());
        s
    }

    /// <sig‖hashtype>
    pub fn build_public_key_in(signature: &[u8]) -> Script {
        let mut s = Script::new();
        s.add_data(signature);
        s
    }

    /// OP_0 <sig>... <redeem script>
    pub fn build_p2sh_multisig_in(signatures: &[Vec<u8>], redeem_script: &Script) -> Script {
        let mut s = Script::new();
        s.add_opcode(OP_0);
        for sig in signatures {
            s.add_data(sig);
        }
        s.add_data(&redeem_script.to_bytes());
        s
    }

    /// fromAddress: standard locking script paying `address`
    pub fn from_address(address: &Address) -> Script {
        match address {
            Address::PublicKeyHash { hash, .. } => Self::build_public_key_hash_out(hash),
            Address::ScriptHash { hash, .. } => Self::build_script_hash_out(hash),
        }
    }

    // ----- classifiers -----

    fn data_at(&self, i: usize) -> Option<&[u8]> {
        self.chunks.get(i).and_then(|c| c.data.as_deref())
    }

    pub fn is_public_key_hash_out(&self) -> bool {
        let c = &self.chunks;
        c.len() == 5
            && c[0].opcode == OP_DUP
            && c[1].opcode == OP_HASH160
            && self.data_at(2).map_or(false, |d| d.len() == 20)
            && c[3].opcode == OP_EQUALVERIFY
            && c[4].opcode == OP_CHECKSIG
    }

    pub fn is_public_key_hash_in(&self) -> bool {
        self.chunks.len() == 2
            && self.data_at(0).map_or(false, looks_like_signature)
            && self.data_at(1).map_or(false, looks_like_public_key)
    }

    pub fn is_public_key_out(&self) -> bool {
        self.chunks.len() == 2
            && self.data_at(0).map_or(false, looks_like_public_key)
            && self.chunks[1].opcode == OP_CHECKSIG
    }

    pub fn is_public_key_in(&self) -> bool {
        self.chunks.len() == 1 && self.data_at(0).map_or(false, looks_like_signature)
    }

    pub fn is_script_hash_out(&self) -> bool {
        let bytes = self.to_bytes();
        bytes.len() == 23 && bytes[0] == OP_HASH160 && bytes[1] == 0x14 && bytes[22] == OP_EQUAL
    }

    /// Push-only script whose last push is itself a standard script
    pub fn is_script_hash_in(&self) -> bool {
        if self.chunks.is_empty() || !self.is_push_only() {
            return false;
        }
        let redeem = match self.chunks.last().and_then(|c| c.data.as_deref()) {
            Some(d) => d,
            None => return false,
        };
        match Script::from_bytes(redeem) {
            Ok(s) => s.classify() != ScriptType::Unknown,
            Err(_) => false,
        }
    }

    pub fn is_multisig_out(&self) -> bool {
        let c = &self.chunks;
        if c.len() < 4 || c[c.len() - 1].opcode != OP_CHECKMULTISIG {
            return false;
        }
        let (m, n) = match (small_int(c[0].opcode), small_int(c[c.len() - 2].opcode)) {
            (Some(m), Some(n)) if m > 0 && n > 0 => (m, n),
            _ => return false,
        };
        let keys = &c[1..c.len() - 2];
        m <= n
            && keys.len() == n
            && keys
                .iter()
                .all(|k| k.data.as_deref().map_or(false, looks_like_public_key))
    }

    pub fn is_multisig_in(&self) -> bool {
        self.chunks.len() >= 2
            && self.chunks[0].opcode == OP_0
            && self.chunks[0].data.is_none()
            && self.chunks[1..]
                .iter()
                .all(|c| c.data.as_deref().map_or(false, looks_like_signature))
    }

    pub fn is_data_out(&self) -> bool {
        let c = &self.chunks;
        !c.is_empty()
            && c[0].opcode == OP_RETURN
            && (c.len() == 1
                || (c.len() == 2
                    && c[1].data.as_ref().map_or(false, |d| d.len() <= OP_RETURN_STANDARD_SIZE)))
    }

    /// Witness version and program if this is a witness program
    pub fn witness_program(&self) -> Option<(u8, Vec<u8>)> {
        let bytes = self.to_bytes();
        if bytes.len() < 4 || bytes.len() > 42 {
            return None;
        }
        let version = match bytes[0] {
            OP_0 => 0,
            op @ OP_1..=OP_16 => op - OP_1 + 1,
            _ => return None,
        };
        if bytes[1] as usize + 2 != bytes.len() {
            return None;
        }
        Some((version, bytes[2..].to_vec()))
    }

    pub fn is_witness_program(&self) -> bool {
        self.witness_program().is_some()
    }

    pub fn is_witness_script_hash_out(&self) -> bool {
        matches!(self.witness_program(), Some((0, ref p)) if p.len() == 32)
    }

    pub fn is_witness_public_key_hash_out(&self) -> bool {
        matches!(self.witness_program(), Some((0, ref p)) if p.len() == 20)
    }

    /// Only data pushes and small-integer opcodes
    pub fn is_push_only(&self) -> bool {
        self.chunks.iter().all(|c| c.opcode <= OP_16)
    }

    pub fn classify(&self) -> ScriptType {
        if self.is_public_key_hash_out() {
            ScriptType::PublicKeyHashOut
        } else if self.is_public_key_out() {
            ScriptType::PublicKeyOut
        } else if self.is_script_hash_out() {
            ScriptType::ScriptHashOut
        } else if self.is_multisig_out() {
            ScriptType::MultisigOut
        } else if self.is_data_out() {
            ScriptType::DataOut
        } else if self.is_witness_public_key_hash_out() {
            ScriptType::WitnessPublicKeyHashOut
        } else if self.is_witness_script_hash_out() {
            ScriptType::WitnessScriptHashOut
        } else if self.is_public_key_hash_in() {
            ScriptType::PublicKeyHashIn
        } else if self.is_public_key_in() {
            ScriptType::PublicKeyIn
        } else if self.is_multisig_in() {
            ScriptType::MultisigIn
        } else if self.is_script_hash_in() {
            ScriptType::ScriptHashIn
        } else {
            ScriptType::Unknown
        }
    }
}

fn looks_like_public_key(data: &[u8]) -> bool {
    match data.first() {
        Some(0x02) | Some(0x03) => data.len() == 33,
        Some(0x04) => data.len() == 65,
        _ => false,
    }
}

/// DER signature followed by a sighash byte
fn looks_like_signature(data: &[u8]) -> bool {
    data.len() >= 9 && data.len() <= 73 && data[0] == 0x30
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::with_capacity(self.chunks.len());
        for chunk in &self.chunks {
            match &chunk.data {
                Some(data) if chunk.opcode < OP_PUSHDATA1 => {
                    parts.push(format!("{} 0x{}", data.len(), hex::encode(data)))
                }
                Some(data) => parts.push(format!(
                    "{} {} 0x{}",
                    name(chunk.opcode).unwrap_or("OP_PUSHDATA"),
                    data.len(),
                    hex::encode(data)
                )),
                None => match name(chunk.opcode) {
                    Some(n) => parts.push(n.to_string()),
                    None => parts.push(format!("0x{:02x}", chunk.opcode)),
                },
            }
        }
        f.write_str(&parts.join(" "))
    }
}

/// Decimal push length, only when a `0x` data token follows it
fn push_length(tok: &str, next: Option<&str>) -> Option<usize> {
    if !next.map_or(false, |n| n.starts_with("0x")) {
        return None;
    }
    tok.parse().ok()
}

/// fromString: parse the mnemonic form produced by `Display`
///
/// Also accepts a bare hex token as a minimal push, which is how scripts are usually
/// written by hand (`OP_DUP OP_HASH160 <hash> OP_EQUALVERIFY OP_CHECKSIG`).
impl FromStr for Script {
    type Err = TxError;

    fn from_str(s: &str) -> Result<Self> {
        let tokens: Vec<&str> = s.split_whitespace().collect();
        let mut chunks = Vec::new();
        let mut i = 0;
        let bad = |tok: &str| TxError::InvalidScript(format!("invalid token {:?} in {:?}", tok, s));
        let hex_arg = |idx: usize| -> Result<Vec<u8>> {
            let tok = tokens.get(idx).ok_or_else(|| bad("<end>"))?;
            let body = tok.strip_prefix("0x").ok_or_else(|| bad(*tok))?;
            Ok(hex::decode(body)?)
        };
        while i < tokens.len() {
            let tok = tokens[i];
            if let Some(op) = from_name(tok) {
                if matches!(op, OP_PUSHDATA1 | OP_PUSHDATA2 | OP_PUSHDATA4) {
                    let len: usize = tokens
                        .get(i + 1)
                        .and_then(|t| t.parse().ok())
                        .ok_or_else(|| bad(tok))?;
                    let data = hex_arg(i + 2)?;
                    if data.len() != len {
                        return Err(bad(tokens[i + 1]));
                    }
                    chunks.push(ScriptChunk {
                        opcode: op,
                        data: Some(data),
                    });
                    i += 3;
                } else {
                    chunks.push(ScriptChunk::op(op));
                    i += 1;
                }
            } else if let Some(len) = push_length(tok, tokens.get(i + 1).copied()) {
                if len == 0 || len >= OP_PUSHDATA1 as usize {
                    return Err(bad(tok));
                }
                let data = hex_arg(i + 1)?;
                if data.len() != len {
                    return Err(bad(tok));
                }
                chunks.push(ScriptChunk {
                    opcode: len as u8,
                    data: Some(data),
                });
                i += 2;
            } else if let Some(body) = tok.strip_prefix("0x") {
                let bytes = hex::decode(body)?;
                if bytes.len() != 1 {
                    return Err(bad(tok));
                }
                chunks.push(ScriptChunk::op(bytes[0]));
                i += 1;
            } else if tok.bytes().all(|b| b.is_ascii_hexdigit()) {
                chunks.push(ScriptChunk::push(&hex::decode(tok)?));
                i += 1;
            } else {
                return Err(bad(tok));
            }
        }
        Ok(Script { chunks })
    }
}
