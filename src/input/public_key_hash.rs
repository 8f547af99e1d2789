//! Pay-to-pubkey-hash, legacy (`<sig> <pubkey>`) and native witness v0 (`[sig, pubkey]`)

use crate::constants::PUBLIC_KEY_HASH_INPUT_SIZE;
use crate::keys::PublicKey;
use crate::script::Script;
use crate::signature::TransactionSignature;
use crate::types::{Hash160, Witness};

pub(super) const ESTIMATED_SIZE: usize = PUBLIC_KEY_HASH_INPUT_SIZE;

fn key_hash(locking_script: &Script) -> Option<Hash160> {
    let data = if locking_script.is_public_key_hash_out() {
        locking_script.chunks()[2].data.clone()?
    } else {
        locking_script.witness_program().filter(|(v, p)| *v == 0 && p.len() == 20)?.1
    };
    let mut hash = [0u8; 20];
    hash.copy_from_slice(&data);
    Some(hash)
}

pub(super) fn authorizes(locking_script: &Script, public_key: &PublicKey) -> bool {
    key_hash(locking_script) == Some(public_key.pubkey_hash())
}

/// Script signed over, and whether the witness digest applies
///
/// A witness key-hash program is signed over the equivalent P2PKH script.
pub(super) fn subscript(locking_script: &Script) -> (Script, bool) {
    if locking_script.is_witness_public_key_hash_out() {
        if let Some(hash) = key_hash(locking_script) {
            return (Script::build_public_key_hash_out(&hash), true);
        }
    }
    (locking_script.clone(), false)
}

pub(super) fn unlocking_data(locking_script: &Script, signature: &TransactionSignature) -> (Script, Witness) {
    if locking_script.is_witness_public_key_hash_out() {
        (
            Script::new(),
            vec![signature.to_bytes(), signature.public_key.to_bytes()],
        )
    } else {
        (
            Script::build_public_key_hash_in(&signature.public_key, &signature.to_bytes()),
            Vec::new(),
        )
    }
}
