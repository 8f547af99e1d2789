//! Signature hashing: the digests that transaction signatures commit to
//!
//! Two algorithms are provided. The legacy one hashes a redacted copy of the
//! transaction; the witness (BIP143) one hashes a fixed preimage that also commits to
//! the amount of the output being spent.

use crate::encoding::{write_var_bytes, write_varint};
use crate::hash::sha256d;
use crate::script::Script;
use crate::transaction::Transaction;
use crate::types::Hash;

pub const SIGHASH_ALL: u32 = 0x01;
pub const SIGHASH_NONE: u32 = 0x02;
pub const SIGHASH_SINGLE: u32 = 0x03;
pub const SIGHASH_ANYONECANPAY: u32 = 0x80;

/// Digest returned for SIGHASH_SINGLE without a matching output (and for an input index
/// out of range)
pub const SIGHASH_SINGLE_BUG: Hash = {
    let mut h = [0u8; 32];
    h[0] = 1;
    h
};

fn base_type(sighash_type: u32) -> u32 {
    sighash_type & 0x1f
}

/// computeSighash: dispatch on the signature version
pub fn compute_sighash(
    tx: &Transaction,
    input_index: usize,
    subscript: &Script,
    sighash_type: u32,
    satoshis: u64,
    is_witness: bool,
) -> Hash {
    if is_witness {
        sighash_witness_v0(tx, input_index, &subscript.to_bytes(), satoshis, sighash_type)
    } else {
        sighash_legacy(tx, input_index, subscript, sighash_type)
    }
}

/// Legacy digest: sha256d(redacted tx ‖ sighash type as u32 LE)
///
/// - the signed input carries `subscript` minus OP_CODESEPARATOR, other inputs an empty script
/// - NONE: no outputs, other inputs' sequences zeroed
/// - SINGLE: outputs up to `input_index`, earlier ones blanked to (-1, empty), sequences zeroed
/// - ANYONECANPAY: only the signed input is kept
pub fn sighash_legacy(tx: &Transaction, input_index: usize, subscript: &Script, sighash_type: u32) -> Hash {
    let inputs = tx.inputs();
    let outputs = tx.outputs();
    let base = base_type(sighash_type);
    if input_index >= inputs.len() {
        return SIGHASH_SINGLE_BUG;
    }
    if base == SIGHASH_SINGLE && input_index >= outputs.len() {
        return SIGHASH_SINGLE_BUG;
    }
    let script_code = subscript.remove_codeseparators().to_bytes();
    let anyone_can_pay = sighash_type & SIGHASH_ANYONECANPAY != 0;

    let mut buf = Vec::with_capacity(256);
    buf.extend_from_slice(&tx.version().to_le_bytes());

    let signed: Vec<usize> = if anyone_can_pay {
        vec![input_index]
    } else {
        (0..inputs.len()).collect()
    };
    write_varint(&mut buf, signed.len() as u64);
    for i in signed {
        let input = &inputs[i];
        input.write_outpoint(&mut buf);
        if i == input_index {
            write_var_bytes(&mut buf, &script_code);
        } else {
            write_var_bytes(&mut buf, &[]);
        }
        let sequence = if i != input_index && (base == SIGHASH_NONE || base == SIGHASH_SINGLE) {
            0
        } else {
            input.sequence_number
        };
        buf.extend_from_slice(&sequence.to_le_bytes());
    }

    match base {
        SIGHASH_NONE => write_varint(&mut buf, 0),
        SIGHASH_SINGLE => {
            write_varint(&mut buf, (input_index + 1) as u64);
            for _ in 0..input_index {
                buf.extend_from_slice(&u64::MAX.to_le_bytes());
                write_var_bytes(&mut buf, &[]);
            }
            outputs[input_index].write_to(&mut buf);
        }
        _ => {
            write_varint(&mut buf, outputs.len() as u64);
            for output in outputs {
                output.write_to(&mut buf);
            }
        }
    }

    buf.extend_from_slice(&tx.lock_time().to_le_bytes());
    buf.extend_from_slice(&sighash_type.to_le_bytes());
    sha256d(&buf)
}

/// BIP143 digest over
/// version ‖ hashPrevouts ‖ hashSequence ‖ outpoint ‖ scriptCode ‖ amount ‖ nSequence ‖
/// hashOutputs ‖ nLockTime ‖ sighash type
pub fn sighash_witness_v0(
    tx: &Transaction,
    input_index: usize,
    script_code: &[u8],
    satoshis: u64,
    sighash_type: u32,
) -> Hash {
    let inputs = tx.inputs();
    let outputs = tx.outputs();
    let base = base_type(sighash_type);
    let anyone_can_pay = sighash_type & SIGHASH_ANYONECANPAY != 0;
    let input = match inputs.get(input_index) {
        Some(input) => input,
        None => return SIGHASH_SINGLE_BUG,
    };

    let mut hash_prevouts = [0u8; 32];
    if !anyone_can_pay {
        let mut buf = Vec::with_capacity(36 * inputs.len());
        for i in inputs {
            i.write_outpoint(&mut buf);
        }
        hash_prevouts = sha256d(&buf);
    }

    let mut hash_sequence = [0u8; 32];
    if !anyone_can_pay && base != SIGHASH_SINGLE && base != SIGHASH_NONE {
        let mut buf = Vec::with_capacity(4 * inputs.len());
        for i in inputs {
            buf.extend_from_slice(&i.sequence_number.to_le_bytes());
        }
        hash_sequence = sha256d(&buf);
    }

    let mut hash_outputs = [0u8; 32];
    if base != SIGHASH_SINGLE && base != SIGHASH_NONE {
        let mut buf = Vec::new();
        for o in outputs {
            o.write_to(&mut buf);
        }
        hash_outputs = sha256d(&buf);
    } else if base == SIGHASH_SINGLE && input_index < outputs.len() {
        let mut buf = Vec::new();
        outputs[input_index].write_to(&mut buf);
        hash_outputs = sha256d(&buf);
    }

    let mut buf = Vec::with_capacity(160 + script_code.len());
    buf.extend_from_slice(&tx.version().to_le_bytes());
    buf.extend_from_slice(&hash_prevouts);
    buf.extend_from_slice(&hash_sequence);
    input.write_outpoint(&mut buf);
    write_var_bytes(&mut buf, script_code);
    buf.extend_from_slice(&satoshis.to_le_bytes());
    buf.extend_from_slice(&input.sequence_number.to_le_bytes());
    buf.extend_from_slice(&hash_outputs);
    buf.extend_from_slice(&tx.lock_time().to_le_bytes());
    buf.extend_from_slice(&sighash_type.to_le_bytes());
    sha256d(&buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::Output;
    use crate::input::Input;

    fn two_in_one_out() -> Transaction {
        let mut tx = Transaction::new();
        for i in 0..2u8 {
            tx.unchecked_add_input(Input::new([i + 1; 32], 0, Script::new()));
        }
        tx.unchecked_add_output(Output::new(1000, Script::build_data_out(b"x")));
        tx
    }

    #[test]
    fn test_single_without_output_is_one() {
        let tx = two_in_one_out();
        let h = sighash_legacy(&tx, 1, &Script::new(), SIGHASH_SINGLE);
        assert_eq!(h, SIGHASH_SINGLE_BUG);
        assert_ne!(sighash_legacy(&tx, 0, &Script::new(), SIGHASH_SINGLE), SIGHASH_SINGLE_BUG);
    }

    #[test]
    fn test_out_of_range_input_is_one() {
        let tx = two_in_one_out();
        assert_eq!(sighash_legacy(&tx, 5, &Script::new(), SIGHASH_ALL), SIGHASH_SINGLE_BUG);
    }

    #[test]
    fn test_codeseparator_ignored_in_legacy_subscript() {
        let tx = two_in_one_out();
        let mut with_sep = Script::new();
        with_sep.add_opcode(crate::opcode::OP_CODESEPARATOR).add_opcode(crate::opcode::OP_1);
        let mut without = Script::new();
        without.add_opcode(crate::opcode::OP_1);
        assert_eq!(
            sighash_legacy(&tx, 0, &with_sep, SIGHASH_ALL),
            sighash_legacy(&tx, 0, &without, SIGHASH_ALL)
        );
    }

    #[test]
    fn test_anyonecanpay_ignores_other_inputs() {
        let a = two_in_one_out();
        let mut b = two_in_one_out();
        b.input_mut(1).unwrap().output_index = 7;
        let t = SIGHASH_ALL | SIGHASH_ANYONECANPAY;
        assert_eq!(sighash_legacy(&a, 0, &Script::new(), t), sighash_legacy(&b, 0, &Script::new(), t));
        assert_ne!(
            sighash_legacy(&a, 0, &Script::new(), SIGHASH_ALL),
            sighash_legacy(&b, 0, &Script::new(), SIGHASH_ALL)
        );
    }

    #[test]
    fn test_witness_digest_commits_to_amount() {
        let tx = two_in_one_out();
        let code = Script::build_public_key_hash_out(&[9u8; 20]);
        let legacy = compute_sighash(&tx, 0, &code, SIGHASH_ALL, 5000, false);
        let w1 = compute_sighash(&tx, 0, &code, SIGHASH_ALL, 5000, true);
        let w2 = compute_sighash(&tx, 0, &code, SIGHASH_ALL, 5001, true);
        assert_ne!(legacy, w1);
        assert_ne!(w1, w2);
    }
}
