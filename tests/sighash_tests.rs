//! Integration tests for signature digests

use flo_tx::sighash::*;
use flo_tx::*;

const NESTED_KEY: &str = "cNuW8LX2oeQXfKKCGxajGvqwhCgBtacwTQqiCGHzzKfmpHGY4TE9";

fn nested_witness_tx() -> anyhow::Result<Transaction> {
    let key = PrivateKey::from_wif(NESTED_KEY)?;
    let address = Address::create_multisig(&[key.public_key()], 1, Network::Testnet, true)?;
    let utxo = UnspentOutput::from_hex_txid(
        "1d732950d99f821b8a8d11972ea56000b0666e4d31fa71861ffd80a83797dc61",
        1,
        Script::from_address(&address),
        100_000_000,
    )?;
    let mut tx = Transaction::new();
    tx.set_version(1);
    tx.from_multisig(&utxo, &[key.public_key()], 1, true)?
        .add_output(Output::new(
            50_000,
            Script::from_hex("76a914ef6aa14d8f5ba65a12c327a9659681c44cd821b088ac")?,
        ))?
        .fee(150_000)
        .change_script(Script::from_hex("76a9146d8da2015c6d2890896485edd5897b3b2ec9ebb188ac")?);
    Ok(tx)
}

#[test]
fn test_nested_witness_digest() -> anyhow::Result<()> {
    let tx = nested_witness_tx()?;
    let digest = tx.inputs()[0].sighash(&tx, 0, SIGHASH_ALL)?;
    assert_eq!(
        hex::encode(digest),
        "51b7c5271ae04071a6d3d4c4cde28003d8e9a09e51931ebae4003539767a4955"
    );
    Ok(())
}

#[test]
fn test_witness_and_legacy_digests_differ() -> anyhow::Result<()> {
    let tx = nested_witness_tx()?;
    let redeem = tx.inputs()[0]
        .multisig()
        .map(|m| m.redeem_script().clone())
        .ok_or_else(|| anyhow::anyhow!("multisig input expected"))?;
    let legacy = compute_sighash(&tx, 0, &redeem, SIGHASH_ALL, 100_000_000, false);
    let witness = compute_sighash(&tx, 0, &redeem, SIGHASH_ALL, 100_000_000, true);
    assert_ne!(legacy, witness);

    // Only the witness digest binds the spent amount
    assert_eq!(legacy, compute_sighash(&tx, 0, &redeem, SIGHASH_ALL, 1, false));
    assert_ne!(witness, compute_sighash(&tx, 0, &redeem, SIGHASH_ALL, 1, true));
    Ok(())
}

fn two_by_two() -> Transaction {
    let mut tx = Transaction::new();
    tx.unchecked_add_input(Input::new([0x01; 32], 0, Script::new()))
        .unchecked_add_input(Input::new([0x02; 32], 1, Script::new()))
        .unchecked_add_output(Output::new(1_000, Script::build_data_out(b"a")))
        .unchecked_add_output(Output::new(2_000, Script::build_data_out(b"b")));
    tx
}

#[test]
fn test_none_ignores_outputs() -> anyhow::Result<()> {
    let subscript: Script = "OP_1".parse()?;
    let tx = two_by_two();
    let mut changed = two_by_two();
    changed.output_mut(1)?.satoshis = 9_999;

    for witness in [false, true] {
        assert_eq!(
            compute_sighash(&tx, 0, &subscript, SIGHASH_NONE, 5, witness),
            compute_sighash(&changed, 0, &subscript, SIGHASH_NONE, 5, witness)
        );
        assert_ne!(
            compute_sighash(&tx, 0, &subscript, SIGHASH_ALL, 5, witness),
            compute_sighash(&changed, 0, &subscript, SIGHASH_ALL, 5, witness)
        );
    }
    Ok(())
}

#[test]
fn test_single_commits_to_matching_output_only() -> anyhow::Result<()> {
    let subscript: Script = "OP_1".parse()?;
    let tx = two_by_two();
    let mut changed = two_by_two();
    changed.output_mut(1)?.satoshis = 9_999;

    for witness in [false, true] {
        // input 0 signs output 0, which is untouched
        assert_eq!(
            compute_sighash(&tx, 0, &subscript, SIGHASH_SINGLE, 5, witness),
            compute_sighash(&changed, 0, &subscript, SIGHASH_SINGLE, 5, witness)
        );
        assert_ne!(
            compute_sighash(&tx, 1, &subscript, SIGHASH_SINGLE, 5, witness),
            compute_sighash(&changed, 1, &subscript, SIGHASH_SINGLE, 5, witness)
        );
    }
    Ok(())
}

#[test]
fn test_sequence_of_other_inputs() -> anyhow::Result<()> {
    let subscript: Script = "OP_1".parse()?;
    let tx = two_by_two();
    let mut changed = two_by_two();
    changed.input_mut(1)?.sequence_number = 7;

    assert_ne!(
        sighash_legacy(&tx, 0, &subscript, SIGHASH_ALL),
        sighash_legacy(&changed, 0, &subscript, SIGHASH_ALL)
    );
    assert_eq!(
        sighash_legacy(&tx, 0, &subscript, SIGHASH_NONE),
        sighash_legacy(&changed, 0, &subscript, SIGHASH_NONE)
    );
    assert_eq!(
        sighash_legacy(&tx, 0, &subscript, SIGHASH_ALL | SIGHASH_ANYONECANPAY),
        sighash_legacy(&changed, 0, &subscript, SIGHASH_ALL | SIGHASH_ANYONECANPAY)
    );
    Ok(())
}
