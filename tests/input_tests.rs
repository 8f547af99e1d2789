//! Integration tests for input signing protocols

use flo_tx::sighash::SIGHASH_ALL;
use flo_tx::*;

const WIFS: [&str; 3] = [
    "cNSvQov1Qrh2sqGaCRWzs1ppPKKEDfKQbS95E7Y4Da7c4fuSx92R",
    "cSCT2jteFyKSJiSpCmEtCz88zkCmxvyjzF8wDkCDiBak2fhULoMo",
    "cTKLF5W5SLaGTTMs7bWQ73nR4Zs118W1HZA57CWzW16A7KPqoZTv",
];
const OUTSIDER: &str = "cSY2jbTDyPhmEx94TD72NwuHQ4J4pxzMEjj8G1Nc7c1eptCnevza";

fn private_keys() -> Vec<PrivateKey> {
    WIFS.iter().map(|w| PrivateKey::from_wif(w).unwrap()).collect()
}

fn public_keys() -> Vec<PublicKey> {
    private_keys().iter().map(PrivateKey::public_key).collect()
}

fn multisig_tx(nested: bool) -> anyhow::Result<Transaction> {
    let keys = public_keys();
    let address = Address::create_multisig(&keys, 2, Network::Testnet, nested)?;
    let utxo = UnspentOutput::new([0x5a; 32], 0, Script::from_address(&address), 1_000_000);
    let outsider = PrivateKey::from_wif(OUTSIDER)?;
    let mut tx = Transaction::new();
    tx.from_multisig(&utxo, &keys, 2, nested)?
        .to(&outsider.to_address(), 500_000)?
        .change(&address)
        .fee(10_000);
    Ok(tx)
}

fn multisig(tx: &Transaction) -> &MultiSigScriptHashInput {
    tx.inputs()[0].multisig().expect("multisig input")
}

#[test]
fn test_signature_counting() -> anyhow::Result<()> {
    let keys = private_keys();
    let mut tx = multisig_tx(false)?;
    assert_eq!(multisig(&tx).count_signatures(), 0);
    assert_eq!(multisig(&tx).count_missing_signatures(), 2);
    assert!(!tx.is_fully_signed()?);

    tx.sign(&keys[..1])?;
    assert_eq!(multisig(&tx).count_signatures(), 1);
    assert_eq!(multisig(&tx).count_missing_signatures(), 1);
    assert_eq!(multisig(&tx).public_keys_without_signature().len(), 2);
    assert!(!tx.is_fully_signed()?);

    tx.sign(&keys[1..2])?;
    assert_eq!(multisig(&tx).count_signatures(), 2);
    assert_eq!(multisig(&tx).count_missing_signatures(), 0);
    assert!(tx.is_fully_signed()?);
    assert_eq!(tx.verify(), ValidationResult::Valid);
    Ok(())
}

#[test]
fn test_signatures_placed_in_key_order() -> anyhow::Result<()> {
    let keys = private_keys();
    let mut tx = multisig_tx(false)?;
    let sorted = multisig(&tx).public_keys().to_vec();
    let last = keys.iter().find(|k| k.public_key() == sorted[2]).cloned();
    let first = keys.iter().find(|k| k.public_key() == sorted[0]).cloned();
    let (last, first) = (last.expect("key"), first.expect("key"));

    // Sign out of order
    tx.sign(&[last, first])?;

    let slots = multisig(&tx).signatures();
    assert!(slots[0].is_some() && slots[1].is_none() && slots[2].is_some());
    let chunks = tx.inputs()[0].script().chunks();
    assert_eq!(chunks.len(), 4);
    assert_eq!(chunks[0].opcode, opcode::OP_0);
    assert_eq!(chunks[1].data.as_deref(), slots[0].as_ref().map(|s| s.to_bytes()).as_deref());
    assert_eq!(chunks[2].data.as_deref(), slots[2].as_ref().map(|s| s.to_bytes()).as_deref());
    assert_eq!(tx.verify(), ValidationResult::Valid);
    Ok(())
}

#[test]
fn test_clear_signatures() -> anyhow::Result<()> {
    let mut tx = multisig_tx(true)?;
    tx.sign(&private_keys())?;
    assert!(tx.is_fully_signed()?);

    tx.input_mut(0)?.clear_signatures();
    assert!(!tx.is_fully_signed()?);
    assert_eq!(multisig(&tx).count_signatures(), 0);
    assert!(tx.inputs()[0].witnesses().is_empty());
    Ok(())
}

#[test]
fn test_outsider_key_yields_nothing() -> anyhow::Result<()> {
    let tx = multisig_tx(false)?;
    let outsider = PrivateKey::from_wif(OUTSIDER)?;
    assert!(tx.get_signatures(&outsider, SIGHASH_ALL)?.is_empty());
    assert!(tx.inputs()[0].get_signatures(&tx, &outsider, 0, SIGHASH_ALL)?.is_empty());
    Ok(())
}

#[test]
fn test_signature_without_matching_key() -> anyhow::Result<()> {
    let tx = multisig_tx(false)?;
    let outsider = PrivateKey::from_wif(OUTSIDER)?;
    let digest = tx.inputs()[0].sighash(&tx, 0, SIGHASH_ALL)?;
    let foreign = TransactionSignature {
        public_key: outsider.public_key(),
        prev_tx_id: tx.inputs()[0].prev_tx_id,
        output_index: 0,
        input_index: 0,
        signature: signature::sign_digest(&digest, &outsider)?,
        sigtype: SIGHASH_ALL,
    };
    let mut input = tx.inputs()[0].clone();
    assert!(matches!(input.add_signature(&foreign), Err(TxError::InvalidSignature(_))));
    Ok(())
}

#[test]
fn test_already_fully_signed() -> anyhow::Result<()> {
    let keys = private_keys();
    let mut tx = multisig_tx(false)?;
    tx.sign(&keys[..2])?;
    let extra = tx.inputs()[0].get_signatures(&tx, &keys[2], 0, SIGHASH_ALL)?;
    assert_eq!(extra.len(), 1);
    assert!(matches!(tx.apply_signature(&extra[0]), Err(TxError::AlreadyFullySigned(0))));

    // Signing again skips the completed input
    tx.sign(&keys)?;
    assert_eq!(multisig(&tx).count_signatures(), 2);
    Ok(())
}

#[test]
fn test_nested_witness_script_code() -> anyhow::Result<()> {
    let tx = multisig_tx(true)?;
    let input = &tx.inputs()[0];
    assert_eq!(
        input.script_code().map(hex::encode).as_deref(),
        Some("6952210235f6364aca36f01702b8dab94060acf431feaf94e24668c350c747c24ea57d1421025d5fdce77bdbff09d3139d5716bfb4d1a269cf642c34b2049f6c5558b59006e4210288b7a3ce0e26fd4e98c2befc2df440ea733d848491fd1f11a4b3b0722d7f29a853ae")
    );
    assert_eq!(input.estimate_size(), 257);

    let mut million = Input::from_multisig(
        &UnspentOutput::new(
            [0x5a; 32],
            0,
            Script::from_address(&Address::create_multisig(&public_keys(), 2, Network::Testnet, true)?),
            1_000_000,
        ),
        &public_keys(),
        2,
        true,
    )?;
    assert_eq!(million.satoshis_buffer().map(hex::encode).as_deref(), Some("40420f0000000000"));
    million.clear_signatures();
    assert_eq!(million.count_missing_signatures(), 2);
    Ok(())
}

#[test]
fn test_nested_witness_spend_verifies() -> anyhow::Result<()> {
    let mut tx = multisig_tx(true)?;
    tx.sign(&private_keys()[1..])?;
    let input = &tx.inputs()[0];
    // OP_0, two signatures, redeem script
    assert_eq!(input.witnesses().len(), 4);
    assert!(input.witnesses()[0].is_empty());
    assert_eq!(tx.verify(), ValidationResult::Valid);
    assert_ne!(tx.hash(), tx.witness_hash());
    Ok(())
}

#[test]
fn test_public_key_input() -> anyhow::Result<()> {
    let key = PrivateKey::from_wif(OUTSIDER)?;
    let utxo = UnspentOutput::new([0x33; 32], 2, Script::build_public_key_out(&key.public_key()), 80_000);
    let mut tx = Transaction::new();
    tx.from_utxo(&utxo).to(&key.to_address(), 70_000)?;
    assert_eq!(*tx.inputs()[0].kind(), InputKind::PublicKey);

    tx.sign(&private_keys())?;
    assert!(!tx.is_fully_signed()?);
    tx.sign(&[key])?;
    assert!(tx.is_fully_signed()?);
    assert_eq!(tx.inputs()[0].script().chunks().len(), 1);
    assert_eq!(tx.verify(), ValidationResult::Valid);
    Ok(())
}
