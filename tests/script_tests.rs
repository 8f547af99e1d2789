//! Integration tests for script parsing, templates and addresses

use flo_tx::script::ScriptType;
use flo_tx::*;

const P2PKH_HEX: &str = "76a914c9c2d2ed1d3a3a3e3bd0f8c5bbd4cc5ac2a8b8f188ac";
const MULTISIG_2_OF_3: &str = "52210235f6364aca36f01702b8dab94060acf431feaf94e24668c350c747c24ea57d1421025d5fdce77bdbff09d3139d5716bfb4d1a269cf642c34b2049f6c5558b59006e4210288b7a3ce0e26fd4e98c2befc2df440ea733d848491fd1f11a4b3b0722d7f29a853ae";

fn multisig_keys() -> Vec<PublicKey> {
    [
        "cTKLF5W5SLaGTTMs7bWQ73nR4Zs118W1HZA57CWzW16A7KPqoZTv",
        "cNSvQov1Qrh2sqGaCRWzs1ppPKKEDfKQbS95E7Y4Da7c4fuSx92R",
        "cSCT2jteFyKSJiSpCmEtCz88zkCmxvyjzF8wDkCDiBak2fhULoMo",
    ]
    .iter()
    .map(|wif| PrivateKey::from_wif(wif).unwrap().public_key())
    .collect()
}

#[test]
fn test_mnemonic_form() -> anyhow::Result<()> {
    let script = Script::from_hex(P2PKH_HEX)?;
    let text = script.to_string();
    assert_eq!(
        text,
        "OP_DUP OP_HASH160 20 0xc9c2d2ed1d3a3a3e3bd0f8c5bbd4cc5ac2a8b8f1 OP_EQUALVERIFY OP_CHECKSIG"
    );
    let parsed: Script = text.parse()?;
    assert_eq!(parsed, script);
    assert_eq!(parsed.classify(), ScriptType::PublicKeyHashOut);
    Ok(())
}

#[test]
fn test_non_minimal_push_preserved() -> anyhow::Result<()> {
    // OP_PUSHDATA1 carrying two bytes
    let script = Script::from_hex("4c02abcd")?;
    assert_eq!(script.to_hex(), "4c02abcd");
    assert_eq!(script.to_string(), "OP_PUSHDATA1 2 0xabcd");
    assert_eq!("OP_PUSHDATA1 2 0xabcd".parse::<Script>()?, script);
    Ok(())
}

#[test]
fn test_unknown_opcode_preserved() -> anyhow::Result<()> {
    let script = Script::from_hex("ba51")?;
    assert_eq!(script.to_hex(), "ba51");
    assert_eq!(script.to_string(), "0xba OP_1");
    Ok(())
}

#[test]
fn test_truncated_push_names_offset() {
    match Script::from_hex("514c05aabb") {
        Err(TxError::Decode { offset, .. }) => assert_eq!(offset, 1),
        other => panic!("expected decode error, got {:?}", other),
    }
}

#[test]
fn test_sorted_multisig_out() -> anyhow::Result<()> {
    let keys = multisig_keys();
    let script = Script::build_multisig_out(&keys, 2, true)?;
    assert_eq!(script.to_hex(), MULTISIG_2_OF_3);
    assert_eq!(script.classify(), ScriptType::MultisigOut);
    Ok(())
}

#[test]
fn test_multisig_addresses() -> anyhow::Result<()> {
    let keys = multisig_keys();
    let plain = Address::create_multisig(&keys, 2, Network::Testnet, false)?;
    assert_eq!(plain.to_string(), "QeJdou13jd18ghcr3F2ktDff1nvbjJnGrS");
    assert_eq!(
        Script::from_address(&plain).to_hex(),
        "a914c22a3f452d111f720831564f6ac47340e64b975287"
    );

    let nested = Address::create_multisig(&keys, 2, Network::Testnet, true)?;
    assert_eq!(nested.to_string(), "QYhs7SikRCYkzoXfTaAiVFkGrzmJnSwf54");
    assert!(nested.is_script_hash());
    Ok(())
}

#[test]
fn test_address_from_key_and_back() -> anyhow::Result<()> {
    let key = PrivateKey::from_wif("cSY2jbTDyPhmEx94TD72NwuHQ4J4pxzMEjj8G1Nc7c1eptCnevza")?;
    assert_eq!(
        key.public_key().to_hex(),
        "038cf340b469648f6ad7172eba59228e38a3fe5df80c106da19c4dbf1bcab938bb"
    );
    let address = key.to_address();
    assert_eq!(address.to_string(), "oPoBiZJxdHtNYVNhNTspRE8a4id6ytMKzY");

    let script = Script::from_address(&address);
    assert!(script.is_public_key_hash_out());
    assert_eq!(Address::from_script(&script, Network::Testnet), Some(address));
    Ok(())
}

#[test]
fn test_data_out() {
    let script = Script::build_data_out(b"hello flo");
    assert!(script.is_data_out());
    assert_eq!(script.classify(), ScriptType::DataOut);
    assert!(!Output::new(0, script).is_dust());
}

#[test]
fn test_witness_programs() {
    let key_hash = [0x57u8; 20];
    let p2wpkh = Script::build_witness_v0_out(&key_hash);
    assert_eq!(p2wpkh.witness_program(), Some((0, key_hash.to_vec())));
    assert_eq!(p2wpkh.classify(), ScriptType::WitnessPublicKeyHashOut);

    let redeem = Script::from_hex(MULTISIG_2_OF_3).unwrap();
    let p2wsh = Script::build_witness_multisig_out_from_script(&redeem);
    assert_eq!(p2wsh.classify(), ScriptType::WitnessScriptHashOut);
    assert_eq!(p2wsh.byte_len(), 34);
}

#[test]
fn test_remove_codeseparators() -> anyhow::Result<()> {
    let script: Script = "OP_1 OP_CODESEPARATOR OP_2 OP_CODESEPARATOR".parse()?;
    assert_eq!(script.remove_codeseparators().to_string(), "OP_1 OP_2");
    Ok(())
}
