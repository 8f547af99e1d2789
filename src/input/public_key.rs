//! Pay-to-pubkey: `<pubkey> OP_CHECKSIG` redeemed by `<sig>`

use crate::constants::PUBLIC_KEY_INPUT_SIZE;
use crate::keys::PublicKey;
use crate::script::Script;
use crate::signature::TransactionSignature;

pub(super) const ESTIMATED_SIZE: usize = PUBLIC_KEY_INPUT_SIZE;

/// The key named by the locking script
pub(super) fn authorizes(locking_script: &Script, public_key: &PublicKey) -> bool {
    locking_script
        .chunks()
        .first()
        .and_then(|c| c.data.as_deref())
        .map_or(false, |data| data == public_key.to_bytes().as_slice())
}

pub(super) fn unlocking_script(signature: &TransactionSignature) -> Script {
    Script::build_public_key_in(&signature.to_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::PrivateKey;

    #[test]
    fn test_only_the_named_key_authorizes() {
        let a = PrivateKey::from_wif("cSY2jbTDyPhmEx94TD72NwuHQ4J4pxzMEjj8G1Nc7c1eptCnevza").unwrap();
        let b = PrivateKey::from_wif("cNuW8LX2oeQXfKKCGxajGvqwhCgBtacwTQqiCGHzzKfmpHGY4TE9").unwrap();
        let script = Script::build_public_key_out(&a.public_key());
        assert!(authorizes(&script, &a.public_key()));
        assert!(!authorizes(&script, &b.public_key()));
    }
}
