//! FLO protocol and policy constants

/// Maximum money supply: 160,000,000 FLO in satoshis
pub const MAX_MONEY: u64 = 160_000_000 * 100_000_000;

/// Satoshis per FLO
pub const SATOSHIS_PER_FLO: u64 = 100_000_000;

/// Maximum serialized transaction size accepted by checked serialization
pub const MAX_BLOCK_SIZE: usize = 1_000_000;

/// Outputs strictly below this amount are dust (data outputs excepted)
pub const DUST_AMOUNT: u64 = 546;

/// Default fee rate in satoshis per kilobyte
pub const FEE_PER_KB: u64 = 100_000;

/// Ratio between the estimated fee and the accepted fee bounds
pub const FEE_SECURITY_MARGIN: u64 = 150;

/// Size allowance for a pay-to-pubkey-hash change output
pub const CHANGE_OUTPUT_MAX_SIZE: usize = 20 + 4 + 34 + 4;

/// Fixed overhead: version, lock time and the two count varints
pub const MAXIMUM_EXTRA_SIZE: usize = 4 + 9 + 9 + 4;

/// Lock time values below this are block heights, at or above are timestamps
pub const NLOCKTIME_BLOCKHEIGHT_LIMIT: u32 = 500_000_000;

/// Final sequence number
pub const DEFAULT_SEQNUMBER: u32 = 0xffff_ffff;

/// Sequence number that keeps the lock time enforced
pub const DEFAULT_LOCKTIME_SEQNUMBER: u32 = 0xffff_fffe;

/// Sequence number that signals replace-by-fee
pub const DEFAULT_RBF_SEQNUMBER: u32 = 0xffff_fffd;

/// Transaction version written by new transactions
pub const DEFAULT_VERSION: i32 = 2;

/// Maximum script length
pub const MAX_SCRIPT_SIZE: usize = 10_000;

/// Maximum combined size of the main and alt stacks
pub const MAX_STACK_SIZE: usize = 1000;

/// Maximum number of non-push operations in a script
pub const MAX_SCRIPT_OPS: usize = 201;

/// Maximum size of a single stack element
pub const MAX_SCRIPT_ELEMENT_SIZE: usize = 520;

/// Maximum public keys in one CHECKMULTISIG
pub const MAX_PUBKEYS_PER_MULTISIG: usize = 20;

/// Sequence bit that disables relative lock time
pub const SEQUENCE_LOCKTIME_DISABLE_FLAG: u32 = 1 << 31;

/// Sequence bit selecting time-based relative lock time
pub const SEQUENCE_LOCKTIME_TYPE_FLAG: u32 = 1 << 22;

/// Mask for the relative lock time value
pub const SEQUENCE_LOCKTIME_MASK: u32 = 0x0000_ffff;

/// Estimated unlocking size of a pay-to-pubkey-hash input
pub const PUBLIC_KEY_HASH_INPUT_SIZE: usize = 107;

/// Estimated unlocking size of a pay-to-pubkey input
pub const PUBLIC_KEY_INPUT_SIZE: usize = 73;

/// Multisig unlocking estimate: fixed opcodes, per-signature and per-key allowances
pub const MULTISIG_OPCODES_SIZE: usize = 7;
pub const MULTISIG_SIGNATURE_SIZE: usize = 74;
pub const MULTISIG_PUBKEY_SIZE: usize = 34;

/// Coinbase scripts must be within this length range
pub const COINBASE_SCRIPT_MIN: usize = 2;
pub const COINBASE_SCRIPT_MAX: usize = 100;
