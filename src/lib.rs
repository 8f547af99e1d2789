//! # flo-tx
//!
//! Transaction model and script engine for the FLO network.
//!
//! This crate builds, signs, serializes and validates FLO transactions, and evaluates the
//! script language that locks and unlocks their outputs, including segregated witness v0.
//!
//! ## Architecture
//!
//! The crate is layered bottom-up:
//! - Primitives: hashing, wire encoding, keys and addresses
//! - Script: parsing, templates, and the stack-machine interpreter
//! - Signature digests: legacy and witness v0
//! - Inputs and outputs, with per-template signing protocols
//! - Transaction: construction, change and fee policy, signing, checked serialization
//!
//! ## Design Principles
//!
//! 1. **Deterministic**: signing uses RFC6979 nonces, so the same inputs give the same bytes
//! 2. **Exact Version Pinning**: consensus-critical cryptography is pinned to exact versions
//! 3. **Checked by Default**: [`Transaction::serialize`] refuses unsafe transactions unless
//!    told otherwise through [`SerializeOptions`]
//!
//! ## Usage
//!
//! ```rust
//! use flo_tx::{PrivateKey, Script, Transaction, UnspentOutput};
//!
//! # fn main() -> flo_tx::Result<()> {
//! let key = PrivateKey::from_wif("cSY2jbTDyPhmEx94TD72NwuHQ4J4pxzMEjj8G1Nc7c1eptCnevza")?;
//! let utxo = UnspentOutput::new([0x42; 32], 0, Script::from_address(&key.to_address()), 100_000);
//!
//! let mut tx = Transaction::new();
//! tx.from_utxo(&utxo)
//!     .to(&key.to_address(), 50_000)?
//!     .change(&key.to_address())
//!     .fee(10_000);
//! tx.sign(&[key])?;
//!
//! assert!(tx.is_fully_signed()?);
//! assert_eq!(tx.get_change_output().map(|o| o.satoshis), Some(40_000));
//! let _hex = tx.serialize()?;
//! # Ok(())
//! # }
//! ```

pub mod types;
pub mod constants;
pub mod error;
pub mod hash;
pub mod encoding;
pub mod network;
pub mod keys;
pub mod address;
pub mod opcode;
pub mod script;
pub mod script_num;
pub mod interpreter;
pub mod sighash;
pub mod signature;
pub mod output;
pub mod input;
pub mod unspent;
pub mod transaction;

// Re-export commonly used types
pub use types::*;
pub use address::Address;
pub use error::{Result, TxError};
pub use input::{Input, InputKind, MultiSigScriptHashInput};
pub use interpreter::{ScriptError, VerifyFlags};
pub use keys::{PrivateKey, PublicKey};
pub use network::Network;
pub use output::Output;
pub use script::Script;
pub use signature::TransactionSignature;
pub use transaction::{FeePolicy, SerializeOptions, Transaction};
pub use unspent::UnspentOutput;
