//! Error types for transaction construction, decoding and checked serialization

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TxError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Decoding failed at offset {offset}: {reason}")]
    Decode { offset: usize, reason: String },

    #[error("Invalid script: {0}")]
    InvalidScript(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Index out of range: {0}")]
    InvalidIndex(usize),

    #[error("Need more information: {0}")]
    NeedMoreInfo(String),

    #[error("Unsupported input script type: {0}")]
    UnsupportedScript(String),

    #[error("Number of required signatures must be greater than the number of public keys")]
    ThresholdExceedsKeys,

    #[error("Hash in object does not match transaction hash")]
    HashMismatch,

    #[error("Block height can be at most {max}: got {height}")]
    BlockHeightTooHigh { height: i64, max: u32 },

    #[error("Block height can't be negative: got {0}")]
    LockTimeOutOfRange(i64),

    #[error("Lock time can't be earlier than UNIX date 500 000 000: got {0}")]
    LockTimeTooEarly(u32),

    #[error("Invalid sorting: sorting function must return a permutation of the outputs")]
    InvalidSorting,

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Input {0} is already fully signed")]
    AlreadyFullySigned(usize),

    #[error("Unable to verify signature: {0}")]
    UnableToVerifySignature(String),

    #[error("No previous output information for input {0}")]
    MissingPreviousOutput(usize),

    #[error("Output {index} has invalid satoshis: {satoshis}")]
    InvalidSatoshis { index: usize, satoshis: u64 },

    #[error("Transaction over the maximum size: {0} bytes")]
    TransactionTooLarge(usize),

    #[error("Input {0} has a null previous output")]
    NullInput(usize),

    #[error("Output amount {outputs} exceeds input amount {inputs}")]
    InvalidOutputAmountSum { inputs: u64, outputs: u64 },

    #[error("Unspent value {unspent} is different from specified fee {fee}")]
    FeeDifferent { unspent: u64, fee: u64 },

    #[error("Fee is too large: expected less than {max} but got {unspent}")]
    FeeTooLarge { unspent: u64, max: u64 },

    #[error("Fee is too small: expected more than {min} but got {unspent}")]
    FeeTooSmall { unspent: u64, min: u64 },

    #[error("Fee is too large and no change address was provided")]
    ChangeAddressMissing,

    #[error("Dust amount detected in one output")]
    DustOutputs,

    #[error("Some inputs have not been fully signed")]
    MissingSignatures,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Hex error: {0}")]
    Hex(#[from] hex::FromHexError),
}

impl TxError {
    pub(crate) fn decode(offset: usize, reason: impl Into<String>) -> Self {
        TxError::Decode {
            offset,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TxError>;
