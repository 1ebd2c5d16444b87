//! Domain layer containing core business types, traits, and error definitions.

pub mod error;
pub mod traits;
pub mod types;

pub use error::{ClientResult, ErrorCode, ErrorResult};
pub use traits::WalletBackend;
pub use types::{
    AUTH_CODE_LEN, AuthProof, BalanceSnapshot, Destination, IdempotencyKey, Quote, QuoteRequest,
    QuoteSide, QuoteStatus, TransferKind, TransferRequest, TransferStatus, WithdrawalSpec,
};
