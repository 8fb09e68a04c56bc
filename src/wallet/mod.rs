mod backend;
mod config;
mod interface;
mod payload;
mod reservation;
mod types;

pub use backend::{LedgerBackend, RpcLedgerBackend};
pub use config::{DatabaseConfig, WalletConfig};
pub use interface::WalletInterface;
pub use payload::{ClaimPayload, StreamSource, SOURCE_TYPE_SD_HASH, SOURCE_VERSION};
pub use reservation::ReservationLedger;
pub use types::{
    AbandonOut, ClaimOptions, ClaimOut, ClaimOutpoint, PaymentOut, RemoteOutcome, Reservation,
    SupportOut,
};
