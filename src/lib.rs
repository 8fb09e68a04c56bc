pub mod config;
pub mod database;
pub mod error;
pub mod publisher;
pub mod rpc;
pub mod wallet;

pub use config::Config;
pub use database::{ClaimStore, MemoryClaimStore, SqliteClaimStore};
pub use error::WalletError;
pub use publisher::{get_content_type, CreatedStream, Publisher, StreamCreator};
pub use rpc::*;
pub use wallet::*;
