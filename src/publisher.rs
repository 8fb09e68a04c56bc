//! Publishing named content: file creation, claim, and claim persistence.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bitcoin::Amount;
use tokio::io::AsyncRead;

use crate::database::ClaimStore;
use crate::error::WalletError;
use crate::wallet::{ClaimOptions, ClaimOut, ClaimOutpoint, ClaimPayload, StreamSource, WalletInterface};

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Identifiers of a stream produced from a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedStream {
    /// Hash of the stream descriptor blob, used as the claim's content fingerprint
    pub sd_hash: String,
    pub stream_hash: String,
}

/// Turns a readable source into a stored, content-addressed stream
#[async_trait]
pub trait StreamCreator: Send + Sync {
    async fn create_stream(
        &self,
        file_name: &str,
        source: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<CreatedStream, WalletError>;
}

/// MIME type guessed from the file extension
pub fn get_content_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string()
}

pub struct Publisher {
    wallet: Arc<WalletInterface>,
    creator: Arc<dyn StreamCreator>,
    store: Arc<dyn ClaimStore>,
    certificate_id: Option<String>,
}

impl Publisher {
    pub fn new(
        wallet: Arc<WalletInterface>,
        creator: Arc<dyn StreamCreator>,
        store: Arc<dyn ClaimStore>,
        certificate_id: Option<String>,
    ) -> Self {
        Self {
            wallet,
            creator,
            store,
            certificate_id,
        }
    }

    /// Create a stream from `file_path` and claim `name` for it
    pub async fn create_and_publish_stream(
        &self,
        name: &str,
        bid: Amount,
        mut payload: ClaimPayload,
        file_path: &Path,
        claim_address: Option<String>,
        change_address: Option<String>,
    ) -> Result<ClaimOut, WalletError> {
        log::info!("Starting publish for {}", name);
        let metadata = match tokio::fs::metadata(file_path).await {
            Ok(metadata) if metadata.is_file() => metadata,
            _ => {
                return Err(WalletError::ValidationError(format!(
                    "File {} not found",
                    file_path.display()
                )))
            }
        };
        if metadata.len() == 0 {
            return Err(WalletError::ValidationError(format!(
                "Cannot publish empty file {}",
                file_path.display()
            )));
        }

        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| WalletError::ValidationError(format!("No file name in {}", file_path.display())))?;

        let mut file = tokio::fs::File::open(file_path).await?;
        let stream = self.creator.create_stream(&file_name, &mut file).await?;
        log::debug!("Created stream {} for {}", stream.stream_hash, file_name);

        let source = StreamSource::from_sd_hash(stream.sd_hash.clone(), get_content_type(file_path));
        payload.set_stream_source(&source)?;

        let claim = self
            .make_claim(name, bid, &payload, claim_address, change_address)
            .await?;
        self.store
            .save_content_claim(&stream.stream_hash, &claim.outpoint())
            .await?;
        Ok(claim)
    }

    /// Claim `name` for a stream that already exists
    pub async fn publish_stream(
        &self,
        name: &str,
        bid: Amount,
        payload: ClaimPayload,
        stream_hash: &str,
        claim_address: Option<String>,
        change_address: Option<String>,
    ) -> Result<ClaimOut, WalletError> {
        log::info!("Publishing existing stream {} as {}", stream_hash, name);
        let claim = self
            .make_claim(name, bid, &payload, claim_address, change_address)
            .await?;
        self.store
            .save_content_claim(stream_hash, &claim.outpoint())
            .await?;
        Ok(claim)
    }

    /// Outpoint of the claim last published for a stream
    pub async fn claim_info(&self, stream_hash: &str) -> Result<Option<ClaimOutpoint>, WalletError> {
        self.store.get_content_claim(stream_hash).await
    }

    async fn make_claim(
        &self,
        name: &str,
        bid: Amount,
        payload: &ClaimPayload,
        claim_address: Option<String>,
        change_address: Option<String>,
    ) -> Result<ClaimOut, WalletError> {
        let options = ClaimOptions {
            certificate_id: self.certificate_id.clone(),
            claim_address,
            change_address,
        };
        self.wallet.claim_name(name, bid, payload, &options).await
    }
}
