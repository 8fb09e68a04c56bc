use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::WalletError;

pub const SOURCE_TYPE_SD_HASH: &str = "lbry_sd_hash";
pub const SOURCE_VERSION: &str = "_0_0_1";

/// `stream.source` section of a claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSource {
    pub source: String,
    #[serde(rename = "sourceType")]
    pub source_type: String,
    #[serde(rename = "contentType")]
    pub content_type: String,
    pub version: String,
}

impl StreamSource {
    pub fn from_sd_hash(sd_hash: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            source: sd_hash.into(),
            source_type: SOURCE_TYPE_SD_HASH.to_string(),
            content_type: content_type.into(),
            version: SOURCE_VERSION.to_string(),
        }
    }
}

/// Claim metadata document sent to the ledger with a name claim.
///
/// Only the `stream.source` section is interpreted; everything else is carried as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimPayload(Map<String, Value>);

impl ClaimPayload {
    pub fn from_value(value: Value) -> Result<Self, WalletError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(WalletError::ValidationError(format!(
                "Claim payload must be an object, got {}",
                other
            ))),
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn stream_source(&self) -> Option<StreamSource> {
        self.0
            .get("stream")?
            .get("source")
            .and_then(|source| serde_json::from_value(source.clone()).ok())
    }

    /// Overwrite the source fields, creating `stream.source` if needed
    pub fn set_stream_source(&mut self, source: &StreamSource) -> Result<(), WalletError> {
        let stream = self
            .0
            .get_mut("stream")
            .and_then(Value::as_object_mut)
            .ok_or_else(|| {
                WalletError::ValidationError("Claim payload has no stream section".to_string())
            })?;

        let section = stream
            .entry("source")
            .or_insert_with(|| Value::Object(Map::new()));
        if !section.is_object() {
            *section = Value::Object(Map::new());
        }
        if let Value::Object(fields) = section {
            fields.insert("source".to_string(), Value::String(source.source.clone()));
            fields.insert("sourceType".to_string(), Value::String(source.source_type.clone()));
            fields.insert("contentType".to_string(), Value::String(source.content_type.clone()));
            fields.insert("version".to_string(), Value::String(source.version.clone()));
        }
        Ok(())
    }

    /// Hex of the serialized document, as the ledger daemon takes claim values
    pub fn to_hex(&self) -> Result<String, WalletError> {
        let bytes = serde_json::to_vec(&self.0)
            .map_err(|e| WalletError::ValidationError(format!("Unserializable claim payload: {}", e)))?;
        Ok(hex::encode(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn source_section_is_created_and_filled() {
        let mut payload = ClaimPayload::from_value(json!({
            "version": "_0_0_1",
            "claimType": "streamType",
            "stream": {"metadata": {"title": "test"}, "version": "_0_0_1"}
        }))
        .unwrap();

        let source = StreamSource::from_sd_hash("abc123", "video/mp4");
        payload.set_stream_source(&source).unwrap();

        assert_eq!(payload.stream_source(), Some(source));
        assert_eq!(payload.as_map()["stream"]["metadata"]["title"], "test");
        assert_eq!(payload.as_map()["stream"]["source"]["sourceType"], "lbry_sd_hash");
    }

    #[test]
    fn existing_source_fields_are_kept_unless_overwritten() {
        let mut payload = ClaimPayload::from_value(json!({
            "stream": {"source": {"source": "old", "extra": 1}}
        }))
        .unwrap();

        payload
            .set_stream_source(&StreamSource::from_sd_hash("new", "text/plain"))
            .unwrap();

        let section = &payload.as_map()["stream"]["source"];
        assert_eq!(section["source"], "new");
        assert_eq!(section["extra"], 1);
    }

    #[test]
    fn payload_without_stream_is_rejected() {
        let mut payload = ClaimPayload::from_value(json!({"claimType": "certificateType"})).unwrap();
        let err = payload
            .set_stream_source(&StreamSource::from_sd_hash("abc", "text/plain"))
            .unwrap_err();
        assert!(matches!(err, WalletError::ValidationError(_)));
        assert!(ClaimPayload::from_value(json!([1, 2])).is_err());
    }
}
