use crate::error::{ModelError, Result};
use crate::image::ImageReference;

/// The slice of a token record the gallery reads.
///
/// Owned by the token-data service; the gallery never mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "wire::TokenRecord", into = "wire::TokenRecord")
)]
pub struct TokenData {
    pub contract_address: String,
    pub token_id: String,
    pub image: ImageReference,
}

impl TokenData {
    pub fn new(
        contract_address: impl Into<String>,
        token_id: impl Into<String>,
        image: impl Into<ImageReference>,
    ) -> Result<Self> {
        let contract_address = contract_address.into();
        let token_id = token_id.into();
        if contract_address.trim().is_empty() {
            return Err(ModelError::InvalidToken(
                "contract address is empty".into(),
            ));
        }
        if token_id.trim().is_empty() {
            return Err(ModelError::InvalidToken("token id is empty".into()));
        }
        Ok(Self {
            contract_address,
            token_id,
            image: image.into(),
        })
    }

    /// Stable list key, unique per token across collections.
    pub fn key(&self) -> String {
        format!("{}-{}", self.contract_address, self.token_id)
    }

    /// Route of the token detail page.
    pub fn href(&self) -> String {
        format!("/{}/{}", self.contract_address, self.token_id)
    }
}

#[cfg(feature = "serde")]
mod wire {
    use serde::{Deserialize, Serialize};

    use super::TokenData;
    use crate::error::ModelError;
    use crate::image::ImageReference;

    /// Shape served by the aggregation API.
    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct TokenRecord {
        pub contract_address: String,
        pub token_id: TokenId,
        #[serde(default)]
        pub metadata: Metadata,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct Metadata {
        #[serde(default)]
        pub image: Option<String>,
    }

    /// Token ids arrive as strings or as plain JSON numbers.
    #[derive(Debug, Serialize, Deserialize)]
    #[serde(untagged)]
    pub enum TokenId {
        Text(String),
        Number(u64),
    }

    impl TryFrom<TokenRecord> for TokenData {
        type Error = ModelError;

        fn try_from(record: TokenRecord) -> Result<Self, Self::Error> {
            let token_id = match record.token_id {
                TokenId::Text(text) => text,
                TokenId::Number(number) => number.to_string(),
            };
            TokenData::new(
                record.contract_address,
                token_id,
                ImageReference::new(record.metadata.image.unwrap_or_default()),
            )
        }
    }

    impl From<TokenData> for TokenRecord {
        fn from(token: TokenData) -> Self {
            let image = (!token.image.is_empty())
                .then(|| token.image.as_str().to_string());
            TokenRecord {
                contract_address: token.contract_address,
                token_id: TokenId::Text(token.token_id),
                metadata: Metadata { image },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_and_href_follow_contract_then_id() {
        let token = TokenData::new("0xabc", "42", "ipfs://x").unwrap();
        assert_eq!(token.key(), "0xabc-42");
        assert_eq!(token.href(), "/0xabc/42");
    }

    #[test]
    fn blank_identifiers_are_rejected() {
        assert!(TokenData::new(" ", "1", "").is_err());
        assert!(TokenData::new("0xabc", "", "").is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn decodes_aggregation_api_record() {
        let json = r#"{
            "contractAddress": "0xdead",
            "tokenId": 7,
            "metadata": { "image": "ipfs://abc123/img.png", "name": "x" },
            "owner": "0xbeef"
        }"#;
        let token: TokenData = serde_json::from_str(json).unwrap();
        assert_eq!(token.token_id, "7");
        assert_eq!(token.image.as_str(), "ipfs://abc123/img.png");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn missing_metadata_means_no_image() {
        let json = r#"{ "contractAddress": "0xdead", "tokenId": "9" }"#;
        let token: TokenData = serde_json::from_str(json).unwrap();
        assert!(token.image.is_empty());
    }
}
