use async_trait::async_trait;

use crate::foundation::error::{CollageError, CollageResult};
use crate::nft::record::{NftRecord, ingest_owned_nfts};

/// Lists the tokens of the configured contract held by a wallet.
#[async_trait]
pub trait OwnershipSource: Send + Sync {
    async fn owned_nfts(&self, wallet: &str) -> CollageResult<Vec<NftRecord>>;
}

/// Alchemy NFT API `getNFTsForOwner` client.
#[derive(Clone, Debug)]
pub struct AlchemyClient {
    client: reqwest::Client,
    api_url: String,
    contract_address: String,
    collection_name: String,
}

impl AlchemyClient {
    pub fn new(
        client: reqwest::Client,
        api_url: impl Into<String>,
        contract_address: impl Into<String>,
        collection_name: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_url: api_url.into(),
            contract_address: contract_address.into(),
            collection_name: collection_name.into(),
        }
    }

    pub fn request_url(&self, wallet: &str) -> String {
        format!(
            "{}?owner={}&contractAddresses[]={}&withMetadata=true",
            self.api_url,
            urlencoding::encode(wallet),
            urlencoding::encode(&self.contract_address),
        )
    }
}

#[async_trait]
impl OwnershipSource for AlchemyClient {
    #[tracing::instrument(skip(self))]
    async fn owned_nfts(&self, wallet: &str) -> CollageResult<Vec<NftRecord>> {
        let url = self.request_url(wallet);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CollageError::source_fetch(format!("ownership lookup: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(CollageError::source_fetch(format!(
                "ownership lookup: HTTP {}",
                status.as_u16()
            )));
        }
        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| CollageError::decode(format!("ownership response body: {e}")))?;

        let nfts = ingest_owned_nfts(&body, &self.collection_name)?;
        tracing::info!(count = nfts.len(), "owned tokens fetched");
        Ok(nfts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_url_carries_owner_contract_and_metadata_flag() {
        let client = AlchemyClient::new(
            reqwest::Client::new(),
            "https://api.example/getNFTsForOwner",
            "0xabc",
            "NODES",
        );
        assert_eq!(
            client.request_url("0x0000000000000000000000000000000000000001"),
            "https://api.example/getNFTsForOwner?owner=0x0000000000000000000000000000000000000001&contractAddresses[]=0xabc&withMetadata=true"
        );
    }
}
