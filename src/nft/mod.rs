//! Owned-token lookup, record ingestion, and the user's ordered selection.

pub mod api;
pub mod record;
pub mod selection;

pub use api::{AlchemyClient, OwnershipSource};
pub use record::{NftRecord, detect_animated, ingest_owned_nfts};
pub use selection::{Selection, validate_wallet};
