use crate::transport::TransportError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("Store error: {0}")]
    Store(#[from] core_store::StoreError),

    #[error("Bridge error: {0}")]
    Bridge(#[from] bridge_traits::BridgeError),

    #[error("Remote endpoint rejected request: HTTP {status}: {message}")]
    RemoteRejected { status: u16, message: String },
}

pub type Result<T> = std::result::Result<T, SyncError>;
