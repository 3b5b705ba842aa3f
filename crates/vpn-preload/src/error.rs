use vpn_ipc::IpcError;

/// Fatal: the library cannot intercept anything safely
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("no C runtime image could be opened: {0}")]
    NoRuntimeImage(String),
    #[error("symbol {0} not found in C runtime")]
    MissingSymbol(&'static str),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TableError {
    #[error("virtual descriptor space exhausted")]
    Exhausted,
    #[error("virtual descriptor {0} out of range")]
    OutOfRange(i32),
    #[error("virtual descriptor {0} not owned by caller")]
    NotOwned(i32),
    #[error("invalid remote descriptor {0}")]
    InvalidRemote(i32),
}

/// The remote call could not be completed
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error(transparent)]
    Ipc(#[from] IpcError),
    #[error("client for {0} unusable after a failed call")]
    Poisoned(String),
}
