use thiserror::Error;

/// Reasons an inbound event is rejected before it reaches the core.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Malformed event: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Empty identifier in field '{0}'")]
    EmptyIdentifier(&'static str),

    #[error("Missing payload in field '{0}'")]
    MissingPayload(&'static str),

    #[error("Connection has not joined")]
    NotJoined,

    #[error("Sender mismatch: connection joined as {joined}, event claims {claimed}")]
    SenderMismatch { joined: String, claimed: String },
}
