use std::time::Duration;

use courier_store::StoreError;
use thiserror::Error;

/// Why a single relay attempt failed. None of these are fatal to the
/// connection that caused them.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Invalid identifier: {0} is empty")]
    InvalidIdentifier(&'static str),

    #[error("Persistence failed: {0}")]
    Store(#[from] StoreError),

    #[error("Persistence timed out after {0:?}")]
    Timeout(Duration),
}

impl RelayError {
    /// Message safe to hand back to the sending client.
    pub fn client_message(&self) -> String {
        match self {
            RelayError::InvalidIdentifier(_) => self.to_string(),
            RelayError::Store(StoreError::Invalid(reason)) => reason.clone(),
            RelayError::Store(_) => "Message could not be saved".to_string(),
            RelayError::Timeout(_) => {
                "Message may not have been saved; check history before resending".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_messages() {
        let invalid = RelayError::Store(StoreError::Invalid("message text is empty".into()));
        assert_eq!(invalid.client_message(), "message text is empty");

        let busy = RelayError::Store(StoreError::Unavailable("store busy".into()));
        assert_eq!(busy.client_message(), "Message could not be saved");

        // A timeout cannot promise the write never happened.
        let timeout = RelayError::Timeout(Duration::from_millis(50));
        assert!(timeout.client_message().contains("may not have been saved"));
    }
}
