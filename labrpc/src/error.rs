use serde::{Deserialize, Serialize};

/// Errors observed by a caller of a remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum RpcError {
    /// The server could not decode the request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The handler failed.
    #[error("service error: {0}")]
    Service(String),

    /// The request or its reply was lost.
    #[error("server {0} unreachable")]
    Unreachable(String),

    /// No reply within the client's call timeout.
    #[error("call to {0} timed out")]
    Timeout(String),

    /// Returned by a handler that must not reply at all.
    ///
    /// The server sends nothing back, the caller sees the call as lost.
    #[error("reply dropped by handler")]
    Dropped,
}

impl RpcError {
    /// Whether the caller got no answer at all.
    pub fn is_no_response(&self) -> bool {
        matches!(
            self,
            RpcError::Unreachable(_) | RpcError::Timeout(_) | RpcError::Dropped
        )
    }
}

/// Envelope of every reply on the wire.
#[derive(Debug, Serialize, Deserialize)]
pub enum Reply<T> {
    Ok(T),
    Err(RpcError),
}

impl<T> Reply<T> {
    pub fn into_result(self) -> Result<T, RpcError> {
        match self {
            Reply::Ok(data) => Ok(data),
            Reply::Err(e) => Err(e),
        }
    }
}

/// Turn a handler error into the reply to send back, `None` for no reply.
pub fn reply_for_error<T>(e: anyhow::Error) -> Option<Reply<T>> {
    match e.downcast::<RpcError>() {
        Ok(RpcError::Dropped) => None,
        Ok(e) => Some(Reply::Err(e)),
        Err(e) => Some(Reply::Err(RpcError::Service(e.to_string()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_for_error() {
        assert!(reply_for_error::<u64>(RpcError::Dropped.into()).is_none());

        let reply = reply_for_error::<u64>(RpcError::InvalidRequest("bad".into()).into());
        assert_eq!(
            reply.unwrap().into_result(),
            Err(RpcError::InvalidRequest("bad".into()))
        );

        let reply = reply_for_error::<u64>(anyhow::anyhow!("disk full"));
        assert_eq!(
            reply.unwrap().into_result(),
            Err(RpcError::Service("disk full".into()))
        );
    }
}
