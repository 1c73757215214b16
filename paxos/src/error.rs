/// Errors of the Paxos protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum PaxosError {
    /// A request that can never be valid, rejected without touching state.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// An acceptor did not answer in time.
    #[error("acceptor {0} unreachable")]
    Unreachable(String),

    /// Too few acceptors promised or accepted, retries exhausted.
    #[error("no quorum reached after {attempts} attempts")]
    QuorumNotReached {
        /// Rounds that were run.
        attempts: u32,
    },

    /// Something impossible under correct operation was observed.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// The write or read deadline passed.
    #[error("cancelled after {attempts} attempts")]
    Cancelled {
        /// Rounds started before the deadline.
        attempts: u32,
    },

    /// The proposer ran out of proposal numbers.
    #[error("proposal number space exhausted")]
    NumberSpaceExhausted,

    /// A proposer identity outside `1..=stride`.
    #[error("invalid proposer identity {identity} for identity space {stride}")]
    InvalidIdentity {
        /// The offending identity.
        identity: u64,
        /// Size of the identity space.
        stride: u64,
    },

    /// Rejected configuration.
    #[error("invalid config: {0}")]
    Config(String),

    /// Durable acceptor state could not be read or written.
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl PaxosError {
    /// Whether this is ordinary contention rather than a fault.
    pub fn is_contention(&self) -> bool {
        matches!(self, PaxosError::QuorumNotReached { .. })
    }
}

/// Result of protocol operations.
pub type Result<T> = std::result::Result<T, PaxosError>;
