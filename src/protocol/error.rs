//! Error codes reported by the broker inside response bodies.
//!
//! # References
//! - <https://kafka.apache.org/protocol#protocol_error_codes>

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq, Clone, Copy)]
#[non_exhaustive]
pub enum Error {
    #[error("Unknown server error")]
    UnknownServerError,

    #[error("Offset out of range")]
    OffsetOutOfRange,

    #[error("Corrupt message")]
    CorruptMessage,

    #[error("Unknown topic or partition")]
    UnknownTopicOrPartition,

    #[error("Invalid fetch size")]
    InvalidFetchSize,

    #[error("Leader not available")]
    LeaderNotAvailable,

    #[error("Not leader or follower")]
    NotLeaderOrFollower,

    #[error("Request timed out")]
    RequestTimedOut,

    #[error("Broker not available")]
    BrokerNotAvailable,

    #[error("Replica not available")]
    ReplicaNotAvailable,

    #[error("Message too large")]
    MessageTooLarge,

    #[error("Stale controller epoch")]
    StaleControllerEpoch,

    #[error("Offset metadata too large")]
    OffsetMetadataTooLarge,

    #[error("Network exception")]
    NetworkException,

    #[error("Coordinator load in progress")]
    CoordinatorLoadInProgress,

    #[error("Coordinator not available")]
    CoordinatorNotAvailable,

    #[error("Not coordinator")]
    NotCoordinator,

    #[error("Invalid topic")]
    InvalidTopic,

    #[error("Record list too large")]
    RecordListTooLarge,

    #[error("Not enough replicas")]
    NotEnoughReplicas,

    #[error("Not enough replicas after append")]
    NotEnoughReplicasAfterAppend,

    #[error("Invalid required acks")]
    InvalidRequiredAcks,

    #[error("Illegal generation")]
    IllegalGeneration,

    #[error("Invalid group ID")]
    InvalidGroupId,

    #[error("Unknown member ID")]
    UnknownMemberId,

    #[error("Rebalance in progress")]
    RebalanceInProgress,

    #[error("Invalid commit offset size")]
    InvalidCommitOffsetSize,

    #[error("Topic authorization failed")]
    TopicAuthorizationFailed,

    #[error("Group authorization failed")]
    GroupAuthorizationFailed,

    #[error("Cluster authorization failed")]
    ClusterAuthorizationFailed,

    #[error("Invalid timestamp")]
    InvalidTimestamp,

    #[error("Unsupported version")]
    UnsupportedVersion,

    #[error("Unknown error code: {0}")]
    Unknown(i16),
}

impl Error {
    /// Map a wire error code to an error.
    ///
    /// Code `0` means "no error" and maps to `None`.
    pub fn new(code: i16) -> Option<Self> {
        match code {
            0 => None,
            -1 => Some(Self::UnknownServerError),
            1 => Some(Self::OffsetOutOfRange),
            2 => Some(Self::CorruptMessage),
            3 => Some(Self::UnknownTopicOrPartition),
            4 => Some(Self::InvalidFetchSize),
            5 => Some(Self::LeaderNotAvailable),
            6 => Some(Self::NotLeaderOrFollower),
            7 => Some(Self::RequestTimedOut),
            8 => Some(Self::BrokerNotAvailable),
            9 => Some(Self::ReplicaNotAvailable),
            10 => Some(Self::MessageTooLarge),
            11 => Some(Self::StaleControllerEpoch),
            12 => Some(Self::OffsetMetadataTooLarge),
            13 => Some(Self::NetworkException),
            14 => Some(Self::CoordinatorLoadInProgress),
            15 => Some(Self::CoordinatorNotAvailable),
            16 => Some(Self::NotCoordinator),
            17 => Some(Self::InvalidTopic),
            18 => Some(Self::RecordListTooLarge),
            19 => Some(Self::NotEnoughReplicas),
            20 => Some(Self::NotEnoughReplicasAfterAppend),
            21 => Some(Self::InvalidRequiredAcks),
            22 => Some(Self::IllegalGeneration),
            24 => Some(Self::InvalidGroupId),
            25 => Some(Self::UnknownMemberId),
            27 => Some(Self::RebalanceInProgress),
            28 => Some(Self::InvalidCommitOffsetSize),
            29 => Some(Self::TopicAuthorizationFailed),
            30 => Some(Self::GroupAuthorizationFailed),
            31 => Some(Self::ClusterAuthorizationFailed),
            32 => Some(Self::InvalidTimestamp),
            35 => Some(Self::UnsupportedVersion),
            _ => Some(Self::Unknown(code)),
        }
    }

    /// The wire code for this error.
    pub fn code(&self) -> i16 {
        match self {
            Self::UnknownServerError => -1,
            Self::OffsetOutOfRange => 1,
            Self::CorruptMessage => 2,
            Self::UnknownTopicOrPartition => 3,
            Self::InvalidFetchSize => 4,
            Self::LeaderNotAvailable => 5,
            Self::NotLeaderOrFollower => 6,
            Self::RequestTimedOut => 7,
            Self::BrokerNotAvailable => 8,
            Self::ReplicaNotAvailable => 9,
            Self::MessageTooLarge => 10,
            Self::StaleControllerEpoch => 11,
            Self::OffsetMetadataTooLarge => 12,
            Self::NetworkException => 13,
            Self::CoordinatorLoadInProgress => 14,
            Self::CoordinatorNotAvailable => 15,
            Self::NotCoordinator => 16,
            Self::InvalidTopic => 17,
            Self::RecordListTooLarge => 18,
            Self::NotEnoughReplicas => 19,
            Self::NotEnoughReplicasAfterAppend => 20,
            Self::InvalidRequiredAcks => 21,
            Self::IllegalGeneration => 22,
            Self::InvalidGroupId => 24,
            Self::UnknownMemberId => 25,
            Self::RebalanceInProgress => 27,
            Self::InvalidCommitOffsetSize => 28,
            Self::TopicAuthorizationFailed => 29,
            Self::GroupAuthorizationFailed => 30,
            Self::ClusterAuthorizationFailed => 31,
            Self::InvalidTimestamp => 32,
            Self::UnsupportedVersion => 35,
            Self::Unknown(code) => *code,
        }
    }
}
