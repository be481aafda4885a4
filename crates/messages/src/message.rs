//! The message sum type and its wire identifiers.

use crate::payload::*;
use meridian_network::TopicId;
use std::fmt;

/// Wire identifier for each message type.
///
/// Values are part of the wire format; never reuse or renumber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum MessageType {
    Hello = 1,
    HelloAck = 2,
    Transactions = 3,
    QueryProposal = 4,
    Proposal = 5,
    QueryVotes = 6,
    Vote = 7,
    BlockAnnounce = 8,
    BlocksRequest = 9,
    BlocksResponse = 10,
}

impl MessageType {
    /// All message types, for building the handler table.
    pub const ALL: [MessageType; 10] = [
        MessageType::Hello,
        MessageType::HelloAck,
        MessageType::Transactions,
        MessageType::QueryProposal,
        MessageType::Proposal,
        MessageType::QueryVotes,
        MessageType::Vote,
        MessageType::BlockAnnounce,
        MessageType::BlocksRequest,
        MessageType::BlocksResponse,
    ];

    /// Parse a raw wire value.
    pub fn from_wire(value: u16) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| *t as u16 == value)
    }

    /// The pub-sub topic this message type travels on when broadcast.
    pub fn topic(&self) -> TopicId {
        match self {
            MessageType::QueryProposal
            | MessageType::Proposal
            | MessageType::QueryVotes
            | MessageType::Vote => TopicId::Consensus,
            _ => TopicId::General,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageType::Hello => "hello",
            MessageType::HelloAck => "hello-ack",
            MessageType::Transactions => "transactions",
            MessageType::QueryProposal => "query-proposal",
            MessageType::Proposal => "proposal",
            MessageType::QueryVotes => "query-votes",
            MessageType::Vote => "vote",
            MessageType::BlockAnnounce => "block-announce",
            MessageType::BlocksRequest => "blocks-request",
            MessageType::BlocksResponse => "blocks-response",
        };
        write!(f, "{name}")
    }
}

/// Result code carried in a [`BlocksResponseMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, sbor::prelude::BasicSbor)]
#[repr(u8)]
pub enum ResponseCode {
    /// More blocks follow in further responses.
    More = 0,
    /// Final response; the requester is caught up with us.
    Synced = 1,
    /// The request was refused.
    Rejected = 2,
}

/// One typed wire message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Hello(HelloMessage),
    HelloAck(HelloAckMessage),
    Transactions(TransactionsMessage),
    QueryProposal(QueryProposalMessage),
    Proposal(ProposalMessage),
    QueryVotes(QueryVotesMessage),
    Vote(VoteMessage),
    BlockAnnounce(BlockAnnounceMessage),
    BlocksRequest(BlocksRequestMessage),
    BlocksResponse(BlocksResponseMessage),
}

impl Message {
    /// The wire identifier of this message.
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Hello(_) => MessageType::Hello,
            Message::HelloAck(_) => MessageType::HelloAck,
            Message::Transactions(_) => MessageType::Transactions,
            Message::QueryProposal(_) => MessageType::QueryProposal,
            Message::Proposal(_) => MessageType::Proposal,
            Message::QueryVotes(_) => MessageType::QueryVotes,
            Message::Vote(_) => MessageType::Vote,
            Message::BlockAnnounce(_) => MessageType::BlockAnnounce,
            Message::BlocksRequest(_) => MessageType::BlocksRequest,
            Message::BlocksResponse(_) => MessageType::BlocksResponse,
        }
    }

    /// The pub-sub topic this message travels on when broadcast.
    pub fn topic(&self) -> TopicId {
        self.message_type().topic()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Hello(m) => write!(f, "hello {{ moniker: {} }}", m.moniker),
            Message::HelloAck(m) => write!(f, "hello-ack {{ height: {} }}", m.height),
            Message::Transactions(m) => {
                write!(f, "transactions {{ count: {} }}", m.transactions.len())
            }
            Message::QueryProposal(m) => {
                write!(f, "query-proposal {{ {}/{} }}", m.height, m.round)
            }
            Message::Proposal(m) => write!(
                f,
                "proposal {{ {}/{} }}",
                m.proposal.height, m.proposal.round
            ),
            Message::QueryVotes(m) => write!(f, "query-votes {{ {}/{} }}", m.height, m.round),
            Message::Vote(m) => write!(f, "vote {{ {}/{} }}", m.vote.height, m.vote.round),
            Message::BlockAnnounce(m) => write!(f, "block-announce {{ height: {} }}", m.height),
            Message::BlocksRequest(m) => write!(
                f,
                "blocks-request {{ session: {}, from: {} }}",
                m.session_id, m.from
            ),
            Message::BlocksResponse(m) => write!(
                f,
                "blocks-response {{ session: {}, code: {:?}, count: {} }}",
                m.session_id,
                m.code,
                m.count()
            ),
        }
    }
}
