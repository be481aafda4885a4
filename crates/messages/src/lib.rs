//! Wire messages for the Meridian synchronizer.
//!
//! One [`Bundle`] frames one typed [`Message`]. The synchronizer's firewall
//! decodes bundles and its handler table dispatches on [`MessageType`].

mod bundle;
mod message;
mod payload;

pub use bundle::{Bundle, BundleError, BundleFlags};
pub use message::{Message, MessageType, ResponseCode};
pub use payload::{
    BlockAnnounceMessage, BlocksRequestMessage, BlocksResponseMessage, HelloAckMessage,
    HelloMessage, ProposalMessage, QueryProposalMessage, QueryVotesMessage, TransactionsMessage,
    VoteMessage,
};
