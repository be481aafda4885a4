//! Per-message-type handlers.
//!
//! Each message type registers a pair of plain function pointers: `parse`
//! consumes an inbound message, `prepare` wraps an outbound one (returning
//! `None` to suppress sending). Handlers receive the synchronizer core as a
//! borrowed capability, so there is no ownership cycle and the table is
//! read-only after construction.

mod block_announce;
mod blocks_request;
mod blocks_response;
mod hello;
mod hello_ack;
mod proposal;
mod query_proposal;
mod query_votes;
mod transactions;
mod vote;

use crate::error::SyncError;
use crate::synchronizer::SyncCore;
use meridian_messages::{Bundle, Message, MessageType};
use meridian_types::PeerId;
use std::collections::HashMap;

/// Consume an inbound message from `initiator`.
pub(crate) type ParseFn = fn(&SyncCore, &Message, PeerId) -> Result<(), SyncError>;

/// Wrap an outbound message into a bundle, or suppress it.
pub(crate) type PrepareFn = fn(&SyncCore, Message) -> Option<Bundle>;

/// One handler table entry.
pub(crate) struct HandlerEntry {
    pub parse: ParseFn,
    pub prepare: PrepareFn,
}

/// Build the complete dispatch table. Populated once at construction.
pub(crate) fn build_handler_table() -> HashMap<MessageType, HandlerEntry> {
    let mut table: HashMap<MessageType, HandlerEntry> = HashMap::new();

    table.insert(
        MessageType::Hello,
        HandlerEntry {
            parse: hello::parse,
            prepare: hello::prepare,
        },
    );
    table.insert(
        MessageType::HelloAck,
        HandlerEntry {
            parse: hello_ack::parse,
            prepare: hello_ack::prepare,
        },
    );
    table.insert(
        MessageType::Transactions,
        HandlerEntry {
            parse: transactions::parse,
            prepare: default_prepare,
        },
    );
    table.insert(
        MessageType::QueryProposal,
        HandlerEntry {
            parse: query_proposal::parse,
            prepare: default_prepare,
        },
    );
    table.insert(
        MessageType::Proposal,
        HandlerEntry {
            parse: proposal::parse,
            prepare: default_prepare,
        },
    );
    table.insert(
        MessageType::QueryVotes,
        HandlerEntry {
            parse: query_votes::parse,
            prepare: default_prepare,
        },
    );
    table.insert(
        MessageType::Vote,
        HandlerEntry {
            parse: vote::parse,
            prepare: default_prepare,
        },
    );
    table.insert(
        MessageType::BlockAnnounce,
        HandlerEntry {
            parse: block_announce::parse,
            prepare: default_prepare,
        },
    );
    table.insert(
        MessageType::BlocksRequest,
        HandlerEntry {
            parse: blocks_request::parse,
            prepare: default_prepare,
        },
    );
    table.insert(
        MessageType::BlocksResponse,
        HandlerEntry {
            parse: blocks_response::parse,
            prepare: default_prepare,
        },
    );

    table
}

/// Wrap a message with no type-specific flags.
pub(crate) fn default_prepare(core: &SyncCore, message: Message) -> Option<Bundle> {
    Some(Bundle::new(core.self_id(), message))
}

/// Shorthand for the wrong-variant guard at the top of every `parse`.
macro_rules! expect_message {
    ($variant:path, $message:expr) => {
        match $message {
            $variant(msg) => msg,
            other => {
                return Err(crate::error::SyncError::InvalidMessage(format!(
                    "handler received unexpected message: {}",
                    other
                )))
            }
        }
    };
}

pub(crate) use expect_message;
