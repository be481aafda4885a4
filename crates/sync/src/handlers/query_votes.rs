//! QueryVotes handler: serves one of our votes to peers that ask.

use super::expect_message;
use crate::error::SyncError;
use crate::synchronizer::SyncCore;
use meridian_messages::{Message, VoteMessage};
use meridian_types::PeerId;
use tracing::trace;

pub(crate) fn parse(core: &SyncCore, message: &Message, initiator: PeerId) -> Result<(), SyncError> {
    let msg = expect_message!(Message::QueryVotes, message);

    let votes = core.consensus().round_votes(msg.height, msg.round);
    // One vote is enough for the peer to make progress; it can query again.
    if let Some(vote) = votes.into_iter().next() {
        trace!(peer = %initiator, height = msg.height, round = msg.round, "serving vote");
        return core.send_to(Message::Vote(VoteMessage { vote }), initiator);
    }

    Ok(())
}
