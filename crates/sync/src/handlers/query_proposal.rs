//! QueryProposal handler: serves our proposal to peers that ask.

use super::expect_message;
use crate::error::SyncError;
use crate::synchronizer::SyncCore;
use meridian_messages::{Message, ProposalMessage};
use meridian_types::PeerId;
use tracing::trace;

pub(crate) fn parse(core: &SyncCore, message: &Message, initiator: PeerId) -> Result<(), SyncError> {
    let msg = expect_message!(Message::QueryProposal, message);

    match core.consensus().proposal(msg.height, msg.round) {
        Some(proposal) => {
            trace!(peer = %initiator, height = msg.height, round = msg.round, "serving proposal");
            core.send_to(Message::Proposal(ProposalMessage { proposal }), initiator)
        }
        None => {
            // Nothing to share at that height/round.
            Ok(())
        }
    }
}
