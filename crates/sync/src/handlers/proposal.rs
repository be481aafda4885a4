//! Proposal handler: feeds received proposals to the consensus engine.

use super::expect_message;
use crate::error::SyncError;
use crate::synchronizer::SyncCore;
use meridian_messages::Message;
use meridian_types::PeerId;
use tracing::trace;

pub(crate) fn parse(core: &SyncCore, message: &Message, initiator: PeerId) -> Result<(), SyncError> {
    let msg = expect_message!(Message::Proposal, message);

    trace!(
        peer = %initiator,
        height = msg.proposal.height,
        round = msg.proposal.round,
        "received proposal"
    );

    let proposal = msg.proposal.clone();
    let (height, round) = core.consensus().height_round();
    if proposal.height == height && proposal.round == round {
        core.consensus().set_proposal(proposal);
    } else {
        // Not the active round; consensus keeps it for when it gets there.
        core.consensus().add_proposal(proposal);
    }

    Ok(())
}
