//! Vote handler: feeds received votes to the consensus engine.

use super::expect_message;
use crate::error::SyncError;
use crate::synchronizer::SyncCore;
use meridian_messages::Message;
use meridian_types::PeerId;
use tracing::trace;

pub(crate) fn parse(core: &SyncCore, message: &Message, initiator: PeerId) -> Result<(), SyncError> {
    let msg = expect_message!(Message::Vote, message);

    trace!(peer = %initiator, height = msg.vote.height, round = msg.vote.round, "received vote");
    core.consensus().add_vote(msg.vote.clone());

    Ok(())
}
