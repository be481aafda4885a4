//! BlockAnnounce handler: track peer tips and decide whether to catch up.

use super::expect_message;
use crate::error::SyncError;
use crate::synchronizer::SyncCore;
use meridian_messages::Message;
use meridian_types::PeerId;
use std::sync::Arc;
use tracing::debug;

pub(crate) fn parse(core: &SyncCore, message: &Message, initiator: PeerId) -> Result<(), SyncError> {
    let msg = expect_message!(Message::BlockAnnounce, message);

    debug!(peer = %initiator, height = msg.height, "block announced");

    let block = Arc::new(msg.block.clone());
    core.peer_set()
        .update_height(initiator, msg.height, block.hash());
    core.cache().add_block(msg.height, block);
    core.cache()
        .add_certificate(msg.height, msg.certificate.clone());

    // Commit whatever became consecutive; when the announce is further
    // ahead, the catch-up decision opens a download session.
    core.try_commit_blocks()?;
    core.update_blockchain();

    Ok(())
}
