//! BlocksResponse handler: absorb downloaded blocks and pump commits.

use super::expect_message;
use crate::error::SyncError;
use crate::synchronizer::SyncCore;
use meridian_messages::{Message, ResponseCode};
use meridian_types::{Block, PeerId};
use std::sync::Arc;
use tracing::{debug, warn};

pub(crate) fn parse(core: &SyncCore, message: &Message, initiator: PeerId) -> Result<(), SyncError> {
    let msg = expect_message!(Message::BlocksResponse, message);

    // The session may have been closed by an earlier final response or swept
    // by the timeout; a response for it is stale and counts against the peer.
    if !core
        .peer_set()
        .update_session_last_response_code(msg.session_id, msg.code)
    {
        return Err(SyncError::SessionExpired(msg.session_id));
    }

    if msg.is_request_rejected() {
        warn!(
            peer = %initiator,
            session = msg.session_id,
            reason = %msg.reason,
            "blocks request rejected"
        );
        core.peer_set().close_session(msg.session_id);
        // The peer refused; look for another one right away.
        core.update_blockchain();
        return Ok(());
    }

    debug!(
        peer = %initiator,
        session = msg.session_id,
        from = msg.from,
        count = msg.count(),
        "blocks received"
    );

    for (i, data) in msg.blocks_data.iter().enumerate() {
        let block = Block::from_bytes(data)
            .map_err(|e| SyncError::InvalidMessage(format!("undecodable block: {e:?}")))?;
        core.cache()
            .add_block(msg.from.saturating_add(i as u32), Arc::new(block));
    }
    if let Some(cert) = &msg.last_certificate {
        core.cache().add_certificate(cert.height, cert.clone());
    }

    core.try_commit_blocks()?;

    if msg.code == ResponseCode::Synced {
        core.peer_set().close_session(msg.session_id);
    }

    Ok(())
}
