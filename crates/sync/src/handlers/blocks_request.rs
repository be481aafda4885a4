//! BlocksRequest handler: serve committed blocks to a catching-up peer.

use super::expect_message;
use crate::error::SyncError;
use crate::synchronizer::SyncCore;
use meridian_messages::{BlocksResponseMessage, Message, ResponseCode};
use meridian_types::PeerId;
use tracing::debug;

pub(crate) fn parse(core: &SyncCore, message: &Message, initiator: PeerId) -> Result<(), SyncError> {
    let msg = expect_message!(Message::BlocksRequest, message);

    debug!(
        peer = %initiator,
        session = msg.session_id,
        from = msg.from,
        count = msg.count,
        "blocks requested"
    );

    if !core.config().node_network {
        return reject(core, initiator, msg.session_id, msg.from, "not a network node");
    }

    if msg.from == 0 || msg.count == 0 {
        return reject(core, initiator, msg.session_id, msg.from, "invalid range");
    }

    if msg.count > core.config().block_per_message {
        return reject(
            core,
            initiator,
            msg.session_id,
            msg.from,
            "requested count exceeds the per-message limit",
        );
    }

    let Some(blocks_data) = core.prepare_blocks(msg.from, msg.count) else {
        return reject(
            core,
            initiator,
            msg.session_id,
            msg.from,
            "blocks are not available at the requested height",
        );
    };

    let served = blocks_data.len() as u32;
    core.send_to(
        Message::BlocksResponse(BlocksResponseMessage {
            code: ResponseCode::More,
            reason: String::new(),
            session_id: msg.session_id,
            from: msg.from,
            blocks_data,
            last_certificate: None,
        }),
        initiator,
    )?;

    // The requester reached our tip; finish the session with our tip
    // certificate so it can commit the last block.
    let our_height = core.state().last_block_height();
    if msg.from.saturating_add(served) > our_height {
        core.send_to(
            Message::BlocksResponse(BlocksResponseMessage {
                code: ResponseCode::Synced,
                reason: String::new(),
                session_id: msg.session_id,
                from: our_height,
                blocks_data: vec![],
                last_certificate: core.state().last_certificate(),
            }),
            initiator,
        )?;
    }

    Ok(())
}

fn reject(
    core: &SyncCore,
    to: PeerId,
    session_id: u32,
    from: meridian_types::Height,
    reason: &str,
) -> Result<(), SyncError> {
    debug!(peer = %to, session = session_id, reason, "rejecting blocks request");
    core.send_to(
        Message::BlocksResponse(BlocksResponseMessage {
            code: ResponseCode::Rejected,
            reason: reason.to_string(),
            session_id,
            from,
            blocks_data: vec![],
            last_certificate: None,
        }),
        to,
    )
}
