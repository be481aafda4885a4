//! HelloAck handler: finalizes the handshake.

use super::expect_message;
use crate::error::SyncError;
use crate::peerset::PeerStatus;
use crate::synchronizer::SyncCore;
use meridian_messages::{Bundle, BundleFlags, Message};
use meridian_types::PeerId;
use tracing::debug;

pub(crate) fn parse(core: &SyncCore, message: &Message, initiator: PeerId) -> Result<(), SyncError> {
    let msg = expect_message!(Message::HelloAck, message);

    debug!(peer = %initiator, height = msg.height, "hello acknowledged");
    core.peer_set().update_status(initiator, PeerStatus::Known);

    Ok(())
}

pub(crate) fn prepare(core: &SyncCore, message: Message) -> Option<Bundle> {
    let mut bundle = Bundle::new(core.self_id(), message);
    bundle.flags.set(BundleFlags::HANDSHAKING);
    Some(bundle)
}
