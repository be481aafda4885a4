//! Hello handler: the inbound half of the handshake.

use super::expect_message;
use crate::error::SyncError;
use crate::peerset::PeerStatus;
use crate::synchronizer::SyncCore;
use meridian_messages::{Bundle, BundleFlags, HelloAckMessage, Message};
use meridian_types::PeerId;
use tracing::{debug, warn};

pub(crate) fn parse(core: &SyncCore, message: &Message, initiator: PeerId) -> Result<(), SyncError> {
    let msg = expect_message!(Message::Hello, message);

    if !msg.verify_signature() {
        warn!(peer = %initiator, "hello signature verification failed, banning peer");
        core.peer_set().update_status(initiator, PeerStatus::Banned);
        return Err(SyncError::InvalidSignature);
    }

    let our_genesis = core.state().genesis().hash;
    if msg.genesis_hash != our_genesis {
        warn!(
            peer = %initiator,
            genesis = %msg.genesis_hash,
            "peer is on a different chain, banning peer"
        );
        core.peer_set().update_status(initiator, PeerStatus::Banned);
        return Err(SyncError::InvalidGenesisHash(msg.genesis_hash));
    }

    debug!(peer = %initiator, moniker = %msg.moniker, "hello received");

    core.peer_set().update_info(
        initiator,
        &msg.moniker,
        &msg.agent,
        msg.public_keys.clone(),
        msg.services,
    );
    core.peer_set()
        .update_height(initiator, msg.height, msg.block_hash);
    core.peer_set().update_status(initiator, PeerStatus::Known);

    core.send_to(
        Message::HelloAck(HelloAckMessage {
            height: core.state().last_block_height(),
        }),
        initiator,
    )
}

pub(crate) fn prepare(core: &SyncCore, message: Message) -> Option<Bundle> {
    let mut bundle = Bundle::new(core.self_id(), message);
    bundle.flags.set(BundleFlags::HANDSHAKING);
    Some(bundle)
}
