//! Transactions handler: feeds gossiped mempool entries to the state.

use super::expect_message;
use crate::error::SyncError;
use crate::synchronizer::SyncCore;
use meridian_messages::Message;
use meridian_types::PeerId;
use tracing::trace;

pub(crate) fn parse(core: &SyncCore, message: &Message, initiator: PeerId) -> Result<(), SyncError> {
    let msg = expect_message!(Message::Transactions, message);

    if msg.transactions.is_empty() {
        return Err(SyncError::InvalidMessage(
            "transactions message is empty".into(),
        ));
    }

    trace!(peer = %initiator, count = msg.transactions.len(), "received transactions");
    core.state().add_pending_transactions(msg.transactions.clone());

    Ok(())
}
