//! Block-download sessions.

use meridian_messages::ResponseCode;
use meridian_types::PeerId;
use std::time::Instant;

/// A bounded, peer-scoped block-download context.
///
/// Sessions live in the peer set's session table; all mutation goes through
/// the peer set so transitions are serialized under its lock.
#[derive(Debug, Clone)]
pub struct Session {
    session_id: u32,
    peer_id: PeerId,
    last_response_code: Option<ResponseCode>,
    last_activity_at: Instant,
}

impl Session {
    pub(crate) fn new(session_id: u32, peer_id: PeerId) -> Self {
        Self {
            session_id,
            peer_id,
            last_response_code: None,
            last_activity_at: Instant::now(),
        }
    }

    /// The session's unique id. Ids are a per-process monotone counter and
    /// are never reused.
    pub fn session_id(&self) -> u32 {
        self.session_id
    }

    /// The peer this session downloads from.
    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    /// The most recent response code, if any response arrived yet.
    pub fn last_response_code(&self) -> Option<ResponseCode> {
        self.last_response_code
    }

    /// When the session last saw activity.
    pub fn last_activity_at(&self) -> Instant {
        self.last_activity_at
    }

    pub(crate) fn set_last_response_code(&mut self, code: ResponseCode) {
        self.last_response_code = Some(code);
        self.last_activity_at = Instant::now();
    }
}
