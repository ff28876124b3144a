//! Per-stream lifecycle (RFC 7540 §5.1), collapsed to the transitions this
//! crate's multiplexer actually drives: every stream here is opened by a
//! single HEADERS frame, so there's no PRIORITY-only idle state and no
//! PUSH_PROMISE-reserved state. The variant set mirrors an enum sketched
//! (but left commented out and unused) in the teacher's `v2/endpoint.rs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// HEADERS sent and received; both sides may still send DATA.
    Open,
    /// This endpoint sent END_STREAM; still reading the peer's data.
    HalfClosedLocal,
    /// The peer sent END_STREAM; still writing our own data.
    HalfClosedRemote,
    /// Both sides sent END_STREAM, or the stream was reset.
    Closed,
}

impl StreamState {
    /// Transitions after this endpoint sends a frame with END_STREAM set.
    pub fn on_send_end_stream(self) -> StreamState {
        match self {
            StreamState::Open => StreamState::HalfClosedLocal,
            StreamState::HalfClosedRemote => StreamState::Closed,
            other => other,
        }
    }

    /// Transitions after the peer sends a frame with END_STREAM set.
    pub fn on_recv_end_stream(self) -> StreamState {
        match self {
            StreamState::Open => StreamState::HalfClosedRemote,
            StreamState::HalfClosedLocal => StreamState::Closed,
            other => other,
        }
    }

    pub fn is_closed(self) -> bool {
        matches!(self, StreamState::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_sides_ending_closes_the_stream() {
        let s = StreamState::Open.on_send_end_stream();
        assert_eq!(s, StreamState::HalfClosedLocal);
        assert_eq!(s.on_recv_end_stream(), StreamState::Closed);
    }

    #[test]
    fn order_of_half_close_does_not_matter() {
        let a = StreamState::Open.on_send_end_stream().on_recv_end_stream();
        let b = StreamState::Open.on_recv_end_stream().on_send_end_stream();
        assert_eq!(a, StreamState::Closed);
        assert_eq!(b, StreamState::Closed);
    }

    #[test]
    fn closed_state_is_terminal() {
        assert!(StreamState::Open
            .on_send_end_stream()
            .on_recv_end_stream()
            .is_closed());
    }
}
