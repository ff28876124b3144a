//! The per-request/response lifecycle that a connection drives a message
//! through, independent of whether the wire protocol underneath is
//! HTTP/1.1 or HTTP/2.
use std::time::Duration;

use common::errors::*;

use crate::error::WebError;
use crate::request::Request;
use crate::response::Response;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    /// The request has been parsed but the handler hasn't started running.
    Created,
    /// The handler is executing and/or the response headers have not yet
    /// been fully flushed.
    Running,
    /// Headers are flushed; the response body is still being streamed out
    /// (or the request body is still being drained before reuse).
    DrainingBody,
    /// The exchange finished cleanly. The connection may be reused for a
    /// subsequent exchange if the protocol and `Connection` header permit.
    Complete,
    /// The exchange ended in error. Whether the connection itself is
    /// salvageable depends on `ErrorRecovery`.
    Failed,
}

/// What a connection should do after an exchange fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorRecovery {
    /// The error was caught before any response bytes went out: an error
    /// response can still be sent and the connection kept alive.
    RespondAndContinue,
    /// The error happened after headers were already written (or mid
    /// body-stream); the only safe option is to close the connection.
    CloseConnection,
}

/// Drives one request/response pair through its lifecycle. This doesn't
/// itself perform I/O; `v1`/`v2` drive bytes on/off the wire and call into
/// this to decide what state transition each event implies.
pub struct Exchange {
    state: ExchangeState,
    /// Per-request timeout. Per the HTTP/1.1 design note, a timeout firing
    /// is broadcast to every in-flight exchange sharing a connection
    /// rather than scoped to just the one that's overdue — this is
    /// intentional, not a bug to "fix" here.
    pub timeout: Option<Duration>,
}

impl Exchange {
    pub fn new(timeout: Option<Duration>) -> Self {
        Exchange {
            state: ExchangeState::Created,
            timeout,
        }
    }

    pub fn state(&self) -> ExchangeState {
        self.state
    }

    pub fn start_running(&mut self) -> Result<()> {
        self.transition(ExchangeState::Created, ExchangeState::Running)
    }

    /// Called once response headers have been handed to the wire writer.
    pub fn headers_flushed(&mut self) -> Result<()> {
        self.transition(ExchangeState::Running, ExchangeState::DrainingBody)
    }

    pub fn complete(&mut self) -> Result<()> {
        match self.state {
            ExchangeState::DrainingBody | ExchangeState::Running => {
                self.state = ExchangeState::Complete;
                Ok(())
            }
            other => Err(format_err!("Cannot complete an exchange in state {:?}", other)),
        }
    }

    /// Fails the exchange and reports whether the connection can still be
    /// reused. A body error that occurs before headers are written still
    /// allows an error response (e.g. a decode failure discovered while
    /// reading the request body can become a 400); one discovered after
    /// headers are already on the wire cannot, since the status line and
    /// any already-sent bytes can't be retracted.
    pub fn fail(&mut self, err: &WebError) -> ErrorRecovery {
        let recovery = match self.state {
            ExchangeState::Created | ExchangeState::Running => ErrorRecovery::RespondAndContinue,
            ExchangeState::DrainingBody | ExchangeState::Complete | ExchangeState::Failed => {
                ErrorRecovery::CloseConnection
            }
        };

        let _ = err;
        self.state = ExchangeState::Failed;
        recovery
    }

    fn transition(&mut self, from: ExchangeState, to: ExchangeState) -> Result<()> {
        if self.state != from {
            return Err(format_err!(
                "Invalid exchange transition: expected {:?}, was in {:?}",
                from,
                self.state
            ));
        }
        self.state = to;
        Ok(())
    }
}

/// Picks which body-consumption view applies to a request: whether its
/// body should be read as a single buffered value or streamed, based on
/// the method and a size threshold below which buffering is cheap enough
/// to always prefer.
pub fn prefers_streaming(request: &Request, buffered_threshold: usize) -> bool {
    match request.body.len() {
        Some(len) => len > buffered_threshold,
        None => true,
    }
}

/// Determines whether a completed response permits connection reuse, per
/// the `Connection: close` / protocol-version keep-alive defaults.
pub fn keep_alive(response: &Response, request_wants_close: bool) -> bool {
    if request_wants_close {
        return false;
    }
    if response.head.version.major == 1 && response.head.version.minor == 0 {
        return response.head.headers.find("Connection").any(|h| {
            h.value_str().eq_ignore_ascii_case("keep-alive")
        });
    }
    !response
        .head
        .headers
        .find("Connection")
        .any(|h| h.value_str().eq_ignore_ascii_case("close"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions_in_order() {
        let mut ex = Exchange::new(None);
        ex.start_running().unwrap();
        ex.headers_flushed().unwrap();
        ex.complete().unwrap();
        assert_eq!(ex.state(), ExchangeState::Complete);
    }

    #[test]
    fn failing_before_headers_allows_recovery() {
        let mut ex = Exchange::new(None);
        ex.start_running().unwrap();
        let recovery = ex.fail(&WebError::BadRequest("bad".into()));
        assert_eq!(recovery, ErrorRecovery::RespondAndContinue);
    }

    #[test]
    fn failing_after_headers_forces_close() {
        let mut ex = Exchange::new(None);
        ex.start_running().unwrap();
        ex.headers_flushed().unwrap();
        let recovery = ex.fail(&WebError::ConnectionClosed);
        assert_eq!(recovery, ErrorRecovery::CloseConnection);
    }

    #[test]
    fn out_of_order_transition_is_rejected() {
        let mut ex = Exchange::new(None);
        assert!(ex.headers_flushed().is_err());
    }
}
