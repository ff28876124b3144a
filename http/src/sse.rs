//! `text/event-stream` framing (WHATWG HTML Living Standard §9.2).
use bytes::Bytes;

/// One Server-Sent Event. `data` may contain embedded newlines; each line
/// is emitted on its own `data:` field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub id: Option<String>,
    pub event: Option<String>,
    pub data: String,
    pub retry: Option<u64>,
}

impl SseEvent {
    pub fn data(data: impl Into<String>) -> SseEvent {
        SseEvent {
            data: data.into(),
            ..Default::default()
        }
    }

    pub fn with_event(mut self, name: impl Into<String>) -> Self {
        self.event = Some(name.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_retry(mut self, retry: u64) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Serializes the event as one LF-terminated, blank-line-separated
    /// record, per the wire format's field ordering convention.
    pub fn encode(&self) -> Bytes {
        let mut out = String::new();
        if let Some(id) = &self.id {
            out.push_str("id: ");
            out.push_str(id);
            out.push('\n');
        }
        if let Some(event) = &self.event {
            out.push_str("event: ");
            out.push_str(event);
            out.push('\n');
        }
        if let Some(retry) = self.retry {
            out.push_str(&format!("retry: {}\n", retry));
        }
        for line in self.data.split('\n') {
            out.push_str("data: ");
            out.push_str(line);
            out.push('\n');
        }
        out.push('\n');
        Bytes::from(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_minimal_data_only_event() {
        let event = SseEvent::data("hello");
        assert_eq!(event.encode(), Bytes::from("data: hello\n\n"));
    }

    #[test]
    fn encodes_multiline_data_as_repeated_fields() {
        let event = SseEvent::data("a\nb");
        assert_eq!(event.encode(), Bytes::from("data: a\ndata: b\n\n"));
    }

    #[test]
    fn encodes_id_event_and_retry_before_data() {
        let event = SseEvent::data("x").with_id("42").with_event("tick").with_retry(5000);
        assert_eq!(
            event.encode(),
            Bytes::from("id: 42\nevent: tick\nretry: 5000\ndata: x\n\n")
        );
    }
}
