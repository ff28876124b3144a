//! HTTP/2 framing (RFC 7540 §4), scoped to cleartext (h2c) connections
//! detected by prior knowledge (no Upgrade-header negotiation path):
//! frame header encode/decode, the SETTINGS frame, and the connection
//! preface live here; `connection` builds the stream multiplexer on top
//! using `hpack` for header (de)compression.
pub mod connection;
pub mod hpack;
pub mod stream_state;

use common::errors::*;

pub type StreamId = u32;

/// `PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n` (RFC 7540 §3.5).
pub const CONNECTION_PREFACE: &[u8] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Data,
    Headers,
    Priority,
    RstStream,
    Settings,
    PushPromise,
    Ping,
    GoAway,
    WindowUpdate,
    Continuation,
    Unknown(u8),
}

impl FrameType {
    fn from_u8(v: u8) -> FrameType {
        match v {
            0x0 => FrameType::Data,
            0x1 => FrameType::Headers,
            0x2 => FrameType::Priority,
            0x3 => FrameType::RstStream,
            0x4 => FrameType::Settings,
            0x5 => FrameType::PushPromise,
            0x6 => FrameType::Ping,
            0x7 => FrameType::GoAway,
            0x8 => FrameType::WindowUpdate,
            0x9 => FrameType::Continuation,
            other => FrameType::Unknown(other),
        }
    }

    fn as_u8(&self) -> u8 {
        match self {
            FrameType::Data => 0x0,
            FrameType::Headers => 0x1,
            FrameType::Priority => 0x2,
            FrameType::RstStream => 0x3,
            FrameType::Settings => 0x4,
            FrameType::PushPromise => 0x5,
            FrameType::Ping => 0x6,
            FrameType::GoAway => 0x7,
            FrameType::WindowUpdate => 0x8,
            FrameType::Continuation => 0x9,
            FrameType::Unknown(v) => *v,
        }
    }
}

pub const FLAG_END_STREAM: u8 = 0x1;
pub const FLAG_END_HEADERS: u8 = 0x4;
pub const FLAG_ACK: u8 = 0x1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub typ: FrameType,
    pub flags: u8,
    pub stream_id: StreamId,
    pub payload: Vec<u8>,
}

const FRAME_HEADER_LEN: usize = 9;

impl Frame {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(FRAME_HEADER_LEN + self.payload.len());
        let len = self.payload.len() as u32;
        out.push((len >> 16) as u8);
        out.push((len >> 8) as u8);
        out.push(len as u8);
        out.push(self.typ.as_u8());
        out.push(self.flags);
        out.extend_from_slice(&(self.stream_id & 0x7fff_ffff).to_be_bytes());
        out.extend_from_slice(&self.payload);
        out
    }

    /// Parses exactly one frame from the front of `data`, returning the
    /// frame and the remaining unconsumed bytes. `None` if `data` doesn't
    /// yet hold a complete frame.
    pub fn decode(data: &[u8]) -> Result<Option<(Frame, &[u8])>> {
        if data.len() < FRAME_HEADER_LEN {
            return Ok(None);
        }
        let len = ((data[0] as usize) << 16) | ((data[1] as usize) << 8) | data[2] as usize;
        let typ = FrameType::from_u8(data[3]);
        let flags = data[4];
        let stream_id = u32::from_be_bytes([data[5], data[6], data[7], data[8]]) & 0x7fff_ffff;

        if data.len() < FRAME_HEADER_LEN + len {
            return Ok(None);
        }

        let payload = data[FRAME_HEADER_LEN..FRAME_HEADER_LEN + len].to_vec();
        Ok(Some((
            Frame {
                typ,
                flags,
                stream_id,
                payload,
            },
            &data[FRAME_HEADER_LEN + len..],
        )))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingId {
    HeaderTableSize,
    EnablePush,
    MaxConcurrentStreams,
    InitialWindowSize,
    MaxFrameSize,
    MaxHeaderListSize,
    Unknown(u16),
}

impl SettingId {
    fn from_u16(v: u16) -> SettingId {
        match v {
            0x1 => SettingId::HeaderTableSize,
            0x2 => SettingId::EnablePush,
            0x3 => SettingId::MaxConcurrentStreams,
            0x4 => SettingId::InitialWindowSize,
            0x5 => SettingId::MaxFrameSize,
            0x6 => SettingId::MaxHeaderListSize,
            other => SettingId::Unknown(other),
        }
    }

    fn as_u16(&self) -> u16 {
        match self {
            SettingId::HeaderTableSize => 0x1,
            SettingId::EnablePush => 0x2,
            SettingId::MaxConcurrentStreams => 0x3,
            SettingId::InitialWindowSize => 0x4,
            SettingId::MaxFrameSize => 0x5,
            SettingId::MaxHeaderListSize => 0x6,
            SettingId::Unknown(v) => *v,
        }
    }
}

/// The server's default `SETTINGS_MAX_CONCURRENT_STREAMS`, per this crate's
/// scope for the connection pool's HTTP/2 concurrency cap.
pub const DEFAULT_MAX_CONCURRENT_STREAMS: u32 = 100;

pub fn encode_settings(settings: &[(SettingId, u32)]) -> Frame {
    let mut payload = Vec::with_capacity(settings.len() * 6);
    for (id, value) in settings {
        payload.extend_from_slice(&id.as_u16().to_be_bytes());
        payload.extend_from_slice(&value.to_be_bytes());
    }
    Frame {
        typ: FrameType::Settings,
        flags: 0,
        stream_id: 0,
        payload,
    }
}

pub fn decode_settings(frame: &Frame) -> Result<Vec<(SettingId, u32)>> {
    if frame.typ != FrameType::Settings {
        return Err(err_msg("Not a SETTINGS frame"));
    }
    if frame.payload.len() % 6 != 0 {
        return Err(err_msg("Malformed SETTINGS frame payload length"));
    }
    let mut out = Vec::with_capacity(frame.payload.len() / 6);
    for chunk in frame.payload.chunks_exact(6) {
        let id = SettingId::from_u16(u16::from_be_bytes([chunk[0], chunk[1]]));
        let value = u32::from_be_bytes([chunk[2], chunk[3], chunk[4], chunk[5]]);
        out.push((id, value));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_headers_frame() {
        let frame = Frame {
            typ: FrameType::Headers,
            flags: FLAG_END_HEADERS | FLAG_END_STREAM,
            stream_id: 1,
            payload: vec![1, 2, 3],
        };
        let encoded = frame.encode();
        let (decoded, rest) = Frame::decode(&encoded).unwrap().unwrap();
        assert_eq!(decoded, frame);
        assert!(rest.is_empty());
    }

    #[test]
    fn decode_returns_none_on_incomplete_frame() {
        let frame = Frame {
            typ: FrameType::Data,
            flags: 0,
            stream_id: 3,
            payload: vec![0; 10],
        };
        let encoded = frame.encode();
        assert!(Frame::decode(&encoded[..encoded.len() - 1]).unwrap().is_none());
    }

    #[test]
    fn reserved_bit_is_masked_out_of_stream_id() {
        let mut encoded = Frame {
            typ: FrameType::Data,
            flags: 0,
            stream_id: 5,
            payload: vec![],
        }
        .encode();
        encoded[5] |= 0x80;
        let (decoded, _) = Frame::decode(&encoded).unwrap().unwrap();
        assert_eq!(decoded.stream_id, 5);
    }

    #[test]
    fn settings_round_trip() {
        let frame = encode_settings(&[(SettingId::MaxConcurrentStreams, 100), (SettingId::InitialWindowSize, 65535)]);
        let decoded = decode_settings(&frame).unwrap();
        assert_eq!(decoded, vec![(SettingId::MaxConcurrentStreams, 100), (SettingId::InitialWindowSize, 65535)]);
    }
}
