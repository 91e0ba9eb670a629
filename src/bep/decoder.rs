//! Incremental length-delimited frame decoder.
//!
//! The event file is a sequence of frames, each a varint32 length prefix
//! followed by that many bytes of serialized build event. The writer process
//! appends frames while this side reads, so the decoder must tolerate partial
//! frames: it never consumes bytes until a whole frame is available.

use serde::Serialize;

use super::events::BuildEvent;

/// Longest legal varint32 prefix.
const MAX_VARINT_LEN: usize = 5;

/// Errors that make further framing impossible.
#[derive(thiserror::Error, Debug)]
pub enum FrameError {
    /// The length prefix is not a valid varint32.
    #[error("invalid frame length prefix")]
    InvalidLength,
}

/// Outcome of one decode attempt.
#[derive(Debug)]
pub enum Decoded {
    /// A frame was consumed and its payload parsed.
    Event(Box<BuildEvent>),
    /// Not enough bytes for a whole frame; nothing was consumed.
    NeedMoreData,
    /// A frame was consumed but its payload did not parse; the stream
    /// resynchronizes at the next frame.
    Corrupt,
}

/// Incremental frame decoder over an append-only byte stream.
///
/// Callers feed newly-available bytes with [`extend`](Self::extend) and pull
/// decoded events with [`try_next`](Self::try_next).
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    consumed: u64,
}

impl FrameDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append newly-available bytes from the stream.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Total bytes consumed as complete frames so far.
    #[must_use]
    pub fn bytes_consumed(&self) -> u64 {
        self.consumed
    }

    /// Bytes buffered but not yet consumed (a trailing partial frame).
    #[must_use]
    pub fn pending_bytes(&self) -> usize {
        self.buf.len()
    }

    /// Attempt to decode the next frame.
    ///
    /// Returns [`Decoded::NeedMoreData`] without consuming anything if fewer
    /// bytes are buffered than the length prefix, or the declared payload
    /// length, requires. A payload that fails to parse is skipped in full so
    /// framing stays aligned.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::InvalidLength`] if the length prefix itself is
    /// malformed; framing cannot recover from that.
    pub fn try_next(&mut self) -> Result<Decoded, FrameError> {
        let Some((len, prefix_len)) = decode_varint32(&self.buf)? else {
            return Ok(Decoded::NeedMoreData);
        };
        let len = len as usize;
        let total = prefix_len + len;
        if self.buf.len() < total {
            return Ok(Decoded::NeedMoreData);
        }

        let decoded = match serde_json::from_slice::<BuildEvent>(&self.buf[prefix_len..total]) {
            Ok(event) => Decoded::Event(Box::new(event)),
            Err(error) => {
                tracing::debug!(len, %error, "Skipping corrupt build event frame");
                Decoded::Corrupt
            }
        };

        self.buf.drain(..total);
        self.consumed += total as u64;
        Ok(decoded)
    }
}

/// Decode an unsigned varint32 from the front of `buf`.
///
/// Returns `Ok(None)` if the prefix is incomplete, `Ok(Some((value, len)))`
/// once all prefix bytes are present.
fn decode_varint32(buf: &[u8]) -> Result<Option<(u32, usize)>, FrameError> {
    let mut value: u32 = 0;
    for (i, &byte) in buf.iter().take(MAX_VARINT_LEN).enumerate() {
        value |= u32::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            // the final byte of a 5-byte prefix may only carry 4 bits
            if i == MAX_VARINT_LEN - 1 && byte > 0x0f {
                return Err(FrameError::InvalidLength);
            }
            return Ok(Some((value, i + 1)));
        }
    }
    if buf.len() >= MAX_VARINT_LEN {
        return Err(FrameError::InvalidLength);
    }
    Ok(None)
}

/// Encode a varint32 length prefix.
fn encode_varint32(mut value: u32, out: &mut Vec<u8>) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Encode one frame: a varint32 length prefix followed by the payload bytes.
#[must_use]
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + MAX_VARINT_LEN);
    encode_varint32(u32::try_from(payload.len()).unwrap_or(u32::MAX), &mut out);
    out.extend_from_slice(payload);
    out
}

/// Encode a build event as one frame.
///
/// # Errors
///
/// Returns a serialization error if the event cannot be encoded as JSON.
pub fn encode_event<T: Serialize>(event: &T) -> Result<Vec<u8>, serde_json::Error> {
    Ok(encode_frame(&serde_json::to_vec(event)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bep::EventId;

    fn configured_event(label: &str) -> BuildEvent {
        BuildEvent {
            id: EventId::TargetConfigured {
                label: label.to_string(),
            },
            ..Default::default()
        }
    }

    fn event_label(decoded: &Decoded) -> String {
        match decoded {
            Decoded::Event(event) => match &event.id {
                EventId::TargetConfigured { label } => label.clone(),
                other => panic!("unexpected id: {other:?}"),
            },
            other => panic!("expected event, got {other:?}"),
        }
    }

    #[test]
    fn test_round_trip_one_byte_at_a_time() {
        let labels = ["//a:one", "//a:two", "//a:three", "//a:four"];
        let mut bytes = Vec::new();
        for label in labels {
            bytes.extend(encode_event(&configured_event(label)).unwrap());
        }

        // feed one byte per call, simulating a slow writer
        let mut decoder = FrameDecoder::new();
        let mut decoded = Vec::new();
        for byte in &bytes {
            decoder.extend(std::slice::from_ref(byte));
            loop {
                match decoder.try_next().unwrap() {
                    Decoded::NeedMoreData => break,
                    other => decoded.push(event_label(&other)),
                }
            }
        }

        assert_eq!(decoded, labels);
        assert_eq!(decoder.bytes_consumed(), bytes.len() as u64);
        assert_eq!(decoder.pending_bytes(), 0);
    }

    #[test]
    fn test_partial_frame_is_stable() {
        let frame = encode_event(&configured_event("//x:y")).unwrap();

        // truncated mid-payload: repeated attempts consume nothing
        let mut decoder = FrameDecoder::new();
        decoder.extend(&frame[..frame.len() - 3]);
        for _ in 0..5 {
            assert!(matches!(decoder.try_next().unwrap(), Decoded::NeedMoreData));
        }
        assert_eq!(decoder.bytes_consumed(), 0);

        decoder.extend(&frame[frame.len() - 3..]);
        assert!(matches!(decoder.try_next().unwrap(), Decoded::Event(_)));
        assert!(matches!(decoder.try_next().unwrap(), Decoded::NeedMoreData));
        assert_eq!(decoder.bytes_consumed(), frame.len() as u64);
    }

    #[test]
    fn test_truncated_length_prefix_is_stable() {
        // a 300-byte payload needs a two-byte length prefix
        let payload = serde_json::to_vec(&configured_event(&"x".repeat(300))).unwrap();
        let frame = encode_frame(&payload);

        let mut decoder = FrameDecoder::new();
        decoder.extend(&frame[..1]);
        assert!(matches!(decoder.try_next().unwrap(), Decoded::NeedMoreData));
        assert!(matches!(decoder.try_next().unwrap(), Decoded::NeedMoreData));

        decoder.extend(&frame[1..]);
        assert!(matches!(decoder.try_next().unwrap(), Decoded::Event(_)));
    }

    #[test]
    fn test_corrupt_frame_resynchronizes() {
        let first = encode_event(&configured_event("//x:first")).unwrap();
        let second = encode_event(&configured_event("//x:second")).unwrap();
        let third = encode_event(&configured_event("//x:third")).unwrap();

        // replace the second frame's payload with garbage of the same length
        let mut corrupted = second.clone();
        let prefix_len = second.len() - serde_json::to_vec(&configured_event("//x:second"))
            .unwrap()
            .len();
        for byte in &mut corrupted[prefix_len..] {
            *byte = 0xff;
        }

        let mut decoder = FrameDecoder::new();
        decoder.extend(&first);
        decoder.extend(&corrupted);
        decoder.extend(&third);

        assert_eq!(event_label(&decoder.try_next().unwrap()), "//x:first");
        assert!(matches!(decoder.try_next().unwrap(), Decoded::Corrupt));
        assert_eq!(event_label(&decoder.try_next().unwrap()), "//x:third");
        assert!(matches!(decoder.try_next().unwrap(), Decoded::NeedMoreData));
    }

    #[test]
    fn test_invalid_length_prefix_is_fatal() {
        let mut decoder = FrameDecoder::new();
        decoder.extend(&[0xff, 0xff, 0xff, 0xff, 0xff, 0x01]);
        assert!(matches!(decoder.try_next(), Err(FrameError::InvalidLength)));
    }

    #[test]
    fn test_empty_decoder_needs_data() {
        let mut decoder = FrameDecoder::new();
        assert!(matches!(decoder.try_next().unwrap(), Decoded::NeedMoreData));
        assert_eq!(decoder.bytes_consumed(), 0);
        assert_eq!(decoder.pending_bytes(), 0);
    }
}
