use std::sync::Arc;

use bytes::{Buf, Bytes, BytesMut};
use sbpwire_prims::Crc16;
use sbpwire_schema::{payload, DescriptorSource, MessageDescriptor, Record};
use tracing::{debug, trace, warn};

use crate::codec::{Frame, FrameConfig, CRC_SIZE, HEADER_SIZE, MAX_PAYLOAD, PREAMBLE};
use crate::error::FrameError;

const INITIAL_BUFFER_CAPACITY: usize = 1024;

/// A frame whose payload decoded against its registered descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMessage {
    pub msg_type: u16,
    pub sender: u16,
    pub descriptor: Arc<MessageDescriptor>,
    pub record: Record,
}

impl DecodedMessage {
    /// Descriptor name of the message.
    pub fn name(&self) -> &str {
        self.descriptor.name()
    }
}

/// One result of scanning the byte stream.
#[derive(Debug)]
pub enum Outcome {
    /// An intact frame with a registered, successfully decoded payload.
    Message(DecodedMessage),
    /// An intact frame with no registered descriptor. The raw payload is kept
    /// so it can be forwarded or logged.
    Unrecognized(Frame),
    /// An intact frame surfaced raw because payload decoding is disabled.
    Frame(Frame),
    /// A frame that was dropped. Scanning has already resumed.
    Rejected(FrameError),
}

impl Outcome {
    /// The decoded message, if this outcome is one.
    pub fn into_message(self) -> Option<DecodedMessage> {
        match self {
            Self::Message(message) => Some(message),
            _ => None,
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}

/// Running counters for a decoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    /// Frames that passed the CRC check, filtered ones included.
    pub frames: u64,
    pub crc_errors: u64,
    /// Declared lengths above the configured maximum.
    pub oversized: u64,
    /// Intact frames dropped by the sender filter.
    pub filtered: u64,
    /// Bytes skipped while hunting for a preamble.
    pub discarded_bytes: u64,
}

#[derive(Debug, Clone, Copy)]
enum State {
    SeekPreamble,
    ReadHeader,
    ReadPayload {
        msg_type: u16,
        sender: u16,
        len: usize,
        crc: Crc16,
    },
    ReadCrc {
        msg_type: u16,
        sender: u16,
        len: usize,
        crc: Crc16,
    },
}

/// Incremental decoder for a raw byte stream.
///
/// Bytes may arrive in chunks of any size, split anywhere. The buffer always
/// starts at the preamble of the frame being assembled, so a rejected frame
/// can be rescanned from the byte right after its preamble.
///
/// Intact frames are dispatched through `S` to decode their payloads.
pub struct FrameDecoder<S> {
    source: S,
    config: FrameConfig,
    buf: BytesMut,
    state: State,
    stats: DecoderStats,
}

impl<S: DescriptorSource> FrameDecoder<S> {
    /// Create a decoder with default configuration.
    pub fn new(source: S) -> Self {
        Self::with_config(source, FrameConfig::default())
    }

    /// Create a decoder with explicit configuration.
    ///
    /// `max_payload_size` is clamped to what the length field can carry.
    pub fn with_config(source: S, mut config: FrameConfig) -> Self {
        config.max_payload_size = config.max_payload_size.min(MAX_PAYLOAD);
        Self {
            source,
            config,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            state: State::SeekPreamble,
            stats: DecoderStats::default(),
        }
    }

    /// Append bytes and return every outcome they complete.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Outcome> {
        self.extend(bytes);
        let mut outcomes = Vec::new();
        while let Some(outcome) = self.next_outcome() {
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Append bytes without decoding them yet.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Produce the next outcome from buffered bytes.
    ///
    /// Returns `None` once the buffer holds no complete frame.
    pub fn next_outcome(&mut self) -> Option<Outcome> {
        loop {
            match self.state {
                State::SeekPreamble => {
                    let Some(pos) = self.buf.iter().position(|&b| b == PREAMBLE) else {
                        self.discard(self.buf.len());
                        return None;
                    };
                    self.discard(pos);
                    self.state = State::ReadHeader;
                }
                State::ReadHeader => {
                    if self.buf.len() < 1 + HEADER_SIZE {
                        return None;
                    }
                    let header = &self.buf[1..1 + HEADER_SIZE];
                    let msg_type = u16::from_le_bytes([header[0], header[1]]);
                    let sender = u16::from_le_bytes([header[2], header[3]]);
                    let len = usize::from(header[4]);
                    let mut crc = Crc16::new();
                    crc.update(header);

                    if len > self.config.max_payload_size {
                        debug!(msg_type, sender, len, "declared payload length over limit");
                        self.stats.oversized += 1;
                        self.resync();
                        return Some(Outcome::Rejected(FrameError::PayloadTooLarge {
                            size: len,
                            max: self.config.max_payload_size,
                        }));
                    }

                    self.state = State::ReadPayload {
                        msg_type,
                        sender,
                        len,
                        crc,
                    };
                }
                State::ReadPayload {
                    msg_type,
                    sender,
                    len,
                    mut crc,
                } => {
                    let start = 1 + HEADER_SIZE;
                    if self.buf.len() < start + len {
                        return None;
                    }
                    crc.update(&self.buf[start..start + len]);
                    self.state = State::ReadCrc {
                        msg_type,
                        sender,
                        len,
                        crc,
                    };
                }
                State::ReadCrc {
                    msg_type,
                    sender,
                    len,
                    crc,
                } => {
                    let start = 1 + HEADER_SIZE;
                    let total = start + len + CRC_SIZE;
                    if self.buf.len() < total {
                        return None;
                    }

                    let received = u16::from_le_bytes([self.buf[total - 2], self.buf[total - 1]]);
                    if received != crc.value() {
                        warn!(
                            msg_type,
                            sender,
                            computed = crc.value(),
                            received,
                            "CRC mismatch, resynchronizing"
                        );
                        self.stats.crc_errors += 1;
                        self.resync();
                        return Some(Outcome::Rejected(FrameError::CrcMismatch {
                            msg_type,
                            sender,
                            expected: crc.value(),
                            actual: received,
                        }));
                    }

                    // Copied out so the payload never aliases the receive buffer.
                    let payload = Bytes::copy_from_slice(&self.buf[start..start + len]);
                    self.buf.advance(total);
                    self.state = State::SeekPreamble;
                    self.stats.frames += 1;

                    let frame = Frame {
                        msg_type,
                        sender,
                        payload,
                    };
                    if let Some(wanted) = self.config.sender_filter {
                        if wanted != sender {
                            trace!(msg_type, sender, "frame dropped by sender filter");
                            self.stats.filtered += 1;
                            continue;
                        }
                    }
                    return Some(self.dispatch(frame));
                }
            }
        }
    }

    fn dispatch(&self, frame: Frame) -> Outcome {
        if !self.config.decode_payloads {
            return Outcome::Frame(frame);
        }

        let Some(descriptor) = self.source.lookup(frame.msg_type) else {
            trace!(msg_type = frame.msg_type, "no descriptor registered");
            return Outcome::Unrecognized(frame);
        };

        match payload::decode(&descriptor, &frame.payload) {
            Ok(record) => Outcome::Message(DecodedMessage {
                msg_type: frame.msg_type,
                sender: frame.sender,
                descriptor,
                record,
            }),
            Err(source) => {
                warn!(
                    msg_type = frame.msg_type,
                    sender = frame.sender,
                    name = descriptor.name(),
                    error = %source,
                    "payload does not match descriptor"
                );
                Outcome::Rejected(FrameError::Payload {
                    msg_type: frame.msg_type,
                    sender: frame.sender,
                    source,
                })
            }
        }
    }

    /// Drop the current preamble and go back to scanning.
    fn resync(&mut self) {
        self.buf.advance(1);
        self.state = State::SeekPreamble;
    }

    fn discard(&mut self, count: usize) {
        if count == 0 {
            return;
        }
        trace!(count, "discarding bytes before preamble");
        self.buf.advance(count);
        self.stats.discarded_bytes += count as u64;
    }

    /// Bytes buffered but not yet turned into an outcome.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Drop buffered bytes and any partially assembled frame.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.state = State::SeekPreamble;
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Current decoder configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    /// The descriptor source frames are dispatched through.
    pub fn source(&self) -> &S {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use sbpwire_schema::{catalog, MessageRegistry, SchemaError, Value};

    use super::*;
    use crate::codec::{encode_frame, encode_message};

    fn registry() -> MessageRegistry {
        MessageRegistry::builtin().unwrap()
    }

    fn gps_time_record() -> Record {
        Record::new()
            .with("wn", Value::U16(2200))
            .with("tow", Value::U32(345_600_000))
            .with("ns_residual", Value::S32(-12))
            .with("flags", Value::U8(1))
    }

    fn gps_time_frame(sender: u16) -> BytesMut {
        let mut wire = BytesMut::new();
        encode_message(&registry(), catalog::MSG_GPS_TIME, sender, &gps_time_record(), &mut wire)
            .unwrap();
        wire
    }

    fn heartbeat_frame(sender: u16) -> BytesMut {
        let mut wire = BytesMut::new();
        encode_frame(catalog::MSG_HEARTBEAT, sender, &[0x01, 0x00, 0x00, 0x00], &mut wire).unwrap();
        wire
    }

    fn messages(outcomes: Vec<Outcome>) -> Vec<DecodedMessage> {
        outcomes.into_iter().filter_map(Outcome::into_message).collect()
    }

    #[test]
    fn decode_single_message() {
        let mut decoder = FrameDecoder::new(registry());
        let outcomes = decoder.feed(&gps_time_frame(0x0042));

        assert_eq!(outcomes.len(), 1);
        let Outcome::Message(message) = &outcomes[0] else {
            panic!("expected message, got {:?}", outcomes[0]);
        };
        assert_eq!(message.msg_type, catalog::MSG_GPS_TIME);
        assert_eq!(message.sender, 0x0042);
        assert_eq!(message.name(), "MSG_GPS_TIME");
        assert_eq!(message.record, gps_time_record());
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn byte_at_a_time_matches_whole_buffer() {
        let mut wire = gps_time_frame(0x0042);
        wire.extend_from_slice(&heartbeat_frame(0x0042));
        wire.extend_from_slice(&gps_time_frame(0x0007));

        let mut whole = FrameDecoder::new(registry());
        let expected = messages(whole.feed(&wire));
        assert_eq!(expected.len(), 3);

        let mut split = FrameDecoder::new(registry());
        let mut got = Vec::new();
        for byte in wire.iter() {
            got.extend(messages(split.feed(&[*byte])));
        }
        assert_eq!(got, expected);
    }

    #[test]
    fn every_split_point_yields_same_messages() {
        let mut wire = gps_time_frame(0x0042);
        wire.extend_from_slice(&heartbeat_frame(0x0042));

        for at in 0..=wire.len() {
            let mut decoder = FrameDecoder::new(registry());
            let mut got = messages(decoder.feed(&wire[..at]));
            got.extend(messages(decoder.feed(&wire[at..])));
            assert_eq!(got.len(), 2, "split at {at}");
            assert_eq!(got[0].msg_type, catalog::MSG_GPS_TIME);
            assert_eq!(got[1].msg_type, catalog::MSG_HEARTBEAT);
        }
    }

    #[test]
    fn noise_before_preamble_is_discarded() {
        let mut wire = BytesMut::from(&[0x00, 0x13, 0xAA, 0xFE][..]);
        wire.extend_from_slice(&heartbeat_frame(0x0042));

        let mut decoder = FrameDecoder::new(registry());
        let outcomes = decoder.feed(&wire);

        assert_eq!(outcomes.len(), 1);
        assert!(matches!(outcomes[0], Outcome::Message(_)));
        assert_eq!(decoder.stats().discarded_bytes, 4);
    }

    #[test]
    fn noise_only_yields_nothing() {
        let mut decoder = FrameDecoder::new(registry());
        assert!(decoder.feed(&[0x00, 0x01, 0x02, 0xFF]).is_empty());
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn crc_mismatch_then_valid_frame() {
        let mut corrupted = gps_time_frame(0x0042);
        corrupted[8] ^= 0x01;
        let mut wire = corrupted;
        wire.extend_from_slice(&heartbeat_frame(0x0042));

        let mut decoder = FrameDecoder::new(registry());
        let outcomes = decoder.feed(&wire);

        assert_eq!(outcomes.len(), 2);
        assert!(matches!(
            outcomes[0],
            Outcome::Rejected(FrameError::CrcMismatch {
                msg_type: catalog::MSG_GPS_TIME,
                sender: 0x0042,
                ..
            })
        ));
        let Outcome::Message(message) = &outcomes[1] else {
            panic!("expected message, got {:?}", outcomes[1]);
        };
        assert_eq!(message.msg_type, catalog::MSG_HEARTBEAT);
        assert_eq!(message.record.get("flags"), Some(&Value::U32(1)));
        assert_eq!(decoder.stats().crc_errors, 1);
    }

    #[test]
    fn stray_preamble_before_frame() {
        let mut wire = BytesMut::from(&[PREAMBLE][..]);
        wire.extend_from_slice(&gps_time_frame(0x0042));

        let mut decoder = FrameDecoder::new(registry());
        let outcomes = decoder.feed(&wire);

        assert_eq!(outcomes.len(), 2);
        assert!(matches!(
            outcomes[0],
            Outcome::Rejected(FrameError::CrcMismatch { .. })
        ));
        assert_eq!(messages(outcomes)[0].record, gps_time_record());
    }

    #[test]
    fn any_single_bit_flip_is_detected() {
        let frame = gps_time_frame(0x0042);
        let crc_start = frame.len() - CRC_SIZE;

        for byte in 1..crc_start {
            for bit in 0..8 {
                let mut wire = frame.clone();
                wire[byte] ^= 1 << bit;
                // Padding completes frames whose length byte was corrupted upward.
                wire.extend_from_slice(&[0u8; 300]);

                let mut decoder = FrameDecoder::new(registry());
                let outcomes = decoder.feed(&wire);

                assert!(
                    matches!(
                        outcomes.first(),
                        Some(Outcome::Rejected(FrameError::CrcMismatch { .. }))
                    ),
                    "flip byte {byte} bit {bit}: {outcomes:?}"
                );
                assert!(
                    outcomes.iter().all(Outcome::is_rejected),
                    "flip byte {byte} bit {bit}: {outcomes:?}"
                );
            }
        }
    }

    #[test]
    fn unknown_type_passes_through() {
        let payload = [0xDE, 0xAD, 0xBE, 0xEF, 0x01];
        let mut wire = BytesMut::new();
        encode_frame(0x1234, 0x0042, &payload, &mut wire).unwrap();

        let mut decoder = FrameDecoder::new(registry());
        let outcomes = decoder.feed(&wire);

        assert_eq!(outcomes.len(), 1);
        let Outcome::Unrecognized(frame) = &outcomes[0] else {
            panic!("expected unrecognized frame, got {:?}", outcomes[0]);
        };
        assert_eq!(frame.msg_type, 0x1234);
        assert_eq!(frame.sender, 0x0042);
        assert_eq!(frame.payload.as_ref(), payload);
    }

    #[test]
    fn undecodable_payload_is_rejected() {
        let mut wire = BytesMut::new();
        encode_frame(catalog::MSG_GPS_TIME, 0x0042, &[0x01, 0x02, 0x03], &mut wire).unwrap();
        wire.extend_from_slice(&heartbeat_frame(0x0042));

        let mut decoder = FrameDecoder::new(registry());
        let outcomes = decoder.feed(&wire);

        assert_eq!(outcomes.len(), 2);
        assert!(matches!(
            outcomes[0],
            Outcome::Rejected(FrameError::Payload {
                msg_type: catalog::MSG_GPS_TIME,
                source: SchemaError::FieldOutOfBounds { .. },
                ..
            })
        ));
        assert!(matches!(outcomes[1], Outcome::Message(_)));
    }

    #[test]
    fn oversized_length_is_rejected() {
        let config = FrameConfig {
            max_payload_size: 8,
            ..FrameConfig::default()
        };
        let mut wire = gps_time_frame(0x0042);
        wire.extend_from_slice(&heartbeat_frame(0x0042));

        let mut decoder = FrameDecoder::with_config(registry(), config);
        let outcomes = decoder.feed(&wire);

        assert_eq!(outcomes.len(), 2);
        assert!(matches!(
            outcomes[0],
            Outcome::Rejected(FrameError::PayloadTooLarge { size: 11, max: 8 })
        ));
        assert!(matches!(outcomes[1], Outcome::Message(_)));
        assert_eq!(decoder.stats().oversized, 1);
    }

    #[test]
    fn max_payload_size_is_clamped() {
        let config = FrameConfig {
            max_payload_size: 4096,
            ..FrameConfig::default()
        };
        let decoder = FrameDecoder::with_config(registry(), config);
        assert_eq!(decoder.config().max_payload_size, MAX_PAYLOAD);
    }

    #[test]
    fn sender_filter_drops_other_senders() {
        let config = FrameConfig {
            sender_filter: Some(0x0042),
            ..FrameConfig::default()
        };
        let mut wire = heartbeat_frame(0x0001);
        wire.extend_from_slice(&heartbeat_frame(0x0042));
        wire.extend_from_slice(&heartbeat_frame(0x0002));

        let mut decoder = FrameDecoder::with_config(registry(), config);
        let got = messages(decoder.feed(&wire));

        assert_eq!(got.len(), 1);
        assert_eq!(got[0].sender, 0x0042);
        assert_eq!(decoder.stats().filtered, 2);
        assert_eq!(decoder.stats().frames, 3);
    }

    #[test]
    fn raw_mode_skips_dispatch() {
        let config = FrameConfig {
            decode_payloads: false,
            ..FrameConfig::default()
        };
        let mut decoder = FrameDecoder::with_config(registry(), config);
        let outcomes = decoder.feed(&heartbeat_frame(0x0042));

        assert_eq!(outcomes.len(), 1);
        let Outcome::Frame(frame) = &outcomes[0] else {
            panic!("expected raw frame, got {:?}", outcomes[0]);
        };
        assert_eq!(frame.msg_type, catalog::MSG_HEARTBEAT);
        assert_eq!(frame.payload.as_ref(), [0x01, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn payload_outlives_decoder_buffer() {
        let mut decoder = FrameDecoder::new(MessageRegistry::new());
        let mut outcomes = decoder.feed(&heartbeat_frame(0x0042));
        decoder.feed(&[0xAA; 64]);
        decoder.reset();

        let Some(Outcome::Unrecognized(frame)) = outcomes.pop() else {
            panic!("expected unrecognized frame");
        };
        assert_eq!(frame.payload.as_ref(), [0x01, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn partial_frame_stays_pending() {
        let wire = gps_time_frame(0x0042);
        let mut decoder = FrameDecoder::new(registry());

        assert!(decoder.feed(&wire[..7]).is_empty());
        assert_eq!(decoder.pending(), 7);

        decoder.reset();
        assert_eq!(decoder.pending(), 0);
        assert!(decoder.feed(&wire[7..]).is_empty());
    }

    #[test]
    fn works_through_shared_registry() {
        let shared = sbpwire_schema::SharedRegistry::new(registry());
        let mut decoder = FrameDecoder::new(shared.clone());

        let mut wire = BytesMut::new();
        encode_frame(0x0900, 0x0042, &[0x07], &mut wire).unwrap();
        assert!(matches!(decoder.feed(&wire)[0], Outcome::Unrecognized(_)));

        let descriptor = MessageDescriptor::new(
            0x0900,
            "MSG_TEST",
            vec![sbpwire_schema::FieldSpec::new("x", sbpwire_schema::FieldKind::U8)],
        )
        .unwrap();
        shared.register(0x0900, descriptor).unwrap();

        let got = messages(decoder.feed(&wire));
        assert_eq!(got[0].record.get("x"), Some(&Value::U8(7)));
    }
}
