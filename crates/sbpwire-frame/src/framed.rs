//! `tokio_util::codec` adapters, so frames can be read and written with
//! `FramedRead` / `FramedWrite` over any async byte stream.

use bytes::BytesMut;
use sbpwire_schema::DescriptorSource;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{encode_frame, Frame};
use crate::decoder::{FrameDecoder, Outcome};
use crate::error::FrameError;

impl<S: DescriptorSource> Decoder for FrameDecoder<S> {
    type Item = Outcome;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Outcome>, FrameError> {
        // The decoder keeps its own buffer so it can rescan after a rejected frame.
        if !src.is_empty() {
            let chunk = src.split();
            self.extend(&chunk);
        }
        Ok(self.next_outcome())
    }
}

/// Encodes [`Frame`]s into the wire format.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameEncoder;

impl Encoder<Frame> for FrameEncoder {
    type Error = FrameError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), FrameError> {
        encode_frame(item.msg_type, item.sender, &item.payload, dst)
    }
}

impl Encoder<&Frame> for FrameEncoder {
    type Error = FrameError;

    fn encode(&mut self, item: &Frame, dst: &mut BytesMut) -> Result<(), FrameError> {
        encode_frame(item.msg_type, item.sender, &item.payload, dst)
    }
}
