use std::io::{ErrorKind, Read};

use sbpwire_schema::DescriptorSource;

use crate::codec::FrameConfig;
use crate::decoder::{DecodedMessage, DecoderStats, FrameDecoder, Outcome};
use crate::error::{FrameError, Result};

const READ_CHUNK_SIZE: usize = 512;

/// Reads decoded outcomes from any `Read` stream (serial port, file, socket).
///
/// Handles partial reads internally. Callers always get whole outcomes.
pub struct FrameReader<T, S> {
    inner: T,
    decoder: FrameDecoder<S>,
}

impl<T: Read, S: DescriptorSource> FrameReader<T, S> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T, source: S) -> Self {
        Self::with_config(inner, source, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, source: S, config: FrameConfig) -> Self {
        Self {
            inner,
            decoder: FrameDecoder::with_config(source, config),
        }
    }

    /// Read the next outcome (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    /// Bytes of an unfinished frame at EOF are left in the decoder.
    pub fn read_outcome(&mut self) -> Result<Outcome> {
        loop {
            if let Some(outcome) = self.decoder.next_outcome() {
                return Ok(outcome);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.decoder.extend(&chunk[..read]);
        }
    }

    /// Read until the next decoded message, skipping every other outcome.
    pub fn read_message(&mut self) -> Result<DecodedMessage> {
        loop {
            if let Outcome::Message(message) = self.read_outcome()? {
                return Ok(message);
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    pub fn decoder(&self) -> &FrameDecoder<S> {
        &self.decoder
    }

    pub fn stats(&self) -> DecoderStats {
        self.decoder.stats()
    }
}

/// Yields outcomes until the stream ends. I/O errors are yielded once, then
/// iteration stops.
impl<T: Read, S: DescriptorSource> Iterator for FrameReader<T, S> {
    type Item = Result<Outcome>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_outcome() {
            Err(FrameError::ConnectionClosed) => None,
            other => Some(other),
        }
    }
}
