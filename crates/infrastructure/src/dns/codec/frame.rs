//! Two-byte length-prefixed framing for DNS over TCP (RFC 1035 §4.2.2).

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

const LENGTH_PREFIX: usize = 2;

pub const DEFAULT_MAX_FRAME_LEN: usize = u16::MAX as usize;

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("frame of {len} bytes exceeds limit of {max}")]
    TooLarge { len: usize, max: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Buffers partial reads until a whole frame is available. Frames declaring
/// more than `max_frame_len` bytes are rejected before any body is read.
#[derive(Debug, Clone, Copy)]
pub struct DnsFrameCodec {
    max_frame_len: usize,
}

impl DnsFrameCodec {
    pub fn new() -> Self {
        Self {
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }

    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self {
            max_frame_len: max_frame_len.min(DEFAULT_MAX_FRAME_LEN),
        }
    }

    pub fn max_frame_len(&self) -> usize {
        self.max_frame_len
    }
}

impl Default for DnsFrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for DnsFrameCodec {
    type Item = BytesMut;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < LENGTH_PREFIX {
            return Ok(None);
        }

        let len = u16::from_be_bytes([src[0], src[1]]) as usize;
        if len > self.max_frame_len {
            return Err(FrameError::TooLarge {
                len,
                max: self.max_frame_len,
            });
        }

        if src.len() < LENGTH_PREFIX + len {
            src.reserve(LENGTH_PREFIX + len - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_PREFIX);
        Ok(Some(src.split_to(len)))
    }
}

impl Encoder<Bytes> for DnsFrameCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.len() > self.max_frame_len {
            return Err(FrameError::TooLarge {
                len: item.len(),
                max: self.max_frame_len,
            });
        }
        dst.reserve(LENGTH_PREFIX + item.len());
        dst.put_u16(item.len() as u16);
        dst.extend_from_slice(&item);
        Ok(())
    }
}
