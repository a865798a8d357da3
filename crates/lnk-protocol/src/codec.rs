use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{ProtocolError, ProtocolResult};
use crate::message::{StoreMessage, MAX_MESSAGE_SIZE};

/// Codec for encoding/decoding Lnk protocol messages.
pub struct LnkCodec;

impl LnkCodec {
    /// Encode a message with framing: [4 bytes len][1 byte tag][payload]
    pub fn encode(msg: &StoreMessage) -> ProtocolResult<Vec<u8>> {
        let payload = Self::encode_payload(msg)?;
        if payload.len() > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::MessageTooLarge {
                size: payload.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }
        let len = (payload.len() + 1) as u32;
        let mut buf = Vec::with_capacity(4 + 1 + payload.len());
        buf.extend_from_slice(&len.to_be_bytes());
        buf.push(msg.type_tag());
        buf.extend_from_slice(&payload);
        Ok(buf)
    }

    /// Decode a framed message. Returns (message, bytes_consumed).
    pub fn decode(data: &[u8]) -> ProtocolResult<(StoreMessage, usize)> {
        if data.len() < 5 {
            return Err(ProtocolError::FramingError("too short".into()));
        }
        let len = Self::frame_len([data[0], data[1], data[2], data[3]])?;
        let total = 4 + len;
        if data.len() < total {
            return Err(ProtocolError::FramingError(format!(
                "incomplete: have {}, need {}",
                data.len(),
                total
            )));
        }
        let msg = Self::decode_body(data[4], &data[5..total])?;
        Ok((msg, total))
    }

    /// Encode payload only (no framing).
    pub fn encode_payload(msg: &StoreMessage) -> ProtocolResult<Vec<u8>> {
        bincode::serialize(msg).map_err(|e| ProtocolError::Serialization(e.to_string()))
    }

    /// Decode payload only (no framing).
    pub fn decode_payload(data: &[u8]) -> ProtocolResult<StoreMessage> {
        bincode::deserialize(data).map_err(|e| ProtocolError::Deserialization(e.to_string()))
    }

    /// Validate a length header and return the frame length (tag + payload).
    fn frame_len(header: [u8; 4]) -> ProtocolResult<usize> {
        let len = u32::from_be_bytes(header) as usize;
        if len < 1 {
            return Err(ProtocolError::FramingError("zero-length frame".into()));
        }
        if len - 1 > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::MessageTooLarge {
                size: len - 1,
                max: MAX_MESSAGE_SIZE,
            });
        }
        Ok(len)
    }

    fn decode_body(tag: u8, payload: &[u8]) -> ProtocolResult<StoreMessage> {
        let msg = Self::decode_payload(payload)?;
        if msg.type_tag() != tag {
            return Err(ProtocolError::InvalidMessageType(tag));
        }
        Ok(msg)
    }
}

/// Write one framed message to `writer` and flush it.
pub async fn write_message<W>(writer: &mut W, msg: &StoreMessage) -> ProtocolResult<()>
where
    W: AsyncWrite + Unpin,
{
    let frame = LnkCodec::encode(msg)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one framed message from `reader`.
///
/// Returns `Ok(None)` if the peer closed the stream cleanly before a new
/// frame started; a stream that ends mid-frame is an error.
pub async fn read_message<R>(reader: &mut R) -> ProtocolResult<Option<StoreMessage>>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; 4];
    let mut filled = 0;
    while filled < header.len() {
        let n = reader.read(&mut header[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(ProtocolError::FramingError("stream ended inside header".into()));
        }
        filled += n;
    }

    let len = LnkCodec::frame_len(header)?;
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            ProtocolError::FramingError("stream ended inside frame".into())
        } else {
            ProtocolError::Io(e)
        }
    })?;
    LnkCodec::decode_body(body[0], &body[1..]).map(Some)
}
