//! Decoded message stream over the read half of a connection.

use crate::error::SessionError;
use crate::transport::{BoxedReader, BoxedWriter};
use bytes::BytesMut;
use ofp_wire::{Message, MessageDecoder};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::trace;

/// Lazy sequence of messages read from a connection.
///
/// The sequence ends (`Ok(None)`) when the peer closes cleanly between
/// messages; a close in the middle of a message or a decode failure is an
/// error. Dropping the stream releases the read half.
pub struct MessageStream {
    reader: BoxedReader,
    decoder: MessageDecoder,
    buffer: BytesMut,
}

impl MessageStream {
    /// Wrap a read half
    pub fn new(reader: BoxedReader) -> Self {
        Self {
            reader,
            decoder: MessageDecoder::new(),
            buffer: BytesMut::with_capacity(64 * 1024),
        }
    }

    /// Next decoded message.
    ///
    /// Cancel safe: bytes already read stay buffered for the next call.
    pub async fn next_message(&mut self) -> Result<Option<Message>, SessionError> {
        loop {
            if let Some(message) = self.decoder.decode(&mut self.buffer)? {
                return Ok(Some(message));
            }

            let bytes_read = self.reader.read_buf(&mut self.buffer).await?;
            if bytes_read == 0 {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                return Err(SessionError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed in the middle of a message",
                )));
            }

            trace!(
                "Read {} bytes, buffer now has {} bytes",
                bytes_read,
                self.buffer.len()
            );
        }
    }

    /// Messages decoded so far
    pub fn decoded(&self) -> u64 {
        self.decoder.decoded()
    }
}

/// Encode and write one message
pub(crate) async fn write_message(
    writer: &mut BoxedWriter,
    message: &Message,
) -> Result<(), SessionError> {
    let bytes = message.encode()?;
    writer.write_all(&bytes).await?;
    trace!("Wrote {} (xid {})", message.typ(), message.xid());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ofp_wire::MessageType;
    use std::io::Cursor;

    fn stream_over(bytes: Vec<u8>) -> MessageStream {
        MessageStream::new(Box::new(Cursor::new(bytes)))
    }

    #[tokio::test]
    async fn test_stream_yields_messages_then_ends() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&Message::hello(1).encode().unwrap());
        bytes.extend_from_slice(&Message::features_request(2).encode().unwrap());

        let mut stream = stream_over(bytes);
        assert_eq!(
            stream.next_message().await.unwrap().unwrap().typ(),
            MessageType::Hello
        );
        assert_eq!(stream.next_message().await.unwrap().unwrap().xid(), 2);
        assert!(stream.next_message().await.unwrap().is_none());
        assert_eq!(stream.decoded(), 2);
    }

    #[tokio::test]
    async fn test_stream_errors_on_truncated_message() {
        let encoded = Message::hello(1).encode().unwrap();
        let mut stream = stream_over(encoded[..5].to_vec());
        assert!(matches!(
            stream.next_message().await,
            Err(SessionError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_stream_errors_on_garbage() {
        let mut stream = stream_over(vec![0x01, 0xee, 0x00, 0x08, 0, 0, 0, 0]);
        assert!(matches!(
            stream.next_message().await,
            Err(SessionError::Wire(_))
        ));
    }
}
