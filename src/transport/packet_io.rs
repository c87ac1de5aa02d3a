use crate::error::{MqttError, Result};
use crate::packet::{FixedHeader, Packet};
use bytes::{Bytes, BytesMut};
use std::future::Future;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Reads whole control packets from an async byte stream.
///
/// Blanket-implemented for every `AsyncRead`; the session's demultiplexer is
/// the only component that reads.
pub trait PacketReader: AsyncRead + Unpin + Send {
    /// Reads one complete control packet.
    ///
    /// # Errors
    ///
    /// Returns `MqttError::Io` when the stream fails or closes mid-packet,
    /// and a decode error when the bytes are not a valid packet.
    fn read_packet(&mut self) -> impl Future<Output = Result<Packet>> + Send + '_ {
        async move {
            let mut header = [0u8; 1];
            self.read_exact(&mut header).await?;

            // Remaining length: up to four continuation bytes.
            let mut header_buf = BytesMut::with_capacity(5);
            header_buf.extend_from_slice(&header);
            loop {
                self.read_exact(&mut header).await?;
                header_buf.extend_from_slice(&header);
                if header[0] & 0x80 == 0 {
                    break;
                }
                if header_buf.len() > 4 {
                    return Err(MqttError::MalformedPacket(
                        "remaining length exceeds 4 bytes".to_string(),
                    ));
                }
            }

            let mut header_buf = header_buf.freeze();
            let fixed_header = FixedHeader::decode(&mut header_buf)?;
            if !fixed_header.validate_flags() {
                return Err(MqttError::MalformedPacket(format!(
                    "invalid flags {:#04x} for {:?}",
                    fixed_header.flags, fixed_header.packet_type
                )));
            }

            let mut body = vec![0u8; fixed_header.remaining_length as usize];
            self.read_exact(&mut body).await?;
            let mut body = Bytes::from(body);
            Packet::decode_from_body(&fixed_header, &mut body)
        }
    }
}

impl<T: AsyncRead + Unpin + Send> PacketReader for T {}

/// Writes whole control packets to an async byte stream.
///
/// Each call encodes the packet into one buffer and writes it with a single
/// `write_all`, so frames never interleave as long as writers are serialized
/// by the session's write lock.
pub trait PacketWriter: AsyncWrite + Unpin + Send {
    /// Encodes and writes one control packet, then flushes.
    ///
    /// # Errors
    ///
    /// Returns `MqttError::Io` when the stream fails, and an encode error
    /// when a field cannot be represented on the wire.
    fn write_packet<'a>(
        &'a mut self,
        packet: &'a Packet,
    ) -> impl Future<Output = Result<()>> + Send + 'a {
        async move {
            let mut buf = BytesMut::with_capacity(1024);
            packet.encode(&mut buf)?;
            self.write_all(&buf).await?;
            self.flush().await?;
            Ok(())
        }
    }
}

impl<T: AsyncWrite + Unpin + Send> PacketWriter for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::publish::PublishPacket;
    use crate::QoS;

    #[tokio::test]
    async fn packets_survive_a_duplex_pipe() {
        let (mut client, mut server) = tokio::io::duplex(256);

        let packet = Packet::Publish(PublishPacket::new("a/b", b"x".to_vec(), QoS::AtMostOnce));
        client.write_packet(&packet).await.unwrap();

        match server.read_packet().await.unwrap() {
            Packet::Publish(p) => {
                assert_eq!(p.topic_name, "a/b");
                assert_eq!(p.payload, b"x");
            }
            other => panic!("unexpected packet {other:?}"),
        }
    }

    #[tokio::test]
    async fn split_body_reads_reassemble() {
        // A small pipe forces the 200 byte payload through several reads.
        let (mut client, mut server) = tokio::io::duplex(16);

        let packet = Packet::Publish(PublishPacket::new(
            "big",
            vec![0xAB; 200],
            QoS::AtMostOnce,
        ));
        let writer = tokio::spawn(async move {
            client.write_packet(&packet).await.unwrap();
        });

        match server.read_packet().await.unwrap() {
            Packet::Publish(p) => assert_eq!(p.payload.len(), 200),
            other => panic!("unexpected packet {other:?}"),
        }
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn closed_stream_surfaces_io_error() {
        let (client, mut server) = tokio::io::duplex(16);
        drop(client);
        assert!(matches!(
            server.read_packet().await,
            Err(MqttError::Io(_))
        ));
    }
}
