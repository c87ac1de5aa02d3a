//! Packet-level I/O over established byte streams.
//!
//! The session never dials: it is handed an already-connected full-duplex
//! stream and talks to it exclusively through [`PacketReader`] and
//! [`PacketWriter`]. Anything implementing the tokio I/O traits works,
//! including TLS streams and the in-memory pipes the tests script.

pub mod packet_io;
pub mod tcp;

pub use packet_io::{PacketReader, PacketWriter};
pub use tcp::connect as connect_tcp;
