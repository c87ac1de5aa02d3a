//! Protocol-level definitions shared by every control packet.

pub mod v5;
