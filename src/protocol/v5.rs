//! MQTT v5.0 specifics: the property system and reason codes.

pub mod properties;
pub mod reason_codes;
