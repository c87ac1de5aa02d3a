//! MQTT v5 primitive encodings: variable byte integers, UTF-8 strings and
//! binary data, as defined in section 1.5 of the protocol specification.

pub mod binary;
pub mod string;
pub mod variable_byte;

pub use binary::{decode_binary, encode_binary};
pub use string::{decode_string, encode_string};
pub use variable_byte::{
    decode_variable_int, encode_variable_int, variable_int_len, VARIABLE_BYTE_INT_MAX,
};
