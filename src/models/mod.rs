pub mod message;
pub mod pattern;

pub use message::{decode_packet, encode_bundle, format_args, Message, Type, IMMEDIATELY};
pub use pattern::{AddressPattern, ACCEPT_ALL};
