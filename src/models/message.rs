// src/models/message.rs
// OSC message model, type tags and the wire codec

use rosc::{OscBundle, OscMessage, OscPacket, OscTime};
use std::fmt::Write as _;

use crate::error::{Error, Result};

pub use rosc::OscType as Type;

/// Characters that may not appear in an outgoing OSC address.
const RESERVED_ADDRESS_CHARS: &[char] = &[' ', '#', '*', ',', '?', '[', ']', '{', '}'];

/// Bundle timetag meaning "process immediately".
pub const IMMEDIATELY: OscTime = OscTime {
    seconds: 0,
    fractional: 1,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub addr: String,
    pub args: Vec<Type>,
}

impl Message {
    pub fn new(addr: impl Into<String>, args: Vec<Type>) -> Result<Self> {
        let addr = addr.into();
        validate_address(&addr)?;
        Ok(Self { addr, args })
    }

    /// Builds a message from an explicit type-tag string such as `",ifs"`.
    /// The tags must describe `args` exactly.
    pub fn with_type_tags(addr: impl Into<String>, tags: &str, args: Vec<Type>) -> Result<Self> {
        let message = Self::new(addr, args)?;
        let actual = message.type_tags();
        if tags != actual {
            return Err(Error::TypeTagMismatch {
                expected: tags.to_string(),
                actual,
            });
        }
        Ok(message)
    }

    /// The `,`-prefixed type-tag string for this message's arguments.
    pub fn type_tags(&self) -> String {
        let mut tags = String::with_capacity(self.args.len() + 1);
        tags.push(',');
        for arg in &self.args {
            push_type_tag(arg, &mut tags);
        }
        tags
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        encode_packet(&OscPacket::Message(self.into()))
    }
}

impl From<OscMessage> for Message {
    fn from(message: OscMessage) -> Self {
        Self {
            addr: message.addr,
            args: message.args,
        }
    }
}

impl From<&Message> for OscMessage {
    fn from(message: &Message) -> Self {
        OscMessage {
            addr: message.addr.clone(),
            args: message.args.clone(),
        }
    }
}

pub fn validate_address(addr: &str) -> Result<()> {
    let reason = if !addr.starts_with('/') {
        Some("must start with '/'")
    } else if addr.contains(RESERVED_ADDRESS_CHARS) {
        Some("contains a reserved character")
    } else if addr.len() > 1 && addr.ends_with('/') {
        Some("must not end with '/'")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(Error::InvalidAddress {
            address: addr.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

fn push_type_tag(arg: &Type, tags: &mut String) {
    match arg {
        Type::Int(_) => tags.push('i'),
        Type::Float(_) => tags.push('f'),
        Type::String(_) => tags.push('s'),
        Type::Blob(_) => tags.push('b'),
        Type::Time(_) => tags.push('t'),
        Type::Long(_) => tags.push('h'),
        Type::Double(_) => tags.push('d'),
        Type::Char(_) => tags.push('c'),
        Type::Color(_) => tags.push('r'),
        Type::Midi(_) => tags.push('m'),
        Type::Bool(true) => tags.push('T'),
        Type::Bool(false) => tags.push('F'),
        Type::Nil => tags.push('N'),
        Type::Inf => tags.push('I'),
        Type::Array(array) => {
            tags.push('[');
            for inner in &array.content {
                push_type_tag(inner, tags);
            }
            tags.push(']');
        }
    }
}

/// Encodes several messages as one bundle.
pub fn encode_bundle(messages: &[Message], timetag: OscTime) -> Result<Vec<u8>> {
    let bundle = OscBundle {
        timetag,
        content: messages
            .iter()
            .map(|m| OscPacket::Message(m.into()))
            .collect(),
    };
    encode_packet(&OscPacket::Bundle(bundle))
}

fn encode_packet(packet: &OscPacket) -> Result<Vec<u8>> {
    rosc::encoder::encode(packet).map_err(|e| Error::Encode(format!("{:?}", e)))
}

/// Decodes one datagram. Bundles are flattened into their messages, in order.
pub fn decode_packet(bytes: &[u8]) -> std::result::Result<Vec<Message>, rosc::OscError> {
    let (_, packet) = rosc::decoder::decode_udp(bytes)?;
    let mut messages = Vec::new();
    unfold(packet, &mut messages);
    Ok(messages)
}

fn unfold(packet: OscPacket, messages: &mut Vec<Message>) {
    match packet {
        OscPacket::Message(message) => messages.push(message.into()),
        OscPacket::Bundle(bundle) => {
            for inner in bundle.content {
                unfold(inner, messages);
            }
        }
    }
}

/// Renders arguments as a tuple: `()`, `(42,)`, `(123, 4.5, "six")`.
pub fn format_args(args: &[Type]) -> String {
    let mut out = String::from("(");
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_arg(arg, &mut out);
    }
    if args.len() == 1 {
        out.push(',');
    }
    out.push(')');
    out
}

fn write_arg(arg: &Type, out: &mut String) {
    let _ = match arg {
        Type::Int(v) => write!(out, "{}", v),
        Type::Long(v) => write!(out, "{}", v),
        Type::Float(v) => write!(out, "{:?}", v),
        Type::Double(v) => write!(out, "{:?}", v),
        Type::String(v) => write!(out, "{:?}", v),
        Type::Char(v) => write!(out, "{:?}", v),
        Type::Bool(v) => write!(out, "{}", v),
        Type::Nil => write!(out, "nil"),
        Type::Inf => write!(out, "inf"),
        Type::Blob(bytes) => write!(out, "blob[{}]", bytes.len()),
        Type::Array(array) => write!(out, "{}", format_args(&array.content)),
        other => write!(out, "{:?}", other),
    };
}
