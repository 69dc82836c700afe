// src/config/config_types.rs
//
// Config types for the app

use serde::Deserialize;
use std::time::Duration;
use toml::Value;

use crate::error::{Error, Result};
use crate::models::{Message, Type, ACCEPT_ALL};
use crate::services::osc_service::DEFAULT_MAX_PACKETS_PER_STEP;
use crate::services::Outgoing;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RuntimeConfig {
    pub interval_ms: u64,
    pub max_packets_per_step: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            max_packets_per_step: DEFAULT_MAX_PACKETS_PER_STEP,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ClientConfig {
    pub name: String,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ServerConfig {
    pub name: String,
    #[serde(default = "default_bind_host")]
    pub host: String,
    pub port: u16,
}

fn default_bind_host() -> String {
    "0.0.0.0".to_string()
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DispatchConfig {
    pub patterns: Vec<String>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            patterns: vec![ACCEPT_ALL.to_string()],
        }
    }
}

/// One entry of the outbound schedule. With `interval_ms` set the entry is
/// published at its own rate instead of once per loop interval.
#[derive(Debug, Deserialize, Clone)]
pub struct MessageConfig {
    pub endpoint: String,
    pub address: String,
    pub tags: String,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub interval_ms: Option<u64>,
}

impl MessageConfig {
    pub fn new(endpoint: &str, address: &str, tags: &str, args: Vec<Value>) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            address: address.to_string(),
            tags: tags.to_string(),
            args,
            interval_ms: None,
        }
    }

    pub fn to_message(&self) -> Result<Message> {
        let args = coerce_args(&self.address, &self.tags, &self.args)?;
        Message::with_type_tags(self.address.clone(), &self.tags, args)
    }

    pub fn to_outgoing(&self) -> Result<Outgoing> {
        let message = self.to_message()?;
        match self.interval_ms {
            Some(ms) => {
                let args = message.args;
                Outgoing::publish(
                    self.endpoint.clone(),
                    message.addr,
                    Duration::from_millis(ms),
                    move || args.clone(),
                )
            }
            None => Ok(Outgoing::new(self.endpoint.clone(), message)),
        }
    }
}

/// Converts TOML values into OSC arguments, one tag at a time. `T`, `F`,
/// `N` and `I` consume no value.
pub fn coerce_args(address: &str, tags: &str, values: &[Value]) -> Result<Vec<Type>> {
    let invalid = |index: usize, reason: String| Error::InvalidArgument {
        address: address.to_string(),
        index,
        reason,
    };

    let tags = tags
        .strip_prefix(',')
        .ok_or_else(|| invalid(0, format!("type tags {:?} must start with ','", tags)))?;

    let mut values = values.iter().enumerate();
    let mut args = Vec::with_capacity(tags.len());
    for tag in tags.chars() {
        let arg = match tag {
            'T' => Type::Bool(true),
            'F' => Type::Bool(false),
            'N' => Type::Nil,
            'I' => Type::Inf,
            _ => {
                let (index, value) = values
                    .next()
                    .ok_or_else(|| invalid(args.len(), format!("no value for tag '{}'", tag)))?;
                coerce_value(tag, value).map_err(|reason| invalid(index, reason))?
            }
        };
        args.push(arg);
    }

    if let Some((index, extra)) = values.next() {
        return Err(invalid(index, format!("unexpected extra value {}", extra)));
    }
    Ok(args)
}

fn coerce_value(tag: char, value: &Value) -> std::result::Result<Type, String> {
    let mismatch = || format!("tag '{}' cannot take a {}", tag, value.type_str());

    match (tag, value) {
        ('i', Value::Integer(v)) => i32::try_from(*v)
            .map(Type::Int)
            .map_err(|_| format!("{} does not fit in int32", v)),
        ('h', Value::Integer(v)) => Ok(Type::Long(*v)),
        ('f', Value::Float(v)) => Ok(Type::Float(*v as f32)),
        ('f', Value::Integer(v)) => Ok(Type::Float(*v as f32)),
        ('d', Value::Float(v)) => Ok(Type::Double(*v)),
        ('d', Value::Integer(v)) => Ok(Type::Double(*v as f64)),
        ('s', Value::String(s)) => Ok(Type::String(s.clone())),
        ('c', Value::String(s)) => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(Type::Char(c)),
                _ => Err(format!("tag 'c' needs exactly one character, got {:?}", s)),
            }
        }
        ('b', Value::String(s)) => Ok(Type::Blob(s.as_bytes().to_vec())),
        ('b', Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::Integer(byte) => u8::try_from(*byte)
                    .map_err(|_| format!("blob byte {} is out of range", byte)),
                other => Err(format!("blob bytes must be integers, found {}", other.type_str())),
            })
            .collect::<std::result::Result<Vec<u8>, String>>()
            .map(Type::Blob),
        ('i' | 'h' | 'f' | 'd' | 's' | 'c' | 'b', _) => Err(mismatch()),
        _ => Err(format!("unsupported type tag '{}'", tag)),
    }
}

/// The demo schedule: four messages to `aclientname`, once per interval.
pub fn default_messages() -> Vec<MessageConfig> {
    vec![
        MessageConfig::new(
            "aclientname",
            "/lambda",
            ",ifs",
            vec![Value::Integer(123), Value::Float(4.5), Value::String("six".into())],
        ),
        MessageConfig::new(
            "aclientname",
            "/callback",
            ",ifs",
            vec![Value::Integer(1), Value::Float(2.2), Value::String("test".into())],
        ),
        MessageConfig::new(
            "aclientname",
            "/wildcard/abc/test",
            ",i",
            vec![Value::Integer(1)],
        ),
        MessageConfig::new("aclientname", "/need/reply", ",", vec![]),
    ]
}
