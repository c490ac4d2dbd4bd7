use std::io::{self, Read, Write};

use tracing::warn;

use crate::error::{ClientError, Result};
use crate::marshal::MarshallerRegistry;
use crate::protocol::{DataType, Transport};
use crate::value::{NamePath, Value, percent_decode, percent_encode};
use crate::widget::WidgetTree;

pub const MAX_VALUE_DEPTH: usize = 64;

/// Record fields every widget accepts and ignores.
const PASSIVE_FIELDS: [&str; 2] = ["state", "style"];

pub fn write_value<S: Write>(transport: &mut Transport<S>, value: &Value) -> Result<()> {
    transport.send_data_type(value.data_type())?;
    match value {
        Value::Int(v) => transport.send_int(*v),
        Value::Bool(v) => transport.send_bool(*v),
        Value::Array(items) => {
            transport.send_int(wire_count(items.len())?)?;
            for item in items {
                write_value(transport, item)?;
            }
            Ok(())
        }
        Value::Record(fields) => {
            transport.send_int(wire_count(fields.len())?)?;
            for (name, item) in fields {
                transport.send_string(name)?;
                write_value(transport, item)?;
            }
            Ok(())
        }
        other => {
            let encoding = transport.encoding();
            transport.send_string(&percent_encode(other.as_str().unwrap_or_default(), encoding))
        },
    }
}

pub fn read_value<S: Read>(transport: &mut Transport<S>) -> Result<Value> {
    let tag = transport.receive_data_type()?;
    read_tagged(transport, tag, 0)
}

pub fn skip_value<S: Read>(transport: &mut Transport<S>) -> Result<()> {
    read_value(transport).map(drop)
}

/// Writes `value` as update lines, one `<path>: <escaped>\n` per scalar.
pub fn encode_value<S: Write>(
    transport: &mut Transport<S>,
    value: &Value,
    path: &NamePath,
    include_name: bool,
) -> Result<()> {
    match value {
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                encode_value(transport, item, &path.index(index), include_name)?;
            }
            Ok(())
        }
        Value::Record(fields) => {
            for (name, item) in fields {
                encode_value(transport, item, &path.field(name), include_name)?;
            }
            Ok(())
        }
        scalar => {
            if include_name {
                transport.send_string_delim(&path.to_string())?;
                transport.send_string_delim(": ")?;
            }
            let encoded = percent_encode(&scalar.to_wire_text(), transport.encoding());
            transport.send_string_delim(&encoded)?;
            transport.send_string_delim("\n")
        }
    }
}

/// Reads one value rooted at `path` and applies it to the widget tree.
///
/// A path that resolves to a widget with a marshaller hands that widget
/// the record fields it understands (or the whole scalar/array); every
/// other record field and array element is decoded one level deeper.
/// Scalars without a target are read and dropped. The full decoded value
/// is returned either way.
pub fn decode_value<S: Read, T: WidgetTree>(
    transport: &mut Transport<S>,
    path: &NamePath,
    tree: &mut T,
    registry: &MarshallerRegistry,
) -> Result<Value> {
    decode_at(transport, path, tree, registry, 0)
}

fn decode_at<S: Read, T: WidgetTree>(
    transport: &mut Transport<S>,
    path: &NamePath,
    tree: &mut T,
    registry: &MarshallerRegistry,
    depth: usize,
) -> Result<Value> {
    check_depth(depth)?;

    let long_name = path.to_string();
    let target = tree
        .resolve(&long_name)
        .and_then(|handle| tree.kind(handle).map(|kind| (handle, kind)));
    let marshaller = target.and_then(|(handle, kind)| registry.get(kind).map(|m| (handle, m)));

    let tag = transport.receive_data_type()?;
    match tag {
        DataType::Record => {
            let count = transport.receive_count()?;
            let mut fields = Vec::with_capacity(count.min(64));
            for _ in 0..count {
                let name = transport.receive_string()?;
                let value = match marshaller {
                    Some((handle, m)) if m.accepts(&name) => {
                        let value = read_value_at(transport, depth + 1)?;
                        (m.decode)(tree, handle, Some(&name), &value);
                        value
                    }
                    Some(_) if PASSIVE_FIELDS.contains(&name.as_str()) => {
                        read_value_at(transport, depth + 1)?
                    }
                    _ => decode_at(transport, &path.field(&name), tree, registry, depth + 1)?,
                };
                fields.push((name, value));
            }
            Ok(Value::Record(fields))
        }
        DataType::Array => {
            if let Some((handle, m)) = marshaller {
                let value = read_tagged(transport, tag, depth)?;
                (m.decode)(tree, handle, None, &value);
                return Ok(value);
            }

            let count = transport.receive_count()?;
            let mut items = Vec::with_capacity(count.min(64));
            for index in 0..count {
                items.push(decode_at(
                    transport,
                    &path.index(index),
                    tree,
                    registry,
                    depth + 1,
                )?);
            }
            Ok(Value::Array(items))
        }
        scalar => {
            let value = read_tagged(transport, scalar, depth)?;
            match (target, marshaller) {
                (Some(_), Some((handle, m))) => (m.decode)(tree, handle, None, &value),
                (Some((_, kind)), None) => {
                    warn!(path = %long_name, kind = kind.name(), "no marshaller for widget kind; value skipped");
                }
                (None, _) => {
                    warn!(path = %long_name, "no widget at path; value skipped");
                }
            }
            Ok(value)
        }
    }
}

fn read_value_at<S: Read>(transport: &mut Transport<S>, depth: usize) -> Result<Value> {
    let tag = transport.receive_data_type()?;
    read_tagged(transport, tag, depth)
}

fn read_tagged<S: Read>(transport: &mut Transport<S>, tag: DataType, depth: usize) -> Result<Value> {
    check_depth(depth)?;

    let value = match tag {
        DataType::Int => Value::Int(transport.receive_int()?),
        DataType::Bool => Value::Bool(transport.receive_bool()?),
        DataType::Array => {
            let count = transport.receive_count()?;
            let mut items = Vec::with_capacity(count.min(64));
            for _ in 0..count {
                items.push(read_value_at(transport, depth + 1)?);
            }
            Value::Array(items)
        }
        DataType::Record => {
            let count = transport.receive_count()?;
            let mut fields = Vec::with_capacity(count.min(64));
            for _ in 0..count {
                let name = transport.receive_string()?;
                fields.push((name, read_value_at(transport, depth + 1)?));
            }
            Value::Record(fields)
        }
        text => {
            let raw = transport.receive_string()?;
            Value::string_of(text, percent_decode(&raw, transport.encoding()))
                .ok_or(ClientError::UnknownDataType(text.to_byte()))?
        }
    };
    Ok(value)
}

fn check_depth(depth: usize) -> Result<()> {
    if depth > MAX_VALUE_DEPTH {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("value nesting deeper than {MAX_VALUE_DEPTH}"),
        )
        .into());
    }
    Ok(())
}

fn wire_count(len: usize) -> Result<i32> {
    i32::try_from(len).map_err(|_| {
        io::Error::new(io::ErrorKind::InvalidInput, format!("too many elements: {len}")).into()
    })
}
