//! Proto3 JSON mapping for runtime-typed messages.
use prost_reflect::{DeserializeOptions, DynamicMessage, MessageDescriptor, SerializeOptions};

/// Parses `text` as a message of type `descriptor`.
///
/// The whole input must be one JSON document: trailing characters are an error.
pub fn from_str(
    descriptor: MessageDescriptor,
    text: &str,
    options: &DeserializeOptions,
) -> Result<DynamicMessage, serde_json::Error> {
    let mut de = serde_json::Deserializer::from_str(text);
    let message = DynamicMessage::deserialize_with_options(descriptor, &mut de, options)?;
    de.end()?;
    Ok(message)
}

pub fn to_value(
    message: &DynamicMessage,
    options: &SerializeOptions,
) -> Result<serde_json::Value, serde_json::Error> {
    message.serialize_with_options(serde_json::value::Serializer, options)
}
