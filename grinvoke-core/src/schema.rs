//! # Schema Compiler
//!
//! Converts Protobuf message descriptors into a JSON-Schema-like tree ([`SchemaNode`]) that a UI
//! can render as a form and that documents the JSON payload a method expects.
//!
//! ## Mapping
//!
//! | Protobuf                                   | Schema                                  |
//! |--------------------------------------------|-----------------------------------------|
//! | `bool`                                     | `boolean`                               |
//! | `float`, `double`                          | `number`                                |
//! | every integer type (varint or fixed width) | `integer`                               |
//! | `string`, `bytes`                          | `string`                                |
//! | enum                                       | `string` with the declared value names  |
//! | message                                    | `object`, compiled recursively          |
//! | `repeated T`                               | `array` whose `items` is the schema of T |
//! | `map<K, V>`                                | `object` whose `additionalProperties` is the schema of V |
//!
//! Properties are keyed by the field's JSON name (lowerCamelCase), the same names the invoker
//! accepts in payloads.
//!
//! ## Well-known types
//!
//! `google.protobuf.*` messages compile like any other message, so a `Timestamp` field shows
//! its `seconds` and `nanos` fields. The invoker, however, follows the proto3 JSON mapping and
//! expects their canonical JSON form (an RFC 3339 string for `Timestamp`). Such nodes carry a
//! `format` hint naming the form a payload must use:
//!
//! | Message                     | `format`    | Payload example          |
//! |-----------------------------|-------------|--------------------------|
//! | `google.protobuf.Timestamp` | `date-time` | `"2024-01-01T00:00:00Z"` |
//! | `google.protobuf.Duration`  | `duration`  | `"1.5s"`                 |
//!
//! ## Cycles
//!
//! Message types may reference themselves, directly or through other messages. The compiler
//! tracks the messages on the current expansion path; when one shows up again it emits a
//! collapsed object node carrying `$ref` (the message's fully qualified name) instead of
//! expanding it. An optional depth limit ([`SchemaConfig::max_depth`]) cuts expansion
//! further and marks the cut nodes with `truncated`.
use crate::{catalog::MethodEntry, config::SchemaConfig};
use prost_reflect::{FieldDescriptor, Kind, MessageDescriptor};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaKind {
    Object,
    Array,
    String,
    Number,
    Integer,
    Boolean,
    Null,
}

/// Presentation hints for object nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SchemaOptions {
    /// Nested objects start collapsed, the root object doesn't.
    pub collapsed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaNode {
    #[serde(rename = "type")]
    pub kind: SchemaKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "enum", skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<SchemaNode>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, SchemaNode>,
    #[serde(
        rename = "additionalProperties",
        skip_serializing_if = "Option::is_none"
    )]
    pub additional_properties: Option<Box<SchemaNode>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<SchemaOptions>,
    /// Canonical JSON form of a well-known type, which replaces the structural `properties`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<&'static str>,
    /// Fully qualified name of a message already being expanded higher up the tree.
    #[serde(rename = "$ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
}

impl SchemaNode {
    pub fn new(kind: SchemaKind) -> Self {
        Self {
            kind,
            title: None,
            description: None,
            enum_values: Vec::new(),
            items: None,
            properties: BTreeMap::new(),
            additional_properties: None,
            options: None,
            format: None,
            reference: None,
            truncated: false,
        }
    }

    fn object(message: &MessageDescriptor, collapsed: bool) -> Self {
        Self {
            title: Some(message.name().to_string()),
            description: Some(message.full_name().to_string()),
            options: Some(SchemaOptions { collapsed }),
            ..Self::new(SchemaKind::Object)
        }
    }

    fn field(kind: SchemaKind, field: &FieldDescriptor) -> Self {
        Self {
            title: Some(field.name().to_string()),
            description: Some(type_name(field).to_string()),
            ..Self::new(kind)
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.options.is_some_and(|o| o.collapsed)
    }
}

/// Input and output schemas of a method.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodSchema {
    pub input: SchemaNode,
    pub output: SchemaNode,
}

/// Stateless compiler; each call produces a fresh tree.
#[derive(Debug, Clone, Default)]
pub struct SchemaCompiler {
    max_depth: Option<usize>,
}

impl SchemaCompiler {
    pub fn new(config: &SchemaConfig) -> Self {
        Self {
            max_depth: config.max_depth,
        }
    }

    /// Compiles a message. `is_root` controls whether the resulting object is shown expanded.
    pub fn compile(&self, message: &MessageDescriptor, is_root: bool) -> SchemaNode {
        let mut path = Vec::new();
        self.compile_message(message, is_root, &mut path)
    }

    pub fn compile_method(&self, method: &MethodEntry) -> MethodSchema {
        MethodSchema {
            input: self.compile(&method.input(), true),
            output: self.compile(&method.output(), true),
        }
    }

    fn compile_message(
        &self,
        message: &MessageDescriptor,
        is_root: bool,
        path: &mut Vec<String>,
    ) -> SchemaNode {
        let mut node = SchemaNode::object(message, !is_root);

        if path.iter().any(|name| name == message.full_name()) {
            node.reference = Some(message.full_name().to_string());
            return node;
        }

        if self.max_depth.is_some_and(|max| path.len() > max) {
            node.truncated = true;
            return node;
        }

        path.push(message.full_name().to_string());
        for field in message.fields() {
            let schema = self.compile_field(&field, path);
            node.properties.insert(field.json_name().to_string(), schema);
        }
        path.pop();

        node
    }

    fn compile_field(&self, field: &FieldDescriptor, path: &mut Vec<String>) -> SchemaNode {
        if field.is_map() {
            let value = match field.kind() {
                Kind::Message(entry) => self.compile_single(&entry.map_entry_value_field(), path),
                _ => SchemaNode::new(SchemaKind::Null),
            };

            return SchemaNode {
                title: Some(field.name().to_string()),
                description: Some("map".to_string()),
                additional_properties: Some(Box::new(value)),
                ..SchemaNode::new(SchemaKind::Object)
            };
        }

        let single = self.compile_single(field, path);

        if field.is_list() {
            return SchemaNode {
                items: Some(Box::new(single)),
                ..SchemaNode::field(SchemaKind::Array, field)
            };
        }

        single
    }

    /// Schema of one value of the field, ignoring whether the field is repeated.
    fn compile_single(&self, field: &FieldDescriptor, path: &mut Vec<String>) -> SchemaNode {
        match field.kind() {
            Kind::Message(message) => {
                let mut node = self.compile_message(&message, false, path);
                node.description = Some(type_name(field).to_string());
                node.format = well_known_format(message.full_name());
                node
            }
            Kind::Enum(enum_descriptor) => SchemaNode {
                enum_values: enum_descriptor
                    .values()
                    .map(|v| v.name().to_string())
                    .collect(),
                ..SchemaNode::field(SchemaKind::String, field)
            },
            Kind::Bool => SchemaNode::field(SchemaKind::Boolean, field),
            Kind::Double | Kind::Float => SchemaNode::field(SchemaKind::Number, field),
            Kind::Int32
            | Kind::Int64
            | Kind::Uint32
            | Kind::Uint64
            | Kind::Sint32
            | Kind::Sint64
            | Kind::Fixed32
            | Kind::Fixed64
            | Kind::Sfixed32
            | Kind::Sfixed64 => SchemaNode::field(SchemaKind::Integer, field),
            Kind::String | Kind::Bytes => SchemaNode::field(SchemaKind::String, field),
        }
    }
}

fn well_known_format(full_name: &str) -> Option<&'static str> {
    match full_name {
        "google.protobuf.Timestamp" => Some("date-time"),
        "google.protobuf.Duration" => Some("duration"),
        _ => None,
    }
}

/// Lower-case `.proto` type name of a field (e.g. `sfixed64`, `enum`, `message`).
fn type_name(field: &FieldDescriptor) -> &'static str {
    match field.kind() {
        Kind::Double => "double",
        Kind::Float => "float",
        Kind::Int32 => "int32",
        Kind::Int64 => "int64",
        Kind::Uint32 => "uint32",
        Kind::Uint64 => "uint64",
        Kind::Sint32 => "sint32",
        Kind::Sint64 => "sint64",
        Kind::Fixed32 => "fixed32",
        Kind::Fixed64 => "fixed64",
        Kind::Sfixed32 => "sfixed32",
        Kind::Sfixed64 => "sfixed64",
        Kind::Bool => "bool",
        Kind::String => "string",
        Kind::Bytes => "bytes",
        Kind::Enum(_) => "enum",
        Kind::Message(_) if field.is_group() => "group",
        Kind::Message(_) => "message",
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use prost_reflect::DescriptorPool;

    fn message(name: &str) -> MessageDescriptor {
        DescriptorPool::decode(greeter_service::FILE_DESCRIPTOR_SET)
            .unwrap()
            .get_message_by_name(name)
            .unwrap()
    }

    fn specimen_schema() -> SchemaNode {
        SchemaCompiler::default().compile(&message("helloworld.Specimen"), true)
    }

    #[test]
    fn hello_request_schema() {
        let schema = SchemaCompiler::default().compile(&message("helloworld.HelloRequest"), true);

        assert_eq!(
            serde_json::to_value(&schema).unwrap(),
            serde_json::json!({
                "type": "object",
                "title": "HelloRequest",
                "description": "helloworld.HelloRequest",
                "options": { "collapsed": false },
                "properties": {
                    "name": { "type": "string", "title": "name", "description": "string" }
                }
            })
        );
    }

    #[test]
    fn property_count_matches_declared_fields() {
        for name in [
            "helloworld.HelloRequest",
            "helloworld.GetVersionRequest",
            "helloworld.Specimen",
            "helloworld.Specimen.Tag",
        ] {
            let descriptor = message(name);
            let schema = SchemaCompiler::default().compile(&descriptor, true);
            assert_eq!(schema.properties.len(), descriptor.fields().count(), "{name}");
        }
    }

    #[test]
    fn scalar_kinds_follow_the_mapping_table() {
        let schema = specimen_schema();
        let kind_of = |key: &str| schema.properties[key].kind;

        assert_eq!(kind_of("flag"), SchemaKind::Boolean);
        assert_eq!(kind_of("ratio"), SchemaKind::Number);
        assert_eq!(kind_of("weight"), SchemaKind::Number);
        for key in [
            "small",
            "big",
            "smallUnsigned",
            "bigUnsigned",
            "zigzag",
            "fixedSigned",
            "fixedUnsigned",
        ] {
            assert_eq!(kind_of(key), SchemaKind::Integer, "{key}");
        }
        assert_eq!(kind_of("label"), SchemaKind::String);
        assert_eq!(kind_of("blob"), SchemaKind::String);
        assert_eq!(kind_of("mood"), SchemaKind::String);
        assert_eq!(kind_of("primaryTag"), SchemaKind::Object);

        assert_eq!(
            schema.properties["fixedSigned"].description.as_deref(),
            Some("sfixed64")
        );
        assert_eq!(
            schema.properties["smallUnsigned"].title.as_deref(),
            Some("small_unsigned")
        );
    }

    #[test]
    fn enum_values_are_listed_in_declaration_order() {
        let schema = specimen_schema();

        assert_eq!(
            schema.properties["mood"].enum_values,
            vec!["MOOD_UNSPECIFIED", "MOOD_HAPPY", "MOOD_GRUMPY"]
        );
    }

    #[test]
    fn repeated_fields_wrap_the_singular_schema() {
        let compiler = SchemaCompiler::default();
        let specimen = message("helloworld.Specimen");
        let schema = compiler.compile(&specimen, true);

        for (name, key) in [("aliases", "aliases"), ("moods", "moods"), ("tags", "tags")] {
            let field = specimen.get_field_by_name(name).unwrap();
            let mut path = vec![specimen.full_name().to_string()];
            let single = compiler.compile_single(&field, &mut path);

            let node = &schema.properties[key];
            assert_eq!(node.kind, SchemaKind::Array, "{name}");
            assert_eq!(node.title.as_deref(), Some(name));
            assert_eq!(node.items.as_deref(), Some(&single), "{name}");
        }
    }

    #[test]
    fn nested_messages_are_collapsed_and_described_by_type() {
        let schema = specimen_schema();
        assert!(!schema.is_collapsed());

        let tag = &schema.properties["primaryTag"];
        assert!(tag.is_collapsed());
        assert_eq!(tag.title.as_deref(), Some("Tag"));
        assert_eq!(tag.description.as_deref(), Some("message"));
        assert_eq!(tag.properties.len(), 2);
    }

    #[test]
    fn self_references_become_ref_markers() {
        let schema = specimen_schema();

        let parent = &schema.properties["parent"];
        assert_eq!(parent.reference.as_deref(), Some("helloworld.Specimen"));
        assert!(parent.properties.is_empty());
        assert!(parent.is_collapsed());

        let child = schema.properties["children"].items.as_deref().unwrap();
        assert_eq!(child.reference.as_deref(), Some("helloworld.Specimen"));

        let json = serde_json::to_value(parent).unwrap();
        assert_eq!(json["$ref"], "helloworld.Specimen");
    }

    #[test]
    fn map_fields_compile_to_additional_properties() {
        let schema = specimen_schema();

        let counters = &schema.properties["counters"];
        assert_eq!(counters.kind, SchemaKind::Object);
        assert!(counters.properties.is_empty());
        assert_eq!(
            counters.additional_properties.as_deref().map(|v| v.kind),
            Some(SchemaKind::Integer)
        );
    }

    #[test]
    fn well_known_types_carry_their_json_format() {
        let schema = specimen_schema();

        let observed_at = &schema.properties["observedAt"];
        assert_eq!(observed_at.format, Some("date-time"));
        assert_eq!(
            serde_json::to_value(observed_at).unwrap()["format"],
            serde_json::json!("date-time")
        );

        // Plain messages have no canonical string form
        assert_eq!(schema.properties["parent"].format, None);
        assert!(
            serde_json::to_value(&schema.properties["parent"])
                .unwrap()
                .get("format")
                .is_none()
        );
    }

    #[test]
    fn depth_limit_truncates_nested_messages() {
        let compiler = SchemaCompiler::new(&SchemaConfig { max_depth: Some(0) });
        let schema = compiler.compile(&message("helloworld.Specimen"), true);

        let tag = &schema.properties["primaryTag"];
        assert!(tag.truncated);
        assert!(tag.properties.is_empty());
        assert_eq!(schema.properties["label"].kind, SchemaKind::String);

        let compiler = SchemaCompiler::new(&SchemaConfig { max_depth: Some(1) });
        let schema = compiler.compile(&message("helloworld.Specimen"), true);
        assert!(!schema.properties["primaryTag"].truncated);
        assert_eq!(schema.properties["primaryTag"].properties.len(), 2);
    }
}
