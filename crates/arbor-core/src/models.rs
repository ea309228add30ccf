//! Request models: schema definitions, references and create requests.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::ErrorMessage;
use crate::types::{ElementId, ElementKind};

// ── Schemas ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Html,
    Number,
    Boolean,
    Date,
    Node,
    List,
    Binary,
}

/// One field of a schema definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FieldSchema {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
}

impl FieldSchema {
    pub fn new(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.to_string(),
            label: None,
            field_type,
            required: false,
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Structural definition stored, immutably, in every schema version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SchemaDefinition {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub display_field: Option<String>,
    #[serde(default)]
    pub segment_field: Option<String>,
    /// Whether nodes of this schema may have children.
    #[serde(default)]
    pub container: bool,
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
}

impl SchemaDefinition {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: None,
            display_field: None,
            segment_field: None,
            container: false,
            fields: Vec::new(),
        }
    }

    pub fn with_display_field(mut self, field: &str) -> Self {
        self.display_field = Some(field.to_string());
        self
    }

    pub fn with_segment_field(mut self, field: &str) -> Self {
        self.segment_field = Some(field.to_string());
        self
    }

    pub fn with_field(mut self, field: FieldSchema) -> Self {
        self.fields.push(field);
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Structural validation performed before any container or version is written.
    ///
    /// The display field must be present and non-empty. When fields are
    /// declared, display and segment fields must name one of them and field
    /// names must be unique.
    pub fn validate(&self) -> Result<(), ErrorMessage> {
        if self.name.trim().is_empty() {
            return Err(ErrorMessage::key("schema_missing_name"));
        }

        let display_field = match self.display_field.as_deref() {
            Some(f) if !f.trim().is_empty() => f,
            _ => return Err(ErrorMessage::key("schema_error_displayfield_missing")),
        };

        let mut seen = HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(ErrorMessage::new(
                    "schema_error_duplicate_field_name",
                    [field.name.as_str()],
                ));
            }
        }

        if !self.fields.is_empty() {
            if self.field(display_field).is_none() {
                return Err(ErrorMessage::new(
                    "schema_error_displayfield_invalid",
                    [display_field],
                ));
            }
            if let Some(segment) = self.segment_field.as_deref() {
                if self.field(segment).is_none() {
                    return Err(ErrorMessage::new(
                        "schema_error_segmentfield_invalid",
                        [segment],
                    ));
                }
            }
        }

        Ok(())
    }
}

/// Points at a schema container and optionally one of its revisions.
///
/// A name takes precedence over a uuid; without a version the latest
/// revision is meant.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaReference {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub uuid: Option<ElementId>,
    #[serde(default)]
    pub version: Option<u32>,
}

impl SchemaReference {
    pub fn by_name(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    pub fn by_uuid(uuid: ElementId) -> Self {
        Self {
            uuid: Some(uuid),
            ..Default::default()
        }
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = Some(version);
        self
    }
}

// ── Create Requests ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectCreateRequest {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserCreateRequest {
    pub username: String,
    #[serde(default)]
    pub admin: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagFamilyCreateRequest {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagCreateRequest {
    pub name: String,
    pub tag_family: ElementId,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeCreateRequest {
    pub schema: SchemaReference,
    #[serde(default)]
    pub parent: Option<ElementId>,
    #[serde(default)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

/// Payload for a collection root's create hook, one variant per member kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CreateRequest {
    Project(ProjectCreateRequest),
    User(UserCreateRequest),
    Schema(SchemaDefinition),
    TagFamily(TagFamilyCreateRequest),
    Tag(TagCreateRequest),
    Node(NodeCreateRequest),
}

impl CreateRequest {
    /// Kind of the element the request creates.
    pub fn kind(&self) -> ElementKind {
        match self {
            Self::Project(_) => ElementKind::Project,
            Self::User(_) => ElementKind::User,
            Self::Schema(_) => ElementKind::SchemaContainer,
            Self::TagFamily(_) => ElementKind::TagFamily,
            Self::Tag(_) => ElementKind::Tag,
            Self::Node(_) => ElementKind::Node,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content_schema() -> SchemaDefinition {
        SchemaDefinition::new("content")
            .with_display_field("title")
            .with_segment_field("filename")
            .with_field(FieldSchema::new("name", FieldType::String).required())
            .with_field(FieldSchema::new("filename", FieldType::String))
            .with_field(FieldSchema::new("title", FieldType::String).with_label("Title"))
            .with_field(FieldSchema::new("content", FieldType::Html))
    }

    #[test]
    fn valid_schema_passes() {
        assert!(content_schema().validate().is_ok());
    }

    #[test]
    fn display_field_is_required() {
        let mut schema = content_schema();
        schema.display_field = Some(String::new());
        let err = schema.validate().unwrap_err();
        assert_eq!(err.key, "schema_error_displayfield_missing");

        schema.display_field = None;
        assert_eq!(
            schema.validate().unwrap_err().key,
            "schema_error_displayfield_missing"
        );
    }

    #[test]
    fn display_and_segment_fields_must_exist() {
        let schema = content_schema().with_display_field("subtitle");
        assert_eq!(
            schema.validate().unwrap_err().key,
            "schema_error_displayfield_invalid"
        );

        let schema = content_schema().with_segment_field("slug");
        assert_eq!(
            schema.validate().unwrap_err().key,
            "schema_error_segmentfield_invalid"
        );
    }

    #[test]
    fn duplicate_field_names_rejected() {
        let schema = content_schema().with_field(FieldSchema::new("title", FieldType::Html));
        let err = schema.validate().unwrap_err();
        assert_eq!(err.key, "schema_error_duplicate_field_name");
        assert_eq!(err.params, vec!["title".to_string()]);
    }

    #[test]
    fn schema_json_uses_camel_case() {
        let json = serde_json::to_value(content_schema()).unwrap();
        assert_eq!(json["displayField"], "title");
        assert_eq!(json["fields"][0]["type"], "string");
    }

    #[test]
    fn create_request_tagged_by_type() {
        let req: CreateRequest =
            serde_json::from_str(r#"{"type":"project","name":"alpha"}"#).unwrap();
        assert_eq!(req.kind(), ElementKind::Project);
        assert_eq!(
            req,
            CreateRequest::Project(ProjectCreateRequest {
                name: "alpha".to_string()
            })
        );
    }
}
