//! Error kinds and the templated message catalog.
//!
//! Every expected failure (not found, forbidden, bad request, conflict,
//! unsupported) carries an [`ErrorMessage`]: a stable key plus positional parameters.
//! `Display` renders the key's template; callers that localise messages can
//! use the key and parameters directly.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable, machine-readable classification of an error.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    BadRequest,
    Conflict,
    Unsupported,
    /// A side effect outside the storage transaction failed after commit.
    SideEffect,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotFound => "not_found",
            Self::Forbidden => "forbidden",
            Self::BadRequest => "bad_request",
            Self::Conflict => "conflict",
            Self::Unsupported => "unsupported",
            Self::SideEffect => "side_effect",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// A message key with its positional parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorMessage {
    pub key: String,
    pub params: Vec<String>,
}

impl ErrorMessage {
    pub fn new<I, S>(key: &str, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            key: key.to_string(),
            params: params.into_iter().map(Into::into).collect(),
        }
    }

    /// A message without parameters.
    pub fn key(key: &str) -> Self {
        Self::new(key, Vec::<String>::new())
    }
}

impl fmt::Display for ErrorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match template(&self.key) {
            Some(template) => f.write_str(&render(template, &self.params)),
            None if self.params.is_empty() => f.write_str(&self.key),
            None => write!(f, "{} {{{}}}", self.key, self.params.join(",")),
        }
    }
}

fn template(key: &str) -> Option<&'static str> {
    let template = match key {
        "object_not_found_for_uuid" => "Object with uuid \"{0}\" could not be found.",
        "object_not_found_for_name" => "Object with name \"{0}\" could not be found.",
        "error_missing_perm" => "Missing permission on object \"{0}\".",
        "error_invalid_uuid" => "\"{0}\" is not a valid uuid.",
        "error_uuid_taken" => "The uuid \"{0}\" is already in use.",
        "error_page_parameter_must_be_positive" => {
            "The page parameter must be a positive number but was \"{0}\"."
        }
        "error_pagesize_parameter" => {
            "The page size must be between 1 and {1} but was \"{0}\"."
        }
        "error_path_segment_unresolvable" => {
            "Can't resolve remaining segments. Next segment would be: \"{0}\"."
        }
        "error_unknown_root_segment" => "Unknown project element \"{0}\".",
        "error_request_kind_mismatch" => {
            "A \"{0}\" request can't be handled by a root holding \"{1}\" elements."
        }
        "project_missing_name" => "The name of the project must be set.",
        "project_conflicting_name" => "A project with the name \"{0}\" already exists.",
        "user_missing_username" => "The username must be set.",
        "user_conflicting_username" => "A user with the username \"{0}\" already exists.",
        "schema_missing_name" => "The name of the schema must be set.",
        "schema_conflicting_name" => "A schema with the name \"{0}\" already exists.",
        "schema_error_displayfield_missing" => "The displayField must not be empty.",
        "schema_error_displayfield_invalid" => {
            "The displayField \"{0}\" does not name a field of the schema."
        }
        "schema_error_segmentfield_invalid" => {
            "The segmentField \"{0}\" does not name a field of the schema."
        }
        "schema_error_duplicate_field_name" => "The field name \"{0}\" is used more than once.",
        "schema_delete_still_in_use" => {
            "The schema \"{0}\" can't be deleted because nodes still use it."
        }
        "error_schema_reference_not_found" => {
            "The schema reference could not be resolved. name: \"{0}\" uuid: \"{1}\" version: \"{2}\""
        }
        "tagfamily_missing_name" => "The name of the tag family must be set.",
        "tagfamily_conflicting_name" => "A tag family with the name \"{0}\" already exists.",
        "tag_missing_name" => "The name of the tag must be set.",
        "tag_conflicting_name" => "A tag with the name \"{0}\" already exists.",
        "schema_error_name_immutable" => {
            "The schema \"{0}\" can't be renamed to \"{1}\" by a new version."
        }
        "node_missing_schema" => "A schema reference must be set when creating a node.",
        "node_parent_not_container" => "The node \"{0}\" can't hold child nodes.",
        "node_missing_required_field" => "The required field \"{0}\" is missing.",
        "node_unknown_field" => "The field \"{0}\" is not part of schema \"{1}\".",
        "node_error_delete_base_node" => {
            "The base node of a project is deleted together with the project."
        }
        "error_delete_not_supported" => "Elements of type \"{0}\" can't be deleted.",
        "error_delete_with_owner" => {
            "Elements of type \"{0}\" are deleted together with their owner."
        }
        "schema_error_version_immutable" => {
            "Schema versions are immutable and can't be deleted."
        }
        _ => return None,
    };
    Some(template)
}

/// Replace `{0}`, `{1}`, ... with the matching parameter in one pass over
/// the template. Parameter text is copied verbatim, never re-scanned.
fn render(template: &str, params: &[String]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 1..];
        let placeholder = tail.find('}').and_then(|end| {
            let param = tail[..end].parse::<usize>().ok().and_then(|i| params.get(i))?;
            Some((param, end))
        });
        match placeholder {
            Some((param, end)) => {
                out.push_str(param);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_known_template() {
        let msg = ErrorMessage::new("project_conflicting_name", ["alpha"]);
        assert_eq!(
            msg.to_string(),
            "A project with the name \"alpha\" already exists."
        );
    }

    #[test]
    fn renders_multiple_parameters_in_position() {
        let msg = ErrorMessage::new("error_schema_reference_not_found", ["content", "-", "3"]);
        assert_eq!(
            msg.to_string(),
            "The schema reference could not be resolved. name: \"content\" uuid: \"-\" version: \"3\""
        );
    }

    #[test]
    fn parameters_are_not_rescanned_for_placeholders() {
        let msg = ErrorMessage::new("error_schema_reference_not_found", ["{1}", "-", "{0}"]);
        assert_eq!(
            msg.to_string(),
            "The schema reference could not be resolved. name: \"{1}\" uuid: \"-\" version: \"{0}\""
        );
    }

    #[test]
    fn placeholder_without_parameter_is_kept() {
        assert_eq!(render("a {0} b {1} {x}", &["one".to_string()]), "a one b {1} {x}");
    }

    #[test]
    fn unknown_key_falls_back_to_key_and_params() {
        assert_eq!(ErrorMessage::key("some_key").to_string(), "some_key");
        assert_eq!(
            ErrorMessage::new("some_key", ["a", "b"]).to_string(),
            "some_key {a,b}"
        );
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::BadRequest).unwrap();
        assert_eq!(json, "\"bad_request\"");
    }
}
