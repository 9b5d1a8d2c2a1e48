//! `amplitude://` resources.
//!
//! A resource URI is just another way to name a tool call: reading one
//! reparses the URI into that tool's arguments and runs the same operation.

use serde_json::{json, Value};

use crate::error::{AmplitudeError, Result};

pub const SCHEME: &str = "amplitude://";

pub struct ResourceTemplate {
    pub uri_template: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub tool: &'static str,
}

/// Fixed URIs, listed by `resources/list`
pub const RESOURCES: &[ResourceTemplate] = &[
    ResourceTemplate {
        uri_template: "amplitude://events",
        name: "Event types",
        description: "Visible event types with this week's totals",
        tool: "list_events",
    },
    ResourceTemplate {
        uri_template: "amplitude://annotations",
        name: "Annotations",
        description: "All chart annotations in the project",
        tool: "list_annotations",
    },
];

/// Parameterized URIs, listed by `resources/templates/list`
pub const TEMPLATES: &[ResourceTemplate] = &[
    ResourceTemplate {
        uri_template: "amplitude://annotations/{id}",
        name: "Annotation",
        description: "A single chart annotation",
        tool: "get_annotation",
    },
    ResourceTemplate {
        uri_template: "amplitude://charts/{chartId}",
        name: "Saved chart",
        description: "Results of a saved chart",
        tool: "get_chart",
    },
    ResourceTemplate {
        uri_template: "amplitude://users/{user}/activity",
        name: "User activity",
        description: "Event stream for an Amplitude ID",
        tool: "get_user_activity",
    },
    ResourceTemplate {
        uri_template: "amplitude://users/search/{user}",
        name: "User search",
        description: "Amplitude IDs matching a user ID or device ID",
        tool: "search_users",
    },
    ResourceTemplate {
        uri_template: "amplitude://export/{start}/{end}",
        name: "Raw event export",
        description: "Exported events between two hours (YYYYMMDDTHH)",
        tool: "export_events",
    },
];

impl ResourceTemplate {
    pub fn resource_definition(&self) -> Value {
        json!({
            "uri": self.uri_template,
            "name": self.name,
            "description": self.description,
            "mimeType": "application/json",
        })
    }

    pub fn template_definition(&self) -> Value {
        json!({
            "uriTemplate": self.uri_template,
            "name": self.name,
            "description": self.description,
            "mimeType": "application/json",
        })
    }
}

/// Numeric ids are passed through as numbers so integer fields validate.
fn id_value(segment: &str) -> Value {
    segment
        .parse::<i64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::from(segment))
}

fn decode_segment(segment: &str) -> Result<String> {
    urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .map_err(|_| {
            AmplitudeError::validation("uri", "segment is not valid percent-encoded UTF-8")
        })
}

/// Map a resource URI to `(tool name, arguments)`. Path segments are
/// percent-decoded, so `users/search/alice%40example.com` searches for
/// `alice@example.com`.
pub fn resolve(uri: &str) -> Result<(&'static str, Value)> {
    let unknown = || AmplitudeError::validation("uri", format!("unknown resource '{}'", uri));

    let rest = uri.strip_prefix(SCHEME).ok_or_else(unknown)?;
    let rest = rest.split(['?', '#']).next().unwrap_or_default();
    let segments = rest
        .split('/')
        .filter(|s| !s.is_empty())
        .map(decode_segment)
        .collect::<Result<Vec<_>>>()?;
    let segments: Vec<&str> = segments.iter().map(String::as_str).collect();

    let resolved = match segments.as_slice() {
        ["events"] => ("list_events", json!({})),
        ["annotations"] => ("list_annotations", json!({})),
        ["annotations", id] => ("get_annotation", json!({ "id": id_value(id) })),
        ["charts", id] => ("get_chart", json!({ "chartId": id })),
        ["users", "search", user] => ("search_users", json!({ "user": user })),
        ["users", user, "activity"] => ("get_user_activity", json!({ "user": user })),
        ["export", start, end] => ("export_events", json!({ "start": start, "end": end })),
        _ => return Err(unknown()),
    };
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::tools;

    #[test]
    fn test_resolve_known_uris() {
        assert_eq!(resolve("amplitude://events").unwrap(), ("list_events", json!({})));
        assert_eq!(
            resolve("amplitude://annotations/42").unwrap(),
            ("get_annotation", json!({"id": 42}))
        );
        assert_eq!(
            resolve("amplitude://users/12345/activity").unwrap(),
            ("get_user_activity", json!({"user": "12345"}))
        );
        assert_eq!(
            resolve("amplitude://users/search/alice@example.com").unwrap(),
            ("search_users", json!({"user": "alice@example.com"}))
        );
        assert_eq!(
            resolve("amplitude://export/20240101T00/20240101T05").unwrap(),
            (
                "export_events",
                json!({"start": "20240101T00", "end": "20240101T05"})
            )
        );
    }

    #[test]
    fn test_resolve_rejects_unknown() {
        assert!(resolve("amplitude://cohorts").is_err());
        assert!(resolve("https://amplitude.com/events").is_err());
        assert!(resolve("amplitude://charts").is_err());
    }

    #[test]
    fn test_resolve_percent_decodes_segments() {
        assert_eq!(
            resolve("amplitude://users/search/alice%40example.com").unwrap(),
            ("search_users", json!({"user": "alice@example.com"}))
        );
        assert_eq!(
            resolve("amplitude://users/device%20one/activity").unwrap(),
            ("get_user_activity", json!({"user": "device one"}))
        );
        assert_eq!(
            resolve("amplitude://charts/ab%2Fcd").unwrap(),
            ("get_chart", json!({"chartId": "ab/cd"}))
        );

        // %FF is not UTF-8
        let err = resolve("amplitude://users/search/%FF").unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_every_resource_points_at_a_tool() {
        for r in RESOURCES.iter().chain(TEMPLATES) {
            assert!(tools::find(r.tool).is_some(), "{}", r.uri_template);
        }
    }
}
