//! MCP tools.
//!
//! Every Amplitude operation is a unit struct implementing [`Operation`]:
//! its schema, how validated parameters become an [`ApiRequest`], and how a
//! decoded payload is summarized. A single generic [`run`] drives all of
//! them, and [`tools`] is the table the server dispatches on.

use std::sync::OnceLock;
use std::time::Instant;

use futures::future::BoxFuture;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::api::{request, AmplitudeClient, ApiRequest, Payload};
use crate::error::Result;
use crate::models::{
    self, ActiveUsersParams, AnnotationParams, ChartParams, CreateAnnotationParams,
    EventSegmentationParams, ExportParams, FunnelParams, NoParams, QueryEventsParams,
    RetentionParams, UserActivityParams, UserSearchParams,
};

/// Successful tool result: a one-line summary plus the JSON payload
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub summary: String,
    pub data: Value,
}

pub trait Operation: Send + Sync + 'static {
    const NAME: &'static str;
    const DESCRIPTION: &'static str;
    type Params: models::Params + Send + Sync;

    fn input_schema() -> Value;

    fn request(params: &Self::Params) -> ApiRequest;

    fn summary(params: &Self::Params, data: &Value) -> String;

    fn output(params: &Self::Params, payload: Payload) -> ToolOutput {
        let data = payload.into_json();
        ToolOutput {
            summary: Self::summary(params, &data),
            data,
        }
    }
}

/// Validate arguments, call Amplitude once, and shape the result.
pub async fn run<O: Operation>(client: &AmplitudeClient, args: &Value) -> Result<ToolOutput> {
    let params = <O::Params as models::Params>::parse(args)?;
    let request = O::request(&params);
    let payload = client.execute(&request).await?;
    Ok(O::output(&params, payload))
}

pub struct ToolEntry {
    pub name: &'static str,
    pub description: &'static str,
    input_schema: fn() -> Value,
    invoke: for<'a> fn(&'a AmplitudeClient, &'a Value) -> BoxFuture<'a, Result<ToolOutput>>,
}

impl ToolEntry {
    fn of<O: Operation>() -> Self {
        fn invoke<'a, Op: Operation>(
            client: &'a AmplitudeClient,
            args: &'a Value,
        ) -> BoxFuture<'a, Result<ToolOutput>> {
            Box::pin(run::<Op>(client, args))
        }

        Self {
            name: O::NAME,
            description: O::DESCRIPTION,
            input_schema: O::input_schema,
            invoke: invoke::<O>,
        }
    }

    pub fn input_schema(&self) -> Value {
        (self.input_schema)()
    }

    /// Entry as advertised by `tools/list`
    pub fn definition(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.input_schema(),
        })
    }

    pub async fn call(&self, client: &AmplitudeClient, args: &Value) -> Result<ToolOutput> {
        let started = Instant::now();
        let result = (self.invoke)(client, args).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => info!(tool = self.name, elapsed_ms, "tool call finished"),
            Err(e) => warn!(
                tool = self.name,
                elapsed_ms,
                status = e.status(),
                error = %e,
                "tool call failed"
            ),
        }
        result
    }
}

static TOOLS: OnceLock<Vec<ToolEntry>> = OnceLock::new();

pub fn tools() -> &'static [ToolEntry] {
    TOOLS.get_or_init(|| {
        vec![
            ToolEntry::of::<QueryEvents>(),
            ToolEntry::of::<ExportEvents>(),
            ToolEntry::of::<GetChart>(),
            ToolEntry::of::<GetActiveUsers>(),
            ToolEntry::of::<GetEventSegmentation>(),
            ToolEntry::of::<AnalyzeFunnel>(),
            ToolEntry::of::<AnalyzeRetention>(),
            ToolEntry::of::<GetUserActivity>(),
            ToolEntry::of::<SearchUsers>(),
            ToolEntry::of::<ListEvents>(),
            ToolEntry::of::<CreateAnnotation>(),
            ToolEntry::of::<ListAnnotations>(),
            ToolEntry::of::<GetAnnotation>(),
        ]
    })
}

pub fn find(name: &str) -> Option<&'static ToolEntry> {
    tools().iter().find(|t| t.name == name)
}

// ============================================================================
// Schema fragments
// ============================================================================

/// Identifiers arrive as strings or bare numbers
const ID_TYPES: &[&str] = &["string", "integer"];
/// JSON definitions arrive serialized or inline
const JSON_TEXT_TYPES: &[&str] = &["string", "object", "array"];

fn object(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn date_field(description: &str) -> Value {
    json!({
        "type": "string",
        "pattern": models::DATE_PATTERN,
        "description": format!("{} (YYYYMMDD)", description),
    })
}

fn interval_field(allowed: &[i64]) -> Value {
    json!({
        "type": "integer",
        "enum": allowed,
        "description": "Interval: -300000 realtime, -3600000 hourly, 1 daily, 7 weekly, 30 monthly",
    })
}

fn choice_field(allowed: &[&str], description: &str) -> Value {
    json!({ "type": "string", "enum": allowed, "description": description })
}

fn limit_field(description: &str) -> Value {
    json!({
        "type": "integer",
        "minimum": 1,
        "maximum": models::MAX_RESULT_LIMIT,
        "description": description,
    })
}

fn segment_field() -> Value {
    json!({
        "type": JSON_TEXT_TYPES,
        "description": concat!(
            "Segment definition as JSON, e.g. ",
            "[{\"prop\":\"country\",\"op\":\"is\",\"values\":[\"United States\"]}]"
        ),
    })
}

fn group_by_field() -> Value {
    json!({ "type": "string", "description": "Property to group by, e.g. 'country' or 'gp:plan'" })
}

fn event_json_field(description: &str) -> Value {
    json!({
        "type": JSON_TEXT_TYPES,
        "description": format!(
            "{} as a JSON event definition, e.g. {{\"event_type\":\"Purchase\"}}",
            description
        ),
    })
}

fn property_filter_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "propertyName": { "type": "string" },
            "value": {
                "oneOf": [
                    { "type": "string" },
                    { "type": "number" },
                    { "type": "boolean" },
                    { "type": "array", "items": { "type": ["string", "number", "boolean"] } }
                ]
            },
            "op": { "type": "string", "enum": models::FilterOp::ALL }
        },
        "required": ["propertyName", "value", "op"]
    })
}

fn count_of(data: &Value, key: &str) -> Option<usize> {
    data.get(key).and_then(Value::as_array).map(Vec::len)
}

// ============================================================================
// Operations
// ============================================================================

pub struct QueryEvents;

impl Operation for QueryEvents {
    const NAME: &'static str = "query_events";
    const DESCRIPTION: &'static str =
        "Query event segmentation data for an event over a date range. \
        Only the first event definition is sent to Amplitude; additional events and per-event \
        property filters are accepted but not applied.";
    type Params = QueryEventsParams;

    fn input_schema() -> Value {
        object(
            json!({
                "events": {
                    "type": "array",
                    "minItems": 1,
                    "items": {
                        "type": "object",
                        "properties": {
                            "eventType": { "type": "string" },
                            "propertyFilters": {
                                "type": "array",
                                "items": property_filter_schema()
                            }
                        },
                        "required": ["eventType"]
                    }
                },
                "start": date_field("Start date"),
                "end": date_field("End date"),
                "interval": interval_field(models::INTERVALS),
                "groupBy": group_by_field(),
                "filters": { "type": "array", "items": property_filter_schema() },
                "breakdowns": { "type": "array", "items": { "type": "string" } }
            }),
            &["events", "start", "end"],
        )
    }

    fn request(params: &Self::Params) -> ApiRequest {
        request::query_events(params)
    }

    fn summary(params: &Self::Params, _data: &Value) -> String {
        let event = params
            .events
            .first()
            .map(|e| e.event_type.as_str())
            .unwrap_or_default();
        let mut summary = format!(
            "Event segmentation for '{}' from {} to {}",
            event, params.start, params.end
        );
        if params.events.len() > 1 {
            summary.push_str(&format!(
                " ({} additional event(s) not queried)",
                params.events.len() - 1
            ));
        }
        summary
    }
}

pub struct ExportEvents;

impl Operation for ExportEvents {
    const NAME: &'static str = "export_events";
    const DESCRIPTION: &'static str = "Export raw events for a time range (hour granularity). \
        Amplitude caps an export at about 4GB; results are truncated client-side to `limit` \
        records (default 1000).";
    type Params = ExportParams;

    fn input_schema() -> Value {
        let hour = |label: &str| {
            json!({
                "type": "string",
                "pattern": models::EXPORT_HOUR_PATTERN,
                "description": format!("{} hour (YYYYMMDDTHH, 24-hour clock)", label),
            })
        };
        object(
            json!({
                "start": hour("First"),
                "end": hour("Last"),
                "limit": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "Maximum number of events to return (default 1000)"
                }
            }),
            &["start", "end"],
        )
    }

    fn request(params: &Self::Params) -> ApiRequest {
        request::export_events(params)
    }

    fn summary(params: &Self::Params, data: &Value) -> String {
        let returned = data["returned_records"].as_u64().unwrap_or(0);
        let total = data["total_records"].as_u64().unwrap_or(0);
        let mut summary = format!(
            "Exported {} of {} events from {} to {}",
            returned, total, params.start, params.end
        );
        if let Some(skipped) = data["skipped_lines"].as_u64().filter(|n| *n > 0) {
            summary.push_str(&format!(" ({} malformed lines skipped)", skipped));
        }
        summary
    }

    fn output(params: &Self::Params, payload: Payload) -> ToolOutput {
        let page = match payload {
            Payload::Export(batch) => batch.into_page(params.effective_limit()),
            Payload::Json(value) => crate::api::ExportBatch {
                records: value.as_array().cloned().unwrap_or_default(),
                skipped_lines: 0,
            }
            .into_page(params.effective_limit()),
        };
        let data = serde_json::to_value(&page).unwrap_or(Value::Null);
        ToolOutput {
            summary: Self::summary(params, &data),
            data,
        }
    }
}

pub struct GetChart;

impl Operation for GetChart {
    const NAME: &'static str = "get_chart";
    const DESCRIPTION: &'static str = "Get the results of a saved chart by its chart ID.";
    type Params = ChartParams;

    fn input_schema() -> Value {
        object(
            json!({
                "chartId": { "type": ID_TYPES, "description": "Chart ID from the chart URL" }
            }),
            &["chartId"],
        )
    }

    fn request(params: &Self::Params) -> ApiRequest {
        request::get_chart(params)
    }

    fn summary(params: &Self::Params, _data: &Value) -> String {
        format!("Chart {} results", params.chart_id)
    }
}

pub struct GetActiveUsers;

impl Operation for GetActiveUsers {
    const NAME: &'static str = "get_active_users";
    const DESCRIPTION: &'static str = "Get active or new user counts over a date range.";
    type Params = ActiveUsersParams;

    fn input_schema() -> Value {
        object(
            json!({
                "start": date_field("Start date"),
                "end": date_field("End date"),
                "m": choice_field(
                    models::ACTIVE_USER_METRICS,
                    "Metric: active or new users (default active)"
                ),
                "i": interval_field(models::DAY_INTERVALS),
                "s": segment_field(),
                "g": group_by_field()
            }),
            &["start", "end"],
        )
    }

    fn request(params: &Self::Params) -> ApiRequest {
        request::active_users(params)
    }

    fn summary(params: &Self::Params, _data: &Value) -> String {
        format!(
            "{} users from {} to {}",
            if params.m.as_deref() == Some("new") { "New" } else { "Active" },
            params.start,
            params.end
        )
    }
}

pub struct GetEventSegmentation;

impl Operation for GetEventSegmentation {
    const NAME: &'static str = "get_event_segmentation";
    const DESCRIPTION: &'static str =
        "Run an event segmentation query with a full JSON event definition, metric and grouping.";
    type Params = EventSegmentationParams;

    fn input_schema() -> Value {
        object(
            json!({
                "e": event_json_field("Event"),
                "start": date_field("Start date"),
                "end": date_field("End date"),
                "m": choice_field(models::SEGMENTATION_METRICS, "Metric (default uniques)"),
                "i": interval_field(models::INTERVALS),
                "s": segment_field(),
                "g": group_by_field(),
                "limit": limit_field("Number of group-by values returned (1-1000)")
            }),
            &["e", "start", "end"],
        )
    }

    fn request(params: &Self::Params) -> ApiRequest {
        request::event_segmentation(params)
    }

    fn summary(params: &Self::Params, _data: &Value) -> String {
        format!(
            "Event segmentation ({}) from {} to {}",
            params.m.as_deref().unwrap_or("uniques"),
            params.start,
            params.end
        )
    }
}

pub struct AnalyzeFunnel;

impl Operation for AnalyzeFunnel {
    const NAME: &'static str = "analyze_funnel";
    const DESCRIPTION: &'static str =
        "Analyze conversion through an ordered funnel of at least two events.";
    type Params = FunnelParams;

    fn input_schema() -> Value {
        object(
            json!({
                "events": {
                    "type": "array",
                    "minItems": 2,
                    "items": event_json_field("Funnel step"),
                    "description": "Funnel steps in order"
                },
                "start": date_field("Start date"),
                "end": date_field("End date"),
                "mode": choice_field(models::FUNNEL_MODES, "Funnel mode (default ordered)"),
                "i": interval_field(models::INTERVALS),
                "s": segment_field(),
                "g": group_by_field(),
                "cs": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": models::MAX_CONVERSION_SECONDS,
                    "description": "Conversion window in seconds (default 30 days)"
                },
                "limit": limit_field("Number of group-by values returned (1-1000)")
            }),
            &["events", "start", "end"],
        )
    }

    fn request(params: &Self::Params) -> ApiRequest {
        request::funnel(params)
    }

    fn summary(params: &Self::Params, _data: &Value) -> String {
        format!(
            "{}-step funnel from {} to {}",
            params.events.len(),
            params.start,
            params.end
        )
    }
}

pub struct AnalyzeRetention;

impl Operation for AnalyzeRetention {
    const NAME: &'static str = "analyze_retention";
    const DESCRIPTION: &'static str =
        "Analyze retention between a starting event and a returning event.";
    type Params = RetentionParams;

    fn input_schema() -> Value {
        object(
            json!({
                "se": event_json_field("Starting event"),
                "re": event_json_field("Returning event"),
                "start": date_field("Start date"),
                "end": date_field("End date"),
                "rm": choice_field(models::RETENTION_MODES, "Retention mode (default n-day)"),
                "rb": {
                    "type": "string",
                    "description": "Retention brackets as JSON, e.g. [[0,4]], for bracket mode"
                },
                "i": interval_field(models::DAY_INTERVALS),
                "s": segment_field(),
                "g": group_by_field()
            }),
            &["se", "re", "start", "end"],
        )
    }

    fn request(params: &Self::Params) -> ApiRequest {
        request::retention(params)
    }

    fn summary(params: &Self::Params, _data: &Value) -> String {
        format!(
            "Retention ({}) from {} to {}",
            params.rm.as_deref().unwrap_or("n-day"),
            params.start,
            params.end
        )
    }
}

pub struct GetUserActivity;

impl Operation for GetUserActivity {
    const NAME: &'static str = "get_user_activity";
    const DESCRIPTION: &'static str =
        "Get a user's summary and event stream by Amplitude ID (see search_users).";
    type Params = UserActivityParams;

    fn input_schema() -> Value {
        object(
            json!({
                "user": { "type": ID_TYPES, "description": "Amplitude ID of the user" },
                "offset": {
                    "type": "integer",
                    "minimum": 0,
                    "description": "Zero-indexed event offset"
                },
                "limit": limit_field("Number of events to return (1-1000)"),
                "direction": choice_field(
                    models::ACTIVITY_DIRECTIONS,
                    "Event order (default latest)"
                )
            }),
            &["user"],
        )
    }

    fn request(params: &Self::Params) -> ApiRequest {
        request::user_activity(params)
    }

    fn summary(params: &Self::Params, data: &Value) -> String {
        match count_of(data, "events") {
            Some(n) => format!("{} events for user {}", n, params.user),
            None => format!("Activity for user {}", params.user),
        }
    }
}

pub struct SearchUsers;

impl Operation for SearchUsers {
    const NAME: &'static str = "search_users";
    const DESCRIPTION: &'static str =
        "Find users by user ID, device ID or Amplitude ID; returns matching Amplitude IDs.";
    type Params = UserSearchParams;

    fn input_schema() -> Value {
        object(
            json!({
                "user": { "type": ID_TYPES, "description": "User ID, device ID or Amplitude ID" }
            }),
            &["user"],
        )
    }

    fn request(params: &Self::Params) -> ApiRequest {
        request::user_search(params)
    }

    fn summary(params: &Self::Params, data: &Value) -> String {
        format!(
            "{} match(es) for '{}'",
            count_of(data, "matches").unwrap_or(0),
            params.user
        )
    }
}

pub struct ListEvents;

impl Operation for ListEvents {
    const NAME: &'static str = "list_events";
    const DESCRIPTION: &'static str =
        "List the project's visible event types with this week's totals.";
    type Params = NoParams;

    fn input_schema() -> Value {
        object(json!({}), &[])
    }

    fn request(_params: &Self::Params) -> ApiRequest {
        request::events_list()
    }

    fn summary(_params: &Self::Params, data: &Value) -> String {
        format!("{} event types", count_of(data, "data").unwrap_or(0))
    }
}

pub struct CreateAnnotation;

impl Operation for CreateAnnotation {
    const NAME: &'static str = "create_annotation";
    const DESCRIPTION: &'static str = "Create a chart annotation marking an event on a date.";
    type Params = CreateAnnotationParams;

    fn input_schema() -> Value {
        object(
            json!({
                "app_id": { "type": "integer", "minimum": 1, "description": "Project ID" },
                "date": {
                    "type": "string",
                    "pattern": models::ISO_DATE_PATTERN,
                    "description": "Annotation date (YYYY-MM-DD)"
                },
                "label": { "type": "string", "description": "Annotation title" },
                "chart_id": {
                    "type": ID_TYPES,
                    "description": "Chart to attach the annotation to"
                },
                "details": { "type": "string", "description": "Annotation description" }
            }),
            &["app_id", "date", "label"],
        )
    }

    fn request(params: &Self::Params) -> ApiRequest {
        request::create_annotation(params)
    }

    fn summary(params: &Self::Params, _data: &Value) -> String {
        format!("Created annotation '{}' on {}", params.label, params.date)
    }
}

pub struct ListAnnotations;

impl Operation for ListAnnotations {
    const NAME: &'static str = "list_annotations";
    const DESCRIPTION: &'static str = "List all chart annotations in the project.";
    type Params = NoParams;

    fn input_schema() -> Value {
        object(json!({}), &[])
    }

    fn request(_params: &Self::Params) -> ApiRequest {
        request::list_annotations()
    }

    fn summary(_params: &Self::Params, data: &Value) -> String {
        format!("{} annotations", count_of(data, "data").unwrap_or(0))
    }
}

pub struct GetAnnotation;

impl Operation for GetAnnotation {
    const NAME: &'static str = "get_annotation";
    const DESCRIPTION: &'static str = "Get a single chart annotation by ID.";
    type Params = AnnotationParams;

    fn input_schema() -> Value {
        object(
            json!({
                "id": { "type": "integer", "minimum": 1, "description": "Annotation ID" }
            }),
            &["id"],
        )
    }

    fn request(params: &Self::Params) -> ApiRequest {
        request::get_annotation(params)
    }

    fn summary(params: &Self::Params, _data: &Value) -> String {
        format!("Annotation {}", params.id)
    }
}
