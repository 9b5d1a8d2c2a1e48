//! Request builder: one function per Amplitude operation.
//!
//! Each function turns already-validated parameters into an [`ApiRequest`].
//! Optional parameters are appended only when present, and list-valued
//! parameters become repeated keys in input order.

use reqwest::Method;
use serde_json::json;

use crate::models::{
    ActiveUsersParams, AnnotationParams, ChartParams, CreateAnnotationParams,
    EventSegmentationParams, ExportParams, FunnelParams, QueryEventsParams, RetentionParams,
    UserActivityParams, UserSearchParams,
};

/// How a successful response body is decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// Plain JSON document
    Json,
    /// Gzip-compressed newline-delimited JSON with export status semantics
    Export,
}

/// A fully shaped call against the Amplitude API, independent of the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    /// Operation name used in logs and transport error messages
    pub operation: &'static str,
    pub method: Method,
    /// Path segments below the host, e.g. `["api", "2", "export"]`
    pub segments: Vec<String>,
    pub query: Vec<(&'static str, String)>,
    pub response: ResponseKind,
    /// Error bodies are `{error, code?, message?}` JSON documents
    pub structured_errors: bool,
}

impl ApiRequest {
    fn new(operation: &'static str, method: Method, path: &str) -> Self {
        Self {
            operation,
            method,
            segments: path
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            query: Vec::new(),
            response: ResponseKind::Json,
            structured_errors: false,
        }
    }

    fn get(operation: &'static str, path: &str) -> Self {
        Self::new(operation, Method::GET, path)
    }

    fn param(mut self, key: &'static str, value: impl ToString) -> Self {
        self.query.push((key, value.to_string()));
        self
    }

    fn opt<T: ToString>(self, key: &'static str, value: Option<T>) -> Self {
        match value {
            Some(v) => self.param(key, v),
            None => self,
        }
    }

    fn repeat<T: ToString>(mut self, key: &'static str, values: &[T]) -> Self {
        self.query.extend(values.iter().map(|v| (key, v.to_string())));
        self
    }

    pub fn path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }
}

/// Segmentation query built from event definitions.
///
/// Only the first event's type is sent as `e`; later events and every
/// per-event property filter are accepted but not represented.
pub fn query_events(p: &QueryEventsParams) -> ApiRequest {
    let first = p
        .events
        .first()
        .map(|event| json!({ "event_type": event.event_type }).to_string());

    let segments = if p.filters.is_empty() {
        None
    } else {
        let conditions: Vec<_> = p.filters.iter().map(|f| f.to_segment()).collect();
        Some(serde_json::Value::Array(conditions).to_string())
    };

    let mut req = ApiRequest::get("query_events", "/api/2/events/segmentation")
        .opt("e", first)
        .param("start", &p.start)
        .param("end", &p.end)
        .opt("i", p.interval)
        .opt("g", p.group_by.as_ref())
        .repeat("g", &p.breakdowns)
        .opt("s", segments);
    req.structured_errors = true;
    req
}

pub fn export_events(p: &ExportParams) -> ApiRequest {
    let mut req = ApiRequest::get("export_events", "/api/2/export")
        .param("start", &p.start)
        .param("end", &p.end);
    req.response = ResponseKind::Export;
    req
}

pub fn get_chart(p: &ChartParams) -> ApiRequest {
    let mut req = ApiRequest::get("get_chart", "/api/3/chart");
    req.segments.push(p.chart_id.clone());
    req.segments.push("csv".to_string());
    req
}

pub fn active_users(p: &ActiveUsersParams) -> ApiRequest {
    ApiRequest::get("get_active_users", "/api/2/users")
        .param("start", &p.start)
        .param("end", &p.end)
        .opt("m", p.m.as_ref())
        .opt("i", p.i)
        .opt("s", p.s.as_ref())
        .opt("g", p.g.as_ref())
}

pub fn event_segmentation(p: &EventSegmentationParams) -> ApiRequest {
    ApiRequest::get("get_event_segmentation", "/api/2/events/segmentation")
        .param("e", &p.e)
        .param("start", &p.start)
        .param("end", &p.end)
        .opt("m", p.m.as_ref())
        .opt("i", p.i)
        .opt("s", p.s.as_ref())
        .opt("g", p.g.as_ref())
        .opt("limit", p.limit)
}

pub fn funnel(p: &FunnelParams) -> ApiRequest {
    ApiRequest::get("analyze_funnel", "/api/2/funnels")
        .repeat("e", &p.events)
        .param("start", &p.start)
        .param("end", &p.end)
        .opt("mode", p.mode.as_ref())
        .opt("i", p.i)
        .opt("s", p.s.as_ref())
        .opt("g", p.g.as_ref())
        .opt("cs", p.cs)
        .opt("limit", p.limit)
}

pub fn retention(p: &RetentionParams) -> ApiRequest {
    ApiRequest::get("analyze_retention", "/api/2/retention")
        .param("se", &p.se)
        .param("re", &p.re)
        .param("start", &p.start)
        .param("end", &p.end)
        .opt("rm", p.rm.as_ref())
        .opt("rb", p.rb.as_ref())
        .opt("i", p.i)
        .opt("s", p.s.as_ref())
        .opt("g", p.g.as_ref())
}

pub fn user_activity(p: &UserActivityParams) -> ApiRequest {
    ApiRequest::get("get_user_activity", "/api/2/useractivity")
        .param("user", &p.user)
        .opt("offset", p.offset)
        .opt("limit", p.limit)
        .opt("direction", p.direction.as_ref())
}

pub fn user_search(p: &UserSearchParams) -> ApiRequest {
    ApiRequest::get("search_users", "/api/2/usersearch").param("user", &p.user)
}

pub fn events_list() -> ApiRequest {
    ApiRequest::get("list_events", "/api/2/events/list")
}

/// Parameters travel in the query string of an empty-bodied POST, which is
/// what the annotations endpoint expects.
pub fn create_annotation(p: &CreateAnnotationParams) -> ApiRequest {
    ApiRequest::new("create_annotation", Method::POST, "/api/2/annotations")
        .param("app_id", p.app_id)
        .param("date", &p.date)
        .param("label", &p.label)
        .opt("chart_id", p.chart_id.as_ref())
        .opt("details", p.details.as_ref())
}

pub fn list_annotations() -> ApiRequest {
    ApiRequest::get("list_annotations", "/api/2/annotations")
}

pub fn get_annotation(p: &AnnotationParams) -> ApiRequest {
    ApiRequest::get("get_annotation", "/api/2/annotations").param("id", p.id)
}
