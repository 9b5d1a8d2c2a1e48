//! Typed parameters for the Amplitude operations.
//!
//! Tool arguments arrive as loose JSON. Every operation reads them through
//! [`Arguments`], which rejects anything that does not match the declared
//! shape with an error naming the field and the violated constraint. Only
//! fully validated parameter structs ever reach the request builder.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{AmplitudeError, Result};

/// Interval values accepted by the segmentation and funnel endpoints
pub const INTERVALS: &[i64] = &[-300000, -3600000, 1, 7, 30];
/// Interval values accepted by the users and retention endpoints
pub const DAY_INTERVALS: &[i64] = &[1, 7, 30];

pub const ACTIVE_USER_METRICS: &[&str] = &["active", "new"];
pub const SEGMENTATION_METRICS: &[&str] = &[
    "uniques",
    "totals",
    "pct_dau",
    "average",
    "histogram",
    "sums",
    "value_avg",
    "formula",
];
pub const FUNNEL_MODES: &[&str] = &["ordered", "unordered", "sequential"];
pub const RETENTION_MODES: &[&str] = &["bracket", "rolling", "n-day"];
pub const ACTIVITY_DIRECTIONS: &[&str] = &["latest", "earliest"];

pub const MAX_RESULT_LIMIT: i64 = 1000;
/// One year, the widest conversion window the funnels endpoint takes
pub const MAX_CONVERSION_SECONDS: i64 = 31_536_000;

/// ASCII digits only: `\d` in `regex` also matches other Unicode digits.
pub const DATE_PATTERN: &str = "^[0-9]{8}$";
pub const EXPORT_HOUR_PATTERN: &str = "^[0-9]{8}T([01][0-9]|2[0-3])$";
pub const ISO_DATE_PATTERN: &str = "^[0-9]{4}-[0-9]{2}-[0-9]{2}$";

static DATE_REGEX: OnceLock<Regex> = OnceLock::new();
static EXPORT_HOUR_REGEX: OnceLock<Regex> = OnceLock::new();
static ISO_DATE_REGEX: OnceLock<Regex> = OnceLock::new();

fn date_regex() -> &'static Regex {
    DATE_REGEX.get_or_init(|| Regex::new(DATE_PATTERN).expect("Invalid date regex pattern"))
}

fn export_hour_regex() -> &'static Regex {
    EXPORT_HOUR_REGEX.get_or_init(|| {
        Regex::new(EXPORT_HOUR_PATTERN).expect("Invalid export hour regex pattern")
    })
}

fn iso_date_regex() -> &'static Regex {
    ISO_DATE_REGEX
        .get_or_init(|| Regex::new(ISO_DATE_PATTERN).expect("Invalid ISO date regex pattern"))
}

// ============================================================================
// Argument access
// ============================================================================

/// Read-only view over a tool call's `arguments` object.
///
/// Absent and `null` fields are both treated as "not provided".
pub struct Arguments<'a> {
    map: Option<&'a Map<String, Value>>,
}

impl<'a> Arguments<'a> {
    pub fn new(value: &'a Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self { map: Some(map) }),
            Value::Null => Ok(Self { map: None }),
            _ => Err(AmplitudeError::validation("arguments", "must be an object")),
        }
    }

    fn get(&self, field: &str) -> Option<&'a Value> {
        self.map
            .and_then(|m| m.get(field))
            .filter(|v| !v.is_null())
    }

    pub fn str(&self, field: &str) -> Result<Option<&'a str>> {
        match self.get(field) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(AmplitudeError::validation(field, "must be a string")),
        }
    }

    pub fn required_str(&self, field: &str) -> Result<&'a str> {
        let value = self.str(field)?.ok_or_else(|| missing(field))?;
        non_empty(field, value)?;
        Ok(value)
    }

    /// Optional string that, when given, must not be blank.
    pub fn optional_str(&self, field: &str) -> Result<Option<String>> {
        match self.str(field)? {
            Some(value) => {
                non_empty(field, value)?;
                Ok(Some(value.to_string()))
            }
            None => Ok(None),
        }
    }

    /// Identifier that clients send either as a string or as a number.
    pub fn id(&self, field: &str) -> Result<Option<String>> {
        match self.get(field) {
            None => Ok(None),
            Some(Value::String(s)) => {
                non_empty(field, s)?;
                Ok(Some(s.clone()))
            }
            Some(Value::Number(n)) if n.is_i64() || n.is_u64() => Ok(Some(n.to_string())),
            Some(_) => Err(AmplitudeError::validation(
                field,
                "must be a string or an integer",
            )),
        }
    }

    pub fn required_id(&self, field: &str) -> Result<String> {
        self.id(field)?.ok_or_else(|| missing(field))
    }

    pub fn int(&self, field: &str) -> Result<Option<i64>> {
        match self.get(field) {
            None => Ok(None),
            Some(Value::Number(n)) => {
                if let Some(i) = n.as_i64() {
                    return Ok(Some(i));
                }
                match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(Some(f as i64)),
                    _ => Err(AmplitudeError::validation(field, "must be an integer")),
                }
            }
            Some(_) => Err(AmplitudeError::validation(field, "must be an integer")),
        }
    }

    pub fn required_int(&self, field: &str) -> Result<i64> {
        self.int(field)?.ok_or_else(|| missing(field))
    }

    pub fn array(&self, field: &str) -> Result<Option<&'a Vec<Value>>> {
        match self.get(field) {
            None => Ok(None),
            Some(Value::Array(items)) => Ok(Some(items)),
            Some(_) => Err(AmplitudeError::validation(field, "must be an array")),
        }
    }

    pub fn required_array(&self, field: &str, min_items: usize) -> Result<&'a Vec<Value>> {
        let items = self.array(field)?.ok_or_else(|| missing(field))?;
        if items.len() < min_items {
            return Err(AmplitudeError::validation(
                field,
                format!(
                    "at least {} item{} required",
                    min_items,
                    if min_items == 1 { "" } else { "s" }
                ),
            ));
        }
        Ok(items)
    }

    /// A JSON event/segment definition, given as a JSON string or an inline object.
    pub fn json_text(&self, field: &str) -> Result<Option<String>> {
        match self.get(field) {
            None => Ok(None),
            Some(value) => json_text_value(field, value).map(Some),
        }
    }

    pub fn required_json_text(&self, field: &str) -> Result<String> {
        self.json_text(field)?.ok_or_else(|| missing(field))
    }
}

fn missing(field: &str) -> AmplitudeError {
    AmplitudeError::validation(field, "is required")
}

fn json_text_value(field: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => {
            non_empty(field, s)?;
            match serde_json::from_str::<Value>(s) {
                Ok(Value::Object(_)) | Ok(Value::Array(_)) => Ok(s.clone()),
                _ => Err(AmplitudeError::validation(
                    field,
                    "must be a JSON object or array, inline or encoded as a string",
                )),
            }
        }
        Value::Object(_) | Value::Array(_) => Ok(value.to_string()),
        _ => Err(AmplitudeError::validation(
            field,
            "must be a JSON object or array, inline or encoded as a string",
        )),
    }
}

// ============================================================================
// Constraint checks
// ============================================================================

fn non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AmplitudeError::validation(field, "must not be empty"));
    }
    Ok(())
}

fn pattern(field: &str, value: &str, regex: &Regex, format: &str) -> Result<()> {
    if !regex.is_match(value) {
        return Err(AmplitudeError::validation(
            field,
            format!("must match {} (got '{}')", format, value),
        ));
    }
    Ok(())
}

pub fn date(field: &str, value: &str) -> Result<()> {
    pattern(field, value, date_regex(), "YYYYMMDD")
}

pub fn export_hour(field: &str, value: &str) -> Result<()> {
    pattern(field, value, export_hour_regex(), "YYYYMMDDTHH (24-hour clock)")
}

pub fn iso_date(field: &str, value: &str) -> Result<()> {
    pattern(field, value, iso_date_regex(), "YYYY-MM-DD")
}

fn one_of<T: PartialEq + fmt::Display>(field: &str, value: &T, allowed: &[T]) -> Result<()> {
    if allowed.contains(value) {
        return Ok(());
    }
    let choices: Vec<String> = allowed.iter().map(|a| a.to_string()).collect();
    Err(AmplitudeError::validation(
        field,
        format!("must be one of {} (got '{}')", choices.join(", "), value),
    ))
}

fn range(field: &str, value: i64, min: i64, max: i64) -> Result<()> {
    if value < min || value > max {
        return Err(AmplitudeError::validation(
            field,
            format!("must be between {} and {} (got {})", min, max, value),
        ));
    }
    Ok(())
}

fn optional_choice(args: &Arguments<'_>, field: &str, allowed: &[&str]) -> Result<Option<String>> {
    match args.str(field)? {
        Some(value) => {
            one_of(field, &value, allowed)?;
            Ok(Some(value.to_string()))
        }
        None => Ok(None),
    }
}

fn optional_interval(args: &Arguments<'_>, field: &str, allowed: &[i64]) -> Result<Option<i64>> {
    match args.int(field)? {
        Some(value) => {
            one_of(field, &value, allowed)?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

fn optional_limit(args: &Arguments<'_>, field: &str) -> Result<Option<i64>> {
    match args.int(field)? {
        Some(value) => {
            range(field, value, 1, MAX_RESULT_LIMIT)?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

fn date_range(args: &Arguments<'_>) -> Result<(String, String)> {
    let start = args.required_str("start")?;
    date("start", start)?;
    let end = args.required_str("end")?;
    date("end", end)?;
    Ok((start.to_string(), end.to_string()))
}

// ============================================================================
// Shared value types
// ============================================================================

/// Comparison operator of a property filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Is,
    IsNot,
    Contains,
    DoesNotContain,
    GreaterThan,
    LessThan,
    GreaterOrEqual,
    LessOrEqual,
}

impl FilterOp {
    pub const ALL: &'static [&'static str] = &[
        "is",
        "is not",
        "contains",
        "does not contain",
        ">",
        "<",
        ">=",
        "<=",
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FilterOp::Is => "is",
            FilterOp::IsNot => "is not",
            FilterOp::Contains => "contains",
            FilterOp::DoesNotContain => "does not contain",
            FilterOp::GreaterThan => ">",
            FilterOp::LessThan => "<",
            FilterOp::GreaterOrEqual => ">=",
            FilterOp::LessOrEqual => "<=",
        }
    }

    pub fn parse(field: &str, s: &str) -> Result<Self> {
        Ok(match s {
            "is" => FilterOp::Is,
            "is not" => FilterOp::IsNot,
            "contains" => FilterOp::Contains,
            "does not contain" => FilterOp::DoesNotContain,
            ">" => FilterOp::GreaterThan,
            "<" => FilterOp::LessThan,
            ">=" => FilterOp::GreaterOrEqual,
            "<=" => FilterOp::LessOrEqual,
            other => {
                return Err(AmplitudeError::validation(
                    field,
                    format!("must be one of {} (got '{}')", Self::ALL.join(", "), other),
                ))
            }
        })
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyFilter {
    pub property_name: String,
    /// string, number, boolean, or an array of those
    pub value: Value,
    pub op: FilterOp,
}

impl PropertyFilter {
    fn from_value(field: &str, value: &Value) -> Result<Self> {
        let args = Arguments::new(value)
            .map_err(|_| AmplitudeError::validation(field, "must be an object"))?;

        let property_name = args
            .required_str("propertyName")
            .map_err(|e| nested(field, e))?
            .to_string();

        let op_field = format!("{}.op", field);
        let op = match args.str("op").map_err(|e| nested(field, e))? {
            Some(op) => FilterOp::parse(&op_field, op)?,
            None => return Err(AmplitudeError::validation(op_field, "is required")),
        };

        let value_field = format!("{}.value", field);
        let value = args
            .get("value")
            .ok_or_else(|| AmplitudeError::validation(&value_field, "is required"))?;
        let scalar = |v: &Value| matches!(v, Value::String(_) | Value::Number(_) | Value::Bool(_));
        let valid = match value {
            Value::Array(items) => items.iter().all(scalar),
            other => scalar(other),
        };
        if !valid {
            return Err(AmplitudeError::validation(
                value_field,
                "must be a string, number, boolean, or an array of those",
            ));
        }

        Ok(Self {
            property_name,
            value: value.clone(),
            op,
        })
    }

    /// Values rendered the way Amplitude segment definitions expect them.
    pub fn values(&self) -> Vec<String> {
        fn render(v: &Value) -> String {
            match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }
        }
        match &self.value {
            Value::Array(items) => items.iter().map(render).collect(),
            other => vec![render(other)],
        }
    }

    /// `{"prop": ..., "op": ..., "values": [...]}` segment condition
    pub fn to_segment(&self) -> Value {
        serde_json::json!({
            "prop": self.property_name,
            "op": self.op.as_str(),
            "values": self.values(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventDefinition {
    pub event_type: String,
    pub property_filters: Vec<PropertyFilter>,
}

impl EventDefinition {
    fn from_value(field: &str, value: &Value) -> Result<Self> {
        let args = Arguments::new(value)
            .map_err(|_| AmplitudeError::validation(field, "must be an object"))?;
        let event_type = args
            .required_str("eventType")
            .map_err(|e| nested(field, e))?
            .to_string();
        let property_filters = match args.array("propertyFilters").map_err(|e| nested(field, e))? {
            Some(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| {
                    PropertyFilter::from_value(&format!("{}.propertyFilters[{}]", field, i), v)
                })
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };
        Ok(Self {
            event_type,
            property_filters,
        })
    }
}

/// Prefix a nested field's validation error with its parent path.
fn nested(parent: &str, err: AmplitudeError) -> AmplitudeError {
    match err {
        AmplitudeError::Validation { field, reason } => {
            AmplitudeError::validation(format!("{}.{}", parent, field), reason)
        }
        other => other,
    }
}

// ============================================================================
// Operation parameters
// ============================================================================

/// Builds a parameter struct from raw tool arguments, validating as it goes.
pub trait Params: Sized {
    fn from_args(args: &Arguments<'_>) -> Result<Self>;

    fn parse(value: &Value) -> Result<Self> {
        Self::from_args(&Arguments::new(value)?)
    }
}

/// Operations without parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoParams;

impl Params for NoParams {
    fn from_args(_args: &Arguments<'_>) -> Result<Self> {
        Ok(NoParams)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryEventsParams {
    pub events: Vec<EventDefinition>,
    pub start: String,
    pub end: String,
    pub interval: Option<i64>,
    pub group_by: Option<String>,
    pub filters: Vec<PropertyFilter>,
    pub breakdowns: Vec<String>,
}

impl Params for QueryEventsParams {
    fn from_args(args: &Arguments<'_>) -> Result<Self> {
        let events = args
            .required_array("events", 1)?
            .iter()
            .enumerate()
            .map(|(i, v)| EventDefinition::from_value(&format!("events[{}]", i), v))
            .collect::<Result<Vec<_>>>()?;
        let (start, end) = date_range(args)?;
        let filters = match args.array("filters")? {
            Some(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| PropertyFilter::from_value(&format!("filters[{}]", i), v))
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };
        let breakdowns = match args.array("breakdowns")? {
            Some(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| match v {
                    Value::String(s) if !s.trim().is_empty() => Ok(s.clone()),
                    _ => Err(AmplitudeError::validation(
                        format!("breakdowns[{}]", i),
                        "must be a non-empty string",
                    )),
                })
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };

        Ok(Self {
            events,
            start,
            end,
            interval: optional_interval(args, "interval", INTERVALS)?,
            group_by: args.optional_str("groupBy")?,
            filters,
            breakdowns,
        })
    }
}

/// Default number of exported records returned when no limit is given
pub const DEFAULT_EXPORT_LIMIT: usize = 1000;

#[derive(Debug, Clone, PartialEq)]
pub struct ExportParams {
    pub start: String,
    pub end: String,
    /// Client-side truncation; does not reduce what Amplitude sends
    pub limit: Option<usize>,
}

impl ExportParams {
    pub fn effective_limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_EXPORT_LIMIT)
    }
}

impl Params for ExportParams {
    fn from_args(args: &Arguments<'_>) -> Result<Self> {
        let start = args.required_str("start")?;
        export_hour("start", start)?;
        let end = args.required_str("end")?;
        export_hour("end", end)?;
        let limit = match args.int("limit")? {
            Some(limit) => {
                range("limit", limit, 1, i64::MAX)?;
                Some(limit as usize)
            }
            None => None,
        };
        Ok(Self {
            start: start.to_string(),
            end: end.to_string(),
            limit,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartParams {
    pub chart_id: String,
}

impl Params for ChartParams {
    fn from_args(args: &Arguments<'_>) -> Result<Self> {
        Ok(Self {
            chart_id: args.required_id("chartId")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActiveUsersParams {
    pub start: String,
    pub end: String,
    pub m: Option<String>,
    pub i: Option<i64>,
    pub s: Option<String>,
    pub g: Option<String>,
}

impl Params for ActiveUsersParams {
    fn from_args(args: &Arguments<'_>) -> Result<Self> {
        let (start, end) = date_range(args)?;
        Ok(Self {
            start,
            end,
            m: optional_choice(args, "m", ACTIVE_USER_METRICS)?,
            i: optional_interval(args, "i", DAY_INTERVALS)?,
            s: args.json_text("s")?,
            g: args.optional_str("g")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventSegmentationParams {
    pub e: String,
    pub start: String,
    pub end: String,
    pub m: Option<String>,
    pub i: Option<i64>,
    pub s: Option<String>,
    pub g: Option<String>,
    pub limit: Option<i64>,
}

impl Params for EventSegmentationParams {
    fn from_args(args: &Arguments<'_>) -> Result<Self> {
        let e = args.required_json_text("e")?;
        let (start, end) = date_range(args)?;
        Ok(Self {
            e,
            start,
            end,
            m: optional_choice(args, "m", SEGMENTATION_METRICS)?,
            i: optional_interval(args, "i", INTERVALS)?,
            s: args.json_text("s")?,
            g: args.optional_str("g")?,
            limit: optional_limit(args, "limit")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunnelParams {
    /// JSON event definitions, one per funnel step, in order
    pub events: Vec<String>,
    pub start: String,
    pub end: String,
    pub mode: Option<String>,
    pub i: Option<i64>,
    pub s: Option<String>,
    pub g: Option<String>,
    pub cs: Option<i64>,
    pub limit: Option<i64>,
}

impl Params for FunnelParams {
    fn from_args(args: &Arguments<'_>) -> Result<Self> {
        let events = args
            .required_array("events", 2)?
            .iter()
            .enumerate()
            .map(|(i, v)| json_text_value(&format!("events[{}]", i), v))
            .collect::<Result<Vec<_>>>()?;
        let (start, end) = date_range(args)?;
        let cs = match args.int("cs")? {
            Some(cs) => {
                range("cs", cs, 1, MAX_CONVERSION_SECONDS)?;
                Some(cs)
            }
            None => None,
        };
        Ok(Self {
            events,
            start,
            end,
            mode: optional_choice(args, "mode", FUNNEL_MODES)?,
            i: optional_interval(args, "i", INTERVALS)?,
            s: args.json_text("s")?,
            g: args.optional_str("g")?,
            cs,
            limit: optional_limit(args, "limit")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetentionParams {
    pub se: String,
    pub re: String,
    pub start: String,
    pub end: String,
    pub rm: Option<String>,
    pub rb: Option<String>,
    pub i: Option<i64>,
    pub s: Option<String>,
    pub g: Option<String>,
}

impl Params for RetentionParams {
    fn from_args(args: &Arguments<'_>) -> Result<Self> {
        let se = args.required_json_text("se")?;
        let re = args.required_json_text("re")?;
        let (start, end) = date_range(args)?;
        Ok(Self {
            se,
            re,
            start,
            end,
            rm: optional_choice(args, "rm", RETENTION_MODES)?,
            rb: args.optional_str("rb")?,
            i: optional_interval(args, "i", DAY_INTERVALS)?,
            s: args.json_text("s")?,
            g: args.optional_str("g")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserActivityParams {
    pub user: String,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
    pub direction: Option<String>,
}

impl Params for UserActivityParams {
    fn from_args(args: &Arguments<'_>) -> Result<Self> {
        let offset = match args.int("offset")? {
            Some(offset) => {
                range("offset", offset, 0, i64::MAX)?;
                Some(offset)
            }
            None => None,
        };
        Ok(Self {
            user: args.required_id("user")?,
            offset,
            limit: optional_limit(args, "limit")?,
            direction: optional_choice(args, "direction", ACTIVITY_DIRECTIONS)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserSearchParams {
    pub user: String,
}

impl Params for UserSearchParams {
    fn from_args(args: &Arguments<'_>) -> Result<Self> {
        Ok(Self {
            user: args.required_id("user")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateAnnotationParams {
    pub app_id: i64,
    pub date: String,
    pub label: String,
    pub chart_id: Option<String>,
    pub details: Option<String>,
}

impl Params for CreateAnnotationParams {
    fn from_args(args: &Arguments<'_>) -> Result<Self> {
        let app_id = args.required_int("app_id")?;
        range("app_id", app_id, 1, i64::MAX)?;
        let date = args.required_str("date")?;
        iso_date("date", date)?;
        Ok(Self {
            app_id,
            date: date.to_string(),
            label: args.required_str("label")?.to_string(),
            chart_id: args.id("chart_id")?,
            details: args.optional_str("details")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationParams {
    pub id: i64,
}

impl Params for AnnotationParams {
    fn from_args(args: &Arguments<'_>) -> Result<Self> {
        let id = args.required_int("id")?;
        range("id", id, 1, i64::MAX)?;
        Ok(Self { id })
    }
}
