use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

/// Default page size sent with every list query when the caller sets none.
pub const DEFAULT_LIST_LIMIT: u32 = 20;

/// Lifecycle tag the remote system stamps on submittable documents.
/// Transitions are enforced remotely: Draft -> Submitted -> Cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum DocStatus {
    #[default]
    Draft = 0,
    Submitted = 1,
    Cancelled = 2,
}

impl DocStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DocStatus::Draft => "Draft",
            DocStatus::Submitted => "Submitted",
            DocStatus::Cancelled => "Cancelled",
        }
    }
}

impl TryFrom<u8> for DocStatus {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(DocStatus::Draft),
            1 => Ok(DocStatus::Submitted),
            2 => Ok(DocStatus::Cancelled),
            other => Err(format!("invalid docstatus {other}, expected 0, 1 or 2")),
        }
    }
}

impl From<DocStatus> for u8 {
    fn from(status: DocStatus) -> Self {
        status as u8
    }
}

/// Typed view over a remote document. Standard fields are lifted out; everything
/// type-specific stays in `fields`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation: Option<String>,
    /// Kept verbatim: the remote compares it byte-for-byte on submit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
    #[serde(default)]
    pub docstatus: DocStatus,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl RemoteRecord {
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unsupported filter operator '{0}'")]
pub struct UnknownOperator(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOperator {
    Eq,
    NotEq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    NotLike,
    In,
    NotIn,
    Between,
    Is,
}

impl FilterOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            FilterOperator::Eq => "=",
            FilterOperator::NotEq => "!=",
            FilterOperator::Gt => ">",
            FilterOperator::Gte => ">=",
            FilterOperator::Lt => "<",
            FilterOperator::Lte => "<=",
            FilterOperator::Like => "like",
            FilterOperator::NotLike => "not like",
            FilterOperator::In => "in",
            FilterOperator::NotIn => "not in",
            FilterOperator::Between => "between",
            FilterOperator::Is => "is",
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterOperator {
    type Err = UnknownOperator;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase();
        let op = match normalized.as_str() {
            "=" | "==" => FilterOperator::Eq,
            "!=" | "<>" => FilterOperator::NotEq,
            ">" => FilterOperator::Gt,
            ">=" => FilterOperator::Gte,
            "<" => FilterOperator::Lt,
            "<=" => FilterOperator::Lte,
            "like" => FilterOperator::Like,
            "not like" => FilterOperator::NotLike,
            "in" => FilterOperator::In,
            "not in" => FilterOperator::NotIn,
            "between" => FilterOperator::Between,
            "is" => FilterOperator::Is,
            _ => return Err(UnknownOperator(raw.to_string())),
        };
        Ok(op)
    }
}

/// One `(field, operator, value)` condition. Filters in a query are ANDed.
/// Serialises as the 3-element array the remote list endpoint expects.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub operator: FilterOperator,
    pub value: Value,
}

impl Filter {
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOperator::Eq, value)
    }
}

impl Serialize for Filter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (&self.field, self.operator.as_str(), &self.value).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Filter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (field, operator, value) = <(String, String, Value)>::deserialize(deserializer)?;
        let operator = operator.parse::<FilterOperator>().map_err(D::Error::custom)?;
        Ok(Filter {
            field,
            operator,
            value,
        })
    }
}

/// Projection, filtering and paging for a list query.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListOptions {
    pub fields: Vec<String>,
    pub filters: Vec<Filter>,
    pub order_by: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl ListOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Encode as query pairs: `fields`/`filters` as JSON arrays, paging as plain
    /// integers, and `as_dict=1` so rows come back keyed by field name.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(6);
        if !self.fields.is_empty() {
            let fields: Vec<Value> = self.fields.iter().cloned().map(Value::String).collect();
            pairs.push(("fields".to_string(), Value::Array(fields).to_string()));
        }
        if !self.filters.is_empty() {
            let filters: Vec<Value> = self
                .filters
                .iter()
                .map(|filter| {
                    Value::Array(vec![
                        Value::String(filter.field.clone()),
                        Value::String(filter.operator.as_str().to_string()),
                        filter.value.clone(),
                    ])
                })
                .collect();
            pairs.push(("filters".to_string(), Value::Array(filters).to_string()));
        }
        if let Some(order_by) = &self.order_by {
            pairs.push(("order_by".to_string(), order_by.clone()));
        }
        pairs.push((
            "limit".to_string(),
            self.limit.unwrap_or(DEFAULT_LIST_LIMIT).to_string(),
        ));
        if let Some(offset) = self.offset {
            pairs.push(("limit_start".to_string(), offset.to_string()));
        }
        pairs.push(("as_dict".to_string(), "1".to_string()));
        pairs
    }
}
