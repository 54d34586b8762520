//! Catch-all REST surface over every top-level key of the document.
//!
//! Array-valued keys behave as collections of records addressed by `id`;
//! object-valued keys (`meta`, `pickerRoutes`) behave as single resources.

use std::cmp::Ordering;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;
use crate::store::Document;

const DEFAULT_PAGE_LIMIT: usize = 10;
const TOTAL_COUNT_HEADER: &str = "x-total-count";

pub async fn dispatch(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Result<Response, AppError> {
    let segments: Vec<&str> = uri.path().split('/').filter(|s| !s.is_empty()).collect();

    let response = match (method.as_str(), segments.as_slice()) {
        ("GET", ["db"]) => Json(state.store.snapshot().await.to_value()).into_response(),
        ("GET", [name]) => {
            let params = Query::<Vec<(String, String)>>::try_from_uri(&uri)
                .map(|Query(params)| params)
                .unwrap_or_default();
            let query = ListQuery::parse(&params);
            state
                .store
                .read(|doc| list(doc, name, &query))
                .await
                .unwrap_or_else(not_found)
        }
        ("GET", [name, id]) => state
            .store
            .read(|doc| show(doc, name, id))
            .await
            .map(Json)
            .map(IntoResponse::into_response)
            .unwrap_or_else(not_found),
        ("POST", [name]) => {
            let record = parse_object(&body)?;
            let created = state.write(|doc, _| Ok(create(doc, name, record))).await?;
            created
                .map(|record| (StatusCode::CREATED, Json(record)).into_response())
                .unwrap_or_else(not_found)
        }
        (verb @ ("PUT" | "PATCH"), [name]) => {
            let replacement = parse_object(&body)?;
            let merge = verb == "PATCH";
            let updated = state
                .write(|doc, _| Ok(update_singular(doc, name, replacement, merge)))
                .await?;
            respond(updated)
        }
        (verb @ ("PUT" | "PATCH"), [name, id]) => {
            let replacement = parse_object(&body)?;
            let merge = verb == "PATCH";
            let updated = state
                .write(|doc, _| Ok(update(doc, name, id, replacement, merge)))
                .await?;
            respond(updated)
        }
        ("DELETE", [name, id]) => {
            let removed = state.write(|doc, _| Ok(remove(doc, name, id))).await?;
            respond(removed.map(|_| json!({})))
        }
        _ => not_found(),
    };

    Ok(response)
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({}))).into_response()
}

fn respond(record: Option<Value>) -> Response {
    record
        .map(|record| Json(record).into_response())
        .unwrap_or_else(not_found)
}

fn parse_object(body: &[u8]) -> Result<Map<String, Value>, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }

    match serde_json::from_slice(body) {
        Ok(Value::Object(record)) => Ok(record),
        Ok(_) => Err(AppError::BadRequest("body must be a json object".to_string())),
        Err(err) => Err(AppError::BadRequest(format!("invalid json body: {err}"))),
    }
}

/// `1` and `"1"` address the same record.
fn id_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn field_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn position(items: &[Value], id: &str) -> Option<usize> {
    items
        .iter()
        .position(|item| id_text(item.get("id")).as_deref() == Some(id))
}

fn list(doc: &Document, name: &str, query: &ListQuery) -> Option<Response> {
    match doc.root().get(name)? {
        Value::Array(items) => {
            let page = query.apply(items);
            let mut response = Json(Value::Array(page.items)).into_response();
            if page.sliced {
                response
                    .headers_mut()
                    .insert(TOTAL_COUNT_HEADER, HeaderValue::from(page.total));
            }
            Some(response)
        }
        other => Some(Json(other.clone()).into_response()),
    }
}

fn show(doc: &Document, name: &str, id: &str) -> Option<Value> {
    let items = doc.collection(name)?;
    position(items, id).map(|index| items[index].clone())
}

fn next_id(items: &[Value]) -> Value {
    let numeric: Option<Vec<i64>> = items
        .iter()
        .filter_map(|item| item.get("id"))
        .map(Value::as_i64)
        .collect();

    match numeric {
        Some(ids) => Value::from(ids.into_iter().max().unwrap_or(0) + 1),
        None => Value::from(Uuid::new_v4().to_string()),
    }
}

fn create(doc: &mut Document, name: &str, mut record: Map<String, Value>) -> Option<Value> {
    let items = doc.root_mut().get_mut(name)?.as_array_mut()?;

    if !record.contains_key("id") {
        record.insert("id".to_string(), next_id(items));
    }
    let record = Value::Object(record);
    items.push(record.clone());

    Some(record)
}

fn update(
    doc: &mut Document,
    name: &str,
    id: &str,
    replacement: Map<String, Value>,
    merge: bool,
) -> Option<Value> {
    let items = doc.root_mut().get_mut(name)?.as_array_mut()?;
    let index = position(items, id)?;
    let slot = &mut items[index];
    let original_id = slot.get("id").cloned();

    let mut record = if merge {
        slot.as_object().cloned().unwrap_or_default()
    } else {
        Map::new()
    };
    record.extend(replacement);
    if let Some(original_id) = original_id {
        record.insert("id".to_string(), original_id);
    }

    *slot = Value::Object(record);
    Some(slot.clone())
}

fn update_singular(
    doc: &mut Document,
    name: &str,
    replacement: Map<String, Value>,
    merge: bool,
) -> Option<Value> {
    let slot = doc.root_mut().get_mut(name)?;
    let current = slot.as_object_mut()?;

    if !merge {
        current.clear();
    }
    current.extend(replacement);

    Some(slot.clone())
}

fn remove(doc: &mut Document, name: &str, id: &str) -> Option<Value> {
    let items = doc.root_mut().get_mut(name)?.as_array_mut()?;
    let index = position(items, id)?;
    Some(items.remove(index))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterOp {
    Eq,
    Ne,
    Gte,
    Lte,
    Like,
}

#[derive(Debug, Clone, PartialEq)]
struct Filter {
    field: String,
    op: FilterOp,
    values: Vec<String>,
}

impl Filter {
    fn matches(&self, record: &Value) -> bool {
        let actual = record.get(&self.field).map(field_text).unwrap_or_default();
        match self.op {
            FilterOp::Eq => self.values.iter().any(|value| *value == actual),
            FilterOp::Ne => self.values.iter().all(|value| *value != actual),
            FilterOp::Gte => self
                .values
                .iter()
                .all(|value| compare_text(&actual, value) != Ordering::Less),
            FilterOp::Lte => self
                .values
                .iter()
                .all(|value| compare_text(&actual, value) != Ordering::Greater),
            FilterOp::Like => {
                let actual = actual.to_lowercase();
                self.values
                    .iter()
                    .any(|value| actual.contains(&value.to_lowercase()))
            }
        }
    }
}

/// Numeric when both sides parse as numbers, lexical otherwise.
fn compare_text(a: &str, b: &str) -> Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(a), Ok(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        _ => a.cmp(b),
    }
}

fn compare_fields(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a.and_then(Value::as_f64), b.and_then(Value::as_f64)) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        _ => {
            let a = a.map(field_text).unwrap_or_default();
            let b = b.map(field_text).unwrap_or_default();
            a.cmp(&b)
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
struct ListQuery {
    filters: Vec<Filter>,
    search: Option<String>,
    sort: Option<String>,
    descending: bool,
    start: Option<usize>,
    end: Option<usize>,
    limit: Option<usize>,
    page: Option<usize>,
}

struct Page {
    items: Vec<Value>,
    total: usize,
    sliced: bool,
}

impl ListQuery {
    fn parse(params: &[(String, String)]) -> Self {
        let mut query = ListQuery::default();

        for (key, value) in params {
            match key.as_str() {
                "q" => query.search = Some(value.to_lowercase()),
                "_sort" => query.sort = Some(value.clone()),
                "_order" => query.descending = value.eq_ignore_ascii_case("desc"),
                "_start" => query.start = value.parse().ok(),
                "_end" => query.end = value.parse().ok(),
                "_limit" => query.limit = value.parse().ok(),
                "_page" => query.page = value.parse().ok().filter(|page| *page > 0),
                // Unknown underscore options and the jsonp callback are not filters.
                key if key.starts_with('_') || key == "callback" => {}
                key => query.push_filter(key, value),
            }
        }

        query
    }

    fn push_filter(&mut self, key: &str, value: &str) {
        let (field, op) = [
            ("_ne", FilterOp::Ne),
            ("_gte", FilterOp::Gte),
            ("_lte", FilterOp::Lte),
            ("_like", FilterOp::Like),
        ]
        .into_iter()
        .find_map(|(suffix, op)| key.strip_suffix(suffix).map(|field| (field, op)))
        .unwrap_or((key, FilterOp::Eq));

        match self
            .filters
            .iter_mut()
            .find(|filter| filter.field == field && filter.op == op)
        {
            Some(filter) => filter.values.push(value.to_string()),
            None => self.filters.push(Filter {
                field: field.to_string(),
                op,
                values: vec![value.to_string()],
            }),
        }
    }

    fn matches(&self, record: &Value) -> bool {
        if !self.filters.iter().all(|filter| filter.matches(record)) {
            return false;
        }

        match &self.search {
            Some(needle) => record.as_object().is_some_and(|fields| {
                fields.values().any(|value| {
                    value
                        .as_str()
                        .is_some_and(|text| text.to_lowercase().contains(needle))
                })
            }),
            None => true,
        }
    }

    fn apply(&self, items: &[Value]) -> Page {
        let mut selected: Vec<Value> = items
            .iter()
            .filter(|record| self.matches(record))
            .cloned()
            .collect();

        if let Some(field) = &self.sort {
            selected.sort_by(|a, b| {
                let ordering = compare_fields(a.get(field), b.get(field));
                if self.descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }

        let total = selected.len();
        let range = if let Some(page) = self.page {
            let limit = self.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
            let start = (page - 1).saturating_mul(limit);
            Some((start, start.saturating_add(limit)))
        } else if self.start.is_some() || self.end.is_some() || self.limit.is_some() {
            let start = self.start.unwrap_or(0);
            let end = match (self.end, self.limit) {
                (Some(end), _) => end,
                (None, Some(limit)) => start.saturating_add(limit),
                (None, None) => total,
            };
            Some((start, end))
        } else {
            None
        };

        let Some((start, end)) = range else {
            return Page {
                items: selected,
                total,
                sliced: false,
            };
        };

        let start = start.min(total);
        let end = end.clamp(start, total);
        Page {
            items: selected[start..end].to_vec(),
            total,
            sliced: true,
        }
    }
}
