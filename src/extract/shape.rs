//! Response shapes and pagination cursors
//!
//! A page body is inspected exactly once: [`ResponseShape::resolve`] decides
//! where the records live and [`Pagination::resolve`] decides whether and how
//! to request the next page.

use indexmap::IndexMap;
use serde_json::Value;

/// Container keys searched, in order, for the record array of an object body
pub const CONTAINER_KEYS: [&str; 4] = ["data", "results", "items", "records"];

/// Page size assumed for offset pagination when the body carries no `limit`
pub const DEFAULT_LIMIT: i64 = 100;

/// Where the records of a page body live
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseShape {
    /// The body is the record array
    Array(Vec<Value>),
    /// An object holding the record array under a container key
    Envelope {
        container_key: &'static str,
        records: Vec<Value>,
    },
    /// An object with no record array, taken as a single record
    SingleObject(Value),
    /// Any other JSON value (string, number, bool, null)
    Unsupported,
}

impl ResponseShape {
    pub fn resolve(body: &Value) -> Self {
        match body {
            Value::Array(records) => ResponseShape::Array(records.clone()),
            Value::Object(map) => CONTAINER_KEYS
                .iter()
                .find_map(|key| match map.get(*key) {
                    Some(Value::Array(records)) => Some(ResponseShape::Envelope {
                        container_key: key,
                        records: records.clone(),
                    }),
                    _ => None,
                })
                .unwrap_or_else(|| ResponseShape::SingleObject(body.clone())),
            _ => ResponseShape::Unsupported,
        }
    }

    pub fn into_records(self) -> Vec<Value> {
        match self {
            ResponseShape::Array(records) | ResponseShape::Envelope { records, .. } => records,
            ResponseShape::SingleObject(record) => vec![record],
            ResponseShape::Unsupported => {
                log::warn!("Unexpected response type, no records extracted");
                Vec::new()
            }
        }
    }
}

/// How the next page is addressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    /// `page` counter from the current body
    Page(i64),
    /// `offset` and `limit` from the current body
    Offset { offset: i64, limit: i64 },
    /// No usable position field
    None,
}

/// Pagination state read from one page body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub cursor: Cursor,
    pub has_next: bool,
}

impl Pagination {
    /// A body that ends traversal
    pub const LAST: Pagination = Pagination {
        cursor: Cursor::None,
        has_next: false,
    };

    /// Read the completion signals and cursor of a page body.
    ///
    /// More pages exist when `next` or `next_page` is non-null, or when a numeric
    /// `page` is below a numeric `total_pages`. Non-object bodies and
    /// non-numeric counters count as "no further page".
    pub fn resolve(body: &Value) -> Self {
        let Some(map) = body.as_object() else {
            return Self::LAST;
        };

        let present = |key: &str| map.get(key).is_some_and(|v| !v.is_null());
        let number = |key: &str| map.get(key).and_then(Value::as_i64);

        let counted_pages_remain = match (number("page"), number("total_pages")) {
            (Some(page), Some(total)) => page < total,
            _ => false,
        };
        let has_next = present("next") || present("next_page") || counted_pages_remain;

        let cursor = if map.contains_key("page") {
            number("page").map_or(Cursor::None, Cursor::Page)
        } else if map.contains_key("offset") {
            match number("offset") {
                Some(offset) => Cursor::Offset {
                    offset,
                    limit: number("limit").unwrap_or(DEFAULT_LIMIT),
                },
                None => Cursor::None,
            }
        } else {
            Cursor::None
        };

        Self { cursor, has_next }
    }

    /// Query parameters for the next request, or `None` when traversal ends
    pub fn next_params(&self, current: &IndexMap<String, String>) -> Option<IndexMap<String, String>> {
        if !self.has_next {
            return None;
        }
        let mut params = current.clone();
        match self.cursor {
            Cursor::Page(page) => {
                params.insert("page".to_string(), (page + 1).to_string());
            }
            Cursor::Offset { offset, limit } => {
                params.insert("offset".to_string(), (offset + limit).to_string());
            }
            Cursor::None => return None,
        }
        Some(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_array_shape() {
        let shape = ResponseShape::resolve(&json!([{"id": 1}, {"id": 2}]));
        assert_eq!(shape.into_records().len(), 2);
    }

    #[test]
    fn test_envelope_preference_order() {
        let body = json!({"items": [{"id": 1}], "data": [{"id": 2}, {"id": 3}]});
        match ResponseShape::resolve(&body) {
            ResponseShape::Envelope {
                container_key,
                records,
            } => {
                assert_eq!(container_key, "data");
                assert_eq!(records.len(), 2);
            }
            other => panic!("unexpected shape: {:?}", other),
        }
    }

    #[test]
    fn test_envelope_skips_non_array_container() {
        let body = json!({"data": {"nested": true}, "results": [{"id": 1}]});
        assert!(matches!(
            ResponseShape::resolve(&body),
            ResponseShape::Envelope {
                container_key: "results",
                ..
            }
        ));
    }

    #[test]
    fn test_single_object() {
        let body = json!({"name": "London", "temp": 12.5});
        let records = ResponseShape::resolve(&body).into_records();
        assert_eq!(records, vec![body]);
    }

    #[test]
    fn test_unsupported_shape() {
        assert!(ResponseShape::resolve(&json!("hello")).into_records().is_empty());
        assert!(ResponseShape::resolve(&json!(42)).into_records().is_empty());
    }

    #[test]
    fn test_page_counter() {
        let pagination = Pagination::resolve(&json!({"page": 1, "total_pages": 3, "data": []}));
        assert_eq!(pagination.cursor, Cursor::Page(1));
        assert!(pagination.has_next);

        let params = pagination.next_params(&IndexMap::new()).unwrap();
        assert_eq!(params.get("page").map(String::as_str), Some("2"));

        let last = Pagination::resolve(&json!({"page": 3, "total_pages": 3}));
        assert!(!last.has_next);
        assert_eq!(last.next_params(&IndexMap::new()), None);
    }

    #[test]
    fn test_offset_cursor() {
        let pagination = Pagination::resolve(&json!({"offset": 0, "limit": 25, "next": "/x?offset=25"}));
        assert_eq!(
            pagination.cursor,
            Cursor::Offset {
                offset: 0,
                limit: 25
            }
        );
        let mut current = IndexMap::new();
        current.insert("q".to_string(), "london".to_string());
        let params = pagination.next_params(&current).unwrap();
        assert_eq!(params.get("offset").map(String::as_str), Some("25"));
        assert_eq!(params.get("q").map(String::as_str), Some("london"));
    }

    #[test]
    fn test_offset_default_limit() {
        let pagination = Pagination::resolve(&json!({"offset": 200, "next_page": 3}));
        assert_eq!(
            pagination.cursor,
            Cursor::Offset {
                offset: 200,
                limit: DEFAULT_LIMIT
            }
        );
    }

    #[test]
    fn test_page_takes_precedence_over_offset() {
        let pagination = Pagination::resolve(&json!({"page": 2, "offset": 40, "next": "more"}));
        assert_eq!(pagination.cursor, Cursor::Page(2));
    }

    #[test]
    fn test_null_next_means_done() {
        let pagination = Pagination::resolve(&json!({"next": null, "results": []}));
        assert!(!pagination.has_next);
    }

    #[test]
    fn test_next_without_cursor_stops() {
        let pagination = Pagination::resolve(&json!({"next": "https://api/x?cursor=abc"}));
        assert!(pagination.has_next);
        assert_eq!(pagination.cursor, Cursor::None);
        assert_eq!(pagination.next_params(&IndexMap::new()), None);
    }

    #[test]
    fn test_malformed_counters_are_last_page() {
        let pagination = Pagination::resolve(&json!({"page": "two", "total_pages": "three"}));
        assert!(!pagination.has_next);
        assert_eq!(Pagination::resolve(&json!([1, 2])), Pagination::LAST);
    }
}
