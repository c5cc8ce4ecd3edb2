//! Pagination strategies for the HTTP caller
//!
//! Each strategy injects its paging parameters into the query string and
//! decides, from the decoded page, whether another fetch follows. Decoded
//! array pages are concatenated by the caller into a single sequence.

use std::collections::HashMap;

use serde_json::Value;

use crate::domain::api_config::{PaginationConfig, PaginationType};

/// Cursor state threaded between page fetches
#[derive(Debug, Clone, Default)]
pub struct PageState {
    pub page_index: usize,
    pub cursor: Option<String>,
}

/// Inject the paging parameters for the upcoming fetch
pub fn apply_page_params(
    query: &mut HashMap<String, String>,
    config: &PaginationConfig,
    state: &PageState,
) {
    match config.pagination_type {
        PaginationType::OffsetBased => {
            query.insert(
                "offset".to_string(),
                (state.page_index * config.page_size).to_string(),
            );
            query.insert("pageSize".to_string(), config.page_size.to_string());
        }
        PaginationType::PageBased => {
            // Pages are 1-based
            query.insert("page".to_string(), (state.page_index + 1).to_string());
            query.insert("pageSize".to_string(), config.page_size.to_string());
        }
        PaginationType::CursorBased => {
            query.insert("limit".to_string(), config.page_size.to_string());
            if let Some(cursor) = &state.cursor {
                query.insert("cursor".to_string(), cursor.clone());
            }
        }
        PaginationType::Disabled => {}
    }
}

/// Decide whether another page follows, returning the state for the next
/// fetch. `page_len` is the decoded page's element count.
pub fn next_state(
    config: &PaginationConfig,
    state: &PageState,
    page: &Value,
    page_len: usize,
) -> Option<PageState> {
    match config.pagination_type {
        PaginationType::OffsetBased | PaginationType::PageBased => {
            // A short page is the stop signal
            if page_len < config.page_size {
                None
            } else {
                Some(PageState {
                    page_index: state.page_index + 1,
                    cursor: None,
                })
            }
        }
        PaginationType::CursorBased => {
            if page_len == 0 {
                return None;
            }
            let cursor_path = config.cursor_path.as_deref()?;
            let cursor = extract_cursor(page, cursor_path)?;
            Some(PageState {
                page_index: state.page_index + 1,
                cursor: Some(cursor),
            })
        }
        PaginationType::Disabled => None,
    }
}

/// Read the next-cursor value at a dot-path in the decoded page
fn extract_cursor(page: &Value, path: &str) -> Option<String> {
    let mut current = page;
    for part in path.split('.') {
        current = current.get(part)?;
    }

    match current {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_offset_params() {
        let config = PaginationConfig::offset_based(2);
        let mut query = HashMap::new();

        apply_page_params(&mut query, &config, &PageState::default());
        assert_eq!(query["offset"], "0");
        assert_eq!(query["pageSize"], "2");

        let state = PageState {
            page_index: 2,
            cursor: None,
        };
        apply_page_params(&mut query, &config, &state);
        assert_eq!(query["offset"], "4");
    }

    #[test]
    fn test_page_params_one_based() {
        let config = PaginationConfig::page_based(10);
        let mut query = HashMap::new();

        apply_page_params(&mut query, &config, &PageState::default());
        assert_eq!(query["page"], "1");
        assert_eq!(query["pageSize"], "10");
    }

    #[test]
    fn test_offset_stops_on_short_page() {
        let config = PaginationConfig::offset_based(2);
        let state = PageState::default();

        let full = next_state(&config, &state, &json!(["a", "b"]), 2);
        assert_eq!(full.unwrap().page_index, 1);

        let short = next_state(&config, &state, &json!(["e"]), 1);
        assert!(short.is_none());
    }

    #[test]
    fn test_cursor_flow() {
        let config = PaginationConfig::cursor_based(10, "meta.next");
        let state = PageState::default();

        let page = json!({"meta": {"next": "abc"}, "items": [1]});
        let next = next_state(&config, &state, &page, 1).unwrap();
        assert_eq!(next.cursor.as_deref(), Some("abc"));

        let mut query = HashMap::new();
        apply_page_params(&mut query, &config, &next);
        assert_eq!(query["cursor"], "abc");

        // Cursor absent stops the loop
        let last = json!({"meta": {}, "items": [1]});
        assert!(next_state(&config, &next, &last, 1).is_none());
    }

    #[test]
    fn test_cursor_empty_page_stops() {
        let config = PaginationConfig::cursor_based(10, "next");
        let page = json!({"next": "more"});
        assert!(next_state(&config, &PageState::default(), &page, 0).is_none());
    }
}
