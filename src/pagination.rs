//! Cursor pagination shared by every listing endpoint.
//!
//! Cursor values are opaque: they are produced by the storage layer that serves
//! a listing and handed back to it unchanged on the next request. An empty
//! cursor in a [`Page`] means there are no further pages.

use axum::http::Uri;
use serde::{Deserialize, Serialize};
use url::Url;

/// Upper bound on items per page regardless of what a caller asks for.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Origin used to resolve relative request URIs; only the query is read.
const REQUEST_BASE: &str = "http://localhost";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub value: String,
    pub page_size: u32,
}

impl Cursor {
    pub fn new(value: impl Into<String>, page_size: u32) -> Self {
        Self {
            value: value.into(),
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// First page of a listing.
    pub fn start(page_size: u32) -> Self {
        Self::new(String::new(), page_size)
    }

    /// Builds a cursor from the relative request URI axum hands to handlers.
    pub fn from_uri(uri: &Uri, page_size: u32) -> Self {
        let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        match Url::parse(REQUEST_BASE).and_then(|base| base.join(path)) {
            Ok(url) => get_cursor(&url, page_size),
            Err(_) => Self::start(page_size),
        }
    }

    pub fn is_start(&self) -> bool {
        self.value.is_empty()
    }

    /// Rows a storage query should fetch: one extra tells whether another page exists.
    pub fn fetch_limit(&self) -> i64 {
        i64::from(self.page_size) + 1
    }
}

/// Returns the `cursor` query parameter of `url` (empty if absent) paired with a bounded page size.
pub fn get_cursor(url: &Url, page_size: u32) -> Cursor {
    let value = url
        .query_pairs()
        .find(|(key, _)| key == "cursor")
        .map(|(_, value)| value.into_owned())
        .unwrap_or_default();
    Cursor::new(value, page_size)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub cursor: String,
}

impl<T> Page<T> {
    /// Trims a `page_size + 1` fetch down to one page, taking the next cursor
    /// from the last kept row when more rows exist.
    pub fn from_overfetch<F>(mut rows: Vec<T>, cursor: &Cursor, next_cursor: F) -> Self
    where
        F: FnOnce(&T) -> String,
    {
        let page_size = cursor.page_size as usize;
        let cursor = if rows.len() > page_size {
            rows.truncate(page_size);
            rows.last().map(next_cursor).unwrap_or_default()
        } else {
            String::new()
        };
        Self {
            items: rows,
            cursor,
        }
    }
}
