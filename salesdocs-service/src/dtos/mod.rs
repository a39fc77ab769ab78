pub mod catalog;
pub mod documents;

pub use catalog::*;
pub use documents::*;

use serde::Serialize;
use uuid::Uuid;

/// Cursor-paginated list envelope. `next_page_token` is the last item's id
/// when the page was full.
#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<Uuid>,
}

impl<T> ListResponse<T> {
    pub fn new(items: Vec<T>, page_size: i32, token: impl Fn(&T) -> Uuid) -> Self {
        let full_page = items.len() as i64 >= page_size.clamp(1, 100) as i64;
        let next_page_token = if full_page {
            items.last().map(&token)
        } else {
            None
        };
        ListResponse {
            items,
            next_page_token,
        }
    }
}
