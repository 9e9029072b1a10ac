pub mod category;
pub mod movement;
pub mod report;
pub mod stock_item;
pub mod user;

use serde::{Deserialize, Serialize};

pub const PAGE_SIZE: i64 = 10;

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
}

impl PageQuery {
    /// 1-based page number; anything below 1 reads as the first page.
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(PAGE_SIZE)
    }
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, page: i64, total: i64) -> Self {
        Self {
            items,
            page,
            page_size: PAGE_SIZE,
            total,
            total_pages: (total + PAGE_SIZE - 1) / PAGE_SIZE,
        }
    }
}
