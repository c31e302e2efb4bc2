//! Page-number pagination.

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// A 1-based page request. Only [`Page::new`] builds one, and it clamps
/// out-of-range values rather than rejecting them, so `page >= 1` and
/// `1 <= page_size <= MAX_PAGE_SIZE` always hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
  page:      u32,
  page_size: u32,
}

impl Page {
  pub fn new(page: Option<u32>, page_size: Option<u32>) -> Self {
    let page = page.unwrap_or(1).max(1);
    let page_size = match page_size {
      None | Some(0) => DEFAULT_PAGE_SIZE,
      Some(n) => n.min(MAX_PAGE_SIZE),
    };
    Self { page, page_size }
  }

  pub fn page(self) -> u32 { self.page }

  pub fn page_size(self) -> u32 { self.page_size }

  pub fn limit(self) -> u32 { self.page_size }

  pub fn offset(self) -> u64 {
    u64::from(self.page - 1) * u64::from(self.page_size)
  }
}

impl Default for Page {
  fn default() -> Self { Self::new(None, None) }
}

/// One page of results plus the total number of matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paginated<T> {
  pub count:     u64,
  pub page:      u32,
  pub page_size: u32,
  pub results:   Vec<T>,
}

impl<T> Paginated<T> {
  pub fn new(page: Page, count: u64, results: Vec<T>) -> Self {
    Self {
      count,
      page: page.page,
      page_size: page.page_size,
      results,
    }
  }

  pub fn has_next(&self) -> bool {
    u64::from(self.page) * u64::from(self.page_size) < self.count
  }
}
