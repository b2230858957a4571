//! Offset pagination shared by both bucket paginators.

use thiserror::Error;

const DEFAULT_CURRENT_PAGE: usize = 1;
const DEFAULT_ITEMS_PER_PAGE: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaginationError {
    #[error("current page number must be greater than 0, got {0}")]
    InvalidCurrentPage(usize),
    #[error("items per page must be greater than 0, got {0}")]
    InvalidItemsPerPage(usize),
}

/// Requested page number and page size, both one or greater.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    current_page: usize,
    items_per_page: usize,
}

impl PageRequest {
    pub fn new(current_page: usize, items_per_page: usize) -> Result<Self, PaginationError> {
        if current_page < 1 {
            return Err(PaginationError::InvalidCurrentPage(current_page));
        }
        if items_per_page < 1 {
            return Err(PaginationError::InvalidItemsPerPage(items_per_page));
        }
        Ok(Self {
            current_page,
            items_per_page,
        })
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn items_per_page(&self) -> usize {
        self.items_per_page
    }

    pub fn offset(&self) -> usize {
        (self.current_page - 1).saturating_mul(self.items_per_page)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            current_page: DEFAULT_CURRENT_PAGE,
            items_per_page: DEFAULT_ITEMS_PER_PAGE,
        }
    }
}

/// The slice of a resolved collection that is visible on one page.
///
/// Offsets past the end of the collection produce an empty window rather
/// than an error; the page number is never clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    request: PageRequest,
    total_items: usize,
    offset: usize,
    len: usize,
}

impl PageWindow {
    pub fn compute(total_items: usize, request: PageRequest) -> Self {
        let offset = request.offset();
        let len = total_items
            .saturating_sub(offset)
            .min(request.items_per_page());
        Self {
            request,
            total_items,
            offset,
            len,
        }
    }

    /// Borrow the visible part of `items`.
    ///
    /// `items` must be the collection the window was computed for.
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = self.offset.min(items.len());
        let end = start.saturating_add(self.len).min(items.len());
        &items[start..end]
    }

    pub fn current_page_number(&self) -> usize {
        self.request.current_page()
    }

    pub fn items_per_page(&self) -> usize {
        self.request.items_per_page()
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn total_items(&self) -> usize {
        self.total_items
    }

    pub fn items_on_current_page(&self) -> usize {
        self.len
    }

    pub fn number_of_pages(&self) -> usize {
        self.total_items.div_ceil(self.items_per_page()).max(1)
    }

    pub fn key_of_first_paginated_item(&self) -> usize {
        if self.total_items == 0 {
            return 0;
        }
        self.offset
    }

    pub fn key_of_last_paginated_item(&self) -> usize {
        if self.total_items == 0 {
            return 0;
        }
        let end = self
            .offset
            .saturating_add(self.items_per_page())
            .min(self.total_items);
        end.saturating_sub(1)
    }
}

/// Read access shared by every paginator over an in-memory collection.
pub trait Paginator {
    type Item;

    /// The full resolved collection.
    fn items(&self) -> &[Self::Item];

    fn window(&self) -> &PageWindow;

    fn paginated_items(&self) -> &[Self::Item] {
        self.window().slice(self.items())
    }

    fn total_items(&self) -> usize {
        self.window().total_items()
    }

    fn items_on_current_page(&self) -> usize {
        self.window().items_on_current_page()
    }

    fn number_of_pages(&self) -> usize {
        self.window().number_of_pages()
    }

    fn current_page_number(&self) -> usize {
        self.window().current_page_number()
    }

    fn items_per_page(&self) -> usize {
        self.window().items_per_page()
    }

    fn key_of_first_paginated_item(&self) -> usize {
        self.window().key_of_first_paginated_item()
    }

    fn key_of_last_paginated_item(&self) -> usize {
        self.window().key_of_last_paginated_item()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbers(count: usize) -> Vec<usize> {
        (0..count).collect()
    }

    #[test]
    fn default_request_is_first_page_of_ten() {
        let request = PageRequest::default();
        assert_eq!(request.current_page(), 1);
        assert_eq!(request.items_per_page(), 10);
        assert_eq!(request.offset(), 0);
    }

    #[test]
    fn zero_page_or_size_is_rejected() {
        assert_eq!(
            PageRequest::new(0, 10),
            Err(PaginationError::InvalidCurrentPage(0))
        );
        assert_eq!(
            PageRequest::new(1, 0),
            Err(PaginationError::InvalidItemsPerPage(0))
        );
    }

    #[test]
    fn windows_over_twenty_five_items() {
        let items = numbers(25);

        let first = PageWindow::compute(items.len(), PageRequest::new(1, 10).unwrap());
        assert_eq!(first.slice(&items), &items[0..10]);
        assert_eq!(first.items_on_current_page(), 10);

        let third = PageWindow::compute(items.len(), PageRequest::new(3, 10).unwrap());
        assert_eq!(third.slice(&items), &items[20..25]);
        assert_eq!(third.items_on_current_page(), 5);
        assert_eq!(third.key_of_first_paginated_item(), 20);
        assert_eq!(third.key_of_last_paginated_item(), 24);

        let fourth = PageWindow::compute(items.len(), PageRequest::new(4, 10).unwrap());
        assert!(fourth.slice(&items).is_empty());
        assert_eq!(fourth.items_on_current_page(), 0);
        assert_eq!(fourth.number_of_pages(), 3);
        assert_eq!(fourth.current_page_number(), 4);
    }

    #[test]
    fn empty_collection_has_one_page_and_zero_keys() {
        let window = PageWindow::compute(0, PageRequest::default());
        assert_eq!(window.number_of_pages(), 1);
        assert_eq!(window.key_of_first_paginated_item(), 0);
        assert_eq!(window.key_of_last_paginated_item(), 0);
        assert!(window.slice::<u8>(&[]).is_empty());
    }

    #[test]
    fn huge_page_numbers_do_not_overflow() {
        let items = numbers(3);
        let window = PageWindow::compute(items.len(), PageRequest::new(usize::MAX, 10).unwrap());
        assert!(window.slice(&items).is_empty());
        assert_eq!(window.items_on_current_page(), 0);
    }
}
