use serde::Serialize;

/// Fixed catalog page size.
pub const PAGE_SIZE: i64 = 5;

/// A resolved page of a listing with `total` rows.
///
/// Any requested page that is not a positive integer within range resolves
/// to the first page. The first page always exists, even when empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageWindow {
    pub page: i64,
    pub num_pages: i64,
    pub total: i64,
    pub per_page: i64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl PageWindow {
    pub fn resolve(requested: Option<&str>, total: i64, per_page: i64) -> Self {
        let per_page = per_page.max(1);
        let total = total.max(0);
        let num_pages = ((total + per_page - 1) / per_page).max(1);

        let page = requested
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .filter(|page| (1..=num_pages).contains(page))
            .unwrap_or(1);

        Self {
            page,
            num_pages,
            total,
            per_page,
            has_next: page < num_pages,
            has_previous: page > 1,
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.per_page
    }

    pub fn limit(&self) -> i64 {
        self.per_page
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_page_by_default() {
        let window = PageWindow::resolve(None, 12, PAGE_SIZE);
        assert_eq!(window.page, 1);
        assert_eq!(window.num_pages, 3);
        assert_eq!(window.offset(), 0);
        assert!(window.has_next);
        assert!(!window.has_previous);
    }

    #[test]
    fn valid_page_is_honoured() {
        let window = PageWindow::resolve(Some("3"), 12, PAGE_SIZE);
        assert_eq!(window.page, 3);
        assert_eq!(window.offset(), 10);
        assert!(!window.has_next);
        assert!(window.has_previous);
    }

    #[test]
    fn zero_and_negative_fall_back_to_first() {
        assert_eq!(PageWindow::resolve(Some("0"), 12, PAGE_SIZE).page, 1);
        assert_eq!(PageWindow::resolve(Some("-2"), 12, PAGE_SIZE).page, 1);
    }

    #[test]
    fn non_integer_falls_back_to_first() {
        assert_eq!(PageWindow::resolve(Some("x"), 12, PAGE_SIZE).page, 1);
        assert_eq!(PageWindow::resolve(Some("1.5"), 12, PAGE_SIZE).page, 1);
        assert_eq!(PageWindow::resolve(Some(""), 12, PAGE_SIZE).page, 1);
    }

    #[test]
    fn out_of_range_falls_back_to_first() {
        assert_eq!(PageWindow::resolve(Some("4"), 12, PAGE_SIZE).page, 1);
    }

    #[test]
    fn empty_listing_has_one_empty_page() {
        let window = PageWindow::resolve(Some("1"), 0, PAGE_SIZE);
        assert_eq!(window.page, 1);
        assert_eq!(window.num_pages, 1);
        assert!(!window.has_next);
    }

    #[test]
    fn exact_multiple_has_no_trailing_page() {
        let window = PageWindow::resolve(Some("2"), 10, PAGE_SIZE);
        assert_eq!(window.num_pages, 2);
        assert_eq!(window.page, 2);
        assert!(!window.has_next);
    }
}
