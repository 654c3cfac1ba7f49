//! Shared catalog helpers - input validation, paging and batch outcomes used by the
//! material and product modules.

use crate::{
    config::Limits,
    errors::{Error, ErrorKind, Result},
};
use serde::{Deserialize, Serialize};

/// Trims and checks a display name.
pub fn validate_name(raw: &str, what: &str, limits: &Limits) -> Result<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(Error::validation(format!("{what} name cannot be empty")));
    }
    if name.chars().count() > limits.max_name_length {
        return Err(Error::validation(format!(
            "{what} name cannot exceed {} characters",
            limits.max_name_length
        )));
    }
    Ok(name.to_string())
}

/// Checks that a money value is finite and non-negative.
pub fn validate_price(value: f64, field: &str) -> Result<f64> {
    if !value.is_finite() || value < 0.0 {
        return Err(Error::validation(format!(
            "{field} must be a non-negative number, got {value}"
        )));
    }
    Ok(value)
}

/// Checks that a ledger quantity lies within the configured range.
pub fn validate_quantity(quantity: i64, limits: &Limits) -> Result<i64> {
    if quantity < limits.min_quantity || quantity > limits.max_quantity {
        return Err(Error::validation(format!(
            "Quantity must be between {} and {}, got {quantity}",
            limits.min_quantity, limits.max_quantity
        )));
    }
    Ok(quantity)
}

/// Trims an optional free-text note, returning `None` for blanks.
pub fn validate_note(raw: Option<&str>, field: &str, max_length: usize) -> Result<Option<String>> {
    let Some(note) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    if note.chars().count() > max_length {
        return Err(Error::validation(format!(
            "{field} cannot exceed {max_length} characters"
        )));
    }
    Ok(Some(note.to_string()))
}

/// Optional paging parameters of a list request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// One-based page number
    pub page: Option<u64>,
    /// Items per page
    pub page_size: Option<u64>,
}

impl PageRequest {
    /// True when the caller asked for a page rather than the whole list.
    #[must_use]
    pub const fn is_paged(&self) -> bool {
        self.page.is_some() || self.page_size.is_some()
    }

    /// Resolves `(page, page_size)` against the limits.
    #[must_use]
    pub fn resolve(&self, limits: &Limits) -> (u64, u64) {
        let page = self.page.unwrap_or(1).max(1);
        let page_size = self
            .page_size
            .unwrap_or(limits.default_page_size)
            .clamp(1, limits.max_page_size);
        (page, page_size)
    }
}

/// Row offset of a one-based page.
///
/// SQLite offsets are signed 64-bit, so a page that lands past `i64::MAX` is rejected
/// rather than wrapped.
pub fn page_offset(page: u64, page_size: u64) -> Result<u64> {
    page.saturating_sub(1)
        .checked_mul(page_size)
        .filter(|offset| i64::try_from(*offset).is_ok())
        .ok_or_else(|| Error::validation(format!("page {page} is out of range")))
}

/// One page of a catalog listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    /// Items on this page
    pub items: Vec<T>,
    /// Items across all pages
    pub total: u64,
    /// One-based page number
    pub page: u64,
    /// Page size used
    pub page_size: u64,
    /// Number of pages
    pub total_pages: u64,
}

impl<T> Page<T> {
    /// Builds a page and derives `total_pages`.
    #[must_use]
    pub fn new(items: Vec<T>, total: u64, page: u64, page_size: u64) -> Self {
        let total_pages = if page_size == 0 {
            0
        } else {
            total.div_ceil(page_size)
        };
        Self {
            items,
            total,
            page,
            page_size,
            total_pages,
        }
    }

    /// Wraps an unpaged listing as a single page.
    #[must_use]
    pub fn single(items: Vec<T>) -> Self {
        let total = items.len() as u64;
        Self::new(items, total, 1, total.max(1))
    }
}

/// One item a batch delete could not remove.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFailure {
    /// Requested id
    pub id: i64,
    /// Name of the item, when it exists
    pub name: Option<String>,
    /// Why it was kept
    pub reason: String,
}

/// Result of a batch delete: what went and what stayed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    /// Ids that were deleted
    pub deleted: Vec<i64>,
    /// Ids that were kept, with reasons
    pub failed: Vec<BatchFailure>,
}

impl BatchOutcome {
    /// Files the result of deleting one item. Internal errors abort the batch.
    pub fn push(&mut self, id: i64, name: Option<String>, result: Result<()>) -> Result<()> {
        match result {
            Ok(()) => self.deleted.push(id),
            Err(e) if e.kind() == ErrorKind::Internal => return Err(e),
            Err(e) => self.failed.push(BatchFailure {
                id,
                name,
                reason: e.to_string(),
            }),
        }
        Ok(())
    }
}

/// Body of a batch delete request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchDeleteRequest {
    /// Ids to delete
    pub ids: Vec<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        let limits = Limits::default();
        assert_eq!(validate_name("  Flour ", "Material", &limits).ok(), Some("Flour".to_string()));
        assert!(matches!(
            validate_name("   ", "Material", &limits),
            Err(Error::Validation { .. })
        ));
        assert!(validate_name(&"x".repeat(101), "Material", &limits).is_err());
        // Limit counts characters, not bytes
        assert!(validate_name(&"é".repeat(100), "Material", &limits).is_ok());
    }

    #[test]
    fn test_validate_price() {
        assert!(validate_price(0.0, "in_price").is_ok());
        assert!(validate_price(-0.01, "in_price").is_err());
        assert!(validate_price(f64::NAN, "in_price").is_err());
        assert!(validate_price(f64::INFINITY, "in_price").is_err());
    }

    #[test]
    fn test_validate_quantity_bounds() {
        let limits = Limits::default();
        assert!(validate_quantity(1, &limits).is_ok());
        assert!(validate_quantity(999_999, &limits).is_ok());
        assert!(validate_quantity(0, &limits).is_err());
        assert!(validate_quantity(1_000_000, &limits).is_err());
    }

    #[test]
    fn test_validate_note() -> Result<()> {
        assert_eq!(validate_note(Some("  "), "supplier", 100)?, None);
        assert_eq!(validate_note(None, "supplier", 100)?, None);
        assert_eq!(validate_note(Some(" Mill "), "supplier", 100)?, Some("Mill".to_string()));
        assert!(validate_note(Some(&"a".repeat(101)), "supplier", 100).is_err());
        Ok(())
    }

    #[test]
    fn test_page_request_resolution() {
        let limits = Limits::default();
        assert_eq!(PageRequest::default().resolve(&limits), (1, 20));
        let request = PageRequest {
            page: Some(0),
            page_size: Some(500),
        };
        assert_eq!(request.resolve(&limits), (1, 100));
        assert!(request.is_paged());
        assert!(!PageRequest::default().is_paged());
    }

    #[test]
    fn test_page_offset_rejects_overflow() -> Result<()> {
        assert_eq!(page_offset(1, 20)?, 0);
        assert_eq!(page_offset(3, 20)?, 40);
        assert!(page_offset(u64::MAX, 100).is_err());
        assert!(page_offset(u64::MAX / 2, 4).is_err());
        let err = page_offset(u64::MAX, 1).err().map(|e| e.kind());
        assert_eq!(err, Some(ErrorKind::Validation));
        Ok(())
    }

    #[test]
    fn test_page_total_pages() {
        let page = Page::new(vec![1, 2], 41, 1, 20);
        assert_eq!(page.total_pages, 3);
        let empty: Page<i32> = Page::single(Vec::new());
        assert_eq!(empty.total_pages, 0);
    }

    #[test]
    fn test_batch_outcome_sorts_failures() {
        let mut outcome = BatchOutcome::default();
        assert!(outcome.push(1, Some("A".to_string()), Ok(())).is_ok());
        assert!(
            outcome
                .push(2, Some("B".to_string()), Err(Error::conflict("in use")))
                .is_ok()
        );
        assert!(
            outcome
                .push(3, None, Err(Error::Database(sea_orm::DbErr::Custom("down".to_string()))))
                .is_err()
        );
        assert_eq!(outcome.deleted, vec![1]);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].reason, "Conflict: in use");
    }
}
