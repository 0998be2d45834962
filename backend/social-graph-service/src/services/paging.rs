use crate::error::{ServiceError, ServiceResult};

/// Validated half-open page `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    pub start: usize,
    pub end: usize,
}

impl PageRange {
    /// Rejects negative bounds and `start > end`
    pub fn new(start: i64, end: i64) -> ServiceResult<Self> {
        if start < 0 || end < 0 || start > end {
            return Err(ServiceError::invalid_range());
        }
        let start = usize::try_from(start).map_err(|_| ServiceError::invalid_range())?;
        let end = usize::try_from(end).map_err(|_| ServiceError::invalid_range())?;
        Ok(Self { start, end })
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The part of `items` inside the page; empty when `start` is past the end
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = self.start.min(items.len());
        let end = self.end.min(items.len());
        &items[start..end]
    }
}
