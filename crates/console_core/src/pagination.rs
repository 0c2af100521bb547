use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationState {
    pub current: u64,
    pub page_size: u64,
    pub total: u64,
}

impl PaginationState {
    /// Clamps `current` and `page_size` to at least 1.
    pub fn new(current: u64, page_size: u64, total: u64) -> Self {
        Self {
            current: current.max(1),
            page_size: page_size.max(1),
            total,
        }
    }

    pub fn page_count(&self) -> u64 {
        self.total.div_ceil(self.page_size.max(1))
    }
}

/// Page to reload after removing `deleted_count` rows from the current page.
///
/// Steps back one page only when the current page would be left empty; it
/// deliberately does not jump to the last page of the shrunken list.
pub fn next_page_after_deletion(state: &PaginationState, deleted_count: u64) -> u64 {
    let new_total = state.total.saturating_sub(deleted_count);
    if new_total == 0 {
        return 1;
    }
    if state.current > 1 && (state.current - 1).saturating_mul(state.page_size) >= new_total {
        state.current - 1
    } else {
        state.current.max(1)
    }
}
