//! Order listing and reporting types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::{Money, UserId};
use serde::{Deserialize, Serialize};

use super::{OrderStatus, PaymentStatus};

/// Filters for listing orders.
///
/// `user_id` is honoured only for administrators; customers always see their
/// own orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderFilter {
    pub user_id: Option<UserId>,
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// 1-based.
    pub page: usize,
    pub page_size: usize,
}

impl OrderFilter {
    pub const MAX_PAGE_SIZE: usize = 100;

    pub fn page(mut self, page: usize, page_size: usize) -> Self {
        self.page = page;
        self.page_size = page_size;
        self
    }

    pub fn status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Page number clamped to at least 1.
    pub fn page_number(&self) -> usize {
        self.page.max(1)
    }

    /// Page size clamped to `1..=MAX_PAGE_SIZE`.
    pub fn limit(&self) -> usize {
        self.page_size.clamp(1, Self::MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> usize {
        (self.page_number() - 1) * self.limit()
    }
}

impl Default for OrderFilter {
    fn default() -> Self {
        Self {
            user_id: None,
            status: None,
            payment_status: None,
            from: None,
            to: None,
            page: 1,
            page_size: 20,
        }
    }
}

/// One page of results with the total match count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub page_size: usize,
    pub total_count: u64,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> u64 {
        if self.page_size == 0 {
            return 0;
        }
        self.total_count.div_ceil(self.page_size as u64)
    }

    pub fn has_next(&self) -> bool {
        (self.page as u64) < self.total_pages()
    }
}

/// Dashboard figures for administrators.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderStats {
    pub total_orders: u64,
    pub by_status: BTreeMap<String, u64>,
    /// Sum of totals over paid orders.
    pub total_revenue: Money,
    pub today_revenue: Money,
    pub month_revenue: Money,
}

impl OrderStats {
    pub fn count(&self, status: OrderStatus) -> u64 {
        self.by_status.get(status.as_str()).copied().unwrap_or(0)
    }
}
