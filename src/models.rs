use std::collections::{BTreeMap, BTreeSet};

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::error::FilterError;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TransactionRow {
    /// Arrival index within the upload. "First" reductions are decided by it.
    pub sequence: u64,
    pub customer_id: Option<String>,
    pub customer_name: Option<String>,
    pub order_date: Option<NaiveDateTime>,
    pub city: Option<String>,
    pub segment: Option<String>,
    pub transaction_id: Option<String>,
    pub unit_price: Option<f64>,
    pub quantity: Option<f64>,
    pub revenue: f64,
    pub is_churned: Option<bool>,
    pub extra: BTreeMap<String, String>,
}

impl TransactionRow {
    pub fn order_day(&self) -> Option<NaiveDate> {
        self.order_date.map(|value| value.date())
    }
}

/// The rows loaded for a session together with the column facts the
/// reductions depend on.
#[derive(Debug, Clone, Default)]
pub struct WorkingSet {
    pub rows: Vec<TransactionRow>,
    pub columns: ColumnFacts,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnFacts {
    pub has_customer_name: bool,
    pub has_churn_column: bool,
}

impl WorkingSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerSummary {
    pub customer_id: String,
    pub customer_name: Option<String>,
    pub total_revenue: f64,
    pub last_order: Option<NaiveDateTime>,
    pub num_orders: usize,
    pub city: Option<String>,
    pub segment: Option<String>,
    pub is_churned: bool,
}

/// Inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, FilterError> {
        if start > end {
            return Err(FilterError::InvertedRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    pub cities: BTreeSet<String>,
    pub segments: BTreeSet<String>,
    pub date_range: Option<DateRange>,
}

impl FilterSpec {
    pub fn is_unfiltered(&self) -> bool {
        self.cities.is_empty() && self.segments.is_empty() && self.date_range.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Kpis {
    pub total_revenue: f64,
    /// Percentage of churned customers; `None` when no customer is in scope.
    pub churn_rate: Option<f64>,
    pub avg_clv: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonthlyRevenue {
    pub month_start: NaiveDate,
    pub revenue: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RevenueSource {
    Column,
    UnitPriceTimesQuantity,
    Defaulted,
}

/// What ingestion silently repaired, so callers can see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub rows_read: usize,
    pub revenue_source: RevenueSource,
    pub dates_nulled: usize,
    pub revenue_defaulted: usize,
    pub rows_without_customer_id: usize,
    pub extra_columns: Vec<String>,
}
