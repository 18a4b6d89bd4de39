use tracing::debug;

use crate::aggregate::build_customer_summary;
use crate::filter::apply_filters;
use crate::metrics::{compute_kpis, revenue_trend, search_customers};
use crate::models::{CustomerSummary, FilterSpec, Kpis, MonthlyRevenue, TransactionRow, WorkingSet};

/// Holds the working set for one session. Every view is recomputed from it.
#[derive(Debug, Clone)]
pub struct Dashboard {
    working_set: WorkingSet,
}

#[derive(Debug, Clone)]
pub struct DashboardView<'a> {
    pub filtered_rows: Vec<&'a TransactionRow>,
    /// Every customer in the filtered scope.
    pub customers: Vec<CustomerSummary>,
    /// Customers in scope whose name matches the search box.
    pub matches: Vec<CustomerSummary>,
    pub kpis: Kpis,
    pub trend: Vec<MonthlyRevenue>,
}

impl Dashboard {
    pub fn new(working_set: WorkingSet) -> Self {
        Self { working_set }
    }

    pub fn working_set(&self) -> &WorkingSet {
        &self.working_set
    }

    /// Customer summary of the whole working set, ignoring filters.
    pub fn customers(&self) -> Vec<CustomerSummary> {
        build_customer_summary(&self.working_set.rows, self.working_set.columns)
    }

    pub fn view(&self, filter: &FilterSpec, search: Option<&str>) -> DashboardView<'_> {
        let filtered_rows = apply_filters(&self.working_set.rows, filter);
        let columns = self.working_set.columns;
        let customers = build_customer_summary(filtered_rows.iter().copied(), columns);
        let kpis = compute_kpis(&filtered_rows, &customers, columns.has_churn_column);
        let trend = revenue_trend(&filtered_rows);
        let matches = search_customers(&customers, search.unwrap_or_default())
            .into_iter()
            .cloned()
            .collect();

        debug!(
            rows = filtered_rows.len(),
            customers = customers.len(),
            "recomputed dashboard view"
        );

        DashboardView {
            filtered_rows,
            customers,
            matches,
            kpis,
            trend,
        }
    }
}
