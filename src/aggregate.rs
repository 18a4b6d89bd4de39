use std::collections::BTreeMap;

use crate::models::{ColumnFacts, CustomerSummary, TransactionRow};

/// Rolls transaction rows up into one summary per distinct customer id,
/// ordered by id. Rows without a customer id are not grouped.
///
/// Within a customer, rows are reduced in `sequence` order, so the "first"
/// fields and the revenue sum do not depend on how the input was sorted.
pub fn build_customer_summary<'a, I>(rows: I, columns: ColumnFacts) -> Vec<CustomerSummary>
where
    I: IntoIterator<Item = &'a TransactionRow>,
{
    let mut groups: BTreeMap<&str, Vec<&TransactionRow>> = BTreeMap::new();

    for row in rows {
        if let Some(customer_id) = row.customer_id.as_deref() {
            groups.entry(customer_id).or_default().push(row);
        }
    }

    groups
        .into_iter()
        .map(|(customer_id, mut rows)| {
            rows.sort_by_key(|row| row.sequence);
            summarize(customer_id, &rows, columns)
        })
        .collect()
}

fn summarize(customer_id: &str, rows: &[&TransactionRow], columns: ColumnFacts) -> CustomerSummary {
    let customer_name = if columns.has_customer_name {
        first_present(rows, |row| row.customer_name.as_deref())
    } else {
        Some(customer_id.to_string())
    };

    CustomerSummary {
        customer_id: customer_id.to_string(),
        customer_name,
        total_revenue: rows.iter().map(|row| row.revenue).sum(),
        last_order: rows.iter().filter_map(|row| row.order_date).max(),
        num_orders: rows.len(),
        city: first_present(rows, |row| row.city.as_deref()),
        segment: first_present(rows, |row| row.segment.as_deref()),
        is_churned: rows.iter().any(|row| row.is_churned == Some(true)),
    }
}

fn first_present<F>(rows: &[&TransactionRow], field: F) -> Option<String>
where
    F: Fn(&TransactionRow) -> Option<&str>,
{
    rows.iter().find_map(|row| field(*row)).map(str::to_string)
}
