use std::collections::BTreeMap;

use chrono::{Datelike, Months, NaiveDate};

use crate::models::{CustomerSummary, Kpis, MonthlyRevenue, TransactionRow};

pub fn compute_kpis(
    rows: &[&TransactionRow],
    customers: &[CustomerSummary],
    has_churn_column: bool,
) -> Kpis {
    let total_revenue = rows.iter().map(|row| row.revenue).sum();

    let churn_rate = if has_churn_column {
        let flags = customers.iter().map(|c| if c.is_churned { 1.0 } else { 0.0 });
        mean(flags).map(|rate| rate * 100.0)
    } else if customers.is_empty() {
        None
    } else {
        Some(0.0)
    };

    Kpis {
        total_revenue,
        churn_rate,
        avg_clv: mean(customers.iter().map(|c| c.total_revenue)),
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (count, total) =
        values.fold((0usize, 0.0), |(count, total), value| (count + 1, total + value));
    if count == 0 {
        None
    } else {
        Some(total / count as f64)
    }
}

pub fn month_start(day: NaiveDate) -> NaiveDate {
    day.with_day(1).unwrap_or(day)
}

/// Revenue per calendar month, oldest first. Months between the first and
/// last order with no revenue are reported as zero.
pub fn revenue_trend(rows: &[&TransactionRow]) -> Vec<MonthlyRevenue> {
    let mut by_month: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for row in rows {
        if let Some(day) = row.order_day() {
            *by_month.entry(month_start(day)).or_insert(0.0) += row.revenue;
        }
    }

    let (Some(&first), Some(&last)) = (by_month.keys().next(), by_month.keys().next_back()) else {
        return Vec::new();
    };

    let mut trend = Vec::new();
    let mut month = first;
    while month <= last {
        trend.push(MonthlyRevenue {
            month_start: month,
            revenue: by_month.get(&month).copied().unwrap_or(0.0),
        });
        match month.checked_add_months(Months::new(1)) {
            Some(next) => month = next,
            None => break,
        }
    }
    trend
}

/// Case-insensitive substring match on customer name. A blank query
/// returns every customer.
pub fn search_customers<'a>(
    customers: &'a [CustomerSummary],
    query: &str,
) -> Vec<&'a CustomerSummary> {
    if query.trim().is_empty() {
        return customers.iter().collect();
    }

    let needle = query.to_lowercase();
    customers
        .iter()
        .filter(|customer| {
            customer
                .customer_name
                .as_deref()
                .is_some_and(|name| name.to_lowercase().contains(&needle))
        })
        .collect()
}

pub fn find_customer<'a>(
    customers: &'a [CustomerSummary],
    customer_id: &str,
) -> Option<&'a CustomerSummary> {
    customers.iter().find(|customer| customer.customer_id == customer_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn row(date: Option<NaiveDate>, revenue: f64) -> TransactionRow {
        TransactionRow {
            customer_id: Some("C1".to_string()),
            order_date: date.and_then(|date| date.and_hms_opt(12, 0, 0)),
            revenue,
            ..Default::default()
        }
    }

    fn customer(
        id: &str,
        name: Option<&str>,
        total_revenue: f64,
        is_churned: bool,
    ) -> CustomerSummary {
        CustomerSummary {
            customer_id: id.to_string(),
            customer_name: name.map(str::to_string),
            total_revenue,
            last_order: None,
            num_orders: 1,
            city: None,
            segment: None,
            is_churned,
        }
    }

    #[test]
    fn kpis_over_filtered_scope() {
        let rows = [row(Some(day(2024, 1, 1)), 100.0), row(Some(day(2024, 1, 2)), 50.0)];
        let refs: Vec<&TransactionRow> = rows.iter().collect();
        let customers = vec![
            customer("C1", Some("Alice"), 120.0, true),
            customer("C2", Some("Bob"), 30.0, false),
            customer("C3", Some("Cara"), 0.0, false),
            customer("C4", Some("Dev"), 50.0, false),
        ];

        let kpis = compute_kpis(&refs, &customers, true);
        assert_eq!(kpis.total_revenue, 150.0);
        assert_eq!(kpis.churn_rate, Some(25.0));
        assert_eq!(kpis.avg_clv, Some(50.0));
    }

    #[test]
    fn churn_rate_is_zero_without_churn_column() {
        let customers = vec![customer("C1", None, 10.0, false)];
        let kpis = compute_kpis(&[], &customers, false);
        assert_eq!(kpis.churn_rate, Some(0.0));
        assert_eq!(kpis.total_revenue, 0.0);
    }

    #[test]
    fn empty_scope_has_no_means() {
        let kpis = compute_kpis(&[], &[], true);
        assert_eq!(kpis.total_revenue, 0.0);
        assert_eq!(kpis.churn_rate, None);
        assert_eq!(kpis.avg_clv, None);
    }

    #[test]
    fn trend_groups_by_month_and_fills_gaps() {
        let rows = [
            row(Some(day(2024, 3, 20)), 5.0),
            row(Some(day(2024, 1, 1)), 100.0),
            row(None, 999.0),
            row(Some(day(2024, 1, 31)), 25.0),
        ];
        let refs: Vec<&TransactionRow> = rows.iter().collect();

        let trend = revenue_trend(&refs);
        assert_eq!(
            trend,
            vec![
                MonthlyRevenue {
                    month_start: day(2024, 1, 1),
                    revenue: 125.0,
                },
                MonthlyRevenue {
                    month_start: day(2024, 2, 1),
                    revenue: 0.0,
                },
                MonthlyRevenue {
                    month_start: day(2024, 3, 1),
                    revenue: 5.0,
                },
            ]
        );
    }

    #[test]
    fn trend_crosses_year_boundary() {
        let rows = [row(Some(day(2023, 12, 5)), 1.0), row(Some(day(2024, 1, 5)), 2.0)];
        let refs: Vec<&TransactionRow> = rows.iter().collect();

        let months: Vec<NaiveDate> = revenue_trend(&refs).iter().map(|m| m.month_start).collect();
        assert_eq!(months, vec![day(2023, 12, 1), day(2024, 1, 1)]);
    }

    #[test]
    fn search_is_case_insensitive_substring_on_name() {
        let customers = vec![
            customer("C1", Some("Alice Kumar"), 1.0, false),
            customer("C2", Some("Bob Singh"), 1.0, false),
            customer("C3", None, 1.0, false),
        ];

        let hits = search_customers(&customers, "ali");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].customer_id, "C1");

        assert_eq!(search_customers(&customers, "KUMAR").len(), 1);
        assert_eq!(search_customers(&customers, "Kumar ").len(), 0);
        assert_eq!(search_customers(&customers, "e k").len(), 1);
        assert_eq!(search_customers(&customers, "c3").len(), 0);
        assert_eq!(search_customers(&customers, "  ").len(), 3);
    }

    #[test]
    fn unknown_customer_has_no_profile() {
        let customers = vec![customer("C1", Some("Alice"), 1.0, false)];
        assert!(find_customer(&customers, "C1").is_some());
        assert!(find_customer(&customers, "C9").is_none());
    }
}
