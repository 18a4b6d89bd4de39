use std::fmt::Write;

use crate::dashboard::DashboardView;
use crate::models::{CustomerSummary, FilterSpec, IngestReport, Kpis, MonthlyRevenue, RevenueSource};

/// Two decimals with thousands separators, e.g. `₹1,234.50`.
pub fn format_currency(value: f64, symbol: &str) -> String {
    let rendered = format!("{:.2}", value.abs());
    let (whole, fraction) = rendered.split_once('.').unwrap_or((rendered.as_str(), "00"));

    let mut grouped = String::new();
    for (idx, digit) in whole.chars().enumerate() {
        if idx > 0 && (whole.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 && rendered != "0.00" { "-" } else { "" };
    format!("{sign}{symbol}{grouped}.{fraction}")
}

fn format_optional(value: Option<f64>, render: impl Fn(f64) -> String) -> String {
    value.map(render).unwrap_or_else(|| "n/a".to_string())
}

pub fn describe_filter(filter: &FilterSpec) -> String {
    if filter.is_unfiltered() {
        return "all transactions".to_string();
    }

    let mut parts = Vec::new();
    if !filter.cities.is_empty() {
        parts.push(format!("city in [{}]", join(&filter.cities)));
    }
    if !filter.segments.is_empty() {
        parts.push(format!("segment in [{}]", join(&filter.segments)));
    }
    if let Some(range) = filter.date_range {
        parts.push(format!("orders from {} to {}", range.start(), range.end()));
    }
    parts.join(", ")
}

fn join<'a>(values: impl IntoIterator<Item = &'a String>) -> String {
    values.into_iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

pub fn render_kpis(kpis: &Kpis, currency: &str) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "Total Revenue: {}", format_currency(kpis.total_revenue, currency));
    let _ = writeln!(
        output,
        "Churn Rate:    {}",
        format_optional(kpis.churn_rate, |rate| format!("{rate:.2}%"))
    );
    let _ = writeln!(
        output,
        "Avg CLV:       {}",
        format_optional(kpis.avg_clv, |clv| format_currency(clv, currency))
    );
    output
}

pub fn render_trend(trend: &[MonthlyRevenue], currency: &str) -> String {
    let mut output = String::new();
    if trend.is_empty() {
        let _ = writeln!(output, "No dated orders in scope.");
        return output;
    }
    for month in trend {
        let _ = writeln!(
            output,
            "{}  {}",
            month.month_start.format("%Y-%m"),
            format_currency(month.revenue, currency)
        );
    }
    output
}

pub fn render_customer_table(
    customers: &[CustomerSummary],
    currency: &str,
    limit: usize,
) -> String {
    let mut output = String::new();
    if customers.is_empty() {
        let _ = writeln!(output, "No customers match.");
        return output;
    }

    let _ = writeln!(
        output,
        "{:<12} {:<24} {:>16} {:<14} {:<14} {}",
        "customer_id", "customer_name", "total_revenue", "city", "segment", "churned"
    );
    for customer in customers.iter().take(limit) {
        let _ = writeln!(
            output,
            "{:<12} {:<24} {:>16} {:<14} {:<14} {}",
            customer.customer_id,
            customer.customer_name.as_deref().unwrap_or("-"),
            format_currency(customer.total_revenue, currency),
            customer.city.as_deref().unwrap_or("-"),
            customer.segment.as_deref().unwrap_or("-"),
            yes_no(customer.is_churned)
        );
    }
    if customers.len() > limit {
        let _ = writeln!(output, "... {} more", customers.len() - limit);
    }
    output
}

pub fn render_profile(customer: &CustomerSummary, currency: &str) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "Name:        {}", customer.customer_name.as_deref().unwrap_or("-"));
    let _ = writeln!(output, "Total Spent: {}", format_currency(customer.total_revenue, currency));
    let _ = writeln!(output, "Orders:      {}", customer.num_orders);
    let _ = writeln!(
        output,
        "Last Active: {}",
        customer
            .last_order
            .map(|value| value.date().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    );
    let _ = writeln!(output, "Churned?     {}", yes_no(customer.is_churned));
    output
}

pub fn render_ingest_report(report: &IngestReport) -> String {
    let source = match report.revenue_source {
        RevenueSource::Column => "revenue column",
        RevenueSource::UnitPriceTimesQuantity => "unit_price * quantity",
        RevenueSource::Defaulted => "defaulted to 0.0 (no revenue inputs)",
    };

    let mut output = String::new();
    let _ = writeln!(output, "Rows read:                {}", report.rows_read);
    let _ = writeln!(output, "Revenue from:             {source}");
    let _ = writeln!(output, "Revenue defaulted:        {}", report.revenue_defaulted);
    let _ = writeln!(output, "Order dates nulled:       {}", report.dates_nulled);
    let _ = writeln!(output, "Rows without customer_id: {}", report.rows_without_customer_id);
    if !report.extra_columns.is_empty() {
        let _ = writeln!(output, "Extra columns kept:       {}", report.extra_columns.join(", "));
    }
    output
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}

pub fn build_report(
    view: &DashboardView<'_>,
    filter: &FilterSpec,
    currency: &str,
    top: usize,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Customer Revenue & Churn Report");
    let _ = writeln!(
        output,
        "Scope: {} ({} transactions, {} customers)",
        describe_filter(filter),
        view.filtered_rows.len(),
        view.customers.len()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## KPIs");
    let _ = writeln!(
        output,
        "- Total revenue: {}",
        format_currency(view.kpis.total_revenue, currency)
    );
    let _ = writeln!(
        output,
        "- Churn rate: {}",
        format_optional(view.kpis.churn_rate, |rate| format!("{rate:.2}%"))
    );
    let _ = writeln!(
        output,
        "- Avg CLV: {}",
        format_optional(view.kpis.avg_clv, |clv| format_currency(clv, currency))
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Revenue Trend");
    if view.trend.is_empty() {
        let _ = writeln!(output, "No dated orders in scope.");
    } else {
        let _ = writeln!(output, "| Month | Revenue |");
        let _ = writeln!(output, "|---|---:|");
        for month in &view.trend {
            let _ = writeln!(
                output,
                "| {} | {} |",
                month.month_start.format("%Y-%m"),
                format_currency(month.revenue, currency)
            );
        }
    }

    let mut ranked: Vec<&CustomerSummary> = view.matches.iter().collect();
    ranked.sort_by(|a, b| {
        b.total_revenue
            .partial_cmp(&a.total_revenue)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.customer_id.cmp(&b.customer_id))
    });

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top Customers");
    if ranked.is_empty() {
        let _ = writeln!(output, "No customers in scope.");
    } else {
        for customer in ranked.iter().take(top) {
            let _ = writeln!(
                output,
                "- {} ({}, {}) {} across {} orders",
                customer.customer_name.as_deref().unwrap_or(&customer.customer_id),
                customer.city.as_deref().unwrap_or("unknown city"),
                customer.segment.as_deref().unwrap_or("unknown segment"),
                format_currency(customer.total_revenue, currency),
                customer.num_orders
            );
        }
    }

    let churned: Vec<&CustomerSummary> = view.matches.iter().filter(|c| c.is_churned).collect();
    let _ = writeln!(output);
    let _ = writeln!(output, "## Churned Customers");
    if churned.is_empty() {
        let _ = writeln!(output, "No churned customers in scope.");
    } else {
        for customer in churned {
            let _ = writeln!(
                output,
                "- {} last active {}",
                customer.customer_name.as_deref().unwrap_or(&customer.customer_id),
                customer
                    .last_order
                    .map(|value| value.date().to_string())
                    .unwrap_or_else(|| "unknown".to_string())
            );
        }
    }

    output
}
