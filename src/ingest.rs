use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::error::{IngestError, UploadError};
use crate::models::{ColumnFacts, IngestReport, RevenueSource, TransactionRow, WorkingSet};
use crate::store::DocumentStore;

const KNOWN_COLUMNS: [&str; 10] = [
    "customer_id",
    "customer_name",
    "order_date",
    "city",
    "segment",
    "transaction_id",
    "revenue",
    "unit_price",
    "quantity",
    "is_churned",
];

const DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

pub fn load_csv(path: &Path) -> Result<(WorkingSet, IngestReport), IngestError> {
    let reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let (working_set, report) = read_records(reader)?;
    info!(
        path = %path.display(),
        rows = report.rows_read,
        "loaded working set"
    );
    Ok((working_set, report))
}

pub fn read_working_set<R: Read>(input: R) -> Result<(WorkingSet, IngestReport), IngestError> {
    let reader = csv::ReaderBuilder::new().flexible(true).from_reader(input);
    read_records(reader)
}

/// Result of one accepted upload: the new working set, what was repaired
/// while parsing it, and how many documents the store accepted.
#[derive(Debug)]
pub struct Upload {
    pub working_set: WorkingSet,
    pub report: IngestReport,
    pub written: u64,
}

/// Parses a CSV and appends every row to `collection` as a single batch.
/// A store failure aborts the upload; nothing is retried.
pub async fn upload<S, R>(store: &S, collection: &str, input: R) -> Result<Upload, UploadError>
where
    S: DocumentStore,
    R: Read,
{
    let (working_set, report) = read_working_set(input)?;
    let documents = to_documents(&working_set);
    let written = store.insert_batch(collection, documents).await?;

    info!(collection, rows = report.rows_read, written, "upload stored");

    Ok(Upload {
        working_set,
        report,
        written,
    })
}

struct ColumnIndex {
    positions: HashMap<String, usize>,
    extra: Vec<(String, usize)>,
}

impl ColumnIndex {
    fn from_headers(headers: &csv::StringRecord) -> Self {
        let mut positions = HashMap::new();
        let mut extra = Vec::new();

        for (idx, header) in headers.iter().enumerate() {
            let name = normalize_header(header);
            if positions.contains_key(&name) {
                continue;
            }
            if !KNOWN_COLUMNS.contains(&name.as_str()) {
                extra.push((name.clone(), idx));
            }
            positions.insert(name, idx);
        }

        Self { positions, extra }
    }

    fn has(&self, column: &str) -> bool {
        self.positions.contains_key(column)
    }

    fn cell<'r>(&self, record: &'r csv::StringRecord, column: &str) -> Option<&'r str> {
        self.positions
            .get(column)
            .and_then(|idx| record.get(*idx))
            .filter(|value| !value.is_empty())
    }
}

fn read_records<R: Read>(
    mut reader: csv::Reader<R>,
) -> Result<(WorkingSet, IngestReport), IngestError> {
    let columns = ColumnIndex::from_headers(reader.headers()?);
    if !columns.has("customer_id") {
        return Err(IngestError::MissingColumn("customer_id"));
    }

    let revenue_source = if columns.has("revenue") {
        RevenueSource::Column
    } else if columns.has("unit_price") && columns.has("quantity") {
        RevenueSource::UnitPriceTimesQuantity
    } else {
        RevenueSource::Defaulted
    };

    let mut report = IngestReport {
        rows_read: 0,
        revenue_source,
        dates_nulled: 0,
        revenue_defaulted: 0,
        rows_without_customer_id: 0,
        extra_columns: columns.extra.iter().map(|(name, _)| name.clone()).collect(),
    };
    let mut rows = Vec::new();

    for (sequence, result) in reader.records().enumerate() {
        let record = result?;
        let text = |column: &str| columns.cell(&record, column).map(str::to_string);
        let number = |column: &str| columns.cell(&record, column).and_then(parse_number);

        let unit_price = number("unit_price");
        let quantity = number("quantity");
        let revenue = match revenue_source {
            RevenueSource::Column => number("revenue"),
            RevenueSource::UnitPriceTimesQuantity => unit_price.zip(quantity).map(|(p, q)| p * q),
            RevenueSource::Defaulted => None,
        };
        if revenue.is_none() {
            report.revenue_defaulted += 1;
        }

        let order_date = columns.cell(&record, "order_date").and_then(parse_timestamp);
        if order_date.is_none() {
            report.dates_nulled += 1;
        }

        let customer_id = text("customer_id");
        if customer_id.is_none() {
            report.rows_without_customer_id += 1;
        }

        let extra = columns
            .extra
            .iter()
            .map(|(name, idx)| (name.clone(), record.get(*idx).unwrap_or_default().to_string()))
            .collect::<BTreeMap<_, _>>();

        rows.push(TransactionRow {
            sequence: sequence as u64,
            customer_id,
            customer_name: text("customer_name"),
            order_date,
            city: text("city"),
            segment: text("segment"),
            transaction_id: text("transaction_id"),
            unit_price,
            quantity,
            revenue: revenue.unwrap_or(0.0),
            is_churned: columns.cell(&record, "is_churned").and_then(parse_flag),
            extra,
        });
    }

    report.rows_read = rows.len();
    if report.revenue_defaulted > 0 {
        warn!(
            rows = report.revenue_defaulted,
            source = ?report.revenue_source,
            "revenue defaulted to zero"
        );
    }
    if report.dates_nulled > 0 {
        warn!(rows = report.dates_nulled, "order_date missing or unparseable");
    }

    let working_set = WorkingSet {
        rows,
        columns: ColumnFacts {
            has_customer_name: columns.has("customer_name"),
            has_churn_column: columns.has("is_churned"),
        },
    };

    Ok((working_set, report))
}

pub fn normalize_header(header: &str) -> String {
    header.trim().to_lowercase()
}

/// Coerces a date cell to a timestamp. Anything unrecognized becomes `None`.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.naive_utc());
    }

    for format in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Some(parsed);
        }
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

pub fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|value| value.is_finite())
}

pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" | "1.0" => Some(true),
        "false" | "f" | "no" | "n" | "0" | "0.0" => Some(false),
        _ => None,
    }
}

/// One JSON record per row, keyed by the normalized column names.
pub fn to_documents(working_set: &WorkingSet) -> Vec<Value> {
    working_set.rows.iter().map(row_document).collect()
}

fn row_document(row: &TransactionRow) -> Value {
    let mut document = Map::new();
    document.insert("customer_id".into(), json!(row.customer_id));
    document.insert("customer_name".into(), json!(row.customer_name));
    document.insert(
        "order_date".into(),
        json!(row
            .order_date
            .map(|value| value.format("%Y-%m-%dT%H:%M:%S").to_string())),
    );
    document.insert("city".into(), json!(row.city));
    document.insert("segment".into(), json!(row.segment));
    document.insert("transaction_id".into(), json!(row.transaction_id));
    document.insert("unit_price".into(), json!(row.unit_price));
    document.insert("quantity".into(), json!(row.quantity));
    document.insert("revenue".into(), json!(row.revenue));
    document.insert("is_churned".into(), json!(row.is_churned));

    for (name, raw) in &row.extra {
        document.insert(name.clone(), infer_value(raw));
    }

    Value::Object(document)
}

fn infer_value(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    if let Ok(integer) = raw.parse::<i64>() {
        return json!(integer);
    }
    if let Some(float) = parse_number(raw) {
        return json!(float);
    }
    match raw.to_lowercase().as_str() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(raw.to_string()),
    }
}
