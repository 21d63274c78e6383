//! Reference schema derived from the training dataset.

use super::tenure::TenureBucket;
use super::{one_hot_column, CATEGORICAL_FEATURES, TENURE_GROUP};
use crate::error::{ServiceError, ServiceResult};
use std::collections::{BTreeSet, HashMap};
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

/// Column holding tenure in whole months
pub const TENURE_COLUMN: &str = "tenure";

/// Identifier and target columns, never features
pub const EXCLUDED_COLUMNS: [&str; 2] = ["customerID", "Churn"];

/// Cell values read as missing, the default NA markers of the training
/// toolchain's CSV reader
const NA_TOKENS: [&str; 19] = [
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Ordered, distinct one-hot column names the model was trained against.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceSchema {
    columns: Vec<String>,
    positions: HashMap<String, usize>,
}

impl ReferenceSchema {
    /// Build a schema from an explicit column list.
    pub fn from_columns(columns: Vec<String>) -> ServiceResult<Self> {
        let mut positions = HashMap::with_capacity(columns.len());
        for (index, column) in columns.iter().enumerate() {
            if positions.insert(column.clone(), index).is_some() {
                return Err(ServiceError::Dataset(format!(
                    "duplicate feature column '{column}'"
                )));
            }
        }
        Ok(Self { columns, positions })
    }

    /// Column names in model order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of feature columns
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the schema has no columns
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Position of a column in the model's feature order
    pub fn position(&self, column: &str) -> Option<usize> {
        self.positions.get(column).copied()
    }
}

/// Derives the [`ReferenceSchema`] from a CSV dataset with a header row.
///
/// Only the categorical fields (plus the derived tenure bucket) become
/// features. Identifier, target and numeric columns are ignored. Within a
/// field, categories are ordered lexicographically, which is the order the
/// training-side one-hot encoder emits them in.
pub struct SchemaBuilder;

impl SchemaBuilder {
    /// Create a schema builder
    pub fn new() -> Self {
        Self
    }

    /// Build the schema from a CSV file on disk
    pub fn build_from_path<P: AsRef<Path>>(&self, path: P) -> ServiceResult<ReferenceSchema> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading reference dataset");

        let file = std::fs::File::open(path).map_err(|e| {
            ServiceError::Dataset(format!("cannot open {}: {}", path.display(), e))
        })?;
        let schema = self
            .build_from_reader(file)
            .map_err(|e| match e {
                ServiceError::Dataset(msg) => {
                    ServiceError::Dataset(format!("{}: {}", path.display(), msg))
                }
                other => other,
            })?;

        info!(
            path = %path.display(),
            columns = schema.len(),
            "Training columns prepared"
        );
        Ok(schema)
    }

    /// Build the schema from any CSV source
    pub fn build_from_reader<R: Read>(&self, reader: R) -> ServiceResult<ReferenceSchema> {
        let mut csv = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);

        let headers = csv
            .headers()
            .map_err(|e| ServiceError::Dataset(format!("cannot read header row: {e}")))?
            .clone();
        let column_index = |name: &str| headers.iter().position(|h| h.trim() == name);

        let tenure_index = column_index(TENURE_COLUMN).ok_or_else(|| {
            ServiceError::Dataset(format!("missing required column '{TENURE_COLUMN}'"))
        })?;

        let absent: Vec<&str> = EXCLUDED_COLUMNS
            .into_iter()
            .filter(|name| column_index(*name).is_none())
            .collect();
        if !absent.is_empty() {
            warn!(absent = ?absent, "Identifier or target columns missing from dataset");
        }

        // (field, csv index) for every configured field present in the data;
        // the tenure bucket is derived, not read.
        let mut selected: Vec<(&'static str, Option<usize>)> = Vec::new();
        let mut missing: Vec<&'static str> = Vec::new();
        for field in CATEGORICAL_FEATURES {
            if field == TENURE_GROUP {
                selected.push((field, None));
                continue;
            }
            match column_index(field) {
                Some(index) => selected.push((field, Some(index))),
                None => missing.push(field),
            }
        }
        if !missing.is_empty() {
            warn!(
                missing = ?missing,
                "Categorical features missing from dataset will be skipped"
            );
        }

        let mut categories: Vec<BTreeSet<String>> = vec![BTreeSet::new(); selected.len()];
        let mut rows = 0usize;

        for (row, record) in csv.records().enumerate() {
            let record = record
                .map_err(|e| ServiceError::Dataset(format!("malformed row {}: {}", row + 1, e)))?;

            let raw_tenure = record.get(tenure_index).unwrap_or_default();
            let months = parse_tenure(raw_tenure).ok_or_else(|| {
                ServiceError::Dataset(format!(
                    "row {}: tenure '{}' is not an integer",
                    row + 1,
                    raw_tenure
                ))
            })?;
            let bucket = TenureBucket::from_months(months);

            for ((_, index), seen) in selected.iter().zip(categories.iter_mut()) {
                let value = match index {
                    Some(index) => cell_as_category(record.get(*index).unwrap_or_default()),
                    None => bucket.label().to_string(),
                };
                seen.insert(value);
            }
            rows += 1;
        }

        if rows == 0 {
            return Err(ServiceError::Dataset("dataset contains no rows".to_string()));
        }

        let columns: Vec<String> = selected
            .iter()
            .zip(categories.iter())
            .flat_map(|((field, _), values)| values.iter().map(move |v| one_hot_column(field, v)))
            .collect();

        debug!(rows = rows, columns = columns.len(), "One-hot schema derived");
        ReferenceSchema::from_columns(columns)
    }
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_tenure(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(months) = raw.parse::<i64>() {
        return Some(months);
    }
    // integral floats such as "12.0" truncate like an integer cast
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(|v| v.trunc() as i64)
}

/// Empty cells and NA markers are missing values and encode as `nan`
fn cell_as_category(cell: &str) -> String {
    if NA_TOKENS.contains(&cell) {
        "nan".to_string()
    } else {
        cell.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATASET: &str = "\
customerID,gender,SeniorCitizen,Partner,tenure,Contract,MonthlyCharges,TotalCharges,Churn
0001,Female,0,Yes,1,Month-to-month,29.85,29.85,No
0002,Male,0,No,34,One year,56.95,1889.5,No
0003,Male,1,No,2,Month-to-month,53.85,108.15,Yes
0004,Female,0,No,0,Two year,42.30, ,No
";

    fn build(data: &str) -> ServiceResult<ReferenceSchema> {
        SchemaBuilder::new().build_from_reader(data.as_bytes())
    }

    #[test]
    fn test_schema_column_order() {
        let schema = build(DATASET).unwrap();
        assert_eq!(
            schema.columns(),
            &[
                "gender_Female",
                "gender_Male",
                "SeniorCitizen_0",
                "SeniorCitizen_1",
                "Partner_No",
                "Partner_Yes",
                "Contract_Month-to-month",
                "Contract_One year",
                "Contract_Two year",
                "tenure_group_1-12",
                "tenure_group_25-36",
                "tenure_group_nan",
            ]
        );
        assert_eq!(schema.position("Contract_One year"), Some(7));
        assert_eq!(schema.position("customerID_0001"), None);
    }

    #[test]
    fn test_missing_configured_field_is_skipped() {
        // no PaymentMethod, InternetService, ... columns: still builds
        let schema = build("tenure,gender\n5,Female\n").unwrap();
        assert_eq!(schema.columns(), &["gender_Female", "tenure_group_1-12"]);
    }

    #[test]
    fn test_na_markers_encode_as_nan() {
        let data = "\
customerID,tenure,gender,Contract,Churn
a,5,Female,NA,No
b,6,Male,N/A,No
c,7,Female,null,Yes
d,8,None,One year,No
";
        let schema = build(data).unwrap();
        assert_eq!(
            schema.columns(),
            &[
                "gender_Female",
                "gender_Male",
                "gender_nan",
                "Contract_One year",
                "Contract_nan",
                "tenure_group_1-12",
            ]
        );
    }

    #[test]
    fn test_missing_tenure_column_fails() {
        let err = build("gender,Contract\nFemale,One year\n").unwrap_err();
        assert!(matches!(err, ServiceError::Dataset(_)));
    }

    #[test]
    fn test_non_integer_tenure_fails() {
        let err = build("tenure,gender\nabc,Female\n").unwrap_err();
        assert!(matches!(err, ServiceError::Dataset(msg) if msg.contains("abc")));
    }

    #[test]
    fn test_empty_dataset_fails() {
        assert!(build("tenure,gender\n").is_err());
    }

    #[test]
    fn test_ragged_row_fails() {
        assert!(build("tenure,gender\n5,Female,extra\n").is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = SchemaBuilder::new()
            .build_from_path("/nonexistent/reference.csv")
            .unwrap_err();
        assert!(err.is_initialization());
    }

    #[test]
    fn test_duplicate_columns_rejected() {
        let columns = vec!["a_1".to_string(), "a_1".to_string()];
        assert!(ReferenceSchema::from_columns(columns).is_err());
    }
}
