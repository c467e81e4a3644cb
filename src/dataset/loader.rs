use crate::error::{AppError, Result};
use crate::models::{Diet, FeatureVector, FEATURE_NAMES, N_FEATURES};
use csv::{ReaderBuilder, StringRecord, Trim};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

/// Column holding the free-text diet category
pub const DIET_COLUMN: &str = "diet";

/// Tokens read as a missing value
const MISSING_TOKENS: &[&str] = &[
    "", "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "-nan", "null", "NULL", "None", "<NA>", "#N/A",
];

/// One row of the source dataset, before any cleaning
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub length_m: Option<f64>,
    pub max_ma: Option<f64>,
    pub min_ma: Option<f64>,
    pub diet: Option<String>,
}

impl RawRecord {
    fn numeric(&self) -> [Option<f64>; N_FEATURES] {
        [self.length_m, self.max_ma, self.min_ma]
    }
}

/// A row that survived diet filtering, with every numeric field filled
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CleanedRecord {
    pub features: FeatureVector,
    pub diet: Diet,
}

/// What cleaning did to the raw rows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleaningReport {
    pub rows_read: usize,
    pub rows_missing_diet: usize,
    pub rows_out_of_scope: usize,
    pub rows_kept: usize,

    /// Values filled per feature column, in `FEATURE_NAMES` order
    pub imputed: [usize; N_FEATURES],

    /// Medians over the kept rows; `None` when a column had no values at all
    pub medians: [Option<f64>; N_FEATURES],
}

/// Result of loading and cleaning a dataset
#[derive(Debug, Clone)]
pub struct CleanedDataset {
    pub records: Vec<CleanedRecord>,
    pub report: CleaningReport,
}

impl CleanedDataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Reads specimen CSV files and applies the cleaning policy
#[derive(Debug, Clone, Default)]
pub struct DatasetLoader;

impl DatasetLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load and clean the CSV file at `path`
    pub fn load_path<P: AsRef<Path>>(&self, path: P) -> Result<CleanedDataset> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading dataset");

        let file = std::fs::File::open(path).map_err(|e| {
            AppError::DataLoad(format!("cannot open dataset {}: {}", path.display(), e))
        })?;

        let raw = self.read_raw(file).map_err(|e| match e {
            AppError::DataLoad(msg) => {
                AppError::DataLoad(format!("{} ({})", msg, path.display()))
            }
            other => other,
        })?;

        clean(raw)
    }

    /// Parse raw records from any CSV source.
    ///
    /// Header names are trimmed before lookup. Short rows are tolerated and
    /// their absent fields read as missing.
    pub fn read_raw<R: Read>(&self, source: R) -> Result<Vec<RawRecord>> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(source);

        let headers = reader.headers()?.clone();
        let columns = ColumnIndex::resolve(&headers)?;

        let mut records = Vec::new();
        for (row, result) in reader.records().enumerate() {
            let record = result?;
            records.push(columns.extract(&record, row + 1)?);
        }

        debug!(n_rows = records.len(), "Parsed raw dataset");
        Ok(records)
    }
}

/// Positions of the four required columns
struct ColumnIndex {
    numeric: [usize; N_FEATURES],
    diet: usize,
}

impl ColumnIndex {
    fn resolve(headers: &StringRecord) -> Result<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| AppError::DataLoad(format!("missing required column '{}'", name)))
        };

        Ok(Self {
            numeric: [find(FEATURE_NAMES[0])?, find(FEATURE_NAMES[1])?, find(FEATURE_NAMES[2])?],
            diet: find(DIET_COLUMN)?,
        })
    }

    fn extract(&self, record: &StringRecord, row: usize) -> Result<RawRecord> {
        let mut numeric = [None; N_FEATURES];
        for (slot, (&idx, name)) in numeric
            .iter_mut()
            .zip(self.numeric.iter().zip(FEATURE_NAMES))
        {
            *slot = parse_number(record.get(idx), name, row)?;
        }

        let diet = record
            .get(self.diet)
            .filter(|v| !is_missing(v))
            .map(str::to_string);

        Ok(RawRecord {
            length_m: numeric[0],
            max_ma: numeric[1],
            min_ma: numeric[2],
            diet,
        })
    }
}

fn is_missing(value: &str) -> bool {
    MISSING_TOKENS.contains(&value.trim())
}

fn parse_number(value: Option<&str>, column: &str, row: usize) -> Result<Option<f64>> {
    match value {
        None => Ok(None),
        Some(v) if is_missing(v) => Ok(None),
        Some(v) => v
            .trim()
            .parse::<f64>()
            .map(|n| n.is_finite().then_some(n))
            .map_err(|_| {
                AppError::DataLoad(format!(
                    "row {}: column '{}' holds non-numeric value '{}'",
                    row, column, v
                ))
            }),
    }
}

/// Apply the cleaning policy to raw rows.
///
/// Rows with a missing diet, or a diet other than carnivorous/herbivorous,
/// are dropped. Missing numeric values are then filled with the column
/// median over the rows that were kept.
pub fn clean(raw: Vec<RawRecord>) -> Result<CleanedDataset> {
    let mut report = CleaningReport {
        rows_read: raw.len(),
        ..Default::default()
    };

    let mut kept: Vec<(RawRecord, Diet)> = Vec::with_capacity(raw.len());
    for record in raw {
        let Some(category) = record.diet.as_deref() else {
            report.rows_missing_diet += 1;
            continue;
        };
        match Diet::from_category(category) {
            Some(diet) => kept.push((record, diet)),
            None => report.rows_out_of_scope += 1,
        }
    }

    for col in 0..N_FEATURES {
        let mut present: Vec<f64> = kept.iter().filter_map(|(r, _)| r.numeric()[col]).collect();
        report.medians[col] = median(&mut present);
        report.imputed[col] = kept.len() - present.len();
    }

    let mut records = Vec::with_capacity(kept.len());
    for (record, diet) in kept {
        let mut values = [0.0; N_FEATURES];
        for (col, value) in record.numeric().into_iter().enumerate() {
            values[col] = match value.or(report.medians[col]) {
                Some(v) => v,
                None => {
                    return Err(AppError::DataLoad(format!(
                        "column '{}' has no values to impute from",
                        FEATURE_NAMES[col]
                    )))
                }
            };
        }
        records.push(CleanedRecord {
            features: FeatureVector::new(values[0], values[1], values[2]),
            diet,
        });
    }
    report.rows_kept = records.len();

    if report.rows_out_of_scope > 0 || report.rows_missing_diet > 0 {
        warn!(
            missing_diet = report.rows_missing_diet,
            out_of_scope = report.rows_out_of_scope,
            "Dropped rows outside the carnivorous/herbivorous scope"
        );
    }
    info!(
        rows_read = report.rows_read,
        rows_kept = report.rows_kept,
        imputed = ?report.imputed,
        "Dataset cleaned"
    );

    Ok(CleanedDataset { records, report })
}

/// Median with the midpoint rule for even counts
pub fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}
