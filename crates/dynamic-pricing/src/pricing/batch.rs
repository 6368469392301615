use std::io::{Read, Write};
use std::path::Path;

use rayon::prelude::*;
use serde_json::Value;

use super::composite::HourOfDay;
use super::composer::PricingResult;
use super::factors::{RawFactors, ValidationError};
use super::PricingEngine;

pub const PRICE_COLUMN: &str = "PredictedPrice";
pub const ERROR_COLUMN: &str = "Error";

#[derive(Debug, thiserror::Error)]
pub enum BatchImportError {
    #[error("failed to read batch input: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid batch CSV data: {0}")]
    Csv(#[from] csv::Error),
}

/// Applies the scalar pipeline to every record independently.
pub struct BatchEvaluator<'e> {
    engine: &'e PricingEngine,
}

impl<'e> BatchEvaluator<'e> {
    pub fn new(engine: &'e PricingEngine) -> Self {
        Self { engine }
    }

    /// Evaluates rows on the rayon pool; results keep the input order.
    pub fn evaluate(&self, records: &[RawFactors], hour: HourOfDay) -> BatchOutcome {
        let results: Vec<_> = records
            .par_iter()
            .map(|record| self.engine.quote(record, hour))
            .collect();
        BatchOutcome::logged(results, hour)
    }

    pub fn evaluate_sequential(&self, records: &[RawFactors], hour: HourOfDay) -> BatchOutcome {
        let results = records
            .iter()
            .map(|record| self.engine.quote(record, hour))
            .collect();
        BatchOutcome::logged(results, hour)
    }
}

/// Per-row results of a batch run; a failed row never affects its neighbours.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    results: Vec<Result<PricingResult, ValidationError>>,
}

impl BatchOutcome {
    fn logged(results: Vec<Result<PricingResult, ValidationError>>, hour: HourOfDay) -> Self {
        let outcome = Self { results };
        tracing::info!(
            rows = outcome.len(),
            priced = outcome.priced(),
            failed = outcome.failed(),
            hour = hour.get(),
            "batch evaluated"
        );
        outcome
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn priced(&self) -> usize {
        self.results.iter().filter(|result| result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.len() - self.priced()
    }

    pub fn results(&self) -> &[Result<PricingResult, ValidationError>] {
        &self.results
    }

    pub fn prices(&self) -> Vec<Option<f64>> {
        self.results
            .iter()
            .map(|result| result.as_ref().ok().map(|quote| quote.price))
            .collect()
    }

    pub fn into_results(self) -> Vec<Result<PricingResult, ValidationError>> {
        self.results
    }
}

/// CSV rows keyed by a header of factor names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvBatch {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl CsvBatch {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, BatchImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, BatchImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = csv_reader
            .headers()?
            .iter()
            .map(|header| header.replace('\u{feff}', "").trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self { headers, rows })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows as pricing records; empty cells are left out so defaults apply.
    pub fn records(&self) -> Vec<RawFactors> {
        self.rows
            .iter()
            .map(|row| {
                self.headers
                    .iter()
                    .zip(row)
                    .filter(|(_, cell)| !cell.is_empty())
                    .map(|(header, cell)| (header.clone(), Value::String(cell.clone())))
                    .collect()
            })
            .collect()
    }

    /// Echoes every input column and appends the price or the row's error.
    pub fn write_priced<W: Write>(
        &self,
        outcome: &BatchOutcome,
        writer: W,
    ) -> Result<(), BatchImportError> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        let mut header = self.headers.clone();
        header.push(PRICE_COLUMN.to_string());
        header.push(ERROR_COLUMN.to_string());
        csv_writer.write_record(&header)?;

        for (row, result) in self.rows.iter().zip(outcome.results()) {
            let mut line = row.clone();
            match result {
                Ok(quote) => {
                    line.push(format!("{:.2}", quote.price));
                    line.push(String::new());
                }
                Err(error) => {
                    line.push(String::new());
                    line.push(error.to_string());
                }
            }
            csv_writer.write_record(&line)?;
        }

        csv_writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\u{feff}BaseSellingPrice,UserHistory,Temperature,OSType\n\
100,VIP,25,iOS\n\
,Frequent,20,Android\n\
80,,,\n";

    fn hour() -> HourOfDay {
        HourOfDay::new(13).expect("valid hour")
    }

    #[test]
    fn csv_headers_drop_byte_order_mark() {
        let batch = CsvBatch::from_reader(SAMPLE.as_bytes()).expect("parses");
        assert_eq!(batch.headers()[0], "BaseSellingPrice");
        assert_eq!(batch.len(), 3);
    }

    #[test]
    fn empty_cells_are_left_out_of_records() {
        let batch = CsvBatch::from_reader(SAMPLE.as_bytes()).expect("parses");
        let records = batch.records();

        assert!(!records[1].contains_key("BaseSellingPrice"));
        assert_eq!(records[2].len(), 1);
        assert_eq!(
            records[0].get("UserHistory"),
            Some(&Value::String("VIP".to_string()))
        );
    }

    #[test]
    fn failed_rows_do_not_affect_neighbours() {
        let engine = PricingEngine::standard();
        let batch = CsvBatch::from_reader(SAMPLE.as_bytes()).expect("parses");
        let outcome = engine.batch().evaluate(&batch.records(), hour());

        assert_eq!(outcome.len(), 3);
        assert_eq!(outcome.priced(), 2);
        assert_eq!(outcome.failed(), 1);
        assert_eq!(
            outcome.results()[1],
            Err(ValidationError::MissingBasePrice)
        );
        assert_eq!(outcome.prices()[2], Some(80.0));
    }

    #[test]
    fn parallel_and_sequential_runs_agree() {
        let engine = PricingEngine::standard();
        let batch = CsvBatch::from_reader(SAMPLE.as_bytes()).expect("parses");
        let records = batch.records();

        let parallel = engine.batch().evaluate(&records, hour());
        let sequential = engine.batch().evaluate_sequential(&records, hour());
        assert_eq!(parallel, sequential);
    }

    #[test]
    fn priced_csv_appends_price_and_error_columns() {
        let engine = PricingEngine::standard();
        let batch = CsvBatch::from_reader(SAMPLE.as_bytes()).expect("parses");
        let outcome = engine.batch().evaluate(&batch.records(), hour());

        let mut buffer = Vec::new();
        batch.write_priced(&outcome, &mut buffer).expect("writes");
        let written = String::from_utf8(buffer).expect("utf8");
        let lines: Vec<_> = written.lines().collect();

        assert_eq!(
            lines[0],
            "BaseSellingPrice,UserHistory,Temperature,OSType,PredictedPrice,Error"
        );
        assert!(lines[2].ends_with(",BaseSellingPrice is missing"));
        assert_eq!(lines[3], "80,,,,80.00,");
    }

    #[test]
    fn ragged_rows_surface_csv_errors() {
        let error = CsvBatch::from_reader("BaseSellingPrice,UserHistory\n10,VIP,extra\n".as_bytes())
            .expect_err("ragged row");
        assert!(matches!(error, BatchImportError::Csv(_)));
    }
}
