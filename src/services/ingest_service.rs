use crate::domain::recipient::{Recipient, normalize};
use crate::error::IngestionError;
use opentelemetry::{KeyValue, global, metrics::Counter};
use phonenumber::country;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Column headers recognized as holding a phone number, in priority order.
pub const PHONE_HEADER_SYNONYMS: &[&str] = &[
    "telefone",
    "phone",
    "cellphone",
    "celular",
    "whatsapp",
    "contato",
    "numero",
    "número",
    "phonenumber",
    "phone_number",
    "mobile",
    "mobile_number",
];

pub const DEFAULT_DELIMITER: u8 = b';';

/// Maps a delimiter selection such as `"; (semicolon)"` to its byte.
///
/// Only `;` and `,` are supported; anything else falls back to `;`.
#[must_use]
pub fn resolve_delimiter(selection: &str) -> u8 {
    if selection.starts_with(';') {
        b';'
    } else if selection.starts_with(',') {
        b','
    } else {
        tracing::warn!(selection = %selection, "Unsupported delimiter selected, falling back to ';'");
        DEFAULT_DELIMITER
    }
}

#[derive(Clone, Debug)]
struct Metrics {
    loaded: Counter<u64>,
    skipped: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("mass-dispatch");
        Self {
            loaded: meter
                .u64_counter("ingest_recipients_loaded_total")
                .with_description("Total number of recipients accepted from data files")
                .build(),
            skipped: meter
                .u64_counter("ingest_rows_skipped_total")
                .with_description("Total number of data rows skipped during ingestion")
                .build(),
        }
    }
}

/// Result of one successful file load.
#[derive(Debug, Clone)]
pub struct LoadedRecipients {
    pub recipients: Vec<Recipient>,
    pub file_name: String,
    pub column: String,
    pub skipped: usize,
}

#[derive(Debug, Clone)]
pub struct RecipientReader {
    default_region: country::Id,
    synonyms: Vec<String>,
    metrics: Metrics,
}

impl RecipientReader {
    #[must_use]
    pub fn new(default_region: country::Id) -> Self {
        Self {
            default_region,
            synonyms: PHONE_HEADER_SYNONYMS.iter().map(|s| (*s).to_string()).collect(),
            metrics: Metrics::new(),
        }
    }

    /// Replaces the recognized header synonyms. Matching stays case-insensitive.
    #[must_use]
    pub fn with_synonyms<I, S>(mut self, synonyms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.synonyms = synonyms.into_iter().map(|s| s.into().trim().to_lowercase()).collect();
        self
    }

    /// Reads the delimited file at `path` and normalizes its phone column.
    ///
    /// # Errors
    /// Returns `IngestionError::Io` if the file cannot be opened, or
    /// `IngestionError::NoIdentifierColumn` if no header matches a synonym.
    #[tracing::instrument(skip(self, path), fields(path = %path.display()), err(level = "error"))]
    pub fn read_file(&self, path: &Path, delimiter: &str) -> Result<LoadedRecipients, IngestionError> {
        let delimiter = resolve_delimiter(delimiter);
        tracing::info!(delimiter = %char::from(delimiter), "Opening recipient file");

        let file = File::open(path).map_err(|source| IngestionError::Io { path: path.to_path_buf(), source })?;
        let mut loaded = self.read_from(BufReader::new(file), delimiter)?;
        loaded.file_name =
            path.file_name().map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());

        tracing::info!(file = %loaded.file_name, count = loaded.recipients.len(), "Recipient file loaded");
        Ok(loaded)
    }

    /// Reads header-first delimited data from any reader.
    ///
    /// Rows with an empty or invalid phone value are logged and skipped; they
    /// never abort the load. Duplicates are kept in file order.
    ///
    /// # Errors
    /// Returns an error if the header row is unreadable or has no phone column.
    pub fn read_from<R: Read>(&self, reader: R, delimiter: u8) -> Result<LoadedRecipients, IngestionError> {
        let mut csv_reader =
            csv::ReaderBuilder::new().delimiter(delimiter).flexible(true).has_headers(true).from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        let (column_idx, column) = self
            .find_identifier_column(&headers)
            .ok_or_else(|| IngestionError::NoIdentifierColumn { expected: self.synonyms.clone() })?;
        tracing::info!(column = %column, "Phone column identified");

        let mut recipients = Vec::new();
        let mut skipped = 0usize;

        for result in csv_reader.records() {
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unreadable row");
                    skipped += 1;
                    continue;
                }
            };
            let line = record.position().map(csv::Position::line);
            let raw = record.get(column_idx).unwrap_or("").trim();

            if raw.is_empty() {
                tracing::warn!(?line, column = %column, "Skipping row without a phone number");
                skipped += 1;
                continue;
            }

            match normalize(raw, self.default_region) {
                Ok(recipient) => {
                    tracing::debug!(?line, recipient = %recipient, "Valid number processed");
                    recipients.push(recipient);
                }
                Err(e) => {
                    tracing::warn!(?line, raw = %e.raw, reason = %e.reason, "Skipping invalid phone number");
                    skipped += 1;
                }
            }
        }

        let column_attr = [KeyValue::new("column", column.clone())];
        self.metrics.loaded.add(recipients.len() as u64, &column_attr);
        self.metrics.skipped.add(skipped as u64, &column_attr);

        Ok(LoadedRecipients { recipients, file_name: String::new(), column, skipped })
    }

    /// The first synonym, in priority order, that names a header wins.
    fn find_identifier_column(&self, headers: &csv::StringRecord) -> Option<(usize, String)> {
        let normalized: Vec<String> =
            headers.iter().map(|h| h.trim_start_matches('\u{feff}').trim().to_lowercase()).collect();

        self.synonyms.iter().find_map(|synonym| {
            normalized.iter().position(|h| h == synonym).map(|idx| (idx, normalized[idx].clone()))
        })
    }
}
