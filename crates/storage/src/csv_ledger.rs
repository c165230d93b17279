//! CSV file ledger.
//!
//! UTF-8, comma separated, one header row. Rows are encoded in memory and
//! appended with a single write so a crash never leaves a half-encoded
//! record behind another writer's row.

use crate::record::{LedgerRow, LEDGER_COLUMNS};
use crate::{Ledger, LedgerError, Result};
use epochgate_core::SubmissionAttempt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Append-only CSV ledger.
pub struct CsvLedger {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl CsvLedger {
    /// Open a ledger file, creating it with a header when missing or empty.
    ///
    /// An existing file whose header differs from [`LEDGER_COLUMNS`] is
    /// refused rather than reinterpreted.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        match fs::read(&path).await {
            Ok(bytes) if !bytes.is_empty() => {
                validate_header(&bytes)?;
                tracing::debug!("Opened existing ledger {}", path.display());
            }
            Ok(_) => write_header(&path).await?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => write_header(&path).await?,
            Err(e) => return Err(e.into()),
        }

        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }
}

async fn write_header(path: &Path) -> Result<()> {
    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(LEDGER_COLUMNS)?;
    let bytes = writer.into_inner().map_err(|e| LedgerError::Io(e.into_error()))?;
    fs::write(path, bytes).await?;
    tracing::info!("Created ledger {}", path.display());
    Ok(())
}

fn validate_header(bytes: &[u8]) -> Result<()> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(bytes);
    let found: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if found.iter().map(String::as_str).ne(LEDGER_COLUMNS.iter().copied()) {
        return Err(LedgerError::SchemaMismatch { found });
    }
    Ok(())
}

fn encode_row(row: &LedgerRow) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(Vec::new());
    writer.serialize(row)?;
    writer.into_inner().map_err(|e| LedgerError::Io(e.into_error()))
}

#[async_trait::async_trait]
impl Ledger for CsvLedger {
    async fn append(&self, attempt: &SubmissionAttempt) -> Result<()> {
        let row = LedgerRow::from_attempt(attempt);
        let bytes = encode_row(&row)?;

        let _guard = self.write_lock.lock().await;
        let mut file = fs::OpenOptions::new().append(true).open(&self.path).await?;
        file.write_all(&bytes).await?;
        file.sync_data().await?;

        tracing::debug!("[{}] Ledger row appended: {}", attempt.id, row.status);
        Ok(())
    }

    async fn read_all(&self) -> Result<Vec<LedgerRow>> {
        let bytes = fs::read(&self.path).await?;
        validate_header(&bytes)?;
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(bytes.as_slice());
        let mut rows = Vec::new();
        for row in reader.deserialize() {
            rows.push(row?);
        }
        Ok(rows)
    }
}
