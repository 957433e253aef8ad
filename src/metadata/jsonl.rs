use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use crate::metadata::{ExportContext, ExportError, ExportRow, HistorySink, lock};
use crate::parsers::browser::VisitRecord;

/// One JSON object per line.
pub struct JsonlSink {
    ctx: ExportContext,
    writer: Mutex<BufWriter<File>>,
}

impl JsonlSink {
    pub fn new(ctx: ExportContext, path: &Path) -> Result<Self, ExportError> {
        let file = File::create(path)?;
        Ok(Self {
            ctx,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }
}

impl HistorySink for JsonlSink {
    fn record_visit(&self, record: &VisitRecord) -> Result<(), ExportError> {
        let row = ExportRow::new(record, &self.ctx);
        let mut guard = lock(&self.writer)?;
        serde_json::to_writer(&mut *guard, &row)?;
        guard.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&self) -> Result<(), ExportError> {
        let mut guard = lock(&self.writer)?;
        guard.flush()?;
        Ok(())
    }
}
