use std::fs::File;
use std::path::Path;
use std::sync::Mutex;

use crate::metadata::{ExportContext, ExportError, ExportRow, HistorySink, lock};
use crate::parsers::browser::VisitRecord;

const HEADER: [&str; 8] = [
    "browser",
    "timestamp",
    "title",
    "url",
    "domain",
    "visit_count",
    "tool_version",
    "config_hash",
];

pub struct CsvSink {
    ctx: ExportContext,
    writer: Mutex<csv::Writer<File>>,
}

impl CsvSink {
    pub fn new(ctx: ExportContext, path: &Path) -> Result<Self, ExportError> {
        let file = File::create(path)?;
        // header written by hand so an empty export still has one
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        writer.write_record(HEADER)?;
        Ok(Self {
            ctx,
            writer: Mutex::new(writer),
        })
    }
}

impl HistorySink for CsvSink {
    fn record_visit(&self, record: &VisitRecord) -> Result<(), ExportError> {
        let row = ExportRow::new(record, &self.ctx);
        let mut guard = lock(&self.writer)?;
        guard.serialize(row)?;
        Ok(())
    }

    fn flush(&self) -> Result<(), ExportError> {
        let mut guard = lock(&self.writer)?;
        guard.flush()?;
        Ok(())
    }
}
