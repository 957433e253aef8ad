use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use crate::metadata::{ExportContext, ExportError, ExportRow, HistorySink, lock};
use crate::parsers::browser::VisitRecord;

struct ArrayWriter {
    out: BufWriter<File>,
    rows: usize,
    closed: bool,
}

/// A single pretty-printed JSON array. The closing bracket is written on flush, so
/// rows recorded after a flush are rejected.
pub struct JsonSink {
    ctx: ExportContext,
    writer: Mutex<ArrayWriter>,
}

impl JsonSink {
    pub fn new(ctx: ExportContext, path: &Path) -> Result<Self, ExportError> {
        let mut out = BufWriter::new(File::create(path)?);
        out.write_all(b"[")?;
        Ok(Self {
            ctx,
            writer: Mutex::new(ArrayWriter {
                out,
                rows: 0,
                closed: false,
            }),
        })
    }
}

impl HistorySink for JsonSink {
    fn record_visit(&self, record: &VisitRecord) -> Result<(), ExportError> {
        let row = ExportRow::new(record, &self.ctx);
        let mut guard = lock(&self.writer)?;
        if guard.closed {
            return Err(ExportError::Io(std::io::Error::other("json array already closed")));
        }
        let sep: &[u8] = if guard.rows == 0 { b"\n" } else { b",\n" };
        guard.out.write_all(sep)?;
        serde_json::to_writer_pretty(&mut guard.out, &row)?;
        guard.rows += 1;
        Ok(())
    }

    fn flush(&self) -> Result<(), ExportError> {
        let mut guard = lock(&self.writer)?;
        if !guard.closed {
            let tail: &[u8] = if guard.rows == 0 { b"]\n" } else { b"\n]\n" };
            guard.out.write_all(tail)?;
            guard.closed = true;
        }
        guard.out.flush()?;
        Ok(())
    }
}
