//! Record output on stdout.
//!
//! Logs go to stderr, so stdout carries nothing but records: a short
//! human-readable block per tag, or one JSON object per line with `--json`.

use std::io::{self, Write};

use tagscan_core::hex_upper;
use tagscan_scanner::{
    MemoryUnit, ProbeOutcome, RecordSink, ScanRecord, ScanSummary, TagDetails, UnitAddress, UnitOutcome,
};
use tracing::warn;

/// Writes every record it receives to `out`.
pub struct RecordPrinter<W: Write> {
    out: W,
    json: bool,
}

impl RecordPrinter<io::Stdout> {
    pub fn stdout(json: bool) -> Self {
        Self::new(io::stdout(), json)
    }
}

impl<W: Write> RecordPrinter<W> {
    pub fn new(out: W, json: bool) -> Self {
        Self { out, json }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_record(&mut self, record: &ScanRecord) -> io::Result<()> {
        if self.json {
            serde_json::to_writer(&mut self.out, record)?;
            writeln!(self.out)?;
        } else {
            write!(self.out, "{}", format_record(record))?;
        }
        self.out.flush()
    }
}

impl<W: Write> RecordSink for RecordPrinter<W> {
    fn emit(&mut self, record: ScanRecord) {
        if let Err(e) = self.write_record(&record) {
            warn!("Failed to write record: {}", e);
        }
    }
}

fn format_address(address: &UnitAddress) -> String {
    match address {
        UnitAddress::Block(index) => format!("block {index:>3}"),
        UnitAddress::Service { code, block } => format!("service {code:04X}/{block}"),
    }
}

fn format_unit(unit: &MemoryUnit) -> String {
    match &unit.outcome {
        UnitOutcome::Ok { data } => format!(
            "{}: {}",
            format_address(&unit.address),
            hex_upper(data.as_slice())
        ),
        UnitOutcome::Error { reason } => {
            format!("{}: error ({})", format_address(&unit.address), reason)
        }
    }
}

fn format_probe(probe: &ProbeOutcome) -> String {
    match probe {
        ProbeOutcome::Answered { sw, .. } => format!("answered {sw:04X}"),
        ProbeOutcome::Rejected { status } => format!("rejected {status:04X}"),
        ProbeOutcome::Failed { reason } => format!("failed ({reason})"),
    }
}

fn format_details(details: &TagDetails) -> Option<String> {
    match details {
        TagDetails::Memory {
            manufacturer,
            memory_size,
        } => Some(format!(
            "{}, {} bytes",
            manufacturer.as_deref().unwrap_or("unknown manufacturer"),
            memory_size
        )),
        TagDetails::Felica {
            system_code,
            service_codes,
        } => {
            let services: Vec<String> = service_codes.iter().map(|c| format!("{c:04X}")).collect();
            Some(format!(
                "system {}, services [{}]",
                system_code.map_or_else(|| "?".to_string(), |sc| format!("{sc:04X}")),
                services.join(" ")
            ))
        }
        TagDetails::IsoDep {
            manufacturer,
            probe,
        } => Some(format!(
            "{}, probe {}",
            manufacturer.as_deref().unwrap_or("unknown manufacturer"),
            format_probe(probe)
        )),
        TagDetails::Vicinity {
            manufacturer,
            block_size,
            block_count,
        } => Some(format!(
            "{}, {} x {} bytes",
            manufacturer.as_deref().unwrap_or("unknown manufacturer"),
            block_count,
            block_size
        )),
        TagDetails::Unknown => None,
    }
}

/// Human-readable rendering of one record.
pub fn format_record(record: &ScanRecord) -> String {
    let classification = &record.classification;
    let mut text = format!(
        "{} {} [{}]",
        classification.display_name,
        hex_upper(classification.id_bytes.as_slice()),
        classification.technology
    );
    if record.repeat {
        text.push_str(" (seen before)");
    }
    text.push('\n');

    let mut lines = Vec::new();
    lines.extend(format_details(&classification.details));
    lines.extend(record.memory.iter().map(format_unit));
    if !record.memory.is_empty() {
        lines.push(format!(
            "{}/{} units read",
            record.units_ok(),
            record.memory.len()
        ));
    }
    for line in lines {
        text.push_str("  ");
        text.push_str(&line);
        text.push('\n');
    }
    text
}

/// One-line end-of-run summary.
pub fn format_summary(summary: &ScanSummary) -> String {
    format!(
        "{} records ({} unique tags, {} skipped) in {} cycles, {:.1}s",
        summary.records,
        summary.unique_ids,
        summary.skipped,
        summary.cycles,
        summary.elapsed.as_secs_f64()
    )
}
