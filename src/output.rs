use std::fmt::Write;

use crate::error::{Error, Result};
use crate::state::SimulationResult;

pub trait Formatter {
    fn write(&self, result: &SimulationResult) -> Result<String>;
}

pub struct HumanFormatter;
pub struct SummaryFormatter;
pub struct CsvFormatter;
pub struct JsonFormatter;

impl Formatter for HumanFormatter {
    fn write(&self, result: &SimulationResult) -> Result<String> {
        let mut out = String::new();
        write_metadata(&mut out, result);
        out.push_str("Services:\n");
        for event in &result.service_log {
            let _ = writeln!(
                out,
                "Tick {} -> server {} (duration: {})",
                event.start_tick,
                event.server,
                event.duration
            );
        }
        if !result.interruptions.is_empty() {
            out.push_str("Interruptions:\n");
            for interruption in &result.interruptions {
                let _ = writeln!(
                    out,
                    "Tick {} -> server {} (remaining: {})",
                    interruption.tick,
                    interruption.server,
                    interruption.remaining_service
                );
            }
        }
        write_summary(&mut out, result);
        Ok(out)
    }
}

impl Formatter for SummaryFormatter {
    fn write(&self, result: &SimulationResult) -> Result<String> {
        let mut out = String::new();
        write_metadata(&mut out, result);
        write_summary(&mut out, result);
        Ok(out)
    }
}

impl Formatter for CsvFormatter {
    fn write(&self, result: &SimulationResult) -> Result<String> {
        let mut out = String::from("tick,queue_length,admitted");
        for idx in 1..=result.servers.len() {
            let _ = write!(out, ",server{idx}_occupied,server{idx}_available");
        }
        out.push('\n');

        for (row, tick) in result.ticks.iter().enumerate() {
            let _ = write!(
                out,
                "{},{},{}",
                tick, result.queue_length[row], result.admitted[row]
            );
            for series in &result.servers {
                let _ = write!(
                    out,
                    ",{},{}",
                    u8::from(series.occupied[row]),
                    u8::from(series.available[row])
                );
            }
            out.push('\n');
        }
        Ok(out)
    }
}

impl Formatter for JsonFormatter {
    fn write(&self, result: &SimulationResult) -> Result<String> {
        let mut out = serde_json::to_string_pretty(result)
            .map_err(|err| Error::Output(err.to_string()))?;
        out.push('\n');
        Ok(out)
    }
}

fn write_metadata(out: &mut String, result: &SimulationResult) {
    let metadata = &result.metadata;
    out.push_str("Metadata:\n");
    let _ = writeln!(out, "duration_ticks: {}", metadata.duration_ticks);
    let _ = writeln!(out, "servers: {}", metadata.servers);
    let _ = writeln!(out, "policy: {}", metadata.policy);
    match metadata.seed {
        Some(seed) => {
            let _ = writeln!(out, "seed: {}", seed);
        }
        None => out.push_str("seed: none\n"),
    }
}

fn write_summary(out: &mut String, result: &SimulationResult) {
    let summary = result.summary();
    out.push_str("Summary:\n");
    let _ = writeln!(out, "total_admitted: {}", summary.total_admitted);
    let _ = writeln!(out, "services_started: {}", summary.services_started);
    let _ = writeln!(out, "interruptions: {}", summary.interruptions);
    let _ = writeln!(out, "max_queue_length: {}", summary.max_queue_length);
    let _ = writeln!(out, "final_queue_length: {}", summary.final_queue_length);
    for server in &summary.servers {
        let _ = writeln!(
            out,
            "server {}: {} services, {} busy ticks, {} down ticks",
            server.server,
            server.services,
            server.busy_ticks,
            server.down_ticks
        );
    }
}
