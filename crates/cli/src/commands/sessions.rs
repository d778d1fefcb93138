//! Session listing

use anyhow::Result;
use mdok_lib::analysis::stats::format_duration;
use mdok_lib::SeriesStore;
use serde::Serialize;
use tabled::Tabled;

use crate::output::{print_json, print_table, OutputFormat};

#[derive(Tabled, Serialize)]
struct SessionRow {
    #[tabled(rename = "Session")]
    session: String,
    #[tabled(rename = "Start")]
    start: String,
    #[tabled(rename = "End")]
    end: String,
    #[tabled(rename = "Duration")]
    duration: String,
    #[tabled(rename = "Samples")]
    samples: usize,
    #[tabled(rename = "Containers")]
    containers: String,
}

/// List the sessions of a run, newest first
pub fn list_sessions(store: &SeriesStore, name: &str, format: OutputFormat) -> Result<()> {
    let sessions = store.list_sessions(name)?;

    match format {
        OutputFormat::Json => print_json(&sessions),
        OutputFormat::Table => {
            let rows: Vec<SessionRow> = sessions
                .iter()
                .map(|s| SessionRow {
                    session: s.session_id.clone(),
                    start: s.start_time.format("%Y-%m-%d %H:%M:%S").to_string(),
                    end: s.end_time.format("%Y-%m-%d %H:%M:%S").to_string(),
                    duration: format_duration(s.end_time - s.start_time),
                    samples: s.sample_count,
                    containers: s.containers.join(", "),
                })
                .collect();
            print_table(&rows, format);
        }
    }

    Ok(())
}
