//! CLI subcommand implementations

pub mod configs;
pub mod export;
pub mod sessions;
pub mod summary;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use clap::Args;
use mdok_lib::session::{parse_span, Selection};
use mdok_lib::{ContainerSeries, SeriesStore};

/// Which samples a report covers; defaults to the current session
#[derive(Debug, Clone, Default, Args)]
pub struct FilterArgs {
    /// Report a specific session id
    #[arg(long, conflicts_with_all = ["last", "from", "to", "all"])]
    pub session: Option<String>,

    /// Report the trailing span, e.g. 30m, 1h, 2d
    #[arg(long, conflicts_with_all = ["from", "to", "all"])]
    pub last: Option<String>,

    /// Window start (RFC 3339, `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DD`, UTC)
    #[arg(long)]
    pub from: Option<String>,

    /// Window end
    #[arg(long)]
    pub to: Option<String>,

    /// Report every sample across all sessions
    #[arg(long, conflicts_with_all = ["from", "to"])]
    pub all: bool,

    /// Only include this container
    #[arg(long, short)]
    pub container: Option<String>,

    /// Pricing region for egress cost
    #[arg(long, env = "MDOK_REGION")]
    pub region: Option<String>,
}

impl FilterArgs {
    pub fn selection(&self, now: DateTime<Utc>) -> Result<Selection> {
        if let Some(id) = &self.session {
            return Ok(Selection::Session(id.clone()));
        }
        if let Some(span) = &self.last {
            return Selection::last(parse_span(span)?, now);
        }
        if self.from.is_some() || self.to.is_some() {
            let from = self.from.as_deref().map(parse_time).transpose()?;
            let to = self.to.as_deref().map(parse_time).transpose()?;
            if let (Some(from), Some(to)) = (from, to) {
                if from > to {
                    bail!("--from must not be after --to");
                }
            }
            return Ok(Selection::Window { from, to });
        }
        if self.all {
            return Ok(Selection::All);
        }
        Ok(Selection::Current)
    }
}

/// Parse a user supplied timestamp, naive forms taken as UTC
pub fn parse_time(text: &str) -> Result<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(text) {
        return Ok(t.with_timezone(&Utc));
    }
    if let Ok(t) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Ok(t.and_utc());
    }
    let date = NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .with_context(|| format!("invalid time '{}'", text))?;
    date.and_hms_opt(0, 0, 0)
        .map(|t| t.and_utc())
        .with_context(|| format!("invalid time '{}'", text))
}

/// Load every series of a run and apply the filter
pub fn load_views(
    store: &SeriesStore,
    name: &str,
    filter: &FilterArgs,
) -> Result<Vec<ContainerSeries>> {
    let all = store
        .load_all(name)
        .with_context(|| format!("Failed to load data for '{}'", name))?;
    if all.is_empty() {
        bail!("no monitoring data for '{}'", name);
    }

    let selection = filter.selection(Utc::now())?;
    let region = filter.region.as_deref();
    let views: Vec<ContainerSeries> = all
        .iter()
        .filter(|s| {
            filter
                .container
                .as_deref()
                .map_or(true, |c| s.container_name == c)
        })
        .map(|s| selection.apply(s, region))
        .collect();

    if views.is_empty() {
        if let Some(container) = &filter.container {
            bail!("no data for container '{}' in '{}'", container, name);
        }
    }
    Ok(views)
}
