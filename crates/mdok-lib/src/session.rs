//! Session segmentation and derived series views
//!
//! A container's series can span several monitoring runs. A session is a
//! maximal run of samples sharing an explicit session id or, for samples
//! without one, a run with no gap above `2 × interval + 5s`.
//!
//! Views over a subset of samples always recompute summary, warnings, cost
//! and recommendation; a cached whole-series summary is never reused.

use std::ops::Range;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::{advisor, stats, warnings};
use crate::config::MAX_INTERVAL_SECS;
use crate::models::{Architecture, ContainerSeries, Sample};

/// A contiguous range of samples within one series
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub range: Range<usize>,
}

impl Session {
    pub fn sample_count(&self) -> usize {
        self.range.len()
    }

    pub fn samples<'a>(&self, samples: &'a [Sample]) -> &'a [Sample] {
        &samples[self.range.clone()]
    }
}

/// Largest gap between samples that still belongs to one session.
///
/// Intervals above the configurable maximum are clamped to it.
pub fn gap_threshold(interval_secs: u64) -> Duration {
    let interval = interval_secs.min(MAX_INTERVAL_SECS) as i64;
    Duration::seconds(interval * 2 + 5)
}

/// Split samples into sessions, oldest first
pub fn segment(samples: &[Sample], interval_secs: u64) -> Vec<Session> {
    let threshold = gap_threshold(interval_secs);
    let mut sessions = Vec::new();
    let mut start = 0;

    for i in 1..samples.len() {
        if is_boundary(&samples[i - 1], &samples[i], threshold) {
            sessions.push(make_session(samples, start..i));
            start = i;
        }
    }
    if !samples.is_empty() {
        sessions.push(make_session(samples, start..samples.len()));
    }

    sessions
}

fn is_boundary(prev: &Sample, next: &Sample, threshold: Duration) -> bool {
    match (&prev.session_id, &next.session_id) {
        (None, None) => next.timestamp - prev.timestamp > threshold,
        (a, b) => a != b,
    }
}

fn make_session(samples: &[Sample], range: Range<usize>) -> Session {
    let first = &samples[range.start];
    let last = &samples[range.end - 1];
    let id = first
        .session_id
        .clone()
        .unwrap_or_else(|| first.timestamp.timestamp().to_string());

    Session {
        id,
        start: first.timestamp,
        end: last.timestamp,
        range,
    }
}

/// The most recent session
pub fn current_session(samples: &[Sample], interval_secs: u64) -> Option<Session> {
    segment(samples, interval_secs).pop()
}

pub fn session_by_id(samples: &[Sample], interval_secs: u64, id: &str) -> Option<Session> {
    segment(samples, interval_secs)
        .into_iter()
        .find(|s| s.id == id)
}

/// Fill summary, warnings, cost and recommendation from the series' samples.
///
/// The summary duration spans `start_time` to `end_time` (or the last sample
/// when the run has not ended). A series without samples gets no derived data.
pub fn derive(series: &mut ContainerSeries, region: Option<&str>) {
    let Some(mut summary) = stats::aggregate(&series.samples) else {
        series.summary = None;
        series.network_cost = None;
        series.recommendation = None;
        return;
    };

    let end = series
        .end_time
        .or_else(|| series.samples.last().map(|s| s.timestamp))
        .unwrap_or(series.start_time);
    summary.duration = stats::format_duration(end - series.start_time);
    summary.warnings = warnings::detect(&summary, &series.limits);

    let arch = Architecture::from_host(&series.host.architecture);
    series.network_cost = Some(advisor::estimate_cost(summary.net_tx_total, region));
    series.recommendation = advisor::recommend(&summary, arch);
    series.summary = Some(summary);
}

/// Derive only when nothing is cached yet
pub fn ensure_derived(series: &mut ContainerSeries, region: Option<&str>) {
    if series.summary.is_none() && !series.samples.is_empty() {
        derive(series, region);
    }
}

/// Copy of `series` restricted to `samples`, derived fields recomputed
fn restricted(
    series: &ContainerSeries,
    samples: Vec<Sample>,
    session_id: Option<String>,
    region: Option<&str>,
) -> ContainerSeries {
    let start_time = samples.first().map(|s| s.timestamp).unwrap_or(series.start_time);
    let end_time = samples.last().map(|s| s.timestamp).or(series.end_time);

    let mut view = ContainerSeries {
        container_id: series.container_id.clone(),
        container_name: series.container_name.clone(),
        image_name: series.image_name.clone(),
        host: series.host.clone(),
        limits: series.limits,
        start_time,
        end_time,
        interval_seconds: series.interval_seconds,
        session_id,
        samples,
        summary: None,
        network_cost: None,
        recommendation: None,
    };
    derive(&mut view, region);
    view
}

/// View of the most recent session
pub fn current_view(series: &ContainerSeries, region: Option<&str>) -> ContainerSeries {
    match current_session(&series.samples, series.interval_seconds) {
        Some(session) => {
            let samples = session.samples(&series.samples).to_vec();
            restricted(series, samples, Some(session.id), region)
        }
        None => restricted(series, Vec::new(), series.session_id.clone(), region),
    }
}

/// View of one session. An unknown id yields a view with no samples.
pub fn session_view(series: &ContainerSeries, id: &str, region: Option<&str>) -> ContainerSeries {
    let samples = session_by_id(&series.samples, series.interval_seconds, id)
        .map(|s| s.samples(&series.samples).to_vec())
        .unwrap_or_default();
    restricted(series, samples, Some(id.to_string()), region)
}

/// View of samples inside `[from, to]`; either bound may be open
pub fn window_view(
    series: &ContainerSeries,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
    region: Option<&str>,
) -> ContainerSeries {
    let samples = series
        .samples
        .iter()
        .filter(|s| from.map_or(true, |f| s.timestamp >= f))
        .filter(|s| to.map_or(true, |t| s.timestamp <= t))
        .cloned()
        .collect();
    restricted(series, samples, series.session_id.clone(), region)
}

/// Which part of a series a report covers
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    /// Whole series; cached derived data is kept
    All,
    /// Most recent session
    #[default]
    Current,
    Session(String),
    Window {
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    },
}

impl Selection {
    /// Samples within `span` of `now`
    pub fn last(span: Duration, now: DateTime<Utc>) -> Result<Self> {
        let from = now
            .checked_sub_signed(span)
            .with_context(|| format!("span {} reaches before the earliest supported time", span))?;
        Ok(Selection::Window {
            from: Some(from),
            to: Some(now),
        })
    }

    pub fn apply(&self, series: &ContainerSeries, region: Option<&str>) -> ContainerSeries {
        match self {
            Selection::All => {
                let mut all = series.clone();
                ensure_derived(&mut all, region);
                all
            }
            Selection::Current => current_view(series, region),
            Selection::Session(id) => session_view(series, id, region),
            Selection::Window { from, to } => window_view(series, *from, *to, region),
        }
    }
}

/// Parse a short span such as `90s`, `30m`, `1h` or `2d`
pub fn parse_span(text: &str) -> Result<Duration> {
    let text = text.trim();
    let Some(unit) = text.chars().last() else {
        bail!("empty duration");
    };
    let digits = &text[..text.len() - unit.len_utf8()];
    let value: i64 = digits
        .parse()
        .with_context(|| format!("invalid duration '{}'", text))?;
    if value < 0 {
        bail!("duration must not be negative: '{}'", text);
    }

    let span = match unit {
        's' => Duration::try_seconds(value),
        'm' => Duration::try_minutes(value),
        'h' => Duration::try_hours(value),
        'd' => Duration::try_days(value),
        _ => bail!("unknown duration unit in '{}' (use s, m, h or d)", text),
    };
    span.with_context(|| format!("duration '{}' is out of range", text))
}

/// One session across all containers of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub run: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub sample_count: usize,
    pub containers: Vec<String>,
}

/// Merge the sessions of every series by id, newest first
pub fn collect_sessions(run: &str, all: &[ContainerSeries]) -> Vec<SessionInfo> {
    let mut merged: Vec<SessionInfo> = Vec::new();

    for series in all {
        for session in segment(&series.samples, series.interval_seconds) {
            match merged.iter_mut().find(|s| s.session_id == session.id) {
                Some(existing) => {
                    if !existing.containers.contains(&series.container_name) {
                        existing.containers.push(series.container_name.clone());
                    }
                    existing.start_time = existing.start_time.min(session.start);
                    existing.end_time = existing.end_time.max(session.end);
                    existing.sample_count += session.sample_count();
                }
                None => merged.push(SessionInfo {
                    session_id: session.id.clone(),
                    run: run.to_string(),
                    start_time: session.start,
                    end_time: session.end,
                    sample_count: session.sample_count(),
                    containers: vec![series.container_name.clone()],
                }),
            }
        }
    }

    merged.sort_by(|a, b| {
        b.start_time
            .cmp(&a.start_time)
            .then_with(|| a.session_id.cmp(&b.session_id))
    });
    merged
}
