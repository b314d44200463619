use crate::error::JobError;
use crate::jobs::{Job, JobReport};
use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// When a job fires. Parsed from a cron expression (five fields with an implied
/// zero seconds field, or the six/seven field form) or from `@every <n><unit>`
/// with unit `ms`, `s`, `m` or `h`.
#[derive(Debug, Clone)]
pub enum Schedule {
    Cron(Box<cron::Schedule>),
    Every(Duration),
}

impl Schedule {
    /// Wait from `now` until the next tick; `None` when the schedule never fires again.
    pub fn next_delay(&self, now: DateTime<Utc>) -> Option<Duration> {
        match self {
            Schedule::Cron(schedule) => {
                let next = schedule.after(&now).next()?;
                Some((next - now).to_std().unwrap_or(Duration::ZERO))
            }
            Schedule::Every(interval) => Some(*interval),
        }
    }
}

fn parse_every(raw: &str) -> Result<Duration> {
    let raw = raw.trim();
    let split = raw.find(|c: char| !c.is_ascii_digit()).unwrap_or(raw.len());
    let (digits, unit) = raw.split_at(split);
    let n: u64 = digits.parse().with_context(|| format!("invalid interval '{raw}'"))?;
    let secs_per = |per: u64| n.checked_mul(per).with_context(|| format!("interval '{raw}' is too large"));
    let interval = match unit.trim() {
        "ms" => Duration::from_millis(n),
        "s" | "" => Duration::from_secs(n),
        "m" => Duration::from_secs(secs_per(60)?),
        "h" => Duration::from_secs(secs_per(3600)?),
        other => bail!("unknown interval unit '{other}'"),
    };
    if interval.is_zero() {
        bail!("interval must be positive");
    }
    Ok(interval)
}

impl FromStr for Schedule {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Some(rest) = s.strip_prefix("@every") {
            return Ok(Schedule::Every(parse_every(rest)?));
        }
        let expr = match s.split_whitespace().count() {
            5 => format!("0 {s}"),
            6 | 7 => s.to_string(),
            n => return Err(anyhow!("cron expression '{s}' has {n} fields, expected 5 to 7")),
        };
        let schedule = cron::Schedule::from_str(&expr).with_context(|| format!("invalid cron expression '{s}'"))?;
        Ok(Schedule::Cron(Box::new(schedule)))
    }
}

/// Runs each registered job on its own schedule.
///
/// Every job gets a dedicated loop, so a slow job never delays another. Within a loop a
/// run is awaited to completion before the next tick is computed: runs of one job never
/// overlap and ticks that pass while it is running are skipped.
#[derive(Default)]
pub struct Scheduler {
    entries: Vec<(Schedule, Arc<dyn Job>)>,
}

impl Scheduler {
    pub fn new() -> Self { Self::default() }

    pub fn with_job(mut self, schedule: Schedule, job: Arc<dyn Job>) -> Self {
        self.entries.push((schedule, job));
        self
    }

    /// Runs every job once, concurrently, and waits for all of them.
    pub async fn run_once(&self) -> Vec<(&'static str, Result<JobReport, JobError>)> {
        let handles: Vec<_> = self
            .entries
            .iter()
            .map(|(_, job)| {
                let job = job.clone();
                (job.name(), tokio::task::spawn_blocking(move || job.run()))
            })
            .collect();
        let mut results = Vec::with_capacity(handles.len());
        for (name, handle) in handles {
            match handle.await {
                Ok(result) => results.push((name, result)),
                Err(e) => error!(job = name, error = %e, "job run panicked"),
            }
        }
        results
    }

    /// Starts one loop per job. Loops exit once `shutdown` turns true or its sender is dropped.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        self.entries
            .into_iter()
            .map(|(schedule, job)| tokio::spawn(run_loop(schedule, job, shutdown.clone())))
            .collect()
    }
}

async fn run_loop(schedule: Schedule, job: Arc<dyn Job>, mut shutdown: watch::Receiver<bool>) {
    let name = job.name();
    info!(job = name, ?schedule, "job scheduled");
    loop {
        if *shutdown.borrow() {
            break;
        }
        let Some(delay) = schedule.next_delay(Utc::now()) else {
            warn!(job = name, "schedule has no upcoming ticks");
            break;
        };
        tokio::select! {
            result = shutdown.changed() => {
                if result.is_err() {
                    break;
                }
                continue;
            }
            _ = tokio::time::sleep(delay) => {}
        }
        execute(job.clone()).await;
    }
    info!(job = name, "job loop stopped");
}

async fn execute(job: Arc<dyn Job>) {
    let name = job.name();
    match tokio::task::spawn_blocking(move || job.run()).await {
        Ok(Ok(report)) => {
            info!(job = name, entries = report.entries, elapsed_ms = report.elapsed.as_millis() as u64, "ranking published");
        }
        Ok(Err(e)) => error!(job = name, error = %e, "job run failed; retrying next tick"),
        Err(e) => error!(job = name, error = %e, "job run panicked; retrying next tick"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn five_field_cron_gets_zero_seconds() {
        let schedule: Schedule = "*/1 * * * *".parse().unwrap();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 15).unwrap();
        assert_eq!(schedule.next_delay(now), Some(Duration::from_secs(45)));
    }

    #[test]
    fn six_field_cron_is_taken_verbatim() {
        let schedule: Schedule = "*/10 * * * * *".parse().unwrap();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 15).unwrap();
        assert_eq!(schedule.next_delay(now), Some(Duration::from_secs(5)));
    }

    #[test]
    fn every_intervals() {
        let now = Utc::now();
        let every = |s: &str| s.parse::<Schedule>().unwrap().next_delay(now).unwrap();
        assert_eq!(every("@every 30s"), Duration::from_secs(30));
        assert_eq!(every("@every 5m"), Duration::from_secs(300));
        assert_eq!(every("@every 2h"), Duration::from_secs(7200));
        assert_eq!(every("@every 250ms"), Duration::from_millis(250));
    }

    #[test]
    fn rejects_garbage() {
        assert!("".parse::<Schedule>().is_err());
        assert!("* *".parse::<Schedule>().is_err());
        assert!("61 * * * *".parse::<Schedule>().is_err());
        assert!("@every 0s".parse::<Schedule>().is_err());
        assert!("@every 5 fortnights".parse::<Schedule>().is_err());
        assert!("@every 18446744073709551615h".parse::<Schedule>().is_err());
        assert!("@every 18446744073709551615m".parse::<Schedule>().is_err());
    }
}
