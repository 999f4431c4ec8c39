use async_trait::async_trait;
use chrono::Utc;
use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::LocationError;
use crate::models::message::FeedRecord;
use crate::models::sample::Sample;
use crate::position::{PositionOptions, PositionProvider, PositionWatch};

/// Positioning backed by a JSON-lines file that a GNSS daemon appends fixes to.
pub struct FeedProvider {
    path: PathBuf,
    poll_interval: Duration,
}

impl FeedProvider {
    pub fn new(path: impl Into<PathBuf>, poll_interval: Duration) -> Self {
        Self {
            path: path.into(),
            poll_interval,
        }
    }
}

fn parse_line(line: &str) -> Option<Result<Sample, LocationError>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str::<FeedRecord>(line) {
        Ok(record) => record.into_event(),
        Err(e) => {
            warn!("Failed to parse feed line: {}", e);
            None
        }
    }
}

fn age_ms(sample: &Sample) -> i64 {
    Utc::now().timestamp_millis().saturating_sub(sample.timestamp)
}

/// Newest event in the feed file.
async fn newest_event(path: &Path) -> Result<Option<Result<Sample, LocationError>>, LocationError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Err(LocationError::Unavailable),
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            return Err(LocationError::PermissionDenied)
        }
        Err(e) => {
            warn!("Failed to read position feed {}: {}", path.display(), e);
            return Err(LocationError::Unavailable);
        }
    };
    Ok(content.lines().rev().find_map(parse_line))
}

#[async_trait]
impl PositionProvider for FeedProvider {
    async fn current_position(&self, options: PositionOptions) -> Result<Sample, LocationError> {
        let max_age_ms = options.maximum_age.as_millis() as i64;
        loop {
            match newest_event(&self.path).await? {
                Some(Ok(sample)) if age_ms(&sample) <= max_age_ms => return Ok(sample),
                Some(Err(e)) => return Err(e),
                // Stale or nothing yet: wait for the daemon to append a fresh fix.
                _ => tokio::time::sleep(self.poll_interval).await,
            }
        }
    }

    fn watch_position(&self, options: PositionOptions) -> Result<PositionWatch, LocationError> {
        if !self.path.exists() {
            return Err(LocationError::Unavailable);
        }

        let (tx, rx) = mpsc::channel(64);
        let path = self.path.clone();
        let poll_interval = self.poll_interval;
        let max_age_ms = options.maximum_age.as_millis() as i64;

        tokio::spawn(async move {
            let file = match File::open(&path).await {
                Ok(f) => f,
                Err(e) => {
                    warn!("Failed to open position feed {}: {}", path.display(), e);
                    let _ = tx.send(Err(LocationError::Unavailable)).await;
                    return;
                }
            };
            let mut reader = BufReader::new(file);
            if let Err(e) = reader.seek(SeekFrom::End(0)).await {
                warn!("Failed to seek position feed: {}", e);
                let _ = tx.send(Err(LocationError::Unavailable)).await;
                return;
            }
            info!("Tailing position feed {}", path.display());

            let mut line = String::new();
            let mut last_fix = Instant::now();
            let mut timeout_reported = false;

            loop {
                if tx.is_closed() {
                    break;
                }

                match reader.read_line(&mut line).await {
                    Ok(0) => {
                        if !timeout_reported && last_fix.elapsed() >= options.timeout {
                            timeout_reported = true;
                            if tx.send(Err(LocationError::Timeout)).await.is_err() {
                                break;
                            }
                        }
                        tokio::time::sleep(poll_interval).await;
                    }
                    // Partial line, the writer is mid-record.
                    Ok(_) if !line.ends_with('\n') => continue,
                    Ok(_) => {
                        let event = parse_line(&line);
                        line.clear();
                        let Some(event) = event else { continue };
                        // Fixes the daemon replays from its cache past the reuse window are not live.
                        if let Ok(sample) = &event {
                            if age_ms(sample) > max_age_ms {
                                debug!("Skipping stale fix from {}", sample.timestamp);
                                continue;
                            }
                        }
                        if event.is_ok() {
                            last_fix = Instant::now();
                            timeout_reported = false;
                        }
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Failed to read position feed: {}", e);
                        let _ = tx.send(Err(LocationError::Unavailable)).await;
                        break;
                    }
                }
            }
            debug!("Position feed watcher for {} stopped", path.display());
        });

        Ok(rx)
    }
}
