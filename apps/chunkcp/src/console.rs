//! Terminal progress display.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use chunkcp_transfer::{Phase, ProgressReporter, TransferEvent};
use indicatif::{ProgressBar, ProgressStyle};

use crate::size::{format_duration, format_size};

/// Draws one byte-based bar for the split and transfer phases and prints
/// per-chunk notices above it.
pub struct ConsoleProgress {
    bar: ProgressBar,
    total_bytes: u64,
    transferred: AtomicU64,
    transfer_started: Mutex<Option<Instant>>,
}

impl ConsoleProgress {
    pub fn new(total_bytes: u64) -> Self {
        let bar = ProgressBar::new(total_bytes);
        bar.set_style(bar_style());
        Self {
            bar,
            total_bytes,
            transferred: AtomicU64::new(0),
            transfer_started: Mutex::new(None),
        }
    }

    /// Removes the bar once the run is over.
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }

    fn start_phase(&self, phase: Phase) {
        self.bar.println(format!("{phase}"));
        match phase {
            Phase::Split | Phase::Transfer => {
                self.bar.set_position(0);
                self.bar.set_length(self.total_bytes);
                self.bar.set_message(phase.to_string());
                if phase == Phase::Transfer {
                    self.transferred.store(0, Ordering::Relaxed);
                    *self.started_lock() = Some(Instant::now());
                }
            }
            _ => self.bar.set_message(phase.to_string()),
        }
    }

    fn started_lock(&self) -> std::sync::MutexGuard<'_, Option<Instant>> {
        self.transfer_started
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn chunk_done(&self, bytes: u64) {
        let done = self.transferred.fetch_add(bytes, Ordering::Relaxed) + bytes;
        self.bar.set_position(done);

        let Some(started) = *self.started_lock() else {
            return;
        };
        let (rate, eta) = throughput(done, self.total_bytes, started.elapsed());
        let eta = eta
            .map(|d| format!(", eta {}", format_duration(d)))
            .unwrap_or_default();
        self.bar
            .set_message(format!("{}/s{eta}", format_size(rate as u64)));
    }
}

/// Average rate since the transfer phase began and the time left at that rate.
///
/// Chunk completions arrive in large steps, so the whole-phase average is
/// steadier than a short sliding window.
fn throughput(done: u64, total: u64, elapsed: Duration) -> (f64, Option<Duration>) {
    if done == 0 || elapsed.is_zero() {
        return (0.0, None);
    }
    let rate = done as f64 / elapsed.as_secs_f64();
    let remaining = total.saturating_sub(done);
    (rate, Some(Duration::from_secs_f64(remaining as f64 / rate)))
}

/// Line printed above the bar for a per-chunk event. Chunks are numbered
/// from 1 in every notice.
fn chunk_notice(event: &TransferEvent) -> Option<String> {
    match event {
        TransferEvent::ChunkStarted {
            index,
            total,
            attempt,
            queued,
        } => {
            let retry = if *attempt > 1 {
                format!(" (attempt {attempt})")
            } else {
                String::new()
            };
            Some(format!(
                "Starting chunk: {}/{total}, {queued} queued{retry}",
                index + 1
            ))
        }
        TransferEvent::ChunkRequeued {
            index,
            retries_left,
        } => Some(format!(
            "Re-queuing failed chunk {}, {retries_left} attempt(s) left",
            index + 1
        )),
        TransferEvent::ChunkAbandoned { index, attempts } => Some(format!(
            "ERROR: FAILED to upload chunk {} after {attempts} attempt(s)",
            index + 1
        )),
        _ => None,
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-")
}

impl ProgressReporter for ConsoleProgress {
    fn report(&self, event: &TransferEvent) {
        if let Some(line) = chunk_notice(event) {
            self.bar.println(line);
            return;
        }
        match event {
            TransferEvent::PhaseStarted(phase) => self.start_phase(*phase),
            TransferEvent::ChunkWritten { bytes, .. } => self.bar.inc(*bytes),
            TransferEvent::ChunkFinished { bytes, .. } => self.chunk_done(*bytes),
            TransferEvent::Reassembled { index, total } => {
                self.bar
                    .set_message(format!("re-assembled {}/{}", index + 1, total));
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_notices_share_one_based_numbering() {
        let started = chunk_notice(&TransferEvent::ChunkStarted {
            index: 4,
            total: 10,
            attempt: 2,
            queued: 3,
        })
        .unwrap();
        let requeued = chunk_notice(&TransferEvent::ChunkRequeued {
            index: 4,
            retries_left: 1,
        })
        .unwrap();
        let abandoned = chunk_notice(&TransferEvent::ChunkAbandoned {
            index: 4,
            attempts: 3,
        })
        .unwrap();

        assert_eq!(started, "Starting chunk: 5/10, 3 queued (attempt 2)");
        assert_eq!(requeued, "Re-queuing failed chunk 5, 1 attempt(s) left");
        assert_eq!(abandoned, "ERROR: FAILED to upload chunk 5 after 3 attempt(s)");
    }

    #[test]
    fn first_attempt_has_no_retry_suffix() {
        let line = chunk_notice(&TransferEvent::ChunkStarted {
            index: 0,
            total: 1,
            attempt: 1,
            queued: 0,
        });
        assert_eq!(line.as_deref(), Some("Starting chunk: 1/1, 0 queued"));
    }

    #[test]
    fn other_events_print_nothing() {
        assert!(chunk_notice(&TransferEvent::PhaseStarted(Phase::Split)).is_none());
        assert!(
            chunk_notice(&TransferEvent::ChunkFinished {
                index: 0,
                total: 1,
                bytes: 10,
            })
            .is_none()
        );
    }

    #[test]
    fn throughput_from_elapsed_time() {
        let (rate, eta) = throughput(1000, 3000, Duration::from_secs(2));
        assert_eq!(rate, 500.0);
        assert_eq!(eta, Some(Duration::from_secs(4)));

        let (_, eta) = throughput(3000, 3000, Duration::from_secs(2));
        assert_eq!(eta, Some(Duration::ZERO));
    }

    #[test]
    fn throughput_without_progress() {
        assert_eq!(throughput(0, 3000, Duration::from_secs(5)), (0.0, None));
        assert_eq!(throughput(100, 3000, Duration::ZERO), (0.0, None));
    }
}
