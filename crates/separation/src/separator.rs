use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, RecvTimeoutError, Sender};

use crate::{Result, SeparationError};

/// Splits a two-speaker mixture into two estimated source streams.
///
/// The model is architecturally two-source: spans with more concurrent
/// speakers still come back as two streams.
pub trait SourceSeparator: Send + Sync {
    fn separate(&self, samples: &[f32], sample_rate: u32) -> Result<(Vec<f32>, Vec<f32>)>;

    /// Native rate of the returned streams.
    fn output_sample_rate(&self) -> u32;
}

enum SeparateRequest {
    Separate {
        samples: Vec<f32>,
        sample_rate: u32,
        reply: Sender<Result<(Vec<f32>, Vec<f32>)>>,
    },
    Shutdown,
}

/// Runs a separator on a dedicated thread and bounds each call with a
/// deadline. Replies travel on per-request channels, so a timed-out call
/// cannot leak its late result into the next one.
pub struct TimedSeparator {
    request_tx: Sender<SeparateRequest>,
    handle: Option<JoinHandle<()>>,
    output_rate: u32,
    timeout: Duration,
}

impl TimedSeparator {
    pub fn new<S>(separator: S, timeout: Duration) -> Self
    where
        S: SourceSeparator + 'static,
    {
        let output_rate = separator.output_sample_rate();
        let (request_tx, request_rx) = unbounded::<SeparateRequest>();

        let handle = thread::spawn(move || {
            while let Ok(request) = request_rx.recv() {
                match request {
                    SeparateRequest::Separate {
                        samples,
                        sample_rate,
                        reply,
                    } => {
                        let result = separator.separate(&samples, sample_rate);
                        let _ = reply.send(result);
                    }
                    SeparateRequest::Shutdown => break,
                }
            }
        });

        Self {
            request_tx,
            handle: Some(handle),
            output_rate,
            timeout,
        }
    }
}

impl SourceSeparator for TimedSeparator {
    fn separate(&self, samples: &[f32], sample_rate: u32) -> Result<(Vec<f32>, Vec<f32>)> {
        let (reply_tx, reply_rx) = bounded(1);
        self.request_tx
            .send(SeparateRequest::Separate {
                samples: samples.to_vec(),
                sample_rate,
                reply: reply_tx,
            })
            .map_err(|_| SeparationError::WorkerUnavailable)?;

        match reply_rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(timeout = ?self.timeout, "separation call timed out");
                Err(SeparationError::Timeout(self.timeout))
            }
            Err(RecvTimeoutError::Disconnected) => Err(SeparationError::WorkerUnavailable),
        }
    }

    fn output_sample_rate(&self) -> u32 {
        self.output_rate
    }
}

impl Drop for TimedSeparator {
    fn drop(&mut self) {
        let _ = self.request_tx.send(SeparateRequest::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoSeparator;

    impl SourceSeparator for EchoSeparator {
        fn separate(&self, samples: &[f32], _sample_rate: u32) -> Result<(Vec<f32>, Vec<f32>)> {
            Ok((samples.to_vec(), samples.iter().map(|s| -s).collect()))
        }

        fn output_sample_rate(&self) -> u32 {
            8000
        }
    }

    struct StuckSeparator;

    impl SourceSeparator for StuckSeparator {
        fn separate(&self, _samples: &[f32], _sample_rate: u32) -> Result<(Vec<f32>, Vec<f32>)> {
            thread::sleep(Duration::from_millis(200));
            Ok((Vec::new(), Vec::new()))
        }

        fn output_sample_rate(&self) -> u32 {
            8000
        }
    }

    #[test]
    fn test_guard_passes_streams_through() {
        let guard = TimedSeparator::new(EchoSeparator, Duration::from_secs(5));
        let (a, b) = guard.separate(&[0.5, -0.5], 16000).unwrap();
        assert_eq!(a, vec![0.5, -0.5]);
        assert_eq!(b, vec![-0.5, 0.5]);
        assert_eq!(guard.output_sample_rate(), 8000);
    }

    #[test]
    fn test_stuck_model_times_out() {
        let guard = TimedSeparator::new(StuckSeparator, Duration::from_millis(20));
        let result = guard.separate(&[0.0], 16000);
        assert!(matches!(result, Err(SeparationError::Timeout(_))));
    }
}
