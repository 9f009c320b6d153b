use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, RecvTimeoutError, Sender};

use crate::{Embedding, Result, SpeakerError};

/// Computes a voiceprint from mono audio samples.
/// May fail on degenerate or too-short input.
pub trait SpeakerEncoder: Send + Sync {
    fn embed(&self, samples: &[f32], sample_rate: u32) -> Result<Embedding>;
}

enum EncodeRequest {
    Embed {
        samples: Vec<f32>,
        sample_rate: u32,
        reply: Sender<Result<Embedding>>,
    },
    Shutdown,
}

/// Runs an encoder on a dedicated thread and bounds each call with a deadline.
///
/// Each request carries its own reply channel, so a timed-out call cannot
/// leak its late result into the next one.
pub struct TimedEncoder {
    request_tx: Sender<EncodeRequest>,
    handle: Option<JoinHandle<()>>,
    timeout: Duration,
}

impl TimedEncoder {
    pub fn new<E>(encoder: E, timeout: Duration) -> Self
    where
        E: SpeakerEncoder + 'static,
    {
        let (request_tx, request_rx) = unbounded::<EncodeRequest>();

        let handle = thread::spawn(move || {
            while let Ok(request) = request_rx.recv() {
                match request {
                    EncodeRequest::Embed {
                        samples,
                        sample_rate,
                        reply,
                    } => {
                        let result = encoder.embed(&samples, sample_rate);
                        let _ = reply.send(result);
                    }
                    EncodeRequest::Shutdown => break,
                }
            }
        });

        Self {
            request_tx,
            handle: Some(handle),
            timeout,
        }
    }
}

impl SpeakerEncoder for TimedEncoder {
    fn embed(&self, samples: &[f32], sample_rate: u32) -> Result<Embedding> {
        let (reply_tx, reply_rx) = bounded(1);
        self.request_tx
            .send(EncodeRequest::Embed {
                samples: samples.to_vec(),
                sample_rate,
                reply: reply_tx,
            })
            .map_err(|_| SpeakerError::WorkerUnavailable)?;

        match reply_rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(timeout = ?self.timeout, "embedding call timed out");
                Err(SpeakerError::Timeout(self.timeout))
            }
            Err(RecvTimeoutError::Disconnected) => Err(SpeakerError::WorkerUnavailable),
        }
    }
}

impl Drop for TimedEncoder {
    fn drop(&mut self) {
        let _ = self.request_tx.send(EncodeRequest::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
