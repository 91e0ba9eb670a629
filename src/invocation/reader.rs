//! Live event stream reader.
//!
//! Tails the event file while the build runs, decoding frames as they land
//! and surfacing diagnostics to the output sink in real time. The reader is
//! best-effort: whatever it misses, the aggregation pass picks up afterwards
//! from offset zero.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::bep::{BuildEvent, ByteTailer, Decoded, FrameDecoder, TailError};
use crate::diagnostics::{BuildEventParser, Severity};
use crate::output::OutputSink;

/// Streams build events from the growing event file to the output sink.
pub struct EventStreamReader {
    tailer: ByteTailer,
    decoder: FrameDecoder,
    parser: BuildEventParser,
    sink: Arc<dyn OutputSink>,
    poll_interval: Duration,
}

impl EventStreamReader {
    #[must_use]
    pub fn new(
        tailer: ByteTailer,
        parser: BuildEventParser,
        sink: Arc<dyn OutputSink>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            tailer,
            decoder: FrameDecoder::new(),
            parser,
            sink,
            poll_interval,
        }
    }

    /// Run the reader until cancelled or the stream is exhausted.
    ///
    /// The reader waits for the event file to appear (the subprocess creates
    /// it on first write), then streams it until `cancel` fires or
    /// `process_done` fires and the file stops growing. After `process_done`
    /// it drains whatever remains before stopping.
    ///
    /// Returns the number of bytes consumed as complete frames.
    pub async fn run(mut self, cancel: CancellationToken, process_done: CancellationToken) -> u64 {
        if !self.wait_for_file(&cancel, &process_done).await {
            return self.decoder.bytes_consumed();
        }

        loop {
            if cancel.is_cancelled() {
                break;
            }
            // check before reading so bytes written just before exit are
            // still drained on the pass below
            let draining = process_done.is_cancelled();

            let bytes = match self.tailer.read_new_bytes().await {
                Ok(bytes) => bytes,
                Err(TailError::FileDeleted(path)) => {
                    tracing::warn!(path = %path.display(), "Build event file disappeared mid-stream");
                    break;
                }
                Err(error) => {
                    tracing::warn!(%error, "Stopping event stream");
                    break;
                }
            };

            if bytes.is_empty() {
                if draining {
                    break;
                }
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = process_done.cancelled() => {}
                    () = tokio::time::sleep(self.poll_interval) => {}
                }
                continue;
            }

            self.decoder.extend(&bytes);
            if !self.pump_events() {
                break;
            }
        }

        if self.decoder.pending_bytes() > 0 {
            tracing::debug!(
                pending = self.decoder.pending_bytes(),
                "Event stream ended with a partial frame"
            );
        }
        self.decoder.bytes_consumed()
    }

    /// Poll until the event file exists. Returns false if the reader should
    /// stop without streaming (cancelled, or the process exited without ever
    /// creating the file).
    async fn wait_for_file(
        &self,
        cancel: &CancellationToken,
        process_done: &CancellationToken,
    ) -> bool {
        loop {
            if self.tailer.path().exists() {
                return true;
            }
            if cancel.is_cancelled() {
                return false;
            }
            if process_done.is_cancelled() {
                // one last look; the file may have landed just before exit
                return self.tailer.path().exists();
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Decode everything currently buffered. Returns false on an
    /// unrecoverable framing failure.
    fn pump_events(&mut self) -> bool {
        loop {
            match self.decoder.try_next() {
                Ok(Decoded::Event(event)) => self.dispatch(&event),
                Ok(Decoded::Corrupt) => {}
                Ok(Decoded::NeedMoreData) => return true,
                Err(error) => {
                    tracing::warn!(%error, "Event stream framing lost; stopping live reader");
                    return false;
                }
            }
        }
    }

    fn dispatch(&self, event: &BuildEvent) {
        if let Some(diagnostic) = self.parser.parse(event) {
            match diagnostic.severity {
                Severity::Error => self.sink.set_has_error(),
                Severity::Warning => self.sink.set_has_warning(),
                Severity::Info => {}
            }
            self.sink.diagnostic(diagnostic);
        }
    }
}
