//! Offset-based log tailer.

use chrono::Utc;
use tracing::debug;

use crate::client::ClientError;
use crate::job::JobId;
use crate::metrics::LOG_POLLS;
use crate::progress::{fold_into, ScrapeSessionState};

use super::{LogSource, PollOutcome};

/// Tails one job's log with a forward-only offset.
///
/// The offset is committed only after the caller has applied the text, and a
/// response that does not move strictly past the committed offset is dropped,
/// so no byte range is ever applied twice. A trailing partial line is held
/// back until its newline arrives.
#[derive(Debug)]
pub struct LogStreamReader {
    job_id: JobId,
    offset: u64,
    partial: String,
}

impl LogStreamReader {
    pub fn new(job_id: JobId) -> Self {
        Self {
            job_id,
            offset: 0,
            partial: String::new(),
        }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Committed offset; the next request starts here.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Text received but not yet applied because it lacks a newline.
    pub fn pending(&self) -> &str {
        &self.partial
    }

    /// Fetch the next chunk and hand its complete lines to `apply`.
    ///
    /// `apply` is not called when the log is missing, the response is stale,
    /// or the chunk holds no complete line. Transport errors leave the reader
    /// untouched so the next tick retries the same offset.
    pub async fn poll<S, F>(&mut self, source: &S, apply: F) -> Result<PollOutcome, ClientError>
    where
        S: LogSource + ?Sized,
        F: FnOnce(&str),
    {
        let chunk = match source.fetch_log(self.job_id, self.offset).await {
            Ok(chunk) => chunk,
            Err(e) => {
                LOG_POLLS.with_label_values(&["error"]).inc();
                return Err(e);
            }
        };

        if !chunk.exists {
            LOG_POLLS.with_label_values(&["missing"]).inc();
            return Ok(PollOutcome::Missing);
        }

        if chunk.next_offset <= self.offset {
            debug!(
                "Discarding log chunk for job {}: next_offset {} <= committed {}",
                self.job_id, chunk.next_offset, self.offset
            );
            LOG_POLLS.with_label_values(&["discarded"]).inc();
            return Ok(PollOutcome::Discarded {
                next_offset: chunk.next_offset,
            });
        }

        self.partial.push_str(&chunk.text);
        let complete = match self.partial.rfind('\n') {
            Some(pos) => {
                let rest = self.partial.split_off(pos + 1);
                std::mem::replace(&mut self.partial, rest)
            }
            None => String::new(),
        };
        if !complete.is_empty() {
            apply(&complete);
        }

        self.offset = chunk.next_offset;
        LOG_POLLS.with_label_values(&["applied"]).inc();
        Ok(PollOutcome::Applied {
            next_offset: self.offset,
        })
    }

    /// Take the held-back partial line, e.g. when the job has finished.
    pub fn take_pending(&mut self) -> String {
        std::mem::take(&mut self.partial)
    }
}

/// Fold the whole log of one item into a fresh session.
///
/// Returns `None` when the backend has no log for the item.
pub async fn fetch_item_session<S>(
    source: &S,
    job_id: JobId,
    filename: &str,
) -> Result<Option<ScrapeSessionState>, ClientError>
where
    S: LogSource + ?Sized,
{
    let item = source.fetch_item_log(job_id, filename).await?;
    if !item.exists {
        return Ok(None);
    }
    let mut state = ScrapeSessionState::new();
    fold_into(&mut state, &item.text, Utc::now());
    Ok(Some(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logtail::{ItemLog, LogChunk};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays scripted responses and records requested offsets.
    #[derive(Default)]
    struct Scripted {
        responses: Mutex<VecDeque<Result<LogChunk, ClientError>>>,
        requested: Mutex<Vec<u64>>,
    }

    impl Scripted {
        fn new(responses: Vec<Result<LogChunk, ClientError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requested: Mutex::new(Vec::new()),
            }
        }
    }

    fn chunk(text: &str, next_offset: u64) -> Result<LogChunk, ClientError> {
        Ok(LogChunk {
            exists: true,
            text: text.to_string(),
            next_offset,
        })
    }

    #[async_trait]
    impl LogSource for Scripted {
        async fn fetch_log(&self, _job_id: JobId, offset: u64) -> Result<LogChunk, ClientError> {
            self.requested.lock().unwrap().push(offset);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(LogChunk::missing()))
        }

        async fn fetch_item_log(
            &self,
            _job_id: JobId,
            filename: &str,
        ) -> Result<ItemLog, ClientError> {
            Ok(ItemLog {
                exists: filename == "A.mp4",
                text: "=== [1/1] A.mp4 ===\ntry crawler: dmm\nwrite nfo: A.nfo\n".to_string(),
                filename: filename.to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_offsets_advance_after_apply() {
        let source = Scripted::new(vec![chunk("a\n", 2), chunk("b\nc\n", 6)]);
        let mut reader = LogStreamReader::new(1);
        let mut applied = Vec::new();

        reader.poll(&source, |t| applied.push(t.to_string())).await.unwrap();
        reader.poll(&source, |t| applied.push(t.to_string())).await.unwrap();

        assert_eq!(applied, vec!["a\n", "b\nc\n"]);
        assert_eq!(reader.offset(), 6);
        assert_eq!(*source.requested.lock().unwrap(), vec![0, 2]);
    }

    #[tokio::test]
    async fn test_missing_log_applies_nothing() {
        let source = Scripted::new(vec![Ok(LogChunk::missing())]);
        let mut reader = LogStreamReader::new(1);
        let mut called = false;
        let outcome = reader.poll(&source, |_| called = true).await.unwrap();
        assert_eq!(outcome, PollOutcome::Missing);
        assert!(!called);
        assert_eq!(reader.offset(), 0);
    }

    #[tokio::test]
    async fn test_replayed_range_is_discarded() {
        let source = Scripted::new(vec![
            chunk("try crawler: a\n", 15),
            chunk("try crawler: a\n", 15),
            chunk("stale\n", 10),
        ]);
        let mut reader = LogStreamReader::new(1);
        let mut applied = 0;
        for _ in 0..3 {
            reader.poll(&source, |_| applied += 1).await.unwrap();
        }
        assert_eq!(applied, 1);
        assert_eq!(reader.offset(), 15);
    }

    #[tokio::test]
    async fn test_partial_line_held_back() {
        let source = Scripted::new(vec![chunk("try craw", 8), chunk("ler: a\nmiss", 19)]);
        let mut reader = LogStreamReader::new(1);
        let mut applied = Vec::new();

        let outcome = reader.poll(&source, |t| applied.push(t.to_string())).await.unwrap();
        assert_eq!(outcome, PollOutcome::Applied { next_offset: 8 });
        assert!(applied.is_empty());
        assert_eq!(reader.pending(), "try craw");

        reader.poll(&source, |t| applied.push(t.to_string())).await.unwrap();
        assert_eq!(applied, vec!["try crawler: a\n"]);
        assert_eq!(reader.take_pending(), "miss");
        assert_eq!(reader.pending(), "");
    }

    #[tokio::test]
    async fn test_error_keeps_offset() {
        let source = Scripted::new(vec![chunk("a\n", 2), Err(ClientError::Timeout), chunk("b\n", 4)]);
        let mut reader = LogStreamReader::new(1);
        reader.poll(&source, |_| {}).await.unwrap();
        assert!(reader.poll(&source, |_| {}).await.is_err());
        assert_eq!(reader.offset(), 2);
        reader.poll(&source, |_| {}).await.unwrap();
        assert_eq!(*source.requested.lock().unwrap(), vec![0, 2, 2]);
    }

    #[tokio::test]
    async fn test_fetch_item_session() {
        let source = Scripted::default();
        let state = fetch_item_session(&source, 1, "A.mp4").await.unwrap().unwrap();
        assert_eq!(state.current_file_name.as_deref(), Some("A.mp4"));
        assert!(state.nfo_done);
        assert!(fetch_item_session(&source, 1, "B.mp4").await.unwrap().is_none());
    }
}
