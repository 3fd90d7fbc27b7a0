//! Testing utilities and mock implementations.
//!
//! This module provides an in-memory backend implementing every I/O seam
//! of the engine, allowing end-to-end tests without a running dashboard.
//!
//! # Example
//!
//! ```rust,ignore
//! use livedash_core::testing::{fixtures, MockDashboard};
//!
//! let mock = MockDashboard::new();
//! mock.set_jobs(vec![fixtures::running_job(1)]);
//! mock.append_log(1, fixtures::FILE_LOG);
//! ```

mod mock_dashboard;

pub use mock_dashboard::MockDashboard;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::job::{Job, JobId, JobStatus};
    use crate::tasks::{ActiveTask, HistoryRow, TaskStatus};

    /// Log of one fully scraped file, as the job runner writes it.
    pub const FILE_LOG: &str = "\
2024-06-01 12:00:00 === [1/2] ABC-123.mp4 ===
2024-06-01 12:00:01 try crawler: javbus
2024-06-01 12:00:02 hit crawler: javbus title='Title' url='https://www.javbus.com/ABC-123'
2024-06-01 12:00:02 try crawler: dmm
2024-06-01 12:00:03 miss crawler: dmm
2024-06-01 12:00:03 live.json: {\"phase\":\"merged\",\"code\":\"ABC-123\",\"title\":\"Title\",\"url\":\"https://www.javbus.com/ABC-123\",\"release\":\"2021-01-02\",\"runtime\":\"120\",\"studio\":\"S1\",\"actors\":[\"A\"],\"tags\":[\"t\"],\"plot_len\":0,\"poster_url\":\"https://www.javbus.com/p.jpg\",\"fanart_url\":\"https://www.javbus.com/f.jpg\"}
2024-06-01 12:00:04 artwork try fanart: https://www.javbus.com/f.jpg
2024-06-01 12:00:05 artwork downloaded: ABC-123-fanart.jpg (2048 bytes) <- https://www.javbus.com/f.jpg
2024-06-01 12:00:05 poster cropped from fanart: ABC-123-poster.jpg (379x538)
2024-06-01 12:00:06 write nfo: ABC-123.nfo
";

    /// A running job with a two-file counter.
    pub fn running_job(id: JobId) -> Job {
        Job {
            current: 0,
            total: 2,
            directory: Some("/media/incoming".to_string()),
            ..Job::new(id, JobStatus::Running)
        }
    }

    pub fn history_row(id: &str, status: TaskStatus, created_at: &str) -> HistoryRow {
        HistoryRow {
            url: Some(format!("https://example.com/v/{}", id)),
            title: Some(format!("Title {}", id)),
            created_at: Some(created_at.to_string()),
            ..HistoryRow::new(id, status)
        }
    }

    pub fn active_task(id: &str, status: TaskStatus, progress: f64) -> ActiveTask {
        ActiveTask {
            progress: Some(progress),
            speed: Some("1.0 MB/s".to_string()),
            ..ActiveTask::new(id, status)
        }
    }
}
