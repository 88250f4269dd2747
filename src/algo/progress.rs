//! Progress reporting for iterative algorithms.
//!
//! Long-running operations such as
//! [`mean_curvature_flow_with_progress`](crate::algo::flow::mean_curvature_flow_with_progress)
//! accept a [`Progress`] and call it once per step.
//!
//! # Example
//!
//! ```
//! use cotan::algo::progress::Progress;
//!
//! let progress = Progress::new(|current, total, message| {
//!     println!("[{}/{}] {}", current, total, message);
//! });
//! progress.report(0, 10, "Mean curvature flow");
//! ```

/// A progress callback that receives updates during long-running operations.
///
/// The callback receives:
/// - `current`: Steps completed so far
/// - `total`: Total number of steps
/// - `message`: Description of the current operation
pub struct Progress {
    callback: Box<dyn Fn(usize, usize, &str) + Send + Sync>,
}

impl Progress {
    /// Create a new progress reporter with the given callback.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(usize, usize, &str) + Send + Sync + 'static,
    {
        Self {
            callback: Box::new(callback),
        }
    }

    /// Report progress.
    #[inline]
    pub fn report(&self, current: usize, total: usize, message: &str) {
        (self.callback)(current, total, message);
    }

    /// A reporter that discards all updates.
    pub fn none() -> Self {
        Self::new(|_, _, _| {})
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::none()
    }
}

impl std::fmt::Debug for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Progress").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_report_forwards_arguments() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let progress = {
            let seen = Arc::clone(&seen);
            Progress::new(move |current, total, message| {
                seen.lock().unwrap().push((current, total, message.to_string()));
            })
        };

        progress.report(1, 3, "step");
        progress.report(3, 3, "done");

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], (1, 3, "step".to_string()));
        assert_eq!(seen[1].0, 3);
    }

    #[test]
    fn test_none_is_silent() {
        let progress = Progress::default();
        progress.report(0, 1, "ignored");
        assert_eq!(format!("{:?}", progress), "Progress { .. }");
    }
}
