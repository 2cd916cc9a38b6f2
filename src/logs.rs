use std::future::Future;
use std::time::Duration;

use crate::api::CloudBackupApi;
use crate::error::ApiError;

/// Result of one log refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct LogUpdate {
    /// Full log text as returned by the server.
    pub text: String,
    /// Text not present in the previous refresh, when the two overlap.
    pub appended: Option<String>,
    /// Jump to the end of the log; only done on the first load.
    pub scroll_to_bottom: bool,
}

/// Polls the tail of a task's log.
pub struct LogFollower<'a, A> {
    api: &'a A,
    task: String,
    lines: u32,
    last: Option<String>,
}

impl<'a, A: CloudBackupApi> LogFollower<'a, A> {
    pub fn new(api: &'a A, task: &str, lines: u32) -> Self {
        Self {
            api,
            task: task.to_string(),
            lines,
            last: None,
        }
    }

    pub async fn poll(&mut self) -> Result<LogUpdate, ApiError> {
        let text = self.api.task_logs(&self.task, self.lines).await?;
        let scroll_to_bottom = self.last.is_none();
        let appended = self
            .last
            .as_deref()
            .and_then(|previous| appended_text(previous, &text));
        self.last = Some(text.clone());
        Ok(LogUpdate {
            text,
            appended,
            scroll_to_bottom,
        })
    }

    /// Polls every `interval` until `stop` resolves.
    ///
    /// Failed polls are logged and retried on the next tick.
    pub async fn follow<F, S>(&mut self, interval: Duration, stop: S, mut on_update: F)
    where
        F: FnMut(&LogUpdate),
        S: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tokio::pin!(stop);

        loop {
            tokio::select! {
                _ = &mut stop => break,
                _ = ticker.tick() => match self.poll().await {
                    Ok(update) => on_update(&update),
                    Err(e) => tracing::error!("Failed to fetch logs for {}: {}", self.task, e),
                },
            }
        }
        tracing::debug!("Stopped following logs for {}", self.task);
    }
}

/// Lines of `current` that follow the part it shares with `previous`.
///
/// The server returns a fixed-size tail, so older lines drop off the front
/// as new ones arrive; the overlap is the longest line-aligned suffix of
/// `previous` that starts `current`.
fn appended_text(previous: &str, current: &str) -> Option<String> {
    let starts = std::iter::once(0).chain(previous.match_indices('\n').map(|(i, _)| i + 1));
    for start in starts {
        let overlap = &previous[start..];
        if overlap.is_empty() {
            break;
        }
        if let Some(rest) = current.strip_prefix(overlap) {
            return Some(rest.to_string());
        }
    }
    None
}
