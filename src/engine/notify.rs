// src/engine/notify.rs

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::{
    engine::scoring::Classification,
    models::{attempt::CompletionResult, leaderboard::LeaderboardUpdate},
};

const BROADCAST_CAPACITY: usize = 256;

/// What collaborators learn about a finished attempt.
#[derive(Debug, Clone)]
pub struct CompletionNotice {
    pub participant_id: String,
    pub display_name: String,
    pub email: Option<String>,
    pub score: i32,
    pub total_questions: i64,
    pub percentage: i32,
    pub level: Classification,
    pub rank: Option<i64>,
}

#[derive(Debug)]
pub struct NotifyError(pub String);

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "notification failed: {}", self.0)
    }
}

impl std::error::Error for NotifyError {}

/// Delivers a completion notice (mail, push, ...). Failures never affect the
/// attempt.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn quiz_completed(&self, notice: &CompletionNotice) -> Result<(), NotifyError>;
}

/// Default notifier: records the notice in the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn quiz_completed(&self, notice: &CompletionNotice) -> Result<(), NotifyError> {
        tracing::info!(
            participant = %notice.participant_id,
            email = notice.email.as_deref().unwrap_or("-"),
            score = notice.score,
            total = notice.total_questions,
            level = %notice.level,
            rank = ?notice.rank,
            "Quiz completion notice"
        );
        Ok(())
    }
}

/// Fan-out of leaderboard updates to live subscribers.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    tx: broadcast::Sender<LeaderboardUpdate>,
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl Broadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LeaderboardUpdate> {
        self.tx.subscribe()
    }

    /// Sends to current subscribers. Having none is not an error.
    pub fn publish(&self, update: LeaderboardUpdate) {
        let _ = self.tx.send(update);
    }
}

/// Runs the post-completion side effects for a newly completed attempt.
///
/// The broadcast is immediate; the notifier runs on its own task so a slow or
/// failing delivery never holds the response.
pub fn dispatch_completion(
    notifier: Arc<dyn Notifier>,
    broadcaster: &Broadcaster,
    notice: CompletionNotice,
) {
    broadcaster.publish(LeaderboardUpdate {
        rank: notice.rank,
        name: notice.display_name.clone(),
        score: notice.score,
        percentage: notice.percentage,
        level: notice.level.as_str().to_string(),
    });

    tokio::spawn(async move {
        if let Err(e) = notifier.quiz_completed(&notice).await {
            tracing::warn!(participant = %notice.participant_id, "{}", e);
        }
    });
}

impl CompletionNotice {
    pub fn new(
        participant_id: &str,
        display_name: &str,
        email: Option<&str>,
        result: &CompletionResult,
    ) -> Self {
        Self {
            participant_id: participant_id.to_string(),
            display_name: display_name.to_string(),
            email: email.map(str::to_string),
            score: result.score,
            total_questions: result.total_questions,
            percentage: result.percentage,
            level: result.level,
            rank: result.rank,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingNotifier(Arc<AtomicUsize>);

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn quiz_completed(&self, _notice: &CompletionNotice) -> Result<(), NotifyError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(NotifyError("smtp down".to_string()))
        }
    }

    fn notice() -> CompletionNotice {
        CompletionNotice {
            participant_id: "p1".to_string(),
            display_name: "Awa".to_string(),
            email: None,
            score: 12,
            total_questions: 20,
            percentage: 60,
            level: Classification::Advanced,
            rank: Some(3),
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ignored() {
        Broadcaster::new().publish(LeaderboardUpdate {
            rank: None,
            name: "x".to_string(),
            score: 0,
            percentage: 0,
            level: "beginner".to_string(),
        });
    }

    #[tokio::test]
    async fn test_dispatch_broadcasts_and_swallows_notifier_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let broadcaster = Broadcaster::new();
        let mut rx = broadcaster.subscribe();

        dispatch_completion(Arc::new(FailingNotifier(calls.clone())), &broadcaster, notice());

        let update = rx.recv().await.unwrap();
        assert_eq!(update.rank, Some(3));
        assert_eq!(update.name, "Awa");
        assert_eq!(update.level, "advanced");

        for _ in 0..50 {
            if calls.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
