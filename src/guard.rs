// Staleness guard: a monotonic generation counter
// Each aggregation run holds a token; a token stops being current the moment
// a newer run begins. Late writers are rejected, never blocked.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// One per form session, shared by every run it starts
#[derive(Debug, Clone, Default)]
pub struct StalenessGuard {
    latest: Arc<AtomicU64>,
}

/// Identifies one aggregation run
#[derive(Debug, Clone)]
pub struct RunToken {
    generation: u64,
    latest: Arc<AtomicU64>,
}

/// Result of a step that may have been overtaken by a newer run
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome<T> {
    Current(T),
    Superseded,
}

impl StalenessGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the generation and hand out its token.
    /// The first token is generation 1; 0 means "nothing ever ran".
    pub fn begin_run(&self) -> RunToken {
        let generation = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        RunToken {
            generation,
            latest: Arc::clone(&self.latest),
        }
    }

    pub fn is_current(&self, token: &RunToken) -> bool {
        Arc::ptr_eq(&self.latest, &token.latest) && token.is_current()
    }

    pub fn latest(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }
}

impl RunToken {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self) -> bool {
        self.latest.load(Ordering::SeqCst) == self.generation
    }

    /// Wrap a value, or drop it if this run has been overtaken
    pub fn keep<T>(&self, value: T) -> RunOutcome<T> {
        if self.is_current() {
            RunOutcome::Current(value)
        } else {
            RunOutcome::Superseded
        }
    }
}

impl<T> RunOutcome<T> {
    pub fn is_superseded(&self) -> bool {
        matches!(self, RunOutcome::Superseded)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> RunOutcome<U> {
        match self {
            RunOutcome::Current(value) => RunOutcome::Current(f(value)),
            RunOutcome::Superseded => RunOutcome::Superseded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generations_strictly_increase() {
        let guard = StalenessGuard::new();
        assert_eq!(guard.latest(), 0);

        let a = guard.begin_run();
        let b = guard.begin_run();
        let c = guard.begin_run();

        assert_eq!(a.generation(), 1);
        assert_eq!(b.generation(), 2);
        assert_eq!(c.generation(), 3);
        assert_eq!(guard.latest(), 3);
    }

    #[test]
    fn test_only_latest_token_is_current() {
        let guard = StalenessGuard::new();
        let a = guard.begin_run();
        assert!(guard.is_current(&a));

        let b = guard.begin_run();
        assert!(!guard.is_current(&a));
        assert!(!a.is_current());
        assert!(guard.is_current(&b));
    }

    #[test]
    fn test_clones_share_the_counter() {
        let guard = StalenessGuard::new();
        let other = guard.clone();

        let a = guard.begin_run();
        let b = other.begin_run();

        assert_ne!(a.generation(), b.generation());
        assert!(guard.is_current(&b));
    }

    #[test]
    fn test_token_from_another_guard_never_current() {
        let first = StalenessGuard::new();
        let second = StalenessGuard::new();

        let token = first.begin_run();
        second.begin_run();

        assert!(!second.is_current(&token));
        assert!(first.is_current(&token));
    }

    #[test]
    fn test_keep_drops_superseded_values() {
        let guard = StalenessGuard::new();
        let a = guard.begin_run();
        assert_eq!(a.keep(5), RunOutcome::Current(5));

        guard.begin_run();
        assert!(a.keep(5).is_superseded());
        assert_eq!(a.keep(5).map(|v| v * 2), RunOutcome::Superseded);
    }

    #[tokio::test]
    async fn test_many_tasks_get_distinct_tokens() {
        let guard = StalenessGuard::new();
        let mut handles = Vec::new();
        for _ in 0..32 {
            let g = guard.clone();
            handles.push(tokio::spawn(async move { g.begin_run().generation() }));
        }

        let mut seen = Vec::new();
        for h in handles {
            seen.push(h.await.unwrap());
        }
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 32);
    }
}
