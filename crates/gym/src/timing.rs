//! Nested wall-clock timers.
//!
//! A scope's *total* time is everything between `enter` and `exit`; its
//! *partial* time excludes the time spent in scopes nested inside it.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScopeTimes {
    pub calls: u64,
    pub total: Duration,
    pub partial: Duration,
}

#[derive(Debug)]
struct OpenScope {
    name: &'static str,
    started: Instant,
    nested: Duration,
}

#[derive(Debug, Default)]
pub struct TimeTracker {
    open: Vec<OpenScope>,
    scopes: BTreeMap<&'static str, ScopeTimes>,
}

impl TimeTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&mut self, name: &'static str) {
        self.open.push(OpenScope { name, started: Instant::now(), nested: Duration::ZERO });
    }

    /// Closes the innermost open scope and returns its `(total, partial)`
    /// time. Does nothing when no scope is open.
    pub fn exit(&mut self) -> Option<(Duration, Duration)> {
        let scope = self.open.pop()?;
        let total = scope.started.elapsed();
        let partial = total.saturating_sub(scope.nested);
        if let Some(parent) = self.open.last_mut() {
            parent.nested += total;
        }

        let entry = self.scopes.entry(scope.name).or_default();
        entry.calls += 1;
        entry.total += total;
        entry.partial += partial;
        debug!(
            scope = scope.name,
            total_us = u64::try_from(total.as_micros()).unwrap_or(u64::MAX),
            partial_us = u64::try_from(partial.as_micros()).unwrap_or(u64::MAX),
            "timed"
        );
        Some((total, partial))
    }

    /// Runs `f` inside a scope named `name`.
    pub fn time<T>(&mut self, name: &'static str, f: impl FnOnce(&mut Self) -> T) -> T {
        self.enter(name);
        let result = f(self);
        self.exit();
        result
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<ScopeTimes> {
        self.scopes.get(name).copied()
    }

    /// Accumulated times per scope name, alphabetically.
    pub fn summary(&self) -> impl Iterator<Item = (&'static str, ScopeTimes)> + '_ {
        self.scopes.iter().map(|(name, times)| (*name, *times))
    }

    pub fn clear(&mut self) {
        self.open.clear();
        self.scopes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_time_is_excluded_from_partial() {
        let mut tracker = TimeTracker::new();
        tracker.time("outer", |t| {
            std::thread::sleep(Duration::from_millis(2));
            t.time("inner", |_| std::thread::sleep(Duration::from_millis(10)));
        });
        let outer = tracker.get("outer").unwrap();
        let inner = tracker.get("inner").unwrap();
        assert_eq!(outer.calls, 1);
        assert!(outer.total >= inner.total);
        assert!(outer.partial < outer.total);
        assert!(inner.total >= Duration::from_millis(10));
    }

    #[test]
    fn exit_without_enter_is_ignored() {
        let mut tracker = TimeTracker::new();
        assert!(tracker.exit().is_none());
        assert_eq!(tracker.summary().count(), 0);
    }

    #[test]
    fn repeated_scopes_accumulate() {
        let mut tracker = TimeTracker::new();
        for _ in 0..3 {
            tracker.time("step", |_| ());
        }
        assert_eq!(tracker.get("step").unwrap().calls, 3);
    }
}
