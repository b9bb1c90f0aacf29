#![allow(dead_code)]

use std::sync::{Arc, Mutex};

/// Shared, ordered log of which member bodies ran.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: &str) {
        self.0.lock().expect("journal lock").push(entry.to_string());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().expect("journal lock").clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries().iter().filter(|e| e.as_str() == entry).count()
    }

    /// A body that records `entry` and succeeds.
    pub fn step<T: 'static>(
        &self,
        entry: &'static str,
    ) -> impl Fn(&mut T) -> anyhow::Result<()> + Send + Sync + 'static {
        let journal = self.clone();
        move |_: &mut T| {
            journal.push(entry);
            Ok(())
        }
    }

    /// A body that records `entry` and fails with `message`.
    pub fn failing<T: 'static>(
        &self,
        entry: &'static str,
        message: &'static str,
    ) -> impl Fn(&mut T) -> anyhow::Result<()> + Send + Sync + 'static {
        let journal = self.clone();
        move |_: &mut T| {
            journal.push(entry);
            anyhow::bail!(message)
        }
    }
}
