//! Named background tasks that live and die with the core
//!
//! Every task gets a child of the core's root token. Cancelling one entry
//! leaves the others running; cancelling the root stops all of them.

use std::future::Future;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub struct Subscription {
    name: String,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |task| task.is_finished())
    }
}

pub struct Subscriptions {
    root: CancellationToken,
    entries: Vec<Subscription>,
}

impl Subscriptions {
    pub fn new(root: CancellationToken) -> Self {
        Self {
            root,
            entries: Vec::new(),
        }
    }

    /// Spawns `make(token)` under a fresh child token.
    pub fn spawn<F, Fut>(&mut self, name: impl Into<String>, make: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        let cancel = self.root.child_token();
        let task = tokio::spawn(make(cancel.clone()));
        debug!("Subscription started: {}", name);
        self.entries.push(Subscription {
            name,
            cancel,
            task: Some(task),
        });
    }

    /// Takes over a task started elsewhere, e.g. by an extension.
    pub fn adopt(
        &mut self,
        name: impl Into<String>,
        cancel: CancellationToken,
        task: Option<JoinHandle<()>>,
    ) {
        let name = name.into();
        debug!("Subscription adopted: {}", name);
        self.entries.push(Subscription { name, cancel, task });
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(Subscription::name).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Subscription> {
        self.entries.iter().find(|s| s.name == name)
    }

    /// Cancels a single entry. Returns false for unknown names.
    pub fn cancel(&self, name: &str) -> bool {
        match self.get(name) {
            Some(subscription) => {
                subscription.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancels the root and waits for every task. Returns how many tasks
    /// ended cleanly.
    pub async fn shutdown(&mut self) -> usize {
        self.root.cancel();
        let mut clean = 0;
        for mut subscription in self.entries.drain(..) {
            subscription.cancel.cancel();
            let Some(task) = subscription.task.take() else {
                clean += 1;
                continue;
            };
            match task.await {
                Ok(()) => {
                    debug!("Subscription stopped: {}", subscription.name);
                    clean += 1;
                }
                Err(e) => error!("Subscription {} ended abnormally: {}", subscription.name, e),
            }
        }
        info!("All subscriptions stopped ({} clean)", clean);
        clean
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn shutdown_cancels_and_joins_everything() {
        let root = CancellationToken::new();
        let mut subs = Subscriptions::new(root.clone());
        let stopped = Arc::new(AtomicUsize::new(0));

        for name in ["a", "b", "c"] {
            let stopped = stopped.clone();
            subs.spawn(name, |cancel| async move {
                cancel.cancelled().await;
                stopped.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(subs.names(), vec!["a", "b", "c"]);

        assert_eq!(subs.shutdown().await, 3);
        assert_eq!(stopped.load(Ordering::SeqCst), 3);
        assert!(root.is_cancelled());
        assert!(subs.is_empty());
    }

    #[tokio::test]
    async fn cancelling_one_leaves_the_rest() {
        let mut subs = Subscriptions::new(CancellationToken::new());
        subs.spawn("first", |cancel| async move { cancel.cancelled().await });
        subs.spawn("second", |cancel| async move { cancel.cancelled().await });

        assert!(subs.cancel("first"));
        assert!(!subs.cancel("third"));
        tokio::task::yield_now().await;
        tokio::time::timeout(std::time::Duration::from_secs(1), async {
            while !subs.get("first").unwrap().is_finished() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert!(!subs.get("second").unwrap().is_finished());

        subs.shutdown().await;
    }

    #[tokio::test]
    async fn adopted_entries_without_task_count_as_clean() {
        let mut subs = Subscriptions::new(CancellationToken::new());
        let token = CancellationToken::new();
        subs.adopt("passive", token.clone(), None);
        assert_eq!(subs.len(), 1);
        assert_eq!(subs.shutdown().await, 1);
    }

    #[tokio::test]
    async fn panicking_task_is_reported() {
        let mut subs = Subscriptions::new(CancellationToken::new());
        subs.spawn("boom", |_| async { panic!("boom") });
        subs.spawn("fine", |cancel| async move { cancel.cancelled().await });
        assert_eq!(subs.shutdown().await, 1);
    }
}
