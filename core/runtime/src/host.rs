// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! In-process service host
//!
//! Services register a request handler under a mount path. Requests are
//! delivered to the handler with an exact path match, or to the closest
//! namespace-owning ancestor for sub-paths. Unroutable requests are failed,
//! never dropped.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::errors::RuntimeError;
use crate::fault::ServiceFault;
use crate::operation::Operation;
use crate::uri;

/// Per-service registration flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceOptions {
    /// The service owns every URI under its mount path, not just the path
    /// itself.
    pub uri_namespace_owner: bool,
}

impl ServiceOptions {
    pub fn namespace_owner() -> Self {
        Self { uri_namespace_owner: true }
    }
}

/// Request entry point of a registered service.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, op: Operation);
}

/// Fire-and-forget transmission of an operation toward its target service.
/// The outcome is reported through the operation's completion.
pub trait RequestSender: Send + Sync {
    fn send(&self, op: Operation);
}

struct Mount {
    path: String,
    options: ServiceOptions,
    handler: Arc<dyn RequestHandler>,
}

struct HostInner {
    mounts: RwLock<Vec<Mount>>,
}

/// Registry of mounted services plus the delivery mechanism.
#[derive(Clone)]
pub struct ServiceHost {
    inner: Arc<HostInner>,
}

impl ServiceHost {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(HostInner { mounts: RwLock::new(Vec::new()) }),
        }
    }

    /// Mount a handler at a path. Fails when the path is already taken.
    pub fn register(
        &self,
        path: &str,
        options: ServiceOptions,
        handler: Arc<dyn RequestHandler>,
    ) -> Result<(), RuntimeError> {
        let path = uri::normalize_path(path);
        let mut mounts = self.inner.mounts.write();
        if mounts.iter().any(|m| m.path == path) {
            return Err(RuntimeError::AlreadyRegistered(path));
        }
        info!(%path, namespace_owner = options.uri_namespace_owner, "service registered");
        mounts.push(Mount { path, options, handler });
        Ok(())
    }

    /// Deliver an operation to its target service. Unknown paths fail the
    /// operation with status 404.
    pub async fn deliver(&self, op: Operation) {
        let path = uri::normalize_path(&op.path());
        let handler = self.resolve(&path);

        match handler {
            Some(handler) => handler.handle(op).await,
            None => {
                debug!(%path, "no service registered for path");
                op.fail(
                    ServiceFault::internal(format!("no service registered at {path}"))
                        .with_status(404),
                );
            }
        }
    }

    /// Sender that spawns delivery onto this host.
    pub fn sender(&self) -> LoopbackSender {
        LoopbackSender { host: self.clone() }
    }

    fn resolve(&self, path: &str) -> Option<Arc<dyn RequestHandler>> {
        let mounts = self.inner.mounts.read();

        if let Some(mount) = mounts.iter().find(|m| m.path == path) {
            return Some(mount.handler.clone());
        }

        // Closest namespace-owning ancestor wins.
        mounts
            .iter()
            .filter(|m| m.options.uri_namespace_owner && owns_sub_path(&m.path, path))
            .max_by_key(|m| m.path.len())
            .map(|m| m.handler.clone())
    }
}

impl Default for ServiceHost {
    fn default() -> Self {
        Self::new()
    }
}

fn owns_sub_path(mount: &str, path: &str) -> bool {
    if mount == "/" {
        return true;
    }
    path.len() > mount.len()
        && path.starts_with(mount)
        && path.as_bytes()[mount.len()] == b'/'
}

/// [`RequestSender`] backed by a [`ServiceHost`]: delivery runs on a spawned
/// task, completion callbacks fire from there.
#[derive(Clone)]
pub struct LoopbackSender {
    host: ServiceHost,
}

impl RequestSender for LoopbackSender {
    fn send(&self, op: Operation) {
        let host = self.host.clone();
        tokio::spawn(async move {
            host.deliver(op).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Echo {
        hits: AtomicUsize,
    }

    #[async_trait]
    impl RequestHandler for Echo {
        async fn handle(&self, op: Operation) {
            self.hits.fetch_add(1, Ordering::SeqCst);
            op.complete();
        }
    }

    #[tokio::test]
    async fn test_register_and_deliver() {
        let host = ServiceHost::new();
        let echo = Arc::new(Echo { hits: AtomicUsize::new(0) });
        host.register("/documents", ServiceOptions::default(), echo.clone()).unwrap();

        let op = Operation::get("/documents");
        host.deliver(op.clone()).await;
        assert!(op.is_completed());
        assert_eq!(echo.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_duplicate_registration() {
        let host = ServiceHost::new();
        let echo = Arc::new(Echo { hits: AtomicUsize::new(0) });
        host.register("/documents", ServiceOptions::default(), echo.clone()).unwrap();
        let err = host.register("/documents/", ServiceOptions::default(), echo).unwrap_err();
        assert!(matches!(err, RuntimeError::AlreadyRegistered(_)));
    }

    #[tokio::test]
    async fn test_unknown_path_fails_operation() {
        let host = ServiceHost::new();
        let op = Operation::get("/nowhere");
        host.deliver(op.clone()).await;
        assert!(op.is_completed());
        assert_eq!(op.status_code(), 404);
    }

    #[tokio::test]
    async fn test_namespace_owner_receives_sub_paths() {
        let host = ServiceHost::new();
        let plain = Arc::new(Echo { hits: AtomicUsize::new(0) });
        let owner = Arc::new(Echo { hits: AtomicUsize::new(0) });
        host.register("/plain", ServiceOptions::default(), plain.clone()).unwrap();
        host.register("/owned", ServiceOptions::namespace_owner(), owner.clone()).unwrap();

        // Sub-path of a non-owner is unroutable.
        let op = Operation::get("/plain/sub");
        host.deliver(op.clone()).await;
        assert_eq!(op.status_code(), 404);
        assert_eq!(plain.hits.load(Ordering::SeqCst), 0);

        // Sub-path of an owner lands on the owner.
        let op = Operation::get("/owned/sub/path");
        host.deliver(op.clone()).await;
        assert_eq!(op.status_code(), 200);
        assert_eq!(owner.hits.load(Ordering::SeqCst), 1);

        // Sibling prefix without a segment boundary does not match.
        let op = Operation::get("/ownedx");
        host.deliver(op.clone()).await;
        assert_eq!(op.status_code(), 404);
    }

    #[tokio::test]
    async fn test_loopback_sender() {
        let host = ServiceHost::new();
        let echo = Arc::new(Echo { hits: AtomicUsize::new(0) });
        host.register("/documents", ServiceOptions::default(), echo).unwrap();

        let (tx, rx) = tokio::sync::oneshot::channel();
        let op = Operation::get("/documents");
        op.set_completion(move |_, failure| {
            let _ = tx.send(failure.is_none());
        });

        host.sender().send(op);
        assert!(rx.await.unwrap());
    }
}
