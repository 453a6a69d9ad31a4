//! Cancellation scopes
//!
//! A scope pairs a propagating cancellation signal with a task tracker.
//! Parent shutdown implies child shutdown; a child can also be shut down on
//! its own without disturbing the parent. Tasks are never force-terminated:
//! they observe the exit signal and are expected to return promptly.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::debug;

/// Lifecycle state of a scope
///
/// A scope traverses the three states exactly once, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeState {
    /// Accepting tasks; exit signal not fired.
    Running,
    /// Exit signal fired; waiting for tasks and children to return.
    Stopping,
    /// Every task and descendant has returned.
    Stopped,
}

type Hook = Box<dyn FnOnce() + Send>;

/// A cancellation domain owning background tasks and child scopes
pub struct Scope {
    label: String,
    token: CancellationToken,
    tracker: TaskTracker,
    state: Mutex<ScopeState>,
    pre_stop: Mutex<Vec<Hook>>,
    stopped: Mutex<Vec<Hook>>,
    children: Mutex<Vec<Arc<Scope>>>,
}

impl Scope {
    /// Create a root scope
    pub fn new() -> Arc<Self> {
        Self::named("root")
    }

    /// Create a root scope with a label used in log records
    pub fn named(label: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            label: label.into(),
            token: CancellationToken::new(),
            tracker: TaskTracker::new(),
            state: Mutex::new(ScopeState::Running),
            pre_stop: Mutex::new(Vec::new()),
            stopped: Mutex::new(Vec::new()),
            children: Mutex::new(Vec::new()),
        })
    }

    /// Create a child scope
    ///
    /// The child's shutdown is implied by this scope's shutdown but may also
    /// be invoked independently.
    pub fn child(self: &Arc<Self>, label: impl Into<String>) -> Arc<Self> {
        let child = Arc::new(Self {
            label: label.into(),
            token: self.token.child_token(),
            tracker: TaskTracker::new(),
            state: Mutex::new(ScopeState::Running),
            pre_stop: Mutex::new(Vec::new()),
            stopped: Mutex::new(Vec::new()),
            children: Mutex::new(Vec::new()),
        });
        self.children.lock().push(child.clone());
        child
    }

    /// Label of this scope
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Current lifecycle state
    pub fn state(&self) -> ScopeState {
        *self.state.lock()
    }

    /// Whether the scope still accepts work
    pub fn is_running(&self) -> bool {
        self.state() == ScopeState::Running
    }

    /// A handle to this scope's exit signal
    ///
    /// Tasks select on `exit.cancelled()` and must return promptly once it
    /// fires.
    pub fn exit(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Run `fut` as a managed task of this scope
    pub fn spawn<F>(&self, fut: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tracker.spawn(fut)
    }

    /// Register a callback fired just before shutdown begins
    ///
    /// If shutdown has already begun, the callback runs immediately.
    pub fn hook_pre_stop(&self, f: impl FnOnce() + Send + 'static) {
        let run_now = {
            let st = self.state.lock();
            if *st == ScopeState::Running {
                self.pre_stop.lock().push(Box::new(f));
                return;
            }
            true
        };
        if run_now {
            f();
        }
    }

    /// Register a callback fired after every task and descendant has joined
    ///
    /// If the scope has already stopped, the callback runs immediately.
    pub fn hook_stopped(&self, f: impl FnOnce() + Send + 'static) {
        let run_now = {
            let st = self.state.lock();
            if *st != ScopeState::Stopped {
                self.stopped.lock().push(Box::new(f));
                return;
            }
            true
        };
        if run_now {
            f();
        }
    }

    /// Signal this scope and every descendant to stop, without waiting
    ///
    /// Transitions to [`ScopeState::Stopping`], fires pre-stop hooks, and
    /// returns immediately. Idempotent.
    pub fn shutdown(&self) {
        let hooks: Vec<Hook> = {
            let mut st = self.state.lock();
            if *st != ScopeState::Running {
                return;
            }
            *st = ScopeState::Stopping;
            self.pre_stop.lock().drain(..).collect()
        };
        debug!(scope = %self.label, "scope shutting down");
        for hook in hooks {
            hook();
        }
        self.token.cancel();
        self.tracker.close();
        let children: Vec<Arc<Scope>> = self.children.lock().clone();
        for child in children {
            child.shutdown();
        }
    }

    /// Wait until every task in this scope and its descendants has returned
    ///
    /// Fires the stopped hooks of each scope as it drains. Intended to be
    /// called after [`Scope::shutdown`]; tasks that never observe an exit
    /// signal will keep `join` pending.
    pub fn join(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            self.tracker.close();
            self.tracker.wait().await;
            let children: Vec<Arc<Scope>> = self.children.lock().clone();
            for child in children {
                child.join().await;
            }
            self.finish();
        })
    }

    fn finish(&self) {
        let hooks: Vec<Hook> = {
            let mut st = self.state.lock();
            if *st == ScopeState::Stopped {
                return;
            }
            *st = ScopeState::Stopped;
            self.stopped.lock().drain(..).collect()
        };
        debug!(scope = %self.label, "scope stopped");
        for hook in hooks {
            hook();
        }
    }
}
