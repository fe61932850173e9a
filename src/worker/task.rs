//! Pending task handles for commands running on the runtime.
//!
//! A `Task<T>` wraps one spawned command: the caller can poll it from an
//! event loop tick, await it, or abandon it.
//!
//! ```ignore
//! let mut task = worker.spawn(Command::Activate);
//!
//! // In event loop tick
//! if task.poll() {
//!     // finished
//! }
//! ```

use std::future::Future;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// The state of a task
#[derive(Debug)]
pub enum TaskState<T> {
  /// Still running
  Pending,
  /// Finished with a value
  Done(T),
  /// Aborted or dropped before producing a value
  Abandoned,
}

impl<T> TaskState<T> {
  pub fn is_pending(&self) -> bool {
    matches!(self, TaskState::Pending)
  }

  pub fn is_done(&self) -> bool {
    matches!(self, TaskState::Done(_))
  }
}

pub struct Task<T> {
  state: TaskState<T>,
  receiver: Option<oneshot::Receiver<T>>,
  handle: JoinHandle<()>,
}

impl<T: Send + 'static> Task<T> {
  /// Spawn a future on the current tokio runtime.
  pub fn spawn<Fut>(future: Fut) -> Self
  where
    Fut: Future<Output = T> + Send + 'static,
  {
    let (tx, rx) = oneshot::channel();
    let handle = tokio::spawn(async move {
      // Ignore send errors - the handle may have been dropped
      let _ = tx.send(future.await);
    });

    Self {
      state: TaskState::Pending,
      receiver: Some(rx),
      handle,
    }
  }

  pub fn state(&self) -> &TaskState<T> {
    &self.state
  }

  /// Poll for the result without blocking.
  ///
  /// Returns `true` if the state changed.
  pub fn poll(&mut self) -> bool {
    let receiver = match &mut self.receiver {
      Some(rx) => rx,
      None => return false,
    };

    match receiver.try_recv() {
      Ok(value) => {
        self.state = TaskState::Done(value);
        self.receiver = None;
        true
      }
      Err(oneshot::error::TryRecvError::Empty) => false,
      Err(oneshot::error::TryRecvError::Closed) => {
        self.state = TaskState::Abandoned;
        self.receiver = None;
        true
      }
    }
  }

  /// Wait for the result. `None` if the task was abandoned.
  pub async fn wait(mut self) -> Option<T> {
    if let TaskState::Done(value) = std::mem::replace(&mut self.state, TaskState::Abandoned) {
      return Some(value);
    }
    match self.receiver.take() {
      Some(rx) => rx.await.ok(),
      None => None,
    }
  }

  /// Abandon the task. Whatever it already wrote stays written.
  pub fn abort(&mut self) {
    self.handle.abort();
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Task<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Task")
      .field("state", &self.state)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;

  #[tokio::test]
  async fn test_task_completes() {
    let mut task = Task::spawn(async { 42 });
    assert!(task.state().is_pending());

    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(task.poll());
    assert!(task.state().is_done());
    assert!(!task.poll());
    assert_eq!(task.wait().await, Some(42));
  }

  #[tokio::test]
  async fn test_wait_without_poll() {
    let task = Task::spawn(async {
      tokio::time::sleep(Duration::from_millis(5)).await;
      "done"
    });
    assert_eq!(task.wait().await, Some("done"));
  }

  #[tokio::test]
  async fn test_abort_abandons() {
    let mut task = Task::spawn(async {
      tokio::time::sleep(Duration::from_secs(60)).await;
      1
    });

    task.abort();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(task.poll());
    assert!(matches!(task.state(), TaskState::Abandoned));
  }
}
