//! A `Runtime` implementation backed by the ambient tokio runtime.

use std::{future::Future, pin::Pin, task::Context, task::Poll, time::Duration};

use super::{Runtime, Sleep, TaskHandle};

/// Dispatches work onto the tokio runtime that is current when its methods
/// are called.
#[derive(Default)]
pub struct TokioRuntime {}

struct TokioTask {
    handle: tokio::task::AbortHandle,
}

impl TaskHandle for TokioTask {
    fn abort(&self) {
        self.handle.abort();
    }
}

struct TokioSleep {
    sleep: Pin<Box<tokio::time::Sleep>>,
}

impl Future for TokioSleep {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.sleep.as_mut().poll(cx)
    }
}

impl Sleep for TokioSleep {}

impl Runtime for TokioRuntime {
    fn spawn(
        &self,
        task: Pin<Box<dyn Future<Output = ()> + Send + 'static>>,
    ) -> Box<dyn TaskHandle> {
        let handle = tokio::task::spawn(task).abort_handle();
        Box::new(TokioTask { handle })
    }

    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Sleep>> {
        Box::pin(TokioSleep {
            sleep: Box::pin(tokio::time::sleep(duration)),
        })
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use tokio::sync::oneshot;

    use super::*;

    #[tokio::test]
    async fn spawn_and_sleep() {
        let runtime = TokioRuntime::default();
        let (tx, rx) = oneshot::channel();
        let task = runtime.spawn(Box::pin(async move {
            tx.send(()).unwrap();
        }));
        rx.await.unwrap();
        runtime.sleep(Duration::from_millis(1)).await;
        task.abort();
    }
}
