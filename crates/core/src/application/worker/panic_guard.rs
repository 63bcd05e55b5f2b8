// Panic isolation for background tasks and queue handlers
use crate::error::AppError;
use futures::FutureExt;
use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Once;
use tracing::error;

thread_local! {
    static GUARD_DEPTH: Cell<usize> = const { Cell::new(0) };
    static CAPTURED: RefCell<Option<CapturedPanic>> = const { RefCell::new(None) };
}

static CAPTURE_HOOK: Once = Once::new();

struct CapturedPanic {
    location: String,
    backtrace: Backtrace,
}

/// Marks the current thread as polling inside `execute_guarded`
struct PollScope;

impl PollScope {
    fn enter() -> Self {
        GUARD_DEPTH.with(|depth| depth.set(depth.get() + 1));
        PollScope
    }
}

impl Drop for PollScope {
    fn drop(&mut self) {
        GUARD_DEPTH.with(|depth| depth.set(depth.get() - 1));
    }
}

/// Chain a panic hook that records location and backtrace of panics raised
/// inside a guarded poll; other panics go to the previously installed hook
fn install_capture_hook() {
    CAPTURE_HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            if GUARD_DEPTH.with(Cell::get) == 0 {
                previous(info);
                return;
            }
            let location = info
                .location()
                .map(|l| format!("{}:{}", l.file(), l.line()))
                .unwrap_or_else(|| "unknown".to_string());
            let captured = CapturedPanic {
                location,
                backtrace: Backtrace::force_capture(),
            };
            CAPTURED.with(|slot| *slot.borrow_mut() = Some(captured));
        }));
    });
}

fn take_captured() -> Option<CapturedPanic> {
    CAPTURED.with(|slot| slot.borrow_mut().take())
}

/// Result of a panic-guarded execution
#[derive(Debug)]
pub enum PanicGuardResult<T> {
    /// Execution completed (the value may itself be an error)
    Success(T),
    /// Execution panicked; holds the payload description
    Panicked(String),
}

impl<T> PanicGuardResult<T> {
    pub fn is_panicked(&self) -> bool {
        matches!(self, PanicGuardResult::Panicked(_))
    }
}

/// Await a future with panic isolation
///
/// A panic raised while polling `future` is caught at this boundary, logged
/// under `scope` with its location and backtrace, and returned as
/// `PanicGuardResult::Panicked`. It never propagates to the caller's task.
///
/// The first call installs a process-wide panic hook that records the
/// backtrace of guarded panics and forwards every other panic to the hook
/// that was installed before it.
///
/// # Example
/// ```text
/// let result = execute_guarded("update dresses products", async {
///     panic!("test panic");
/// })
/// .await;
/// assert!(result.is_panicked());
/// ```
pub async fn execute_guarded<F, T>(scope: &str, future: F) -> PanicGuardResult<T>
where
    F: Future<Output = T>,
{
    install_capture_hook();

    let mut future = std::pin::pin!(future);
    let scoped = futures::future::poll_fn(|cx| {
        let _scope = PollScope::enter();
        future.as_mut().poll(cx)
    });

    match AssertUnwindSafe(scoped).catch_unwind().await {
        Ok(result) => PanicGuardResult::Success(result),
        Err(payload) => {
            let panic_msg = panic_message(payload.as_ref());
            match take_captured() {
                Some(captured) => error!(
                    scope = %scope,
                    panic_msg = %panic_msg,
                    location = %captured.location,
                    backtrace = %captured.backtrace,
                    "recovered from panic"
                ),
                None => error!(scope = %scope, panic_msg = %panic_msg, "recovered from panic"),
            }
            PanicGuardResult::Panicked(panic_msg)
        }
    }
}

/// Describe a panic payload: string messages and typed errors verbatim,
/// anything else as opaque
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(err) = payload.downcast_ref::<AppError>() {
        err.to_string()
    } else {
        "opaque panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_success_passes_value_through() {
        let result = execute_guarded("test", async { 42 }).await;
        match result {
            PanicGuardResult::Success(value) => assert_eq!(value, 42),
            PanicGuardResult::Panicked(msg) => panic!("unexpected panic: {}", msg),
        }
    }

    #[tokio::test]
    async fn test_str_panic_is_caught() {
        let result: PanicGuardResult<()> =
            execute_guarded("test", async { panic!("boom") }).await;
        match result {
            PanicGuardResult::Panicked(msg) => assert_eq!(msg, "boom"),
            PanicGuardResult::Success(_) => panic!("panic was not caught"),
        }
    }

    #[tokio::test]
    async fn test_formatted_panic_is_caught() {
        let page = 3;
        let result: PanicGuardResult<()> =
            execute_guarded("test", async move { panic!("bad page {}", page) }).await;
        assert!(result.is_panicked());
        if let PanicGuardResult::Panicked(msg) = result {
            assert_eq!(msg, "bad page 3");
        }
    }

    #[tokio::test]
    async fn test_typed_error_payload() {
        let result: PanicGuardResult<()> = execute_guarded("test", async {
            std::panic::panic_any(AppError::Storage("disk full".to_string()))
        })
        .await;
        match result {
            PanicGuardResult::Panicked(msg) => assert_eq!(msg, "Storage error: disk full"),
            PanicGuardResult::Success(_) => panic!("panic was not caught"),
        }
    }

    #[tokio::test]
    async fn test_opaque_payload() {
        let result: PanicGuardResult<()> =
            execute_guarded("test", async { std::panic::panic_any(17_u32) }).await;
        match result {
            PanicGuardResult::Panicked(msg) => assert_eq!(msg, "opaque panic payload"),
            PanicGuardResult::Success(_) => panic!("panic was not caught"),
        }
    }

    #[tokio::test]
    async fn test_panic_after_await_point() {
        let result: PanicGuardResult<()> = execute_guarded("test", async {
            tokio::task::yield_now().await;
            panic!("late boom");
        })
        .await;
        assert!(result.is_panicked());
    }

    #[test]
    fn test_hook_records_guarded_panic_location() {
        install_capture_hook();

        let result = {
            let _scope = PollScope::enter();
            std::panic::catch_unwind(|| -> u32 { panic!("traced") })
        };
        assert!(result.is_err());

        let captured = take_captured().expect("backtrace should be captured");
        assert!(captured.location.contains("panic_guard.rs"));
        assert_eq!(GUARD_DEPTH.with(Cell::get), 0);
    }

    #[test]
    fn test_hook_ignores_panics_outside_guard() {
        install_capture_hook();

        let result = std::panic::catch_unwind(|| -> u32 { panic!("unguarded") });
        assert!(result.is_err());
        assert!(take_captured().is_none());
    }

    #[tokio::test]
    async fn test_guarded_panic_consumes_capture() {
        let result: PanicGuardResult<()> =
            execute_guarded("test", async { panic!("consumed") }).await;
        assert!(result.is_panicked());
        assert!(take_captured().is_none());
        assert_eq!(GUARD_DEPTH.with(Cell::get), 0);
    }
}
