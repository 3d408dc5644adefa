use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

/// Stop request shared between the probe loop and the interrupt handler.
///
/// The handler only flips the flag and wakes any waiter. The final report
/// is printed by the probe loop on its own thread.
#[derive(Clone, Default)]
pub struct StopToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl StopToken {
    pub fn new() -> StopToken {
        StopToken::default()
    }

    /// Routes SIGINT, SIGTERM and SIGHUP (`ctrlc` with its `termination` feature) to `request_stop`.
    pub fn install_handler(&self) -> Result<(), ctrlc::Error> {
        let token = self.clone();
        ctrlc::set_handler(move || token.request_stop())
    }

    pub fn request_stop(&self) {
        let (stopped, cvar) = &*self.inner;
        *stopped.lock().unwrap_or_else(PoisonError::into_inner) = true;
        cvar.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        let (stopped, _) = &*self.inner;
        *stopped.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleeps up to `timeout`. Returns early, with `true`, once a stop is requested.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (stopped, cvar) = &*self.inner;
        let guard = stopped.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = cvar
            .wait_timeout_while(guard, timeout, |stopped| !*stopped)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}
