//! Host contract for `setInterval`/`setTimeout` and the VM clock.

use crate::avm1::{ObjectId, Value};

pub type TimerId = i32;

/// What to invoke when a timer fires.
#[derive(Clone, Debug)]
pub enum TimerCallback {
    Function(ObjectId),
    Method { this: ObjectId, method_name: String },
}

pub trait TimerBackend {
    /// Register a timer. `repeat` distinguishes `setInterval` from
    /// `setTimeout`. The host is expected to enqueue the callback on the
    /// action queue when the timer fires, not to call into the VM directly.
    fn set_interval(
        &mut self,
        interval_ms: i32,
        callback: TimerCallback,
        args: Vec<Value>,
        repeat: bool,
    ) -> TimerId;

    /// Cancel a timer. Returns false when the id is unknown.
    fn clear_interval(&mut self, id: TimerId) -> bool;

    /// Milliseconds since the VM started. Read by `GetTime`/`getTimer`.
    fn elapsed_millis(&self) -> u64;
}

/// Timers for hosts without a scheduler: registration succeeds but
/// nothing ever fires, and the clock stands still.
#[derive(Default)]
pub struct NullTimerBackend {
    next_id: TimerId,
}

impl TimerBackend for NullTimerBackend {
    fn set_interval(
        &mut self,
        _interval_ms: i32,
        _callback: TimerCallback,
        _args: Vec<Value>,
        _repeat: bool,
    ) -> TimerId {
        self.next_id += 1;
        self.next_id
    }

    fn clear_interval(&mut self, _id: TimerId) -> bool {
        false
    }

    fn elapsed_millis(&self) -> u64 {
        0
    }
}
