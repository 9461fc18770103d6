//! Common lifecycle of the visibility controllers.

/// Play/pause driven controller.
///
/// Implementations own their timers; all effects are delivered
/// asynchronously through the callbacks they were built with.
pub trait Controller: Send + Sync {
    /// Begin (or resume) the cycle. Idempotent while running.
    fn start(&self);

    /// Cancel any pending transition. Visibility and position are left as-is.
    fn stop(&self);

    /// Stop and forget run state so the next `start` is a fresh start.
    fn reset(&self);

    /// Check if a transition is pending
    fn is_running(&self) -> bool;
}
