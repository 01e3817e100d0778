use async_trait::async_trait;

/// Host-process control surface injected at engine construction.
///
/// The engine never touches leadership election or process lifecycle
/// itself; it reports the two conditions that require the surrounding
/// service to act.
#[async_trait]
pub trait LeadershipCoordinator: Send + Sync {
    /// The driver disconnected: give up leadership so a peer can take
    /// over. Not an error condition.
    async fn abdicate(&self);

    /// The driver reported a fatal error: the framework is no longer
    /// valid and the process should exit once shutdown hooks have run.
    /// Invoked off the driver callback stack.
    async fn terminate(&self);
}
