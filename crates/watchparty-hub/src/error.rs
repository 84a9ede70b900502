//! Error types for the hub.

/// Errors that can occur while talking to the hub.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// Every freshly generated session id collided with a live one.
    /// The registration is refused; the hub keeps running.
    #[error("could not generate a unique session id after {0} attempts")]
    IdExhausted(usize),

    /// The hub actor has stopped (or its request channel is closed).
    #[error("hub is unavailable")]
    Unavailable,
}
