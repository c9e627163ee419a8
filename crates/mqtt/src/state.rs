//! Observable connection state.
//!
//! The connection kernel broadcasts one of these values over a watch channel
//! on every transition. The lifecycle is `Connecting -> Connected`, dropping
//! to `Reconnecting` on transient failures and to `Disconnected` only when
//! the kernel has given up (fatal error or retry budget spent).

use std::fmt;

/// Current state of the broker connection.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    /// CONNECT sent, waiting for CONNACK.
    Connecting,

    /// Handshake complete; publishes will be accepted.
    Connected,

    /// The kernel stopped trying. Carries the terminal reason.
    Disconnected(String),

    /// Waiting out a backoff delay before the next attempt. Carries the
    /// delay in seconds.
    Reconnecting(f64),
}

impl ConnectionState {
    /// Short identifier for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
            ConnectionState::Disconnected(_) => "Disconnected",
            ConnectionState::Reconnecting(_) => "Reconnecting",
        }
    }

    /// Reason or delay attached to the state, empty for the transient
    /// connecting states.
    pub fn details(&self) -> String {
        match self {
            ConnectionState::Connecting | ConnectionState::Connected => String::new(),
            ConnectionState::Disconnected(reason) => reason.clone(),
            ConnectionState::Reconnecting(seconds) => format!("in {seconds} seconds"),
        }
    }

    /// True only when publishes will be accepted.
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    /// True while the kernel is still working toward a connection.
    pub fn is_connecting(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Reconnecting(_)
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())?;
        let details = self.details();
        if !details.is_empty() {
            write!(f, " ({details})")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn as_str_covers_all_states() {
        assert_eq!(ConnectionState::Connecting.as_str(), "Connecting");
        assert_eq!(ConnectionState::Connected.as_str(), "Connected");
        assert_eq!(
            ConnectionState::Disconnected("gone".into()).as_str(),
            "Disconnected"
        );
        assert_eq!(ConnectionState::Reconnecting(2.0).as_str(), "Reconnecting");
    }

    #[test]
    fn display_appends_details() {
        assert_eq!(ConnectionState::Connected.to_string(), "Connected");
        assert_eq!(
            ConnectionState::Reconnecting(2.0).to_string(),
            "Reconnecting (in 2 seconds)"
        );
        assert_eq!(
            ConnectionState::Disconnected("broker closed".into()).to_string(),
            "Disconnected (broker closed)"
        );
    }

    #[test]
    fn connectedness_predicates() {
        assert!(ConnectionState::Connected.is_connected());
        assert!(!ConnectionState::Reconnecting(1.0).is_connected());
        assert!(ConnectionState::Connecting.is_connecting());
        assert!(ConnectionState::Reconnecting(1.0).is_connecting());
        assert!(!ConnectionState::Disconnected("x".into()).is_connecting());
    }
}
