//! Inbound commands to the card service.
//!
//! These represent actions requested by the outside world (telephony
//! framework, test harness, provisioning tool) that the
//! [`CardService`](super::service::CardService) interprets and acts upon.

use crate::config::SystemConfig;
use crate::session::ConnectParams;

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone)]
pub enum AppCommand {
    /// Establish a packet-data session with the given parameters.
    Connect(ConnectParams),

    /// Tear down the active session.
    Disconnect,

    /// Discard cached records and re-run the full load batch.
    Reload,

    /// Power the radio down and drop everything to idle.
    HardReset,

    /// Hot-reload configuration.
    UpdateConfig(SystemConfig),
}
