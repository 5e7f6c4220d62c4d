//! Communication session management
//!
//! This module defines the trait for tunneling messages between the room
//! and connected devices (host and players). The tunnel abstraction lets
//! the embedding layer pick the transport (WebSocket, SSE, an in-process
//! channel) while the session core stays free of I/O.

use super::{Snapshot, StateDelta};

/// Trait for sending messages through a communication tunnel
///
/// One tunnel exists per connected device. The room never holds tunnels
/// directly; it looks them up through a finder closure so disconnected
/// devices are skipped transparently.
pub trait Tunnel {
    /// Sends a sequence-numbered state delta to the device
    ///
    /// Deltas notify the device about changes to its current view.
    ///
    /// # Arguments
    ///
    /// * `delta` - The delta to send
    fn send_delta(&self, delta: &StateDelta);

    /// Sends a full-state snapshot to the device
    ///
    /// Snapshots replace the device's view entirely, typically on connect
    /// or reconnect.
    ///
    /// # Arguments
    ///
    /// * `snapshot` - The snapshot to send
    fn send_snapshot(&self, snapshot: &Snapshot);

    /// Closes the communication tunnel
    ///
    /// Called when the device disconnects or the session is torn down.
    fn close(self);
}
