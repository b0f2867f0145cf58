// Conductor constants (no magic values)
use std::time::Duration;

/// How long to wait for terminated listeners to disappear before relaunching (2s)
pub const DEFAULT_SETTLE_TIMEOUT: Duration = Duration::from_secs(2);

/// Liveness poll interval while waiting for terminated listeners (50ms)
pub const SETTLE_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Startup grace period; a launched process that exits within it is a failed launch (300ms)
pub const DEFAULT_STARTUP_GRACE: Duration = Duration::from_millis(300);

/// File name the WebRTC decoder dump writes into the capture directory
pub const DEFAULT_ARTIFACT_PATTERN: &str = "webrtc_receive_stream_*.ivf";

/// Signaling server binary inside a deployment directory
pub const DEFAULT_SERVER_EXECUTABLE: &str = "peerconnection_server";

/// Signaling server log inside a deployment directory
pub const DEFAULT_SERVER_LOG: &str = "signal_server.log";

/// Reason reported to the host sleep inhibitor
pub const INHIBITOR_REASON: &str = "WebRTC trial listener running";
