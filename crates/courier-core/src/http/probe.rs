//! Host connectivity probing
//!
//! The probe is consulted only while classifying a failure. It never decides
//! whether a request is attempted.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// Reports whether the host currently has network connectivity
pub trait NetworkProbe: Send + Sync {
    /// `false` when offline, and also when connectivity cannot be determined
    fn is_online(&self) -> bool;
}

/// Reads interface state from the host
///
/// On Linux the host is online when any non-loopback interface under
/// `/sys/class/net` reports `operstate` as `up`. Anything unreadable counts
/// as offline, and so do interfaces reporting `unknown` (tun, ppp and other
/// point-to-point links). Hosts that only reach the network over such links
/// should inject [`AssumeOnline`] or [`StaticProbe`].
///
/// The reads are synchronous. They only run while a failure is classified,
/// and sysfs attributes are served from kernel memory, so they do not wait
/// on a device.
#[derive(Debug, Clone)]
pub struct SystemProbe {
    net_dir: PathBuf,
}

impl SystemProbe {
    pub fn new() -> Self {
        Self::with_net_dir("/sys/class/net")
    }

    /// Probe a different sysfs-style directory
    pub fn with_net_dir(net_dir: impl Into<PathBuf>) -> Self {
        Self {
            net_dir: net_dir.into(),
        }
    }

    fn any_interface_up(dir: &Path) -> std::io::Result<bool> {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_name() == "lo" {
                continue;
            }
            let state = match std::fs::read_to_string(entry.path().join("operstate")) {
                Ok(state) => state,
                Err(_) => continue,
            };
            if state.trim() == "up" {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkProbe for SystemProbe {
    fn is_online(&self) -> bool {
        match Self::any_interface_up(&self.net_dir) {
            Ok(online) => online,
            Err(e) => {
                tracing::trace!(error = %e, dir = ?self.net_dir, "Connectivity unknown, assuming offline");
                false
            }
        }
    }
}

/// Always reports the host as online
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeOnline;

impl NetworkProbe for AssumeOnline {
    fn is_online(&self) -> bool {
        true
    }
}

/// Connectivity state set by the caller
///
/// Useful when the application already tracks connectivity, and in tests.
#[derive(Debug, Default)]
pub struct StaticProbe {
    online: AtomicBool,
}

impl StaticProbe {
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Relaxed);
    }
}

impl NetworkProbe for StaticProbe {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::Relaxed)
    }
}
