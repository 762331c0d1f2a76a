//! Network / system facade.
//!
//! The engine asks the host for the current network state before admitting a
//! download. Platform hosts implement `SystemFacade` over their connectivity
//! APIs; `StaticSystemFacade` is a settable implementation for hosts without
//! such hooks (CLI, tests).

use std::sync::RwLock;

use crate::config::Settings;

/// Kind of the active network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkType {
    None,
    Wifi,
    Ethernet,
    Mobile,
    Other,
}

/// Snapshot of the active network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkInfo {
    pub connected: bool,
    pub kind: NetworkType,
    pub metered: bool,
    pub roaming: bool,
}

impl NetworkInfo {
    /// Unmetered wired/wifi connectivity.
    pub fn unmetered() -> Self {
        Self {
            connected: true,
            kind: NetworkType::Wifi,
            metered: false,
            roaming: false,
        }
    }

    pub fn metered_mobile() -> Self {
        Self {
            connected: true,
            kind: NetworkType::Mobile,
            metered: true,
            roaming: false,
        }
    }

    pub fn disconnected() -> Self {
        Self {
            connected: false,
            kind: NetworkType::None,
            metered: false,
            roaming: false,
        }
    }

    /// Whether a download with the given constraint may run on this network.
    pub fn allows(&self, unmetered_only: bool, settings: &Settings) -> bool {
        if !self.connected || self.kind == NetworkType::None {
            return false;
        }
        if unmetered_only && self.metered {
            return false;
        }
        if self.roaming && !settings.enable_roaming {
            return false;
        }
        true
    }
}

/// Environment queries consumed by the engine.
pub trait SystemFacade: Send + Sync {
    fn network_info(&self) -> NetworkInfo;
}

/// `SystemFacade` whose answer is set by the host.
#[derive(Debug)]
pub struct StaticSystemFacade {
    network: RwLock<NetworkInfo>,
}

impl StaticSystemFacade {
    pub fn new(network: NetworkInfo) -> Self {
        Self {
            network: RwLock::new(network),
        }
    }

    pub fn set_network(&self, network: NetworkInfo) {
        *self.network.write().unwrap_or_else(|e| e.into_inner()) = network;
    }
}

impl Default for StaticSystemFacade {
    fn default() -> Self {
        Self::new(NetworkInfo::unmetered())
    }
}

impl SystemFacade for StaticSystemFacade {
    fn network_info(&self) -> NetworkInfo {
        *self.network.read().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metered_blocks_unmetered_only() {
        let s = Settings::default();
        let net = NetworkInfo::metered_mobile();
        assert!(!net.allows(true, &s));
        assert!(net.allows(false, &s));
    }

    #[test]
    fn roaming_respects_setting() {
        let mut s = Settings::default();
        let mut net = NetworkInfo::metered_mobile();
        net.roaming = true;
        assert!(net.allows(false, &s));
        s.enable_roaming = false;
        assert!(!net.allows(false, &s));
    }

    #[test]
    fn disconnected_blocks_everything() {
        let s = Settings::default();
        assert!(!NetworkInfo::disconnected().allows(false, &s));
    }

    #[test]
    fn static_facade_is_settable() {
        let f = StaticSystemFacade::default();
        assert!(f.network_info().connected);
        f.set_network(NetworkInfo::disconnected());
        assert!(!f.network_info().connected);
    }
}
