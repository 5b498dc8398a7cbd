//! Registry of running proxy instances, keyed by port.
//!
//! The registry is an explicitly owned object shared through `Arc`. The
//! control plane is the only writer; request handlers take a snapshot and
//! iterate it without holding the lock, so an entry removed mid-lookup is
//! simply still visible to that one lookup.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::error::ProxyResult;
use crate::model::ProxyConfig;
use crate::rules::ServiceRules;

/// A registered proxy listener and its compiled forwarding rules.
#[derive(Debug)]
pub struct ProxyInstance {
    /// Port the proxy listens on.
    pub port: u16,
    /// The configuration it was registered with.
    pub config: ProxyConfig,
    /// Extra environment the proxy process was started with.
    pub env_vars: Option<HashMap<String, String>>,
    rules: HashMap<String, ServiceRules>,
}

impl ProxyInstance {
    /// Build an instance, compiling its configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if any pattern is invalid.
    pub fn new(
        port: u16,
        config: ProxyConfig,
        env_vars: Option<HashMap<String, String>>,
    ) -> ProxyResult<Self> {
        let rules = config.compile()?;
        Ok(Self {
            port,
            config,
            env_vars,
            rules,
        })
    }

    /// The compiled rules for a canonical service name.
    #[must_use]
    pub fn rules_for(&self, service: &str) -> Option<&ServiceRules> {
        self.rules.get(service)
    }
}

/// Port-keyed registry of proxy instances, ordered oldest to newest.
#[derive(Debug, Default)]
pub struct ProxyRegistry {
    instances: RwLock<Vec<Arc<ProxyInstance>>>,
}

impl ProxyRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a proxy, replacing any instance already bound to the same port.
    ///
    /// The new instance becomes the newest entry.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the configuration does not compile;
    /// the registry is left unchanged in that case.
    pub fn register(
        &self,
        port: u16,
        config: ProxyConfig,
        env_vars: Option<HashMap<String, String>>,
    ) -> ProxyResult<Arc<ProxyInstance>> {
        let instance = Arc::new(ProxyInstance::new(port, config, env_vars)?);

        let mut instances = self.instances.write();
        instances.retain(|existing| existing.port != port);
        instances.push(Arc::clone(&instance));
        drop(instances);

        info!(
            port,
            services = ?instance.config.services.keys().collect::<Vec<_>>(),
            "registered proxy instance"
        );
        Ok(instance)
    }

    /// Remove the instance bound to `port`. Returns whether one was removed.
    pub fn remove(&self, port: u16) -> bool {
        let mut instances = self.instances.write();
        let before = instances.len();
        instances.retain(|existing| existing.port != port);
        let removed = instances.len() != before;
        drop(instances);

        debug!(port, removed, "removed proxy instance");
        removed
    }

    /// Remove exactly this instance, leaving a newer registration on the
    /// same port in place.
    pub fn remove_instance(&self, instance: &Arc<ProxyInstance>) -> bool {
        let mut instances = self.instances.write();
        let before = instances.len();
        instances.retain(|existing| !Arc::ptr_eq(existing, instance));
        instances.len() != before
    }

    /// Look up the instance bound to `port`.
    #[must_use]
    pub fn get(&self, port: u16) -> Option<Arc<ProxyInstance>> {
        self.instances
            .read()
            .iter()
            .find(|instance| instance.port == port)
            .cloned()
    }

    /// Snapshot of all instances, newest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<ProxyInstance>> {
        self.instances.read().iter().rev().cloned().collect()
    }

    /// Remove every instance.
    pub fn clear(&self) {
        self.instances.write().clear();
    }

    /// Number of registered instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.read().len()
    }

    /// Whether no instance is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.read().is_empty()
    }
}
