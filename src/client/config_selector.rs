//! The per-call config selector seam.
//!
//! A name resolver may attach a `ConfigSelector` to its results; the channel
//! then consults it on every RPC to pick per-call configuration before the
//! LB pick happens.

/// Key under which a resolver's config selector is published in the
/// attributes of resolver results.
pub const CONFIG_SELECTOR_ATTRIBUTE_KEY: &str = "grpc.internal.config_selector";

/// Configuration applied to a single call.
#[derive(Debug, Default)]
#[non_exhaustive]
pub struct CallConfig {}

/// Chooses the configuration for one call.  Implementations must be cheap;
/// this runs on the RPC hot path.
pub trait ConfigSelector: Send + Sync {
    fn call_config(&self, method: &str) -> CallConfig;
}
