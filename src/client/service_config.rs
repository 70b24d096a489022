/*
 *
 * Copyright 2025 gRPC authors.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 *
 */

use std::{error::Error, sync::Arc};

use serde_json::Value;

/// An in-memory representation of a service config, provided to gRPC as a
/// JSON object.
///
/// The service config carries channel-wide configuration chosen by the
/// service owner, most importantly the load balancing configuration under
/// `loadBalancingConfig`.  An empty config (`{}`) is valid and leaves the
/// channel with its defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    raw: Arc<Value>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            raw: Arc::new(Value::Object(serde_json::Map::new())),
        }
    }
}

impl ServiceConfig {
    /// Parses and validates a service config document.
    ///
    /// Validation is structural: the document must be a JSON object, and
    /// `loadBalancingConfig`, when present, must be a list of single-member
    /// objects mapping a policy name to that policy's configuration object.
    /// Per-policy configs are validated later by the policy's own parser.
    pub fn parse(json: &str) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let value: Value = serde_json::from_str(json)
            .map_err(|err| format!("service config is not valid JSON: {err}"))?;
        let Some(obj) = value.as_object() else {
            return Err("service config must be a JSON object".into());
        };
        if let Some(lb_config) = obj.get("loadBalancingConfig") {
            let Some(entries) = lb_config.as_array() else {
                return Err("loadBalancingConfig must be a list".into());
            };
            for entry in entries {
                let Some(policy) = entry.as_object() else {
                    return Err("loadBalancingConfig entries must be objects".into());
                };
                if policy.len() != 1 {
                    return Err(format!(
                        "loadBalancingConfig entries must contain exactly one policy, found {}",
                        policy.len()
                    )
                    .into());
                }
                let (name, config) = policy.iter().next().unwrap();
                if name.is_empty() {
                    return Err("loadBalancingConfig policy name must be non-empty".into());
                }
                if !config.is_object() {
                    return Err(format!("config for LB policy {name} must be an object").into());
                }
            }
        }
        Ok(Self {
            raw: Arc::new(value),
        })
    }

    /// The canonical JSON text of this config.
    pub fn json_string(&self) -> String {
        self.raw.to_string()
    }

    /// The `loadBalancingConfig` list, if the config contains one.
    pub fn load_balancing_config(&self) -> Option<&[Value]> {
        self.raw.get("loadBalancingConfig")?.as_array().map(Vec::as_slice)
    }
}
