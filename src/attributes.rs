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

//! An opaque, immutable bundle of channel data.
//!
//! Attributes carry arbitrary values between the channel, its name resolver,
//! and its LB policies without those components needing to know about each
//! other's types.  Producers publish well-known key constants; consumers
//! retrieve values by key and downcast to the expected type.

use std::{
    any::Any,
    collections::HashMap,
    fmt::{self, Debug, Formatter},
    sync::Arc,
};

/// A string-keyed collection of arbitrary shared values.
#[derive(Clone, Default)]
pub struct Attributes {
    m: HashMap<&'static str, Arc<dyn Any + Send + Sync>>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of these attributes with the given value added,
    /// replacing any previous value stored under the same key.
    pub fn with_value(mut self, key: &'static str, value: Arc<dyn Any + Send + Sync>) -> Self {
        self.m.insert(key, value);
        self
    }

    /// Retrieves the value stored under key, if it exists and has type T.
    pub fn get<T: Any + Send + Sync>(&self, key: &'static str) -> Option<Arc<T>> {
        self.m.get(key).and_then(|v| v.clone().downcast::<T>().ok())
    }

    /// Reports whether any value is stored under key.
    pub fn contains_key(&self, key: &'static str) -> bool {
        self.m.contains_key(key)
    }
}

impl Debug for Attributes {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        // Values are opaque; show the keys only.
        let mut keys: Vec<_> = self.m.keys().collect();
        keys.sort();
        f.debug_struct("Attributes").field("keys", &keys).finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn attributes_typed_get() {
        let attributes = Attributes::new()
            .with_value("k1", Arc::new(String::from("v1")))
            .with_value("k2", Arc::new(42u32));

        let v1: Arc<String> = attributes.get("k1").unwrap();
        assert_eq!(*v1, "v1");
        assert_eq!(*attributes.get::<u32>("k2").unwrap(), 42);

        // Wrong type or missing key yields None.
        assert!(attributes.get::<u32>("k1").is_none());
        assert!(attributes.get::<String>("k3").is_none());
        assert!(!attributes.contains_key("k3"));
    }

    #[test]
    fn attributes_with_value_replaces() {
        let attributes = Attributes::new()
            .with_value("k", Arc::new(1u32))
            .with_value("k", Arc::new(2u32));
        assert_eq!(*attributes.get::<u32>("k").unwrap(), 2);
    }
}
