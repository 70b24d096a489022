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

//! xDS-based name resolution for a gRPC client channel.
//!
//! The `xds` resolver subscribes to Listener/Route discovery updates from a
//! control plane and translates each route configuration into a service
//! config document consumed by the channel's load balancing stack.  The
//! discovery transport itself is pluggable; this crate defines the contract
//! it must satisfy and everything on the channel side of that contract.

pub mod attributes;
pub mod client;
pub mod rt;
pub mod xds;
