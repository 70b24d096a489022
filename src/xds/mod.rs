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

//! The contract between the channel and an xDS discovery client.
//!
//! The discovery client owns the ADS stream to the control plane, including
//! reconnects, response validation and resource caching.  Consumers register
//! a watcher for a resource and are notified whenever the resource changes,
//! becomes invalid, or is confirmed absent.  This crate ships the contract
//! only; a concrete client is provided by the embedding application.

use std::{error::Error, net::SocketAddr, sync::Arc};

use tonic::Status;

use crate::{attributes::Attributes, client::name_resolution::WorkScheduler, rt::Runtime};

pub mod route;

use route::ListenerUpdate;

/// Key under which a shared [`XdsClientAttribute`] handle is published in the
/// attributes of resolver results, allowing LB policies on the same channel
/// to issue their own cluster and endpoint watches.
pub const XDS_CLIENT_ATTRIBUTE_KEY: &str = "grpc.internal.xds_client";

/// Receives notifications about the listener resource for one server name.
///
/// All three callbacks may be invoked from arbitrary threads owned by the
/// discovery client.  Implementations must hand the notification off to
/// their own serialized execution context rather than doing real work
/// inline.
pub trait ListenerWatcher: Send + Sync {
    /// The watched resource changed; `update` is the already-validated new
    /// value.
    fn on_listener_changed(&self, update: ListenerUpdate);

    /// The discovery stream failed or the server sent an unusable response.
    /// The client keeps retrying on its own; previously delivered updates
    /// remain valid.
    fn on_error(&self, status: Status);

    /// The control plane authoritatively reported that the watched resource
    /// does not exist.
    fn on_resource_does_not_exist(&self);
}

/// A handle to a running discovery client.
///
/// The handle is opaque to this crate.  Dropping the last clone releases the
/// watch registered at construction time, after which the client must not
/// invoke the watcher again.
pub trait XdsClient: Send + Sync {}

/// A clonable attribute value wrapping a shared discovery-client handle.
///
/// `Arc<dyn XdsClient>` cannot be stored in [`Attributes`] directly, so
/// results carry it inside this wrapper.
#[derive(Clone)]
pub struct XdsClientAttribute(pub Arc<dyn XdsClient>);

/// Everything a discovery client needs to start watching the listener
/// resource for one channel.
#[non_exhaustive]
pub struct XdsClientArgs {
    /// Scheduler for the serialized execution context of the channel that
    /// the watcher forwards into.
    pub work_scheduler: Arc<dyn WorkScheduler>,

    /// Runtime on which the client performs its I/O.
    pub runtime: Arc<dyn Runtime>,

    /// The server name whose listener resource is watched.
    pub server_name: String,

    /// Optional pre-resolved addresses for the control plane.  May be empty,
    /// in which case the client consults its bootstrap configuration.
    pub initial_addresses: Vec<SocketAddr>,

    /// Sink for resource notifications.
    pub watcher: Arc<dyn ListenerWatcher>,

    /// Channel attributes, made available to the client for transport
    /// configuration.
    pub attributes: Arc<Attributes>,
}

/// Creates discovery clients.  Injected into the xDS resolver so that the
/// transport implementation remains pluggable and testable.
pub trait XdsClientBuilder: Send + Sync {
    /// Builds a client and registers the watch described by `args`.  Returns
    /// an error if the client cannot be constructed, e.g. when bootstrap
    /// configuration is missing or malformed.
    fn build(&self, args: XdsClientArgs)
        -> Result<Arc<dyn XdsClient>, Box<dyn Error + Send + Sync>>;
}
