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

//! The xds name resolver.
//!
//! Targets of the form `xds:///server.example.com` are resolved by watching
//! the listener resource for the server name on an xDS control plane.  Each
//! route configuration update is translated into a service config selecting
//! the xds_routing LB policy and pushed to the channel; discovery errors and
//! resource deletion are pushed as transient errors and an empty config,
//! respectively.

use std::{
    collections::VecDeque,
    error::Error,
    mem,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use tonic::Status;
use tracing::{debug, error};

use crate::{
    attributes::Attributes,
    client::config_selector::{CallConfig, ConfigSelector, CONFIG_SELECTOR_ATTRIBUTE_KEY},
    rt,
    xds::{
        route::{ListenerUpdate, RouteConfigUpdate},
        ListenerWatcher, XdsClient, XdsClientArgs, XdsClientAttribute, XdsClientBuilder,
        XDS_CLIENT_ATTRIBUTE_KEY,
    },
};

use super::{
    ChannelController, Resolver, ResolverBuilder, ResolverOptions, ResolverUpdate, ServiceConfig,
    Target, WorkScheduler, GLOBAL_RESOLVER_REGISTRY,
};

mod service_config;
mod weighted_clusters;

#[cfg(test)]
mod test;

use service_config::generate_service_config;
use weighted_clusters::{update_weighted_cluster_index_map, WeightedClusterIndexMap};

/// Registers the xds resolver with the global resolver registry.  Discovery
/// clients for the channels using it are created through the provided
/// builder.
pub fn reg(client_builder: Arc<dyn XdsClientBuilder>) {
    GLOBAL_RESOLVER_REGISTRY.add_builder(Box::new(XdsResolverBuilder::new(client_builder)));
}

/// Factory for xds resolvers.
pub struct XdsResolverBuilder {
    client_builder: Arc<dyn XdsClientBuilder>,
}

impl XdsResolverBuilder {
    pub fn new(client_builder: Arc<dyn XdsClientBuilder>) -> Self {
        Self { client_builder }
    }
}

impl ResolverBuilder for XdsResolverBuilder {
    fn build(&self, target: &Target, options: ResolverOptions) -> Box<dyn Resolver> {
        // The server name is the target path with a single leading '/'
        // stripped.
        let path = target.path();
        let server_name = path.strip_prefix('/').unwrap_or(path).to_string();
        debug!("created xds resolver for server name {server_name}");
        let resolver = XdsResolver {
            server_name,
            attributes: options.attributes.clone(),
            runtime: options.runtime.clone(),
            client_builder: self.client_builder.clone(),
            config_selector: Arc::new(XdsConfigSelector {}),
            xds_client: None,
            started: false,
            events: Arc::new(EventQueue::new(options.work_scheduler.clone())),
            weighted_cluster_index_map: WeightedClusterIndexMap::default(),
        };
        // Request a work call to create the discovery client.
        options.work_scheduler.schedule_work();
        Box::new(resolver)
    }

    fn scheme(&self) -> &str {
        "xds"
    }

    fn is_valid_uri(&self, target: &Target) -> bool {
        if !target.authority_host_port().is_empty() {
            error!("URI authority not supported: {target}");
            return false;
        }
        true
    }
}

/// The config selector attached to successful results.  Route-aware per-call
/// configuration is not implemented yet, so every call gets the defaults.
pub struct XdsConfigSelector {}

impl ConfigSelector for XdsConfigSelector {
    fn call_config(&self, _method: &str) -> CallConfig {
        CallConfig::default()
    }
}

enum ListenerEvent {
    Changed(ListenerUpdate),
    Error(Status),
    DoesNotExist,
}

/// Hand-off point between the discovery client's threads and the channel's
/// serialized work context.  Watcher callbacks append an event and request a
/// work call; the resolver drains the queue inside work(), preserving
/// arrival order.
struct EventQueue {
    events: Mutex<VecDeque<ListenerEvent>>,
    is_shut_down: AtomicBool,
    work_scheduler: Arc<dyn WorkScheduler>,
}

impl EventQueue {
    fn new(work_scheduler: Arc<dyn WorkScheduler>) -> Self {
        Self {
            events: Mutex::new(VecDeque::new()),
            is_shut_down: AtomicBool::new(false),
            work_scheduler,
        }
    }

    fn post(&self, event: ListenerEvent) {
        if self.is_shut_down.load(Ordering::Acquire) {
            return;
        }
        self.events.lock().unwrap().push_back(event);
        self.work_scheduler.schedule_work();
    }

    fn pop(&self) -> Option<ListenerEvent> {
        self.events.lock().unwrap().pop_front()
    }

    fn shut_down(&self) {
        self.is_shut_down.store(true, Ordering::Release);
        self.events.lock().unwrap().clear();
    }
}

/// The watcher sink handed to the discovery client.  Holds only the shared
/// event queue, so the resolver itself can be destroyed independently of
/// callbacks still in flight.
struct XdsResolverWatcher {
    events: Arc<EventQueue>,
}

impl ListenerWatcher for XdsResolverWatcher {
    fn on_listener_changed(&self, update: ListenerUpdate) {
        self.events.post(ListenerEvent::Changed(update));
    }

    fn on_error(&self, status: Status) {
        self.events.post(ListenerEvent::Error(status));
    }

    fn on_resource_does_not_exist(&self) {
        self.events.post(ListenerEvent::DoesNotExist);
    }
}

struct XdsResolver {
    server_name: String,
    attributes: Arc<Attributes>,
    runtime: Arc<dyn rt::Runtime>,
    client_builder: Arc<dyn XdsClientBuilder>,
    config_selector: Arc<XdsConfigSelector>,
    // The discovery handle.  None before the first work call, after
    // shutdown, and when client creation failed; all notification handling
    // is gated on it.
    xds_client: Option<Arc<dyn XdsClient>>,
    started: bool,
    events: Arc<EventQueue>,
    weighted_cluster_index_map: WeightedClusterIndexMap,
}

impl Resolver for XdsResolver {
    fn resolve_now(&mut self) {
        // Push-based: the discovery client delivers updates on its own.
    }

    fn work(&mut self, channel_controller: &mut dyn ChannelController) {
        if !self.started {
            self.started = true;
            self.start(channel_controller);
        }
        while let Some(event) = self.events.pop() {
            match event {
                ListenerEvent::Changed(update) => {
                    self.on_listener_changed(update, channel_controller)
                }
                ListenerEvent::Error(status) => {
                    self.on_error(Arc::new(status), channel_controller)
                }
                ListenerEvent::DoesNotExist => {
                    self.on_resource_does_not_exist(channel_controller)
                }
            }
        }
    }
}

impl XdsResolver {
    /// Creates the discovery client and registers the listener watch.  On
    /// failure the error is reported to the channel once and the resolver
    /// stays inert until shutdown.
    fn start(&mut self, channel_controller: &mut dyn ChannelController) {
        let watcher = Arc::new(XdsResolverWatcher {
            events: self.events.clone(),
        });
        let args = XdsClientArgs {
            work_scheduler: self.events.work_scheduler.clone(),
            runtime: self.runtime.clone(),
            server_name: self.server_name.clone(),
            initial_addresses: vec![],
            watcher,
            attributes: self.attributes.clone(),
        };
        match self.client_builder.build(args) {
            Ok(client) => self.xds_client = Some(client),
            Err(err) => {
                error!(
                    "failed to create xds client -- channel will remain in \
                     TRANSIENT_FAILURE: {err}"
                );
                let _ = channel_controller.update(ResolverUpdate {
                    attributes: self.attributes.clone(),
                    service_config: Err(Arc::from(err)),
                });
            }
        }
    }

    fn on_listener_changed(
        &mut self,
        update: ListenerUpdate,
        channel_controller: &mut dyn ChannelController,
    ) {
        let Some(xds_client) = self.xds_client.clone() else {
            return;
        };
        debug!(
            "xds resolver for {} received updated listener data",
            self.server_name
        );
        let service_config =
            match self.create_service_config(&update.route_config, channel_controller) {
                Ok(config) => config,
                Err(err) => {
                    self.on_error(Arc::from(err), channel_controller);
                    return;
                }
            };
        debug!(
            "xds resolver for {} generated service config: {}",
            self.server_name,
            service_config.json_string()
        );
        let attributes = Arc::new(
            (*self.attributes)
                .clone()
                .with_value(
                    XDS_CLIENT_ATTRIBUTE_KEY,
                    Arc::new(XdsClientAttribute(xds_client)),
                )
                .with_value(CONFIG_SELECTOR_ATTRIBUTE_KEY, self.config_selector.clone()),
        );
        let _ = channel_controller.update(ResolverUpdate {
            attributes,
            service_config: Ok(Some(service_config)),
        });
    }

    fn on_error(
        &mut self,
        err: Arc<dyn Error + Send + Sync>,
        channel_controller: &mut dyn ChannelController,
    ) {
        let Some(xds_client) = self.xds_client.clone() else {
            return;
        };
        error!("xds resolver for {} received error: {err}", self.server_name);
        let attributes = Arc::new((*self.attributes).clone().with_value(
            XDS_CLIENT_ATTRIBUTE_KEY,
            Arc::new(XdsClientAttribute(xds_client)),
        ));
        let _ = channel_controller.update(ResolverUpdate {
            attributes,
            service_config: Err(err),
        });
    }

    fn on_resource_does_not_exist(&mut self, channel_controller: &mut dyn ChannelController) {
        if self.xds_client.is_none() {
            return;
        }
        error!(
            "xds resolver for {}: LDS/RDS resource does not exist -- returning \
             empty service config",
            self.server_name
        );
        // An empty config signals the channel to fail calls fast instead of
        // queueing them.  The raw channel attributes are used: without a
        // resource there is nothing for LB policies to watch.
        match channel_controller.parse_service_config("{}") {
            Ok(service_config) => {
                let _ = channel_controller.update(ResolverUpdate {
                    attributes: self.attributes.clone(),
                    service_config: Ok(Some(service_config)),
                });
            }
            Err(err) => {
                debug_assert!(false, "parsing an empty service config failed: {err}");
                let _ = channel_controller.update(ResolverUpdate {
                    attributes: self.attributes.clone(),
                    service_config: Err(Arc::from(err)),
                });
            }
        }
    }

    fn create_service_config(
        &mut self,
        route_config: &RouteConfigUpdate,
        channel_controller: &mut dyn ChannelController,
    ) -> Result<ServiceConfig, Box<dyn Error + Send + Sync>> {
        self.weighted_cluster_index_map = update_weighted_cluster_index_map(
            mem::take(&mut self.weighted_cluster_index_map),
            route_config,
        );
        let json = generate_service_config(route_config, &self.weighted_cluster_index_map);
        channel_controller.parse_service_config(&json)
    }

    fn shut_down(&mut self) {
        self.events.shut_down();
        self.xds_client = None;
    }
}

impl Drop for XdsResolver {
    fn drop(&mut self) {
        debug!("xds resolver for {} shutting down", self.server_name);
        self.shut_down();
    }
}
