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

//! Name Resolution for gRPC.
//!
//! Name Resolution is the process by which a channel's target is converted
//! into the configuration the channel uses to reach a service.  A resolver
//! watches the target and pushes results to the channel: a service config
//! describing how to balance load, attributes for consumption by LB
//! policies, or an error when no usable configuration is available.

use core::fmt;

use super::service_config::ServiceConfig;
use crate::{attributes::Attributes, rt};
use std::{
    error::Error,
    fmt::{Display, Formatter},
    str::FromStr,
    sync::Arc,
};

mod registry;
pub use registry::{ResolverRegistry, GLOBAL_RESOLVER_REGISTRY};

pub mod xds;

/// Target represents a target for gRPC, as specified in:
/// https://github.com/grpc/grpc/blob/master/doc/naming.md.
/// It is parsed from the target string that gets passed during channel
/// creation by the user.  gRPC passes it to the resolver and the balancer.
#[derive(Debug, Clone)]
pub struct Target {
    url: url::Url,
}

impl FromStr for Target {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<url::Url>() {
            Ok(url) => Ok(Target { url }),
            Err(err) => Err(ParseError { cause: err }),
        }
    }
}

impl From<url::Url> for Target {
    fn from(url: url::Url) -> Self {
        Target { url }
    }
}

#[derive(Debug)]
pub struct ParseError {
    cause: url::ParseError,
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "invalid target URI: {}", self.cause)
    }
}

impl Error for ParseError {}

impl Target {
    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    /// The host part of the authority.
    pub fn authority_host(&self) -> &str {
        self.url.host_str().unwrap_or("")
    }

    /// The port part of the authority.
    pub fn authority_port(&self) -> Option<u16> {
        self.url.port()
    }

    /// Returns either host:port or host depending on the existence of the
    /// port in the authority.
    pub fn authority_host_port(&self) -> String {
        let host = self.authority_host();
        match self.authority_port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_owned(),
        }
    }

    /// Retrieves the endpoint from the path portion of the target.
    pub fn path(&self) -> &str {
        self.url.path()
    }
}

impl Display for Target {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}://{}{}",
            self.scheme(),
            self.authority_host_port(),
            self.path()
        )
    }
}

/// A name resolver factory
pub trait ResolverBuilder: Send + Sync {
    /// Builds a name resolver instance, or returns an error.
    ///
    /// Note that build must not fail.  Instead, an erroring Resolver may be
    /// returned that calls ChannelController.update() with an Err value.
    fn build(&self, target: &Target, options: ResolverOptions) -> Box<dyn Resolver>;

    /// Reports the URI scheme handled by this name resolver.
    fn scheme(&self) -> &str;

    /// Returns the default authority for a channel using this name resolver
    /// and target.  This is typically the same as the service's name.  By
    /// default, the default_authority method automatically returns the
    /// authority portion of the target URI.
    fn default_authority(&self, target: &Target) -> String {
        target.authority_host_port()
    }

    /// Returns a bool indicating whether the input uri is valid to create a
    /// resolver.
    fn is_valid_uri(&self, target: &Target) -> bool;
}

/// A collection of data configured on the channel that is constructing this
/// name resolver.
#[non_exhaustive]
pub struct ResolverOptions {
    /// Authority is the effective authority of the channel for which the
    /// resolver is built.
    pub authority: String,

    /// The runtime which provides utilities to do async work.
    pub runtime: Arc<dyn rt::Runtime>,

    /// A hook into the channel's work scheduler that allows the Resolver to
    /// request the ability to perform operations on the ChannelController.
    pub work_scheduler: Arc<dyn WorkScheduler>,

    /// The channel's base attributes.  Resolvers include these, possibly
    /// augmented, in every result they push.
    pub attributes: Arc<Attributes>,
}

/// Used to asynchronously request a call into the Resolver's work method.
pub trait WorkScheduler: Send + Sync {
    // Schedules a call into the Resolver's work method.  If there is already
    // a pending work call that has not yet started, this may not schedule
    // another call.
    fn schedule_work(&self);
}

/// Resolver watches for updates on the specified target and converts them
/// into results for the channel.
pub trait Resolver: Send {
    /// Asks the resolver to obtain an updated resolver result, if
    /// applicable.
    ///
    /// This is useful for pull-based implementations to decide when to
    /// re-resolve.  However, the implementation is not required to
    /// re-resolve immediately upon receiving this call; it may instead
    /// elect to delay based on some configured minimum time between
    /// queries, to avoid hammering the name service with queries.
    ///
    /// For push-based implementations, this may be a no-op.
    fn resolve_now(&mut self);

    /// Called serially by the work scheduler to do work after the helper's
    /// schedule_work method is called.
    fn work(&mut self, channel_controller: &mut dyn ChannelController);
}

/// The `ChannelController` trait provides the resolver with functionality
/// to interact with the channel.
pub trait ChannelController: Send + Sync {
    /// Notifies the channel about the current state of the name resolver.
    /// If an error value is returned, the name resolver should attempt to
    /// re-resolve, if possible.  The resolver is responsible for applying an
    /// appropriate backoff mechanism to avoid overloading the system or the
    /// remote resolver.
    fn update(&mut self, update: ResolverUpdate) -> Result<(), String>;

    /// Parses the provided JSON service config and returns an instance of a
    /// ServiceConfig.
    fn parse_service_config(
        &self,
        config: &str,
    ) -> Result<ServiceConfig, Box<dyn Error + Send + Sync>>;
}

/// ResolverUpdate contains the current Resolver state relevant to the
/// channel.
#[derive(Clone)]
#[non_exhaustive]
pub struct ResolverUpdate {
    /// Attributes contains arbitrary data about the resolver intended for
    /// consumption by the LB policy and the channel.
    pub attributes: Arc<Attributes>,

    /// The result from producing the latest service config.  Ok(None)
    /// indicates the resolver does not provide service configs.  An Err
    /// value is transient: the channel keeps using the previous good config
    /// if it has one.
    pub service_config: Result<Option<ServiceConfig>, Arc<dyn Error + Send + Sync>>,
}

impl Default for ResolverUpdate {
    fn default() -> Self {
        ResolverUpdate {
            attributes: Arc::default(),
            service_config: Ok(None),
        }
    }
}
