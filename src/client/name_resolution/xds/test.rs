use std::{error::Error, sync::Arc};

use serde_json::{json, Value};
use tokio::sync::mpsc;
use tonic::Status;

use super::*;
use crate::{
    rt::tokio::TokioRuntime,
    xds::route::{ClusterWeight, PathMatcher, Route, RouteAction, RouteMatchers},
};

enum TestEvent {
    ScheduleWork,
    NewXdsClient(String, Arc<dyn ListenerWatcher>),
    ClientReleased,
    Update(ResolverUpdate),
}

struct TestWorkScheduler {
    tx_events: mpsc::UnboundedSender<TestEvent>,
}

impl WorkScheduler for TestWorkScheduler {
    fn schedule_work(&self) {
        self.tx_events.send(TestEvent::ScheduleWork).unwrap();
    }
}

struct FakeXdsClient {
    tx_events: mpsc::UnboundedSender<TestEvent>,
}

impl XdsClient for FakeXdsClient {}

impl Drop for FakeXdsClient {
    fn drop(&mut self) {
        let _ = self.tx_events.send(TestEvent::ClientReleased);
    }
}

struct FakeXdsClientBuilder {
    tx_events: mpsc::UnboundedSender<TestEvent>,
}

impl XdsClientBuilder for FakeXdsClientBuilder {
    fn build(
        &self,
        args: XdsClientArgs,
    ) -> Result<Arc<dyn XdsClient>, Box<dyn Error + Send + Sync>> {
        self.tx_events
            .send(TestEvent::NewXdsClient(
                args.server_name.clone(),
                args.watcher.clone(),
            ))
            .unwrap();
        Ok(Arc::new(FakeXdsClient {
            tx_events: self.tx_events.clone(),
        }))
    }
}

struct FailingXdsClientBuilder {}

impl XdsClientBuilder for FailingXdsClientBuilder {
    fn build(
        &self,
        _args: XdsClientArgs,
    ) -> Result<Arc<dyn XdsClient>, Box<dyn Error + Send + Sync>> {
        Err("no bootstrap configuration found".into())
    }
}

struct FakeChannel {
    tx_events: mpsc::UnboundedSender<TestEvent>,
}

impl ChannelController for FakeChannel {
    fn update(&mut self, update: ResolverUpdate) -> Result<(), String> {
        self.tx_events.send(TestEvent::Update(update)).unwrap();
        Ok(())
    }

    fn parse_service_config(
        &self,
        config: &str,
    ) -> Result<ServiceConfig, Box<dyn Error + Send + Sync>> {
        ServiceConfig::parse(config)
    }
}

fn resolver_options(tx_events: &mpsc::UnboundedSender<TestEvent>) -> ResolverOptions {
    ResolverOptions {
        authority: String::new(),
        runtime: Arc::new(TokioRuntime::default()),
        work_scheduler: Arc::new(TestWorkScheduler {
            tx_events: tx_events.clone(),
        }),
        attributes: Arc::default(),
    }
}

struct TestResolver {
    resolver: Box<dyn Resolver>,
    channel: FakeChannel,
    rx_events: mpsc::UnboundedReceiver<TestEvent>,
    watcher: Arc<dyn ListenerWatcher>,
}

// Builds a resolver with a working fake discovery client and drives it until
// the client's watch is registered.
async fn start_resolver(target: &str) -> TestResolver {
    let (tx_events, mut rx_events) = mpsc::unbounded_channel::<TestEvent>();
    let builder = XdsResolverBuilder::new(Arc::new(FakeXdsClientBuilder {
        tx_events: tx_events.clone(),
    }));
    let target: Target = target.parse().unwrap();
    assert!(builder.is_valid_uri(&target));
    let mut resolver = builder.build(&target, resolver_options(&tx_events));

    // Building must schedule the work call that creates the discovery
    // client.
    match rx_events.recv().await.unwrap() {
        TestEvent::ScheduleWork => {}
        _ => panic!("unexpected event"),
    }
    let mut channel = FakeChannel {
        tx_events: tx_events.clone(),
    };
    resolver.work(&mut channel);
    let watcher = match rx_events.recv().await.unwrap() {
        TestEvent::NewXdsClient(_, watcher) => watcher,
        _ => panic!("unexpected event"),
    };
    TestResolver {
        resolver,
        channel,
        rx_events,
        watcher,
    }
}

impl TestResolver {
    async fn expect_schedule_work_and_run(&mut self) {
        match self.rx_events.recv().await.unwrap() {
            TestEvent::ScheduleWork => {}
            _ => panic!("unexpected event"),
        }
        self.resolver.work(&mut self.channel);
    }

    async fn next_update(&mut self) -> ResolverUpdate {
        match self.rx_events.recv().await.unwrap() {
            TestEvent::Update(update) => update,
            _ => panic!("unexpected event"),
        }
    }

    async fn deliver_routes(&mut self, routes: Vec<Route>) -> ResolverUpdate {
        self.watcher.on_listener_changed(ListenerUpdate {
            route_config: RouteConfigUpdate { routes },
        });
        self.expect_schedule_work_and_run().await;
        self.next_update().await
    }
}

fn prefix_route_to_cluster(prefix: &str, cluster: &str) -> Route {
    Route {
        matchers: RouteMatchers {
            path_matcher: PathMatcher::Prefix(prefix.to_string()),
            header_matchers: vec![],
            fraction_per_million: None,
        },
        action: RouteAction::Cluster(cluster.to_string()),
    }
}

fn weighted_route(path: &str, clusters: &[(&str, u32)]) -> Route {
    Route {
        matchers: RouteMatchers {
            path_matcher: PathMatcher::Path(path.to_string()),
            header_matchers: vec![],
            fraction_per_million: None,
        },
        action: RouteAction::WeightedClusters(
            clusters
                .iter()
                .map(|(name, weight)| ClusterWeight {
                    name: name.to_string(),
                    weight: *weight,
                })
                .collect(),
        ),
    }
}

// Extracts the xds_routing policy config from a successful update.
fn routing_config(update: &ResolverUpdate) -> Value {
    let service_config = update.service_config.as_ref().unwrap().as_ref().unwrap();
    let entries = service_config.load_balancing_config().unwrap();
    entries[0]["xds_routing_experimental"].clone()
}

#[test]
fn builder_validates_uri_authority() {
    let (tx_events, _rx_events) = mpsc::unbounded_channel::<TestEvent>();
    let builder = XdsResolverBuilder::new(Arc::new(FakeXdsClientBuilder { tx_events }));
    assert_eq!(builder.scheme(), "xds");
    assert!(builder.is_valid_uri(&"xds:///server.example.com".parse().unwrap()));
    assert!(!builder.is_valid_uri(&"xds://auth.example.com/server.example.com".parse().unwrap()));
}

#[test]
fn registers_under_xds_scheme() {
    let (tx_events, _rx_events) = mpsc::unbounded_channel::<TestEvent>();
    reg(Arc::new(FakeXdsClientBuilder { tx_events }));
    let builder = GLOBAL_RESOLVER_REGISTRY.get("xds").unwrap();
    assert_eq!(builder.scheme(), "xds");
}

#[tokio::test]
async fn resolver_watches_server_name_from_target() {
    let (tx_events, mut rx_events) = mpsc::unbounded_channel::<TestEvent>();
    let builder = XdsResolverBuilder::new(Arc::new(FakeXdsClientBuilder {
        tx_events: tx_events.clone(),
    }));
    let target: Target = "xds:///server.example.com".parse().unwrap();
    let mut resolver = builder.build(&target, resolver_options(&tx_events));
    match rx_events.recv().await.unwrap() {
        TestEvent::ScheduleWork => {}
        _ => panic!("unexpected event"),
    }
    let mut channel = FakeChannel {
        tx_events: tx_events.clone(),
    };
    resolver.work(&mut channel);
    match rx_events.recv().await.unwrap() {
        TestEvent::NewXdsClient(server_name, _) => {
            // A single leading '/' is stripped from the target path.
            assert_eq!(server_name, "server.example.com");
        }
        _ => panic!("unexpected event"),
    }
}

#[tokio::test]
async fn listener_update_produces_service_config() {
    let mut t = start_resolver("xds:///server.example.com").await;
    let update = t
        .deliver_routes(vec![prefix_route_to_cluster("/svc.S/", "C")])
        .await;

    let routing = routing_config(&update);
    assert_eq!(routing["routes"][0]["prefix"], json!("/svc.S/"));
    assert_eq!(routing["routes"][0]["action"], json!("cds:C"));
    assert_eq!(
        routing["actions"]["cds:C"]["childPolicy"][0]["cds_experimental"]["cluster"],
        json!("C")
    );

    // Successful results carry the discovery client and the config
    // selector.
    assert!(update
        .attributes
        .get::<XdsClientAttribute>(XDS_CLIENT_ATTRIBUTE_KEY)
        .is_some());
    let config_selector = update
        .attributes
        .get::<XdsConfigSelector>(CONFIG_SELECTOR_ATTRIBUTE_KEY)
        .unwrap();
    let _ = config_selector.call_config("/svc.S/M");
}

#[tokio::test]
async fn weighted_action_names_are_stable_across_updates() {
    let mut t = start_resolver("xds:///server.example.com").await;

    let update = t
        .deliver_routes(vec![weighted_route("/svc.S/M", &[("A", 30), ("B", 70)])])
        .await;
    let routing = routing_config(&update);
    assert_eq!(routing["routes"][0]["action"], json!("weighted:A_B_0"));
    let targets = &routing["actions"]["weighted:A_B_0"]["childPolicy"][0]
        ["weighted_target_experimental"]["targets"];
    assert_eq!(targets["A"]["weight"], json!(30));
    assert_eq!(targets["B"]["weight"], json!(70));

    // Same clusters with different weights keep the action name, so the
    // weighted_target policy downstream keeps its subtree.
    let update = t
        .deliver_routes(vec![weighted_route("/svc.S/M", &[("A", 40), ("B", 60)])])
        .await;
    let routing = routing_config(&update);
    assert_eq!(routing["routes"][0]["action"], json!("weighted:A_B_0"));

    // A different cluster set gets a fresh name and the old group is
    // discarded.
    let update = t
        .deliver_routes(vec![weighted_route("/svc.S/M", &[("A", 50), ("C", 50)])])
        .await;
    let routing = routing_config(&update);
    assert_eq!(routing["routes"][0]["action"], json!("weighted:A_C_0"));
    let actions = routing["actions"].as_object().unwrap();
    assert_eq!(actions.len(), 1);
    assert!(actions.contains_key("weighted:A_C_0"));
}

#[tokio::test]
async fn discovery_error_is_reported_as_transient() {
    let mut t = start_resolver("xds:///server.example.com").await;
    t.watcher.on_error(Status::unavailable("connection reset"));
    t.expect_schedule_work_and_run().await;
    let update = t.next_update().await;

    match &update.service_config {
        Err(err) => assert!(err.to_string().contains("connection reset")),
        Ok(_) => panic!("expected an error update"),
    }
    // Error results carry the discovery client but no config selector.
    assert!(update
        .attributes
        .get::<XdsClientAttribute>(XDS_CLIENT_ATTRIBUTE_KEY)
        .is_some());
    assert!(!update.attributes.contains_key(CONFIG_SELECTOR_ATTRIBUTE_KEY));
}

#[tokio::test]
async fn resource_does_not_exist_returns_empty_config() {
    let mut t = start_resolver("xds:///server.example.com").await;
    t.watcher.on_resource_does_not_exist();
    t.expect_schedule_work_and_run().await;
    let update = t.next_update().await;

    let service_config = update.service_config.as_ref().unwrap().as_ref().unwrap();
    assert_eq!(*service_config, ServiceConfig::parse("{}").unwrap());
    // The raw channel attributes ride along: neither the discovery client
    // nor a config selector is attached.
    assert!(!update.attributes.contains_key(XDS_CLIENT_ATTRIBUTE_KEY));
    assert!(!update.attributes.contains_key(CONFIG_SELECTOR_ATTRIBUTE_KEY));
}

#[tokio::test]
async fn client_creation_failure_is_reported_once() {
    let (tx_events, mut rx_events) = mpsc::unbounded_channel::<TestEvent>();
    let builder = XdsResolverBuilder::new(Arc::new(FailingXdsClientBuilder {}));
    let target: Target = "xds:///server.example.com".parse().unwrap();
    let mut resolver = builder.build(&target, resolver_options(&tx_events));
    match rx_events.recv().await.unwrap() {
        TestEvent::ScheduleWork => {}
        _ => panic!("unexpected event"),
    }
    let mut channel = FakeChannel {
        tx_events: tx_events.clone(),
    };
    resolver.work(&mut channel);
    let update = match rx_events.recv().await.unwrap() {
        TestEvent::Update(update) => update,
        _ => panic!("unexpected event"),
    };
    match &update.service_config {
        Err(err) => assert!(err.to_string().contains("bootstrap")),
        Ok(_) => panic!("expected an error update"),
    }

    // The resolver stays inert afterwards.
    resolver.work(&mut channel);
    assert!(rx_events.try_recv().is_err());
}

#[tokio::test]
async fn watcher_callbacks_after_shutdown_are_ignored() {
    let mut t = start_resolver("xds:///server.example.com").await;

    // Dropping the resolver releases the discovery handle.
    drop(t.resolver);
    match t.rx_events.recv().await.unwrap() {
        TestEvent::ClientReleased => {}
        _ => panic!("unexpected event"),
    }

    // Callbacks delivered after shutdown must not schedule work or push
    // results.
    t.watcher.on_listener_changed(ListenerUpdate {
        route_config: RouteConfigUpdate::default(),
    });
    t.watcher.on_error(Status::unavailable("gone"));
    t.watcher.on_resource_does_not_exist();
    assert!(t.rx_events.try_recv().is_err());
}
