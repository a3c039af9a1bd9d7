// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::Result;
use axum::{routing::get, Router};
use cfgate::{
    constants::{
        DEFAULT_LEASE_DURATION_SECS, DEFAULT_LEASE_RETRY_PERIOD_SECS, ERROR_REQUEUE_DURATION_SECS,
        KIND_ACCESS_POLICY, KIND_DNS_SYNC, KIND_HTTP_ROUTE, KIND_TUNNEL,
        METRICS_SERVER_BIND_ADDRESS, METRICS_SERVER_PATH, METRICS_SERVER_PORT,
        REQUEUE_WHEN_READY_SECS, TOKIO_WORKER_THREADS,
    },
    context::{Context, Stores},
    credentials::CredentialsCache,
    crd::{CloudflareAccessPolicy, CloudflareDNSSync, CloudflareTunnel, TargetKind},
    gateway::{Gateway, GatewayClass, HTTPRoute, ReferenceGrant},
    metrics,
    reconcilers::{
        reconcile_accesspolicy, reconcile_dnssync, reconcile_httproute, reconcile_tunnel,
    },
};
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::{
    runtime::{
        controller::Action,
        reflector,
        reflector::ObjectRef,
        watcher,
        watcher::Config,
        Controller,
    },
    Api, Client, ResourceExt,
};
use kube_lease_manager::{LeaseManager, LeaseManagerBuilder};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, thiserror::Error)]
#[error(transparent)]
struct ReconcileError(#[from] anyhow::Error);

fn main() -> Result<()> {
    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("cfgate-operator")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

/// Initialize logging with custom format
///
/// Respects `RUST_LOG` environment variable if set, otherwise defaults to INFO level.
/// Respects `RUST_LOG_FORMAT` environment variable for output format (json or text).
fn initialize_logging() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }

    info!("Starting cfgate operator");
}

/// Initialize reflectors for all watched kinds and create the shared context.
///
/// Each reflector spawns a background task that watches its resource type
/// and updates the corresponding store. The stores are then made available
/// to all controllers through the shared context, enabling in-memory
/// annotation- and reference-based lookups in watch mappers.
#[allow(clippy::too_many_lines, clippy::unused_async)]
async fn initialize_shared_context(client: Client) -> Result<Arc<Context>> {
    info!("Initializing reflectors for all watched kinds");

    let tunnels_api = Api::<CloudflareTunnel>::all(client.clone());
    let dns_syncs_api = Api::<CloudflareDNSSync>::all(client.clone());
    let access_policies_api = Api::<CloudflareAccessPolicy>::all(client.clone());
    let gateway_classes_api = Api::<GatewayClass>::all(client.clone());
    let gateways_api = Api::<Gateway>::all(client.clone());
    let http_routes_api = Api::<HTTPRoute>::all(client.clone());
    let deployments_api = Api::<Deployment>::all(client.clone());

    let (tunnels_store, tunnels_writer) = reflector::store();
    let (dns_syncs_store, dns_syncs_writer) = reflector::store();
    let (access_policies_store, access_policies_writer) = reflector::store();
    let (gateway_classes_store, gateway_classes_writer) = reflector::store();
    let (gateways_store, gateways_writer) = reflector::store();
    let (http_routes_store, http_routes_writer) = reflector::store();
    let (deployments_store, deployments_writer) = reflector::store();

    tokio::spawn(async move {
        let stream = watcher(tunnels_api, watcher::Config::default());
        reflector(tunnels_writer, stream)
            .for_each(|_| futures::future::ready(()))
            .await;
        warn!("CloudflareTunnel reflector stream ended");
    });

    tokio::spawn(async move {
        let stream = watcher(dns_syncs_api, watcher::Config::default());
        reflector(dns_syncs_writer, stream)
            .for_each(|_| futures::future::ready(()))
            .await;
        warn!("CloudflareDNSSync reflector stream ended");
    });

    tokio::spawn(async move {
        let stream = watcher(access_policies_api, watcher::Config::default());
        reflector(access_policies_writer, stream)
            .for_each(|_| futures::future::ready(()))
            .await;
        warn!("CloudflareAccessPolicy reflector stream ended");
    });

    tokio::spawn(async move {
        let stream = watcher(gateway_classes_api, watcher::Config::default());
        reflector(gateway_classes_writer, stream)
            .for_each(|_| futures::future::ready(()))
            .await;
        warn!("GatewayClass reflector stream ended");
    });

    tokio::spawn(async move {
        let stream = watcher(gateways_api, watcher::Config::default());
        reflector(gateways_writer, stream)
            .for_each(|_| futures::future::ready(()))
            .await;
        warn!("Gateway reflector stream ended");
    });

    tokio::spawn(async move {
        let stream = watcher(http_routes_api, watcher::Config::default());
        reflector(http_routes_writer, stream)
            .for_each(|_| futures::future::ready(()))
            .await;
        warn!("HTTPRoute reflector stream ended");
    });

    tokio::spawn(async move {
        // Only agent deployments owned by a CloudflareTunnel belong in the store
        let is_agent_deployment = |deployment: &Deployment| {
            deployment
                .metadata
                .owner_references
                .as_ref()
                .is_some_and(|owners| owners.iter().any(|owner| owner.kind == KIND_TUNNEL))
        };

        let stream = watcher(deployments_api, watcher::Config::default()).filter_map(
            move |event| async move {
                match event {
                    Ok(watcher::Event::Apply(deployment)) => {
                        is_agent_deployment(&deployment)
                            .then_some(Ok(watcher::Event::Apply(deployment)))
                    }
                    Ok(watcher::Event::Delete(deployment)) => {
                        is_agent_deployment(&deployment)
                            .then_some(Ok(watcher::Event::Delete(deployment)))
                    }
                    Ok(watcher::Event::InitApply(deployment)) => {
                        is_agent_deployment(&deployment)
                            .then_some(Ok(watcher::Event::InitApply(deployment)))
                    }
                    Ok(watcher::Event::Init) => Some(Ok(watcher::Event::Init)),
                    Ok(watcher::Event::InitDone) => Some(Ok(watcher::Event::InitDone)),
                    Err(e) => Some(Err(e)),
                }
            },
        );

        reflector(deployments_writer, stream)
            .for_each(|_| futures::future::ready(()))
            .await;
        warn!("Deployment reflector stream ended");
    });

    let stores = Stores {
        tunnels: tunnels_store,
        dns_syncs: dns_syncs_store,
        access_policies: access_policies_store,
        gateway_classes: gateway_classes_store,
        gateways: gateways_store,
        http_routes: http_routes_store,
        agent_deployments: deployments_store,
    };

    let context = Arc::new(Context {
        client,
        stores,
        credentials: Arc::new(CredentialsCache::new()),
    });

    info!("Shared context initialized");
    Ok(context)
}

/// Start the Prometheus metrics HTTP server
///
/// Serves metrics on the configured port and path (default: 0.0.0.0:8080/metrics)
fn start_metrics_server() -> tokio::task::JoinHandle<()> {
    info!(
        bind_address = METRICS_SERVER_BIND_ADDRESS,
        port = METRICS_SERVER_PORT,
        path = METRICS_SERVER_PATH,
        "Starting Prometheus metrics HTTP server"
    );

    tokio::spawn(async move {
        async fn metrics_handler() -> String {
            match metrics::gather_metrics() {
                Ok(metrics_text) => metrics_text,
                Err(e) => {
                    error!("Failed to gather metrics: {}", e);
                    String::from("# Error gathering metrics\n")
                }
            }
        }

        let app = Router::new().route(METRICS_SERVER_PATH, get(metrics_handler));

        let bind_addr = format!("{METRICS_SERVER_BIND_ADDRESS}:{METRICS_SERVER_PORT}");
        let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("Failed to bind metrics server to {bind_addr}: {e}");
                return;
            }
        };

        info!("Metrics server listening on http://{bind_addr}{METRICS_SERVER_PATH}");

        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {e}");
        }
    })
}

/// Leader election configuration
struct LeaderElectionConfig {
    enabled: bool,
    lease_name: String,
    lease_namespace: String,
    identity: String,
    lease_duration: u64,
    retry_period: u64,
}

/// Load leader election configuration from environment variables
fn load_leader_election_config() -> LeaderElectionConfig {
    let enabled = std::env::var("CFGATE_ENABLE_LEADER_ELECTION")
        .unwrap_or_else(|_| "true".to_string())
        .parse::<bool>()
        .unwrap_or(true);

    let lease_name =
        std::env::var("CFGATE_LEASE_NAME").unwrap_or_else(|_| "cfgate-leader".to_string());

    let lease_namespace = std::env::var("CFGATE_LEASE_NAMESPACE")
        .or_else(|_| std::env::var("POD_NAMESPACE"))
        .unwrap_or_else(|_| "cfgate-system".to_string());

    let lease_duration = std::env::var("CFGATE_LEASE_DURATION_SECONDS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(DEFAULT_LEASE_DURATION_SECS);

    let retry_period = std::env::var("CFGATE_LEASE_RETRY_PERIOD_SECONDS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(DEFAULT_LEASE_RETRY_PERIOD_SECS);

    let identity = std::env::var("POD_NAME")
        .or_else(|_| std::env::var("HOSTNAME"))
        .unwrap_or_else(|_| format!("cfgate-{}", rand::random::<u32>()));

    LeaderElectionConfig {
        enabled,
        lease_name,
        lease_namespace,
        identity,
        lease_duration,
        retry_period,
    }
}

/// Create a default watcher configuration.
///
/// Used for secondary watches where every change (including status-only
/// updates) may affect a primary resource.
#[inline]
fn default_watcher_config() -> Config {
    Config::default()
}

/// Create a semantic watcher configuration.
///
/// Only triggers on semantic changes (spec modifications), ignoring
/// status-only updates. This prevents reconciliation loops when controllers
/// update status fields on their primary objects.
#[inline]
fn semantic_watcher_config() -> Config {
    Config::default().any_semantic()
}

async fn async_main() -> Result<()> {
    initialize_logging();

    debug!("Initializing Kubernetes client");
    let config = kube::Config::infer().await?;
    let client = Client::try_from(config)?;
    info!("Kubernetes client initialized");

    let context = initialize_shared_context(client.clone()).await?;

    let _metrics_handle = start_metrics_server();

    let leader_election_config = load_leader_election_config();

    if leader_election_config.enabled {
        info!(
            lease_name = %leader_election_config.lease_name,
            lease_namespace = %leader_election_config.lease_namespace,
            identity = %leader_election_config.identity,
            lease_duration_secs = leader_election_config.lease_duration,
            "Leader election enabled"
        );

        info!("Starting leader election, waiting to acquire leadership...");

        let lease_manager =
            LeaseManagerBuilder::new(client.clone(), &leader_election_config.lease_name)
                .with_namespace(&leader_election_config.lease_namespace)
                .with_identity(&leader_election_config.identity)
                .with_duration(leader_election_config.lease_duration)
                .with_grace(leader_election_config.retry_period)
                .build()
                .await?;

        let (leader_rx, lease_handle) = lease_manager.watch().await;

        // Wait until we become leader
        let mut rx = leader_rx.clone();
        while !*rx.borrow_and_update() {
            rx.changed().await?;
        }

        info!("Leadership acquired, starting controllers...");
        run_operators_with_leader_election(context, leader_rx, lease_handle).await?;
    } else {
        warn!("Leader election DISABLED - running without high availability");
        run_operators_without_leader_election(context).await?;
    }

    Ok(())
}

/// Monitor leadership status - returns when leadership is lost or an error occurs
async fn monitor_leadership(
    mut leader_rx: tokio::sync::watch::Receiver<bool>,
) -> Result<(), anyhow::Error> {
    loop {
        leader_rx.changed().await?;
        if !*leader_rx.borrow() {
            return Ok(());
        }
    }
}

/// Wait for SIGINT or SIGTERM.
async fn wait_for_shutdown_signal() -> Result<()> {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            info!("Received SIGINT (Ctrl+C), initiating graceful shutdown...");
            result.map_err(anyhow::Error::from)
        }
        result = async {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{signal, SignalKind};
                let mut sigterm = signal(SignalKind::terminate())?;
                sigterm.recv().await;
                Ok::<(), anyhow::Error>(())
            }
            #[cfg(not(unix))]
            {
                std::future::pending::<()>().await;
                Ok::<(), anyhow::Error>(())
            }
        } => {
            info!("Received SIGTERM (pod termination), initiating graceful shutdown...");
            result
        }
    }
}

/// Run all operators without leader election, with signal handling
async fn run_operators_without_leader_election(context: Arc<Context>) -> Result<()> {
    let shutdown_result: Result<()> = tokio::select! {
        result = wait_for_shutdown_signal() => {
            info!("Stopping all operators...");
            result
        }
        result = run_all_operators(context) => {
            result
        }
    };

    shutdown_result?;
    info!("Graceful shutdown completed successfully");
    Ok(())
}

/// Run operators with leader election monitoring and signal handling.
///
/// If leadership is lost or a signal is received, all operators stop and the
/// process exits; standbys take over through the lease.
async fn run_operators_with_leader_election(
    context: Arc<Context>,
    leader_rx: tokio::sync::watch::Receiver<bool>,
    _lease_handle: tokio::task::JoinHandle<
        Result<LeaseManager, kube_lease_manager::LeaseManagerError>,
    >,
) -> Result<()> {
    let shutdown_result: Result<()> = tokio::select! {
        result = wait_for_shutdown_signal() => {
            info!("Stopping all operators and releasing leader election lease...");
            result
        }
        result = monitor_leadership(leader_rx) => {
            match result {
                Ok(()) => {
                    warn!("Leadership lost! Stopping all operators...");
                    anyhow::bail!("Leadership lost - stepping down")
                }
                Err(e) => {
                    error!("Leadership monitor error: {:?}", e);
                    anyhow::bail!("Leadership monitoring failed: {e}")
                }
            }
        }
        result = run_all_operators(context) => {
            result
        }
    };

    shutdown_result?;
    info!("Graceful shutdown completed successfully, leader election lease released");
    Ok(())
}

/// Run all controllers; none of them is expected to ever exit
async fn run_all_operators(context: Arc<Context>) -> Result<()> {
    tokio::select! {
        result = run_tunnel_operator(context.clone()) => {
            error!("CRITICAL: CloudflareTunnel operator exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("CloudflareTunnel operator exited unexpectedly without error")
        }
        result = run_dnssync_operator(context.clone()) => {
            error!("CRITICAL: CloudflareDNSSync operator exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("CloudflareDNSSync operator exited unexpectedly without error")
        }
        result = run_accesspolicy_operator(context.clone()) => {
            error!("CRITICAL: CloudflareAccessPolicy operator exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("CloudflareAccessPolicy operator exited unexpectedly without error")
        }
        result = run_httproute_operator(context.clone()) => {
            error!("CRITICAL: HTTPRoute operator exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("HTTPRoute operator exited unexpectedly without error")
        }
    }
}

fn error_policy<K>(_obj: Arc<K>, error: &ReconcileError, _ctx: Arc<Context>) -> Action {
    warn!("Reconcile failed: {:?}", error);
    Action::requeue(Duration::from_secs(ERROR_REQUEUE_DURATION_SECS))
}

/// Run the `CloudflareTunnel` operator
async fn run_tunnel_operator(context: Arc<Context>) -> Result<()> {
    info!("Starting CloudflareTunnel operator");

    let client = context.client.clone();
    let api = Api::<CloudflareTunnel>::all(client.clone());
    let deployment_api = Api::<Deployment>::all(client.clone());
    let secret_api = Api::<Secret>::all(client.clone());
    let configmap_api = Api::<ConfigMap>::all(client.clone());
    let gateway_api = Api::<Gateway>::all(client.clone());

    // A gateway pointing its tunnel-ref at us affects connectedRouteCount
    let stores_for_gateways = context.stores.clone();
    let gateway_mapper = move |gateway: Gateway| {
        let mut keys = Vec::new();
        if let Some((namespace, name)) = cfgate::context::gateway_tunnel_ref(&gateway) {
            if stores_for_gateways.get_tunnel(&name, &namespace).is_some() {
                keys.push(ObjectRef::<CloudflareTunnel>::new(&name).within(&namespace));
            }
        }
        keys
    };

    Controller::new(api, semantic_watcher_config())
        .owns(deployment_api, default_watcher_config())
        .owns(secret_api, default_watcher_config())
        .owns(configmap_api, default_watcher_config())
        .watches(gateway_api, default_watcher_config(), gateway_mapper)
        .run(reconcile_tunnel_wrapper, error_policy, context)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Reconcile wrapper for `CloudflareTunnel`
async fn reconcile_tunnel_wrapper(
    tunnel: Arc<CloudflareTunnel>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let start = std::time::Instant::now();

    debug!(
        tunnel = %tunnel.name_any(),
        namespace = ?tunnel.namespace(),
        "Reconcile wrapper called for CloudflareTunnel"
    );

    let result = Box::pin(reconcile_tunnel(ctx.clone(), (*tunnel).clone())).await;
    let duration = start.elapsed();

    match result {
        Ok(()) => {
            info!("Successfully reconciled CloudflareTunnel: {}", tunnel.name_any());
            metrics::record_reconciliation_success(KIND_TUNNEL, duration);
            // External drift is re-detected at the steady requeue cadence
            Ok(Action::requeue(Duration::from_secs(REQUEUE_WHEN_READY_SECS)))
        }
        Err(e) => {
            error!("Failed to reconcile CloudflareTunnel: {:#}", e);
            metrics::record_reconciliation_error(KIND_TUNNEL, duration);
            metrics::record_error(KIND_TUNNEL, "reconcile_error");
            Err(e.into())
        }
    }
}

/// Run the `CloudflareDNSSync` operator
async fn run_dnssync_operator(context: Arc<Context>) -> Result<()> {
    info!("Starting CloudflareDNSSync operator");

    let client = context.client.clone();
    let api = Api::<CloudflareDNSSync>::all(client.clone());
    let tunnel_api = Api::<CloudflareTunnel>::all(client.clone());
    let gateway_api = Api::<Gateway>::all(client.clone());
    let route_api = Api::<HTTPRoute>::all(client.clone());

    // Tunnel changes (domain published, credentials rotated) re-enqueue
    // every sync bound to the tunnel
    let stores_for_tunnels = context.stores.clone();
    let tunnel_mapper = move |tunnel: CloudflareTunnel| {
        let namespace = tunnel.namespace().unwrap_or_default();
        stores_for_tunnels
            .dnssyncs_for_tunnel(&namespace, &tunnel.name_any())
            .into_iter()
            .map(|(name, namespace)| ObjectRef::<CloudflareDNSSync>::new(&name).within(&namespace))
            .collect::<Vec<_>>()
    };

    // Gateway annotation changes re-enqueue the syncs of the bound tunnel
    let stores_for_gateways = context.stores.clone();
    let gateway_mapper = move |gateway: Gateway| {
        stores_for_gateways
            .dnssyncs_for_gateway(&gateway)
            .into_iter()
            .map(|(name, namespace)| ObjectRef::<CloudflareDNSSync>::new(&name).within(&namespace))
            .collect::<Vec<_>>()
    };

    // Route changes re-enqueue through the parent gateways' tunnels;
    // over-enqueueing is fine, reconciliation is idempotent
    let stores_for_routes = context.stores.clone();
    let route_mapper = move |route: HTTPRoute| {
        let route_namespace = route.namespace().unwrap_or_default();
        let mut keys = Vec::new();
        for parent in route.spec.parent_refs.as_deref().unwrap_or_default() {
            if !parent.is_gateway() {
                continue;
            }
            let gateway_namespace = parent.namespace.as_deref().unwrap_or(&route_namespace);
            if let Some(gateway) = stores_for_routes.get_gateway(&parent.name, gateway_namespace)
            {
                for (name, namespace) in stores_for_routes.dnssyncs_for_gateway(&gateway) {
                    keys.push(ObjectRef::<CloudflareDNSSync>::new(&name).within(&namespace));
                }
            }
        }
        keys
    };

    Controller::new(api, semantic_watcher_config())
        .watches(tunnel_api, default_watcher_config(), tunnel_mapper)
        .watches(gateway_api, default_watcher_config(), gateway_mapper)
        .watches(route_api, semantic_watcher_config(), route_mapper)
        .run(reconcile_dnssync_wrapper, error_policy, context)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Reconcile wrapper for `CloudflareDNSSync`
async fn reconcile_dnssync_wrapper(
    sync: Arc<CloudflareDNSSync>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let start = std::time::Instant::now();

    debug!(
        sync = %sync.name_any(),
        namespace = ?sync.namespace(),
        "Reconcile wrapper called for CloudflareDNSSync"
    );

    let result = Box::pin(reconcile_dnssync(ctx.clone(), (*sync).clone())).await;
    let duration = start.elapsed();

    match result {
        Ok(()) => {
            info!("Successfully reconciled CloudflareDNSSync: {}", sync.name_any());
            metrics::record_reconciliation_success(KIND_DNS_SYNC, duration);
            Ok(Action::requeue(Duration::from_secs(REQUEUE_WHEN_READY_SECS)))
        }
        Err(e) => {
            error!("Failed to reconcile CloudflareDNSSync: {:#}", e);
            metrics::record_reconciliation_error(KIND_DNS_SYNC, duration);
            metrics::record_error(KIND_DNS_SYNC, "reconcile_error");
            Err(e.into())
        }
    }
}

/// Run the `CloudflareAccessPolicy` operator
async fn run_accesspolicy_operator(context: Arc<Context>) -> Result<()> {
    info!("Starting CloudflareAccessPolicy operator");

    let client = context.client.clone();
    let api = Api::<CloudflareAccessPolicy>::all(client.clone());
    let route_api = Api::<HTTPRoute>::all(client.clone());
    let gateway_api = Api::<Gateway>::all(client.clone());
    let grant_api = Api::<ReferenceGrant>::all(client.clone());

    let stores_for_routes = context.stores.clone();
    let route_mapper = move |route: HTTPRoute| {
        let namespace = route.namespace().unwrap_or_default();
        let mut keys: Vec<_> = stores_for_routes
            .policies_targeting(TargetKind::HTTPRoute, &namespace, &route.name_any())
            .into_iter()
            .map(|(name, namespace)| {
                ObjectRef::<CloudflareAccessPolicy>::new(&name).within(&namespace)
            })
            .collect();
        // The access-policy annotation attaches without a targetRef
        if let Some(policy_name) = route
            .annotations()
            .get(cfgate::labels::ANNOTATION_ACCESS_POLICY)
        {
            keys.push(ObjectRef::<CloudflareAccessPolicy>::new(policy_name).within(&namespace));
        }
        keys
    };

    let stores_for_gateways = context.stores.clone();
    let gateway_mapper = move |gateway: Gateway| {
        let namespace = gateway.namespace().unwrap_or_default();
        stores_for_gateways
            .policies_targeting(TargetKind::Gateway, &namespace, &gateway.name_any())
            .into_iter()
            .map(|(name, namespace)| {
                ObjectRef::<CloudflareAccessPolicy>::new(&name).within(&namespace)
            })
            .collect::<Vec<_>>()
    };

    // A grant change may unblock any policy in the namespaces it names
    let stores_for_grants = context.stores.clone();
    let grant_mapper = move |grant: ReferenceGrant| {
        let mut keys = Vec::new();
        for from in &grant.spec.from {
            for policy in stores_for_grants.access_policies.state() {
                if policy.namespace().as_deref() == Some(from.namespace.as_str()) {
                    keys.push(
                        ObjectRef::<CloudflareAccessPolicy>::new(&policy.name_any())
                            .within(&from.namespace),
                    );
                }
            }
        }
        keys
    };

    Controller::new(api, semantic_watcher_config())
        .watches(route_api, semantic_watcher_config(), route_mapper)
        .watches(gateway_api, default_watcher_config(), gateway_mapper)
        .watches(grant_api, default_watcher_config(), grant_mapper)
        .run(reconcile_accesspolicy_wrapper, error_policy, context)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Reconcile wrapper for `CloudflareAccessPolicy`
async fn reconcile_accesspolicy_wrapper(
    policy: Arc<CloudflareAccessPolicy>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let start = std::time::Instant::now();

    debug!(
        policy = %policy.name_any(),
        namespace = ?policy.namespace(),
        "Reconcile wrapper called for CloudflareAccessPolicy"
    );

    let result = Box::pin(reconcile_accesspolicy(ctx.clone(), (*policy).clone())).await;
    let duration = start.elapsed();

    match result {
        Ok(()) => {
            info!(
                "Successfully reconciled CloudflareAccessPolicy: {}",
                policy.name_any()
            );
            metrics::record_reconciliation_success(KIND_ACCESS_POLICY, duration);
            Ok(Action::requeue(Duration::from_secs(REQUEUE_WHEN_READY_SECS)))
        }
        Err(e) => {
            error!("Failed to reconcile CloudflareAccessPolicy: {:#}", e);
            metrics::record_reconciliation_error(KIND_ACCESS_POLICY, duration);
            metrics::record_error(KIND_ACCESS_POLICY, "reconcile_error");
            Err(e.into())
        }
    }
}

/// Run the `HTTPRoute` operator
async fn run_httproute_operator(context: Arc<Context>) -> Result<()> {
    info!("Starting HTTPRoute operator");

    let client = context.client.clone();
    let api = Api::<HTTPRoute>::all(client.clone());
    let gateway_api = Api::<Gateway>::all(client.clone());

    // Gateway changes re-validate every route attached to the gateway
    let stores_for_gateways = context.stores.clone();
    let gateway_mapper = move |gateway: Gateway| {
        let namespace = gateway.namespace().unwrap_or_default();
        stores_for_gateways
            .routes_for_gateway(&namespace, &gateway.name_any())
            .iter()
            .map(|route| {
                ObjectRef::<HTTPRoute>::new(&route.name_any())
                    .within(&route.namespace().unwrap_or_default())
            })
            .collect::<Vec<_>>()
    };

    Controller::new(api, semantic_watcher_config())
        .watches(gateway_api, default_watcher_config(), gateway_mapper)
        .run(reconcile_httproute_wrapper, error_policy, context)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Reconcile wrapper for `HTTPRoute`
async fn reconcile_httproute_wrapper(
    route: Arc<HTTPRoute>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let start = std::time::Instant::now();

    let result = Box::pin(reconcile_httproute(ctx.clone(), (*route).clone())).await;
    let duration = start.elapsed();

    match result {
        Ok(()) => {
            metrics::record_reconciliation_success(KIND_HTTP_ROUTE, duration);
            Ok(Action::requeue(Duration::from_secs(REQUEUE_WHEN_READY_SECS)))
        }
        Err(e) => {
            error!("Failed to reconcile HTTPRoute: {:#}", e);
            metrics::record_reconciliation_error(KIND_HTTP_ROUTE, duration);
            metrics::record_error(KIND_HTTP_ROUTE, "reconcile_error");
            Err(e.into())
        }
    }
}
