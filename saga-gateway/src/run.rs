use std::sync::Arc;

use rdkafka::consumer::StreamConsumer;
use rdkafka::producer::FutureProducer;
use rdkafka::ClientConfig;
use saga_bus::{BusError, InMemoryBus, KafkaBusConsumer, KafkaBusProducer};
use saga_core::clock::SystemClock;
use saga_core::Clock;
use saga_facade::SagaFacade;
use saga_live::LiveStatusBus;
use saga_outbox::OutboxStore;
use saga_outbox_publisher::OutboxPublisher;
use saga_payments::{HttpProviderAdapter, IdempotencyStore, PaymentStateMachine, PaymentStore, ProviderAdapter, StubProviderAdapter};
use saga_projector::SagaEventProjector;
use saga_runtime::notify_once::NotifyOnce;
use saga_runtime::task::{try_join_tasks_and_shutdown, Task};
use saga_status::SagaStatusStore;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::mpsc;
use tracing::info;

use crate::cli::RunArgs;
use crate::config::GatewayConfig;
use crate::state::AppState;

const SHUTDOWN_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

pub async fn run(args: RunArgs) -> anyhow::Result<()> {
    let config = GatewayConfig::from_env(args.bind_addr, args.database_url, args.bus_brokers);

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(&config.database_url)
        .await?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let outbox = OutboxStore::new(pool.clone());
    let status_store = SagaStatusStore::new(pool.clone());
    let live_bus = Arc::new(LiveStatusBus::new(clock.clone(), config.live.clone()));
    let facade = Arc::new(SagaFacade::new(
        pool.clone(),
        status_store.clone(),
        live_bus.clone(),
        outbox.clone(),
    ));

    let provider: Arc<dyn ProviderAdapter> = build_provider(&config);
    let machine = Arc::new(PaymentStateMachine::new(
        PaymentStore::new(pool.clone()),
        outbox.clone(),
        provider,
    ));
    let idempotency = Arc::new(IdempotencyStore::new(pool.clone()));

    let state = AppState {
        facade,
        machine,
        idempotency,
        status_store: status_store.clone(),
        live_bus: live_bus.clone(),
        webhook_secret: Arc::from(config.webhook_secret.as_str()),
    };

    let mut shutdown = NotifyOnce::new();
    let mut static_tasks = vec![live_bus.clone().spawn_eviction_task(shutdown.clone())];

    if args.in_memory_bus {
        info!("wiring saga-gateway against the in-memory bus (not for production)");
        let bus = Arc::new(InMemoryBus::new());
        static_tasks.push(spawn_publisher(bus.clone(), outbox.clone(), clock.clone(), &config, shutdown.clone()));
        static_tasks.push(spawn_projector_in_memory(
            bus,
            &config,
            status_store,
            live_bus,
            shutdown.clone(),
        ));
    } else {
        let producer = build_kafka_producer(&config.bus_brokers)?;
        static_tasks.push(spawn_publisher(
            Arc::new(KafkaBusProducer::new(producer)),
            outbox.clone(),
            clock.clone(),
            &config,
            shutdown.clone(),
        ));
        static_tasks.push(spawn_projector_kafka(&config, status_store, live_bus, shutdown.clone()));
    }

    let (_eph_tasks_tx, eph_tasks_rx) = mpsc::channel::<Task<()>>(16);

    let router = crate::server::build(state);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(bind_addr = %config.bind_addr, "saga-gateway listening");

    let mut http_shutdown = shutdown.clone();
    let http_task = Task::spawn("http-server", async move {
        let serve = axum::serve(listener, router).with_graceful_shutdown(async move {
            http_shutdown.recv().await;
        });
        if let Err(error) = serve.await {
            tracing::error!(%error, "http server exited with an error");
        }
    });
    static_tasks.push(http_task);

    let ctrlc_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("received shutdown signal");
        ctrlc_shutdown.send();
    });

    try_join_tasks_and_shutdown(static_tasks, eph_tasks_rx, shutdown, SHUTDOWN_TIMEOUT)
        .await
        .map_err(|error| anyhow::anyhow!("gateway task supervision error: {error}"))
}

fn build_provider(config: &GatewayConfig) -> Arc<dyn ProviderAdapter> {
    match std::env::var("PROVIDER_BASE_URL") {
        Ok(base_url) => Arc::new(HttpProviderAdapter::new(base_url, config.provider_read_timeout)),
        Err(_) => Arc::new(StubProviderAdapter),
    }
}

fn build_kafka_producer(brokers: &str) -> anyhow::Result<FutureProducer> {
    Ok(ClientConfig::new()
        .set("bootstrap.servers", brokers)
        .set("enable.idempotence", "true")
        .create()?)
}

fn build_kafka_consumer(brokers: &str, group_id: &str) -> anyhow::Result<StreamConsumer> {
    Ok(ClientConfig::new()
        .set("bootstrap.servers", brokers)
        .set("group.id", group_id)
        .set("enable.auto.commit", "false")
        .create()?)
}

fn spawn_publisher<P>(
    producer: Arc<P>,
    outbox: OutboxStore,
    clock: Arc<dyn Clock>,
    config: &GatewayConfig,
    shutdown: NotifyOnce,
) -> Task<()>
where
    P: saga_bus::BusProducer + 'static,
{
    OutboxPublisher::new(outbox, producer, config.outbox.clone(), clock).spawn(shutdown)
}

fn spawn_projector_kafka(
    config: &GatewayConfig,
    status_store: SagaStatusStore,
    live_bus: Arc<LiveStatusBus>,
    shutdown: NotifyOnce,
) -> Task<()> {
    let brokers = config.bus_brokers.clone();
    let group_id = config.bus_group_id.clone();
    let topic = config.outbox.events_topic.clone();
    let projector = Arc::new(SagaEventProjector::new(status_store, live_bus));
    projector.spawn(
        move || {
            let brokers = brokers.clone();
            let group_id = group_id.clone();
            let topic = topic.clone();
            async move {
                let consumer = build_kafka_consumer(&brokers, &group_id)
                    .map_err(BusError::Transport)?;
                rdkafka::consumer::Consumer::subscribe(&consumer, &[topic.as_str()])
                    .map_err(|error| BusError::Transport(anyhow::anyhow!(error)))?;
                Ok(KafkaBusConsumer::new(consumer))
            }
        },
        shutdown,
    )
}

fn spawn_projector_in_memory(
    bus: Arc<InMemoryBus>,
    config: &GatewayConfig,
    status_store: SagaStatusStore,
    live_bus: Arc<LiveStatusBus>,
    shutdown: NotifyOnce,
) -> Task<()> {
    let topic = config.outbox.events_topic.clone();
    let projector = Arc::new(SagaEventProjector::new(status_store, live_bus));
    projector.spawn(
        move || {
            let bus = bus.clone();
            let topic = topic.clone();
            async move { Ok(bus.subscribe(&topic)) }
        },
        shutdown,
    )
}
