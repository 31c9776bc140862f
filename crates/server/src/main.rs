//! Game engine entry point.

use std::sync::Arc;

use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use bus::{BusPublisher, EventPublisher, InMemoryMessageBus, MessageBus, PublisherConfig};
use event_store::{
    EventStore, InMemoryEventStore, InMemorySnapshotStore, PostgresEventStore,
    PostgresSnapshotStore, SnapshotStore,
};
use projections::{GameReadModel, Projection, ProjectionConsumer};
use server::{Config, GameService};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

#[tokio::main]
async fn main() {
    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    // 2. Expose Prometheus metrics
    let metrics_addr = ([0, 0, 0, 0], config.metrics_port);
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .expect("failed to install Prometheus recorder");

    // 3. Event and snapshot stores: Postgres when configured, otherwise
    //    in-memory for local play
    let (store, snapshots): (Arc<dyn EventStore>, Arc<dyn SnapshotStore>) =
        match &config.database_url {
            Some(url) => {
                let pool = sqlx::PgPool::connect(url)
                    .await
                    .expect("failed to connect to Postgres");
                let store = PostgresEventStore::new(pool.clone());
                store.run_migrations().await.expect("migrations failed");
                tracing::info!("using Postgres event store");
                (Arc::new(store), Arc::new(PostgresSnapshotStore::new(pool)))
            }
            None => {
                tracing::info!("DATABASE_URL not set, using in-memory event store");
                (
                    Arc::new(InMemoryEventStore::new()),
                    Arc::new(InMemorySnapshotStore::new()),
                )
            }
        };

    // 4. Message bus and publisher
    let message_bus = InMemoryMessageBus::new();
    let publisher: Arc<dyn EventPublisher> = Arc::new(BusPublisher::with_config(
        message_bus.clone(),
        config.topic_map(),
        PublisherConfig {
            max_attempts: config.publish_max_attempts,
            ..PublisherConfig::default()
        },
    ));

    // 5. Read model consumer
    let read_model = Arc::new(GameReadModel::new());
    let consumer = ProjectionConsumer::new(
        message_bus.subscribe(&config.party_topic()).await,
        vec![read_model.clone() as Arc<dyn Projection>],
    );
    let consumer_task = tokio::spawn(consumer.run());

    // 6. Command handlers
    let _game = GameService::new(store, snapshots, publisher, config.snapshot_threshold);

    tracing::info!(
        metrics_port = config.metrics_port,
        snapshot_threshold = config.snapshot_threshold,
        "game engine ready"
    );

    shutdown_signal().await;
    consumer_task.abort();
    tracing::info!("engine shut down gracefully");
}
