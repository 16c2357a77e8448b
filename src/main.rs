//! Pipeline entrypoint: builds the [`AppContext`], spawns one Consumer
//! Worker per input topic plus a storage-routing worker, starts the HTTP
//! surface, and waits for a termination signal.

use std::net::SocketAddr;

use tracing::{error, info, warn};

#[cfg(feature = "kafka")]
use warehouse_pipeline::bus::Topics;
#[cfg(feature = "kafka")]
use warehouse_pipeline::consumer::{
    ConsumerConfig, PipelineProcessor, RedpandaConsumer, StorageRoutingProcessor,
};
use warehouse_pipeline::config::Config;
use warehouse_pipeline::context::AppContext;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(config.log_level.clone()))
        .init();

    let ctx = AppContext::build(config)?;

    #[cfg(feature = "kafka")]
    {
        let producer = ctx.bus.producer()?;

        for topic in Topics::input_topics() {
            let consumer_config = ConsumerConfig::builder()
                .brokers(ctx.config.kafka_brokers.clone())
                .group_id(ctx.config.consumer_group.clone())
                .topics(vec![topic.to_string()])
                .build();
            let processor = PipelineProcessor::new(
                ctx.pipeline.clone(),
                ctx.bus.clone(),
                producer.clone(),
                topic,
            );
            #[cfg(feature = "metrics")]
            let processor = processor.with_metrics(ctx.metrics.clone());
            let consumer = RedpandaConsumer::new(consumer_config, processor).await?;
            tokio::spawn(async move {
                if let Err(e) = consumer.run().await {
                    error!(topic, %e, "pipeline consumer exited");
                }
            });
        }
        #[cfg(feature = "metrics")]
        ctx.metrics.set_active_consumers("pipeline", Topics::input_topics().len() as i64);

        let storage_config = ConsumerConfig::builder()
            .brokers(ctx.config.kafka_brokers.clone())
            .group_id(format!("{}-storage", ctx.config.consumer_group))
            .topics(Topics::storage_input_topics().iter().map(|s| s.to_string()).collect())
            .build();
        let storage_processor = StorageRoutingProcessor::new(ctx.storage.clone());
        let storage_consumer = RedpandaConsumer::new(storage_config, storage_processor).await?;
        #[cfg(feature = "metrics")]
        ctx.metrics.set_active_consumers("storage", 1);
        tokio::spawn(async move {
            if let Err(e) = storage_consumer.run().await {
                error!(%e, "storage routing consumer exited");
            }
        });

        let aggregate_producer = ctx.bus.producer()?;
        warehouse_pipeline::consumer::spawn_aggregate_reporter(
            ctx.pipeline.clone(),
            ctx.bus.clone(),
            aggregate_producer,
            std::time::Duration::from_secs(ctx.config.aggregation_emit_interval_secs),
        );

        info!("consumer workers started, brokers={}", ctx.config.kafka_brokers);
    }
    #[cfg(not(feature = "kafka"))]
    warn!("kafka feature disabled, no consumer workers started");

    #[cfg(feature = "service")]
    {
        let addr: SocketAddr = ([0, 0, 0, 0], ctx.config.metrics_port).into();
        let service_ctx = ctx.clone();
        tokio::spawn(async move {
            if let Err(e) = warehouse_pipeline::service::AppService::new(service_ctx).serve(addr).await {
                error!(%e, "HTTP service exited");
            }
        });
        info!("HTTP service listening on {}", addr);
    }

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    Ok(())
}
