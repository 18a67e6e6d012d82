//! Wraps a small quote service with every built-in behavior.
//!
//! Run with `RUST_LOG=interpose=trace cargo run --example quote_service` to
//! watch cache hits and lock activity.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use interpose::{
    call_args, BehaviorError, Binding, ExpirationSpec, ExpiringCache, IgnoreRule,
    InterposeConfig, KeyedLock, Memoize, MethodIdentity, Pipeline, PipelineBuilder,
};

#[derive(Debug, Error)]
enum QuoteError {
    #[error("unknown symbol {0}")]
    UnknownSymbol(String),
    #[error(transparent)]
    Behavior(#[from] BehaviorError),
}

#[async_trait]
trait Quotes: Send + Sync {
    fn quote(&self, symbol: &str) -> Result<f64, QuoteError>;
    fn company(&self, symbol: &str) -> Result<String, QuoteError>;
    async fn publish(&self, symbol: &str, price: f64) -> Result<(), QuoteError>;
}

struct Desk;

#[async_trait]
impl Quotes for Desk {
    fn quote(&self, symbol: &str) -> Result<f64, QuoteError> {
        tracing::info!(symbol, "Pricing");
        match symbol {
            "AAPL" => Ok(190.5),
            "MSFT" => Ok(410.25),
            other => Err(QuoteError::UnknownSymbol(other.to_string())),
        }
    }

    fn company(&self, symbol: &str) -> Result<String, QuoteError> {
        tracing::info!(symbol, "Looking up company");
        Ok(format!("{symbol} Inc."))
    }

    async fn publish(&self, symbol: &str, price: f64) -> Result<(), QuoteError> {
        tracing::info!(symbol, price, "Publishing");
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(())
    }
}

const QUOTE: MethodIdentity = MethodIdentity::sync("quote");
const COMPANY: MethodIdentity = MethodIdentity::sync("company");
const PUBLISH: MethodIdentity = MethodIdentity::asynchronous("publish");

struct InterceptedDesk {
    pipeline: Pipeline<Desk, QuoteError>,
}

#[async_trait]
impl Quotes for InterceptedDesk {
    fn quote(&self, symbol: &str) -> Result<f64, QuoteError> {
        self.pipeline
            .call(QUOTE, call_args!(symbol), |desk| desk.quote(symbol))
    }

    fn company(&self, symbol: &str) -> Result<String, QuoteError> {
        self.pipeline
            .call(COMPANY, call_args!(symbol), |desk| desk.company(symbol))
    }

    async fn publish(&self, symbol: &str, price: f64) -> Result<(), QuoteError> {
        self.pipeline
            .call_async(PUBLISH, call_args!(symbol, price), |desk| {
                desk.publish(symbol, price)
            })
            .await
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quote_service=info,interpose=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = InterposeConfig::from_env()?;

    let pipeline = PipelineBuilder::new(Desk)
        .methods(&[QUOTE, COMPANY, PUBLISH])
        .bind(Binding::class(Arc::new(Memoize::new())).named("memo"))
        .bind(
            Binding::method(QUOTE, Arc::new(ExpiringCache::from_config(&config)))
                .with_expiration(ExpirationSpec::sliding(Duration::from_secs(5))),
        )
        .bind(Binding::method(PUBLISH, Arc::new(KeyedLock::new())))
        .ignore(QUOTE, IgnoreRule::named("memo"))
        .ignore(PUBLISH, IgnoreRule::behavior::<Memoize>())
        .build()?;
    let desk = Arc::new(InterceptedDesk { pipeline });

    for _ in 0..3 {
        tracing::info!(price = desk.quote("AAPL")?, "Quote");
        tracing::info!(company = %desk.company("AAPL")?, "Company");
    }

    if let Err(err) = desk.quote("ZZZZ") {
        tracing::warn!(error = %err, "Quote failed");
    }

    let publishers: Vec<_> = ["AAPL", "MSFT"]
        .into_iter()
        .map(|symbol| {
            let desk = Arc::clone(&desk);
            tokio::spawn(async move {
                let price = desk.quote(symbol)?;
                desk.publish(symbol, price).await
            })
        })
        .collect();
    for publisher in publishers {
        publisher.await??;
    }

    Ok(())
}
