//! End-to-end behavior of a capability trait wrapped in a pipeline.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use interpose::{
    call_args, BehaviorError, Binding, ExpirationSpec, ExpiringCache, ExpiringCacheSettings,
    IgnoreRule, KeyedLock, Memoize, MethodIdentity, Pipeline, PipelineBuilder,
};

#[derive(Debug, Error)]
enum QuoteError {
    #[error("unknown symbol {0}")]
    UnknownSymbol(String),
    #[error(transparent)]
    Behavior(#[from] BehaviorError),
}

#[async_trait]
trait QuoteSource: Send + Sync {
    fn price(&self, symbol: &str) -> Result<u64, QuoteError>;
    fn history(&self, symbol: &str, days: u32) -> Result<Vec<u64>, QuoteError>;
    async fn refresh(&self, symbol: &str) -> Result<usize, QuoteError>;
}

#[derive(Default)]
struct Exchange {
    lookups: AtomicUsize,
    refreshes: AtomicUsize,
    refreshing: AtomicUsize,
    peak_refreshing: AtomicUsize,
}

impl Exchange {
    fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuoteSource for Exchange {
    fn price(&self, symbol: &str) -> Result<u64, QuoteError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        match symbol {
            "AAPL" => Ok(190),
            "MSFT" => Ok(410),
            other => Err(QuoteError::UnknownSymbol(other.to_string())),
        }
    }

    fn history(&self, symbol: &str, days: u32) -> Result<Vec<u64>, QuoteError> {
        let price = self.price(symbol)?;
        Ok((0..u64::from(days)).map(|day| price - day).collect())
    }

    async fn refresh(&self, _symbol: &str) -> Result<usize, QuoteError> {
        let now = self.refreshing.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_refreshing.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.refreshing.fetch_sub(1, Ordering::SeqCst);
        Ok(self.refreshes.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

const PRICE: MethodIdentity = MethodIdentity::sync("price");
const HISTORY: MethodIdentity = MethodIdentity::sync("history");
const REFRESH: MethodIdentity = MethodIdentity::asynchronous("refresh");

struct InterceptedQuotes {
    pipeline: Pipeline<Exchange, QuoteError>,
}

impl InterceptedQuotes {
    fn new(lock: Arc<KeyedLock>, history_ttl: ExpirationSpec) -> Result<Self, BehaviorError> {
        let pipeline = PipelineBuilder::new(Exchange::default())
            .methods(&[PRICE, HISTORY, REFRESH])
            .bind(Binding::class(Arc::new(Memoize::new())).named("memo"))
            .bind(Binding::method(HISTORY, Arc::new(history_cache())).with_expiration(history_ttl))
            .bind(Binding::method(REFRESH, lock))
            .ignore(HISTORY, IgnoreRule::named("memo"))
            .ignore(REFRESH, IgnoreRule::behavior::<Memoize>())
            .build()?;
        Ok(Self { pipeline })
    }

    fn exchange(&self) -> &Exchange {
        self.pipeline.target()
    }
}

fn history_cache() -> ExpiringCache {
    ExpiringCache::new(NonZeroUsize::new(32).unwrap())
}

#[async_trait]
impl QuoteSource for InterceptedQuotes {
    fn price(&self, symbol: &str) -> Result<u64, QuoteError> {
        self.pipeline
            .call(PRICE, call_args!(symbol), |exchange| exchange.price(symbol))
    }

    fn history(&self, symbol: &str, days: u32) -> Result<Vec<u64>, QuoteError> {
        self.pipeline.call(HISTORY, call_args!(symbol, days), |exchange| {
            exchange.history(symbol, days)
        })
    }

    async fn refresh(&self, symbol: &str) -> Result<usize, QuoteError> {
        self.pipeline
            .call_async(REFRESH, call_args!(symbol), |exchange| exchange.refresh(symbol))
            .await
    }
}

fn quotes() -> InterceptedQuotes {
    InterceptedQuotes::new(
        Arc::new(KeyedLock::new()),
        ExpirationSpec::absolute(Duration::from_secs(30)),
    )
    .unwrap()
}

#[test]
fn test_wrapper_is_transparent() {
    let quotes = quotes();
    let bare = Exchange::default();

    assert_eq!(quotes.price("AAPL").unwrap(), bare.price("AAPL").unwrap());
    assert_eq!(
        quotes.history("MSFT", 3).unwrap(),
        bare.history("MSFT", 3).unwrap()
    );
}

#[test]
fn test_memoized_price_hits_exchange_once_per_symbol() {
    let quotes = quotes();

    for _ in 0..3 {
        assert_eq!(quotes.price("AAPL").unwrap(), 190);
    }
    assert_eq!(quotes.exchange().lookups(), 1);

    assert_eq!(quotes.price("MSFT").unwrap(), 410);
    assert_eq!(quotes.exchange().lookups(), 2);
}

#[test]
fn test_failure_reaches_caller_unwrapped_and_uncached() {
    let quotes = quotes();

    for _ in 0..2 {
        let err = quotes.price("NOPE").unwrap_err();
        assert!(matches!(err, QuoteError::UnknownSymbol(ref symbol) if symbol == "NOPE"));
    }
    assert_eq!(quotes.exchange().lookups(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_history_expires_while_price_stays_memoized() {
    let quotes = quotes();

    quotes.history("AAPL", 5).unwrap();
    quotes.history("AAPL", 5).unwrap();
    // The class-level memo is ignored on history, so only the expiring
    // cache stands in front of it.
    assert_eq!(quotes.exchange().lookups(), 1);

    tokio::time::advance(Duration::from_secs(31)).await;
    quotes.history("AAPL", 5).unwrap();
    assert_eq!(quotes.exchange().lookups(), 2);

    quotes.price("AAPL").unwrap();
    tokio::time::advance(Duration::from_secs(3600)).await;
    quotes.price("AAPL").unwrap();
    assert_eq!(quotes.exchange().lookups(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_refreshes_are_serialized_and_release_the_lock() {
    let lock = Arc::new(KeyedLock::new());
    let quotes = Arc::new(
        InterceptedQuotes::new(
            Arc::clone(&lock),
            ExpirationSpec::absolute(Duration::from_secs(30)),
        )
        .unwrap(),
    );

    let tasks: Vec<_> = ["AAPL", "MSFT", "AAPL", "GOOG"]
        .into_iter()
        .map(|symbol| {
            let quotes = Arc::clone(&quotes);
            tokio::spawn(async move { quotes.refresh(symbol).await })
        })
        .collect();

    let mut counts = Vec::new();
    for task in tasks {
        counts.push(task.await.unwrap().unwrap());
    }
    counts.sort_unstable();

    // Refresh bypasses memoization and runs once per call, one at a time.
    assert_eq!(counts, [1, 2, 3, 4]);
    assert_eq!(quotes.exchange().peak_refreshing.load(Ordering::SeqCst), 1);
    assert_eq!(lock.active_slots(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_policy_fails_on_first_cached_call() {
    let settings: ExpiringCacheSettings =
        serde_json::from_str(r#"{ "ttl": "30s", "policy": "hourly" }"#).unwrap();
    let pipeline: Pipeline<Exchange, QuoteError> = PipelineBuilder::new(Exchange::default())
        .methods(&[PRICE, HISTORY, REFRESH])
        .bind(
            Binding::method(HISTORY, Arc::new(history_cache()))
                .with_settings(settings)
                .unwrap(),
        )
        .build()
        .unwrap();

    let err = pipeline
        .call(HISTORY, call_args!("AAPL", 5), |exchange| {
            exchange.history("AAPL", 5)
        })
        .unwrap_err();
    assert!(matches!(
        err,
        QuoteError::Behavior(BehaviorError::InvalidConfiguration(_))
    ));
    assert_eq!(pipeline.target().lookups(), 0);
}

#[test]
fn test_class_level_lock_over_sync_methods_is_rejected() {
    let result = PipelineBuilder::<Exchange, QuoteError>::new(Exchange::default())
        .methods(&[PRICE, HISTORY, REFRESH])
        .bind(Binding::class(Arc::new(KeyedLock::new())))
        .build();

    assert!(matches!(
        result,
        Err(BehaviorError::UnsupportedOperationKind {
            behavior: "KeyedLock",
            method: "price",
        })
    ));
}
