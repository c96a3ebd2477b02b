use chart_feed::{
    BackfillClient, BackfillRequest, ChartFeed, FeedConfig, IndicatorSeries, IndicatorSpec,
    StreamConnector, StreamPhase,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{error, info, warn};

const REPORT_INTERVAL: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    init_logging();

    let config = FeedConfig::from_env();
    info!(
        url = %config.connector.url,
        symbol = %config.symbol,
        retention = config.retention,
        interval_secs = config.interval_secs,
        "Starting feed monitor"
    );

    let connector = match StreamConnector::new(config.connector.clone()) {
        Ok(connector) => connector,
        Err(error) => {
            error!(%error, "Invalid connector configuration");
            return;
        }
    };

    let feed = Arc::new(Mutex::new(ChartFeed::new(&config)));
    if let Err(error) = add_default_overlays(&mut feed.lock()) {
        warn!(%error, "Failed to register default overlays");
    }

    if let Some(backfill_url) = &config.backfill_url {
        backfill(&feed, backfill_url, &config).await;
    }

    let sink = Arc::clone(&feed);
    let handle = connector.connect(
        move |message| sink.lock().apply(message),
        |state| match state.phase {
            StreamPhase::Open => info!("Stream open"),
            StreamPhase::Connecting => info!(retry_count = state.retry_count, "Stream connecting"),
            StreamPhase::Closed => warn!(retry_count = state.retry_count, "Stream closed"),
        },
    );

    let mut report = interval(REPORT_INTERVAL);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = report.tick() => log_snapshot(&mut feed.lock()),
            result = &mut shutdown => {
                if let Err(error) = result {
                    error!(%error, "Failed to listen for shutdown signal");
                }
                break;
            }
        }
    }

    handle.close();
    info!("Feed monitor stopped");
}

fn add_default_overlays(feed: &mut ChartFeed) -> Result<(), chart_feed::FeedError> {
    let registry = feed.registry_mut();
    registry.add(IndicatorSpec::sma("sma-20", 20))?;
    registry.add(IndicatorSpec::ema("ema-9", 9))?;
    registry.add(IndicatorSpec::bollinger("bb-20", 20, 2.0))?;
    Ok(())
}

async fn backfill(feed: &Mutex<ChartFeed>, url: &str, config: &FeedConfig) {
    let request = BackfillRequest::new(&config.symbol, config.interval_secs, config.retention);
    let result = match BackfillClient::new(url) {
        Ok(client) => client.fetch(&request).await,
        Err(error) => Err(error),
    };

    match result {
        Ok(candles) => {
            feed.lock().load_history(candles);
        }
        Err(error) => warn!(%error, "Backfill failed, starting from live data only"),
    }
}

fn log_snapshot(feed: &mut ChartFeed) {
    let Some(last) = feed.store().last().copied() else {
        info!("No candles yet");
        return;
    };

    info!(
        time = %last.opened_at().map(|t| t.to_rfc3339()).unwrap_or_default(),
        open = last.open,
        high = last.high,
        low = last.low,
        close = last.close,
        candles = feed.store().len(),
        "Latest candle"
    );

    for overlay in feed.overlays() {
        let label = overlay.spec.label();
        match &overlay.series {
            IndicatorSeries::Line(points) => match points.last() {
                Some(point) => info!(overlay = %label, value = point.value, "Overlay"),
                None => info!(overlay = %label, "Overlay warming up"),
            },
            IndicatorSeries::Bands(points) => match points.last() {
                Some(band) => info!(
                    overlay = %label,
                    upper = band.upper,
                    middle = band.middle,
                    lower = band.lower,
                    "Overlay"
                ),
                None => info!(overlay = %label, "Overlay warming up"),
            },
        }
    }

    info!(
        trades = feed.trades().len(),
        markers = feed.annotations().len(),
        "Trade markers"
    );
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
