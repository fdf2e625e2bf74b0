use std::sync::Arc;

use arb_observer::{AppConfig, Application, Opportunity};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env()?;
    info!(
        venues = ?config.exchanges_to_monitor,
        check_interval_seconds = config.check_interval_seconds,
        min_profit_percent = config.min_profit_percent,
        "starting arbitrage observer"
    );

    let app = Arc::new(Application::new(
        config,
        Arc::new(|opportunities: Vec<Opportunity>| {
            for opp in opportunities {
                info!(
                    symbol = %opp.symbol,
                    buy_venue = %opp.buy_venue,
                    buy_price = opp.buy_price,
                    sell_venue = %opp.sell_venue,
                    sell_price = opp.sell_price,
                    profit_percent = opp.profit_percent,
                    "arbitrage_opportunity"
                );
            }
        }),
    )?);

    app.start().await;

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    app.stop().await;

    Ok(())
}
