//! Binary entry point: assembles an [`ember_bus::EventBus`] and an
//! [`ember_supervisor::Supervisor`] from [`ember::config::EmberConfig`] and
//! the collaborator seams in [`ember::collaborators`], then runs the FSM
//! to completion or `ctrl_c`.
//!
//! `demo` below wires in no-op stand-ins for the five collaborator traits
//! (C9) so this binary links and runs standalone; a real deployment swaps
//! `demo::*` for a concrete exchange/websocket/datasource/generator/
//! analytics implementation without touching anything above this module.

mod demo;

use ember::config::EmberConfig;
use ember_bus::EventBus;
use ember_instrument::Timeframe;
use ember_supervisor::Supervisor;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), ember::Error> {
    ember::logging::init();

    let config = EmberConfig::default();
    let bus = EventBus::handle(config.bus);

    let symbols = vec![demo::btcusdt()];
    let timeframes = vec![Timeframe::M1];

    let generator: Arc<AsyncMutex<Box<dyn ember::collaborators::StrategyGenerator>>> =
        Arc::new(AsyncMutex::new(Box::new(demo::NoopGenerator)));
    let analytics: Arc<dyn ember::collaborators::PerformanceAnalytics> = Arc::new(demo::NoopAnalytics);
    let datasource: Arc<dyn ember::collaborators::Datasource> = Arc::new(demo::NoopDatasource);
    let websocket: Arc<dyn ember::collaborators::WebsocketFeed> = Arc::new(demo::NoopWebsocket);
    let adapter: Arc<dyn ember::collaborators::ExchangeAdapter> = Arc::new(demo::NoopAdapter);

    let supervisor = Supervisor::new(
        symbols,
        timeframes,
        generator,
        analytics,
        datasource,
        websocket,
        adapter,
        bus,
        config.supervisor,
    );
    let handle = supervisor.handle();

    let run = tokio::spawn(supervisor.run());

    tokio::signal::ctrl_c().await.ok();
    info!("shutdown requested");
    handle.stop().await;
    let _ = run.await;

    Ok(())
}
