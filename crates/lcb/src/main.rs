use std::sync::Arc;

use lcb_console::{router, ConsoleMessenger};
use lcb_core::{
    config::Config,
    enrich::LinkEnricher,
    fetch::TitleFetcher,
    messaging::{
        port::MessagingPort,
        throttled::ThrottledMessenger,
    },
    registry::{InMemoryRegistry, LinkRegistry},
};
use lcb_http::ReqwestTransport;

#[tokio::main]
async fn main() -> Result<(), lcb_core::Error> {
    lcb_core::logging::init("lcb")?;

    let cfg = Arc::new(Config::load()?);

    let registry: Arc<dyn LinkRegistry> = match &cfg.registry_file {
        Some(path) => Arc::new(InMemoryRegistry::open(path).await?),
        None => Arc::new(InMemoryRegistry::new()),
    };

    let transport = Arc::new(ReqwestTransport::new(cfg.fetch_timeout, &cfg.user_agent)?);
    let fetcher = TitleFetcher::new(transport, cfg.fetch_limits());

    let raw_messenger: Arc<dyn MessagingPort> =
        Arc::new(ConsoleMessenger::new(tokio::io::stdout(), cfg.message_limit));
    let messenger: Arc<dyn MessagingPort> = if cfg.notify_interval.is_zero() {
        raw_messenger
    } else {
        Arc::new(ThrottledMessenger::new(raw_messenger, cfg.notify_interval))
    };

    let enricher = Arc::new(LinkEnricher::new(registry, fetcher, messenger));

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    router::run(cfg, enricher, stdin)
        .await
        .map_err(|e| lcb_core::Error::External(format!("link catcher failed: {e:#}")))?;

    Ok(())
}
