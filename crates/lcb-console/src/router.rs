use std::{future::Future, sync::Arc};

use anyhow::Context;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt},
    task::JoinHandle,
};

use lcb_core::{config::Config, enrich::LinkEnricher, messaging::types::IncomingMessage};

/// Nick used for lines that do not name a speaker.
pub const DEFAULT_NICK: &str = "console";

/// Split a console line into `(nick, text)`.
///
/// Accepts `<nick> text` (IRC log style) and `nick: text`; anything else is
/// attributed to [`DEFAULT_NICK`]. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    if let Some(rest) = line.strip_prefix('<') {
        if let Some((nick, text)) = rest.split_once('>') {
            let nick = nick.trim();
            if is_nick(nick) {
                return Some((nick.to_string(), text.trim().to_string()));
            }
        }
    }

    if let Some((nick, text)) = line.split_once(": ") {
        if is_nick(nick) {
            return Some((nick.to_string(), text.trim().to_string()));
        }
    }

    Some((DEFAULT_NICK.to_string(), line.to_string()))
}

fn is_nick(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= 32
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_[]\\^{}|`".contains(c))
}

/// Feed every input line into the pipeline until EOF or Ctrl-C.
///
/// At EOF pending title fetches are awaited so piped input still gets its
/// titles; on Ctrl-C they are abandoned. A registry failure stops the loop.
pub async fn run<R>(cfg: Arc<Config>, enricher: Arc<LinkEnricher>, input: R) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };
    run_until(cfg, enricher, input, ctrl_c).await
}

/// [`run`] with the stop signal supplied by the caller.
pub async fn run_until<R, S>(
    cfg: Arc<Config>,
    enricher: Arc<LinkEnricher>,
    input: R,
    shutdown: S,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    S: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut lines = input.lines();
    let mut pending: Vec<JoinHandle<Option<String>>> = Vec::new();

    tracing::info!(server = %cfg.server, channel = %cfg.channel, "reading chat lines from stdin");

    loop {
        let line = tokio::select! {
            biased;
            _ = &mut shutdown => {
                tracing::info!(in_flight = pending.len(), "interrupted; abandoning in-flight fetches");
                return Ok(());
            }
            line = lines.next_line() => line.context("reading input")?,
        };
        let Some(line) = line else {
            break;
        };
        let Some((nick, text)) = parse_line(&line) else {
            continue;
        };

        let msg = IncomingMessage::new(text, nick, cfg.channel.clone(), cfg.server.clone());
        let handle = enricher
            .on_message(&msg)
            .await
            .context("link registry unavailable")?;

        pending.retain(|h| !h.is_finished());
        pending.extend(handle);
    }

    for handle in pending {
        if let Err(e) = handle.await {
            tracing::warn!(error = %e, "title task failed");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use lcb_core::{
        fetch::{FetchLimits, HttpResponse, HttpTransport, TitleFetcher},
        registry::{InMemoryRegistry, LinkRegistry},
        Error, Result,
    };

    use tokio::io::AsyncWriteExt;

    use crate::ConsoleMessenger;

    #[test]
    fn parses_log_style_and_colon_style_lines() {
        assert_eq!(
            parse_line("<alice> check http://a/ out"),
            Some(("alice".to_string(), "check http://a/ out".to_string()))
        );
        assert_eq!(
            parse_line("bob: hi there"),
            Some(("bob".to_string(), "hi there".to_string()))
        );
    }

    #[test]
    fn unattributed_and_blank_lines() {
        assert_eq!(
            parse_line("see https://x.example/: neat"),
            Some((DEFAULT_NICK.to_string(), "see https://x.example/: neat".to_string()))
        );
        assert_eq!(parse_line("   "), None);
    }

    struct Offline;

    #[async_trait::async_trait]
    impl HttpTransport for Offline {
        async fn get(
            &self,
            url: &str,
            _headers: &[(&str, String)],
        ) -> Result<Box<dyn HttpResponse>> {
            Err(Error::Transport(format!("offline: {url}")))
        }
    }

    #[tokio::test]
    async fn run_feeds_every_line_and_stops_at_eof() {
        let cfg = Arc::new(Config::from_lookup(|_| None).unwrap());
        let registry = Arc::new(InMemoryRegistry::new());
        let messenger = Arc::new(ConsoleMessenger::new(Vec::new(), 400));
        let enricher = Arc::new(LinkEnricher::new(
            registry.clone(),
            TitleFetcher::new(Arc::new(Offline), FetchLimits::default()),
            messenger.clone(),
        ));

        let input: &[u8] = b"<alice> look http://a.example/\n\nbob: no links\n<carol> http://a.example/\n";
        run(cfg, enricher, input).await.unwrap();

        let rec = registry.lookup("http://a.example/").await.unwrap().unwrap();
        assert_eq!(rec.count, 2);
        assert_eq!(rec.first_nick, "alice");
        assert_eq!(rec.channel, "#links");
    }

    #[tokio::test]
    async fn shutdown_stops_a_loop_whose_input_stays_open() {
        let cfg = Arc::new(Config::from_lookup(|_| None).unwrap());
        let registry = Arc::new(InMemoryRegistry::new());
        let enricher = Arc::new(LinkEnricher::new(
            registry.clone(),
            TitleFetcher::new(Arc::new(Offline), FetchLimits::default()),
            Arc::new(ConsoleMessenger::new(Vec::new(), 400)),
        ));

        // The writer half is kept alive, so the reader never sees EOF.
        let (mut writer, reader) = tokio::io::duplex(256);
        writer.write_all(b"<alice> http://a.example/\n").await.unwrap();

        let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
        let shutdown = async move {
            let _ = stopped.await;
        };
        let looping = tokio::spawn(run_until(
            cfg,
            enricher,
            tokio::io::BufReader::new(reader),
            shutdown,
        ));

        for _ in 0..100 {
            if !registry.is_empty().await {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert_eq!(registry.len().await, 1);

        stop.send(()).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(5), looping)
            .await
            .expect("loop stops once shutdown fires")
            .unwrap()
            .unwrap();
        drop(writer);
    }
}
