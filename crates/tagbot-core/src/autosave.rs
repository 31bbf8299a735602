//! Periodic background save of the registry snapshot.

use std::{sync::Arc, time::Duration};

use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::bot::TagBot;

pub struct Autosave {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Autosave {
    /// Save every `interval` until stopped. The first save happens one full
    /// interval after spawning.
    pub fn spawn(bot: Arc<TagBot>, interval: Duration) -> Self {
        let cancel = CancellationToken::new();
        let tok = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut tick = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(secs = interval.as_secs(), "Autosave started");
            loop {
                tokio::select! {
                  _ = tok.cancelled() => break,
                  _ = tick.tick() => {
                    debug!("Autosave tick");
                    bot.save().await;
                  }
                }
            }
            info!("Autosave stopped");
        });

        Self { cancel, handle }
    }

    #[cfg(test)]
    pub(crate) fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Cancel the loop and wait for it to exit. An in-flight save completes.
    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Config,
        domain::{ChatId, ChatKind, UserId},
        messaging::types::{Inbound, Sender},
        ports::{AdminDirectory, ChatAdmin},
        registry::Registry,
        snapshot::SnapshotStore,
        Result,
    };
    use async_trait::async_trait;
    use std::path::PathBuf;

    struct NoAdmins;

    #[async_trait]
    impl AdminDirectory for NoAdmins {
        async fn chat_admins(&self, _chat_id: ChatId) -> Result<Vec<ChatAdmin>> {
            Ok(Vec::new())
        }
    }

    fn tmp(prefix: &str) -> PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        PathBuf::from(format!("/tmp/{prefix}-{}-{ts}.json", std::process::id()))
    }

    #[tokio::test(start_paused = true)]
    async fn saves_on_each_tick_until_stopped() {
        let path = tmp("tagbot-autosave");
        let cfg = Config {
            data_file: path.clone(),
            ..Config::default()
        };
        let bot = Arc::new(TagBot::new(Arc::new(cfg), Arc::new(NoAdmins), Registry::new()));
        let autosave = Autosave::spawn(bot.clone(), Duration::from_secs(300));

        // A private message registers without going through the admin lookup,
        // and observe() itself saves on creation; remove that file first.
        bot.observe(&Inbound {
            chat_id: ChatId(1),
            chat_kind: ChatKind::Private,
            sender: Sender {
                user_id: UserId(1),
                username: Some("amy".to_string()),
                first_name: "Amy".to_string(),
                last_name: None,
            },
            text: "hi".to_string(),
        })
        .await;
        std::fs::remove_file(&path).unwrap();

        tokio::time::sleep(Duration::from_secs(299)).await;
        assert!(!path.exists());

        tokio::time::sleep(Duration::from_secs(2)).await;
        // The write itself runs on the blocking pool.
        for _ in 0..200 {
            if path.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let reg = SnapshotStore::new(path.clone()).load_strict().unwrap().unwrap();
        assert_eq!(reg.len(), 1);

        assert!(autosave.is_running());
        autosave.stop().await;
        let _ = std::fs::remove_file(&path);
    }
}
