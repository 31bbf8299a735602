use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};
use tracing::{info, warn};

use tagbot_core::{bot::TagBot, config::Config, messaging::port::MessagingPort};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub bot: Arc<TagBot>,
    pub messenger: Arc<dyn MessagingPort>,
}

/// Long-poll Telegram until Ctrl-C.
pub async fn run_polling(bot: Bot, cfg: Arc<Config>, tagbot: Arc<TagBot>) -> anyhow::Result<()> {
    match bot.get_me().await {
        Ok(me) => info!(username = %me.username(), "tagbot started"),
        Err(e) => warn!("getMe failed: {e}"),
    }
    info!(
        users = tagbot.user_count().await,
        data_file = %cfg.data_file.display(),
        "Registry ready"
    );

    let messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(
        bot.clone(),
        cfg.telegram_message_limit,
    ));

    let state = Arc::new(AppState {
        cfg,
        bot: tagbot,
        messenger,
    });

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("Dispatcher stopped");
    Ok(())
}
