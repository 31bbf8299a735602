use std::sync::Arc;

use tracing::info;

use tagbot_core::{autosave::Autosave, bot::TagBot, config::Config};
use tagbot_telegram::TelegramAdmins;

#[tokio::main]
async fn main() -> Result<(), tagbot_core::Error> {
    tagbot_core::logging::init("tagbot")?;

    let cfg = Arc::new(Config::load()?);
    let tg = tagbot_telegram::connect(&cfg);

    let bot = Arc::new(TagBot::load(
        cfg.clone(),
        Arc::new(TelegramAdmins::new(tg.clone())),
    ));
    let autosave = Autosave::spawn(bot.clone(), cfg.autosave_interval);

    let polled = tagbot_telegram::router::run_polling(tg, cfg, bot.clone()).await;

    info!("Shutting down, saving users");
    autosave.stop().await;
    bot.save().await;

    polled.map_err(|e| tagbot_core::Error::External(format!("telegram bot failed: {e}")))?;
    Ok(())
}
