//! Reacting to messages and reactions.

use env_logger::Env;
use trellis::{Bot, Config, EventKind};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(Env::default().filter_or("RUST_LOG", "info"));

    let mut bot = Bot::new(Config::load("config.yaml")?);

    // React based on the message content.
    bot.on(EventKind::Message, |room, event| async move {
        let Some(message) = event.as_message() else {
            return Ok(());
        };

        let body = message.body.to_lowercase();
        if body.starts_with("thanks") {
            room.react(&message.event_id, "🙏").await?;
        } else if body.starts_with("hello") {
            // Reactions can carry text instead of an emoji
            room.react(&message.event_id, "hi").await?;
        } else if body.starts_with("❤️") {
            // Or directly reply as a message instead of a reaction
            room.send("❤️").await?;
        }
        Ok(())
    });

    // React to reactions from other users.
    bot.on(EventKind::Reaction, |room, event| async move {
        let Some(reaction) = event.as_reaction() else {
            return Ok(());
        };

        if reaction.key == "🙏" {
            room.react(&reaction.relates_to, "hi").await?;
        }
        Ok(())
    });

    bot.run().await?;
    Ok(())
}
