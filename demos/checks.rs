//! Gating a command with a check predicate.

use std::collections::HashSet;
use std::sync::Arc;

use env_logger::Env;
use trellis::{Bot, Command, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(Env::default().filter_or("RUST_LOG", "info"));

    let allowed_users: Arc<HashSet<String>> = Arc::new(
        ["@alice:matrix.org", "@bob:matrix.org"]
            .into_iter()
            .map(String::from)
            .collect(),
    );

    let mut bot = Bot::new(Config::load("config.yaml")?);

    bot.command(
        Command::new("secret", |ctx| async move {
            ctx.reply("🎉 Welcome to the secret club!").await
        })
        .check(move |ctx| {
            let allowed_users = Arc::clone(&allowed_users);
            async move {
                if allowed_users.contains(&ctx.sender) {
                    return Ok(true);
                }
                ctx.reply("You do not have permission to use this command.")
                    .await?;
                Ok(false)
            }
        }),
    )?;

    bot.run().await?;
    Ok(())
}
