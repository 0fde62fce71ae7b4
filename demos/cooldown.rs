//! Rate-limiting commands with cooldowns.

use std::time::Duration;

use env_logger::Env;
use trellis::{Bot, Command, Config, Error, ErrorKind};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(Env::default().filter_or("RUST_LOG", "info"));

    let mut bot = Bot::new(Config::load("config.yaml")?);

    // Limited to 2 uses per 15 seconds per user; excess invocations are
    // answered by the cooldown error handler.
    bot.command(
        Command::new("hi", |ctx| async move {
            println!("{} invoked {} in {:?}.", ctx.sender, ctx.body, ctx.room_name);
            ctx.reply("Hello World.").await
        })
        .cooldown(2, Duration::from_secs(15))
        .on_error(ErrorKind::Cooldown, |ctx, error| async move {
            let Error::Cooldown { retry_after } = error else {
                return;
            };
            let _ = ctx
                .reply(&format!("⏳ Try again in {:.1}s", retry_after.as_secs_f32()))
                .await;
        }),
    )?;

    bot.run().await?;
    Ok(())
}
