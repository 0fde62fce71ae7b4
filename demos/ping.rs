//! Minimal bot with a single `!ping` command.

use env_logger::Env;
use trellis::{Bot, Command, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(Env::default().filter_or("RUST_LOG", "info"));

    let mut bot = Bot::new(Config::load("config.yaml")?);

    bot.command(Command::new("ping", |ctx| async move {
        println!("{} invoked {} in {:?}.", ctx.sender, ctx.body, ctx.room_name);
        ctx.reply("Pong!").await
    }))?;

    bot.run().await?;
    Ok(())
}
