//! Running scheduled tasks alongside commands.

use env_logger::Env;
use trellis::{Bot, Command, Config};

// Replace with your room ID
const ROOM_ID: &str = "!your_room_id:matrix.org";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(Env::default().filter_or("RUST_LOG", "info"));

    let mut bot = Bot::new(Config::load("config.yaml")?);

    bot.command(Command::new("ping", |ctx| async move {
        println!("{} invoked {} in {:?}.", ctx.sender, ctx.body, ctx.room_name);
        ctx.reply("Pong!").await
    }))?;

    // Runs every minute.
    bot.schedule("* * * * *", |bot| async move {
        println!("This task runs every minute.");
        bot.room(ROOM_ID).send("Scheduled ping!").await
    })?;

    bot.run().await?;
    Ok(())
}
