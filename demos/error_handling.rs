//! Routing command failures through error handlers.

use env_logger::Env;
use trellis::{Bot, Command, Config, Error, ErrorKind};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(Env::default().filter_or("RUST_LOG", "info"));

    let mut bot = Bot::new(Config::load("config.yaml")?);

    // Bot-level handler for messages that use the prefix with an unknown
    // command name.
    bot.on_error(ErrorKind::CommandNotFound, |error| async move {
        println!("Global error handler: {error}.");
    });

    bot.command(
        Command::new("div", |ctx| async move {
            let a: i64 = ctx.arg(0)?;
            let b: i64 = ctx.arg(1)?;
            if b == 0 {
                return Err(Error::handler("division by zero"));
            }
            ctx.reply(&format!("{a} / {b} = {}", a / b)).await
        })
        .on_error(ErrorKind::Handler, |ctx, error| async move {
            let _ = ctx.reply(&format!("Operation not allowed: {error}")).await;
        })
        .on_error(ErrorKind::InvalidArgument, |ctx, error| async move {
            let _ = ctx.reply(&format!("Bad value: {error}")).await;
        })
        .on_error(ErrorKind::MissingArgument, |ctx, error| async move {
            let _ = ctx.reply(&format!("{error}")).await;
        }),
    )?;

    bot.run().await?;
    Ok(())
}
