//! The built-in help command and its formatting trait.

use std::sync::Arc;

use crate::{
    command::Command,
    context::Context,
    errors::Error,
    group::Group,
    help::pagination::{Page, Paginator},
    registry::Entry,
};

/// Formats help output for commands, groups and pages.
///
/// [`DefaultHelp`] provides a ready-made implementation; implement this
/// trait and install it with [`crate::Bot::set_help`] to customise the
/// appearance of `!help`.
pub trait HelpFormatter: Send + Sync {
    /// Number of entries per help page.
    fn per_page(&self) -> usize {
        5
    }

    /// Formats a single command for display.
    fn format_command(&self, prefix: &str, command: &Command) -> String;

    /// Formats a group for display.
    fn format_group(&self, prefix: &str, group: &Group) -> String;

    /// Formats a subcommand for display.
    fn format_subcommand(&self, prefix: &str, subcommand: &Command) -> String;

    /// Formats the page footer.
    fn format_page_info(&self, page_number: usize, total_pages: usize) -> String;

    /// Assembles a complete help page over all registered entries.
    fn format_help_page(&self, prefix: &str, page: &Page<Entry>) -> String {
        if page.items.is_empty() {
            return "No commands available.".to_string();
        }

        let entries: Vec<String> = page
            .items
            .iter()
            .map(|entry| match entry {
                Entry::Group(group) => self.format_group(prefix, group),
                Entry::Command(command) => self.format_command(prefix, command),
            })
            .collect();

        format!(
            "**Commands**\n\n{}\n\n{}",
            entries.join("\n\n"),
            self.format_page_info(page.page_number, page.total_pages)
        )
    }

    /// Assembles a complete subcommand page for a group.
    fn format_subcommand_page(
        &self,
        prefix: &str,
        group_name: &str,
        page: &Page<Arc<Command>>,
    ) -> String {
        if page.items.is_empty() {
            return format!("No subcommands available for group `{group_name}`.");
        }

        let entries: Vec<String> = page
            .items
            .iter()
            .map(|subcommand| self.format_subcommand(prefix, subcommand))
            .collect();

        format!(
            "**{group_name} Subcommands**\n\n{}\n\n{}",
            entries.join("\n\n"),
            self.format_page_info(page.page_number, page.total_pages)
        )
    }
}

/// Default [`HelpFormatter`] with basic markdown formatting.
pub struct DefaultHelp {
    /// Entries per page
    per_page: usize,
}

impl DefaultHelp {
    /// Creates the default formatter with `per_page` entries per page.
    pub fn new(per_page: usize) -> Self {
        DefaultHelp { per_page }
    }
}

impl Default for DefaultHelp {
    fn default() -> Self {
        DefaultHelp::new(5)
    }
}

impl HelpFormatter for DefaultHelp {
    fn per_page(&self) -> usize {
        self.per_page
    }

    fn format_command(&self, prefix: &str, command: &Command) -> String {
        format!(
            "**{}**\nUsage: `{}`\nDescription: {}",
            command.name(),
            command.usage_text(prefix),
            non_empty(command.description_text())
        )
    }

    fn format_group(&self, prefix: &str, group: &Group) -> String {
        let subcommand_count = group.subcommands().len();
        let subcommands_text = if subcommand_count > 0 {
            format!(" ({subcommand_count} subcommands)")
        } else {
            String::new()
        };

        format!(
            "**{}** [GROUP]{}\nUsage: `{}`\nDescription: {}",
            group.name(),
            subcommands_text,
            group.usage_text(prefix),
            non_empty(group.description_text())
        )
    }

    fn format_subcommand(&self, prefix: &str, subcommand: &Command) -> String {
        self.format_command(prefix, subcommand)
    }

    fn format_page_info(&self, page_number: usize, total_pages: usize) -> String {
        format!("**Page {page_number}/{total_pages}**")
    }
}

fn non_empty(description: &str) -> &str {
    if description.is_empty() {
        "None"
    } else {
        description
    }
}

/// Builds the built-in `help` command registered by [`crate::Bot::new`].
pub(crate) fn help_command() -> Command {
    Command::new("help", |ctx| async move { execute(ctx).await })
        .description("Sends the command help.")
}

/// Resolves the help request and replies with the formatted text.
async fn execute(ctx: Context) -> Result<(), Error> {
    let (command_name, subcommand_name, page) = parse_help_arguments(&ctx.args);
    let formatter = ctx.bot().help();
    let prefix = ctx.prefix().to_string();

    let text = match command_name {
        None => {
            let registry = ctx.bot().registry();
            let mut entries: Vec<Entry> = registry.commands().values().cloned().collect();
            entries.sort_by_key(|entry| entry.name().to_lowercase());

            let paginator = Paginator::new(entries, formatter.per_page());
            formatter.format_help_page(&prefix, &paginator.get_page(page))
        }
        Some(name) => match ctx.bot().registry().get(&name) {
            None => format!("Command `{name}` not found."),
            Some(Entry::Command(command)) => formatter.format_command(&prefix, command),
            Some(Entry::Group(group)) => match subcommand_name {
                Some(subcommand_name) => match group.get(&subcommand_name) {
                    Some(subcommand) => formatter.format_subcommand(&prefix, subcommand),
                    None => format!(
                        "Subcommand `{subcommand_name}` not found in group `{name}`."
                    ),
                },
                None => {
                    let header = formatter.format_group(&prefix, group);
                    if group.subcommands().is_empty() {
                        format!("{header}\n\nNo subcommands available.")
                    } else {
                        let mut subcommands: Vec<Arc<Command>> =
                            group.subcommands().values().cloned().collect();
                        subcommands.sort_by_key(|subcommand| subcommand.name().to_lowercase());

                        let paginator = Paginator::new(subcommands, formatter.per_page());
                        let list = formatter.format_subcommand_page(
                            &prefix,
                            group.name(),
                            &paginator.get_page(page),
                        );
                        format!("{header}\n\n{list}")
                    }
                }
            },
        },
    };

    ctx.reply(&text).await
}

/// Parses help arguments into `(command, subcommand, page)`.
///
/// Grammar: `help [page]`, `help <command>`, `help <group> [subcommand|page]`
/// and `help <group> <subcommand> [page]`. The page defaults to 1.
fn parse_help_arguments(args: &[String]) -> (Option<String>, Option<String>, usize) {
    let mut command_name = None;
    let mut subcommand_name = None;
    let mut page_number = 1;

    let Some(first) = args.first() else {
        return (command_name, subcommand_name, page_number);
    };

    if args.len() == 1
        && let Ok(page) = first.parse::<usize>()
    {
        return (None, None, page);
    }

    command_name = Some(first.clone());

    if let Some(second) = args.get(1) {
        match second.parse::<usize>() {
            Ok(page) => page_number = page,
            Err(_) => {
                subcommand_name = Some(second.clone());
                if let Some(third) = args.get(2)
                    && let Ok(page) = third.parse::<usize>()
                {
                    page_number = page;
                }
            }
        }
    }

    (command_name, subcommand_name, page_number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bot::testing,
        events::MessageEvent,
        group::Group,
        messenger::MockMessenger,
        registry::Registry,
    };

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn test_parse_no_arguments() {
        assert_eq!(parse_help_arguments(&[]), (None, None, 1));
    }

    #[test]
    fn test_parse_page_only() {
        assert_eq!(parse_help_arguments(&args(&["3"])), (None, None, 3));
    }

    #[test]
    fn test_parse_command_name() {
        assert_eq!(
            parse_help_arguments(&args(&["ping"])),
            (Some("ping".to_string()), None, 1)
        );
    }

    #[test]
    fn test_parse_group_and_page() {
        assert_eq!(
            parse_help_arguments(&args(&["math", "2"])),
            (Some("math".to_string()), None, 2)
        );
    }

    #[test]
    fn test_parse_group_and_subcommand() {
        assert_eq!(
            parse_help_arguments(&args(&["math", "add"])),
            (Some("math".to_string()), Some("add".to_string()), 1)
        );
    }

    #[test]
    fn test_parse_group_subcommand_and_page() {
        assert_eq!(
            parse_help_arguments(&args(&["math", "add", "2"])),
            (Some("math".to_string()), Some("add".to_string()), 2)
        );
    }

    #[test]
    fn test_default_help_formats_command() {
        let formatter = DefaultHelp::default();
        let command = Command::new("ping", |_ctx| async move { Ok(()) })
            .description("Replies with Pong!");

        let text = formatter.format_command("!", &command);
        assert_eq!(text, "**ping**\nUsage: `!ping`\nDescription: Replies with Pong!");
    }

    #[test]
    fn test_default_help_formats_undescribed_command() {
        let formatter = DefaultHelp::default();
        let command = Command::new("ping", |_ctx| async move { Ok(()) });

        let text = formatter.format_command("!", &command);
        assert!(text.ends_with("Description: None"));
    }

    #[test]
    fn test_default_help_formats_group() {
        let formatter = DefaultHelp::default();
        let group = Group::new("math", |_ctx| async move { Ok(()) })
            .description("Mathematical commands")
            .subcommand(Command::new("add", |_ctx| async move { Ok(()) }))
            .unwrap();

        let text = formatter.format_group("!", &group);
        assert!(text.starts_with("**math** [GROUP] (1 subcommands)"));
        assert!(text.contains("`!math [subcommand]`"));
    }

    #[test]
    fn test_format_help_page_over_entries() {
        let formatter = DefaultHelp::default();
        let entries = vec![
            Entry::Command(Arc::new(Command::new("ping", |_ctx| async move { Ok(()) }))),
            Entry::Group(Arc::new(Group::new("math", |_ctx| async move { Ok(()) }))),
        ];

        let paginator = Paginator::new(entries, 5);
        let text = formatter.format_help_page("!", &paginator.get_page(1));
        assert!(text.starts_with("**Commands**"));
        assert!(text.contains("**ping**"));
        assert!(text.contains("**math** [GROUP]"));
        assert!(text.ends_with("**Page 1/1**"));
    }

    #[test]
    fn test_format_help_page_empty() {
        let formatter = DefaultHelp::default();
        let paginator: Paginator<Entry> = Paginator::new(Vec::new(), 5);
        let text = formatter.format_help_page("!", &paginator.get_page(1));
        assert_eq!(text, "No commands available.");
    }

    async fn run_help(registry: Registry, body: &str, expected_fragment: &'static str) {
        let mut messenger = MockMessenger::new();
        messenger
            .expect_send_message()
            .withf(move |_, content| content.body().contains(expected_fragment))
            .once()
            .returning(|_, _| Ok(()));

        let bot = testing::handle_with_registry(Arc::new(messenger), registry);
        let ctx = Context::from_message(
            bot,
            "!room:example.org",
            None,
            &MessageEvent {
                sender: "@alice:example.org".to_string(),
                body: body.to_string(),
                event_id: "$event:example.org".to_string(),
                timestamp: chrono::Utc::now(),
            },
        );

        execute(ctx).await.unwrap();
    }

    #[tokio::test]
    async fn test_execute_lists_commands() {
        let mut registry = Registry::new();
        registry.command(help_command()).unwrap();
        registry
            .command(Command::new("ping", |_ctx| async move { Ok(()) }))
            .unwrap();

        run_help(registry, "!help", "**Commands**").await;
    }

    #[tokio::test]
    async fn test_execute_shows_single_command() {
        let mut registry = Registry::new();
        registry
            .command(
                Command::new("ping", |_ctx| async move { Ok(()) })
                    .description("Replies with Pong!"),
            )
            .unwrap();

        run_help(registry, "!help ping", "Replies with Pong!").await;
    }

    #[tokio::test]
    async fn test_execute_unknown_command() {
        run_help(Registry::new(), "!help nope", "Command `nope` not found.").await;
    }

    #[tokio::test]
    async fn test_execute_group_lists_subcommands() {
        let mut registry = Registry::new();
        registry
            .group(
                Group::new("math", |_ctx| async move { Ok(()) })
                    .subcommand(Command::new("add", |_ctx| async move { Ok(()) }))
                    .unwrap(),
            )
            .unwrap();

        run_help(registry, "!help math", "**math Subcommands**").await;
    }

    #[tokio::test]
    async fn test_execute_unknown_subcommand() {
        let mut registry = Registry::new();
        registry
            .group(Group::new("math", |_ctx| async move { Ok(()) }))
            .unwrap();

        run_help(
            registry,
            "!help math nope",
            "Subcommand `nope` not found in group `math`.",
        )
        .await;
    }
}
