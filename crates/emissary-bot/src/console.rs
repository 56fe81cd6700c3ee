//! Line-oriented dev console.
//!
//! Stands in for the gateway adapter during local development: each stdin
//! line is tokenized and dispatched as if the configured console user had
//! typed it in the configured guild.  Quotes group multi-word arguments.

use emissary_shared::Snowflake;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use crate::commands::{Dispatcher, Invocation};
use crate::identity::{GuildProfile, UserProfile};

/// Split a command line into tokens, honoring double quotes.
pub fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in line.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Read stdin until EOF, dispatching each line.  The console actor is
/// treated as the owner of its pretend guild, so every command is
/// reachable locally.
pub async fn run(
    dispatcher: Dispatcher,
    actor: Snowflake,
    guild: Snowflake,
) -> std::io::Result<()> {
    let profile = UserProfile::member(actor);
    let context = GuildProfile {
        id: guild,
        owner_id: actor,
    };

    info!(%actor, %guild, "dev console ready; type a command or Ctrl-D to quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let args = tokenize(&line);
        if args.is_empty() {
            continue;
        }

        let invocation = Invocation {
            actor: profile,
            guild: Some(context),
            channel: Some(Snowflake(1)),
            args,
        };
        let reply = dispatcher.dispatch(&invocation).await;
        println!("{}", reply.text);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_splits_on_whitespace() {
        assert_eq!(
            tokenize("character create Rex"),
            vec!["character", "create", "Rex"]
        );
    }

    #[test]
    fn tokenize_groups_quoted_arguments() {
        assert_eq!(
            tokenize("dossier create \"Operation Sunrise\" \"Dawn raid.\""),
            vec!["dossier", "create", "Operation Sunrise", "Dawn raid."]
        );
    }

    #[test]
    fn tokenize_handles_blank_lines() {
        assert!(tokenize("   ").is_empty());
        assert!(tokenize("").is_empty());
    }
}
