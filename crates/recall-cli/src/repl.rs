//! 交互式聊天循环

use std::io::{self, Write};

use colored::Colorize;
use recall_chat::ChatEngine;
use recall_config::Config;
use tracing::warn;

use crate::{display_count, print_message};

const DEFAULT_SEARCH_LIMIT: usize = 5;

#[derive(Debug, PartialEq, Eq)]
enum ReplCommand<'a> {
    Say(&'a str),
    Count,
    History,
    Search(&'a str),
    Clear,
    Reset,
    Help,
    Quit,
    Unknown(&'a str),
    Empty,
}

impl<'a> ReplCommand<'a> {
    fn parse(input: &'a str) -> Self {
        let input = input.trim();
        if input.is_empty() {
            return Self::Empty;
        }
        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            return Self::Quit;
        }
        let Some(rest) = input.strip_prefix('/') else {
            return Self::Say(input);
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };
        match name {
            "count" => Self::Count,
            "history" => Self::History,
            "search" => Self::Search(arg),
            "clear" => Self::Clear,
            "reset" => Self::Reset,
            "help" => Self::Help,
            "quit" | "exit" => Self::Quit,
            _ => Self::Unknown(name),
        }
    }
}

pub async fn run(engine: &ChatEngine, session_id: &str, config: &Config) -> anyhow::Result<()> {
    println!("{}", "🧠 Recall Interactive Chat".cyan().bold());
    println!("{}", format!("Session ID: {}", session_id).dimmed());
    println!(
        "{}",
        format!(
            "Model: {} · Store: {} · TTL: {}",
            engine.model(),
            config.store.backend,
            match config.store.default_ttl_hours {
                0 => "never expires".to_string(),
                hours => format!("{}h", hours),
            }
        )
        .dimmed()
    );
    println!("{}", "Type /help for commands, 'exit' or 'quit' to leave".dimmed());
    // Messages this terminal has shown since start or the last /reset
    let mut ui_messages: usize = 0;
    print_count(engine, session_id, ui_messages).await;
    println!();

    loop {
        print!("{} ", "You:".cyan().bold());
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            println!();
            break;
        }

        match ReplCommand::parse(&input) {
            ReplCommand::Empty => continue,
            ReplCommand::Quit => {
                println!("{}", "👋 Goodbye!".cyan());
                break;
            }
            ReplCommand::Say(message) => match engine.chat_turn(message, session_id).await {
                Ok(turn) => {
                    println!("{} {}", "Assistant:".green().bold(), turn.reply);
                    println!(
                        "{}",
                        format!("[messages stored: {}]", display_count(turn.message_count))
                            .dimmed()
                    );
                    ui_messages += 2;
                }
                Err(e) => {
                    println!("{}", format!("❌ Error: {}", e).red());
                    if e.is_transient() {
                        println!("{}", "Nothing was saved; send the message again to retry".dimmed());
                    }
                }
            },
            ReplCommand::Count => print_count(engine, session_id, ui_messages).await,
            ReplCommand::History => match engine.get_history(session_id).await {
                Ok(history) if history.is_empty() => {
                    println!("{}", "No stored messages".dimmed())
                }
                Ok(history) => history.iter().for_each(print_message),
                Err(e) => println!("{}", format!("❌ Error: {}", e).red()),
            },
            ReplCommand::Search("") => println!("{}", "Usage: /search <query>".yellow()),
            ReplCommand::Search(query) => {
                match engine
                    .search_history(session_id, query, DEFAULT_SEARCH_LIMIT)
                    .await
                {
                    Ok(None) => println!(
                        "{}",
                        "⚠️  Search is not supported by this store".yellow()
                    ),
                    Ok(Some(found)) if found.is_empty() => {
                        println!("{}", format!("No messages mention {:?}", query).dimmed())
                    }
                    Ok(Some(found)) => found.iter().for_each(print_message),
                    Err(e) => println!("{}", format!("❌ Error: {}", e).red()),
                }
            }
            ReplCommand::Clear => match engine.clear_session(session_id).await {
                Ok(()) => println!("{}", "🧹 Session history cleared".green()),
                Err(e) => println!("{}", format!("❌ Error: {}", e).red()),
            },
            ReplCommand::Reset => {
                if let Err(e) = engine.clear_session(session_id).await {
                    warn!(error = %e, "Could not clear stored history during reset");
                }
                ui_messages = 0;
                println!("{}", "🔄 Conversation reset".green());
            }
            ReplCommand::Help => print_help(),
            ReplCommand::Unknown(name) => {
                println!("{}", format!("Unknown command /{} (try /help)", name).yellow())
            }
        }
        println!();
    }

    if ui_messages > 0 {
        println!(
            "{}",
            format!("{} messages exchanged this run", ui_messages).dimmed()
        );
    }
    Ok(())
}

async fn print_count(engine: &ChatEngine, session_id: &str, ui_messages: usize) {
    let count = match engine.get_message_count(session_id).await {
        Ok(count) => Some(count),
        Err(e) => {
            warn!(error = %e, "Message count unavailable");
            None
        }
    };
    println!("{}", count_line(count, ui_messages).dimmed());
}

fn count_line(stored: Option<u64>, ui_messages: usize) -> String {
    format!(
        "Messages in memory: {} · UI messages: {}",
        display_count(stored),
        ui_messages
    )
}

fn print_help() {
    println!("{}", "Commands:".cyan().bold());
    println!("  /count           stored messages and messages shown here");
    println!("  /history         show the stored conversation");
    println!("  /search <query>  find messages mentioning <query>");
    println!("  /clear           delete this session's history");
    println!("  /reset           clear history and start over");
    println!("  /quit            leave");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_message() {
        assert_eq!(ReplCommand::parse("  hello there \n"), ReplCommand::Say("hello there"));
        assert_eq!(ReplCommand::parse("\n"), ReplCommand::Empty);
    }

    #[test]
    fn test_parse_slash_commands() {
        assert_eq!(ReplCommand::parse("/count"), ReplCommand::Count);
        assert_eq!(ReplCommand::parse("/history"), ReplCommand::History);
        assert_eq!(ReplCommand::parse("/search  python tips "), ReplCommand::Search("python tips"));
        assert_eq!(ReplCommand::parse("/search"), ReplCommand::Search(""));
        assert_eq!(ReplCommand::parse("/clear"), ReplCommand::Clear);
        assert_eq!(ReplCommand::parse("/reset"), ReplCommand::Reset);
        assert_eq!(ReplCommand::parse("/nope"), ReplCommand::Unknown("nope"));
    }

    #[test]
    fn test_count_line_shows_both_counts() {
        assert_eq!(count_line(Some(6), 2), "Messages in memory: 6 · UI messages: 2");
        assert_eq!(count_line(None, 0), "Messages in memory: N/A · UI messages: 0");
    }

    #[test]
    fn test_parse_quit() {
        assert_eq!(ReplCommand::parse("exit"), ReplCommand::Quit);
        assert_eq!(ReplCommand::parse("QUIT"), ReplCommand::Quit);
        assert_eq!(ReplCommand::parse("/quit"), ReplCommand::Quit);
    }
}
