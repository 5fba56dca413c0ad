//! Command line tool for poking at a gridtext message database:
//! sending texts, listing threads, and flipping read or hidden state
//! for a number. Meant for game admins and for driving the store in
//! development.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use gridtext_messaging::{MessageStore, OffsetClock, PhoneNumber, Thread};
use tracing::{debug, Level};
use tracing_subscriber::EnvFilter;

use config::Config;

#[derive(Parser, Debug)]
#[command(name = "gridtext")]
#[command(about = "Inspect and drive a gridtext message database", version)]
struct Cli {
    /// Path to the message database (overrides the configured path)
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "warn")]
    log_level: String,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send a text message
    Send {
        /// Sender number, e.g. 555-0001
        #[arg(long, value_name = "NUMBER")]
        from: String,
        /// Recipient number, repeatable for group texts
        #[arg(long = "to", value_name = "NUMBER", required = true)]
        to: Vec<String>,
        /// Message content
        #[arg(required = true, value_name = "WORD")]
        message: Vec<String>,
    },
    /// List threads for a number, newest text first per thread
    Threads {
        /// Viewer number
        number: String,
    },
    /// Show the texts visible to a number
    History {
        /// Viewer number
        number: String,
        /// Restrict to a single thread
        #[arg(long, value_name = "ID")]
        thread: Option<i64>,
        /// How many texts to show when a thread is given
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// Mark a thread read for a number
    MarkRead { thread_id: i64, number: String },
    /// Mark a thread unread for a number
    MarkUnread { thread_id: i64, number: String },
    /// Hide a text from a number's history
    Hide { text_id: i64, number: String },
    /// Set a thread's display name, or clear it when no name is given
    Name {
        thread_id: i64,
        #[arg(value_name = "WORD")]
        name: Vec<String>,
    },
}

fn init_logging(level: &str) -> Result<()> {
    level.parse::<Level>().map_err(|_| {
        anyhow!(
            "Invalid log level '{}'. Valid levels: error, warn, info, debug, trace",
            level
        )
    })?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    let config = Config::load().context("Failed to load configuration")?;
    let db_path = cli
        .db
        .clone()
        .unwrap_or_else(|| config.storage.db_path.clone());
    debug!("using message database at {}", db_path.display());

    let clock = Arc::new(OffsetClock::new(config.clock.offset_secs));
    let store = MessageStore::open(&db_path, clock)
        .with_context(|| format!("Failed to open message database at {}", db_path.display()))?;

    match &cli.command {
        Command::Send { from, to, message } => cmd_send(&store, cli.json, from, to, message),
        Command::Threads { number } => cmd_threads(&store, cli.json, number),
        Command::History {
            number,
            thread,
            limit,
        } => cmd_history(&store, cli.json, number, *thread, *limit),
        Command::MarkRead { thread_id, number } => {
            cmd_mark(&store, cli.json, *thread_id, number, true)
        }
        Command::MarkUnread { thread_id, number } => {
            cmd_mark(&store, cli.json, *thread_id, number, false)
        }
        Command::Hide { text_id, number } => cmd_hide(&store, cli.json, *text_id, number),
        Command::Name { thread_id, name } => cmd_name(&store, cli.json, *thread_id, name),
    }
}

fn cmd_send(
    store: &MessageStore,
    json: bool,
    from: &str,
    to: &[String],
    message: &[String],
) -> Result<()> {
    let recipients: Vec<&str> = to.iter().map(String::as_str).collect();
    let content = message.join(" ");
    let text = store.send(from, &recipients, &content)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&text)?);
    } else {
        println!("Text #{} sent on thread #{}.", text.id, text.thread_id);
    }
    Ok(())
}

fn cmd_threads(store: &MessageStore, json: bool, number: &str) -> Result<()> {
    let viewer = PhoneNumber::parse(number)?;
    let threads = store.get_threads_for(number)?;
    let now = store.game_now();

    if json {
        let mut entries = Vec::new();
        for (thread_id, text) in &threads {
            let thread = store.get_thread(*thread_id)?;
            entries.push(serde_json::json!({
                "thread_id": thread_id,
                "name": thread_label(&thread, &viewer),
                "unread": !store.has_read(*thread_id, number)?,
                "latest": text,
            }));
        }
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if threads.is_empty() {
        println!("No threads for {}.", viewer);
        return Ok(());
    }
    for (thread_id, text) in &threads {
        let thread = store.get_thread(*thread_id)?;
        let marker = if store.has_read(*thread_id, number)? {
            ' '
        } else {
            '*'
        };
        let preview = if text.sender == viewer {
            format!("You: {}", text.content)
        } else {
            text.content.clone()
        };
        println!(
            "{} #{:<4} {:<24} {} ({})",
            marker,
            thread_id,
            thread_label(&thread, &viewer),
            crop(&preview, 40),
            text.sent_ago(now)
        );
    }
    Ok(())
}

fn cmd_history(
    store: &MessageStore,
    json: bool,
    number: &str,
    thread: Option<i64>,
    limit: usize,
) -> Result<()> {
    let viewer = PhoneNumber::parse(number)?;
    let texts = match thread {
        Some(thread_id) => store.thread_texts(thread_id, number, limit)?,
        None => store.get_texts_for(number)?,
    };
    let now = store.game_now();

    if json {
        println!("{}", serde_json::to_string_pretty(&texts)?);
        return Ok(());
    }

    for text in &texts {
        let sender = if text.sender == viewer {
            "You".to_string()
        } else {
            text.sender.to_string()
        };
        println!(
            "#{:<4} (thread #{}) {}: {} ({})",
            text.id,
            text.thread_id,
            sender,
            text.content,
            text.sent_ago(now)
        );
    }
    if thread.is_none() {
        let total = store.count_texts_for(number)?;
        let plural = if total == 1 { "" } else { "s" };
        println!("{} saved message{}.", total, plural);
    }
    Ok(())
}

fn cmd_mark(
    store: &MessageStore,
    json: bool,
    thread_id: i64,
    number: &str,
    read: bool,
) -> Result<()> {
    if read {
        store.mark_read(thread_id, number)?;
    } else {
        store.mark_unread(thread_id, number)?;
    }
    if json {
        println!(
            "{}",
            serde_json::json!({ "thread_id": thread_id, "number": number, "read": read })
        );
    } else {
        let state = if read { "read" } else { "unread" };
        println!("Thread #{} marked {} for {}.", thread_id, state, number);
    }
    Ok(())
}

fn cmd_hide(store: &MessageStore, json: bool, text_id: i64, number: &str) -> Result<()> {
    store.hide_text(text_id, number)?;
    if json {
        println!(
            "{}",
            serde_json::json!({ "text_id": text_id, "number": number, "hidden": true })
        );
    } else {
        println!("Text #{} hidden for {}.", text_id, number);
    }
    Ok(())
}

fn cmd_name(store: &MessageStore, json: bool, thread_id: i64, name: &[String]) -> Result<()> {
    let joined = name.join(" ");
    let new_name = if joined.is_empty() {
        None
    } else {
        Some(joined.as_str())
    };
    store.set_thread_name(thread_id, new_name)?;
    if json {
        println!(
            "{}",
            serde_json::json!({ "thread_id": thread_id, "name": new_name })
        );
    } else {
        match new_name {
            Some(name) => println!("Thread #{} named \"{}\".", thread_id, name),
            None => println!("Thread #{} name cleared.", thread_id),
        }
    }
    Ok(())
}

/// Label a thread the way a phone contact list would: the stored name
/// when set, otherwise the other participants.
fn thread_label(thread: &Thread, viewer: &PhoneNumber) -> String {
    match &thread.name {
        Some(name) => name.clone(),
        None => thread
            .others(viewer)
            .iter()
            .map(|number| number.to_string())
            .collect::<Vec<_>>()
            .join(", "),
    }
}

fn crop(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else if width <= 3 {
        // no room for the ellipsis, cut plainly
        s.chars().take(width).collect()
    } else {
        let cut: String = s.chars().take(width - 3).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crop() {
        assert_eq!(crop("short", 10), "short");
        assert_eq!(crop("exactly ten", 11), "exactly ten");
        assert_eq!(crop("a much longer message body", 10), "a much ...");

        // widths without room for the ellipsis still hold the width
        assert_eq!(crop("overflow", 3), "ove");
        assert_eq!(crop("overflow", 1), "o");
        assert_eq!(crop("overflow", 0), "");
    }

    #[test]
    fn test_thread_label() {
        let viewer = PhoneNumber::parse("555-0001").unwrap();
        let mut thread = Thread {
            id: 1,
            name: None,
            participants: vec![
                PhoneNumber::parse("111-0000").unwrap(),
                PhoneNumber::parse("555-0001").unwrap(),
                PhoneNumber::parse("555-0002").unwrap(),
            ],
        };
        assert_eq!(thread_label(&thread, &viewer), "111-0000, 555-0002");

        thread.name = Some("the crew".to_string());
        assert_eq!(thread_label(&thread, &viewer), "the crew");
    }
}
