//! A terminal chat client built on `little-chat`.

#[macro_use]
extern crate tracing;

use std::io::Write as _;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use little_chat::command::{Command, HELP};
use little_chat::core::SessionSnapshot;
use little_chat::{Config, session_builder};
use owo_colors::OwoColorize;
use tokio::io::{self, AsyncBufReadExt};
use tokio::select;
use tokio::sync::mpsc;
use tokio::time::sleep;

enum SessionEvent {
    Idle,
    Fragment(String),
}

const BAR_CHAR: &str = "▎";

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return;
        }
    };
    debug!("{config:?}");

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();

    let session = session_builder(&config)
        .on_idle({
            let event_tx = event_tx.clone();
            move || {
                event_tx.send(SessionEvent::Idle).ok();
            }
        })
        .on_fragment(move |_chat_id, message| {
            event_tx
                .send(SessionEvent::Fragment(message.content.clone()))
                .ok();
        })
        .build();

    let Some(snapshot) = session.snapshot().await else {
        return;
    };
    if snapshot.chats.is_empty() {
        session.create_chat();
    }
    println!("Type {} for a list of commands.", "/help".bold());

    let mut stdin = io::BufReader::new(io::stdin());
    loop {
        let Some(snapshot) = session.snapshot().await else {
            break;
        };
        let name = snapshot.active_chat().map_or("no chat", |c| c.name.as_str());
        print!("{} ", format!("[{name}]>").bright_black());
        flush_stdout();

        let Some(line) = read_line(&mut stdin).await else {
            break;
        };
        let command = match Command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                println!("{}", err.bright_red());
                continue;
            }
        };

        match command {
            Command::Send(text) => {
                if snapshot.active_id.is_none() {
                    println!("No chat is open, start one with /new.");
                    continue;
                }
                session.send_message(text);
                if !stream_reply(&mut event_rx).await {
                    break;
                }
            }
            Command::New => session.create_chat(),
            Command::List => print_chats(&snapshot),
            Command::Switch(n) => match chat_id_at(&snapshot, n) {
                Some(id) => session.select_chat(id),
                None => println!("There is no chat {n}."),
            },
            Command::Rename(name) => match &snapshot.active_id {
                Some(id) => session.rename_chat(id.as_str(), name),
                None => println!("No chat is open."),
            },
            Command::Delete(n) => {
                let id = match n {
                    Some(n) => chat_id_at(&snapshot, n),
                    None => snapshot.active_id.as_deref(),
                };
                match id {
                    Some(id) => session.delete_chat(id),
                    None => println!("There is no such chat."),
                }
            }
            Command::Clear => {
                print!("Delete all chats? [y/N]: ");
                flush_stdout();
                let Some(answer) = read_line(&mut stdin).await else {
                    break;
                };
                if answer.trim().eq_ignore_ascii_case("y") {
                    session.clear_all();
                }
            }
            Command::Help => println!("{HELP}"),
            Command::Quit => break,
        }
    }

    // Let pending saves go through before exiting.
    session.snapshot().await;
    session.close();
}

/// Prints the reply as it streams in. Returns `false` if the session is gone.
async fn stream_reply(
    event_rx: &mut mpsc::UnboundedReceiver<SessionEvent>,
) -> bool {
    let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
    let progress_bar = ProgressBar::new_spinner();
    progress_bar.set_style(progress_style);
    progress_bar.set_message("Thinking...");

    let mut printed = 0;
    loop {
        if printed == 0 {
            progress_bar.inc(1);
        }

        let sleep = sleep(Duration::from_millis(100));
        let event = select! {
            event = event_rx.recv() => {
                let Some(event) = event else {
                    progress_bar.finish_and_clear();
                    return false;
                };
                event
            },
            _ = sleep => {
                continue;
            }
        };

        match event {
            SessionEvent::Fragment(content) => {
                if printed == 0 {
                    // Finish the progress bar before printing anything else.
                    progress_bar.finish_and_clear();
                    print!("{}", BAR_CHAR.bright_cyan());
                }
                // Replies only ever grow, so the new text is the tail.
                if let Some(delta) = content.get(printed..) {
                    print!("{}", delta.bright_white());
                    flush_stdout();
                }
                printed = content.len();
            }
            SessionEvent::Idle => {
                progress_bar.finish_and_clear();
                if printed > 0 {
                    println!();
                }
                return true;
            }
        }
    }
}

fn print_chats(snapshot: &SessionSnapshot) {
    if snapshot.chats.is_empty() {
        println!("No chats yet.");
        return;
    }
    for (idx, chat) in snapshot.chats.iter().enumerate() {
        let line = format!(
            "{:>3}. {} ({} messages)",
            idx + 1,
            chat.name,
            chat.messages.len()
        );
        if snapshot.active_id.as_deref() == Some(chat.id.as_str()) {
            println!("{}", line.bold());
        } else {
            println!("{line}");
        }
    }
}

fn chat_id_at(snapshot: &SessionSnapshot, position: usize) -> Option<&str> {
    let chat = snapshot.chats.get(position.checked_sub(1)?)?;
    Some(&chat.id)
}

async fn read_line(
    stdin: &mut io::BufReader<io::Stdin>,
) -> Option<String> {
    let mut line = String::new();

    match stdin.read_line(&mut line).await {
        Ok(0) => None,
        Ok(_) => Some(line),
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}

#[inline]
fn flush_stdout() {
    if let Err(err) = std::io::stdout().flush() {
        warn!("failed to flush stdout: {err}");
    }
}
