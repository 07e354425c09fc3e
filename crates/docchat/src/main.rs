//! A terminal client for the document-chat service.

#[macro_use]
extern crate tracing;

use std::io::Write as _;
use std::path::Path;
use std::pin::pin;
use std::time::Duration;

use docchat::api::{
    ConversationId, DocumentId, Identity, RagMode, Registration, Role,
};
use docchat::core::conversation::{Conversation, Phase};
use docchat::core::{Controller, ControllerConfig, ControllerEvent};
use docchat::{ClientBuilder, ClientConfig, files};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tokio::io::{self, AsyncBufReadExt};
use tokio::select;
use tokio::sync::mpsc;
use tokio::time::sleep;

type Events = mpsc::UnboundedReceiver<ControllerEvent>;

enum Flow {
    Continue,
    Quit,
}

const BAR_CHAR: &str = "▎";
const WAIT_TIMEOUT: Duration = Duration::from_secs(90);

const HELP: &str = "\
Commands:
  /login <username>            log in, the password is asked next
  /register <email> <username> create an account and log in
  /logout                      forget the session
  /whoami                      show the logged-in user
  /new                         start a new conversation
  /list                        list conversations
  /open <id>                   open a conversation
  /delete <id>                 delete a conversation
  /mode fast|accurate          set the retrieval mode
  /docs                        list uploaded documents
  /upload <glob>               upload matching files
  /rmdoc <id>                  delete a document
  /stats [days]                show usage statistics
  /avatar <path>|clear         set or clear the avatar
  /quit                        exit
Anything else is sent as a message.";

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = ClientConfig::from_env();
    let controller_config = ControllerConfig::default();
    let api_url = config.api_url().to_owned();

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let controller = match ClientBuilder::new(config)
        .with_controller_config(controller_config.clone())
        .on_event(move |event| {
            event_tx.send(event).ok();
        })
        .build()
    {
        Ok(controller) => controller,
        Err(err) => {
            eprintln!("failed to load the saved session: {err}");
            return;
        }
    };

    println!(
        "{}Connected to {}. Type /help for commands.",
        BAR_CHAR.bright_black(),
        api_url.bright_white()
    );

    loop {
        drain(&mut event_rx);
        print!("> ");
        std::io::stdout().flush().ok();

        let Some(line) = read_line().await else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let flow = match line.strip_prefix('/') {
            Some(command) => {
                run_command(
                    &controller,
                    &controller_config,
                    &mut event_rx,
                    command,
                )
                .await
            }
            None => {
                controller.send_message(line);
                wait_for_reply(&mut event_rx).await
            }
        };
        if let Flow::Quit = flow {
            break;
        }
    }

    controller.shutdown();
}

async fn run_command(
    controller: &Controller,
    config: &ControllerConfig,
    events: &mut Events,
    command: &str,
) -> Flow {
    let mut args = command.split_whitespace();
    let Some(name) = args.next() else {
        println!("{HELP}");
        return Flow::Continue;
    };

    match (name, args.next(), args.next()) {
        ("help", ..) => println!("{HELP}"),
        ("quit" | "exit", ..) => return Flow::Quit,
        ("login", Some(username), None) => {
            let Some(password) = prompt("Password: ").await else {
                return Flow::Quit;
            };
            match controller.login(username, &password).await {
                Ok(identity) => print_identity(&identity),
                Err(err) => print_error(&err),
            }
        }
        ("register", Some(email), Some(username)) => {
            let Some(password) = prompt("Password: ").await else {
                return Flow::Quit;
            };
            let Some(full_name) = prompt("Full name (optional): ").await else {
                return Flow::Quit;
            };
            let registration = Registration {
                email: email.to_owned(),
                username: username.to_owned(),
                password,
                full_name: Some(full_name).filter(|name| !name.is_empty()),
            };
            match controller.register(registration).await {
                Ok(identity) => print_identity(&identity),
                Err(err) => print_error(&err),
            }
        }
        ("logout", None, _) => {
            controller.logout();
            // Wait for the logout to be applied.
            controller.snapshot().await.ok();
        }
        ("whoami", None, _) => match controller.snapshot().await {
            Ok(snapshot) => match snapshot.identity {
                Some(identity) => print_identity(&identity),
                None if snapshot.authenticated => println!("Loading..."),
                None => println!("Not logged in."),
            },
            Err(err) => print_error(&err),
        },
        ("new", None, _) => {
            controller.new_chat();
            println!("Started a new conversation.");
        }
        ("list", None, _) => match controller.snapshot().await {
            Ok(snapshot) => {
                let active =
                    snapshot.active_conversation().and_then(Conversation::id);
                if snapshot.conversation_list.is_empty() {
                    println!("No conversations.");
                }
                for summary in &snapshot.conversation_list {
                    let marker =
                        if Some(summary.id) == active { "*" } else { " " };
                    println!(
                        "{marker} {:>5}  {}  {}",
                        summary.id,
                        summary.updated_at.format("%Y-%m-%d %H:%M").bright_black(),
                        summary.title
                    );
                }
            }
            Err(err) => print_error(&err),
        },
        ("open", Some(id), None) => {
            let Some(id) = parse_id(id) else {
                return Flow::Continue;
            };
            controller.select_conversation(ConversationId(id));
            let loaded = wait_for(events, |event| {
                matches!(
                    event,
                    ControllerEvent::ActiveConversationChanged(Some(_))
                        | ControllerEvent::Notice(_)
                )
            })
            .await;
            if loaded {
                if let Ok(snapshot) = controller.snapshot().await {
                    if let Some(conversation) = snapshot.active_conversation() {
                        print_conversation(conversation);
                    }
                }
            }
        }
        ("delete", Some(id), None) => {
            let Some(id) = parse_id(id) else {
                return Flow::Continue;
            };
            return delete_conversation(
                controller,
                config,
                events,
                ConversationId(id),
            )
            .await;
        }
        ("mode", Some(mode), None) => match mode.parse::<RagMode>() {
            Ok(mode) => {
                controller.set_rag_mode(mode);
                println!("Retrieval mode set to {mode}.");
            }
            Err(err) => println!("{}", err.bright_red()),
        },
        ("docs", None, _) => match controller.list_documents().await {
            Ok(documents) => {
                if documents.is_empty() {
                    println!("No documents.");
                }
                for document in documents {
                    println!(
                        "{:>5}  {:<10}  {:>4} chunks  {:>9} bytes  {}",
                        document.id,
                        format!("{:?}", document.status).to_lowercase(),
                        document.chunk_count,
                        document.file_size,
                        document.filename
                    );
                }
            }
            Err(err) => print_error(&err),
        },
        ("upload", Some(pattern), None) => {
            upload_documents(controller, pattern).await;
        }
        ("rmdoc", Some(id), None) => {
            let Some(id) = parse_id(id) else {
                return Flow::Continue;
            };
            match controller.delete_document(DocumentId(id)).await {
                Ok(()) => println!("Deleted document {id}."),
                Err(err) => print_error(&err),
            }
        }
        ("stats", days, None) => {
            let days = match days.map(str::parse::<u32>) {
                Some(Ok(days)) => Some(days),
                Some(Err(_)) => {
                    println!("{}", "days must be a number".bright_red());
                    return Flow::Continue;
                }
                None => None,
            };
            show_stats(controller, days).await;
        }
        ("avatar", Some("clear"), None) => {
            if let Err(err) = controller.clear_avatar().await {
                print_error(&err);
            }
        }
        ("avatar", Some(path), None) => match files::read_avatar(Path::new(path)) {
            Ok((data, mime)) => {
                match controller.set_avatar(&data, mime.essence_str()).await {
                    Ok(()) => println!("Avatar updated."),
                    Err(err) => print_error(&err),
                }
            }
            Err(err) => println!("{}", err.bright_red()),
        },
        _ => println!("Unknown command, type /help for commands."),
    }
    Flow::Continue
}

async fn wait_for_reply(events: &mut Events) -> Flow {
    let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");

    let mut progress_bar: Option<ProgressBar> = None;
    let mut revealed = 0;
    let mut sources = 0;

    loop {
        if let Some(progress_bar) = &progress_bar {
            progress_bar.inc(1);
        }

        let sleep = sleep(Duration::from_millis(100));
        let event = select! {
            event = events.recv() => {
                let Some(event) = event else {
                    return Flow::Quit;
                };
                event
            },
            _ = sleep => {
                continue;
            }
        };

        match event {
            ControllerEvent::PhaseChanged {
                phase: Phase::Pending,
                ..
            } => {
                let bar = ProgressBar::new_spinner();
                bar.set_style(progress_style.clone());
                bar.set_message("🤔 Thinking...");
                progress_bar = Some(bar);
            }
            ControllerEvent::PhaseChanged {
                phase: Phase::Streaming(_),
                ..
            } => {
                if let Some(progress_bar) = progress_bar.take() {
                    progress_bar.finish_and_clear();
                }
                print!("{}🤖 ", BAR_CHAR.bright_cyan());
                std::io::stdout().flush().ok();
            }
            ControllerEvent::StreamProgress { text, .. } => {
                // Only the part not printed yet.
                let increment: String = text.chars().skip(revealed).collect();
                revealed += increment.chars().count();
                print!("{}", increment.bright_white());
                std::io::stdout().flush().ok();
            }
            ControllerEvent::ConversationUpdated(conversation) => {
                if let Some(reply) = conversation.last_reply() {
                    sources = reply.sources.len();
                }
            }
            ControllerEvent::PhaseChanged {
                phase: Phase::Idle,
                ..
            } => {
                if let Some(progress_bar) = progress_bar.take() {
                    progress_bar.finish_and_clear();
                }
                if revealed > 0 {
                    println!();
                }
                if sources > 0 {
                    println!(
                        "{}📎 {sources} source(s)",
                        BAR_CHAR.bright_black()
                    );
                }
                return Flow::Continue;
            }
            event => {
                if let Some(progress_bar) = progress_bar.take() {
                    progress_bar.finish_and_clear();
                }
                print_event(&event);
            }
        }
    }
}

async fn delete_conversation(
    controller: &Controller,
    config: &ControllerConfig,
    events: &mut Events,
    id: ConversationId,
) -> Flow {
    controller.press_conversation(id);
    let armed = wait_for(events, |event| {
        matches!(event, ControllerEvent::DeleteArmed(armed) if *armed == id)
    });
    let armed = select! {
        armed = armed => armed,
        _ = sleep(config.hold_duration() * 2) => false,
    };
    controller.release_conversation(id);
    if !armed {
        println!("Conversation {id} can't be deleted now.");
        return Flow::Continue;
    }

    let Some(answer) = prompt(&format!("Delete conversation {id}? [y/N]: ")).await
    else {
        return Flow::Quit;
    };
    if !answer.eq_ignore_ascii_case("y") {
        controller.cancel_delete(id);
        return Flow::Continue;
    }

    controller.confirm_delete(id);
    wait_for(events, |event| {
        matches!(
            event,
            ControllerEvent::ConversationListChanged(_) | ControllerEvent::Notice(_)
        )
    })
    .await;
    Flow::Continue
}

async fn upload_documents(controller: &Controller, pattern: &str) {
    let paths = match files::uploads_matching(pattern) {
        Ok(paths) => paths,
        Err(err) => {
            println!("{}", err.bright_red());
            return;
        }
    };
    if paths.is_empty() {
        println!("No files match {pattern}.");
        return;
    }

    for path in paths {
        let upload = match files::read_upload(&path) {
            Ok(upload) => upload,
            Err(err) => {
                println!("{}", format!("{}: {err}", path.display()).bright_red());
                continue;
            }
        };
        match controller.upload_document(upload).await {
            Ok(document) => println!(
                "Uploaded {} as document {} ({} chunks).",
                document.filename, document.id, document.chunk_count
            ),
            Err(err) => {
                print!("{}: ", path.display());
                print_error(&err);
            }
        }
    }
}

async fn show_stats(controller: &Controller, days: Option<u32>) {
    match controller.analytics_overview().await {
        Ok(overview) => {
            println!("Queries:       {}", overview.total_queries);
            println!("Documents:     {}", overview.total_documents);
            println!("Avg response:  {:.2}s", overview.avg_response_time);
            println!("Tokens used:   {}", overview.total_tokens_used);
            println!("Cost:          ${:.4}", overview.total_cost);
        }
        Err(err) => {
            print_error(&err);
            return;
        }
    }
    match controller.analytics_usage(days).await {
        Ok(usage) => {
            for day in usage {
                println!(
                    "  {}  {:>5} queries  {:>8} tokens",
                    day.date, day.queries, day.tokens
                );
            }
        }
        Err(err) => print_error(&err),
    }
}

/// Waits until an event satisfies `done`, printing the events seen.
///
/// Returns `false` on timeout or when the controller is gone.
async fn wait_for(
    events: &mut Events,
    mut done: impl FnMut(&ControllerEvent) -> bool,
) -> bool {
    let mut deadline = pin!(sleep(WAIT_TIMEOUT));
    loop {
        let event = select! {
            event = events.recv() => event,
            _ = &mut deadline => return false,
        };
        let Some(event) = event else {
            return false;
        };
        print_event(&event);
        if done(&event) {
            return true;
        }
    }
}

fn drain(events: &mut Events) {
    while let Ok(event) = events.try_recv() {
        print_event(&event);
    }
}

fn print_event(event: &ControllerEvent) {
    match event {
        ControllerEvent::Notice(err) => print_error(err),
        ControllerEvent::SessionChanged(Some(identity)) => {
            print_identity(identity)
        }
        ControllerEvent::SessionChanged(None) => {
            println!("{}Logged out.", BAR_CHAR.bright_yellow());
        }
        ControllerEvent::DeleteArmed(id) => {
            println!(
                "{}Conversation {id} armed for deletion.",
                BAR_CHAR.bright_yellow()
            );
        }
        _ => {}
    }
}

fn print_conversation(conversation: &Conversation) {
    println!("{}", conversation.title().bold());
    for message in conversation.messages() {
        match message.role {
            Role::User => {
                println!("{}👤 {}", BAR_CHAR.bright_green(), message.content)
            }
            Role::Assistant => println!(
                "{}🤖 {}",
                BAR_CHAR.bright_cyan(),
                message.content.bright_white()
            ),
        }
    }
}

fn print_identity(identity: &Identity) {
    println!(
        "{}Logged in as {} <{}>.",
        BAR_CHAR.bright_green(),
        identity.display_name().bold(),
        identity.email
    );
}

fn print_error(err: &docchat::core::Error) {
    println!("{}{}", BAR_CHAR.bright_red(), err.bright_red());
}

fn parse_id(id: &str) -> Option<u64> {
    let id = id.parse().ok();
    if id.is_none() {
        println!("{}", "expected a numeric id".bright_red());
    }
    id
}

async fn prompt(label: &str) -> Option<String> {
    print!("{label}");
    std::io::stdout().flush().ok();
    read_line().await.map(|line| line.trim().to_owned())
}

async fn read_line() -> Option<String> {
    let mut stdin = io::BufReader::new(io::stdin());
    let mut line = String::new();

    match stdin.read_line(&mut line).await {
        Ok(count) => {
            if count == 0 {
                return None;
            }
            Some(line)
        }
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}
