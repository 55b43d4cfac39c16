//! storefront-chat console client.
//!
//! Connects to the storefront backend as the user named by `CHAT_USER_ID`
//! and `CHAT_USER_ROLE`, prints live messages as they arrive and reads
//! commands from stdin.

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use storefront_chat::api::HttpChatBackend;
use storefront_chat::config::ChatClientConfig;
use storefront_chat::domain::{ConversationId, Identity, UserRole};
use storefront_chat::service::{ChatClient, LiveOutcome, LiveUpdate, StatusFilter};

const HELP: &str = "commands: /list  /open <id>  /search <term>  /filter <active|waiting|closed|all>  \
/start  /end  /reconnect  /quit  (anything else is sent as a message)";

type Client = ChatClient<HttpChatBackend>;

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = ChatClientConfig::from_env()?;
    let identity = identity_from_env()?;
    tracing::info!(
        api = %config.api_base_url,
        socket = %config.socket_url,
        user_id = %identity.user_id,
        role = %identity.role,
        "starting storefront-chat"
    );

    let backend = HttpChatBackend::new(&config)?;
    let mut client = ChatClient::from_config(identity, backend, &config);

    if let Err(err) = client.connect().await {
        tracing::warn!(error = %err, "live channel unavailable; use /reconnect");
    }
    match client.refresh_conversations().await {
        Ok(_) => print_conversations(&client),
        Err(err) => println!("! {}", err.user_message()),
    }
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("reading stdin")? else {
                    break;
                };
                if handle_line(&mut client, line.trim()).await == Flow::Quit {
                    break;
                }
            }
            update = client.next_live_update() => match update {
                Some(update) => print_update(&update),
                None => break,
            },
        }
    }

    client.logout().await;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn identity_from_env() -> anyhow::Result<Identity> {
    let user_id = std::env::var("CHAT_USER_ID").context("CHAT_USER_ID must be set")?;
    let role = match std::env::var("CHAT_USER_ROLE") {
        Ok(raw) => UserRole::parse(&raw)
            .with_context(|| format!("unknown CHAT_USER_ROLE {raw:?} (user|admin|agent)"))?,
        Err(_) => UserRole::User,
    };
    Ok(Identity::new(user_id, role))
}

async fn handle_line(client: &mut Client, line: &str) -> Flow {
    if line.is_empty() {
        return Flow::Continue;
    }
    let (command, arg) = match line.split_once(' ') {
        Some((command, arg)) => (command, arg.trim()),
        None => (line, ""),
    };

    let result = match command {
        "/quit" => return Flow::Quit,
        "/help" => {
            println!("{HELP}");
            Ok(())
        }
        "/list" => client.refresh_conversations().await.map(|_| print_conversations(client)),
        "/search" => {
            client.search(arg);
            print_conversations(client);
            Ok(())
        }
        "/filter" => match StatusFilter::parse(arg) {
            Some(filter) => {
                client.filter_by_status(filter);
                print_conversations(client);
                Ok(())
            }
            None => {
                println!("! unknown status {arg:?}");
                Ok(())
            }
        },
        "/open" if !arg.is_empty() => {
            let id = ConversationId::from(arg);
            client.select_conversation(&id).await.map(|()| print_messages(client))
        }
        "/start" => client.start_conversation().await.map(|conversation| {
            println!("* conversation {} ({})", conversation.id(), conversation.status());
            print_messages(client);
        }),
        "/end" => match client.active_conversation().cloned() {
            Some(id) => client
                .end_conversation(&id)
                .await
                .map(|()| println!("* conversation {id} closed")),
            None => {
                println!("! no conversation open");
                Ok(())
            }
        },
        "/reconnect" => client.connect().await.map(|()| println!("* reconnected")),
        _ if command.starts_with('/') => {
            println!("{HELP}");
            Ok(())
        }
        _ => client.send_message(line).await.map(|_| ()),
    };

    if let Err(err) = result {
        tracing::debug!(error = %err, code = err.error_code(), "command failed");
        if !err.is_silent() {
            println!("! {}", err.user_message());
        }
    }
    Flow::Continue
}

fn print_conversations(client: &Client) {
    let visible = client.conversations();
    if visible.is_empty() {
        println!("(no conversations)");
    }
    for conversation in visible {
        let names: Vec<String> = conversation
            .participants()
            .iter()
            .map(|p| p.display_name())
            .collect();
        println!(
            "  {}  {:<7}  {}  {}",
            conversation.id(),
            conversation.status(),
            conversation.created_at().format("%Y-%m-%d %H:%M"),
            names.join(", ")
        );
    }
}

fn print_messages(client: &Client) {
    for message in client.messages() {
        println!(
            "[{}] {}: {}",
            message.timestamp().format("%H:%M"),
            message.sender().display_name(),
            message.content()
        );
    }
}

fn print_update(update: &LiveUpdate) {
    match update {
        LiveUpdate::Message {
            message,
            outcome: LiveOutcome::Appended,
        } => println!(
            "[{}] {}: {}",
            message.timestamp().format("%H:%M"),
            message.sender().display_name(),
            message.content()
        ),
        LiveUpdate::Message {
            message,
            outcome: LiveOutcome::Stashed,
        } => println!("* new message in {}", message.conversation_id()),
        LiveUpdate::Message { .. } => {}
        LiveUpdate::Connected { user_id } => println!("* connected as {user_id}"),
        LiveUpdate::Disconnected {
            reason, requested, ..
        } => {
            if !requested {
                println!("* disconnected ({reason}); type /reconnect");
            }
        }
    }
}
