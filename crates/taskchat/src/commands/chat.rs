//! Interactive chat and message history.

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use taskchat::api::{ChatReply, ChatRequest};
use taskchat::client::ClientError;
use taskchat::state::{SessionList, TaskBoard};

pub async fn run(config_path: &str, session: Option<String>, new: bool) -> Result<()> {
    let client = super::connect(config_path).await?;
    let tasks = TaskBoard::new(client.clone());
    let sessions = SessionList::new(client.clone());

    let mut session_id = session;
    let mut force_new = new;

    match &session_id {
        Some(id) if !force_new => println!("Continuing session {} (/exit to quit)", id),
        _ => println!("New chat (/exit to quit)"),
    }
    println!();

    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    let mut lines = stdin.lines();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(input) = lines.next_line().await? else {
            println!();
            break;
        };

        let input = input.trim();
        if input.is_empty() {
            continue;
        }
        if input == "/exit" || input == "/quit" {
            break;
        }

        let request = ChatRequest {
            message: input.to_string(),
            session_id: session_id.clone(),
            force_new,
        };
        let reply = match client.send_message(&request).await {
            Ok(reply) => reply,
            Err(ClientError::Cancelled) => {
                println!("\n[cancelled]");
                break;
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                continue;
            }
        };

        print_reply(&reply);
        force_new = false;

        tokio::join!(tasks.load_tasks(None), sessions.load_sessions());

        let open = tasks.tasks_by_session(Some(&reply.session_id)).len();
        let title = sessions
            .find(&reply.session_id)
            .map(|s| s.title)
            .unwrap_or_else(|| reply.session_id.clone());
        println!("[{}: {} task(s)]", title, open);
        println!();

        session_id = Some(reply.session_id);
    }

    Ok(())
}

fn print_reply(reply: &ChatReply) {
    println!();
    match &reply.ai_response {
        Some(text) => println!("{}", text),
        None => println!("(no reply)"),
    }
    if !reply.action_items.is_empty() {
        println!();
        println!("New tasks:");
        for task in &reply.action_items {
            println!("  - {}", task.title);
        }
    }
    println!();
}

pub async fn messages(config_path: &str, session_id: &str) -> Result<()> {
    let client = super::connect(config_path).await?;
    let list = client
        .list_messages(session_id)
        .await
        .with_context(|| format!("Failed to list messages of session '{}'", session_id))?;

    if list.messages.is_empty() {
        println!("No messages.");
    }
    for message in list.messages {
        let at = message.created_at.as_deref().unwrap_or("");
        println!("[{}] {} {}", message.sender, at, message.content);
    }
    Ok(())
}
