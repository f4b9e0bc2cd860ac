//! Task commands.

use anyhow::{Context, Result, bail};

use taskchat::api::{CreateTaskRequest, Task, TaskPatch, TaskQuery};

pub async fn list(config_path: &str, query: &TaskQuery) -> Result<()> {
    let client = super::connect(config_path).await?;
    let page = client
        .list_tasks(query)
        .await
        .context("Failed to list tasks")?;

    let tasks = page.tasks.unwrap_or_default();
    if tasks.is_empty() {
        println!("No tasks.");
    }
    for task in &tasks {
        print_row(task);
    }
    if let Some(total) = page.total {
        println!();
        println!("{} of {} task(s)", tasks.len(), total);
    }
    Ok(())
}

pub async fn show(config_path: &str, id: &str) -> Result<()> {
    let client = super::connect(config_path).await?;
    let single = client
        .get_task(id)
        .await
        .with_context(|| format!("Failed to get task '{}'", id))?;

    let Some(task) = single.task else {
        bail!("Task '{}' not found", id);
    };
    print_detail(&task);
    Ok(())
}

pub async fn create(
    config_path: &str,
    title: String,
    description: String,
    session_id: Option<String>,
) -> Result<()> {
    let client = super::connect(config_path).await?;
    let request = CreateTaskRequest {
        title,
        description,
        session_id,
    };
    let reply = client
        .create_task(&request)
        .await
        .context("Failed to create task")?;

    match reply.task {
        Some(task) => {
            println!("Created:");
            print_detail(&task);
        }
        None => println!("Created."),
    }
    Ok(())
}

pub async fn update(config_path: &str, id: &str, patch: &TaskPatch) -> Result<()> {
    if patch.is_empty() {
        bail!("Nothing to update; pass at least one field");
    }
    let client = super::connect(config_path).await?;
    let reply = client
        .update_task(id, patch)
        .await
        .with_context(|| format!("Failed to update task '{}'", id))?;

    match reply.task {
        Some(task) => print_detail(&task),
        None => println!("Updated."),
    }
    Ok(())
}

pub async fn delete(config_path: &str, id: &str) -> Result<()> {
    let client = super::connect(config_path).await?;
    let ack = client
        .delete_task(id)
        .await
        .with_context(|| format!("Failed to delete task '{}'", id))?;

    println!("{}", ack.message.as_deref().unwrap_or("Deleted."));
    Ok(())
}

fn print_row(task: &Task) {
    println!(
        "{:<12} {:<10} {}",
        task.id.as_deref().unwrap_or("-"),
        task.status,
        task.title
    );
}

fn print_detail(task: &Task) {
    println!("id:          {}", task.id.as_deref().unwrap_or("-"));
    println!("title:       {}", task.title);
    println!("status:      {}", task.status);
    if !task.description.is_empty() {
        println!("description: {}", task.description);
    }
    if let Some(session) = &task.session_id {
        println!("session:     {}", session);
    }
    if let Some(due) = &task.due_date {
        println!("due:         {}", due);
    }
    if let Some(decision) = &task.decision {
        println!("decision:    {}", decision);
    }
    if task.ai_suggested {
        println!("suggested by assistant");
    }
}
