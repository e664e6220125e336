use dotenv::dotenv;
use taskflow::config::AppConfig;
use taskflow::domain::task::TaskFilter;
use taskflow::logging;
use taskflow::workspace::Workspace;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    dotenv().ok();
    let config = AppConfig::from_env()?;

    let otel_exporters = config
        .otel
        .as_ref()
        .map(logging::init_exporters)
        .transpose()?;
    logging::setup_logging_and_tracing(logging::init_env_filter(), otel_exporters);

    let workspace = Workspace::init(&config)?;
    if !workspace.is_authenticated().await {
        error!("Not signed in to the hosted backend");
        anyhow::bail!("the session is not authenticated, sign in and try again");
    }

    workspace.load_lists().await?;
    info!("Loaded {} task lists", workspace.lists().len());

    for list in workspace.lists() {
        let marker = if workspace.active_list().is_some_and(|active| active.id == list.id) {
            "*"
        } else {
            " "
        };
        println!("{marker} {} ({})", list.name, list.color);
    }

    if let Some(active) = workspace.active_list() {
        println!();
        println!(
            "{}: {} active, {} completed",
            active.name,
            workspace.count_active(),
            workspace.count_completed()
        );
        for task in workspace.visible_tasks(TaskFilter::All) {
            let check = if task.is_completed { "x" } else { " " };
            let due = task
                .due_date
                .map(|due| format!(" due {due}"))
                .unwrap_or_default();
            println!("  [{check}] {} ({}){due}", task.title, task.priority);
        }
    }

    workspace.dispose();
    Ok(())
}
