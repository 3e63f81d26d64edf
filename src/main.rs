use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use forcelink_lib::api::{payload, ApiClient, ApiError, CrmBackend};
use forcelink_lib::assistant::{Conversation, GeminiClient};
use forcelink_lib::dashboard::{self, RefreshOutcome};
use forcelink_lib::error::{CrmError, ErrorReport};
use forcelink_lib::notification::format_relative_time;
use forcelink_lib::record::RecordKind;
use forcelink_lib::search;
use forcelink_lib::state::{self, AppState};

#[derive(Parser, Debug)]
#[command(author, version, about = "ForceLink: CRM dashboard, reminders and assistant", long_about = None)]
struct Cli {
    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ~/.forcelink/config.json).
    #[arg(long, global = true)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch everything and print dashboard analytics.
    Dashboard {
        /// Keep refreshing until interrupted.
        #[arg(long)]
        watch: bool,
    },
    /// List records of one kind (leads, accounts, opportunities, tasks, notes).
    List { kind: RecordKind },
    /// Show one record's fields.
    Show { kind: RecordKind, id: String },
    /// Create a record from a JSON draft.
    Create { kind: RecordKind, draft: String },
    /// Patch a record with a JSON object.
    Update {
        kind: RecordKind,
        id: String,
        patch: String,
    },
    /// Delete a record.
    Delete { kind: RecordKind, id: String },
    /// Search records of one kind by name.
    Search { kind: RecordKind, query: String },
    /// Show stored notifications.
    Notifications {
        #[arg(long)]
        mark_read: bool,
        #[arg(long, conflicts_with = "mark_read")]
        clear: bool,
    },
    /// Ask the CRM assistant a question.
    Ask {
        #[arg(required = true, num_args = 1..)]
        prompt: Vec<String>,
    },
}

fn parse_json(raw: &str) -> Result<Value, CrmError> {
    serde_json::from_str(raw).map_err(|e| CrmError::Configuration(format!("Invalid JSON: {}", e)))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CrmError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| CrmError::Io(format!("Serialize error: {}", e)))?;
    println!("{}", text);
    Ok(())
}

async fn run(cli: Cli) -> Result<(), CrmError> {
    let config = match &cli.config {
        Some(path) => state::load_config_from(path),
        None => state::load_config(),
    }
    .map_err(CrmError::Configuration)?;

    let client = ApiClient::new(&config.backend_url, config.auth_token.clone());
    let app = Arc::new(AppState::from_config(config).map_err(CrmError::Configuration)?);

    match cli.command {
        Commands::Dashboard { watch: false } => {
            match dashboard::refresh_dashboard(&app, &client).await {
                RefreshOutcome::Applied => {
                    if let Some(data) = app.dashboard.read().as_ref() {
                        print_json(&data.analytics)?;
                    }
                }
                RefreshOutcome::Superseded => log::info!("Dashboard refresh superseded"),
                RefreshOutcome::Failed(e) => return Err(CrmError::Api(e)),
            }
        }
        Commands::Dashboard { watch: true } => {
            let shutdown = CancellationToken::new();
            let backend: Arc<dyn CrmBackend> = Arc::new(client);
            let poller = tokio::spawn(dashboard::run_dashboard_poller(
                app.clone(),
                backend,
                shutdown.clone(),
            ));

            let interval = app.config.read().poll_interval();
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    _ = tokio::time::sleep(interval) => {
                        if let Some(data) = app.dashboard.read().as_ref() {
                            let a = &data.analytics;
                            println!(
                                "{} leads, {} accounts, {} opportunities, {} pending tasks, {} notes",
                                a.total_leads, a.total_accounts, a.total_opportunities,
                                a.total_tasks, a.total_notes
                            );
                        }
                        if let Some(e) = app.last_error.read().as_ref() {
                            eprintln!("Refresh failed: {}", e);
                        }
                    }
                }
            }
            // Leaving the dashboard view: in-flight results are dropped.
            app.view_changed();
            shutdown.cancel();
            let _ = poller.await;
        }
        Commands::List { kind } => {
            let view = {
                let mut reminders = std::mem::take(&mut *app.reminders.lock());
                let view = dashboard::load_view(&client, kind, &mut reminders).await;
                *app.reminders.lock() = reminders;
                view?
            };
            if !view.reminders.is_empty() {
                app.notifications
                    .lock()
                    .add_all(view.reminders.clone())
                    .map_err(CrmError::Io)?;
            }
            print_json(&view.records)?;
        }
        Commands::Show { kind, id } => {
            let record = client.get(kind, &id).await?.ok_or_else(|| {
                CrmError::Api(ApiError::Status {
                    status: 404,
                    message: format!("{} {} not found", kind.singular(), id),
                })
            })?;
            println!("{}", search::label_for(&record));
            for (field, value) in record.display_fields() {
                match value {
                    Value::String(s) => println!("  {}: {}", field, s),
                    other => println!("  {}: {}", field, other),
                }
            }
        }
        Commands::Create { kind, draft } => {
            let body = payload::create_body(kind, parse_json(&draft)?)?;
            let created = client.create(kind, &body).await?;
            app.record_saved(kind, false).map_err(CrmError::Io)?;
            print_json(&created)?;
        }
        Commands::Update { kind, id, patch } => {
            let updated = client.update(kind, &id, &parse_json(&patch)?).await?;
            app.record_saved(kind, true).map_err(CrmError::Io)?;
            print_json(&updated)?;
        }
        Commands::Delete { kind, id } => {
            client.delete(kind, &id).await?;
            println!("Deleted {} {}", kind.singular(), id);
        }
        Commands::Search { kind, query } => {
            let records = client.list(kind).await?;
            for record in search::filter_by_name(&records, &query) {
                println!(
                    "{}\t{}",
                    record.id_str().unwrap_or("-"),
                    search::label_for(record)
                );
            }
        }
        Commands::Notifications { mark_read, clear } => {
            let mut store = app.notifications.lock();
            let now = chrono::Utc::now().timestamp_millis();
            for event in store.events() {
                println!(
                    "{} {:>9}  {}: {}",
                    if event.read { " " } else { "*" },
                    format_relative_time(event.timestamp, now),
                    event.title,
                    event.message
                );
            }
            if clear {
                store.clear().map_err(CrmError::Io)?;
            } else if mark_read {
                store.mark_all_read().map_err(CrmError::Io)?;
            }
        }
        Commands::Ask { prompt } => {
            let assistant = GeminiClient::new(app.config.read().assistant.clone());
            if !assistant.config().enabled {
                return Err(CrmError::Configuration("assistant is disabled".into()));
            }
            let mut conversation = Conversation::new();
            if let Some(reply) = conversation
                .send(&assistant, &app.assistant, &prompt.join(" "))
                .await
            {
                println!("{}", reply.text);
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let report = ErrorReport::from(&e);
            log::error!("{}", report.message);
            eprintln!("Error: {}\n{}", report.message, report.recovery_suggestion);
            ExitCode::FAILURE
        }
    }
}
