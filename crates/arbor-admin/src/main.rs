//! CLI entry point for administering an Arbor store snapshot.

use std::path::Path;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tracing_subscriber::{fmt, EnvFilter};

use arbor_core::models::{ProjectCreateRequest, SchemaReference, UserCreateRequest};
use arbor_core::{ElementId, PagingParameters, SchemaDefinition, SearchQueueBatch, StoreConfig};
use arbor_store::{LoggingIndex, SearchQueue, Store};

#[derive(Parser)]
#[command(name = "arbor-admin")]
#[command(about = "Administration tool for the Arbor object store")]
struct Cli {
    /// Config file prefix (default: arbor).
    #[arg(short, long, default_value = "arbor")]
    config: String,

    /// Act as this user instead of the configured administrator.
    #[arg(long = "as", value_name = "USERNAME")]
    as_user: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the store roots and the admin user.
    Init,
    #[command(subcommand)]
    User(UserCommand),
    #[command(subcommand)]
    Project(ProjectCommand),
    #[command(subcommand)]
    Schema(SchemaCommand),
    /// Resolve a path such as projects/<uuid>/nodes/<uuid>.
    Resolve { path: String },
}

#[derive(Subcommand)]
enum UserCommand {
    Create {
        username: String,
        #[arg(long)]
        admin: bool,
    },
}

#[derive(Subcommand)]
enum ProjectCommand {
    Create {
        name: String,
    },
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        per_page: Option<u32>,
    },
    Delete {
        id: ElementId,
    },
}

#[derive(Subcommand)]
enum SchemaCommand {
    /// Create a schema from a JSON definition file.
    Create { file: String },
    /// Append a new version to a schema.
    Append { id: ElementId, file: String },
    /// Make a schema available to a project.
    Assign { project: ElementId, schema: ElementId },
    Resolve {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        uuid: Option<ElementId>,
        #[arg(long)]
        version: Option<u32>,
        /// Resolve against the schemas of this project.
        #[arg(long)]
        project: Option<ElementId>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).json().init();

    let cli = Cli::parse();
    let config = StoreConfig::load(&cli.config)?;
    let store = Store::open(config.clone())?;
    let admin = store.bootstrap()?;
    let principal = match cli.as_user.as_deref() {
        Some(username) => store.principal(username)?,
        None => admin,
    };

    let (output, batch) = run(&store, &principal, cli.command)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    store.save()?;

    let queue = SearchQueue::spawn(Arc::new(LoggingIndex), config.search_index_prefix, 16);
    if let Some(batch) = batch {
        queue.enqueue(batch).await?;
    }
    let stats = queue.shutdown().await?;
    tracing::debug!(applied = stats.applied, failed = stats.failed, "Search operations dispatched");

    Ok(())
}

fn run(
    store: &Store,
    principal: &arbor_core::Principal,
    command: Command,
) -> anyhow::Result<(Value, Option<SearchQueueBatch>)> {
    let result = match command {
        Command::Init => (serde_json::to_value(principal)?, None),
        Command::User(UserCommand::Create { username, admin }) => {
            let created = store.create_user(principal, UserCreateRequest { username, admin })?;
            (serde_json::to_value(created.value)?, Some(created.batch))
        }
        Command::Project(ProjectCommand::Create { name }) => {
            let created = store.create_project(principal, ProjectCreateRequest { name })?;
            (serde_json::to_value(created.value)?, Some(created.batch))
        }
        Command::Project(ProjectCommand::List { page, per_page }) => {
            let paging =
                PagingParameters::new(page, per_page.unwrap_or(store.config().default_per_page));
            (serde_json::to_value(store.list_projects(principal, &paging)?)?, None)
        }
        Command::Project(ProjectCommand::Delete { id }) => {
            let batch = store.delete_project(principal, id)?;
            (json!({ "deleted": id }), Some(batch))
        }
        Command::Schema(SchemaCommand::Create { file }) => {
            let created = store.create_schema(principal, read_definition(&file)?)?;
            (serde_json::to_value(created.value)?, Some(created.batch))
        }
        Command::Schema(SchemaCommand::Append { id, file }) => {
            let created = store.append_schema_version(principal, id, read_definition(&file)?)?;
            (serde_json::to_value(created.value)?, Some(created.batch))
        }
        Command::Schema(SchemaCommand::Assign { project, schema }) => {
            let assigned = store.assign_schema(principal, project, schema)?;
            (json!({ "project": project, "schema": schema, "assigned": assigned }), None)
        }
        Command::Schema(SchemaCommand::Resolve {
            name,
            uuid,
            version,
            project,
        }) => {
            if name.is_none() && uuid.is_none() {
                anyhow::bail!("Specify --name or --uuid");
            }
            let reference = SchemaReference {
                name,
                uuid,
                version,
            };
            let resolved = store.resolve_schema(principal, project, &reference)?;
            (serde_json::to_value(resolved)?, None)
        }
        Command::Resolve { path } => (serde_json::to_value(store.resolve_path(principal, &path)?)?, None),
    };
    Ok(result)
}

fn read_definition(file: &str) -> anyhow::Result<SchemaDefinition> {
    let bytes = std::fs::read(Path::new(file))
        .map_err(|e| anyhow::anyhow!("Failed to read schema file {file}: {e}"))?;
    Ok(serde_json::from_slice(&bytes)?)
}
