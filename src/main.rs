//! # Project Resolver CLI (`projres`)
//!
//! Every command prints JSON on stdout; logs go to stderr (see
//! `PROJRES_LOG`).
//!
//! ## Usage
//!
//! ```bash
//! projres --config ./config/projres.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `projres init` | Create the registry file with the default categories |
//! | `projres resolve "<text>"` | Resolve project mentions in a text |
//! | `projres parse-report` | Split a report into per-project work items |
//! | `projres suggest project\|sub-item` | Suggest a name for review |
//! | `projres pending ...` | List, approve, merge, or reject pending mentions |
//! | `projres rejected ...` | List or remove rejected names |
//! | `projres project ...` | Administer projects |
//! | `projres sub-item ...` | Administer sub-items |
//! | `projres category ...` | Administer categories |
//! | `projres embed rebuild` | Embed missing names and aliases |
//! | `projres serve` | Start the HTTP API |

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use project_resolver::config::load_config;
use project_resolver::context::ResolverContext;
use project_resolver::logging::init_tracing;
use project_resolver::server::run_server;
use project_resolver_core::registry::{ProjectUpdate, SubItemUpdate};
use project_resolver_core::{Project, ProjectStatus};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

/// Project Resolver: binds project mentions in work reports to canonical
/// projects.
#[derive(Parser)]
#[command(name = "projres", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/projres.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the registry file if it does not exist.
    Init,

    /// Resolve the project mentions in a text.
    ///
    /// Learned aliases, rejections, and new pending mentions are saved.
    Resolve {
        /// Text to resolve.
        text: Option<String>,

        /// Read the text from a file instead.
        #[arg(long, conflicts_with = "text")]
        file: Option<PathBuf>,
    },

    /// Parse a weekly report into per-project work items.
    ParseReport {
        #[arg(long)]
        this_week: Option<String>,
        #[arg(long)]
        next_week: Option<String>,
    },

    /// Suggest a project or sub-item for review.
    Suggest {
        #[command(subcommand)]
        action: SuggestAction,
    },

    /// Review queue.
    Pending {
        #[command(subcommand)]
        action: PendingAction,
    },

    /// Names permanently treated as "not a project".
    Rejected {
        #[command(subcommand)]
        action: RejectedAction,
    },

    /// Project administration.
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },

    /// Sub-item administration.
    SubItem {
        #[command(subcommand)]
        action: SubItemAction,
    },

    /// Category administration.
    Category {
        #[command(subcommand)]
        action: CategoryAction,
    },

    /// Embedding cache management.
    Embed {
        #[command(subcommand)]
        action: EmbedAction,
    },

    /// Start the HTTP API on `server.bind`.
    Serve,
}

#[derive(Subcommand)]
enum SuggestAction {
    /// Suggest a new project.
    Project {
        name: String,
        /// Who is suggesting it.
        #[arg(long)]
        by: Option<String>,
    },
    /// Suggest a new sub-item of an existing project.
    SubItem {
        parent: String,
        name: String,
        #[arg(long)]
        by: Option<String>,
    },
}

#[derive(Subcommand)]
enum PendingAction {
    /// List pending mentions and sub-item suggestions.
    List,
    /// Turn a pending mention into a project.
    Approve {
        name: String,
        /// Category for the new project; defaults to the suggested one.
        #[arg(long)]
        category: Option<String>,
    },
    /// Make a pending mention an alias of an existing project.
    Merge { name: String, target: String },
    /// Reject a pending mention for good.
    Reject { name: String },
    /// Add a suggested sub-item to its project.
    ApproveSubItem { parent: String, name: String },
    /// Drop a suggested sub-item.
    RejectSubItem { parent: String, name: String },
}

#[derive(Subcommand)]
enum RejectedAction {
    List,
    /// Remove a name from the rejected list.
    Remove { name: String },
}

#[derive(Subcommand)]
enum ProjectAction {
    /// List projects (active only unless `--all`).
    List {
        #[arg(long)]
        all: bool,
    },
    Show {
        name: String,
    },
    Create {
        name: String,
        #[arg(long, default_value = "Other")]
        category: String,
        /// Alias; repeat for several.
        #[arg(long = "alias")]
        aliases: Vec<String>,
        #[arg(long, default_value = "")]
        description: String,
    },
    Update {
        name: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        category: Option<String>,
        /// `active` or `archived`.
        #[arg(long)]
        status: Option<String>,
        /// Replace all aliases (comma-separated).
        #[arg(long, value_delimiter = ',')]
        aliases: Option<Vec<String>>,
    },
    Rename {
        name: String,
        new_name: String,
    },
    Delete {
        name: String,
    },
    /// Add an alias to a project.
    Alias {
        name: String,
        alias: String,
    },
}

#[derive(Subcommand)]
enum SubItemAction {
    Add {
        project: String,
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    Remove {
        project: String,
        name: String,
    },
    Update {
        project: String,
        name: String,
        /// New sub-item name.
        #[arg(long)]
        new_name: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
}

#[derive(Subcommand)]
enum CategoryAction {
    List,
    Add { name: String },
    Remove { name: String },
}

#[derive(Subcommand)]
enum EmbedAction {
    /// Embed every active name and alias not yet cached.
    Rebuild {
        /// Discard the cache and embed everything again.
        #[arg(long)]
        force: bool,
    },
}

#[derive(Serialize)]
struct Ack {
    ok: bool,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_ack() -> Result<()> {
    print_json(&Ack { ok: true })
}

fn parse_status(status: &str) -> Result<ProjectStatus> {
    match status {
        "active" => Ok(ProjectStatus::Active),
        "archived" => Ok(ProjectStatus::Archived),
        other => bail!("Unknown status: '{}'. Must be active or archived.", other),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    let ctx = Arc::new(ResolverContext::from_config(config));

    match cli.command {
        Commands::Init => {
            let created = ctx.init().await?;
            #[derive(Serialize)]
            struct InitOutput {
                created: bool,
            }
            print_json(&InitOutput { created })?;
        }
        Commands::Resolve { text, file } => {
            let text = match (text, file) {
                (Some(text), _) => text,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                (None, None) => bail!("Provide the text to resolve or --file"),
            };
            print_json(&ctx.resolve_mentions(&text).await?)?;
        }
        Commands::ParseReport {
            this_week,
            next_week,
        } => {
            let parsed = ctx
                .parse_report(this_week.as_deref(), next_week.as_deref())
                .await?;
            print_json(&parsed)?;
        }
        Commands::Suggest { action } => {
            match action {
                SuggestAction::Project { name, by } => {
                    ctx.suggest_project(&name, by.as_deref()).await?
                }
                SuggestAction::SubItem { parent, name, by } => {
                    ctx.suggest_sub_item(&parent, &name, by.as_deref()).await?
                }
            }
            print_ack()?;
        }
        Commands::Pending { action } => match action {
            PendingAction::List => print_json(&ctx.pending().await?)?,
            PendingAction::Approve { name, category } => {
                ctx.approve(&name, category.as_deref()).await?;
                print_ack()?;
            }
            PendingAction::Merge { name, target } => {
                ctx.merge(&name, &target).await?;
                print_ack()?;
            }
            PendingAction::Reject { name } => {
                ctx.reject(&name).await?;
                print_ack()?;
            }
            PendingAction::ApproveSubItem { parent, name } => {
                ctx.approve_sub_item(&parent, &name).await?;
                print_ack()?;
            }
            PendingAction::RejectSubItem { parent, name } => {
                ctx.reject_sub_item(&parent, &name).await?;
                print_ack()?;
            }
        },
        Commands::Rejected { action } => match action {
            RejectedAction::List => print_json(&ctx.rejected().await?)?,
            RejectedAction::Remove { name } => {
                ctx.unreject(&name).await?;
                print_ack()?;
            }
        },
        Commands::Project { action } => match action {
            ProjectAction::List { all } => print_json(&ctx.projects(all).await?)?,
            ProjectAction::Show { name } => print_json(&ctx.project(&name).await?)?,
            ProjectAction::Create {
                name,
                category,
                aliases,
                description,
            } => {
                let mut project = Project::new(name, category).with_aliases(aliases);
                project.description = description;
                ctx.create_project(project).await?;
                print_ack()?;
            }
            ProjectAction::Update {
                name,
                description,
                category,
                status,
                aliases,
            } => {
                let update = ProjectUpdate {
                    description,
                    category,
                    status: status.as_deref().map(parse_status).transpose()?,
                    aliases,
                    sub_items: None,
                };
                print_json(&ctx.update_project(&name, update).await?)?;
            }
            ProjectAction::Rename { name, new_name } => {
                ctx.rename_project(&name, &new_name).await?;
                print_ack()?;
            }
            ProjectAction::Delete { name } => print_json(&ctx.delete_project(&name).await?)?,
            ProjectAction::Alias { name, alias } => {
                let added = ctx.add_alias(&name, &alias).await?;
                #[derive(Serialize)]
                struct AliasOutput {
                    added: bool,
                }
                print_json(&AliasOutput { added })?;
            }
        },
        Commands::SubItem { action } => match action {
            SubItemAction::Add {
                project,
                name,
                description,
            } => {
                ctx.add_sub_item(&project, &name, &description).await?;
                print_ack()?;
            }
            SubItemAction::Remove { project, name } => {
                print_json(&ctx.remove_sub_item(&project, &name).await?)?
            }
            SubItemAction::Update {
                project,
                name,
                new_name,
                description,
            } => {
                let update = SubItemUpdate {
                    name: new_name,
                    description,
                };
                ctx.update_sub_item(&project, &name, update).await?;
                print_ack()?;
            }
        },
        Commands::Category { action } => match action {
            CategoryAction::List => print_json(&ctx.categories().await?)?,
            CategoryAction::Add { name } => {
                ctx.add_category(&name).await?;
                print_ack()?;
            }
            CategoryAction::Remove { name } => {
                ctx.remove_category(&name).await?;
                print_ack()?;
            }
        },
        Commands::Embed { action } => match action {
            EmbedAction::Rebuild { force } => {
                print_json(&ctx.rebuild_embeddings(force).await?)?;
            }
        },
        Commands::Serve => run_server(ctx).await?,
    }

    Ok(())
}
