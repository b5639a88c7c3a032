use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use pos_backoffice::{
    auth::{CreateUserRequest, Role},
    config::{self, AppConfig},
    db,
    entities::user,
    services::{audit::RequestContext, end_day::RunEndDayRequest},
    AppState,
};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::Serialize;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config().context("failed to load configuration")?;
    config::init_tracing(cfg.log_level(), cfg.log_json);

    let context = CliContext::initialize(cfg).await?;

    match cli.command {
        Commands::Migrate => {
            db::run_migrations(&context.state.db).await?;
            println!("Migrations applied");
        }
        Commands::SeedSettings => {
            let seeded = context.state.services.settings.ensure_defaults().await?;
            println!("Seeded {} default setting(s)", seeded);
        }
        Commands::Settings => {
            let settings = context.state.services.settings.list(None).await?;
            if cli.json {
                print_json(&settings)?;
            } else {
                for setting in settings {
                    println!("{:<28} {}", setting.setting_key, setting.setting_value);
                }
            }
        }
        Commands::CreateUser(args) => handle_create_user(&context, args, cli.json).await?,
        Commands::IssueToken(args) => handle_issue_token(&context, args, cli.json).await?,
        Commands::EndDay(args) => handle_end_day(&context, args, cli.json).await?,
    }

    Ok(())
}

#[derive(Parser)]
#[command(name = "pos-cli", about = "POS back office administration", version)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON when available"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Insert any missing default settings
    SeedSettings,
    /// Print every stored setting
    Settings,
    /// Create a back-office user
    CreateUser(CreateUserArgs),
    /// Mint an access token for an existing user
    IssueToken(IssueTokenArgs),
    /// Close the open sales period
    EndDay(EndDayArgs),
}

#[derive(Args)]
struct CreateUserArgs {
    #[arg(long)]
    username: String,
    #[arg(long)]
    password: String,
    /// admin, branch_manager or cashier
    #[arg(long, default_value = "cashier")]
    role: Role,
    #[arg(long)]
    full_name: Option<String>,
}

#[derive(Args)]
struct IssueTokenArgs {
    #[arg(long)]
    username: String,
}

#[derive(Args)]
struct EndDayArgs {
    #[arg(long)]
    notes: Option<String>,
    /// Only print the open period's totals
    #[arg(long, action = ArgAction::SetTrue)]
    preview: bool,
}

struct CliContext {
    state: AppState,
}

impl CliContext {
    async fn initialize(cfg: AppConfig) -> Result<Self> {
        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .context("failed to connect to the database")?;
        if cfg.auto_migrate {
            db::run_migrations(&pool).await?;
        }
        Ok(Self {
            state: AppState::new(Arc::new(pool), cfg, None),
        })
    }
}

async fn handle_create_user(context: &CliContext, args: CreateUserArgs, json: bool) -> Result<()> {
    let profile = context
        .state
        .auth
        .create_user(
            CreateUserRequest {
                username: args.username,
                password: args.password,
                full_name: args.full_name,
                role: args.role,
            },
            &RequestContext::system(),
        )
        .await
        .context("failed to create user")?;

    if json {
        print_json(&profile)?;
    } else {
        println!("Created {} '{}' (id {})", profile.role, profile.username, profile.id);
    }
    Ok(())
}

async fn handle_issue_token(context: &CliContext, args: IssueTokenArgs, json: bool) -> Result<()> {
    let found = user::Entity::find()
        .filter(user::Column::Username.eq(args.username.trim()))
        .one(&*context.state.db)
        .await?
        .ok_or_else(|| anyhow!("no user named '{}'", args.username))?;
    if !found.is_active {
        return Err(anyhow!("user '{}' is disabled", found.username));
    }

    let token = context.state.auth.issue_token(&found)?;
    if json {
        print_json(&token)?;
    } else {
        println!("{}", token.access_token);
    }
    Ok(())
}

async fn handle_end_day(context: &CliContext, args: EndDayArgs, json: bool) -> Result<()> {
    let end_day = &context.state.services.end_day;

    if args.preview {
        let totals = end_day.current().await?;
        if json {
            print_json(&totals)?;
        } else {
            println!(
                "{} orders since {}: gross {} net {}",
                totals.order_count, totals.period_start, totals.gross_sales, totals.net_total
            );
        }
        return Ok(());
    }

    let record = end_day
        .run(RunEndDayRequest { notes: args.notes }, &RequestContext::system())
        .await
        .context("failed to run End Day")?;
    if json {
        print_json(&record)?;
    } else {
        println!("End Day {} recorded at {}", record.end_day.id, record.end_day.end_date);
        if let Some(summary) = record.summary {
            println!(
                "{} orders, gross {}, net {}",
                summary.order_count, summary.gross_sales, summary.net_total
            );
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
