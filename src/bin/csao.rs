use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use csao_rs::client::{self, ApiClient, CartSession, ClientError};
use csao_rs::config::{ClientMode, Config};
use csao_rs::db::{ItemSnapshot, LogFilter, MealTime, MenuItem, Page, UserSegment};
use csao_rs::recommend::{Context, RecommendRequest};

#[derive(Parser, Debug)]
#[command(name = "csao")]
#[command(about = "Command-line client for the cart add-on recommender", long_about = None)]
struct Args {
    /// Config file; its `client` section supplies defaults
    #[arg(short, long, default_value = "csao-server.yaml")]
    config: String,

    /// Server API base, e.g. http://localhost:8000/api
    #[arg(long)]
    base_url: Option<String>,

    /// Run against an in-process sample store instead of a server
    #[arg(long)]
    fixture: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct ContextArgs {
    #[arg(long, default_value = "dinner")]
    meal_time: MealTime,
    #[arg(long, default_value = "indian")]
    cuisine: String,
    #[arg(long, default_value = "frequent")]
    segment: UserSegment,
    #[arg(long, default_value = "hyderabad")]
    city: String,
}

impl ContextArgs {
    fn into_context(self) -> Context {
        Context {
            meal_time: Some(self.meal_time),
            cuisine: self.cuisine,
            user_segment: Some(self.segment),
            city: self.city,
        }
    }
}

#[derive(clap::Args, Debug)]
struct FilterArgs {
    /// Only logs for this meal time
    #[arg(long)]
    meal_time: Option<MealTime>,
    /// Only logs for this user segment
    #[arg(long)]
    segment: Option<UserSegment>,
}

impl FilterArgs {
    fn into_filter(self) -> LogFilter {
        LogFilter {
            meal_time: self.meal_time,
            user_segment: self.segment,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List menu items, newest first
    Menu {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// List recommendation logs, newest first
    Logs {
        #[arg(long)]
        limit: Option<usize>,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Score a cart given by item names
    Recommend {
        #[arg(required = true)]
        items: Vec<String>,
        #[command(flatten)]
        context: ContextArgs,
    },
    /// Fill a cart by name, then accept the top suggestions one by one
    Simulate {
        #[arg(required = true)]
        items: Vec<String>,
        #[arg(long, default_value_t = 1)]
        accept: usize,
        #[command(flatten)]
        context: ContextArgs,
    },
    /// Acceptance and AOV figures
    Stats {
        #[command(flatten)]
        filter: FilterArgs,
    },
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("Error: {}", e),
    }
}

fn lookup(menu: &[MenuItem], names: &[String]) -> Result<Vec<ItemSnapshot>, ClientError> {
    names
        .iter()
        .map(|name| {
            menu.iter()
                .find(|i| i.name.eq_ignore_ascii_case(name))
                .map(ItemSnapshot::from)
                .ok_or_else(|| ClientError::NotFound(format!("No menu item named {}", name)))
        })
        .collect()
}

async fn execute(client: Arc<dyn ApiClient>, command: Command) -> Result<(), ClientError> {
    match command {
        Command::Menu { limit } => {
            let items = client.list_menu_items(Page { skip: None, limit }).await?;
            print_json(&items);
        }
        Command::Logs { limit, filter } => {
            let logs = client
                .list_logs(&filter.into_filter(), Page { skip: None, limit })
                .await?;
            print_json(&logs);
        }
        Command::Recommend { items, context } => {
            let menu = client::menu_items_or_empty(client.as_ref()).await;
            let request = RecommendRequest {
                cart_items: lookup(&menu, &items)?,
                context: context.into_context(),
                session_id: None,
            };
            print_json(&client.recommend(&request).await?);
        }
        Command::Simulate { items, accept, context } => {
            let menu = client::menu_items_or_empty(client.as_ref()).await;
            let cart = lookup(&menu, &items)?;

            let mut session = CartSession::new(client.clone(), context.into_context());
            for item in cart {
                session.add_item(item).await;
            }
            for _ in 0..accept {
                let Some(top) = session.recommendations().first().map(|r| r.item.id.clone()) else {
                    break;
                };
                session.accept_recommendation(&top).await?;
            }

            println!("session: {}", session.session_id());
            println!("cart value: {:.2}", session.total_value());
            print_json(&session.cart());
            print_json(&session.recommendations());
        }
        Command::Stats { filter } => {
            print_json(&client.stats(&filter.into_filter()).await?);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "csao_rs=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let mut client_config = match Config::load(&args.config) {
        Ok(config) => config.client,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(base_url) = args.base_url {
        client_config.base_url = base_url;
    }
    if args.fixture {
        client_config.mode = ClientMode::Fixture;
    }

    let client: Arc<dyn ApiClient> = match client::from_config(&client_config).await {
        Ok(client) => Arc::from(client),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = execute(client, args.command).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
