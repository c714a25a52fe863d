use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "csao-server")]
#[command(about = "Cart add-on recommendation server", long_about = None)]
struct Args {
    #[arg(short, long, default_value = "csao-server.yaml")]
    config: String,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Seed the store with the sample menu and exit
    #[arg(long)]
    init_db: bool,
}

fn init_tracing(debug: bool, json: bool) {
    let default_filter = if debug {
        "csao_rs=debug,tower_http=debug"
    } else {
        "csao_rs=info,tower_http=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_tracing(args.debug, args.json_logs);

    if args.init_db {
        match csao_rs::init_db(&args.config).await {
            Ok(n) => println!("Inserted {} menu items", n),
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    if let Err(e) = csao_rs::run(&args.config, args.debug).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
