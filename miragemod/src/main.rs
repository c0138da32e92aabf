use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

use miragemod::config::Args;
use miragemod::dispatcher::Dispatcher;
use miragemod_kilovolt::{ClientOptions, KilovoltClient};

fn init_tracing() {
    let filter = EnvFilter::from_default_env()
        .add_directive("miragemod=info".parse().unwrap_or_default());
    let sub = fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(sub)
        .expect("Failed to set global subscriber");
}

#[tokio::main]
async fn main() {
    init_tracing();
    let args = Args::parse();

    let options = ClientOptions {
        auth_token: (!args.auth.is_empty()).then(|| args.auth.clone()),
        password: (!args.password.is_empty()).then(|| args.password.clone()),
    };

    let client = match KilovoltClient::connect(&args.endpoint, options).await {
        Ok(c) => c,
        Err(e) => {
            error!("Connection to kilovolt failed: {}", e);
            std::process::exit(1);
        }
    };
    info!("Connected to Kilovolt at {}", args.endpoint);

    let dispatcher = match Dispatcher::start(client, &args).await {
        Ok(d) => d,
        Err(e) => {
            error!("Startup failed: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = dispatcher.run().await {
        error!("Dispatcher stopped: {}", e);
        std::process::exit(1);
    }
}
