use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::RwLock;

use avatar_assist::auth::AuthClient;
use avatar_assist::bootstrap::Bootstrapper;
use avatar_assist::cache::FileCache;
use avatar_assist::config::ClientConfig;
use avatar_assist::knowledge::{KnowledgeClient, KnowledgeProfile, KnowledgeResolver};
use avatar_assist::roster::Roster;
use avatar_assist::session::{HttpTransportFactory, SessionController, SessionState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = ClientConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export AVATAR_CLIENT_ID=...");
        eprintln!("  export AVATAR_CLIENT_SECRET=...");
        eprintln!("  export AVATAR_ID=...");
        eprintln!("  export AVATAR_VOICE_ID=...");
        std::process::exit(1);
    });

    eprintln!("🗣  Avatar Assist v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Avatar: {}", config.avatar_id);
    eprintln!("   Voice:  {}", config.voice_id);
    eprintln!("   API:    {}", config.api_base);
    eprintln!("   /start to connect, /stop to disconnect, /quit to exit.");
    eprintln!("   Anything else is sent to the avatar while streaming.\n");

    let http = config.http_client();

    let cache = Arc::new(FileCache::open(config.data_dir.join("kb-cache.json")).await?);
    let roster = Arc::new(RwLock::new(Roster::new()));
    let resolver = Arc::new(KnowledgeResolver::new(
        cache,
        roster,
        Arc::new(KnowledgeClient::new(http.clone(), &config.api_base)),
        KnowledgeProfile::default(),
    ));

    let auth = Arc::new(AuthClient::new(
        http.clone(),
        config.auth_url.clone(),
        config.client_id.clone(),
        config.client_secret.clone(),
    ));
    let transports = Arc::new(HttpTransportFactory::new(http, config.api_base.clone()));
    let controller = SessionController::new();

    let bootstrapper = Bootstrapper::new(config, auth, resolver, transports, controller.clone());

    let stdin = tokio::io::stdin();
    let reader = BufReader::new(stdin);
    let mut lines = reader.lines();

    eprint!("> ");
    loop {
        let Ok(Some(line)) = lines.next_line().await else {
            break; // EOF
        };
        let line = line.trim();

        match line {
            "" => {}
            "/quit" => {
                controller.stop().await;
                break;
            }
            "/stop" => {
                controller.stop().await;
                eprintln!("⏹  Session stopped");
            }
            "/start" => match bootstrapper.run().await {
                Ok(()) => {
                    if let Some(url) = controller.stream_url().await {
                        eprintln!("▶  Streaming: {url}");
                    } else {
                        eprintln!("⏳ Connecting ({})", controller.state().await);
                    }
                }
                Err(e) => eprintln!("❌ Start failed: {e}"),
            },
            text => {
                if let Err(e) = controller.send_message(text).await {
                    if controller.state().await == SessionState::Idle {
                        eprintln!("ℹ️  No session. /start first.");
                    } else {
                        eprintln!("ℹ️  Cannot send right now: {e}");
                    }
                }
            }
        }
        eprint!("> ");
    }

    Ok(())
}
