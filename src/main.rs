/// Wayfare ledger service entry point
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wayfare::{config::ServerConfig, context::AppContext, error::CommerceResult, server};

#[tokio::main]
async fn main() -> CommerceResult<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wayfare=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    print_banner();

    // Load configuration
    let config = ServerConfig::from_env()?;

    // Create application context
    let ctx = AppContext::new(config).await?;
    let ctx = Arc::new(ctx);

    // Start server
    server::serve((*ctx).clone()).await?;

    Ok(())
}

fn print_banner() {
    println!(
        r#"
 _      __            ____
| | /| / /___ _ __ __/ __/___ _ ____ ___
| |/ |/ // _ `// // / /_ / _ `// __// -_)
|__/|__/ \_,_/ \_, /_/   \_,_//_/   \__/
              /___/

        Purchase & Entitlement Ledger v{}
        "#,
        env!("CARGO_PKG_VERSION")
    );
}
