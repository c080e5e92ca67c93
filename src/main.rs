use cluster_runtime::config::keys;
use cluster_runtime::config::settings::EngineConfig;
use cluster_runtime::env::create::{create_coordinator_env, create_worker_env};
use cluster_runtime::env::diagnostics::DiagnosticReport;
use cluster_runtime::env::environment;
use cluster_runtime::env::events::EventBus;
use std::net::SocketAddr;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 3 {
        eprintln!(
            "Usage: {} --role <coordinator|worker> --bind <addr:port> [options]",
            args[0]
        );
        eprintln!("Options:");
        eprintln!("  --coordinator <addr:port>   coordinator address (workers only)");
        eprintln!("  --executor-id <id>          worker identity (default: generated)");
        eprintln!("  --local                     single-machine mode");
        eprintln!("  --conf <key=value>          extra engine configuration (repeatable)");
        eprintln!();
        eprintln!("Example: {} --role coordinator --bind 127.0.0.1:7077", args[0]);
        eprintln!(
            "Example: {} --role worker --bind 127.0.0.1:0 --coordinator 127.0.0.1:7077",
            args[0]
        );

        std::process::exit(1);
    }

    let mut role: Option<String> = None;
    let mut bind_addr: Option<SocketAddr> = None;
    let mut coordinator_addr: Option<SocketAddr> = None;
    let mut executor_id: Option<String> = None;
    let mut is_local = false;
    let config = EngineConfig::new();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--role" => {
                role = Some(args[i + 1].clone());
                i += 2;
            }
            "--bind" => {
                bind_addr = Some(args[i + 1].parse()?);
                i += 2;
            }
            "--coordinator" => {
                coordinator_addr = Some(args[i + 1].parse()?);
                i += 2;
            }
            "--executor-id" => {
                executor_id = Some(args[i + 1].clone());
                i += 2;
            }
            "--local" => {
                is_local = true;
                i += 1;
            }
            "--conf" => {
                match args[i + 1].split_once('=') {
                    Some((key, value)) => config.set(key, value),
                    None => {
                        eprintln!("--conf expects key=value, got {}", args[i + 1]);
                        std::process::exit(1);
                    }
                }
                i += 2;
            }
            _ => {
                i += 1;
            }
        }
    }

    let role = role.expect("--role is required");
    let bind_addr = bind_addr.expect("--bind is required");

    tracing::info!("Starting {} node on {}", role, bind_addr);

    // 1. Build the environment for the requested role:
    let env = match role.as_str() {
        "coordinator" => {
            config.set(keys::COORDINATOR_HOST, &bind_addr.ip().to_string());
            config.set(keys::COORDINATOR_PORT, &bind_addr.port().to_string());
            create_coordinator_env(config, EventBus::new(), is_local, None).await?
        }
        "worker" => {
            let coordinator = coordinator_addr.expect("--coordinator is required for workers");
            config.set(keys::COORDINATOR_HOST, &coordinator.ip().to_string());
            config.set(keys::COORDINATOR_PORT, &coordinator.port().to_string());

            let executor_id =
                executor_id.unwrap_or_else(|| format!("exec-{}", uuid::Uuid::new_v4()));
            create_worker_env(
                config,
                &executor_id,
                &bind_addr.ip().to_string(),
                bind_addr.port(),
                is_local,
            )
            .await?
        }
        other => {
            eprintln!("Unknown role: {} (expected coordinator or worker)", other);
            std::process::exit(1);
        }
    };

    // 2. Install the process-wide handle:
    environment::set_env(env.clone());
    tracing::debug!("Environment diagnostics:\n{}", DiagnosticReport::collect(&env.config));

    // 3. Open the block store and, on the coordinator, start metrics now
    //    that the application id is known:
    let app_id = env
        .config
        .get_or(keys::APP_ID, &format!("app-{}", uuid::Uuid::new_v4()));
    env.block_manager.initialize(&app_id).await?;
    if env.role.is_coordinator {
        env.metrics.start(&app_id);
    }

    tracing::info!(
        "Node {} up (rpc port {})",
        env.role.executor_id,
        env.messaging.bound_port()
    );
    tracing::info!("Press Ctrl+C to shutdown");

    // 4. Orderly teardown on Ctrl+C:
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    env.stop().await?;
    environment::clear_env();

    Ok(())
}
