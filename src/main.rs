use saurpc::config::ServerConfig;
use saurpc::procedures::ProcedureTable;
use saurpc::server::RpcServer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match ServerConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("saurpc-server: configuration error: {e}");
            std::process::exit(1);
        }
    };

    let server = RpcServer::new(config, demo_procedures());
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Cannot listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    if let Err(e) = server.run(shutdown).await {
        tracing::error!("fatal error: {e}");
        std::process::exit(1);
    }
}

fn demo_procedures() -> ProcedureTable {
    let mut table = ProcedureTable::new();
    table
        .register("ping", || "pong")
        .register("sayHelloTo", |name: String| format!("Hello, {name}"))
        .register("add", |a: i64, b: i64| a + b)
        .register("report", |score: i64, goal: i64, message: Option<String>| {
            let message = message
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "Thank you!".to_string());
            format!("Your score: {score} of {goal} -- {message}")
        });
    table
}
