pub mod agent;
pub mod cli;
pub mod history;
pub mod llm;
pub mod models;
pub mod repl;
pub mod server;
pub mod session;

use agent::ChatAgent;
use cli::{ Args, RunMode };
use log::info;
use server::Server;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Run Mode: {:?}", args.mode);
    info!("Chat LLM Type: {}", args.chat_llm_type);
    info!("Chat Model: {}", args.chat_model.as_deref().unwrap_or("adapter default"));
    info!("Chat Max Tokens: {}", args.chat_max_tokens);
    info!("History Context Length: {}", args.history_context_len);
    info!("Search Default Limit: {}", args.search_default_limit);
    if args.mode == RunMode::Server {
        info!("Server Address: {}", args.server_addr);
        match args.http_port {
            Some(port) => info!("HTTP API Port: {}", port),
            None => info!("HTTP API: disabled"),
        }
        info!("TLS Enabled: {}", args.enable_tls);
    }
    info!("-------------------------");

    let agent = Arc::new(ChatAgent::from_args(&args)?);

    match args.mode {
        RunMode::Server => {
            let server = Server::new(agent, args.clone());
            server.run().await?;
        }
        RunMode::Repl => {
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            repl::run_repl(agent, stdin, tokio::io::stdout(), args.search_default_limit).await?;
        }
    }

    Ok(())
}
