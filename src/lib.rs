pub mod agent;
pub mod cli;
pub mod config;
pub mod conversation;
pub mod llm;
pub mod models;
pub mod server;
pub mod widget;

use agent::ConciergeAgent;
use cli::Args;
use log::info;
use server::Server;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Chat LLM Type: {}", args.chat_llm_type);
    info!("Chat Model: {}", args.chat_model.as_deref().unwrap_or("adapter default"));
    info!("Knowledge Path: {}", args.knowledge_path);
    info!("Prompt Template: {}", args.prompt_template_path.as_deref().unwrap_or("built-in"));
    info!("Clinic: {} ({})", args.clinic_name, args.site_url);
    info!("Rate Limit: {}/s", args.rate_limit_per_second);
    info!("TLS Enabled: {}", args.enable_tls);
    info!("-------------------------");

    let agent = Arc::new(ConciergeAgent::new(&args)?);
    info!("Starting server on: {}", args.server_addr);
    let server = Server::new(agent, args);
    server.run().await?;

    Ok(())
}
