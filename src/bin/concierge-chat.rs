use clap::Parser;
use clinic_concierge::models::chat::Role;
use clinic_concierge::widget::{ markdown_to_html, ChatSession, HttpTransport, SubmitOutcome };
use dotenv::dotenv;
use log::info;
use std::error::Error;
use tokio::io::{ AsyncBufReadExt, AsyncWriteExt, BufReader };

/// Terminal front end for the concierge widget.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
struct ChatArgs {
    /// Base URL of the concierge server.
    #[arg(long, env = "CONCIERGE_URL", default_value = "http://127.0.0.1:4000")]
    server_url: String,

    /// Clinic name shown in the greeting.
    #[arg(long, env = "CLINIC_NAME", default_value = "エルムクリニック")]
    clinic_name: String,

    /// Print replies as rendered HTML instead of markdown.
    #[arg(long, default_value = "false")]
    html: bool,
}

fn print_reply(content: &str, html: bool) {
    if html {
        println!("{}", markdown_to_html(content));
    } else {
        println!("{}\n", content);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = ChatArgs::parse();

    let transport = HttpTransport::new(&args.server_url)?;
    info!("Talking to {}", transport.endpoint());
    let mut session = ChatSession::new(&args.clinic_name);
    if let Some(greeting) = session.messages().first() {
        print_reply(&greeting.content, args.html);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        if line.trim() == "/quit" {
            break;
        }

        session.set_input(line);
        match session.submit(&transport).await {
            SubmitOutcome::Ignored => continue,
            SubmitOutcome::Replied | SubmitOutcome::Failed => {
                if let Some(reply) = session.messages().last().filter(|m| m.role == Role::Assistant) {
                    print_reply(&reply.content, args.html);
                }
            }
        }
    }

    Ok(())
}
