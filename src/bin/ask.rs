use std::io::{self, BufRead, Write};

use clap::{Parser, ValueEnum};
use insighter::consumer::{ClientError, Conversation, RelayClient, StreamOutcome, Turn};
use insighter::markup::{HtmlRenderer, Render, TerminalRenderer, parse_document};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("no query given; pass one as arguments or use --interactive")]
    MissingQuery,
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("terminal i/o failed: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    /// Print fragments as they arrive.
    Raw,
    /// Render the finished answer with terminal styling.
    Terminal,
    /// Render the finished answer as an HTML fragment.
    Html,
}

#[derive(Parser, Debug)]
#[command(name = "ask", about = "Ask a running insighter relay a research question")]
struct Cli {
    #[arg(long, env = "INSIGHTER_BASE_URL", default_value = "http://127.0.0.1:3000")]
    base_url: String,

    /// Keep the conversation open and read follow-up questions from stdin.
    #[arg(short, long)]
    interactive: bool,

    #[arg(long, value_enum, default_value_t = Format::Raw)]
    format: Format,

    /// Disable ANSI styling in terminal output.
    #[arg(long)]
    no_color: bool,

    /// The question; words are joined with spaces.
    query: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt().with_writer(io::stderr).init();
    let cli = Cli::parse();
    let client = RelayClient::new(&cli.base_url)?;
    tracing::debug!(endpoint = client.endpoint(), "relay client ready");
    let mut conversation = Conversation::new();

    let first = cli.query.join(" ");
    if first.trim().is_empty() && !cli.interactive {
        return Err(CliError::MissingQuery);
    }
    if !first.trim().is_empty() {
        let result = ask_once(&client, &mut conversation, &first, &cli).await;
        if !cli.interactive {
            return result;
        }
        report(result);
    }

    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let query = line.trim();
        if query.is_empty() {
            break;
        }
        report(ask_once(&client, &mut conversation, query, &cli).await);
    }
    Ok(())
}

fn report(result: Result<(), CliError>) {
    if let Err(e) = result {
        eprintln!("error: {e}");
    }
}

async fn ask_once(client: &RelayClient, conversation: &mut Conversation, query: &str, cli: &Cli) -> Result<(), CliError> {
    let mut printed = 0;
    let streaming = cli.format == Format::Raw;
    let outcome = client
        .ask(conversation, query, |turn| {
            if streaming && turn.text.len() > printed {
                print!("{}", &turn.text[printed..]);
                let _ = io::stdout().flush();
                printed = turn.text.len();
            }
        })
        .await?;

    let Some(turn) = conversation.turns().last() else {
        return Ok(());
    };
    let doc = parse_document(&turn.text);
    match cli.format {
        Format::Raw => println!(),
        Format::Terminal => print!("{}", TerminalRenderer { ansi: !cli.no_color }.render(&doc)),
        Format::Html => println!("{}", HtmlRenderer.render(&doc)),
    }
    print_sources(turn, &doc.citations());

    match outcome {
        StreamOutcome::Completed => {}
        StreamOutcome::Failed => eprintln!("(the answer was cut short by a provider error)"),
        StreamOutcome::Truncated => eprintln!("(the answer ended without a completion marker)"),
    }
    Ok(())
}

fn print_sources(turn: &Turn, cited: &[u32]) {
    let Some(sources) = turn.sources.as_deref().filter(|s| !s.is_empty()) else {
        return;
    };
    println!("\nSources:");
    for source in sources {
        let mark = match source.id.parse::<u32>() {
            Ok(id) if cited.contains(&id) => '*',
            _ => ' ',
        };
        println!("{mark}[{}] {} ({}, {})", source.id, source.title, source.domain, source.date);
        println!("     {}", source.url);
    }
}
