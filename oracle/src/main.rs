//! Story oracle command line.
//!
//! Consult the oracle tables, turn the draw into a conflict map, or write a
//! new oracle. Without a subcommand, reads `#` commands from stdin:
//!
//! ```bash
//! cargo run -p oracle -- run 4
//! echo "#oracle 6" | cargo run -p oracle
//! ```

mod commands;

use commands::Command;
use oracle_core::OracleSession;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    let command = match commands::parse_args(&args) {
        Ok(command) => command,
        Err(usage) => {
            eprintln!("Error: {usage}");
            eprintln!("Run with --help for usage.");
            std::process::exit(2);
        }
    };

    let config = match commands::load_config(|key| std::env::var(key).ok()) {
        Ok(config) => config,
        Err(message) => {
            eprintln!("{message}");
            std::process::exit(2);
        }
    };
    tracing::debug!(?config, "loaded configuration");
    let mut session = OracleSession::new(config);

    match command {
        None => commands::run_interactive(&mut session).await,
        Some(Command::Help) => print_help(),
        Some(Command::Quit) => {}
        Some(command) => match commands::execute(&mut session, command).await {
            Ok(output) => println!("{output}"),
            Err(e) => {
                eprintln!("{e}");
                std::process::exit(1);
            }
        },
    }

    Ok(())
}

fn print_help() {
    println!("Story oracle - tables, protagonists and conflicts");
    println!();
    println!("USAGE:");
    println!("  oracle [COMMAND]");
    println!();
    println!("COMMANDS:");
    println!("  consult [n]    Draw n elements from the oracle tables (default 4)");
    println!("  run [n]        Draw n elements, build a conflict map and save it");
    println!("  write [tone]   Generate new oracle tables in the given tone");
    println!("  (none)         Read #commands from stdin, see #help");
    println!();
    println!("ENVIRONMENT:");
    println!("  ORACLE_PROVIDER      openai (default) or gemini");
    println!("  OPENAI_API_KEY       Key for the openai provider");
    println!("  GEMINI_API_KEY       Key for the gemini provider");
    println!("  ORACLE_MODEL         Model name override");
    println!("  ORACLE_BASE_URL      API endpoint override");
    println!("  ORACLE_TABLE_PATH    Table file (default oracle/oracle.json)");
    println!("  ORACLE_OUTPUT_DIR    Where results are saved (default oracle)");
    println!("  ORACLE_TIMEOUT_SECS  Per-request timeout (default 120)");
    println!("  ORACLE_TONE          Tone for #write when none is given");
    println!("  RUST_LOG             Log filter (default info)");
}
