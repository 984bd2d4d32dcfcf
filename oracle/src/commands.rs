//! Command parsing, execution and the line-oriented interactive mode.

use oracle_core::{
    check_schema, OracleConfig, OracleRun, OracleSession, SessionError, DEFAULT_CONSULT_COUNT,
};
use std::io::{self, BufRead, Write};

/// A parsed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Draw elements only.
    Consult(usize),
    /// Draw, map and persist.
    Run(usize),
    /// Generate new tables, with an optional tone.
    Write(Option<String>),
    Help,
    Quit,
}

/// Parse one-shot command line arguments. `None` means interactive mode.
pub fn parse_args(args: &[String]) -> Result<Option<Command>, String> {
    let Some((name, rest)) = args.split_first() else {
        return Ok(None);
    };
    parse_words(name, &rest.iter().map(String::as_str).collect::<Vec<_>>()).map(Some)
}

/// Parse an interactive `#command` line.
pub fn parse_line(line: &str) -> Result<Command, String> {
    let Some(body) = line.trim().strip_prefix('#') else {
        return Err("Commands start with '#'. Type #help for help.".to_string());
    };
    let parts: Vec<&str> = body.split_whitespace().collect();
    match parts.split_first() {
        Some((name, rest)) => parse_words(name, rest),
        None => Err("Unknown command. Type #help for help.".to_string()),
    }
}

fn parse_words(name: &str, rest: &[&str]) -> Result<Command, String> {
    match name {
        "consult" => Ok(Command::Consult(parse_count(rest)?)),
        // The chat bot's name for a full run
        "oracle" | "run" => Ok(Command::Run(parse_count(rest)?)),
        "write" => {
            let tone = rest.join(" ");
            Ok(Command::Write((!tone.trim().is_empty()).then_some(tone)))
        }
        "help" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        other => Err(format!("Unknown command '{other}'. Type #help for help.")),
    }
}

fn parse_count(rest: &[&str]) -> Result<usize, String> {
    match rest.first() {
        None => Ok(DEFAULT_CONSULT_COUNT),
        Some(n) => n
            .parse()
            .map_err(|_| format!("'{n}' is not a number of elements")),
    }
}

/// Read the configuration through `lookup`, rendering a failure as a
/// printable message.
pub fn load_config<F>(lookup: F) -> Result<OracleConfig, String>
where
    F: Fn(&str) -> Option<String>,
{
    OracleConfig::from_lookup(lookup).map_err(|e| format!("Error: {e}"))
}

/// Run one command and render its output.
pub async fn execute(session: &mut OracleSession, command: Command) -> Result<String, SessionError> {
    match command {
        Command::Consult(count) => {
            let elements = session.consult(count).await?;
            Ok(render_elements(&elements))
        }
        Command::Run(count) => {
            let run = session.run(count).await?;
            Ok(render_run(&run))
        }
        Command::Write(tone) => {
            let tables = session.write_oracle(tone.as_deref()).await?;
            let names: Vec<&str> = tables.table_names().collect();
            Ok(format!(
                "Wrote {} tables of {} elements: {}",
                names.len(),
                tables.rows_per_table(),
                names.join(", ")
            ))
        }
        Command::Help => Ok(help_text()),
        Command::Quit => Ok(String::new()),
    }
}

fn render_elements(elements: &[String]) -> String {
    if elements.is_empty() {
        return "The oracle drew nothing.".to_string();
    }
    elements
        .iter()
        .enumerate()
        .map(|(i, element)| format!("{}. {element}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_run(run: &OracleRun) -> String {
    let mut out = String::new();
    out.push_str("Oracle elements:\n");
    out.push_str(&render_elements(&run.elements));
    out.push_str("\n\nCharacters:\n");

    let names = run.map.character_names();
    if names.is_empty() {
        out.push_str("(none)");
    } else {
        for name in names {
            out.push_str(&format!("- {name}\n"));
        }
    }

    let warnings = check_schema(&run.map);
    if !warnings.is_empty() {
        out.push_str("\nWarnings:\n");
        for warning in warnings {
            out.push_str(&format!("- {warning}\n"));
        }
    }

    out.push('\n');
    out.push_str(&run.bundle.to_string());
    out
}

fn help_text() -> String {
    [
        "[HELP]",
        "  #oracle [n]    - Draw n elements (default 4), map conflicts, save results",
        "  #consult [n]   - Draw n elements only",
        "  #write [tone]  - Generate new oracle tables",
        "  #help          - Show this help",
        "  #quit          - Exit",
    ]
    .join("\n")
}

/// Read `#` commands from stdin until EOF or `#quit`.
pub async fn run_interactive(session: &mut OracleSession) {
    println!("=== Story Oracle ===");
    println!("Tables: {}", session.config().table_path.display());
    println!("Results: {}", session.config().output_dir.display());
    println!();
    println!("{}", help_text());
    println!();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                eprintln!("Error reading input: {e}");
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let command = match parse_line(line) {
            Ok(Command::Quit) => {
                println!("Goodbye!");
                break;
            }
            Ok(command) => command,
            Err(usage) => {
                println!("[ERROR] {usage}");
                continue;
            }
        };

        print!("[PROCESSING]");
        stdout.flush().ok();

        let result = execute(session, command).await;
        print!("\r            \r");
        stdout.flush().ok();

        match result {
            Ok(output) => println!("{output}"),
            Err(e) => println!("[ERROR] {e}"),
        }
        println!();
    }
}
