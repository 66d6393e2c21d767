use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser as ClapParser;
use env_logger::Builder;
use log::{debug, info};
use memmap2::Mmap;

use rslox as lox;

use lox::ast_printer::AstPrinter;
use lox::error::LoxError;
use lox::interpreter::Interpreter;
use lox::parser::{ExprId, Parser};
use lox::resolver::Resolver;
use lox::scanner::Scanner;
use lox::token::Token;

#[derive(ClapParser, Debug)]
#[command(version, about = "Lox language interpreter", long_about = None)]
pub struct Cli {
    /// Script to run; omit it to start the interactive prompt
    script: Option<PathBuf>,

    /// Enable debug logging to app.log
    #[arg(long)]
    log: bool,

    /// Dump the scanned tokens as JSON and skip execution
    #[arg(long)]
    tokens: bool,

    /// Dump the parsed syntax tree and skip execution
    #[arg(long)]
    ast: bool,
}

fn init_logger() -> Result<()> {
    // Create or open the log file
    let log_file = File::create("app.log").context("Failed to create app.log")?;

    // Configure env_logger to write to file with module path and source line
    Builder::new()
        .format(|buf, record| {
            // Strip 'rslox::' from module path
            let module = record
                .module_path()
                .unwrap_or("<unnamed>")
                .strip_prefix("rslox::")
                .unwrap_or(record.module_path().unwrap_or("<unnamed>"));

            writeln!(
                buf,
                "[{}:{}] - {}",
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug) // Default to Debug, override with RUST_LOG
        .init();

    info!("Logger initialized, writing to app.log");

    Ok(())
}

fn main() -> Result<()> {
    let args: Cli = match Cli::try_parse() {
        Ok(args) => args,

        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.print().context("Failed to print help")?;

            std::process::exit(0);
        }

        Err(_) => {
            eprintln!("Usage: rslox [script]");

            std::process::exit(64);
        }
    };

    if args.log {
        init_logger()?;
    } else {
        // Without --log, only warnings reach the user.  They print bare so
        // the unused-variable diagnostics read like compiler output.
        Builder::new()
            .format(|buf, record| writeln!(buf, "{}", record.args()))
            .filter(None, log::LevelFilter::Warn)
            .init();
    }

    info!("CLI arguments: {:?}", args);

    match &args.script {
        Some(path) => run_file(path, &args),
        None => run_prompt(),
    }
}

/// Maps the script into memory and feeds it through the pipeline.  Static
/// errors exit with 65, runtime errors with 70.
fn run_file(path: &PathBuf, args: &Cli) -> Result<()> {
    info!("Running file: {:?}", path);

    let file: File = File::open(path).context(format!("Failed to open file {:?}", path))?;

    let mmap: Mmap =
        unsafe { Mmap::map(&file) }.context(format!("Failed to map file {:?}", path))?;

    let source: &str = std::str::from_utf8(&mmap)
        .context(format!("File {:?} is not valid UTF-8", path))?;

    info!("Read {} bytes from {:?}", source.len(), path);

    let mut tokens: Vec<Token<'_>> = Vec::new();
    let mut errors: Vec<LoxError> = Vec::new();

    for result in Scanner::new(source.as_bytes()) {
        match result {
            Ok(token) => {
                debug!("Scanned token: {}", token);

                tokens.push(token);
            }

            Err(e) => errors.push(e),
        }
    }

    info!("Scanned {} token(s)", tokens.len());

    if args.tokens {
        let dump: String =
            serde_json::to_string_pretty(&tokens).context("Failed to serialize tokens")?;

        println!("{}", dump);
    }

    let (statements, parse_errors) = Parser::new(&tokens).parse();
    errors.extend(parse_errors);

    if args.ast {
        for stmt in &statements {
            println!("{}", AstPrinter::print_stmt(stmt));
        }
    }

    // Resolution only runs over a syntactically clean program.
    let locals: HashMap<ExprId, usize> = if errors.is_empty() {
        let (locals, resolve_errors) = Resolver::new().resolve(&statements);
        errors.extend(resolve_errors);

        locals
    } else {
        HashMap::new()
    };

    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{}", e);
        }

        debug!("Static analysis failed, exiting with code 65");

        std::process::exit(65);
    }

    if args.tokens || args.ast {
        info!("Dump requested, skipping execution");

        return Ok(());
    }

    let mut interpreter = Interpreter::new();

    if let Err(e) = interpreter.run(&statements, locals) {
        eprintln!("{}", e);

        debug!("Execution failed, exiting with code 70");

        std::process::exit(70);
    }

    info!("Program executed successfully");

    Ok(())
}

/// Interactive prompt.  Each line runs as a complete program against one
/// interpreter, so definitions carry over from line to line.  Errors are
/// reported and the prompt continues.
fn run_prompt() -> Result<()> {
    info!("Starting interactive prompt");

    let stdin: io::Stdin = io::stdin();
    let mut interpreter: Interpreter<'static, io::Stdout> = Interpreter::new();

    loop {
        print!("> ");
        io::stdout().flush().context("Failed to flush prompt")?;

        let mut line: String = String::new();

        let read: usize = stdin
            .lock()
            .read_line(&mut line)
            .context("Failed to read line")?;

        if read == 0 {
            info!("Reached end of input, leaving prompt");

            println!();

            break;
        }

        if line.trim().is_empty() {
            continue;
        }

        // Values defined on this line may outlive it, so the source is
        // leaked to 'static.  One small allocation per line.
        let source: &'static str = String::leak(line);

        run_line(&mut interpreter, source);
    }

    Ok(())
}

fn run_line(interpreter: &mut Interpreter<'static, io::Stdout>, source: &'static str) {
    let mut scanned: Vec<Token<'static>> = Vec::new();
    let mut errors: Vec<LoxError> = Vec::new();

    for result in Scanner::new(source.as_bytes()) {
        match result {
            Ok(token) => scanned.push(token),
            Err(e) => errors.push(e),
        }
    }

    // Closures keep token references past this line, so the buffer leaks
    // along with its source.
    let tokens: &'static [Token<'static>] = Vec::leak(scanned);

    let (statements, parse_errors) = Parser::new(tokens).parse();
    errors.extend(parse_errors);

    if errors.is_empty() {
        let (locals, resolve_errors) = Resolver::new().resolve(&statements);
        errors.extend(resolve_errors);

        if errors.is_empty() {
            if let Err(e) = interpreter.run(&statements, locals) {
                eprintln!("{}", e);
            }

            return;
        }
    }

    for e in &errors {
        eprintln!("{}", e);
    }
}
