use std::io::{self, IsTerminal, Write};
use std::process;

use tracing_subscriber::EnvFilter;

use tinylisp::host::StdIo;
use tinylisp::{Config, Error, Interp};

/// Installed before anything else so `'x` reads as `(quote x)`.
const PRELUDE: &str = "(prefix ' quote)";

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("TINYLISP_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let mut config = Config::from_env();
    let mut load_files: Vec<String> = Vec::new();
    let mut bare = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--load" => {
                load_files.push(flag_value(&args, i));
                i += 2;
            }
            "--gc-events" => {
                config.gc_events = parse_count(&args, i);
                i += 2;
            }
            "--heap-limit" => {
                config.heap_limit = Some(parse_count(&args, i));
                i += 2;
            }
            "--bare" => {
                bare = true;
                i += 1;
            }
            "--help" | "-h" => {
                println!("Usage: tinylisp [OPTIONS]");
                println!();
                println!("Options:");
                println!("  --load <file>         Evaluate a source file before reading stdin");
                println!("  --gc-events <n>       Allocations between automatic collections");
                println!("  --heap-limit <slots>  Refuse to grow the heap past this many slots");
                println!("  --bare                Skip the prelude (no ' shorthand)");
                println!("  --help, -h            Show this help message");
                println!();
                println!("Environment variables:");
                println!("  TINYLISP_LOG          Log filter, e.g. debug or tinylisp::heap=trace");
                println!("  TINYLISP_GC_EVENTS, TINYLISP_ALLOC_BATCH, TINYLISP_HEAP_LIMIT");
                process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                eprintln!("Try 'tinylisp --help' for usage information.");
                process::exit(1);
            }
        }
    }

    let mut interp = match Interp::with_io(config, Box::new(StdIo)) {
        Ok(interp) => interp,
        Err(e) => {
            eprintln!("Failed to initialize interpreter: {}", e);
            process::exit(1);
        }
    };

    if !bare {
        if let Err(e) = interp.eval_str(PRELUDE) {
            eprintln!("Prelude failed: {}", e);
            process::exit(1);
        }
    }

    for path in &load_files {
        load_file(&mut interp, path);
    }

    let interactive = io::stdin().is_terminal();
    if interactive {
        println!("tinylisp");
        println!("  Symbols: {} interned", interp.symbols.count());
        println!("Ready.\n");
    }
    repl(&mut interp, interactive);
}

fn flag_value(args: &[String], i: usize) -> String {
    match args.get(i + 1) {
        Some(v) => v.clone(),
        None => {
            eprintln!("{} requires a value", args[i]);
            process::exit(1);
        }
    }
}

fn parse_count(args: &[String], i: usize) -> usize {
    let raw = flag_value(args, i);
    match raw.parse::<usize>() {
        Ok(n) if n > 0 => n,
        _ => {
            eprintln!("{} expects a positive integer, got {:?}", args[i], raw);
            process::exit(1);
        }
    }
}

fn load_file(interp: &mut Interp, path: &str) {
    let input = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading {}: {}", path, e);
            process::exit(1);
        }
    };
    if let Err(e) = interp.eval_str(&input) {
        eprintln!("Error in {}: {}", path, e);
        process::exit(1);
    }
}

/// Read-eval-print over the interpreter's own input, so `(read)` and
/// `(readc)` consume the same stream as the loop.
fn repl(interp: &mut Interp, interactive: bool) {
    loop {
        if interactive {
            print!("> ");
            let _ = io::stdout().flush();
        }
        let expr = match interp.read() {
            Ok(Some(expr)) => expr,
            Ok(None) => break,
            Err(e) if e.is_fatal() => {
                eprintln!("Fatal: {}", e);
                process::exit(1);
            }
            Err(e) => {
                eprintln!("Read error: {}", e);
                continue;
            }
        };
        match interp.eval(expr) {
            Ok(val) => println!("{}", interp.render(val)),
            Err(e) if e.is_fatal() => {
                eprintln!("Fatal: {}", e);
                process::exit(1);
            }
            Err(Error::Uncaught(what)) => eprintln!("Error: {}", what),
            Err(e) => eprintln!("Error: {}", e),
        }
    }
    if interactive {
        println!();
    }
}
