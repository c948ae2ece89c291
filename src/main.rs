use clap::Parser as ClapParser;
use yansi::Paint;

use squeakc::{Build, CompileOptions, Error, Runtime};

use std::fs;
use std::path::PathBuf;
use std::process;
use std::thread;

/// Deep Smalltalk recursion runs on a thread with room for it.
const RUN_STACK_SIZE: usize = 512 << 20;

#[derive(ClapParser, Debug)]
#[command(author, version, about = "Compiles Squeak chunk-format source", long_about = None)]
struct Cli {
    /// Chunk-format source file
    source: PathBuf,

    /// Object-graph dump (`X := {...}. U := {...}`)
    heap: Option<PathBuf>,

    /// Selector assumed reachable from outside; enables dead-method removal
    #[arg(long = "root", value_name = "SEL")]
    roots: Vec<String>,

    /// Send class-side #initialize to every class that defines it
    #[arg(long)]
    initialize_classes: bool,

    /// Load the program and send a unary class-side selector, e.g. `Main>>start`
    #[arg(long, value_name = "CLASS>>SELECTOR")]
    run: Option<String>,

    /// Write the rendered program here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// More logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn read(path: &PathBuf) -> Result<String, Error> {
    fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.display().to_string(),
        source,
    })
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("{}: {}", "error".red().bold(), message);
    process::exit(1);
}

/// Prints a syntax error as a report over the file it came from.
fn report(error: Error, file: &PathBuf, source: &str) -> ! {
    match error {
        Error::Parse(parse) => {
            parse.report(&file.display().to_string(), source);
            process::exit(1);
        }
        other => fail(other),
    }
}

fn split_target(target: &str) -> Option<(&str, &str)> {
    let (class, selector) = target.split_once(">>")?;
    let class = class.trim().trim_end_matches(" class");
    let selector = selector.trim();
    (!class.is_empty() && !selector.is_empty()).then_some((class, selector))
}

fn run(source: String, heap: Option<String>, roots: Vec<String>, options: CompileOptions, target: String, file: PathBuf) {
    let Some((class, selector)) = split_target(&target) else {
        fail(format!("--run expects CLASS>>SELECTOR, got '{}'", target));
    };
    let build = Build {
        heap: heap.as_deref(),
        roots,
        options,
    };
    let (mut runtime, _) = match squeakc::load_source(&source, &build) {
        Ok(loaded) => loaded,
        Err(e) => report(e, &file, &source),
    };
    match runtime.run(class, selector) {
        Ok(value) => println!("{}", runtime.describe(value)),
        Err(e) => fail(e),
    }
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let source = read(&cli.source).unwrap_or_else(|e| fail(e));
    let heap = match &cli.heap {
        Some(path) => Some(read(path).unwrap_or_else(|e| fail(e))),
        None => None,
    };
    let options = CompileOptions {
        initialize_classes: cli.initialize_classes,
    };

    if let Some(target) = cli.run {
        let file = cli.source.clone();
        let roots = cli.roots;
        let worker = thread::Builder::new()
            .stack_size(RUN_STACK_SIZE)
            .spawn(move || run(source, heap, roots, options, target, file));
        match worker.map(|handle| handle.join()) {
            Ok(Ok(())) => return,
            Ok(Err(_)) => fail("the program panicked"),
            Err(e) => fail(e),
        }
    }

    let build = Build {
        heap: heap.as_deref(),
        roots: cli.roots,
        options,
    };
    let compiled = match squeakc::compile_source(&source, &build, &Runtime::new()) {
        Ok(compiled) => compiled,
        Err(e) => report(e, &cli.source, &source),
    };
    let text = compiled.program.to_string();
    match &cli.output {
        Some(path) => {
            if let Err(source) = fs::write(path, text) {
                fail(Error::Io {
                    path: path.display().to_string(),
                    source,
                });
            }
        }
        None => print!("{}", text),
    }
}
