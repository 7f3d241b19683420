use std::fs::read_to_string;
use std::io::{self, Read};
use std::process;

use clap::{App, Arg, ArgMatches};
use petgraph::dot::Dot;
use tracing_subscriber::EnvFilter;

use unloop::cfg::ast_to_cfg;
use unloop::conv::cfg_to_ast;
use unloop::error::Result;
use unloop::norm::{normalize, normalize_cfg};
use unloop::parser::parse;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    // Read command line arguments
    let arguments = App::new("unloop")
        .about("Normalize non-deterministic While programs down to a single loop.")
        .arg(
            Arg::with_name("input")
                .help("program file (defaults to stdin)")
                .index(1),
        )
        .arg(
            Arg::with_name("dot")
                .short("d")
                .long("dot")
                .help("print the normalized CFG in Graphviz format"),
        )
        .arg(
            Arg::with_name("json")
                .short("j")
                .long("json")
                .help("print the normalized AST as JSON"),
        )
        .arg(
            Arg::with_name("round_trip")
                .short("r")
                .long("round-trip")
                .help("rebuild the program through the CFG without normalizing"),
        )
        .get_matches();

    match run(&arguments) {
        Ok(output) => println!("{}", output),
        Err(e) => {
            eprintln!("unloop: {}", e);
            process::exit(1);
        }
    }
}

fn run(arguments: &ArgMatches<'_>) -> Result<String> {
    // Read the program from the given file, or from StdIn
    let text = match arguments.value_of("input") {
        Some(path) => read_to_string(path)?,
        None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };
    let ast = parse(&text)?;

    if arguments.is_present("round_trip") {
        let rebuilt = cfg_to_ast(&ast_to_cfg(&ast))?;
        return Ok(format!("{}", rebuilt));
    }

    if arguments.is_present("dot") {
        let mut cfg = ast_to_cfg(&ast);
        normalize_cfg(&mut cfg)?;
        return Ok(format!("{}", Dot::new(&cfg.graph)));
    }

    let normalized = normalize(&ast)?;
    if arguments.is_present("json") {
        return Ok(serde_json::to_string_pretty(&normalized)?);
    }
    Ok(format!("{}", normalized))
}
