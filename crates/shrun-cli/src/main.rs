//! Shrun CLI
//!
//! Runs a shell program handed over as a JSON-encoded syntax tree.

use anyhow::{Context, bail};
use clap::{Arg, ArgAction, ArgMatches, Command};
use shrun_ast::File;
use shrun_interpreter::{InStream, Node, OutStream, RunError, Runner, RunnerConfig};
use std::path::PathBuf;
use std::process;
use tracing::debug;

/// What the command line asks for, apart from the program itself
#[derive(Debug, Default)]
struct Options {
    errexit: bool,
    dir: Option<PathBuf>,
    env: Vec<String>,
    params: Vec<String>,
}

fn cli() -> Command {
    Command::new("shrun")
        .version("0.1.0")
        .about("Run a shell program given as a JSON syntax tree")
        .arg(
            Arg::new("errexit")
                .short('e')
                .help("Stop at the first command that fails")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("dir")
                .short('C')
                .value_name("DIR")
                .help("Working directory for the program")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("env")
                .long("env")
                .value_name("KEY=VALUE")
                .help("Add a variable to the program's environment")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("command")
                .short('c')
                .long("command")
                .value_name("JSON")
                .help("Program to run, inline instead of from a file")
                .num_args(1),
        )
        .arg(
            Arg::new("args")
                .value_name("ARGS")
                .help("PROGRAM.json (unless -c is given), then the positional parameters")
                .num_args(0..)
                .trailing_var_arg(true)
                .allow_hyphen_values(true),
        )
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    // Only initialize if RUST_LOG is set
    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .with(EnvFilter::from_default_env())
            .init();
    }
}

fn main() {
    init_tracing();
    let matches = cli().get_matches();
    match run(&matches) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("shrun: {e:#}");
            process::exit(1);
        }
    }
}

fn run(matches: &ArgMatches) -> anyhow::Result<i32> {
    let mut args: Vec<String> = matches
        .get_many::<String>("args")
        .map(|vals| vals.cloned().collect())
        .unwrap_or_default();
    let file = match matches.get_one::<String>("command") {
        Some(json) => parse_program(json, "-c")?,
        None => {
            if args.is_empty() {
                bail!("no program given; pass PROGRAM.json or -c JSON");
            }
            let path = args.remove(0);
            load_program(&path)?
        }
    };
    let opts = Options {
        errexit: matches.get_flag("errexit"),
        dir: matches.get_one::<PathBuf>("dir").cloned(),
        env: matches
            .get_many::<String>("env")
            .map(|vals| vals.cloned().collect())
            .unwrap_or_default(),
        params: args,
    };
    execute(&file, &opts, OutStream::stdout())
}

fn parse_program(json: &str, name: &str) -> anyhow::Result<File> {
    let mut file: File =
        serde_json::from_str(json).with_context(|| format!("{name}: invalid program"))?;
    if file.name.is_empty() {
        file.name = name.to_string();
    }
    Ok(file)
}

fn load_program(path: &str) -> anyhow::Result<File> {
    let json = std::fs::read_to_string(path).with_context(|| format!("could not read {path}"))?;
    parse_program(&json, path)
}

/// Run `file` and turn the outcome into a process exit code
fn execute(file: &File, opts: &Options, stdout: OutStream) -> anyhow::Result<i32> {
    let mut env: Vec<String> = std::env::vars().map(|(k, v)| format!("{k}={v}")).collect();
    env.extend(opts.env.iter().cloned());
    let mut runner = Runner::new(RunnerConfig {
        env: Some(env),
        dir: opts.dir.clone(),
        params: opts.params.clone(),
        stdin: Some(InStream::stdin()),
        stdout: Some(stdout),
        ..RunnerConfig::default()
    })?;
    if opts.errexit {
        runner.from_args(&["-e".to_string()])?;
    }
    debug!(program = %file.name, stmts = file.stmts.len(), "running program");
    match runner.run(Node::File(file)) {
        Ok(()) => Ok(0),
        Err(RunError::Exit(code)) => Ok(i32::from(code)),
        Err(e) => Err(e.into()),
    }
}
