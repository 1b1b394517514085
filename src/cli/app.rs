//! Main CLI application

use crate::cache::{default_cache_root, BuildMode, Substitutions};
use crate::compiler::{ToolResolver, YamlCompiler};
use crate::config::{find_script_file, ScriptSource};
use crate::engine::{Session, TaskArgument, TaskGraph};
use crate::error::{ConfigError, Result, StepwiseError};
use crate::logging;
use crate::pipeline::{self, Build, BuildOptions};
use crate::runner::{RunSettings, Verbosity};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use clap_complete::Shell;
use colored::Colorize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// A task name with the arguments given for it on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub task: String,
    pub args: Vec<TaskArgument>,
}

/// CLI application
pub struct App {
    command: Command,
}

impl App {
    pub fn new() -> Self {
        App {
            command: build_command(),
        }
    }

    /// Run with the process arguments
    pub fn run(self) -> Result<()> {
        self.run_from(std::env::args_os())
    }

    /// Run with explicit arguments; the first is the program name
    pub fn run_from<I, T>(mut self, args: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let matches = self.command.clone().get_matches_from(args);

        if let Some(shell) = matches.get_one::<Shell>("completions").copied() {
            clap_complete::generate(shell, &mut self.command, "stepwise", &mut io::stdout());
            return Ok(());
        }

        let verbosity = get_verbosity(&matches);
        logging::init(verbosity);

        let script_path = match matches.get_one::<String>("file") {
            Some(file) => PathBuf::from(file),
            None => find_script_file()?,
        };
        let source = ScriptSource::load(&script_path)?;
        load_dotenv(source.dir())?;

        let options = BuildOptions {
            substitutions: parse_definitions(&matches)?,
            mode: if matches.get_flag("debug") {
                BuildMode::Debug
            } else {
                BuildMode::Release
            },
            cache_root: cache_root(&matches),
            settings: RunSettings::new().with_verbosity(verbosity),
        };

        let build = pipeline::build(&source, &options, &YamlCompiler::new(), &ToolResolver::new())?;

        if matches.get_flag("list") {
            print_task_list(&build, &mut io::stdout())?;
            return Ok(());
        }

        let tokens: Vec<String> = matches
            .get_many::<String>("invocation")
            .map(|values| values.cloned().collect())
            .unwrap_or_default();

        if tokens.is_empty() {
            self.command.print_help()?;
            println!();
            print_task_list(&build, &mut io::stdout())?;
            return Ok(());
        }

        let invocations = split_invocations(&tokens, build.registry.graph())?;

        let session = Session::new();
        session.install(build.registry);
        for invocation in &invocations {
            session.invoke(&invocation.task, &invocation.args)?;
        }

        Ok(())
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the clap command
fn build_command() -> Command {
    Command::new("stepwise")
        .version(env!("CARGO_PKG_VERSION"))
        .about("A YAML task runner with memoized steps and a compiled-plan cache")
        .arg(
            Arg::new("file")
                .short('f')
                .long("file")
                .value_name("FILE")
                .help("Path to stepwise.yml script file"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Only print command output and errors")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("silent")
                .short('s')
                .long("silent")
                .help("Print no output")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Print verbose output")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("list")
                .short('l')
                .long("list")
                .help("List available tasks")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("debug")
                .long("debug")
                .help("Compile in debug mode and emit symbols")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-cache")
                .long("no-cache")
                .help("Do not read or write the build cache")
                .action(ArgAction::SetTrue)
                .conflicts_with("cache-dir"),
        )
        .arg(
            Arg::new("cache-dir")
                .long("cache-dir")
                .value_name("DIR")
                .help("Cache root directory"),
        )
        .arg(
            Arg::new("define")
                .short('D')
                .long("define")
                .value_name("KEY=VALUE")
                .help("Compile-time substitution, available as $(KEY)")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("completions")
                .long("completions")
                .value_name("SHELL")
                .help("Print shell completions")
                .value_parser(value_parser!(Shell)),
        )
        .arg(
            Arg::new("invocation")
                .value_name("TASK [ARGS]")
                .help("Tasks to run, each followed by its arguments")
                .num_args(0..)
                .trailing_var_arg(true)
                .allow_hyphen_values(true),
        )
}

/// Get verbosity level from matches
fn get_verbosity(matches: &ArgMatches) -> Verbosity {
    if matches.get_flag("silent") {
        Verbosity::Silent
    } else if matches.get_flag("quiet") {
        Verbosity::Quiet
    } else if matches.get_flag("verbose") {
        Verbosity::Verbose
    } else {
        Verbosity::Normal
    }
}

fn cache_root(matches: &ArgMatches) -> Option<PathBuf> {
    if matches.get_flag("no-cache") {
        return None;
    }
    match matches.get_one::<String>("cache-dir") {
        Some(dir) => Some(PathBuf::from(dir)),
        None => default_cache_root(),
    }
}

fn parse_definitions(matches: &ArgMatches) -> Result<Substitutions> {
    let mut substitutions = Substitutions::new();
    for definition in matches.get_many::<String>("define").into_iter().flatten() {
        let (name, value) = Substitutions::parse_definition(definition).ok_or_else(|| {
            ConfigError::Invalid(format!(
                "invalid definition '{}', expected KEY=VALUE",
                definition
            ))
        })?;
        substitutions.insert(&name, value);
    }
    Ok(substitutions)
}

/// Load a `.env` file next to the script into the process environment
fn load_dotenv(dir: &Path) -> Result<()> {
    let path = dir.join(".env");
    if path.is_file() {
        dotenvy::from_path(&path).map_err(|e| ConfigError::Read {
            path,
            error: e.to_string(),
        })?;
    }
    Ok(())
}

/// Split command-line tokens into invocations. A token naming a declared
/// task starts a new invocation; any other token is an argument.
pub fn split_invocations(tokens: &[String], graph: &TaskGraph) -> Result<Vec<Invocation>> {
    let mut invocations: Vec<Invocation> = Vec::new();

    for token in tokens {
        if graph.find(token).is_some() {
            invocations.push(Invocation {
                task: token.clone(),
                args: Vec::new(),
            });
            continue;
        }
        match invocations.last_mut() {
            Some(current) => current.args.push(TaskArgument::parse(token)),
            None => return Err(StepwiseError::TaskNotFound(token.clone())),
        }
    }

    Ok(invocations)
}

/// Print the visible tasks with their signatures and summaries
fn print_task_list(build: &Build, out: &mut impl Write) -> io::Result<()> {
    let graph = build.registry.graph();
    let visible: Vec<_> = graph
        .nodes()
        .map(|(_, node)| node)
        .filter(|node| !build.analysis.hidden.contains(node.identity.key()))
        .collect();

    if visible.is_empty() {
        return writeln!(out, "No tasks defined.");
    }

    let signatures: Vec<String> = visible.iter().map(|node| node.signature()).collect();
    let width = signatures.iter().map(String::len).max().unwrap_or(0);

    writeln!(out, "{}", "Tasks:".bold())?;
    for (node, signature) in visible.iter().zip(&signatures) {
        let padding = " ".repeat(width - signature.len());
        match &node.summary {
            Some(summary) => writeln!(out, "  {}{}  {}", signature.green(), padding, summary)?,
            None => writeln!(out, "  {}", signature.green())?,
        }
    }
    Ok(())
}
