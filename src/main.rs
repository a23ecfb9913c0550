use std::fs;
use std::io::{self, Read};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Arg, ArgAction, ArgMatches, Command, crate_version, value_parser};
use quill::{Environment, Error, InterpretOptions, interpret_with, parse_str, tokenize};

fn cli() -> Command {
    Command::new("quill")
        .version(crate_version!())
        .about("Runs programs written in the quill scripting language")
        .arg(
            Arg::new("file")
                .index(1)
                .help("Path to input script file")
                .value_name("FILE"),
        )
        .arg(
            Arg::new("cmd")
                .short('c')
                .long("cmd")
                .help("Execute a snippet then exit")
                .value_name("CODE")
                .conflicts_with("file"),
        )
        .arg(
            Arg::new("tokens")
                .long("tokens")
                .help("Print the token stream instead of executing")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("ast")
                .long("ast")
                .help("Parse and print the syntax tree instead of executing")
                .action(ArgAction::SetTrue)
                .conflicts_with("tokens"),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout-ms")
                .help("Abort the program after this many milliseconds")
                .value_name("MS")
                .value_parser(value_parser!(u64)),
        )
}

/// Where the program comes from: `-c`, a file, or stdin.
fn read_source(args: &ArgMatches) -> io::Result<(String, String)> {
    if let Some(code) = args.get_one::<String>("cmd") {
        Ok(("<cmd>".to_string(), code.clone()))
    } else if let Some(path) = args.get_one::<String>("file") {
        Ok((path.clone(), fs::read_to_string(path)?))
    } else {
        let mut source = String::new();
        io::stdin().read_to_string(&mut source)?;
        Ok(("<stdin>".to_string(), source))
    }
}

fn report(err: &Error, name: &str, source: &str) -> ExitCode {
    if err.pretty_print(name, source).is_err() {
        eprintln!("{}", err);
    }
    ExitCode::FAILURE
}

fn print_tokens(name: &str, source: &str) -> ExitCode {
    match tokenize(source) {
        Ok(tokens) => {
            for token in tokens {
                println!("{} {:?}", token.pos, token.kind);
            }
            ExitCode::SUCCESS
        }
        Err(err) => report(&Error::Lex(err), name, source),
    }
}

fn print_ast(name: &str, source: &str) -> ExitCode {
    match parse_str(source) {
        Ok(program) => {
            for stmt in program {
                println!("{}", stmt);
            }
            ExitCode::SUCCESS
        }
        Err(err) => report(&Error::Parse(err), name, source),
    }
}

fn main() -> ExitCode {
    env_logger::init();

    let args = cli().get_matches();
    let (name, source) = match read_source(&args) {
        Ok(input) => input,
        Err(err) => {
            eprintln!("Error reading source: {}.", err);
            return ExitCode::FAILURE;
        }
    };

    if args.get_flag("tokens") {
        return print_tokens(&name, &source);
    }
    if args.get_flag("ast") {
        return print_ast(&name, &source);
    }

    let options = InterpretOptions {
        timeout: args
            .get_one::<u64>("timeout")
            .map(|ms| Duration::from_millis(*ms)),
    };
    log::debug!("running {} with {:?}", name, options);

    let env = Environment::new_global_populated();
    let mut stdout = io::stdout().lock();
    match interpret_with(&source, &env, &mut stdout, &options) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => report(&err, &name, &source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        cli().debug_assert();
    }

    #[test]
    fn test_cli_parses_flags() {
        let args = cli()
            .try_get_matches_from(["quill", "-c", "echo(1)", "--timeout-ms", "50", "--ast"])
            .unwrap();
        assert_eq!(args.get_one::<String>("cmd").map(String::as_str), Some("echo(1)"));
        assert_eq!(args.get_one::<u64>("timeout"), Some(&50));
        assert!(args.get_flag("ast"));
        assert!(!args.get_flag("tokens"));
    }

    #[test]
    fn test_cli_rejects_file_with_snippet() {
        assert!(cli().try_get_matches_from(["quill", "a.ql", "-c", "1"]).is_err());
    }
}
