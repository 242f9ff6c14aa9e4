use scc_compiler::compiler::common::error::SccError;
use std::path::PathBuf;

const VERSION: &str = concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"));

const USAGE: &str = "\
usage: scc [-S] [-h | --help] [-v] <file> [lex]";

const HELP: &str = "usage: scc [options] <file> [lex]
options:
    -S | --compile-only     Stops after writing the .intermediate and .s files
    -h                      Prints usage information
    --help                  Prints elaborate help information
    -v | --version          Prints version information

file:
    The source file to be read

lex:
    Only runs the lexer, printing one token lexeme per line";

fn sys_info(msg: &str) -> ! {
    eprintln!("{msg}");
    std::process::exit(0);
}

pub struct CliOptions {
    // required argument specifying file to compile
    pub file_path: PathBuf,

    // only runs the lexer, printing the token stream
    pub lex_only: bool,

    // stops evaluation after writing the .intermediate and .s files
    pub compile_only: bool,
}
impl CliOptions {
    fn new() -> CliOptions {
        CliOptions {
            file_path: PathBuf::new(),
            lex_only: false,
            compile_only: false,
        }
    }
    pub fn parse() -> Result<CliOptions, SccError> {
        let mut cli_options = CliOptions::new();
        let args = std::env::args().collect::<Vec<String>>().into_iter().skip(1);

        for arg in args {
            if arg.starts_with('-') {
                match arg.as_str() {
                    "-S" | "--compile-only" => cli_options.compile_only = true,
                    "-h" => sys_info(USAGE),
                    "--help" => sys_info(HELP),
                    "-v" | "--version" => sys_info(VERSION),
                    _ => return Err(SccError::Cli(vec![format!("illegal option '{}'", arg)])),
                }
            } else if cli_options.file_path.to_string_lossy().is_empty() {
                cli_options.file_path = PathBuf::from(arg);
            } else if arg == "lex" {
                cli_options.lex_only = true;
            } else {
                return Err(SccError::Cli(vec![format!("unexpected argument '{}'", arg)]));
            }
        }

        if cli_options.file_path.to_string_lossy().is_empty() {
            Err(SccError::Cli(vec!["no input files given".to_string()]))
        } else {
            Ok(cli_options)
        }
    }
}
