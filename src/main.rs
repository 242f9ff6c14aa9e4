//! Driver binary: reads the source file, runs [scc_compiler] over it and
//! writes the `.intermediate` and `.s` artifacts, then shells out to `nasm`
//! and `gcc -m32` to produce an executable.

mod cli_options;

use cli_options::CliOptions;
use scc_compiler::compiler::codegen::OBJECT_FORMAT;
use scc_compiler::compiler::common::error::SccError;
use std::fs;
use std::path::Path;
use std::process::Command;

fn main() {
    let exit_code = run();
    std::process::exit(exit_code);
}

fn run() -> i32 {
    let options = match CliOptions::parse() {
        Ok(options) => options,
        Err(error) => {
            error.print();
            return 1;
        }
    };

    println!("Simple C Compiler (SCC)");

    let source = match fs::read_to_string(&options.file_path) {
        Ok(source) => source,
        Err(error) => {
            SccError::Sys(format!(
                "could not read '{}': {}",
                options.file_path.display(),
                error
            ))
            .print();
            return 1;
        }
    };

    if options.lex_only {
        lex(&source)
    } else {
        compile(&options, &source)
    }
}

fn lex(source: &str) -> i32 {
    let (lexemes, errors) = scc_compiler::lex(source);
    for lexeme in lexemes {
        println!("{}", lexeme);
    }

    if errors.is_empty() {
        0
    } else {
        SccError::Comp(errors).print();
        1
    }
}

fn compile(options: &CliOptions, source: &str) -> i32 {
    let program = match scc_compiler::compile(source) {
        Ok(program) => program,
        Err(errors) => {
            SccError::Comp(errors).print();
            return 1;
        }
    };

    let intermediate_file = options.file_path.with_extension("intermediate");
    let asm_file = options.file_path.with_extension("s");
    if write_artifact(&intermediate_file, &program.intermediate).is_err()
        || write_artifact(&asm_file, &program.assembly).is_err()
    {
        return 1;
    }

    if options.compile_only {
        return 0;
    }
    assemble_and_link(options)
}

fn write_artifact(path: &Path, content: &str) -> Result<(), ()> {
    fs::write(path, content).map_err(|error| {
        SccError::Sys(format!("could not write '{}': {}", path.display(), error)).print();
    })
}

fn assemble_and_link(options: &CliOptions) -> i32 {
    let asm_file = options.file_path.with_extension("s");
    let object_file = options.file_path.with_extension("o");
    let executable = options.file_path.with_extension("");

    let assembled = Command::new("nasm")
        .arg("-f")
        .arg(OBJECT_FORMAT)
        .arg("-o")
        .arg(&object_file)
        .arg(&asm_file)
        .status();
    match assembled {
        Ok(status) if status.success() => (),
        Ok(_) => return 1,
        Err(error) => {
            SccError::Sys(format!("could not invoke assembler 'nasm': {}", error)).print();
            return 1;
        }
    }

    let linked = Command::new("gcc")
        .arg("-m32")
        .arg("-o")
        .arg(&executable)
        .arg(&object_file)
        .status();
    match linked {
        Ok(status) if status.success() => 0,
        Ok(_) => 1,
        Err(error) => {
            SccError::Sys(format!("could not invoke linker 'gcc': {}", error)).print();
            1
        }
    }
}
