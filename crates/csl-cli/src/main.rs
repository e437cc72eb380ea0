//! `csl`: A Config Schema Language Utility.
//!
//! - `--test <file>` lexes and parses a schema file and prints its
//!   diagnostics.
//! - `--htmldoc <file> <outdir>` generates the HTML documentation site.
//! - `--langsvr` starts the language server on stdio, a TCP socket
//!   (client-mode connect), or a named pipe.

use std::fs;
use std::io::{self, BufReader};
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use csl_docgen::to_html_doc;
use csl_lsp::LanguageServer;
use csl_parse::parse;
use csl_tokenizer::{lex, Diagnostic, Severity};

const EXIT_SUCCESS: u8 = 0;
const EXIT_DIAGNOSTICS: u8 = 1;
const EXIT_BAD_ARGS: u8 = 2;

/// A Config Schema Language utility.
#[derive(Parser, Debug)]
#[command(name = "csl", version, about = "csl: A Config Schema Language Utility")]
#[command(group = clap::ArgGroup::new("mode").required(true).args(["test", "htmldoc", "langsvr"]))]
struct Cli {
    /// Test the config schema file for correctness
    #[arg(long, value_name = "FILE")]
    test: Option<PathBuf>,

    /// Generate HTML documentation for FILE into OUTDIR
    #[arg(long, num_args = 2, value_names = ["FILE", "OUTDIR"])]
    htmldoc: Option<Vec<PathBuf>>,

    /// Start a language server instance
    #[arg(long)]
    langsvr: bool,

    /// Serve the language server on standard IO
    #[arg(long, requires = "langsvr")]
    stdio: bool,

    /// Connect the language server to 127.0.0.1:<PORT>
    #[arg(long, value_name = "PORT", requires = "langsvr")]
    socket: Option<u16>,

    /// Alias of --socket
    #[arg(long, value_name = "PORT", requires = "langsvr")]
    port: Option<u16>,

    /// Connect the language server to the named pipe <NAME>
    #[arg(long, value_name = "NAME", requires = "langsvr")]
    pipe: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let code = if let Some(path) = cli.test.as_deref() {
        cmd_test(path)
    } else if let Some(paths) = cli.htmldoc.as_deref() {
        cmd_htmldoc(&paths[0], &paths[1])
    } else {
        cmd_langsvr(&cli)
    };
    ExitCode::from(code)
}

fn print_banner() {
    println!("csl: A Config Schema Language Utility");
    println!("Version {}", env!("CARGO_PKG_VERSION"));
}

/// Lex and parse `path`, returning all diagnostics split by severity.
fn check_file(path: &Path) -> eyre::Result<(Vec<Diagnostic>, Vec<Diagnostic>, csl_parse::ParseOutput)> {
    let text = fs::read_to_string(path)
        .map_err(|err| eyre::eyre!("unable to open {}: {}", path.display(), err))?;
    let lexed = lex(&text, false);
    let parsed = parse(&lexed.tokens);

    let mut errors = lexed.errors;
    errors.extend(parsed.errors.iter().cloned());
    let mut warnings = lexed.warnings;
    warnings.extend(parsed.warnings.iter().cloned());
    Ok((errors, warnings, parsed))
}

fn print_diagnostics(path: &Path, errors: &[Diagnostic], warnings: &[Diagnostic]) {
    if !errors.is_empty() {
        eprintln!("\nErrors in {}:", path.display());
        for error in errors {
            debug_assert_eq!(error.severity, Severity::Error);
            eprintln!("{}", error);
        }
    }
    if !warnings.is_empty() {
        eprintln!("\nWarnings in {}:", path.display());
        for warning in warnings {
            eprintln!("{}", warning);
        }
    }
}

fn cmd_test(path: &Path) -> u8 {
    print_banner();
    match check_file(path) {
        Ok((errors, warnings, _)) => {
            print_diagnostics(path, &errors, &warnings);
            if errors.is_empty() && warnings.is_empty() {
                EXIT_SUCCESS
            } else {
                EXIT_DIAGNOSTICS
            }
        }
        Err(err) => {
            eprintln!("{}", err);
            EXIT_DIAGNOSTICS
        }
    }
}

fn cmd_htmldoc(input: &Path, outdir: &Path) -> u8 {
    print_banner();
    match generate_htmldoc(input, outdir) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{}", err);
            EXIT_DIAGNOSTICS
        }
    }
}

fn generate_htmldoc(input: &Path, outdir: &Path) -> eyre::Result<u8> {
    let (errors, warnings, parsed) = check_file(input)?;
    print_diagnostics(input, &errors, &warnings);
    if !errors.is_empty() {
        return Ok(EXIT_DIAGNOSTICS);
    }

    fs::create_dir_all(outdir)?;
    let pages = to_html_doc(&parsed.ast);
    for (name, content) in &pages {
        fs::write(outdir.join(name), content)?;
    }
    println!("generated {} file(s) in {}", pages.len(), outdir.display());
    Ok(EXIT_SUCCESS)
}

fn cmd_langsvr(cli: &Cli) -> u8 {
    // stdout carries the protocol; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    if cli.stdio {
        info!("serving on stdio");
        let server = LanguageServer::new(io::stdin().lock(), io::stdout().lock());
        return exit_code(server.run());
    }

    if let Some(port) = cli.socket.or(cli.port) {
        return match TcpStream::connect(("127.0.0.1", port)) {
            Ok(stream) => {
                info!(port, "connected to socket");
                let reader = match stream.try_clone() {
                    Ok(read_half) => BufReader::new(read_half),
                    Err(err) => {
                        eprintln!("unable to open socket on port {}: {}", port, err);
                        return EXIT_DIAGNOSTICS;
                    }
                };
                exit_code(LanguageServer::new(reader, stream).run())
            }
            Err(err) => {
                eprintln!("unable to open socket on port {}: {}", port, err);
                EXIT_DIAGNOSTICS
            }
        };
    }

    if let Some(name) = cli.pipe.as_deref() {
        return serve_pipe(name);
    }

    eprintln!("--langsvr requires one of --stdio, --socket/--port, or --pipe");
    EXIT_BAD_ARGS
}

#[cfg(unix)]
fn serve_pipe(name: &str) -> u8 {
    use std::os::unix::net::UnixStream;

    match UnixStream::connect(name) {
        Ok(stream) => {
            info!(pipe = name, "connected to pipe");
            let reader = match stream.try_clone() {
                Ok(read_half) => BufReader::new(read_half),
                Err(err) => {
                    eprintln!("unable to open pipe {}: {}", name, err);
                    return EXIT_DIAGNOSTICS;
                }
            };
            exit_code(LanguageServer::new(reader, stream).run())
        }
        Err(err) => {
            eprintln!("unable to open pipe {}: {}", name, err);
            EXIT_DIAGNOSTICS
        }
    }
}

#[cfg(not(unix))]
fn serve_pipe(name: &str) -> u8 {
    eprintln!("unable to open pipe {}: not supported on this platform", name);
    EXIT_DIAGNOSTICS
}

fn exit_code(code: i32) -> u8 {
    code.clamp(0, u8::MAX as i32) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_mode_is_required() {
        assert!(Cli::try_parse_from(["csl"]).is_err());
        assert!(Cli::try_parse_from(["csl", "--stdio"]).is_err());
        assert!(Cli::try_parse_from(["csl", "--test", "a.csl"]).is_ok());
        assert!(Cli::try_parse_from(["csl", "--htmldoc", "a.csl", "out"]).is_ok());
        assert!(Cli::try_parse_from(["csl", "--langsvr", "--stdio"]).is_ok());
        assert!(Cli::try_parse_from(["csl", "--langsvr", "--socket", "9257"]).is_ok());
        assert!(Cli::try_parse_from(["csl", "--langsvr", "--port", "9257"]).is_ok());
        assert!(Cli::try_parse_from(["csl", "--langsvr", "--pipe", "/tmp/csl.sock"]).is_ok());
    }
}
