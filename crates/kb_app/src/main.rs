//! `kb`: terminal client for the knowledge-base service.

mod logging;
mod render;
mod settings;
mod shell;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_logging::client_info;
use kb_engine::{ClientCommand, ClientEvent, ClientHandle, CommandKind, FileCredentialStore, UploadFile};

use logging::LogDestination;
use render::Renderer;
use settings::Settings;
use shell::ShellCommand;

#[derive(Parser)]
#[command(name = "kb")]
#[command(about = "Chat with and manage a knowledge-base service")]
struct Cli {
    /// RON settings file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Overrides the service address from the settings file
    #[arg(long, global = true)]
    base_url: Option<String>,
    /// Where the login is kept between runs
    #[arg(long, global = true)]
    credentials: Option<PathBuf>,
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
    #[arg(long, global = true, value_enum, default_value = "file")]
    log_to: LogDestination,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and remember the credentials
    Login {
        username: String,
        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Forget the saved login
    Logout,
    /// List indexed files
    Files,
    /// Delete a file (root only)
    Delete { filename: String },
    /// Upload files and wait until they are processed
    Upload {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Ask one question and print the streamed answer
    Chat {
        #[arg(required = true)]
        message: Vec<String>,
    },
    /// Interactive session
    Shell,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;
    logging::initialize(
        cli.log_to,
        client_logging::parse_level(&cli.log_level),
        &settings.log_file,
    );

    let config = settings.client_config(cli.base_url.as_deref())?;
    let credentials = cli
        .credentials
        .clone()
        .unwrap_or_else(|| settings.credentials_path.clone());
    client_info!("Starting kb against {} (credentials at {:?})", config.base_url, credentials);

    let handle = ClientHandle::spawn(config, Arc::new(FileCredentialStore::new(credentials)))?;
    let stdout = io::stdout();

    match cli.command {
        Commands::Shell => run_shell(&handle, Renderer::new(stdout.lock(), true)),
        command => {
            let mut renderer = Renderer::new(stdout.lock(), false);
            let command = one_shot(command)?;
            let kind = command.kind();
            handle.submit(command);
            wait_for(&handle, &mut renderer, kind)?;
            if kind == CommandKind::RefreshFiles {
                renderer.print_files()?;
            }
            Ok(())
        }
    }
}

fn one_shot(command: Commands) -> Result<ClientCommand> {
    Ok(match command {
        Commands::Login { username, password } => {
            let password = match password {
                Some(password) => password,
                None => prompt("Password: ")?,
            };
            ClientCommand::Login { username, password }
        }
        Commands::Logout => ClientCommand::Logout,
        Commands::Files => ClientCommand::RefreshFiles,
        Commands::Delete { filename } => ClientCommand::Delete { filename },
        Commands::Upload { paths } => ClientCommand::Upload {
            files: read_files(&paths)?,
        },
        Commands::Chat { message } => ClientCommand::Chat {
            message: message.join(" "),
        },
        Commands::Shell => bail!("shell is not a one-shot command"),
    })
}

fn read_files(paths: &[PathBuf]) -> Result<Vec<UploadFile>> {
    paths
        .iter()
        .map(|path| UploadFile::read(path).with_context(|| format!("reading {}", path.display())))
        .collect()
}

fn prompt(label: &str) -> Result<String> {
    print!("{label}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Renders events until `kind` reports back as finished.
fn wait_for<W: Write>(
    handle: &ClientHandle,
    renderer: &mut Renderer<W>,
    kind: CommandKind,
) -> Result<()> {
    loop {
        let Some(event) = handle.recv() else {
            bail!("client worker stopped unexpectedly");
        };
        renderer.render(&event)?;
        if event == ClientEvent::CommandFinished(kind) {
            return Ok(());
        }
    }
}

fn run_shell<W: Write>(handle: &ClientHandle, mut renderer: Renderer<W>) -> Result<()> {
    println!("{}", shell::HELP);
    // Pick up whatever the restored login already reported.
    while let Some(event) = handle.try_recv() {
        renderer.render(&event)?;
    }

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let Some(line) = lines.next() else {
            break;
        };
        let command = match ShellCommand::parse(&line?) {
            ShellCommand::Nothing => continue,
            ShellCommand::Quit => break,
            ShellCommand::Files => ClientCommand::RefreshFiles,
            ShellCommand::Logout => ClientCommand::Logout,
            ShellCommand::Delete(filename) => ClientCommand::Delete { filename },
            ShellCommand::Chat(message) => ClientCommand::Chat { message },
            ShellCommand::Upload(paths) => match read_files(&paths) {
                Ok(files) => ClientCommand::Upload { files },
                Err(err) => {
                    eprintln!("{err:#}");
                    continue;
                }
            },
        };
        let kind = command.kind();
        handle.submit(command);
        wait_for(handle, &mut renderer, kind)?;
    }
    Ok(())
}
