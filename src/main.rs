/*!
 * smbfs CLI - browse and transfer files on SMB shares
 */

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use smbfs::{
    fs, logging, Connector, Credential, CredentialScope, OpenMode, Secret, SmbConfig, SmbPath,
    SmbStream,
};

#[derive(Parser)]
#[command(name = "smbfs")]
#[command(version, about = "Browse and transfer files on SMB/CIFS shares", long_about = None)]
struct Cli {
    /// Authentication domain
    #[arg(long, global = true, default_value = "")]
    domain: String,

    /// Username (overrides credentials embedded in the URI)
    #[arg(short, long, global = true)]
    username: Option<String>,

    /// Password
    #[arg(short, long, global = true)]
    password: Option<String>,

    /// Session timeout in seconds (bounds pending retries)
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Write logs to a file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List a directory
    Ls { uri: String },
    /// Show size and timestamps
    Stat { uri: String },
    /// Write a remote file to stdout
    Cat { uri: String },
    /// Download a remote file
    Get { uri: String, dest: PathBuf },
    /// Upload a local file
    Put { source: PathBuf, uri: String },
    /// Delete a file
    Rm { uri: String },
    /// Create a directory
    Mkdir { uri: String },
    /// Delete an empty directory
    Rmdir { uri: String },
    /// Rename within a share
    Mv { from: String, to: String },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(error) = logging::init_logging(cli.verbose, cli.log_file.as_deref()) {
        eprintln!("smbfs: {error}");
        return ExitCode::from(2);
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("smbfs: {error}");
            if error.is_permission_error() {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

#[cfg(feature = "smb-native")]
fn connector() -> smbfs::Result<Arc<dyn Connector>> {
    Ok(Arc::new(smbfs::NativeConnector))
}

#[cfg(not(feature = "smb-native"))]
fn connector() -> smbfs::Result<Arc<dyn Connector>> {
    Err(smbfs::SmbError::Unsupported(
        "smb-native feature is not enabled. Rebuild with --features smb-native",
    ))
}

fn scope_for(cli: &Cli, path: &SmbPath, uri_credential: Option<Credential>) -> smbfs::Result<CredentialScope> {
    let mut config = match &cli.config {
        Some(file) => SmbConfig::load(file)?,
        None => SmbConfig::default(),
    };
    if let Some(timeout) = cli.timeout {
        config.session_timeout_secs = timeout;
    }

    let credential = match (&cli.username, uri_credential) {
        (Some(username), _) => Credential::new(
            cli.domain.clone(),
            username.clone(),
            Secret::new(cli.password.clone().unwrap_or_default()),
        ),
        (None, Some(from_uri)) => from_uri,
        (None, None) => Credential::anonymous(),
    };

    let prefix = SmbPath::from_parts(path.server(), path.share(), "")?;
    Ok(CredentialScope::new(credential, prefix, connector()?, config))
}

fn run(cli: Cli) -> smbfs::Result<()> {
    match &cli.command {
        Command::Ls { uri } => {
            let (path, cred) = SmbPath::parse_with_credentials(uri)?;
            let scope = scope_for(&cli, &path, cred)?;
            for entry in fs::read_dir(&scope, &path)? {
                if entry.info.is_directory {
                    println!("{:>12}  {}/", "-", entry.name);
                } else {
                    println!("{:>12}  {}", entry.info.size, entry.name);
                }
            }
            Ok(())
        }
        Command::Stat { uri } => {
            let (path, cred) = SmbPath::parse_with_credentials(uri)?;
            let scope = scope_for(&cli, &path, cred)?;
            let info = fs::metadata(&scope, &path)?;
            println!("path:     {path}");
            println!("kind:     {}", if info.is_directory { "directory" } else { "file" });
            println!("size:     {}", info.size);
            if let Some(modified) = info.modified {
                println!("modified: {modified:?}");
            }
            Ok(())
        }
        Command::Cat { uri } => {
            let (path, cred) = SmbPath::parse_with_credentials(uri)?;
            let scope = scope_for(&cli, &path, cred)?;
            let mut stream = SmbStream::open(&scope, &path, OpenMode::Read)?;
            let mut stdout = std::io::stdout().lock();
            stream.copy_to(&mut stdout, None)?;
            stream.close()
        }
        Command::Get { uri, dest } => {
            let (path, cred) = SmbPath::parse_with_credentials(uri)?;
            let scope = scope_for(&cli, &path, cred)?;
            let mut stream = SmbStream::open(&scope, &path, OpenMode::Read)?;
            let mut file = std::fs::File::create(dest)?;
            let copied = stream.copy_to(&mut file, None)?;
            stream.close()?;
            tracing::info!(%path, dest = %dest.display(), copied, "download complete");
            Ok(())
        }
        Command::Put { source, uri } => {
            let (path, cred) = SmbPath::parse_with_credentials(uri)?;
            let scope = scope_for(&cli, &path, cred)?;
            let mut file = std::fs::File::open(source)?;
            let mut stream = SmbStream::open(&scope, &path, OpenMode::Write)?;
            let copied = std::io::copy(&mut file, &mut stream)?;
            stream.close()?;
            tracing::info!(source = %source.display(), %path, copied, "upload complete");
            Ok(())
        }
        Command::Rm { uri } => {
            let (path, cred) = SmbPath::parse_with_credentials(uri)?;
            let scope = scope_for(&cli, &path, cred)?;
            fs::remove_file(&scope, &path)
        }
        Command::Mkdir { uri } => {
            let (path, cred) = SmbPath::parse_with_credentials(uri)?;
            let scope = scope_for(&cli, &path, cred)?;
            fs::create_dir(&scope, &path)
        }
        Command::Rmdir { uri } => {
            let (path, cred) = SmbPath::parse_with_credentials(uri)?;
            let scope = scope_for(&cli, &path, cred)?;
            fs::remove_dir(&scope, &path)
        }
        Command::Mv { from, to } => {
            let (from_path, cred) = SmbPath::parse_with_credentials(from)?;
            let to_path = SmbPath::parse(to)?;
            let scope = scope_for(&cli, &from_path, cred)?;
            fs::rename(&scope, &from_path, &to_path)
        }
    }
}
