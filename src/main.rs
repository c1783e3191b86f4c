use clap::{Parser, Subcommand};
use imgcommit::commit::{self, CommitRequest, DeleteItem, UploadItem};
use imgcommit::imaging::{self, ImageSource};
use imgcommit::remote::github::GitHubClient;
use imgcommit::remote::{Credential, RemoteRepository, RepoRef};
use imgcommit::{config, output};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Shared flags for commands that talk to the repository.
#[derive(clap::Args, Clone, Default)]
struct RepoArgs {
    /// Repository in owner/repo form [config: repository.name]
    #[arg(long)]
    repo: Option<String>,

    /// Branch to read from or commit to [config: repository.branch]
    #[arg(long)]
    branch: Option<String>,

    /// Access token (default: the variable named by remote.token_env)
    #[arg(long)]
    token: Option<String>,
}

/// Shared flags for commands that resize images.
#[derive(clap::Args, Clone, Default)]
struct ResizeArgs {
    /// Target width in pixels, 0 = unset
    #[arg(long)]
    width: Option<u32>,

    /// Target height in pixels, 0 = unset
    #[arg(long)]
    height: Option<u32>,

    /// fit, stretch, side, pad or crop
    #[arg(long)]
    mode: Option<String>,

    /// Leave images that already fit the target untouched (--no-upscale=false to override config)
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    no_upscale: Option<bool>,

    /// Reference side for side mode: longest, shortest, width or height
    #[arg(long)]
    side: Option<String>,

    /// Pad fill colour (#rgb, #rrggbb or #rrggbbaa)
    #[arg(long)]
    background: Option<String>,

    /// Pad/crop anchor, e.g. center, top, bottom-right
    #[arg(long)]
    position: Option<String>,

    /// Output format: webp, jpg or png
    #[arg(long)]
    format: Option<String>,

    /// JPEG quality, 1-100
    #[arg(long)]
    quality: Option<u32>,
}

#[derive(clap::Args)]
struct PushArgs {
    /// Images to resize and upload
    files: Vec<PathBuf>,

    /// Repository path to delete in the same commit (repeatable)
    #[arg(long = "delete", value_name = "PATH")]
    deletions: Vec<String>,

    /// Destination folder for uploads [config: repository.folder]
    #[arg(long)]
    folder: Option<String>,

    /// Commit message; a UTC timestamp is appended
    #[arg(short, long)]
    message: Option<String>,

    /// Maximum parallel transform + upload workers
    #[arg(long)]
    max_workers: Option<usize>,

    #[command(flatten)]
    repo: RepoArgs,

    #[command(flatten)]
    resize: ResizeArgs,
}

#[derive(clap::Args)]
struct ListArgs {
    /// Folder to list [default: repository.folder]
    folder: Option<String>,

    #[command(flatten)]
    repo: RepoArgs,
}

#[derive(clap::Args)]
struct PlanArgs {
    /// Image to inspect
    file: PathBuf,

    #[command(flatten)]
    resize: ResizeArgs,
}

#[derive(Parser)]
#[command(name = "imgcommit")]
#[command(about = "Resize images and publish them to a GitHub repository in one commit")]
#[command(long_about = "\
Resize images and publish them to a GitHub repository in one commit

Every push reads the branch head once, uploads each resized image as a blob,
builds one tree with all additions and deletions, and fast-forwards the branch
to a single new commit. If anything fails, the branch is left untouched.

Settings are layered: stock defaults, then imgcommit.toml (or --config), then
flags. The access token comes from --token or the environment variable named
by remote.token_env (GITHUB_TOKEN by default), never from the config file.

Run 'imgcommit gen-config' to generate a documented imgcommit.toml.")]
#[command(version)]
struct Cli {
    /// Config file [default: ./imgcommit.toml if present]
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging on stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resize images and commit them, plus deletions, as one commit
    Push(PushArgs),
    /// List the files in a repository folder
    List(ListArgs),
    /// Show how an image would be resized, without uploading
    Plan(PlanArgs),
    /// Print a stock imgcommit.toml with all options documented
    GenConfig,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    match cli.command {
        Command::Push(args) => {
            let mut flags = FlagOverlay::default();
            flags.repo(&args.repo);
            flags.resize(&args.resize);
            flags.set("repository", "folder", args.folder.clone());
            flags.set("commit", "message", args.message.clone());
            flags.set(
                "processing",
                "max_workers",
                args.max_workers.map(|n| n as i64),
            );
            let config = config::load_config(cli.config.as_deref(), flags.into_value())?;

            let mut request =
                CommitRequest::new(config.commit_target(), credential(&args.repo, &config));
            request.uploads = args
                .files
                .iter()
                .map(|path| Ok(UploadItem::new(display_name(path), std::fs::read(path)?)))
                .collect::<Result<Vec<_>, std::io::Error>>()?;
            request.deletions = args.deletions.into_iter().map(DeleteItem::new).collect();
            request.transform = config.transform_spec()?;
            request.message = config.commit.message.clone();
            request.max_workers = config.processing.max_workers;

            let client = GitHubClient::new(&config.remote.api_base, config.remote.timeout())?;
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_commit_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let result = commit::commit_batch(&client, &request, Some(tx));
            printer
                .join()
                .map_err(|_| "progress printer thread panicked")?;

            // The failure line is already in the progress log.
            Ok(match result {
                Ok(_) => ExitCode::SUCCESS,
                Err(_) => ExitCode::FAILURE,
            })
        }
        Command::List(args) => {
            let mut flags = FlagOverlay::default();
            flags.repo(&args.repo);
            let config = config::load_config(cli.config.as_deref(), flags.into_value())?;

            let repo: RepoRef = config.repository.name.parse()?;
            let folder = args
                .folder
                .unwrap_or_else(|| config.repository.folder.clone());
            let client = GitHubClient::new(&config.remote.api_base, config.remote.timeout())?;
            let entries = client.list_folder(
                &credential(&args.repo, &config),
                &repo,
                &config.repository.branch,
                &folder,
            )?;
            output::print_folder_listing(&folder, &entries);
            Ok(ExitCode::SUCCESS)
        }
        Command::Plan(args) => {
            let mut flags = FlagOverlay::default();
            flags.resize(&args.resize);
            let config = config::load_config(cli.config.as_deref(), flags.into_value())?;

            let spec = config.transform_spec()?;
            let source = ImageSource::decode(&std::fs::read(&args.file)?)?;
            let dimensions = source.dimensions();
            let geometry = imaging::plan(dimensions, &spec);
            output::print_plan(&display_name(&args.file), dimensions, &spec, &geometry);
            Ok(ExitCode::SUCCESS)
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Log to stderr so the progress log on stdout stays clean.
fn init_tracing(verbose: bool) {
    let default = if verbose { "imgcommit=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

/// `--token`, else the configured environment variable, else empty
/// (rejected by the orchestrator before any network call).
fn credential(args: &RepoArgs, config: &config::Config) -> Credential {
    args.token
        .as_deref()
        .map(Credential::new)
        .filter(|c| !c.is_empty())
        .or_else(|| config.remote.credential_from_env())
        .unwrap_or_else(|| Credential::new(""))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Command-line flags as a sparse config layer.
#[derive(Default)]
struct FlagOverlay(toml::Table);

impl FlagOverlay {
    fn set<V: Into<toml::Value>>(&mut self, section: &str, key: &str, value: Option<V>) {
        let Some(value) = value else { return };
        let entry = self
            .0
            .entry(section)
            .or_insert(toml::Value::Table(toml::Table::new()));
        if let toml::Value::Table(table) = entry {
            table.insert(key.to_string(), value.into());
        }
    }

    fn repo(&mut self, args: &RepoArgs) {
        self.set("repository", "name", args.repo.clone());
        self.set("repository", "branch", args.branch.clone());
    }

    fn resize(&mut self, args: &ResizeArgs) {
        self.set("resize", "width", args.width.map(i64::from));
        self.set("resize", "height", args.height.map(i64::from));
        self.set("resize", "mode", args.mode.clone());
        self.set("resize", "no_upscale", args.no_upscale);
        self.set("resize", "side", args.side.clone());
        self.set("resize", "background", args.background.clone());
        self.set("resize", "position", args.position.clone());
        self.set("output", "format", args.format.clone());
        self.set("output", "quality", args.quality.map(i64::from));
    }

    fn into_value(self) -> Option<toml::Value> {
        (!self.0.is_empty()).then_some(toml::Value::Table(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn push_args(argv: &[&str]) -> PushArgs {
        let cli = Cli::try_parse_from(["imgcommit", "push"].iter().chain(argv)).unwrap();
        match cli.command {
            Command::Push(args) => args,
            _ => unreachable!(),
        }
    }

    fn resolved_no_upscale(config_toml: &str, argv: &[&str]) -> bool {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(config::CONFIG_FILE);
        fs::write(&path, config_toml).unwrap();

        let mut flags = FlagOverlay::default();
        flags.resize(&push_args(argv).resize);
        config::load_config(Some(&path), flags.into_value())
            .unwrap()
            .resize
            .no_upscale
    }

    #[test]
    fn no_upscale_flag_forms() {
        assert_eq!(push_args(&[]).resize.no_upscale, None);
        assert_eq!(push_args(&["--no-upscale"]).resize.no_upscale, Some(true));
        assert_eq!(
            push_args(&["--no-upscale=false"]).resize.no_upscale,
            Some(false)
        );
    }

    #[test]
    fn no_upscale_flag_overrides_config_file() {
        let file = "[resize]\nno_upscale = true\n";
        assert!(resolved_no_upscale(file, &[]));
        assert!(!resolved_no_upscale(file, &["--no-upscale=false"]));
        assert!(resolved_no_upscale("", &["--no-upscale"]));
    }

    #[test]
    fn flag_overlay_is_sparse() {
        let mut flags = FlagOverlay::default();
        flags.resize(&ResizeArgs::default());
        assert!(flags.into_value().is_none());

        let mut flags = FlagOverlay::default();
        flags.resize(&push_args(&["--width", "640", "--format", "png"]).resize);
        let value = flags.into_value().unwrap();
        assert_eq!(value["resize"]["width"].as_integer(), Some(640));
        assert_eq!(value["output"]["format"].as_str(), Some("png"));
        assert!(value["resize"].get("height").is_none());
    }
}
