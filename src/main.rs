use almanac::{config, output, site::Site};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Flags that override `_config.toml` for a single build.
#[derive(clap::Args, Clone, Default)]
struct BuildArgs {
    /// Publish posts and photos dated after the build time
    #[arg(long)]
    future: bool,

    /// Only publish the N most recent posts
    #[arg(long, value_name = "N")]
    limit_posts: Option<i64>,

    /// Build as if the current time were TIME (`YYYY-MM-DD HH:MM:SS`)
    #[arg(long, value_name = "TIME")]
    time: Option<String>,

    /// Render and write documents on a worker pool
    #[arg(long)]
    parallel: bool,

    /// Rank related posts by content similarity
    #[arg(long)]
    related: bool,
}

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup; called exactly once
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "almanac")]
#[command(about = "Static site generator for dated posts, photos and pages")]
#[command(long_about = "\
Static site generator for dated posts, photos and pages

Posts and photos are named YYYY-MM-DD-slug.ext and live in _posts/ and
_photos/ directories. Directories above a _posts/ directory become the
post's categories. Any file with YAML front matter is rendered as a page;
everything else is copied verbatim.

Source structure:

  site/
  ├── _config.toml                  # Site config (optional)
  ├── _layouts/                     # Layouts, nested with `layout:` front matter
  │   ├── default.html
  │   ├── post.html
  │   ├── archive_yearly.html       # Enables YYYY/index.html
  │   ├── archive_monthly.html      # Enables YYYY/MM/index.html
  │   └── archive_daily.html        # Enables YYYY/MM/DD/index.html
  ├── _posts/
  │   ├── 2008-11-05-first-post.md
  │   └── rust/2008-11-06-second.md # Category `rust`
  ├── _photos/
  │   └── 2009-01-02-sunset.md
  ├── blog/_posts/                  # Category `blog`
  ├── about.md                      # Page
  └── css/style.css                 # Static file

The destination is kept in sync: anything in it the build does not
produce is removed.

Run 'almanac gen-config' to generate a documented _config.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Site source directory
    #[arg(long, default_value = ".", global = true)]
    source: PathBuf,

    /// Output directory (overrides `destination` in _config.toml)
    #[arg(long, global = true)]
    destination: Option<PathBuf>,

    /// Log debug detail to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full pipeline and write the site
    Build(BuildArgs),
    /// Read the source tree and list what a build would produce
    Check,
    /// Print a stock _config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Command::Build(args) => {
            let config = config::load_config(&cli.source, overrides(&cli, args))?;
            init_thread_pool(&config.processing);
            let mut site = Site::new(config);
            println!(
                "==> Building {} → {}",
                site.source().display(),
                site.destination().display()
            );
            site.process()?;
            output::print_build_output(&site);
            println!("==> Build complete: {}", site.destination().display());
        }
        Command::Check => {
            let config =
                config::load_config(&cli.source, overrides(&cli, &BuildArgs::default()))?;
            let mut site = Site::new(config);
            println!("==> Checking {}", site.source().display());
            site.reset()?;
            site.read()?;
            output::print_check_output(&site);
            println!("==> Content is valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Config overrides from command-line flags. Only flags that were given
/// are set, so `_config.toml` values survive otherwise.
fn overrides(cli: &Cli, args: &BuildArgs) -> toml::Table {
    let mut table = toml::Table::new();
    if let Some(destination) = &cli.destination {
        table.insert(
            "destination".into(),
            toml::Value::String(destination.to_string_lossy().into_owned()),
        );
    }
    if args.future {
        table.insert("future".into(), toml::Value::Boolean(true));
    }
    if let Some(limit) = args.limit_posts {
        table.insert("limit_posts".into(), toml::Value::Integer(limit));
    }
    if let Some(time) = &args.time {
        table.insert("time".into(), toml::Value::String(time.clone()));
    }
    if args.related {
        table.insert("related_posts".into(), toml::Value::Boolean(true));
    }
    if args.parallel {
        let mut processing = toml::Table::new();
        processing.insert("parallel".into(), toml::Value::Boolean(true));
        table.insert("processing".into(), toml::Value::Table(processing));
    }
    table
}

/// Log to stderr. `RUST_LOG` wins over `--verbose` when set.
fn init_tracing(verbose: bool) {
    let default = if verbose { "almanac=debug" } else { "almanac=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
