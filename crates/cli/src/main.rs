use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use healthrec_core::backends::{LocalAccount, LocalAuthProvider, LocalBackends};
use healthrec_core::upload::ProcessingOutcome;
use healthrec_core::{
    nav_links, pick_file, AuthService, CollectingNotifier, CoreConfig, DateRange, DocumentListing,
    GuardView, HistoryNavigator, Metric, Route, RouteGuard, SessionHandle, SessionStore,
    ToastVariant, TrendView, UploadController, UploadPipeline,
};
use healthrec_uuid::MonotonicClock;
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt::Display;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "healthrec")]
#[command(about = "HealthRecord document manager CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a local account
    AddAccount {
        /// Stable account id
        id: String,
        /// Sign-in email address
        email: String,
        /// Password
        password: String,
        /// Name shown on documents and in the navbar
        #[arg(long)]
        display_name: Option<String>,
    },
    /// Sign in with email and password
    Login {
        email: String,
        password: String,
    },
    /// Sign in with Google
    GoogleLogin,
    /// Sign out
    Logout,
    /// Request a password reset email
    ResetPassword {
        email: String,
    },
    /// Show who is signed in
    Whoami,
    /// Show the navigation links for a page
    Nav {
        /// Current page path
        #[arg(long, default_value = "/")]
        route: String,
    },
    /// Upload a PDF or image
    Upload {
        path: PathBuf,
    },
    /// List your documents, newest test date first
    Timeline {
        /// Filter by category, patient name or test date
        #[arg(long)]
        search: Option<String>,
    },
    /// Download a document by id
    Download {
        id: String,
        /// Directory to save into
        #[arg(long, default_value = ".")]
        dest: PathBuf,
    },
    /// Show the preview link for a document
    Preview {
        id: String,
    },
    /// Show a trend from the dashboard
    Trends {
        /// cholesterol, glucose or tsh
        #[arg(long, default_value = "cholesterol")]
        metric: Metric,
        /// First date (YYYY-MM-DD), inclusive
        #[arg(long, requires = "to")]
        from: Option<NaiveDate>,
        /// Last date (YYYY-MM-DD), inclusive
        #[arg(long, requires = "from")]
        to: Option<NaiveDate>,
        /// Write the filtered rows as JSON to this file
        #[arg(long)]
        export: Option<PathBuf>,
    },
}

/// The pieces every page flow shares.
struct App {
    cfg: CoreConfig,
    backends: LocalBackends,
    store: SessionStore,
    navigator: Arc<HistoryNavigator>,
    notifier: Arc<CollectingNotifier>,
}

impl App {
    fn open(cfg: CoreConfig) -> anyhow::Result<Self> {
        let backends = LocalBackends::open(&cfg)?;
        let store = SessionStore::start(backends.auth.as_ref());
        Ok(Self {
            cfg,
            backends,
            store,
            navigator: Arc::new(HistoryNavigator::new()),
            notifier: Arc::new(CollectingNotifier::new()),
        })
    }

    fn session(&self) -> SessionHandle {
        self.store.handle()
    }

    fn auth(&self) -> AuthService {
        AuthService::new(
            self.backends.auth.clone(),
            self.navigator.clone(),
            self.notifier.clone(),
        )
    }

    fn listing(&self) -> DocumentListing {
        DocumentListing::new(
            self.backends.documents.clone(),
            self.backends.storage.clone(),
            self.notifier.clone(),
        )
    }

    /// Runs the route guard for `route`; fails if the page must not be shown.
    async fn guard(&self, route: Route) -> anyhow::Result<()> {
        let mut guard = RouteGuard::new(route);
        let mut session = self.session();
        match guard.resolve(&mut session, self.navigator.as_ref()).await {
            GuardView::Content => Ok(()),
            GuardView::Placeholder | GuardView::Nothing => {
                eprintln!("Please sign in first ('healthrec login').");
                Err(Reported("not signed in".into()).into())
            }
        }
    }

    fn flush(&self) {
        for toast in self.notifier.drain() {
            let line = match &toast.description {
                Some(description) => format!("{}: {}", toast.title, description),
                None => toast.title.clone(),
            };
            match toast.variant {
                ToastVariant::Default => println!("{}", line),
                ToastVariant::Warning => eprintln!("warning: {}", line),
                ToastVariant::Destructive => eprintln!("error: {}", line),
            }
        }
        if let Some(route) = self.navigator.last() {
            tracing::info!(route = %route, "navigated");
        }
    }
}

/// A failure already shown to the user as a toast.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct Reported(String);

/// Marks a flow's error as already shown, so it only sets the exit status.
fn reported<T, E: Display>(result: Result<T, E>) -> anyhow::Result<T> {
    result.map_err(|e| Reported(e.to_string()).into())
}

/// Exit status for a finished command. Reported failures exit with status 1 without being
/// printed again; other errors are returned to `main`.
fn finish(result: anyhow::Result<()>) -> anyhow::Result<ExitCode> {
    match result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) if e.is::<Reported>() => Ok(ExitCode::FAILURE),
        Err(e) => Err(e),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("healthrec_cli=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("Use 'healthrec --help' for commands");
        return Ok(ExitCode::SUCCESS);
    };

    let cfg = CoreConfig::from_lookup(|var| std::env::var(var).ok())?;

    if let Commands::AddAccount {
        id,
        email,
        password,
        display_name,
    } = &command
    {
        let account = LocalAccount::new(id, email, display_name.as_deref(), password)?;
        LocalAuthProvider::add_account(&cfg.auth_dir(), account)?;
        println!("Added account {}", id);
        return Ok(ExitCode::SUCCESS);
    }

    let mut app = App::open(cfg)?;
    let result = run(&app, command).await;
    app.flush();
    app.store.shutdown().await;
    finish(result)
}

async fn run(app: &App, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::AddAccount { .. } => Ok(()),
        Commands::Login { email, password } => {
            reported(app.auth().sign_in_with_email(&email, &password).await)?;
            Ok(())
        }
        Commands::GoogleLogin => {
            reported(app.auth().sign_in_with_google().await)?;
            Ok(())
        }
        Commands::Logout => {
            app.auth().sign_out().await;
            println!("Signed out");
            Ok(())
        }
        Commands::ResetPassword { email } => {
            reported(app.auth().send_password_reset(&email).await)?;
            Ok(())
        }
        Commands::Whoami => {
            let session = app.session().wait_until_loaded().await;
            match session.identity() {
                Some(identity) => println!("{} <{}>", identity.label(), identity.email),
                None => println!("Not signed in"),
            }
            Ok(())
        }
        Commands::Nav { route } => {
            let current = Route::from_path(&route)
                .ok_or_else(|| anyhow::anyhow!("unknown route: {}", route))?;
            let session = app.session().wait_until_loaded().await;

            let links: Vec<String> = nav_links(&session, current)
                .into_iter()
                .map(|link| {
                    if link.active {
                        format!("[{}]", link.label)
                    } else {
                        link.label.to_string()
                    }
                })
                .collect();
            let user = session
                .identity()
                .map(|i| i.label().to_owned())
                .unwrap_or_else(|| "Login".into());
            println!("HealthRecord  {}  | {}", links.join("  "), user);
            Ok(())
        }
        Commands::Upload { path } => upload(app, path).await,
        Commands::Timeline { search } => {
            app.guard(Route::Timeline).await?;
            let session = app.session().current();
            let mut listing = app.listing();
            reported(listing.load(&session).await)?;

            let hits = listing.search(search.as_deref().unwrap_or(""));
            if hits.is_empty() {
                println!("No documents found.");
            }
            for doc in hits {
                println!(
                    "{}  {:<14} {:<20} {}  ({})",
                    doc.test_date, doc.category, doc.patient_name, doc.original_file_name, doc.id
                );
            }
            Ok(())
        }
        Commands::Download { id, dest } => {
            app.guard(Route::Timeline).await?;
            let session = app.session().current();
            let mut listing = app.listing();
            reported(listing.load(&session).await)?;
            let record = listing
                .find(&id)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("no document with id {}", id))?;

            let saved = reported(listing.download(&record, &dest).await)?;
            println!("Saved {}", saved.display());
            Ok(())
        }
        Commands::Preview { id } => {
            app.guard(Route::Timeline).await?;
            let session = app.session().current();
            let mut listing = app.listing();
            reported(listing.load(&session).await)?;
            let record = listing
                .find(&id)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("no document with id {}", id))?;

            let preview = reported(listing.preview(&record).await)?;
            println!("{} ({:?})", preview.file_name, preview.kind);
            println!("{}", preview.url.url);
            println!("expires {}", preview.url.expires_at.to_rfc3339());
            Ok(())
        }
        Commands::Trends {
            metric,
            from,
            to,
            export,
        } => {
            app.guard(Route::Dashboard).await?;
            let range = match (from, to) {
                (Some(from), Some(to)) => Some(DateRange::new(from, to)?),
                _ => None,
            };

            let mut view = TrendView::new();
            view.set_metric(metric);
            view.set_range(range);

            println!("{}", view.title());
            for point in view.points() {
                println!("{}  {}", point.date, point.value);
            }
            if let Some(path) = export {
                std::fs::write(&path, view.export_json()?)?;
                println!("Exported to {}", path.display());
            }
            Ok(())
        }
    }
}

async fn upload(app: &App, path: PathBuf) -> anyhow::Result<()> {
    app.guard(Route::Upload).await?;
    let session = app.session().current();
    let Some(owner) = session.identity().cloned() else {
        return Ok(());
    };

    let Some(file) = pick_file(&path)? else {
        eprintln!("Only PDF and image files can be uploaded.");
        return Err(Reported("unsupported file type".into()).into());
    };

    let pipeline = UploadPipeline::from_config(
        &app.cfg,
        app.backends.storage.clone(),
        app.backends.processing.clone(),
        Arc::new(MonotonicClock::new()),
    );
    let mut controller = UploadController::new(pipeline, app.navigator.clone(), app.notifier.clone());
    reported(controller.select(file))?;

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos:>3}% {msg}")?.progress_chars("##-"),
    );
    bar.set_message(path.display().to_string());

    let result = controller
        .submit(&owner, cancel, |p| bar.set_position(u64::from(p)))
        .await;
    bar.finish_and_clear();

    let receipt = reported(result)?;
    println!("Stored as {}", receipt.key);
    if let ProcessingOutcome::Indexed {
        message: Some(message),
    } = &receipt.processing
    {
        println!("{}", message);
    }
    Ok(())
}
