use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use brand_invoice::config::{self, AppSettings};
use brand_invoice::draft::DraftController;
use brand_invoice::error::Result;
use brand_invoice::export::{DocumentRenderer, TypstRenderer};
use brand_invoice::form::{self, Form};
use brand_invoice::mail::{Dispatcher, HttpMailRelay};
use brand_invoice::preview;
use brand_invoice::render::RenderModel;
use brand_invoice::store::{FileStore, Persistence};

#[derive(Parser)]
#[command(name = "brand-invoice", about = "Create branded invoices, export them to PDF and email them")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure data directory, mail relay and defaults
    Config,
    #[command(flatten)]
    Invoice(InvoiceCommand),
}

#[derive(Subcommand)]
enum InvoiceCommand {
    /// Start a new invoice in the interactive form
    New,
    /// Open a saved invoice in the interactive form
    Open { id: i64 },
    /// List saved clients
    Clients,
    /// Delete a saved client
    DeleteClient { id: i64 },
    /// List saved invoices, newest first
    History,
    /// Delete a saved invoice
    DeleteInvoice { id: i64 },
    /// Preview a saved invoice
    Show { id: i64 },
    /// Export a saved invoice to PDF
    Download {
        id: i64,
        /// Target directory (defaults to <data root>/output)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print a saved invoice
    Print { id: i64 },
    /// Email a saved invoice as a PDF attachment
    Email {
        id: i64,
        /// Recipient address
        #[arg(long)]
        to: String,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        Cli::command().print_help().ok();
        return;
    };

    if let Err(e) = run(command) {
        error!(error = %e, "command failed");
        println!("❌ {}", form::user_message(&e));
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Config => config::setup_config_wizard().map(drop),
        Commands::Invoice(command) => run_invoice(command),
    }
}

fn run_invoice(command: InvoiceCommand) -> Result<()> {
    let settings = config::load_settings()?;
    debug!(root = %settings.root().display(), backend = %settings.backend_url, "settings loaded");

    let mut persistence = Persistence::new(FileStore::new(settings.store_dir()));

    match command {
        InvoiceCommand::New => {
            let controller = DraftController::new(settings.fresh_draft());
            run_form(&settings, controller, persistence)?;
        }
        InvoiceCommand::Open { id } => {
            let record = persistence.load_invoice(id)?;
            let mut controller = DraftController::new(settings.fresh_draft());
            controller.load_record(&record);
            run_form(&settings, controller, persistence)?;
        }
        InvoiceCommand::Clients => {
            let clients = persistence.list_clients()?;
            if clients.is_empty() {
                println!("(No saved clients)");
            } else {
                println!("{}", preview::clients_table(&clients));
            }
        }
        InvoiceCommand::DeleteClient { id } => {
            if persistence.delete_client(id)? {
                println!("✅ Client deleted!");
            } else {
                println!("❌ No client with id {}.", id);
            }
        }
        InvoiceCommand::History => {
            let history = persistence.list_invoices()?;
            if history.is_empty() {
                println!("(No saved invoices)");
            } else {
                println!("{}", preview::history_table(&history));
            }
        }
        InvoiceCommand::DeleteInvoice { id } => {
            if persistence.delete_invoice(id)? {
                println!("✅ Invoice deleted!");
            } else {
                println!("❌ No invoice with id {}.", id);
            }
        }
        InvoiceCommand::Show { id } => {
            let record = persistence.load_invoice(id)?;
            println!("{}", preview::render_preview(&RenderModel::from_draft(&record.draft)));
        }
        InvoiceCommand::Download { id, out } => {
            let record = persistence.load_invoice(id)?;
            println!("🔨 Compiling PDF...");
            let document = renderer(&settings)?.render(&RenderModel::from_draft(&record.draft))?;
            let path = document.save_to(&out.unwrap_or_else(|| settings.output_dir()))?;
            println!("✅ Invoice downloaded: {}", path.display());
        }
        InvoiceCommand::Print { id } => {
            let record = persistence.load_invoice(id)?;
            println!("🔨 Compiling PDF...");
            renderer(&settings)?.render(&RenderModel::from_draft(&record.draft))?.print()?;
            println!("✅ Sent to printer.");
        }
        InvoiceCommand::Email { id, to } => {
            let record = persistence.load_invoice(id)?;
            let dispatcher = Dispatcher::new(renderer(&settings)?, HttpMailRelay::new(&settings.backend_url));
            println!("📤 Sending...");
            dispatcher.dispatch(&record.draft, &to)?;
            println!("✅ Invoice sent successfully!");
        }
    }
    Ok(())
}

fn renderer(settings: &AppSettings) -> Result<TypstRenderer> {
    TypstRenderer::with_template_dir(settings.typst_bin.clone(), &settings.template_dir())
}

fn run_form(settings: &AppSettings, controller: DraftController, persistence: Persistence<FileStore>) -> Result<()> {
    let dispatcher = Dispatcher::new(renderer(settings)?, HttpMailRelay::new(&settings.backend_url));
    Form::new(controller, persistence, dispatcher, settings.output_dir()).run();
    Ok(())
}
