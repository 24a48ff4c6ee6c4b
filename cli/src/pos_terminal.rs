//! # POS Terminal
//!
//! Command line front end for `lib_pos`. Loads `.env`, resolves the
//! configuration (defaults, config file, environment, flags), sets up
//! logging and runs one of:
//!
//! - `menu`: fetch the menu once and print it.
//! - `watch`: keep the menu live with the refresh scheduler. Type `r` to
//!   refresh, `bg`/`fg` to simulate the app leaving and returning to the
//!   foreground, `q` to quit.
//! - `login`: verify a staff PIN.
//! - `order`: place an order for the given item ids.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::mpsc;

use lib_pos::auth::{DEFAULT_STAFF_NAME, PIN_LENGTH};
use lib_pos::loggers::logger::setup_logging;
use lib_pos::orders::DeliveryStatus;
use lib_pos::{
    AppLifecycle, Cart, CatalogSnapshot, Category, LoadOutcome, LoginFlow, LoginOutcome, MenuBrowser, MenuCatalog,
    MenuFilter, MenuItem, PosConfig, RefreshScheduler, RefreshTrigger, StaffMeta, resolve_config_with_notes,
};

const APP_NAME: &str = "pos_terminal";

#[derive(Parser, Debug)]
#[command(author, version, about = "Yurica POS terminal", long_about = None)]
struct Cli {
    #[command(flatten)]
    config: PosConfig,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch the menu once and print it.
    Menu {
        /// Only items whose name contains this text.
        #[arg(long)]
        query: Option<String>,
        /// Only items in this category.
        #[arg(long)]
        category: Option<String>,
    },
    /// Keep the menu up to date until `q` or Ctrl-C.
    Watch {
        #[arg(long)]
        query: Option<String>,
        #[arg(long)]
        category: Option<String>,
    },
    /// Verify a staff PIN.
    Login {
        #[arg(long)]
        pin: String,
    },
    /// Place an order.
    Order {
        /// Item id to add; repeat for more units or items.
        #[arg(long = "add", required = true)]
        add: Vec<String>,
        #[arg(long)]
        table: Option<String>,
        #[arg(long)]
        customer: Option<String>,
        #[arg(long)]
        note: Option<String>,
        /// Staff name stamped on the order.
        #[arg(long)]
        staff: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let Cli { config, command } = Cli::parse();
    let (config, notes) = resolve_config_with_notes(config)?;
    let log_path = setup_logging(&config.log_dir(), config.log_level(), APP_NAME)?;
    log::info!("Logging to {}", log_path.display());
    for note in &notes {
        note.log();
    }
    log::debug!("{}", config);

    match command {
        Command::Menu { query, category } => run_menu(&config, build_filter(query, category)).await,
        Command::Watch { query, category } => run_watch(&config, build_filter(query, category)).await,
        Command::Login { pin } => run_login(&config, &pin).await,
        Command::Order {
            add,
            table,
            customer,
            note,
            staff,
        } => {
            let staff = StaffMeta {
                staff_name: staff.unwrap_or_else(|| DEFAULT_STAFF_NAME.to_string()),
                table,
                customer_name: customer,
                note,
            };
            run_order(&config, &add, &staff).await
        }
    }
}

fn build_filter(query: Option<String>, category: Option<String>) -> MenuFilter {
    MenuFilter::new(query.unwrap_or_default(), category.as_deref().map(Category::from))
}

fn render(snapshot: &CatalogSnapshot, visible: &[MenuItem]) {
    let status = if snapshot.is_initial_load() {
        "loading menu…".yellow()
    } else if snapshot.refreshing {
        "refreshing…".yellow()
    } else if snapshot.loading {
        "updating…".yellow()
    } else {
        match snapshot.last_updated {
            Some(at) => format!("updated {}", at.format("%H:%M:%S")).green(),
            None => "no menu yet".normal(),
        }
    };
    println!("{} {}", "Menu".bold(), status);
    if let Some(error) = &snapshot.error {
        println!("  {}", error.red());
    }
    if visible.is_empty() && !snapshot.is_initial_load() {
        println!("  {}", "No items".dimmed());
    }
    for item in visible {
        let category = item.category.as_ref().map(|c| c.to_string()).unwrap_or_default();
        println!(
            "  {:>6}  {:<28} {:>8} {}  {}",
            item.id,
            item.name,
            item.price.to_string(),
            item.currency,
            category.dimmed()
        );
    }
}

async fn run_menu(config: &PosConfig, filter: MenuFilter) -> Result<()> {
    let catalog = Arc::new(MenuCatalog::new());
    let scheduler = RefreshScheduler::new(config.build_menu_source()?, catalog.clone(), config.refresh_interval());

    if scheduler.load(RefreshTrigger::Mount).await != LoadOutcome::Applied {
        bail!("menu load was not applied");
    }
    let snapshot = catalog.snapshot();
    if let Some(error) = &snapshot.error {
        bail!("{}", error);
    }
    render(&snapshot, &filter.apply(&snapshot.items));
    Ok(())
}

async fn run_watch(config: &PosConfig, filter: MenuFilter) -> Result<()> {
    let catalog = Arc::new(MenuCatalog::new());
    let scheduler = RefreshScheduler::new(config.build_menu_source()?, catalog.clone(), config.refresh_interval());
    let (lifecycle_tx, lifecycle_rx) = mpsc::unbounded_channel();
    let handle = scheduler.start(lifecycle_rx);

    let mut browser = MenuBrowser::new(catalog.subscribe());
    browser.set_query(filter.query);
    browser.set_category(filter.category);

    println!("Commands: r = refresh, bg = background, fg = foreground, q = quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            changed = browser.changed() => {
                if !changed {
                    break;
                }
                let snapshot = catalog.snapshot();
                render(&snapshot, browser.visible());
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match line.trim() {
                    "" => {}
                    "r" => handle.scheduler().spawn_load(RefreshTrigger::Manual),
                    "bg" => {
                        let _ = lifecycle_tx.send(AppLifecycle::Background);
                        println!("{}", "(in background)".dimmed());
                    }
                    "fg" => {
                        let _ = lifecycle_tx.send(AppLifecycle::Active);
                    }
                    "q" | "quit" => break,
                    other => println!("Unknown command '{}'", other),
                }
            }
            _ = signal::ctrl_c() => {
                log::info!("Ctrl-C received, stopping.");
                break;
            }
        }
    }

    handle.shutdown().await;
    log::info!("Shutdown complete.");
    Ok(())
}

async fn run_login(config: &PosConfig, pin: &str) -> Result<()> {
    let mut flow = LoginFlow::new(config.build_pin_verifier()?);
    flow.input_mut().set_text(pin);

    match flow.submit().await {
        None => bail!("PIN must be {} digits", PIN_LENGTH),
        Some(LoginOutcome::Authenticated { staff_name }) => {
            println!("{} {}", "Welcome,".green(), staff_name.bold());
            Ok(())
        }
        Some(LoginOutcome::Rejected { feedback, .. }) | Some(LoginOutcome::Failed { feedback, .. }) => {
            Err(anyhow!("{}: {}", feedback.alert_title, feedback.alert_body))
        }
    }
}

async fn run_order(config: &PosConfig, ids: &[String], staff: &StaffMeta) -> Result<()> {
    let source = config.build_menu_source()?;
    let menu = source.fetch_menu().await.map_err(|e| anyhow!(e.describe()))?;

    let mut cart = Cart::new();
    for id in ids {
        if !menu.iter().any(|item| &item.id == id) {
            println!("{} {} is not on the menu", "warning:".yellow(), id);
        }
        cart.add(id);
    }

    let (submitter, mut failures) = config.build_order_submitter()?.with_failure_channel();
    let receipt = submitter.submit(&mut cart, &menu, staff).await?;
    // last sender goes with the background task
    drop(submitter);

    println!(
        "{} {}: {} lines, total {}",
        "Order".bold(),
        receipt.order_id,
        receipt.lines,
        receipt.total
    );

    if receipt.delivery == DeliveryStatus::Pending {
        let wait = config.fetch_timeout() + Duration::from_secs(1);
        if let Ok(Some(failure)) = tokio::time::timeout(wait, failures.recv()).await {
            bail!(
                "order {} was not delivered ({}); {} items restored to the cart",
                failure.order_id,
                failure.error.describe(),
                failure.restored.unit_count()
            );
        }
    }
    println!("{}", "Delivered.".green());
    Ok(())
}
