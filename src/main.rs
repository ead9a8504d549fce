use admin_console::dashboard::Widget;
use admin_console::resources::{
    Category, EventDraft, Events, OrderStatus, Orders, ProductDraft, Products, Users,
    event::parse_form_datetime,
};
use admin_console::{
    AdminConsole, CliArgs, Confirm, ConsoleConfig, ConsoleError, ConsoleResult, Credentials,
    Draft, Editable, LoggingConfig, Mounted, Notice, Notifier, Preset, Screen,
    init_logging, logging::command_span, shutdown_telemetry, transport::Attachment,
};
use anyhow::Context;
use chrono::NaiveDateTime;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::{Value, json};
use std::fmt;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use strum::IntoEnumIterator;
use tracing::Instrument;

#[derive(Parser, Debug)]
#[command(name = "admin-console", version, about = "Admin console for the shop REST API")]
struct Cli {
    #[command(flatten)]
    args: CliArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and store the session token
    Login {
        #[arg(long, short = 'u')]
        user: String,
        /// Read from stdin when omitted; input typed at the prompt is echoed,
        /// so pipe it in or set ADMIN_CONSOLE_PASSWORD on shared terminals
        #[arg(long, env = "ADMIN_CONSOLE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Forget the stored session token
    Logout,
    /// Show whether a session is active
    Status,
    /// Fetch all dashboard widgets
    Dashboard,
    Products {
        #[command(subcommand)]
        action: ProductCommand,
    },
    Orders {
        #[command(subcommand)]
        action: OrderCommand,
    },
    Users {
        #[command(subcommand)]
        action: UserCommand,
    },
    Events {
        #[command(subcommand)]
        action: EventCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ProductCommand {
    List {
        /// Case-insensitive match on name or category
        #[arg(long)]
        search: Option<String>,
    },
    Create(ProductForm),
    Update {
        id: String,
        #[command(flatten)]
        form: ProductForm,
    },
    Delete {
        id: String,
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

#[derive(Args, Debug)]
struct ProductForm {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    price: Option<f64>,
    #[arg(long)]
    stock: Option<u32>,
    #[arg(long, value_parser = parse_known::<Category>)]
    category: Option<Category>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    trending: Option<bool>,
    /// Image file to upload; repeatable
    #[arg(long = "image", value_name = "FILE")]
    images: Vec<PathBuf>,
}

impl ProductForm {
    fn apply(&self, fields: &mut ProductDraft) {
        if let Some(name) = &self.name {
            fields.name = name.clone();
        }
        if self.price.is_some() {
            fields.price = self.price;
        }
        if self.stock.is_some() {
            fields.stock = self.stock;
        }
        if self.category.is_some() {
            fields.category = self.category.clone();
        }
        if let Some(description) = &self.description {
            fields.description = description.clone();
        }
        if let Some(trending) = self.trending {
            fields.trending = trending;
        }
    }
}

#[derive(Subcommand, Debug)]
enum OrderCommand {
    List,
    Show {
        id: String,
    },
    SetStatus {
        id: String,
        #[arg(value_parser = parse_known::<OrderStatus>)]
        status: OrderStatus,
    },
    Delete {
        id: String,
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    List,
    Delete {
        id: String,
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
enum EventCommand {
    List,
    Show {
        id: String,
    },
    Create(EventForm),
    Update {
        id: String,
        #[command(flatten)]
        form: EventForm,
    },
    Delete {
        id: String,
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

#[derive(Args, Debug)]
struct EventForm {
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    description: Option<String>,
    /// e.g. 2024-06-01T10:00
    #[arg(long, value_parser = parse_date_arg)]
    start: Option<NaiveDateTime>,
    #[arg(long, value_parser = parse_date_arg)]
    end: Option<NaiveDateTime>,
    #[arg(long)]
    discount: Option<f64>,
    #[arg(long = "image", value_name = "FILE")]
    images: Vec<PathBuf>,
}

impl EventForm {
    fn apply(&self, fields: &mut EventDraft) {
        if let Some(title) = &self.title {
            fields.title = title.clone();
        }
        if let Some(description) = &self.description {
            fields.description = description.clone();
        }
        if self.start.is_some() {
            fields.start_date = self.start;
        }
        if self.end.is_some() {
            fields.end_date = self.end;
        }
        if self.discount.is_some() {
            fields.discount = self.discount;
        }
    }
}

fn parse_date_arg(value: &str) -> Result<NaiveDateTime, String> {
    parse_form_datetime(value).map_err(|e| e.to_string())
}

/// Prints notices to stderr so stdout stays machine-readable.
struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn notify(&self, notice: Notice) {
        tracing::debug!(level = ?notice.level, message = %notice.message, "notice");
        eprintln!("{notice}");
    }
}

/// Asks on the terminal; anything but y/yes declines.
struct TerminalConfirm;

impl Confirm for TerminalConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        eprint!("{prompt} [y/N] ");
        let _ = io::stderr().flush();
        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }
}

fn confirmer(yes: bool) -> Box<dyn Confirm> {
    if yes {
        Box::new(Preset(true))
    } else {
        Box::new(TerminalConfirm)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _guard = init_logging(LoggingConfig::from_env())?;

    let cli = Cli::parse();
    let config = ConsoleConfig::from_args(cli.args)?;
    config.validate()?;

    let console = AdminConsole::from_config(&config, Arc::new(TerminalNotifier))
        .context("failed to build API client")?;

    let result = run(&console, &config, cli.command).await;

    shutdown_telemetry();

    match result {
        Err(error) if matches!(error.downcast_ref::<ConsoleError>(), Some(ConsoleError::Declined)) => {
            eprintln!("Cancelled.");
            Ok(())
        }
        other => other,
    }
}

async fn run(
    console: &AdminConsole,
    config: &ConsoleConfig,
    command: Command,
) -> anyhow::Result<()> {
    match command {
        Command::Login { user, password } => {
            let password = match password {
                Some(password) => password,
                None => read_password()?,
            };
            let next = console
                .login(&Credentials::new(user, password))
                .instrument(command_span("login"))
                .await?;
            tracing::debug!(%next, "login complete");
            Ok(())
        }
        Command::Logout => {
            console.logout()?;
            Ok(())
        }
        Command::Status => print_json(&json!({
            "authenticated": console.gate().is_authenticated(),
            "apiBaseUrl": config.api_base_url,
            "sessionFile": config.session_file,
        })),
        Command::Dashboard => {
            let mounted = console
                .mount(Screen::Dashboard)
                .instrument(command_span("dashboard"))
                .await;
            let Mounted::Dashboard(snapshot) = mounted else {
                return Err(ConsoleError::Unauthenticated.into());
            };
            print_json(&json!({
                "stats": widget_json(&snapshot.stats),
                "salesChart": widget_json(&snapshot.sales),
                "ordersChart": widget_json(&snapshot.orders),
                "stockStatus": widget_json(&snapshot.stock),
            }))
        }
        Command::Products { action } => products(console, action)
            .instrument(command_span("products"))
            .await,
        Command::Orders { action } => orders(console, action)
            .instrument(command_span("orders"))
            .await,
        Command::Users { action } => users(console, action)
            .instrument(command_span("users"))
            .await,
        Command::Events { action } => events(console, action)
            .instrument(command_span("events"))
            .await,
    }
}

async fn products(console: &AdminConsole, action: ProductCommand) -> anyhow::Result<()> {
    let controller = console.controller::<Products>()?;
    match action {
        ProductCommand::List { search } => {
            controller.list().await?;
            let items = match search {
                Some(term) => controller.filtered(&term),
                None => controller.items(),
            };
            print_json(&items)
        }
        ProductCommand::Create(form) => {
            controller.open_create();
            let attachments = load_attachments(&form.images).await?;
            fill_draft(&controller, attachments, |fields| form.apply(fields));
            print_ack(controller.submit_draft().await?.item)
        }
        ProductCommand::Update { id, form } => {
            controller.open_edit(&id).await?;
            let attachments = load_attachments(&form.images).await?;
            fill_draft(&controller, attachments, |fields| form.apply(fields));
            print_ack(controller.submit_draft().await?.item)
        }
        ProductCommand::Delete { id, yes } => {
            controller.delete(&id, confirmer(yes).as_ref()).await?;
            Ok(())
        }
    }
}

async fn orders(console: &AdminConsole, action: OrderCommand) -> anyhow::Result<()> {
    let controller = console.controller::<Orders>()?;
    match action {
        OrderCommand::List => print_json(&controller.list().await?),
        OrderCommand::Show { id } => print_json(&controller.get_one(&id).await?),
        OrderCommand::SetStatus { id, status } => {
            print_ack(controller.set_status(&id, status).await?.item)
        }
        OrderCommand::Delete { id, yes } => {
            controller.delete(&id, confirmer(yes).as_ref()).await?;
            Ok(())
        }
    }
}

async fn users(console: &AdminConsole, action: UserCommand) -> anyhow::Result<()> {
    let controller = console.controller::<Users>()?;
    match action {
        UserCommand::List => print_json(&controller.list().await?),
        UserCommand::Delete { id, yes } => {
            controller.delete(&id, confirmer(yes).as_ref()).await?;
            Ok(())
        }
    }
}

async fn events(console: &AdminConsole, action: EventCommand) -> anyhow::Result<()> {
    let controller = console.controller::<Events>()?;
    match action {
        EventCommand::List => print_json(&controller.list().await?),
        EventCommand::Show { id } => print_json(&controller.get_one(&id).await?),
        EventCommand::Create(form) => {
            controller.open_create();
            let attachments = load_attachments(&form.images).await?;
            fill_draft(&controller, attachments, |fields| form.apply(fields));
            print_ack(controller.submit_draft().await?.item)
        }
        EventCommand::Update { id, form } => {
            controller.open_edit(&id).await?;
            let attachments = load_attachments(&form.images).await?;
            fill_draft(&controller, attachments, |fields| form.apply(fields));
            print_ack(controller.submit_draft().await?.item)
        }
        EventCommand::Delete { id, yes } => {
            controller.delete(&id, confirmer(yes).as_ref()).await?;
            Ok(())
        }
    }
}

fn fill_draft<R: Editable>(
    controller: &admin_console::ResourceController<R>,
    attachments: Vec<Attachment>,
    apply: impl FnOnce(&mut R::Draft),
) {
    controller.edit_draft(|draft: &mut Draft<R::Draft>| apply(&mut draft.fields));
    for attachment in attachments {
        controller.attach(attachment);
    }
}

async fn load_attachments(paths: &[PathBuf]) -> ConsoleResult<Vec<Attachment>> {
    let mut attachments = Vec::with_capacity(paths.len());
    for path in paths {
        attachments.push(Attachment::from_path(path).await?);
    }
    Ok(attachments)
}

/// Accepts only the documented variants, case-insensitively.
fn parse_known<T>(value: &str) -> Result<T, String>
where
    T: FromStr + IntoEnumIterator + fmt::Display,
{
    value.trim().parse().map_err(|_| {
        let known: Vec<String> = T::iter().map(|variant| variant.to_string()).collect();
        format!("expected one of: {}", known.join(", "))
    })
}

fn read_password() -> anyhow::Result<String> {
    if io::stdin().is_terminal() {
        eprint!("Password (input is visible): ");
    }
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn widget_json<T: Serialize>(widget: &Widget<T>) -> Value {
    match widget {
        Ok(value) => serde_json::to_value(value).unwrap_or(Value::Null),
        Err(_) => Value::Null,
    }
}

fn print_ack<T: Serialize>(item: Option<T>) -> anyhow::Result<()> {
    match item {
        Some(item) => print_json(&item),
        None => Ok(()),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}
