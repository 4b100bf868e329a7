use dotenvy::dotenv;
use pressgate::bot::handlers::{get_user_id_safe, Command};
use pressgate::bot::{callbacks, handlers, App};
use pressgate::config::{
    Settings, CATEGORY_CACHE_TTL_SECS, DENIAL_CACHE_MAX_SIZE, DENIAL_COOLDOWN_SECS,
    RATE_LIMIT_MAX_ATTEMPTS, RATE_LIMIT_WINDOW_SECS,
};
use pressgate::gateway::categories::CategoryCache;
use pressgate::gateway::{PublishingGateway, WpClient};
use pressgate::store::UserStore;
use pressgate::wizard::Conversations;
use pressgate::bot::rate_limit::{DenialCache, RateLimiter};
use regex::Regex;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;
use tracing::{error, info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Regex patterns for redacting credentials from log output
struct RedactionPatterns {
    token_in_url: Regex,
    bare_token: Regex,
    basic_auth: Regex,
}

impl RedactionPatterns {
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            token_in_url: Regex::new(r"(https?://[^/]+/bot)([0-9]+:[A-Za-z0-9_-]+)(/?)")?,
            bare_token: Regex::new(r"[0-9]{8,10}:[A-Za-z0-9_-]{35}")?,
            basic_auth: Regex::new(r"Basic [A-Za-z0-9+/=]{16,}")?,
        })
    }

    fn redact(&self, input: &str) -> String {
        let mut output = self
            .token_in_url
            .replace_all(input, "$1[TELEGRAM_TOKEN]$3")
            .to_string();
        output = self
            .bare_token
            .replace_all(&output, "[TELEGRAM_TOKEN]")
            .to_string();
        self.basic_auth
            .replace_all(&output, "Basic [MASKED]")
            .to_string()
    }
}

struct RedactingWriter<W: Write> {
    inner: W,
    patterns: Arc<RedactionPatterns>,
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let redacted = self.patterns.redact(&s);
        self.inner.write_all(redacted.as_bytes())?;
        // Report the original length to satisfy the Write contract even
        // when redaction changed the byte count
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
    patterns: Arc<RedactionPatterns>,
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter {
            inner: (self.make_inner)(),
            patterns: self.patterns.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let patterns = Arc::new(RedactionPatterns::new().map_err(|e| {
        eprintln!("Failed to compile redaction patterns: {e}");
        e
    })?);
    init_logging(patterns);

    info!("Starting pressgate...");

    let settings = init_settings();
    let users = init_user_store(&settings).await;

    let gateway: Arc<dyn PublishingGateway> = Arc::new(WpClient::new(&settings));
    let categories = Arc::new(CategoryCache::new(
        Arc::clone(&gateway),
        Duration::from_secs(CATEGORY_CACHE_TTL_SECS),
    ));
    // Warm the cache so the first wizard pass doesn't pay the fetch; not fatal
    match categories.get(true).await {
        Ok(list) => info!("Categories cached: {} items", list.len()),
        Err(e) => warn!("Initial category fetch failed: {e}"),
    }

    let bot = Bot::new(settings.telegram_token.clone());

    let app = Arc::new(App {
        settings,
        users,
        gateway,
        categories,
        conversations: Arc::new(Conversations::new()),
        rate_limiter: Arc::new(RateLimiter::new(
            RATE_LIMIT_MAX_ATTEMPTS,
            Duration::from_secs(RATE_LIMIT_WINDOW_SECS),
        )),
        denials: Arc::new(DenialCache::new(DENIAL_COOLDOWN_SECS, DENIAL_CACHE_MAX_SIZE)),
    });

    info!("Bot is running...");

    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![app])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

fn init_logging(patterns: Arc<RedactionPatterns>) {
    let make_writer = RedactingMakeWriter {
        make_inner: io::stderr,
        patterns,
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}

fn init_settings() -> Arc<Settings> {
    match Settings::new() {
        Ok(s) => {
            info!("Configuration loaded successfully.");
            Arc::new(s)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}

async fn init_user_store(settings: &Settings) -> Arc<UserStore> {
    if settings.superuser_id.is_none() {
        warn!("SUPERUSER_ID not set – no superuser will be recognized");
    }
    match UserStore::load(
        settings.superuser_id,
        settings.max_num_users,
        &settings.users_file,
        &settings.passcodes_file,
    )
    .await
    {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("Failed to load user store: {}", e);
            std::process::exit(1);
        }
    }
}

fn schema() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(Update::filter_callback_query().endpoint(callback_entry))
        .branch(
            Update::filter_message()
                .branch(
                    dptree::entry()
                        .filter_command::<Command>()
                        .endpoint(command_entry),
                )
                .branch(
                    // Free text and photos from known users go to the wizard
                    dptree::filter(|msg: Message, app: Arc<App>| {
                        app.users.level_of(get_user_id_safe(&msg)).is_some()
                    })
                    .endpoint(message_entry),
                )
                .branch(dptree::endpoint(unauthorized_entry)),
        )
}

async fn command_entry(
    bot: Bot,
    msg: Message,
    cmd: Command,
    app: Arc<App>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handlers::handle_command(bot, msg, cmd, app).await {
        error!("Command error: {e:#}");
    }
    respond(())
}

async fn message_entry(
    bot: Bot,
    msg: Message,
    app: Arc<App>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = Box::pin(handlers::handle_message(bot, msg, app)).await {
        error!("Message handler error: {e:#}");
    }
    respond(())
}

async fn callback_entry(
    bot: Bot,
    q: CallbackQuery,
    app: Arc<App>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = Box::pin(callbacks::handle_callback(bot.clone(), q.clone(), app)).await {
        error!("Callback query error: {e:#}");
        let _ = bot
            .answer_callback_query(q.id)
            .text("Error processing action")
            .await;
    }
    respond(())
}

async fn unauthorized_entry(
    bot: Bot,
    msg: Message,
    app: Arc<App>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handlers::deny_unknown(&bot, &msg, &app).await {
        error!("Denial handler error: {e:#}");
    }
    respond(())
}
