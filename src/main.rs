//! Binary entrypoint for the wagonwheel CLI.
//!
//! Commands:
//! - `init` - write a starter `config.toml` and create the data directory
//! - `stock [--count <n>] [--seed <s>]` - roll and print a sample stock
//! - `status` - summarize configuration and stored players
//! - `start` - run the cart with an interactive console surface on stdin/stdout
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use log::{debug, info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};

use wagonwheel::cart::catalog::ItemCatalog;
use wagonwheel::cart::dice::RandDice;
use wagonwheel::cart::events::{CartEvent, EventBus};
use wagonwheel::cart::ledger::{CharacterStore, Ledger};
use wagonwheel::cart::listing::format_offer_listing;
use wagonwheel::cart::stock::StockGenerator;
use wagonwheel::cart::surface::LocalSurface;
use wagonwheel::cart::types::{ChannelId, GuildId, Reaction, UserId, NUMBER_EMOJIS};
use wagonwheel::cart::{CartService, OpenOutcome};
use wagonwheel::config::Config;
use wagonwheel::storage::{CartStore, CartStoreBuilder};

#[derive(Parser)]
#[command(name = "wagonwheel")]
#[command(about = "A traveling merchant cart for text adventure games")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration and create the data directory
    Init,
    /// Roll a sample stock and print it
    Stock {
        /// Number of offers (defaults to the configured stock_count)
        #[arg(short = 'n', long)]
        count: Option<usize>,
        /// Fixed RNG seed
        #[arg(short, long)]
        seed: Option<u64>,
    },
    /// Show configuration and storage summary
    Status,
    /// Run the cart with an interactive console
    Start,
}

const CONSOLE_HELP: &str = "\
commands:
  open <guild> <channel> [bypass]   bring the cart
  close <guild>                     send the cart away
  react <guild> <user> <1-9>        react to the guild's cart
  say <channel> <user> <text>       type a message (quantity replies)
  balance <user> | deposit <user> <amount> | sheet <user>
  status <guild> | help | quit";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let pre_config = match cli.command {
        Commands::Init => None,
        _ => Config::load(&cli.config).await.ok(),
    };
    init_logging(&pre_config, cli.verbose);

    match cli.command {
        Commands::Init => {
            info!("Initializing new cart configuration");
            Config::create_default(&cli.config).await?;
            info!("Configuration file created at {}", cli.config);
            let cfg = Config::default();
            let store = CartStore::open(cfg.db_path())?;
            info!(
                "Initialized cart store at {} ({} characters)",
                cfg.db_path().display(),
                store.len_characters()
            );
        }
        Commands::Stock { count, seed } => {
            let config = pre_config.unwrap_or_default();
            let catalog = load_catalog(&config)?;
            let mut dice = match seed.or(config.cart.rng_seed) {
                Some(seed) => RandDice::seeded(seed),
                None => RandDice::from_entropy(),
            };
            let stock = StockGenerator::new(&catalog, config.cart.enable_chests)
                .generate(count.unwrap_or(config.cart.stock_count), &mut dice)?;
            println!(
                "{}",
                format_offer_listing(&config.cart.cart_name, &stock, &config.bank.currency_name)
            );
        }
        Commands::Status => {
            let config = match pre_config {
                Some(c) => c,
                None => Config::load(&cli.config).await?,
            };
            let catalog = load_catalog(&config)?;
            let store = CartStore::open(config.db_path())?;
            println!("cart:        {}", config.cart.cart_name);
            println!("chests:      {}", if config.cart.enable_chests { "on" } else { "off" });
            println!("stock size:  {}", config.cart.stock_count);
            println!("catalog:     {} items", catalog.len());
            println!("characters:  {}", store.len_characters());
            let mut guilds: Vec<_> = config.guilds.iter().collect();
            guilds.sort_by(|a, b| a.0.cmp(b.0));
            for (id, g) in guilds {
                println!(
                    "guild {}: timeout {}s, channels {:?}, cartroom {:?}, schedule {}",
                    id,
                    g.cart_timeout,
                    g.cart_channels,
                    g.cartroom,
                    if g.cooldown > 0 { format!("every {}s", g.cooldown) } else { "off".into() }
                );
            }
        }
        Commands::Start => {
            let config = match pre_config {
                Some(c) => c,
                None => Config::load(&cli.config).await?,
            };
            info!("Starting wagonwheel v{}", env!("CARGO_PKG_VERSION"));
            run_console(config).await?;
        }
    }

    Ok(())
}

fn load_catalog(config: &Config) -> Result<ItemCatalog> {
    let catalog = match &config.storage.catalog_file {
        Some(path) => ItemCatalog::load(path)?,
        None => ItemCatalog::bundled()?,
    };
    if catalog.is_empty() {
        return Err(anyhow!("item catalog is empty"));
    }
    Ok(catalog)
}

async fn run_console(config: Config) -> Result<()> {
    let catalog = Arc::new(load_catalog(&config)?);
    let store = Arc::new(
        CartStoreBuilder::new(config.db_path())
            .currency_name(config.bank.currency_name.clone())
            .starting_balance(config.bank.starting_balance)
            .open()?,
    );
    let surface = Arc::new(LocalSurface::new().with_echo(true));
    let events = Arc::new(EventBus::default());
    let config = Arc::new(config);
    let service = CartService::new(
        Arc::clone(&config),
        catalog,
        surface.clone(),
        store.clone(),
        store.clone(),
        events.clone(),
    );

    let listener = service.spawn_reaction_listener();
    let mut schedulers = Vec::new();
    for (guild, settings) in config.scheduled_guilds() {
        let service = service.clone();
        let channel = ChannelId(settings.cart_channels[0]);
        info!("cart scheduled in guild {} every {}s", guild, settings.cooldown);
        schedulers.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(settings.cooldown));
            loop {
                ticker.tick().await;
                match service.open_cart(guild, channel, false).await {
                    Ok(outcome) if !outcome.is_opened() => {
                        debug!("scheduled cart in guild {} skipped", guild)
                    }
                    Ok(_) => {}
                    Err(e) => warn!("scheduled cart in guild {} failed: {}", guild, e),
                }
            }
        }));
    }
    let mut arrivals = events.subscribe();
    let announcer = tokio::spawn(async move {
        while let Ok(event) = arrivals.recv().await {
            if let CartEvent::Arrived { guild, channel } = event {
                info!("cart arriving in guild {} channel {}", guild, channel);
            }
        }
    });

    println!("{}", CONSOLE_HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.is_empty() {
            continue;
        }
        match console_command(&service, &surface, &store, &words).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => println!("error: {}", e),
        }
    }

    listener.abort();
    announcer.abort();
    for task in schedulers {
        task.abort();
    }
    for guild in service.state().open_guilds().await {
        service.close_cart(guild).await;
    }
    info!("wagonwheel stopped");
    Ok(())
}

fn id_arg(words: &[&str], i: usize, what: &str) -> Result<u64> {
    words
        .get(i)
        .ok_or_else(|| anyhow!("missing {}", what))?
        .parse::<u64>()
        .map_err(|_| anyhow!("{} must be a number", what))
}

/// Run one console line. Returns `false` to quit.
async fn console_command(
    service: &CartService,
    surface: &LocalSurface,
    store: &CartStore,
    words: &[&str],
) -> Result<bool> {
    match words[0] {
        "quit" | "exit" => return Ok(false),
        "help" => println!("{}", CONSOLE_HELP),
        "open" => {
            let guild = GuildId(id_arg(words, 1, "guild")?);
            let channel = ChannelId(id_arg(words, 2, "channel")?);
            let bypass = words.get(3) == Some(&"bypass");
            match service.open_cart(guild, channel, bypass).await? {
                OpenOutcome::Opened(snapshot) => {
                    println!("cart open for {}s", snapshot.countdown_secs)
                }
                OpenOutcome::Suppressed(reason) => println!("no cart: {:?}", reason),
            }
        }
        "close" => {
            let guild = GuildId(id_arg(words, 1, "guild")?);
            if !service.close_cart(guild).await {
                println!("no cart in guild {}", guild);
            }
        }
        "react" => {
            let guild = GuildId(id_arg(words, 1, "guild")?);
            let user = UserId(id_arg(words, 2, "user")?);
            let n = id_arg(words, 3, "offer number")? as usize;
            let emoji = n
                .checked_sub(1)
                .and_then(|i| NUMBER_EMOJIS.get(i))
                .ok_or_else(|| anyhow!("offer number must be 1-9"))?;
            let (snapshot, _) = service
                .status(guild)
                .await
                .ok_or_else(|| anyhow!("no cart in guild {}", guild))?;
            store.ensure_account(user)?;
            let heard = surface.inject_reaction(Reaction {
                guild,
                message: snapshot.message,
                user,
                emoji: emoji.to_string(),
            });
            if !heard {
                warn!("reaction by {} in guild {} went unheard", user, guild);
            }
        }
        "say" => {
            let channel = ChannelId(id_arg(words, 1, "channel")?);
            let user = UserId(id_arg(words, 2, "user")?);
            let text = words.get(3..).map(|w| w.join(" ")).unwrap_or_default();
            surface.inject_reply(channel, user, &text);
        }
        "balance" => {
            let user = UserId(id_arg(words, 1, "user")?);
            println!("{}: {}", user, store.balance(user).await?);
        }
        "deposit" => {
            let user = UserId(id_arg(words, 1, "user")?);
            let amount = id_arg(words, 2, "amount")?;
            println!("{}: {}", user, store.deposit(user, amount).await?);
        }
        "sheet" => {
            let user = UserId(id_arg(words, 1, "user")?);
            let sheet = store.load(user).await?;
            println!(
                "{}: chests normal {} rare {} epic {}",
                user, sheet.treasure[0], sheet.treasure[1], sheet.treasure[2]
            );
            for (name, stack) in &sheet.backpack {
                println!("  {} x{} ({})", name, stack.owned, stack.item.rarity.as_str());
            }
        }
        "status" => {
            let guild = GuildId(id_arg(words, 1, "guild")?);
            match service.status(guild).await {
                Some((snapshot, countdown)) => {
                    println!(
                        "{} in channel {}: {} offers, {} buying, leaves in {}",
                        snapshot.cart_name,
                        snapshot.channel,
                        snapshot.stock.len(),
                        snapshot.active_buyers,
                        countdown.map(|t| t.text()).unwrap_or_else(|| "?".into())
                    );
                }
                None => println!("no cart in guild {}", guild),
            }
        }
        other => println!("unknown command '{}' (try help)", other),
    }
    Ok(true)
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity wins; otherwise the configured level
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .and_then(|c| c.logging.level.parse().ok())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);
    let log_file = config
        .as_ref()
        .and_then(|c| c.logging.file.as_ref())
        .and_then(|path| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .ok()
        });
    if let Some(f) = log_file {
        let file = std::sync::Mutex::new(f);
        // mirror to the console only when someone is watching it
        let is_tty = atty::is(atty::Stream::Stdout);
        builder.format(move |fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            let line = format!("{} [{}] {}", ts, record.level(), record.args());
            if let Ok(mut guard) = file.lock() {
                let _ = writeln!(guard, "{}", line);
            }
            if is_tty {
                writeln!(fmt, "{}", line)
            } else {
                Ok(())
            }
        });
    } else {
        builder.format(|fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
        });
    }
    let _ = builder.try_init();
}
