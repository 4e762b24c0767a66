//! storeadmin - command line admin client for the DummyJSON demo backend.
//!
//! Manages the authenticated session (login, logout, automatic refresh and
//! expiry) and gives read/write access to the products, posts, carts, and
//! users resources.

mod api;
mod auth;
mod config;
mod models;

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use api::ApiClient;
use auth::{CredentialStore, FileStorage, RestoreOutcome, SessionManager, SessionStore};
use config::Config;

/// Initialize the tracing subscriber. Controlled by RUST_LOG, quiet by
/// default so command output stays clean.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present, ignore if not
    let _ = dotenvy::dotenv();
    init_tracing();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("help");
    let rest: &[String] = if args.len() > 2 { &args[2..] } else { &[] };

    match command {
        "login" => cmd_login(rest).await,
        "logout" => cmd_logout().await,
        "status" => cmd_status().await,
        "watch" => cmd_watch().await,
        "products" => cmd_products(rest).await,
        "product" => cmd_product(rest).await,
        "posts" => cmd_posts(rest).await,
        "post" => cmd_post(rest).await,
        "carts" => cmd_carts(rest).await,
        "users" => cmd_users().await,
        "user" => cmd_user(rest).await,
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("unknown command: {}", other);
            print_usage();
            std::process::exit(2);
        }
    }
}

fn print_usage() {
    println!("storeadmin - admin client for the demo store backend");
    println!();
    println!("Usage:");
    println!("  storeadmin login <username> [--remember]   authenticate and start a session");
    println!("  storeadmin logout                          end the current session");
    println!("  storeadmin status                          show session state");
    println!("  storeadmin watch                           keep the session fresh until Ctrl-C");
    println!("  storeadmin products [query]                list or search products");
    println!("  storeadmin product <id>                    show one product");
    println!("  storeadmin posts [user-id]                 list posts, optionally by author");
    println!("  storeadmin post <id>                       show a post with its comments");
    println!("  storeadmin carts [user-id]                 list carts, optionally for a user");
    println!("  storeadmin users                           list users");
    println!("  storeadmin user <id>                       show one user");
    println!();
    println!("Environment: STOREADMIN_BASE_URL, STOREADMIN_PASSWORD, RUST_LOG");
}

struct AppContext {
    config: Config,
    client: ApiClient,
    manager: Arc<SessionManager>,
}

fn build_context() -> Result<AppContext> {
    let config = Config::load().context("failed to load configuration")?;

    let base_url = std::env::var("STOREADMIN_BASE_URL")
        .ok()
        .or_else(|| config.base_url.clone());
    let client = match base_url {
        Some(url) => ApiClient::with_base_url(url)?,
        None => ApiClient::new()?,
    };

    let storage = FileStorage::new(Config::data_dir()?)?;
    let store = SessionStore::new(Box::new(storage));
    let manager = Arc::new(SessionManager::new(Arc::new(client.clone()), store));

    Ok(AppContext {
        config,
        client,
        manager,
    })
}

/// Restore the persisted session and hand back a client carrying its token.
fn authenticated_client(ctx: &AppContext) -> Result<ApiClient> {
    match ctx.manager.restore_on_startup() {
        RestoreOutcome::Restored => {}
        RestoreOutcome::Expired => bail!("session expired, please log in again"),
        RestoreOutcome::NoSession => {
            bail!("not logged in; run `storeadmin login <username>` first")
        }
    }
    let session = ctx.manager.current().context("no current session")?;
    Ok(ctx.client.with_token(session.token))
}

fn prompt_password() -> Result<String> {
    print!("Password: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn expiry_display(expires_at_ms: i64) -> String {
    match chrono::DateTime::from_timestamp_millis(expires_at_ms) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M UTC").to_string(),
        None => format!("{} ms", expires_at_ms),
    }
}

// ============================================================================
// Session commands
// ============================================================================

async fn cmd_login(args: &[String]) -> Result<()> {
    let mut ctx = build_context()?;
    let remember = args.iter().any(|a| a == "--remember");

    let username = args
        .iter()
        .find(|a| !a.starts_with("--"))
        .cloned()
        .or_else(|| ctx.config.last_username.clone());
    let Some(username) = username else {
        bail!("no username given and none remembered; run `storeadmin login <username>`");
    };

    let password = match std::env::var("STOREADMIN_PASSWORD") {
        Ok(p) if !p.is_empty() => p,
        _ => {
            if CredentialStore::has_credentials(&username) {
                CredentialStore::get_password(&username)?
            } else {
                prompt_password()?
            }
        }
    };

    let session = ctx
        .manager
        .login(&username, &password)
        .await
        .context("login failed")?;

    if remember {
        CredentialStore::store(&username, &password)
            .context("failed to remember password in the keychain")?;
        println!("Password remembered for {}.", username);
    }

    ctx.config.last_username = Some(username);
    ctx.config.save().context("failed to save configuration")?;

    println!(
        "Logged in as {} <{}>. Session valid until {}.",
        session.principal.username,
        session.principal.email,
        expiry_display(session.expires_at)
    );
    Ok(())
}

async fn cmd_logout() -> Result<()> {
    let ctx = build_context()?;
    // Pick up whatever is persisted so logout clears it
    let _ = ctx.manager.restore_on_startup();
    ctx.manager.logout();
    println!("Logged out.");
    Ok(())
}

async fn cmd_status() -> Result<()> {
    let ctx = build_context()?;
    match ctx.manager.restore_on_startup() {
        RestoreOutcome::NoSession => println!("Not logged in."),
        RestoreOutcome::Expired => println!("Session expired; please log in again."),
        RestoreOutcome::Restored => {
            let session = ctx.manager.current().context("no current session")?;
            let now_ms = chrono::Utc::now().timestamp_millis();
            println!(
                "Logged in as {} <{}>.",
                session.principal.username, session.principal.email
            );
            println!(
                "Session expires {} ({} minutes remaining).",
                expiry_display(session.expires_at),
                session.minutes_remaining_at(now_ms)
            );
        }
    }
    Ok(())
}

async fn cmd_watch() -> Result<()> {
    let ctx = build_context()?;
    match ctx.manager.restore_on_startup() {
        RestoreOutcome::Restored => {}
        RestoreOutcome::Expired => bail!("session expired, please log in again"),
        RestoreOutcome::NoSession => bail!("not logged in; nothing to watch"),
    }

    let monitor = ctx.manager.spawn_monitor();
    let mut rx = ctx.manager.subscribe();
    info!("session monitor running");
    println!("Watching session; will refresh automatically. Ctrl-C to stop.");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("Stopping.");
                break;
            }
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                if !*rx.borrow_and_update() {
                    println!("Session ended (expired or refresh rejected); logged out.");
                    break;
                }
            }
        }
    }

    monitor.shutdown();
    Ok(())
}

// ============================================================================
// Resource commands
// ============================================================================

fn parse_id(args: &[String], what: &str) -> Result<i64> {
    let raw = args
        .first()
        .with_context(|| format!("missing {} id", what))?;
    raw.parse()
        .with_context(|| format!("invalid {} id: {}", what, raw))
}

async fn cmd_products(args: &[String]) -> Result<()> {
    let ctx = build_context()?;
    let client = authenticated_client(&ctx)?;
    let page_size = ctx.config.page_size();

    let resp = match args.first() {
        Some(query) => client.search_products(query, page_size, 0).await?,
        None => client.list_products(page_size, 0).await?,
    };

    println!("{:>6}  {:<44} {:>10} {:>7}", "ID", "TITLE", "PRICE", "STOCK");
    for p in &resp.products {
        println!(
            "{:>6}  {:<44} {:>10.2} {:>7}",
            p.id,
            truncate(&p.title, 44),
            p.price,
            p.stock
        );
    }
    println!(
        "Showing {} of {} products.",
        resp.products.len(),
        resp.total
    );
    Ok(())
}

async fn cmd_product(args: &[String]) -> Result<()> {
    let ctx = build_context()?;
    let client = authenticated_client(&ctx)?;
    let product = client.get_product(parse_id(args, "product")?).await?;

    println!("{} (#{})", product.title, product.id);
    println!("  Category: {}", product.category);
    if let Some(brand) = &product.brand {
        println!("  Brand:    {}", brand);
    }
    println!(
        "  Price:    {:.2} ({:.0}% off -> {:.2})",
        product.price,
        product.discount_percentage,
        product.discounted_price()
    );
    println!("  Stock:    {}   Rating: {:.2}", product.stock, product.rating);
    if !product.description.is_empty() {
        println!("  {}", product.description);
    }
    Ok(())
}

async fn cmd_posts(args: &[String]) -> Result<()> {
    let ctx = build_context()?;
    let client = authenticated_client(&ctx)?;

    let resp = match args.first() {
        Some(_) => client.posts_by_user(parse_id(args, "user")?).await?,
        None => client.list_posts(ctx.config.page_size(), 0).await?,
    };

    println!("{:>6}  {:<52} {:>7} {:>7}", "ID", "TITLE", "LIKES", "VIEWS");
    for post in &resp.posts {
        println!(
            "{:>6}  {:<52} {:>7} {:>7}",
            post.id,
            truncate(&post.title, 52),
            post.reactions.likes,
            post.views
        );
    }
    println!("Showing {} of {} posts.", resp.posts.len(), resp.total);
    Ok(())
}

async fn cmd_post(args: &[String]) -> Result<()> {
    let ctx = build_context()?;
    let client = authenticated_client(&ctx)?;
    let id = parse_id(args, "post")?;

    let post = client.get_post(id).await?;
    println!("{} (#{}, author {})", post.title, post.id, post.user_id);
    if !post.tags.is_empty() {
        println!("  tags: {}", post.tags.join(", "));
    }
    println!();
    println!("{}", post.body);

    let comments = client.post_comments(id).await?;
    if !comments.comments.is_empty() {
        println!();
        println!("Comments ({}):", comments.total);
        for comment in &comments.comments {
            println!("  {}: {}", comment.user.username, comment.body);
        }
    }
    Ok(())
}

async fn cmd_carts(args: &[String]) -> Result<()> {
    let ctx = build_context()?;
    let client = authenticated_client(&ctx)?;

    let resp = match args.first() {
        Some(_) => client.carts_for_user(parse_id(args, "user")?).await?,
        None => client.list_carts(ctx.config.page_size(), 0).await?,
    };

    println!(
        "{:>6} {:>8} {:>7} {:>10} {:>12}",
        "ID", "USER", "ITEMS", "TOTAL", "DISCOUNTED"
    );
    for cart in &resp.carts {
        println!(
            "{:>6} {:>8} {:>7} {:>10.2} {:>12.2}",
            cart.id, cart.user_id, cart.total_quantity, cart.total, cart.discounted_total
        );
    }
    println!("Showing {} of {} carts.", resp.carts.len(), resp.total);
    Ok(())
}

async fn cmd_users() -> Result<()> {
    let ctx = build_context()?;
    let client = authenticated_client(&ctx)?;
    let resp = client.list_users(ctx.config.page_size(), 0).await?;

    println!("{:>6}  {:<16} {:<26} {}", "ID", "USERNAME", "NAME", "EMAIL");
    for user in &resp.users {
        println!(
            "{:>6}  {:<16} {:<26} {}",
            user.id,
            user.username,
            truncate(&user.full_name(), 26),
            user.email
        );
    }
    println!("Showing {} of {} users.", resp.users.len(), resp.total);
    Ok(())
}

async fn cmd_user(args: &[String]) -> Result<()> {
    let ctx = build_context()?;
    let client = authenticated_client(&ctx)?;
    let user = client.get_user(parse_id(args, "user")?).await?;

    println!("{} ({})", user.full_name(), user.username);
    println!("  Email: {}", user.email);
    if let Some(phone) = &user.phone {
        println!("  Phone: {}", phone);
    }
    if let Some(role) = &user.role {
        println!("  Role:  {}", role);
    }
    Ok(())
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
