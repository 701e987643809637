mod logging;
mod repl;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use recall_chat::ChatEngine;
use recall_config::{Config, ConfigManager, StoreBackend};
use recall_core::{Message, Role};

#[derive(Parser)]
#[command(name = "recall")]
#[command(about = "Chat with a model that remembers your session")]
#[command(version)]
struct Cli {
    /// Config file path
    #[arg(long, env = "RECALL_CONFIG", default_value = "~/.recall/config.json", global = true)]
    config: String,

    /// 会话 ID
    #[arg(long, short, env = "RECALL_SESSION_ID", default_value = "user_001", global = true)]
    session_id: String,

    /// Session expiry in hours (0 = never)
    #[arg(long, value_parser = clap::value_parser!(u64).range(0..=recall_config::MAX_TTL_HOURS), global = true)]
    ttl_hours: Option<u64>,

    /// Keep history in process memory instead of Redis
    #[arg(long, default_value = "false", global = true)]
    memory: bool,

    /// Enable debug mode
    #[arg(long, short, default_value = "false", global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 启动交互式聊天
    Chat {
        /// Start under a fresh random session id
        #[arg(long, default_value = "false")]
        new_session: bool,
    },
    /// 发送单条消息
    Send {
        /// 消息内容
        message: String,
    },
    /// 查看会话历史
    History {
        /// Print raw JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },
    /// Show the number of stored messages
    Count,
    /// 清除会话历史
    Clear,
    /// Search the session history
    Search {
        query: String,
        #[arg(long, short, default_value_t = 5)]
        limit: usize,
    },
    /// Check store connectivity and model credentials
    Health,
    /// 配置管理命令
    Config(ConfigArgs),
}

#[derive(Args, Clone)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// 获取配置值
    Get {
        /// 配置键 (如: llm.model, store.default_ttl_hours)
        key: String,
    },
    /// 设置配置值
    Set {
        /// 配置键 (如: llm.model, store.default_ttl_hours)
        key: String,
        /// 配置值
        value: String,
    },
    /// 初始化默认配置
    Init {
        /// 强制覆盖已有配置
        #[arg(long, default_value = "false")]
        force: bool,
    },
    /// 显示当前配置
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let Cli {
        config: config_arg,
        session_id,
        ttl_hours,
        memory,
        debug,
        command,
    } = Cli::parse();

    if let Some(path) = recall_config::load_dotenv() {
        if debug {
            eprintln!("{}", format!("[DEBUG] Loaded {:?}", path).dimmed());
        }
    }

    let config_path = recall_config::expand_tilde(&config_arg)
        .unwrap_or_else(|| PathBuf::from(&config_arg));
    if debug {
        eprintln!("{}", format!("[DEBUG] Config path: {:?}", config_path).dimmed());
    }

    let command = match command {
        Commands::Config(args) => return handle_config(args, config_path).await,
        other => other,
    };

    let manager = ConfigManager::load(&config_path)
        .await
        .with_context(|| format!("failed to load config from {:?}", config_path))?;
    let mut config = manager.into_config();
    apply_cli_overrides(&mut config, ttl_hours, memory);

    let _log_guard = logging::init(&config.logging, debug)?;

    let engine = match ChatEngine::from_config(&config) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("{}", format!("❌ {}", e).red());
            eprintln!(
                "{}",
                format!("Set OPENROUTER_API_KEY or edit {:?}", config_path).dimmed()
            );
            std::process::exit(2);
        }
    };

    if debug {
        eprintln!(
            "{}",
            format!(
                "[DEBUG] model={} store={} ({}) ttl_hours={}",
                config.llm.model,
                config.store.backend,
                config.store.redacted_url(),
                config.store.default_ttl_hours
            )
            .dimmed()
        );
    }

    let session_id = session_id.as_str();
    match command {
        Commands::Chat { new_session } => {
            let session_id = if new_session {
                uuid::Uuid::new_v4().to_string()
            } else {
                session_id.to_string()
            };
            repl::run(&engine, &session_id, &config).await
        }
        Commands::Send { message } => send_message(&engine, session_id, &message).await,
        Commands::History { json } => show_history(&engine, session_id, json).await,
        Commands::Count => {
            let count = engine.get_message_count(session_id).await?;
            println!("{}", count);
            Ok(())
        }
        Commands::Clear => {
            engine.clear_session(session_id).await?;
            println!("{}", format!("🧹 Cleared session {}", session_id).green());
            Ok(())
        }
        Commands::Search { query, limit } => {
            search_history(&engine, session_id, &query, limit).await
        }
        Commands::Health => health(&engine).await,
        Commands::Config(_) => Ok(()),
    }
}

fn apply_cli_overrides(config: &mut Config, ttl_hours: Option<u64>, memory: bool) {
    if let Some(hours) = ttl_hours {
        config.store.default_ttl_hours = hours;
    }
    if memory {
        config.store.backend = StoreBackend::Memory;
    }
}

async fn handle_config(args: ConfigArgs, config_path: PathBuf) -> anyhow::Result<()> {
    match args.command {
        ConfigCommands::Get { key } => {
            let manager = ConfigManager::load(&config_path).await?;
            match manager.get().get_value(&key) {
                Some(value) => {
                    println!("{}", format!("{} = {}", key, value).green());
                }
                None => {
                    println!("{}", format!("❌ Key not found: {}", key).red());
                    std::process::exit(1);
                }
            }
        }
        ConfigCommands::Set { key, value } => {
            let mut manager = ConfigManager::load_file(&config_path).await?;
            if let Err(e) = manager.update(|config| config.set_value(&key, &value)).await {
                eprintln!("{}", format!("❌ Failed to set value: {}", e).red());
                std::process::exit(1);
            }
            println!("{}", format!("✅ Set {} = {}", key, value).green());
        }
        ConfigCommands::Init { force } => {
            if config_path.exists() && !force {
                println!(
                    "{}",
                    format!("⚠️  Config already exists at {:?}", config_path).yellow()
                );
                println!("{}", "Use --force to overwrite".dimmed());
                return Ok(());
            }

            let manager = ConfigManager::new(Config::default(), config_path.clone());
            manager.save().await?;

            println!(
                "{}",
                format!("✅ Config initialized at {:?}", config_path).green()
            );
            println!(
                "{}",
                "Set llm.api_key here or export OPENROUTER_API_KEY".dimmed()
            );
        }
        ConfigCommands::Show => {
            let manager = ConfigManager::load(&config_path).await?;
            let mut config = manager.into_config();
            if !config.llm.api_key.is_empty() {
                config.llm.api_key = "<set>".to_string();
            }
            config.store.url = config.store.redacted_url();

            println!("{}", "📋 Current Configuration:".cyan().bold());
            println!();
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

async fn send_message(engine: &ChatEngine, session_id: &str, message: &str) -> anyhow::Result<()> {
    let turn = engine.chat_turn(message, session_id).await?;
    println!("{}", turn.reply);
    eprintln!(
        "{}",
        format!(
            "[{} tokens, {} messages stored]",
            turn.usage.total_tokens,
            display_count(turn.message_count)
        )
        .dimmed()
    );
    Ok(())
}

async fn show_history(engine: &ChatEngine, session_id: &str, json: bool) -> anyhow::Result<()> {
    let history = engine.get_history(session_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&history)?);
        return Ok(());
    }

    if history.is_empty() {
        println!("{}", format!("No messages in session {}", session_id).dimmed());
        return Ok(());
    }
    for message in &history {
        print_message(message);
    }
    Ok(())
}

async fn search_history(
    engine: &ChatEngine,
    session_id: &str,
    query: &str,
    limit: usize,
) -> anyhow::Result<()> {
    match engine.search_history(session_id, query, limit).await? {
        None => {
            println!(
                "{}",
                format!(
                    "⚠️  The {} store does not support search (set store.enable_search)",
                    engine.store().backend()
                )
                .yellow()
            );
        }
        Some(found) if found.is_empty() => {
            println!("{}", format!("No messages mention {:?}", query).dimmed());
        }
        Some(found) => {
            for message in &found {
                print_message(message);
            }
        }
    }
    Ok(())
}

async fn health(engine: &ChatEngine) -> anyhow::Result<()> {
    let mut healthy = true;

    match engine.health_check().await {
        Ok(()) => println!("{}", format!("✅ {} store reachable", engine.store().backend()).green()),
        Err(e) => {
            healthy = false;
            println!("{}", format!("❌ Store: {}", e).red());
        }
    }

    match engine.validate_provider().await {
        Ok(()) => println!("{}", format!("✅ Model {} configured", engine.model()).green()),
        Err(e) => {
            healthy = false;
            println!("{}", format!("❌ Model: {}", e).red());
        }
    }

    if !healthy {
        std::process::exit(1);
    }
    Ok(())
}

pub(crate) fn print_message(message: &Message) {
    let label = match message.role {
        Role::User => "You:".cyan().bold(),
        Role::Assistant => "Assistant:".green().bold(),
        Role::System => "System:".yellow().bold(),
    };
    println!(
        "{} {} {}",
        message.created_at.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
        label,
        message.text()
    );
}

pub(crate) fn display_count(count: Option<u64>) -> String {
    count.map_or_else(|| "N/A".to_string(), |n| n.to_string())
}
