//! Thunderproof CLI 工具

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use thunderproof_core::event::unix_now;
use thunderproof_core::format::{format_author, format_date, format_npub, star_bar, stars_label};
use thunderproof_core::share::profile_from_link;
use thunderproof_core::{
    ClientConfig, EmbedOptions, Profile, ReviewDraft, SessionStore, SignerMethod, ThunderproofClient,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "thunderproof")]
#[command(about = "Nostr 身份评价客户端", long_about = None)]
struct Cli {
    /// 中继地址（可重复，替换默认列表）
    #[arg(short, long = "relay")]
    relays: Vec<String>,

    /// 分享链接的基础地址
    #[arg(long, default_value = "http://localhost:8000/")]
    base_url: String,

    /// 查询超时（秒）
    #[arg(short, long, default_value_t = 10)]
    timeout: u64,

    /// 外部签名器超时（秒）
    #[arg(long, default_value_t = 60)]
    signer_timeout: u64,

    /// 会话文件路径
    #[arg(long, default_value = ".session")]
    session_file: PathBuf,

    /// 输出调试日志
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 查询身份资料与评价
    Search {
        /// npub 公钥
        npub: String,
    },
    /// 打开分享链接
    Open {
        /// 含 profile 参数的链接
        url: String,
    },
    /// 连接账户
    Connect {
        /// 使用私钥 (nsec)
        #[arg(long, conflicts_with_all = ["generate", "signer_cmd"])]
        nsec: Option<String>,
        /// 生成新密钥
        #[arg(long, conflicts_with = "signer_cmd")]
        generate: bool,
        /// 外部签名器命令
        #[arg(long)]
        signer_cmd: Option<String>,
    },
    /// 断开连接
    Disconnect,
    /// 显示当前账户
    Whoami,
    /// 发布评价
    Review {
        /// 被评价者 npub
        #[arg(long)]
        target: String,
        /// 评分 1-5
        #[arg(long)]
        rating: u8,
        /// 评价内容
        #[arg(long)]
        comment: String,
        /// 外部签名器命令（不使用已保存的会话）
        #[arg(long)]
        signer_cmd: Option<String>,
    },
    /// 生成分享链接和嵌入代码
    Share {
        /// npub 公钥
        npub: String,
        #[arg(long, default_value_t = 400)]
        width: u32,
        #[arg(long, default_value_t = 600)]
        height: u32,
        /// 最多显示的评价数
        #[arg(long, default_value_t = 5)]
        max: u32,
    },
    /// 检查中继状态
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();

    let mut config = ClientConfig {
        base_url: cli.base_url.clone(),
        query_timeout: Duration::from_secs(cli.timeout),
        signer_timeout: Duration::from_secs(cli.signer_timeout),
        ..Default::default()
    };
    if !cli.relays.is_empty() {
        config.relays = cli.relays.clone();
    }

    let client = ThunderproofClient::new(config)?.with_session_store(SessionStore::new(&cli.session_file));

    let result = match cli.command {
        Commands::Search { npub } => do_search(&client, &npub).await,
        Commands::Open { url } => do_open(&client, &url).await,
        Commands::Connect { nsec, generate, signer_cmd } => {
            do_connect(&client, nsec.as_deref(), generate, signer_cmd.as_deref()).await
        }
        Commands::Disconnect => do_disconnect(&client).await,
        Commands::Whoami => do_whoami(&client).await,
        Commands::Review { target, rating, comment, signer_cmd } => {
            do_review(&client, &target, rating, &comment, signer_cmd.as_deref()).await
        }
        Commands::Share { npub, width, height, max } => {
            do_share(&client, &npub, EmbedOptions { width, height, max_reviews: max }).await
        }
        Commands::Health => do_health(&client).await,
    };

    // 所有错误都只作为提示输出
    if let Err(e) = result {
        eprintln!("✗ {}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn print_profile(profile: &Profile, nip05_valid: Option<bool>) {
    println!("{}", profile.name);
    println!("  {}", format_npub(&profile.npub));
    println!("  {}", profile.about);
    if let Some(nip05) = &profile.nip05 {
        let mark = match nip05_valid {
            Some(true) => "✓",
            Some(false) => "✗",
            None => "?",
        };
        println!("  NIP-05: {} {}", nip05, mark);
    }
    if let Some(website) = &profile.website {
        println!("  网站: {}", website);
    }
    if let Some(lud16) = &profile.lud16 {
        println!("  ⚡ {}", lud16);
    }
}

async fn do_search(client: &ThunderproofClient, npub: &str) -> anyhow::Result<()> {
    println!("正在查询资料...");
    let profile = client.search(npub).await?;

    let nip05_valid = match client.verify_nip05().await {
        Ok(valid) => valid,
        Err(e) => {
            tracing::warn!("NIP-05 verification failed: {}", e);
            None
        }
    };

    println!();
    print_profile(&profile, nip05_valid);

    let stats = client.stats().await;
    println!();
    println!("评分: {:.1} {}  ({} 条评价)", stats.average, star_bar(stats.average), stats.total);
    if stats.total == 0 {
        println!("  暂无评分");
    } else {
        for bucket in &stats.breakdown {
            let width = (bucket.percentage / 5.0).round() as usize;
            println!(
                "  {:<7} {:<20} {:>5.1}% ({})",
                stars_label(bucket.stars),
                "█".repeat(width),
                bucket.percentage,
                bucket.count
            );
        }
    }

    let reviews = client.current_reviews().await;
    if !reviews.is_empty() {
        println!();
    }
    let now = unix_now();
    for review in &reviews {
        let author = thunderproof_core::PublicKey::from_hex(&review.author)
            .map(|pk| format_author(&pk.to_npub()))
            .unwrap_or_else(|_| format_author(&review.author));
        println!(
            "{} {}  {}{}",
            star_bar(review.rating as f64),
            author,
            format_date(review.created_at, now),
            if review.verified { "  ⚡ Verified" } else { "" }
        );
        println!("  {}", review.content);
    }

    Ok(())
}

async fn do_open(client: &ThunderproofClient, url: &str) -> anyhow::Result<()> {
    let npub = profile_from_link(url)?.ok_or_else(|| anyhow::anyhow!("链接中没有 profile 参数"))?;
    do_search(client, &npub).await
}

async fn do_connect(
    client: &ThunderproofClient,
    nsec: Option<&str>,
    generate: bool,
    signer_cmd: Option<&str>,
) -> anyhow::Result<()> {
    if let Some(nsec) = nsec {
        let session = client.connect_local(nsec).await?;
        println!("连接成功: {}", session.npub);
        println!("会话已保存到 {}", cli_session_path(client));
    } else if generate {
        let (keys, session) = client.generate_keys().await?;
        println!("已生成新密钥");
        println!("公钥（可分享）: {}", session.npub);
        println!("私钥（请妥善保存）: {}", keys.to_nsec());
        println!("会话已保存到 {}", cli_session_path(client));
    } else if let Some(cmd) = signer_cmd {
        let session = client.connect_external(cmd).await?;
        println!("已通过外部签名器连接: {}", session.npub);
        println!("外部签名器会话不会保存，发布评价时请再次指定 --signer-cmd");
    } else {
        anyhow::bail!("请指定 --nsec、--generate 或 --signer-cmd");
    }
    Ok(())
}

fn cli_session_path(client: &ThunderproofClient) -> String {
    client
        .session_store()
        .map(|store| store.path().display().to_string())
        .unwrap_or_default()
}

async fn do_disconnect(client: &ThunderproofClient) -> anyhow::Result<()> {
    client.disconnect().await?;
    println!("已断开连接");
    Ok(())
}

async fn do_whoami(client: &ThunderproofClient) -> anyhow::Result<()> {
    match client.restore_session().await? {
        Some(session) => {
            println!("{}", session.name);
            println!("  {}", session.npub);
            let method = match session.method {
                SignerMethod::LocalKey => "本地密钥",
                SignerMethod::Extension => "外部签名器",
            };
            println!("  签名方式: {}", method);
        }
        None => println!("未连接"),
    }
    Ok(())
}

async fn do_review(
    client: &ThunderproofClient,
    target: &str,
    rating: u8,
    comment: &str,
    signer_cmd: Option<&str>,
) -> anyhow::Result<()> {
    let draft = ReviewDraft::new(rating, comment);
    draft.validate()?;

    match signer_cmd {
        Some(cmd) => {
            client.connect_external(cmd).await?;
        }
        None => {
            if client.restore_session().await?.is_none() {
                return Err(thunderproof_core::Error::NotAuthenticated.into());
            }
        }
    }

    client.search(target).await?;
    println!("正在发布评价 ({})...", draft.char_counter());
    let report = client.submit_review(&draft).await?;

    println!("评价已发布: {}", report.event_id);
    for relay in &report.accepted {
        println!("  ✓ {}", relay);
    }
    for (relay, reason) in &report.rejected {
        println!("  ✗ {} ({})", relay, reason);
    }
    Ok(())
}

async fn do_share(client: &ThunderproofClient, npub: &str, options: EmbedOptions) -> anyhow::Result<()> {
    let pubkey = thunderproof_core::parse_search_query(npub)?;
    let npub = pubkey.to_npub();
    let base = &client.config().base_url;

    println!("分享链接:");
    println!("{}", thunderproof_core::share::share_url(base, &npub)?);
    println!();
    println!("嵌入代码:");
    println!("{}", thunderproof_core::share::embed_code(base, &npub, options)?);
    Ok(())
}

async fn do_health(client: &ThunderproofClient) -> anyhow::Result<()> {
    for health in client.relay_health().await {
        match health.info {
            Ok(info) => {
                let name = info.name.unwrap_or_else(|| "-".to_string());
                let software = info.software.unwrap_or_default();
                println!("✓ {}  {} {}", health.relay, name, software);
                if !info.supported_nips.is_empty() {
                    let nips: Vec<String> = info.supported_nips.iter().map(|n| n.to_string()).collect();
                    println!("    NIPs: {}", nips.join(", "));
                }
            }
            Err(e) => println!("✗ {}  {}", health.relay, e),
        }
    }
    Ok(())
}
