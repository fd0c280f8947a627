use color_eyre::eyre::{Result, eyre};
use raffle_client::{client, config, wallet};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::EnvFilter;

fn print_usage_and_exit() -> ! {
    println!(
        "Usage: raffle-client [--devnet | --testnet | --local] [--rpc-url <url>]\n\
         [--package <id>] [--wallet <name>] [--wallet-dir <path>]\n\
         \n\
         Flags:\n\
           --devnet            Connect to devnet (default RPC {})\n\
           --testnet           Connect to testnet (default RPC {})\n\
           --local             Connect to a local node (default RPC {})\n\
           --rpc-url <url>     Override the RPC URL for the selected network\n\
           --package <id>      Override the raffle contract package id\n\
           --wallet <name>     Keystore wallet to unlock for signing\n\
           --wallet-dir <path> Override wallet directory (defaults to ~/.raffle/wallets)\n\
         \n\
         Environment:\n\
           {}  Package id override (checked after --package)\n\
           {}      RPC URL override",
        config::DEFAULT_DEVNET_RPC_URL,
        config::DEFAULT_TESTNET_RPC_URL,
        config::DEFAULT_LOCAL_RPC_URL,
        config::PACKAGE_ID_ENV,
        config::RPC_URL_ENV,
    );
    std::process::exit(0);
}

fn parse_cli_args() -> Result<config::AppConfig> {
    #[derive(Clone, Copy)]
    enum NetworkFlag {
        Devnet,
        Testnet,
        Local,
    }

    let mut args = std::env::args().skip(1);
    let mut network_flag: Option<NetworkFlag> = None;
    let mut custom_url: Option<String> = None;
    let mut package: Option<String> = None;
    let mut wallet_dir: Option<String> = None;
    let mut wallet_name: Option<String> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--devnet" => {
                if network_flag.is_some() {
                    return Err(eyre!(
                        "Multiple network flags provided; choose one of --devnet/--testnet/--local"
                    ));
                }
                network_flag = Some(NetworkFlag::Devnet);
            }
            "--testnet" => {
                if network_flag.is_some() {
                    return Err(eyre!(
                        "Multiple network flags provided; choose one of --devnet/--testnet/--local"
                    ));
                }
                network_flag = Some(NetworkFlag::Testnet);
            }
            "--local" => {
                if network_flag.is_some() {
                    return Err(eyre!(
                        "Multiple network flags provided; choose one of --devnet/--testnet/--local"
                    ));
                }
                network_flag = Some(NetworkFlag::Local);
            }
            "--rpc-url" => {
                let url = args
                    .next()
                    .ok_or_else(|| eyre!("--rpc-url requires a URL argument"))?;
                if custom_url.is_some() {
                    return Err(eyre!("--rpc-url may only be specified once"));
                }
                if network_flag.is_none() {
                    return Err(eyre!(
                        "--rpc-url must follow a network flag (--devnet/--testnet/--local)"
                    ));
                }
                custom_url = Some(url);
            }
            "--package" => {
                let id = args
                    .next()
                    .ok_or_else(|| eyre!("--package requires a package id"))?;
                if package.is_some() {
                    return Err(eyre!("--package may only be specified once"));
                }
                package = Some(id);
            }
            "--wallet-dir" => {
                let dir = args
                    .next()
                    .ok_or_else(|| eyre!("--wallet-dir requires a path argument"))?;
                if wallet_dir.is_some() {
                    return Err(eyre!("--wallet-dir may only be specified once"));
                }
                wallet_dir = Some(dir);
            }
            "--wallet" => {
                let name = args
                    .next()
                    .ok_or_else(|| eyre!("--wallet requires a wallet name"))?;
                if wallet_name.is_some() {
                    return Err(eyre!("--wallet may only be specified once"));
                }
                wallet_name = Some(name);
            }
            "--help" | "-h" => print_usage_and_exit(),
            other => return Err(eyre!("Unknown argument: {other}")),
        }
    }

    let network = match network_flag {
        None => {
            return Err(eyre!(
                "Select a network with --devnet, --testnet, or --local"
            ));
        }
        Some(NetworkFlag::Devnet) => config::NetworkTarget::Devnet {
            url: custom_url.unwrap_or_else(|| config::DEFAULT_DEVNET_RPC_URL.to_string()),
        },
        Some(NetworkFlag::Testnet) => config::NetworkTarget::Testnet {
            url: custom_url.unwrap_or_else(|| config::DEFAULT_TESTNET_RPC_URL.to_string()),
        },
        Some(NetworkFlag::Local) => config::NetworkTarget::LocalNode {
            url: custom_url.unwrap_or_else(|| config::DEFAULT_LOCAL_RPC_URL.to_string()),
        },
    };

    let package_override = package
        .map(|raw| {
            raw.parse()
                .map_err(|err| eyre!("--package is not a valid object id: {err}"))
        })
        .transpose()?;

    let owner = wallet_name
        .ok_or_else(|| eyre!("Specify --wallet <name> to select a keystore wallet"))?;
    let dir = wallet::resolve_wallet_dir(wallet_dir.as_deref())?;

    Ok(config::AppConfig {
        network,
        wallets: config::WalletConfig::Keystore { owner, dir },
        package_override,
        poll_interval: config::DEFAULT_POLL_INTERVAL,
    })
}

fn init_tracing() -> WorkerGuard {
    // The TUI owns stdout, so logs go to a rolling file.
    let appender = rolling::daily(".raffle/logs", "raffle-client.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(writer)
        .with_ansi(false)
        .try_init();
    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let _guard = init_tracing();
    tracing::info!("starting raffle client");
    let app_config = parse_cli_args()?;
    client::run_app(app_config).await
}
