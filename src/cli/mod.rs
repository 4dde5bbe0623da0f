use std::io;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};

use crate::alert::Dispatcher;
use crate::aws::AwsContext;
use crate::core::{Category, ScanStatus};
use crate::engine::{EngineOptions, ScanEngine, StartScan};
use crate::ui::UiConfig;

#[derive(Debug, Parser)]
#[command(
    name = "awscan",
    version,
    about = "AWSアカウントの危険な設定（公開S3 / IAM管理者 / 公開EC2 / CloudTrail停止 / 開放SG）を検査し、通知とCSV出力を行う"
)]
pub struct Cli {
    #[arg(long, global = true)]
    pub json: bool,
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,
    #[arg(long, global = true)]
    pub verbose: bool,
    #[arg(long, global = true)]
    pub quiet: bool,
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[arg(long, default_value_t = 60, global = true)]
    pub timeout: u64,
    #[arg(long, global = true)]
    pub profile: Option<String>,
    #[arg(long, global = true)]
    pub region: Option<String>,
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    Scan(ScanArgs),
    Doctor(DoctorArgs),
    Ui(UiArgs),
    Completion(CompletionArgs),
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct ScanArgs {
    #[arg(long)]
    pub export_dir: Option<PathBuf>,
    #[arg(long)]
    pub no_alert: bool,
    #[arg(long)]
    pub no_export: bool,
}

#[derive(Debug, Args)]
pub struct DoctorArgs {}

#[derive(Debug, Args)]
pub struct UiArgs {}

#[derive(Debug, Args)]
pub struct CompletionArgs {
    pub shell: String,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[arg(long)]
    pub show: bool,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let stdin_is_tty = io::stdin().is_terminal();
    let stdout_is_tty = io::stdout().is_terminal();
    let stderr_is_tty = io::stderr().is_terminal();

    let home_dir = crate::config::home_dir()?;

    let env_config_path = std::env::var_os("AWSCAN_CONFIG").map(PathBuf::from);
    let cfg = crate::config::load(
        cli.config.as_deref().or(env_config_path.as_deref()),
        &home_dir,
    )
    .map_err(crate::exit::invalid_args_err)?;

    let color = stdout_is_tty && cfg.ui.color && !cli.no_color;

    let ui_cfg = UiConfig {
        color,
        stdin_is_tty,
        stdout_is_tty,
        stderr_is_tty,
        max_table_rows: cfg.ui.max_table_rows,
        quiet: cli.quiet,
        verbose: cli.verbose,
    };

    let is_ui_mode = matches!(&cli.command, Commands::Ui(_));
    let aws = AwsContext::new(
        cfg.scan.aws_bin.clone(),
        cli.profile.clone().or_else(|| cfg.scan.profile.clone()),
        cli.region.clone().or_else(|| cfg.scan.region.clone()),
    );
    let engine = ScanEngine::new(
        EngineOptions {
            timeout: Duration::from_secs(cli.timeout),
            show_progress: ui_cfg.stderr_is_tty && !cli.quiet && !cli.json && !is_ui_mode,
        },
        aws,
    );

    match cli.command {
        Commands::Scan(args) => {
            if engine.start_scan() == StartScan::AlreadyRunning {
                return Err(anyhow::anyhow!("スキャンが既に実行中です"));
            }
            engine.join();

            let state = engine.state();
            if state.status == ScanStatus::Error {
                return Err(anyhow::anyhow!(
                    "スキャンに失敗しました: {}",
                    state
                        .last_error
                        .as_deref()
                        .unwrap_or("原因不明のエラーです")
                ));
            }

            if cli.json {
                write_json(&engine.report())?;
            } else {
                crate::ui::print_scan_state(&state, &ui_cfg);
            }

            let dispatcher = if args.no_alert {
                Dispatcher::new(Vec::new())
            } else {
                Dispatcher::from_config(&cfg.alert)
            };
            let export_dir = if args.no_export {
                None
            } else {
                Some(
                    args.export_dir
                        .unwrap_or_else(|| PathBuf::from(&cfg.scan.export_dir)),
                )
            };

            if cli.dry_run {
                print_dry_run_delivery(&state, &dispatcher, export_dir.as_deref(), &ui_cfg);
                return Ok(());
            }

            let outcome = crate::engine::deliver(&state, &dispatcher, export_dir.as_deref());
            if !cli.json {
                crate::ui::print_delivery(&outcome, &ui_cfg);
            }
        }
        Commands::Doctor(_args) => {
            let timeout = std::cmp::min(Duration::from_secs(cli.timeout), Duration::from_secs(10));
            let version = engine
                .aws()
                .version(timeout)
                .map_err(crate::exit::aws_cmd_err)?;
            let identity = engine
                .aws()
                .caller_identity(timeout)
                .map_err(crate::exit::aws_cmd_err)?;
            if cli.json {
                let value = serde_json::json!({
                    "aws_cli": version,
                    "identity": identity,
                });
                let stdout = std::io::stdout();
                serde_json::to_writer_pretty(stdout.lock(), &value)?;
                println!();
            } else {
                crate::ui::print_doctor(&version, &identity, &ui_cfg);
            }
        }
        Commands::Ui(_args) => {
            if cli.json {
                return Err(crate::exit::invalid_args("ui は --json と併用できません"));
            }
            if !(ui_cfg.stdin_is_tty && ui_cfg.stdout_is_tty) {
                return Err(crate::exit::invalid_args(
                    "ui は TTY が必要です（stdin + stdout）",
                ));
            }
            crate::tui::run(engine, color)?;
        }
        Commands::Completion(_args) => {
            let shell = parse_shell(&_args.shell)?;
            let mut cmd = Cli::command();
            let mut out = std::io::stdout().lock();
            clap_complete::generate(shell, &mut cmd, "awscan", &mut out);
        }
        Commands::Config(_args) => {
            if _args.show {
                if cli.json {
                    let stdout = std::io::stdout();
                    serde_json::to_writer_pretty(stdout.lock(), &cfg)?;
                } else {
                    println!("{}", toml::to_string_pretty(&cfg)?);
                }
            } else if !ui_cfg.quiet {
                eprintln!("config: `awscan config --show` を使用してください");
            }
        }
    }

    Ok(())
}

fn print_dry_run_delivery(
    state: &crate::core::ScanState,
    dispatcher: &Dispatcher,
    export_dir: Option<&std::path::Path>,
    ui_cfg: &UiConfig,
) {
    if ui_cfg.quiet {
        return;
    }

    if dispatcher.is_empty() {
        println!("dry-run: 通知チャネルが構成されていないため、通知はありません。");
    } else {
        let channels = dispatcher.channel_names().join(", ");
        for category in Category::ALL {
            let Some(result) = state.categories.get(&category) else {
                continue;
            };
            if result.findings.is_empty() {
                continue;
            }
            let message = crate::alert::category_message(category, &result.findings);
            println!(
                "dry-run: 送信予定の通知（{channels}）: {}（{}件）",
                message.subject,
                result.findings.len()
            );
        }
    }

    match export_dir {
        Some(dir) => {
            for category in Category::ALL {
                println!(
                    "dry-run: 出力予定: {}",
                    dir.join(crate::export::file_name(category)).display()
                );
            }
        }
        None => println!("dry-run: エクスポートは無効です。"),
    }
}

fn write_json(report: &crate::core::Report) -> Result<()> {
    use std::io::Write;

    let buf = serde_json::to_vec_pretty(report)?;

    let mut stdout = std::io::stdout().lock();
    match stdout.write_all(&buf) {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => return Ok(()),
        Err(err) => return Err(err.into()),
    }
    match stdout.write_all(b"\n") {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn parse_shell(s: &str) -> Result<clap_complete::Shell> {
    let s = s.trim().to_ascii_lowercase();
    match s.as_str() {
        "bash" => Ok(clap_complete::Shell::Bash),
        "zsh" => Ok(clap_complete::Shell::Zsh),
        "fish" => Ok(clap_complete::Shell::Fish),
        other => Err(crate::exit::invalid_args(format!(
            "未対応のシェルです: {other}（bash|zsh|fish を指定してください）"
        ))),
    }
}
