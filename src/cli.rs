//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::adapters::csv_adapter::CsvMarketData;
use crate::adapters::csv_ledger_adapter::CsvLedgerAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::log_presentation::LogPresentation;
use crate::adapters::paper_gateway::PaperGateway;
use crate::domain::engine::{evaluate_instrument, EngineEvent, LiveEngine};
use crate::domain::error::TraderError;
use crate::domain::instrument::Instrument;
use crate::domain::ledger::LedgerSummary;
use crate::domain::position_manager::PositionManager;
use crate::domain::signal::SignalEvent;
use crate::domain::trader_config::{LedgerBackend, LedgerConfig, TraderConfig};
use crate::ports::ledger_port::TradeLedger;

#[derive(Parser, Debug)]
#[command(
    name = "trailtrader",
    about = "Indicator-driven trading assistant with a trailing stop-loss"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the live engine (reads `buy <instrument>` / `sell <instrument>` from stdin)
    Run {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Compute indicators and signals once and print them
    Evaluate {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        instrument: Option<String>,
    },
    /// Print the trade ledger and its summary
    Ledger {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    init_tracing();
    match cli.command {
        Command::Run { config } => run_live(&config),
        Command::Evaluate { config, instrument } => run_evaluate(&config, instrument.as_deref()),
        Command::Ledger { config } => run_ledger(&config),
        Command::Validate { config } => run_validate(&config),
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the default `info`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = TraderError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

/// Load and validate in one step.
pub fn load_trader_config(path: &PathBuf) -> Result<TraderConfig, ExitCode> {
    let adapter = load_config(path)?;
    TraderConfig::from_config(&adapter).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })
}

pub fn open_ledger(config: &LedgerConfig) -> Result<Arc<dyn TradeLedger>, TraderError> {
    match config.backend {
        LedgerBackend::Csv => Ok(Arc::new(CsvLedgerAdapter::new(config.path.clone()))),
        #[cfg(feature = "sqlite")]
        LedgerBackend::Sqlite => {
            use crate::adapters::sqlite_ledger_adapter::SqliteLedgerAdapter;
            Ok(Arc::new(SqliteLedgerAdapter::open(&config.path)?))
        }
        #[cfg(not(feature = "sqlite"))]
        LedgerBackend::Sqlite => Err(TraderError::ConfigInvalid {
            section: "ledger".into(),
            key: "backend".into(),
            reason: "built without sqlite support".into(),
        }),
    }
}

fn build_runtime() -> Result<tokio::runtime::Runtime, ExitCode> {
    tokio::runtime::Runtime::new().map_err(|e| {
        let err = TraderError::Io(e);
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn run_live(config_path: &PathBuf) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let config = match load_trader_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let ledger = match open_ledger(&config.ledger) {
        Ok(l) => l,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let runtime = match build_runtime() {
        Ok(r) => r,
        Err(code) => return code,
    };

    let code = runtime.block_on(async move {
        let source = Arc::new(CsvMarketData::new(config.data.csv_dir.clone()));
        let gateway = Arc::new(PaperGateway::new(
            source.clone(),
            &config.timeframe,
            config.data.spread_pct,
        ));
        let (shutdown, _) = broadcast::channel(1);
        let positions = Arc::new(PositionManager::new(
            config.position_settings(),
            gateway,
            ledger,
            shutdown.clone(),
        ));
        let engine = LiveEngine::new(
            config.engine_settings(),
            source,
            Arc::new(LogPresentation),
            positions.clone(),
            shutdown.clone(),
        );

        tokio::spawn(forward_manual_commands(engine.event_sender()));
        let engine_handle = tokio::spawn(engine.run());

        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl-C");
        }
        info!("shutdown requested");
        let _ = shutdown.send(());

        if let Err(e) = engine_handle.await {
            error!(error = %e, "engine task failed");
            return ExitCode::from(1);
        }

        for position in positions.open_positions().await {
            info!(
                instrument = %position.instrument,
                entry_price = position.entry_price,
                stop_loss_price = position.stop_loss_price,
                "position still open at shutdown"
            );
        }
        ExitCode::SUCCESS
    });

    // stdin reads block a worker thread; do not wait on them.
    runtime.shutdown_timeout(Duration::from_millis(100));
    code
}

/// Turn operator lines from stdin into manual signals.
async fn forward_manual_commands(events: mpsc::Sender<EngineEvent>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }
        match SignalEvent::parse_manual(&line) {
            Some(event) => {
                if events.send(EngineEvent::Manual(event)).await.is_err() {
                    break;
                }
            }
            None => warn!(input = %line.trim(), "expected 'buy <instrument>' or 'sell <instrument>'"),
        }
    }
}

fn run_evaluate(config_path: &PathBuf, instrument: Option<&str>) -> ExitCode {
    let config = match load_trader_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let instruments = match instrument {
        Some(symbol) => {
            let wanted = Instrument::new(symbol);
            if !config.instruments.contains(&wanted) {
                let err = TraderError::UnknownInstrument { instrument: wanted };
                eprintln!("error: {err}");
                return (&err).into();
            }
            vec![wanted]
        }
        None => config.instruments.clone(),
    };

    let runtime = match build_runtime() {
        Ok(r) => r,
        Err(code) => return code,
    };
    let source = CsvMarketData::new(config.data.csv_dir.clone());
    let settings = config.engine_settings();

    let mut exit = ExitCode::SUCCESS;
    for instrument in &instruments {
        match runtime.block_on(evaluate_instrument(&source, instrument, &settings)) {
            Ok((series, signals)) => {
                let Some(point) = series.latest() else {
                    continue;
                };
                println!(
                    "{:<10} close {:>12.5}  ema_short {:>12.5}  ema_long {:>12.5}  macd {:>10.5}  signal {:>10.5}  rsi {:>6.2}",
                    instrument.as_str(),
                    point.close,
                    point.ema_short,
                    point.ema_long,
                    point.macd,
                    point.macd_signal,
                    point.rsi
                );
                for event in signals.into_events() {
                    println!("{:<10} signal: {}", instrument.as_str(), event.kind);
                }
            }
            Err(e) => {
                eprintln!("error: {}: {e}", instrument.as_str());
                exit = (&e).into();
            }
        }
    }
    exit
}

fn run_ledger(config_path: &PathBuf) -> ExitCode {
    let config = match load_trader_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let entries = match open_ledger(&config.ledger).and_then(|l| l.entries()) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    println!(
        "{:<10} {:<14} {:<14} {:>14} {:>14} {:>12}",
        "instrument", "buy", "sell", "buy_price", "sell_price", "profit"
    );
    for trade in &entries {
        println!(
            "{:<10} {:<14} {:<14} {:>14.5} {:>14.5} {:>12.5}",
            trade.instrument.as_str(),
            trade.buy_type.as_str(),
            trade.sell_type.as_str(),
            trade.buy_price,
            trade.sell_price,
            trade.profit()
        );
    }

    let summary = LedgerSummary::from_events(&entries);
    println!();
    println!(
        "trades: {}  wins: {}  losses: {}  win rate: {:.1}%  total profit: {:.5}",
        summary.trades,
        summary.wins,
        summary.losses,
        summary.win_rate() * 100.0,
        summary.total_profit
    );
    for (instrument, profit) in &summary.profit_by_instrument {
        println!("  {:<10} {:>14.5}", instrument.as_str(), profit);
    }
    ExitCode::SUCCESS
}

fn run_validate(config_path: &PathBuf) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let config = match load_trader_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    eprintln!("  instruments:   {}", config.instruments.len());
    for (instrument, decimals) in &config.precisions {
        eprintln!("    {:<10} precision {}", instrument.as_str(), decimals);
    }
    eprintln!("  timeframe:     {}", config.timeframe);
    eprintln!("  stop loss:     {}", config.stop_loss_percent);
    eprintln!(
        "  history:       {} candles per refresh",
        config.indicators.required_history()
    );
    eprintln!("  ledger:        {}", config.ledger.path.display());
    eprintln!("Config is valid.");
    ExitCode::SUCCESS
}
