//! Mini Casino command-line front end

use clap::{Parser, Subcommand};
use mini_casino::{
    config::{CasinoConfig, ConfigLoader, StorageBackend},
    errors::{CasinoResult, LedgerError},
    games::{
        blackjack::{hand_value, Card, DealerStep, Phase, Seat},
        pacing::{play_spin_frames, RevealTimings, TokioPacer},
        slots::{Grid, ReelStrip, SpinOutcome},
        RouletteBet,
    },
    Casino, CasinoError, OsRandom,
};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Mini Casino CLI
#[derive(Parser)]
#[command(name = "mini-casino")]
#[command(about = "Token wallet with slots, roulette and blackjack")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Data directory for the profile store
    #[arg(short, long)]
    data_dir: Option<String>,

    /// Keep everything in memory for this run
    #[arg(long)]
    ephemeral: bool,

    /// Profile to play as
    #[arg(short, long)]
    profile: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage profiles
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },

    /// Show the selected profile's balance
    Balance,

    /// Claim today's bonus
    Claim,

    /// Profiles ranked by balance
    Leaderboard,

    /// Spin the slot machine
    Slots {
        /// Bet per line (raised to the table minimum)
        #[arg(short, long, default_value = "100")]
        bet: u64,

        /// Active paylines, 1 or 5
        #[arg(short, long, default_value = "1")]
        lines: u32,

        /// Number of spins; more than one runs autospin
        #[arg(short, long, default_value = "1")]
        spins: u32,

        /// Play the free-spin variant
        #[arg(long)]
        bonus: bool,
    },

    /// Spin the roulette wheel
    Roulette {
        /// red, black, odd, even or a number 0-36
        #[arg(short, long)]
        bet: RouletteBet,

        /// Tokens to wager
        #[arg(short, long)]
        stake: i64,
    },

    /// Play one hand of blackjack interactively
    Blackjack {
        /// Tokens to wager
        #[arg(short, long)]
        bet: u64,

        /// Skip the reveal delays
        #[arg(long)]
        fast: bool,
    },
}

#[derive(Subcommand)]
enum ProfileAction {
    /// Register a new profile with the starting balance
    Create { name: String },
    /// Remove a profile and its wallet
    Delete { name: String },
    /// List registered profiles
    List,
    /// Show a profile's wallet, creating it if needed
    Select { name: String },
}

#[tokio::main]
async fn main() -> CasinoResult<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ConfigLoader::new().with_path(path).load()?,
        None => ConfigLoader::new().load()?,
    };
    if cli.ephemeral {
        config.storage.backend = StorageBackend::Memory;
    }
    if let Some(dir) = cli.data_dir {
        config.storage.data_directory = dir;
    }
    init_logging(&config);

    let mut casino = Casino::open(config)?;
    if let Some(name) = &cli.profile {
        casino.select_profile(name)?;
    }

    match cli.command {
        Commands::Profile { action } => run_profile(&mut casino, action)?,
        Commands::Balance => {
            let balance = casino.balance()?;
            let claim = if casino.can_claim_today()? {
                "today's bonus is available"
            } else {
                "today's bonus already claimed"
            };
            println!("{} tokens ({})", balance, claim);
        }
        Commands::Claim => match casino.claim_daily() {
            Ok(balance) => println!(
                "+{} tokens, balance {}",
                casino.config().ledger.daily_amount,
                balance
            ),
            Err(CasinoError::Ledger(LedgerError::AlreadyClaimed { balance })) => {
                println!("Already claimed today, balance {}", balance)
            }
            Err(e) => return Err(e),
        },
        Commands::Leaderboard => {
            for (rank, entry) in casino.leaderboard()?.iter().enumerate() {
                println!("{:>2}. {:<20} {:>10}", rank + 1, entry.name, entry.balance);
            }
        }
        Commands::Slots { bet, lines, spins, bonus } => run_slots(&mut casino, bet, lines, spins, bonus).await?,
        Commands::Roulette { bet, stake } => {
            let outcome = casino.play_roulette(bet, stake)?;
            println!("Ball lands on {} ({:?})", outcome.number, outcome.color);
            if outcome.won {
                println!("{} wins: +{} tokens", outcome.bet, outcome.receipt.payout);
            } else {
                println!("{} loses", outcome.bet);
            }
            println!("Balance: {}", outcome.receipt.balance);
        }
        Commands::Blackjack { bet, fast } => run_blackjack(&mut casino, bet, fast).await?,
    }

    Ok(())
}

fn init_logging(config: &CasinoConfig) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.monitoring.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run_profile(casino: &mut Casino, action: ProfileAction) -> CasinoResult<()> {
    match action {
        ProfileAction::Create { name } => {
            let entry = casino.create_profile(&name)?;
            println!("Created {} with {} tokens", entry.name, entry.balance);
        }
        ProfileAction::Delete { name } => {
            let entry = casino.delete_profile(&name)?;
            println!("Deleted {}", entry.name);
        }
        ProfileAction::List => {
            let max = casino.directory().get_max_profiles()?;
            let profiles = casino.list_profiles()?;
            println!("{} of {} profiles", profiles.len(), max);
            for entry in profiles {
                println!("  {:<20} {:>10}", entry.name, entry.balance);
            }
        }
        ProfileAction::Select { name } => {
            let state = casino.select_profile(&name)?;
            println!(
                "{}: {} tokens, {} wins / {} losses",
                name.trim(),
                state.balance,
                state.stats.wins,
                state.stats.losses
            );
        }
    }
    Ok(())
}

fn print_grid(grid: &Grid) {
    for row in grid {
        let cells: Vec<String> = row.iter().map(|s| s.to_string()).collect();
        println!("  {}", cells.join(" "));
    }
}

fn print_spin(outcome: &SpinOutcome) {
    print_grid(&outcome.grid);
    if outcome.wins.is_empty() {
        println!("No winning line");
    } else {
        println!(
            "{} winning line(s), x{} -> +{}",
            outcome.wins.len(),
            outcome.multiplier,
            outcome.win
        );
    }
    for (i, free) in outcome.free_spins.iter().enumerate() {
        println!("Free spin {}:", i + 1);
        print_grid(&free.grid);
        if free.win > 0 {
            println!("  +{}", free.win);
        }
        if free.retriggered {
            println!("  Retrigger!");
        }
    }
}

async fn run_slots(casino: &mut Casino, bet: u64, lines: u32, spins: u32, bonus: bool) -> CasinoResult<()> {
    if spins > 1 {
        let report = casino.autospin(bet, lines, spins, bonus)?;
        for outcome in &report.spins {
            print_spin(outcome);
        }
        println!(
            "{} spins, staked {}, won {} ({:?})",
            report.spins.len(),
            report.total_staked(),
            report.total_won(),
            report.stopped
        );
        println!("Balance: {}", casino.balance()?);
        return Ok(());
    }

    let outcome = if bonus {
        casino.play_bonus_slots(bet, lines)?
    } else {
        casino.play_slots(bet, lines)?
    };

    // preview frames are decoration only and never touch the session's draws
    let preview = ReelStrip::base();
    let mut preview_rng = OsRandom;
    play_spin_frames(&TokioPacer, &RevealTimings::default(), |_| {
        let grid = preview.spin_grid(&mut preview_rng);
        let cells: Vec<String> = grid[1].iter().map(|s| s.to_string()).collect();
        println!("  {}", cells.join(" "));
    })
    .await;

    print_spin(&outcome);
    println!("Balance: {}", outcome.receipt.balance);
    Ok(())
}

fn show_card(card: &Card, face_down: bool) -> String {
    if face_down {
        "??".to_string()
    } else {
        card.to_string()
    }
}

fn show_hand(cards: &[Card]) -> String {
    cards.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(" ")
}

async fn run_blackjack(casino: &mut Casino, bet: u64, fast: bool) -> CasinoResult<()> {
    let mut timings = RevealTimings::default();
    if fast {
        timings = RevealTimings {
            card_enter: std::time::Duration::ZERO,
            hole_flip: std::time::Duration::ZERO,
            before_dealer: std::time::Duration::ZERO,
            dealer_draw: std::time::Duration::ZERO,
            ..timings
        };
    }
    let pacer = TokioPacer;

    casino.clear_bet();
    casino.add_chip(bet);
    let mut phase = casino
        .deal_paced(&pacer, &timings, |dealt| {
            let seat = match dealt.seat {
                Seat::Player => "You",
                Seat::Dealer => "Dealer",
            };
            println!("{:<6} {}", seat, show_card(&dealt.card, dealt.face_down));
        })
        .await?;

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    while phase == Phase::PlayerTurn {
        let table = casino.blackjack();
        let options = if table.can_double() {
            "[h]it [s]tand [d]ouble"
        } else {
            "[h]it [s]tand"
        };
        println!("You: {} ({})  {}", show_hand(table.player_hand()), table.player_value(), options);

        let Ok(Some(line)) = input.next_line().await else {
            // stdin closed: stand on what we have
            casino.stand()?;
            break;
        };
        let result = match line.trim().to_ascii_lowercase().as_str() {
            "h" | "hit" => casino.hit().map(|card| println!("You draw {}", card)),
            "s" | "stand" => casino.stand(),
            "d" | "double" => casino.double().map(|card| println!("Doubled, you draw {}", card)),
            other => {
                println!("Unknown action '{}'", other);
                Ok(())
            }
        };
        if let Err(e) = result {
            println!("{}", e);
        }
        phase = casino.blackjack().phase();
    }

    let outcome = casino
        .finish_paced(&pacer, &timings, |step| match step {
            DealerStep::RevealedHole(card) => println!("Dealer reveals {}", card),
            DealerStep::Drew(card) => println!("Dealer draws {}", card),
            DealerStep::Stood(value) => println!("Dealer has {}", value),
        })
        .await?;

    println!(
        "You {} ({}) vs dealer {} ({}): {:?}",
        show_hand(&outcome.player),
        hand_value(&outcome.player),
        show_hand(&outcome.dealer),
        outcome.dealer_value,
        outcome.result
    );
    if outcome.receipt.payout > 0 {
        println!("Paid {}", outcome.receipt.payout);
    }
    println!("Balance: {}", outcome.receipt.balance);
    Ok(())
}
