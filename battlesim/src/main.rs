use anyhow::Result;
use battlesim_core::profiling::TraceLevel;
use battlesim_core::{
    Battle, DiceMode, GameEngine, Round, Settings, Side, SimulationConfig, SimulationProgress,
    WinRateSimulator,
};
use clap::{Parser, ValueEnum};

mod scenario;

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Engine {
    Imperator,
    Eu4,
}

impl From<Engine> for GameEngine {
    fn from(engine: Engine) -> Self {
        match engine {
            Engine::Imperator => GameEngine::Imperator,
            Engine::Eu4 => GameEngine::Eu4,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Round-based land battle simulator", long_about = None)]
struct Args {
    /// Rule set
    #[arg(long, value_enum, default_value_t = Engine::Imperator)]
    engine: Engine,

    /// Number of battles to simulate
    #[arg(short, long, default_value_t = 1000)]
    battles: u32,

    /// Battles per chunk between progress reports
    #[arg(long, default_value_t = 100)]
    chunk_size: u32,

    /// Base seed; battle i uses seed + i. Random when omitted.
    #[arg(long)]
    seed: Option<u64>,

    /// Attacker cohorts, e.g. "infantry=10,cavalry=4"
    #[arg(long, default_value = "infantry=10")]
    attacker_cohorts: String,

    /// Defender cohorts, e.g. "infantry=8,archers=2"
    #[arg(long, default_value = "infantry=10")]
    defender_cohorts: String,

    #[arg(long, default_value_t = 0.0)]
    attacker_martial: f64,

    #[arg(long, default_value_t = 0.0)]
    defender_martial: f64,

    /// Combat width (engine default when omitted)
    #[arg(long)]
    width: Option<u32>,

    /// Fixed attacker dice roll
    #[arg(long)]
    attacker_dice: Option<u8>,

    /// Fixed defender dice roll
    #[arg(long)]
    defender_dice: Option<u8>,

    /// Run one battle and print every round
    #[arg(long)]
    single: bool,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Tracy span level (info, debug, trace); needs the `tracy` feature
    #[arg(long, default_value = "info")]
    trace_level: String,
}

fn dice_mode(fixed: Option<u8>) -> DiceMode {
    fixed.map_or(DiceMode::Random, DiceMode::Fixed)
}

fn build_battle(args: &Args) -> Result<Battle> {
    let engine = GameEngine::from(args.engine);
    let mut settings = Settings::for_engine(engine);
    if let Some(width) = args.width {
        settings.combat_width = width;
    }
    let roster = scenario::standard_roster(engine);

    let attacker_mix = scenario::parse_cohort_mix(&args.attacker_cohorts)?;
    let defender_mix = scenario::parse_cohort_mix(&args.defender_cohorts)?;
    let mut attacker = scenario::build_army(&roster, &attacker_mix, args.attacker_martial, 1)?;
    let next_id = attacker.cohorts.len() as u32 + 1;
    let mut defender =
        scenario::build_army(&roster, &defender_mix, args.defender_martial, next_id)?;
    attacker.dice = dice_mode(args.attacker_dice);
    defender.dice = dice_mode(args.defender_dice);

    Ok(Battle::new(settings, Vec::new(), roster, attacker, defender)?)
}

fn side_totals(battle: &Battle, round: &Round, side: Side) -> (f64, f64) {
    battle
        .prepared()
        .side(side)
        .cohorts
        .iter()
        .filter_map(|&ix| round.cohort(ix))
        .fold((0.0, 0.0), |(strength, morale), state| {
            (strength + state.strength.max(0.0), morale + state.morale.max(0.0))
        })
}

fn run_single(args: &Args, mut battle: Battle) -> Result<()> {
    if let Some(seed) = args.seed {
        battle.set_seed(seed);
    }
    let outcome = battle.run_to_end();

    if args.json {
        let rounds: Vec<&Round> = battle.rounds().map(|r| &**r).collect();
        let report = serde_json::json!({
            "outcome": outcome,
            "seed": battle.seed(),
            "rounds": rounds,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for round in battle.rounds().skip(2) {
        let (a_strength, a_morale) = side_totals(&battle, round, Side::Attacker);
        let (d_strength, d_morale) = side_totals(&battle, round, Side::Defender);
        println!(
            "Round {:>3} {:?} dice {}/{} | attacker {:>7.0} men {:>6.2} morale | defender {:>7.0} men {:>6.2} morale",
            round.number,
            round.phase,
            round.side(Side::Attacker).dice,
            round.side(Side::Defender).dice,
            a_strength,
            a_morale,
            d_strength,
            d_morale
        );
    }
    println!(
        "Outcome: {:?} after {} rounds (seed {})",
        outcome,
        battle.round_number().max(0),
        battle.seed()
    );
    Ok(())
}

fn print_progress(progress: &SimulationProgress) {
    println!("Battles:      {}/{}", progress.completed, progress.requested);
    println!("Attacker win: {:.1}%", progress.attacker_win_rate * 100.0);
    println!("Defender win: {:.1}%", progress.defender_win_rate * 100.0);
    println!("Draw:         {:.1}%", progress.draw_rate * 100.0);
    println!("Incomplete:   {:.1}%", progress.incomplete_rate * 100.0);
    println!("Avg rounds:   {:.1}", progress.average_rounds);
    println!("Stack wipes:  {}", progress.stack_wipes);
    for side in Side::BOTH {
        let casualties = &progress.casualties[side.index()];
        let losses = &progress.losses[side.index()];
        println!(
            "{}: {:.1}% strength, {:.1}% morale left, {:.1} cost lost",
            side,
            casualties.average_strength_remaining * 100.0,
            casualties.average_morale_remaining * 100.0,
            losses.total()
        );
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = std::str::FromStr::from_str(&args.log_level).unwrap_or(log::LevelFilter::Info);
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .init();

    let trace_level: TraceLevel = args.trace_level.parse().map_err(anyhow::Error::msg)?;
    battlesim_core::profiling::init_tracy(trace_level);

    let battle = build_battle(&args)?;
    if args.single {
        return run_single(&args, battle);
    }

    let config = SimulationConfig {
        battles: args.battles,
        chunk_size: args.chunk_size,
        base_seed: args.seed,
    };
    let mut simulator = WinRateSimulator::new(&battle, config)?;
    log::info!(
        "Simulating {} battles (base seed {})",
        args.battles,
        simulator.base_seed()
    );
    let progress = simulator.run(|progress| {
        if progress.is_running {
            log::debug!(
                "{:.0}% done, attacker {:.1}%",
                progress.progress * 100.0,
                progress.attacker_win_rate * 100.0
            );
        }
    });

    if args.json {
        println!("{}", serde_json::to_string_pretty(&progress)?);
    } else {
        print_progress(&progress);
    }
    Ok(())
}
