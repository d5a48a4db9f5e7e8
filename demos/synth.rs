use std::path::PathBuf;

use clap::{Parser, Subcommand};

use mvsynth::automaton::Automaton;
use mvsynth::expr::Expr;
use mvsynth::formula::{synthesize_from_formula, Formula, FormulaOptions, FormulaVar};
use mvsynth::network::{lit, MvExpr, Network};
use mvsynth::solve::{solve, SolveOptions};
use mvsynth::stg::{extract_stg, StgOptions};

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Maximum number of states.
    #[arg(long, value_name = "INT", default_value = "10000", global = true)]
    states: usize,

    /// Name states by their latch values.
    #[arg(long, global = true)]
    long_names: bool,

    /// Write the automaton in DOT format to this file.
    #[arg(long, value_name = "FILE", global = true)]
    dot: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// State graph of a counter modulo `n`.
    Stg {
        #[arg(value_name = "INT", default_value = "4")]
        n: usize,
    },
    /// Controller that delays its input by `depth` steps.
    Solve {
        #[arg(value_name = "INT", default_value = "1")]
        depth: usize,

        /// The controller may not react to its input in the same step.
        #[arg(long)]
        moore: bool,

        /// Keep only the progressive part of the solution.
        #[arg(long)]
        progressive: bool,
    },
    /// Automaton of "the letter repeats the one `rank` steps back".
    Formula {
        #[arg(value_name = "INT", default_value = "2")]
        rank: usize,
    },
}

/// Counter modulo `n` that advances while `go` is high.
fn counter(n: usize) -> Network {
    let function: Vec<MvExpr> = (0..n)
        .map(|k| {
            let stay = Expr::and(lit("go", &[0]), lit("c", &[k]));
            let step = Expr::and(lit("go", &[1]), lit("c", &[(k + n - 1) % n]));
            Expr::or(stay, step)
        })
        .collect();
    let mut net = Network::new(format!("counter{}", n));
    net.add_input("go", 2)
        .add_node("next", n, function)
        .add_latch("next", "c", 0)
        .add_binary("wrap", lit("c", &[n - 1]))
        .add_output("wrap");
    net
}

/// Plant passing `i` to the controller as `u` and showing its answer `v` on `o`.
fn plant() -> Network {
    let mut net = Network::new("plant");
    net.add_input("i", 2)
        .add_input("v", 2)
        .add_buffer("u", "i")
        .add_buffer("o", "v")
        .add_output("o");
    net
}

/// `o` is `i` delayed by `depth` steps.
fn delay(depth: usize) -> Network {
    let mut net = Network::new(format!("delay{}", depth));
    net.add_input("i", 2);
    let mut source = "i".to_string();
    for k in 0..depth {
        let d = format!("d{}", k);
        let n = format!("n{}", k);
        net.add_buffer(&n, &source).add_latch(&n, &d, 0);
        source = d;
    }
    net.add_buffer("o", &source).add_output("o");
    net
}

fn echo(rank: usize) -> Formula {
    let a = |copy| Expr::term(FormulaVar::new(copy, 0));
    Formula::new(["a"], rank, Expr::not(Expr::xor(a(0), a(rank))))
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let time_total = std::time::Instant::now();

    let args = Cli::parse();
    println!("args = {:?}", args);

    let automaton: Automaton = match args.command {
        Command::Stg { n } => {
            let options = StgOptions::default()
                .with_state_limit(args.states)
                .with_long_names(args.long_names);
            extract_stg(&counter(n), &options)?
        }
        Command::Solve {
            depth,
            moore,
            progressive,
        } => {
            let options = SolveOptions::default()
                .with_state_limit(args.states)
                .with_long_names(args.long_names)
                .with_moore(moore)
                .with_progressive(progressive);
            solve(&plant(), &delay(depth), "u", "v", &options)?
        }
        Command::Formula { rank } => {
            let options = FormulaOptions::default()
                .with_state_limit(args.states)
                .with_long_names(args.long_names);
            synthesize_from_formula(&echo(rank), &options)?
        }
    };

    println!("{}", automaton);
    println!("stats = {:?}", automaton.stats());

    if let Some(path) = &args.dot {
        std::fs::write(path, automaton.to_dot())?;
        println!("Wrote DOT to {}", path.display());
    }

    println!("Done in {:.3} s", time_total.elapsed().as_secs_f64());
    Ok(())
}
