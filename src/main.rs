mod cli;

use std::io::BufRead;
use std::process::ExitCode;

use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::Cli;
use mcfg::error_handling::render_errors;
use mcfg::generator::Generator;
use mcfg::{parser, ChartParser, Grammar, ParseError};

fn init_subscriber() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_level(true)
                .with_ansi(false),
        )
        .with(filter)
        .try_init()
        .ok();
}

fn generate(grammar: &Grammar, amount: u32, seed: Option<u64>) -> ExitCode {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let generator = Generator::new(grammar);

    for _ in 0..amount {
        match generator.generate(&mut rng) {
            Ok(sentence) => println!("{}", sentence.join(" ")),
            Err(error) => {
                eprintln!("{}", error);
                return ExitCode::FAILURE;
            }
        }
    }
    ExitCode::SUCCESS
}

fn print_parses(parser: &ChartParser, sentence: &[String], cli: &Cli) -> Result<(), ParseError> {
    if cli.all {
        let forest = parser.parse_all(sentence)?;
        for tree in forest.trees().take(cli.limit.unwrap_or(usize::MAX)) {
            println!("{}", tree);
        }
    } else {
        println!("{}", parser.parse(sentence)?);
    }
    Ok(())
}

fn main() -> ExitCode {
    init_subscriber();
    let cli = Cli::parse();

    let grammar = match parser::parse_file(&cli.file, cli.start.as_deref()) {
        Ok(grammar) => grammar,
        Err(errors) => {
            eprintln!("{}", render_errors(&errors));
            return ExitCode::FAILURE;
        }
    };

    if let Some(amount) = cli.generate {
        return generate(&grammar, amount, cli.seed);
    }

    let chart_parser = match cli.max_steps {
        Some(limit) => ChartParser::new(&grammar).with_step_limit(limit),
        None => ChartParser::new(&grammar),
    };

    let sentences: Vec<Vec<String>> = if cli.tokens.is_empty() {
        std::io::stdin()
            .lock()
            .lines()
            .map_while(Result::ok)
            .map(|line| line.split_whitespace().map(str::to_string).collect::<Vec<_>>())
            .filter(|tokens| !tokens.is_empty())
            .collect()
    } else {
        vec![cli.tokens.clone()]
    };

    let mut all_parsed = true;
    for sentence in sentences {
        if let Err(error) = print_parses(&chart_parser, &sentence, &cli) {
            eprintln!("{}: {}", sentence.join(" "), error);
            all_parsed = false;
        }
    }

    if all_parsed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
