use std::path::Path;
use std::sync::Arc;

use foodrec::{
    FileArtifactStore, OrderLog, RecError, RecResult, Recommender, Settings, Target, Trainer,
};

const USAGE: &str = "usage:
    foodrec train <orders.json>
    foodrec recommend <orders.json> <restaurants|dishes> [user_id] [k]";

const DEFAULT_K: usize = 10;

fn load_orders(path: &str) -> RecResult<Arc<OrderLog>> {
    let json = std::fs::read_to_string(Path::new(path))?;
    let log = OrderLog::from_json(&json)?;
    log::info!(
        "loaded {} orders and {} restaurants from `{path}`",
        log.orders().len(),
        log.restaurants().len()
    );
    Ok(Arc::new(log))
}

fn run(settings: Settings, args: &[String]) -> RecResult<String> {
    let store = Arc::new(FileArtifactStore::new(settings.artifacts_dir.clone()));
    match args {
        [cmd, path] if cmd == "train" => {
            let trainer = Trainer::new(load_orders(path)?, store, settings);
            let reports = trainer.train_all()?;
            Ok(serde_json::to_string_pretty(&reports)?)
        }
        [cmd, path, target, rest @ ..] if cmd == "recommend" && rest.len() <= 2 => {
            let target: Target = target.parse()?;
            let user_id = rest.first().map(String::as_str);
            let k = match rest.get(1) {
                Some(raw) => raw
                    .parse::<usize>()
                    .map_err(|_| RecError::InvalidParam(format!("invalid k: `{raw}`")))?,
                None => DEFAULT_K,
            };
            let recommender =
                Recommender::new(load_orders(path)?, store, settings.exclude_consumed);
            let rec = recommender.recommend(target, user_id, k)?;
            Ok(serde_json::to_string_pretty(&rec)?)
        }
        _ => Err(RecError::InvalidParam(String::from(USAGE))),
    }
}

fn main() {
    let settings = match Settings::from_env() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(2)
        }
    };
    std::env::set_var("RUST_LOG", &settings.log_level);
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(settings, &args) {
        Ok(output) => println!("{output}"),
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1)
        }
    }
}
