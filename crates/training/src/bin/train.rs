use clap::Parser;
use training::util::{init_logging, run_train};
use training::TrainArgs;

fn main() -> anyhow::Result<()> {
    init_logging();
    let args = TrainArgs::parse();
    let report = run_train(args)?;
    if let Some(path) = report.checkpoints.last() {
        println!("Saved final checkpoint to {}", path.display());
    }
    Ok(())
}
