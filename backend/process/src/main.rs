use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Seed JSON with categories and recipes
    seed: PathBuf,

    /// Where to write the compiled bank
    #[arg(default_value = "bank.bin")]
    out: PathBuf,

    /// Validate the seed without writing anything
    #[arg(long)]
    check: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    process::compile_bank(&args.seed, &args.out, args.check)?;

    Ok(())
}
