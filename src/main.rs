use anyhow::Result;

use chatgpt_history_sync::cli;

fn main() -> Result<()> {
    cli::run()
}
