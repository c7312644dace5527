use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use tee_exp::{ledger_query, Ledger, Query};

use super::print_json;

#[derive(Args, Debug)]
pub struct LedgerArgs {
    /// Ledger path (`.csv`, `.sqlite` or `.db`).
    #[arg(long)]
    pub ledger: PathBuf,
    /// Only show runs with this security configuration.
    #[arg(long)]
    pub security: Option<String>,
    #[arg(long)]
    pub limit: Option<usize>,
}

pub fn run(args: &LedgerArgs) -> Result<(), Box<dyn Error>> {
    let query = Query {
        security: args.security.clone(),
        limit: args.limit,
    };
    let table = ledger_query(&Ledger::from_path(&args.ledger), &query)?;
    print_json(&table)
}
