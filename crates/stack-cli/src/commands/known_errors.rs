//! Known errors command implementation.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use stack_core::KnownErrorKind;

use crate::output;

#[derive(Args, Debug)]
pub struct KnownErrorsArgs {
    /// Include abstract kinds, which have no wire code
    #[arg(long)]
    pub all: bool,

    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct KindEntry {
    name: &'static str,
    code: Option<&'static str>,
    ancestors: Vec<&'static str>,
}

pub fn run(args: KnownErrorsArgs) -> Result<()> {
    let entries: Vec<KindEntry> = KnownErrorKind::ALL
        .iter()
        .filter(|kind| args.all || !kind.is_abstract())
        .map(|kind| KindEntry {
            name: kind.name(),
            code: kind.code(),
            ancestors: kind.ancestors().iter().skip(1).map(|a| a.name()).collect(),
        })
        .collect();

    if args.json {
        return output::json_pretty(&entries);
    }

    for entry in entries {
        let code = entry.code.unwrap_or("(abstract)");
        if entry.ancestors.is_empty() {
            println!("{} {}", code, entry.name.dimmed());
        } else {
            println!(
                "{} {} {}",
                code,
                entry.name.dimmed(),
                format!("< {}", entry.ancestors.join(" < ")).dimmed()
            );
        }
    }
    Ok(())
}
