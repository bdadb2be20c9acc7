//! # takeout-organize CLI
//!
//! Command-line interface for the takeout organizer.
//!
//! ## Usage
//! ```bash
//! takeout-organize --source ./Takeout --output ./Output
//! takeout-organize --dry-run --workers 8
//! takeout-organize --dates-only --only-exts .mp,.mov
//! ```

mod cli;

use takeout_organizer::Result;

fn main() -> Result<()> {
    cli::run()
}
