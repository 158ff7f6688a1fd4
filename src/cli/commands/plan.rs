//! Plan preview command.

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::cli::args::{parse_target, OutputFormat, PlanArgs};
use crate::config::Config;
use crate::domain::generate;
use crate::error::HoundError;
use crate::output::format_plan;

/// Show the steps a session for the target would run.
///
/// # Errors
///
/// Returns an error if the target is not a positive duration.
pub fn plan(args: &PlanArgs, config: &Config, format: OutputFormat) -> Result<String, HoundError> {
    let target = parse_target(&args.target)?;
    let mut rng = args
        .seed
        .or(config.runtime.plan_seed)
        .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);

    let steps = generate(target, &mut rng)?;
    format_plan(&steps, format)
}
