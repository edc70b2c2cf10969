use anyhow::{bail, Context, Result};
use retouch::config::load_app_config;
use retouch::{BatchInput, BatchJob};

const USAGE: &str = "usage: retouch <input.png|--restore> <script.json> <output.png|.jpg>";

fn parse_args(config_restores: bool) -> Result<BatchJob> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (input, script, output) = match args.as_slice() {
        [input, script, output] => (BatchInput::from_arg(input), script, output),
        [script, output] if config_restores => (BatchInput::Restore, script, output),
        _ => bail!(USAGE),
    };
    Ok(BatchJob {
        input,
        script: script.into(),
        output: output.into(),
    })
}

fn main() -> Result<()> {
    retouch::logging::init();
    let config = load_app_config();
    let job = parse_args(config.restore_session)?;
    tracing::debug!(?job, "parsed arguments");

    retouch::run(&job, &config)
        .with_context(|| format!("failed to produce {}", job.output.display()))?;
    Ok(())
}
