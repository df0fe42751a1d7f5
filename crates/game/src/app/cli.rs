use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct RunnerOptions {
    /// Scenario file; the built-in line crossing demo when absent.
    pub(crate) scenario: Option<PathBuf>,
    pub(crate) config: Option<PathBuf>,
    pub(crate) ticks: Option<u32>,
    pub(crate) dt: Option<f32>,
    pub(crate) time_scale: Option<f32>,
    pub(crate) report: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CliCommand {
    Run(RunnerOptions),
    Help,
}

pub(crate) fn parse_args(args: &[String]) -> Result<CliCommand, String> {
    let mut options = RunnerOptions::default();
    let mut index = 0usize;
    while index < args.len() {
        match args[index].as_str() {
            "-h" | "--help" => return Ok(CliCommand::Help),
            "--scenario" => {
                options.scenario = Some(PathBuf::from(value_for(args, index, "--scenario")?));
                index += 2;
            }
            "--config" => {
                options.config = Some(PathBuf::from(value_for(args, index, "--config")?));
                index += 2;
            }
            "--report" => {
                options.report = Some(PathBuf::from(value_for(args, index, "--report")?));
                index += 2;
            }
            "--ticks" => {
                let value = value_for(args, index, "--ticks")?;
                options.ticks = Some(
                    value
                        .parse::<u32>()
                        .map_err(|_| format!("invalid --ticks value '{value}' (expected u32)"))?,
                );
                index += 2;
            }
            "--dt" => {
                let value = value_for(args, index, "--dt")?;
                options.dt = Some(parse_positive_seconds(value, "--dt")?);
                index += 2;
            }
            "--time-scale" => {
                let value = value_for(args, index, "--time-scale")?;
                let scale = value.parse::<f32>().map_err(|_| {
                    format!("invalid --time-scale value '{value}' (expected f32)")
                })?;
                if !(scale.is_finite() && scale >= 0.0) {
                    return Err(format!(
                        "invalid --time-scale value '{value}' (expected a non-negative number)"
                    ));
                }
                options.time_scale = Some(scale);
                index += 2;
            }
            other => return Err(format!("unknown argument '{other}'")),
        }
    }
    Ok(CliCommand::Run(options))
}

fn value_for<'a>(args: &'a [String], index: usize, flag: &str) -> Result<&'a str, String> {
    args.get(index + 1)
        .map(String::as_str)
        .ok_or_else(|| format!("missing value for {flag}"))
}

fn parse_positive_seconds(value: &str, flag: &str) -> Result<f32, String> {
    let seconds = value
        .parse::<f32>()
        .map_err(|_| format!("invalid {flag} value '{value}' (expected f32)"))?;
    if !(seconds.is_finite() && seconds > 0.0) {
        return Err(format!(
            "invalid {flag} value '{value}' (expected a positive number)"
        ));
    }
    Ok(seconds)
}

pub(crate) fn usage_text() -> String {
    [
        "field_sim - headless walkmesh field simulation",
        "",
        "Usage:",
        "  field_sim [--scenario <file>] [--config <file>] [--ticks <u32>] [--dt <f32>] [--time-scale <f32>] [--report <file>]",
        "",
        "Defaults:",
        "  --scenario  built-in line crossing demo",
        "  --config    $FIELDSIM_CONFIG, then engine defaults",
        "  --ticks     scenario value, then 120",
        "  --dt        scenario value, then 1/30",
        "  --time-scale 1.0",
        "",
        "Log filtering follows RUST_LOG (default: info).",
    ]
    .join("\n")
}
