use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use dotenvy::dotenv;
use tracing::{error, info, warn};
use url::Url;

mod config;
mod errors;
mod llm;
mod pipeline;
mod state;
mod tools;
mod utils;

use config::Config;
use errors::PipelineError;
use llm::media::file_extension_for_mime;
use llm::{load_image, GeminiClient, ImageInput};
use pipeline::{RenderedImage, Studio};
use state::{Session, Slot};
use tools::save_request::{build_save_request, submit, SaveOutcome};
use utils::logging::init_logging;
use utils::timing::RunTimer;

#[derive(Debug, Clone, PartialEq, Eq)]
struct AnalyzeArgs {
    image: String,
    face: Option<String>,
    instructions: String,
    out_dir: Option<PathBuf>,
    save: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Analyze(AnalyzeArgs),
    Aspect { image: String },
    Help,
}

fn usage() -> &'static str {
    "Usage:\n  image_analyst analyze --image <path|url|data-url> [--face <path|url|data-url>] [--instructions <text>] [--out <dir>] [--save]\n  image_analyst aspect --image <path|url|data-url>\n  image_analyst help"
}

fn take_value<'a>(args: &'a [String], index: &mut usize, flag: &str) -> anyhow::Result<&'a str> {
    *index += 1;
    args.get(*index)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("Missing value for {flag}"))
}

fn parse_analyze_args(args: &[String]) -> anyhow::Result<AnalyzeArgs> {
    let mut image = None;
    let mut face = None;
    let mut instructions = String::new();
    let mut out_dir = None;
    let mut save = false;

    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--image" => image = Some(take_value(args, &mut index, "--image")?.to_string()),
            "--face" => face = Some(take_value(args, &mut index, "--face")?.to_string()),
            "--instructions" => {
                instructions = take_value(args, &mut index, "--instructions")?.to_string();
            }
            "--out" => out_dir = Some(PathBuf::from(take_value(args, &mut index, "--out")?)),
            "--save" => save = true,
            other => {
                return Err(anyhow!("Unknown analyze argument: {other}\n{}", usage()));
            }
        }
        index += 1;
    }

    Ok(AnalyzeArgs {
        image: image.ok_or_else(|| anyhow!("--image is required\n{}", usage()))?,
        face: face.filter(|value| !value.trim().is_empty()),
        instructions,
        out_dir,
        save,
    })
}

fn parse_command(args: &[String]) -> anyhow::Result<Command> {
    let Some(name) = args.get(1) else {
        return Ok(Command::Help);
    };
    let rest = &args[2..];
    match name.as_str() {
        "analyze" => Ok(Command::Analyze(parse_analyze_args(rest)?)),
        "aspect" => match rest {
            [flag, image] if flag == "--image" => Ok(Command::Aspect {
                image: image.clone(),
            }),
            _ => Err(anyhow!("aspect takes exactly --image <src>\n{}", usage())),
        },
        "help" | "--help" | "-h" => Ok(Command::Help),
        other => Err(anyhow!("Unknown command: {other}\n{}", usage())),
    }
}

fn save_target(config: &Config) -> Result<(Url, String), PipelineError> {
    let endpoint = config
        .save_endpoint_url
        .clone()
        .ok_or(PipelineError::MissingCredential("SAVE_ENDPOINT_URL"))?;
    if config.save_shared_secret.trim().is_empty() {
        warn!("SAVE_SHARED_SECRET is empty; the save endpoint may reject the record");
    }
    Ok((endpoint, config.save_shared_secret.clone()))
}

async fn write_render(out_dir: &Path, image: &RenderedImage) -> anyhow::Result<PathBuf> {
    let path = out_dir.join(format!(
        "pose_{}.{}",
        image.variant,
        file_extension_for_mime(&image.mime_type)
    ));
    tokio::fs::write(&path, &image.bytes)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

fn report_slot<T>(name: &str, slot: &Slot<T>) {
    match slot {
        Slot::Failed(message) => eprintln!("{name}: failed ({message})"),
        Slot::Succeeded(_) => {}
        other => eprintln!("{name}: {}", other.label()),
    }
}

/// Writes whatever the session holds as succeeded and reports everything
/// else. Returns false unless both pipelines succeeded.
async fn write_outputs(out_dir: &Path, session: &Session) -> anyhow::Result<bool> {
    tokio::fs::create_dir_all(out_dir)
        .await
        .with_context(|| format!("creating {}", out_dir.display()))?;

    let analysis = session.analysis();
    if let Slot::Succeeded(analysis) = &analysis {
        let path = out_dir.join("analysis.json");
        let body = serde_json::to_string_pretty(analysis)?;
        tokio::fs::write(&path, body)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        println!("analysis: {}", path.display());
    }
    report_slot("analysis", &analysis);

    let renders = session.renders();
    if let Slot::Succeeded(renders) = &renders {
        for image in [&renders.detailed, &renders.r#abstract] {
            let path = write_render(out_dir, image).await?;
            println!("pose {}: {}", image.variant, path.display());
        }
    }
    report_slot("renders", &renders);

    Ok(analysis.is_succeeded() && renders.is_succeeded())
}

async fn save_analysis(
    session: &Session,
    generation: u64,
    source: &ImageInput,
    face: Option<&ImageInput>,
    instructions: &str,
    (endpoint, secret): (Url, String),
) -> bool {
    let Slot::Succeeded(analysis) = session.analysis() else {
        eprintln!("save skipped: analysis did not succeed");
        return false;
    };
    if !session.begin_save(generation) {
        eprintln!("save skipped: a save is already running for this result");
        return false;
    }

    let request = build_save_request(&analysis, source, face, instructions);
    let outcome = match submit(&request, &endpoint, &secret).await {
        SaveOutcome::Success => Ok(()),
        SaveOutcome::Failure(message) => Err(message),
    };
    session.finish_save(generation, outcome);

    let save = session.save();
    match &save {
        Slot::Succeeded(()) => println!("saved: {}", request.category),
        other => report_slot("save", other),
    }
    save.is_succeeded()
}

async fn run_analyze(config: &Config, args: AnalyzeArgs) -> anyhow::Result<bool> {
    let mut timer = RunTimer::start("analyze", &args.image);
    let target = if args.save {
        Some(save_target(config)?)
    } else {
        None
    };

    let client = GeminiClient::new(config)?;
    let studio = Studio::from_config(Arc::new(client), config);

    let source = load_image(&args.image).await?;
    let face = match &args.face {
        Some(face) => Some(load_image(face).await?),
        None => None,
    };

    let session = Session::new();
    let report = studio
        .run(&session, &source, face.as_ref(), &args.instructions)
        .await?;
    println!("aspect ratio: {}", report.aspect_ratio);
    if !session.is_current(report.generation) {
        return Err(anyhow!("run {} was superseded", report.generation));
    }

    let out_dir = args.out_dir.unwrap_or_else(|| config.output_dir.clone());
    let mut succeeded = write_outputs(&out_dir, &session).await?;

    if let Some(target) = target {
        succeeded &= save_analysis(
            &session,
            report.generation,
            &source,
            face.as_ref(),
            &args.instructions,
            target,
        )
        .await;
    }

    if !succeeded {
        let failed: Vec<&str> = [report.analysis.as_ref().err(), report.renders.as_ref().err()]
            .into_iter()
            .flatten()
            .map(PipelineError::kind)
            .collect();
        timer.mark_status("partial_failure", Some(failed.join(",")));
    }
    Ok(succeeded)
}

async fn run_aspect(image: &str) -> anyhow::Result<bool> {
    let source = load_image(image).await?;
    let aspect_ratio = Studio::aspect_ratio_for(&source)?;
    println!("{aspect_ratio}");
    Ok(true)
}

async fn run(config: &Config, command: Command) -> anyhow::Result<bool> {
    match command {
        Command::Analyze(args) => run_analyze(config, args).await,
        Command::Aspect { image } => run_aspect(&image).await,
        Command::Help => {
            println!("{}", usage());
            Ok(true)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenv().ok();
    let config = Config::load()?;
    let _guards = init_logging(&config.log_level, &config.logs_dir);

    let args: Vec<String> = std::env::args().collect();
    let command = parse_command(&args)?;
    info!("Starting image_analyst: {:?}", args.get(1));

    match run(&config, command).await {
        Ok(true) => Ok(ExitCode::SUCCESS),
        Ok(false) => Ok(ExitCode::FAILURE),
        Err(err) => {
            error!("Run failed: {err:#}");
            eprintln!("error: {err:#}");
            Ok(ExitCode::FAILURE)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::test_config;
    use crate::pipeline::models::tests::sample_bilingual_json;

    fn argv(values: &[&str]) -> Vec<String> {
        std::iter::once("image_analyst")
            .chain(values.iter().copied())
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn parses_full_analyze_invocation() {
        let command = parse_command(&argv(&[
            "analyze",
            "--image",
            "photo.jpg",
            "--face",
            "face.png",
            "--instructions",
            "change hair to short bob",
            "--out",
            "results",
            "--save",
        ]))
        .unwrap();
        assert_eq!(
            command,
            Command::Analyze(AnalyzeArgs {
                image: "photo.jpg".into(),
                face: Some("face.png".into()),
                instructions: "change hair to short bob".into(),
                out_dir: Some(PathBuf::from("results")),
                save: true,
            })
        );
    }

    #[test]
    fn analyze_requires_image_and_rejects_unknown_flags() {
        assert!(parse_command(&argv(&["analyze"])).is_err());
        assert!(parse_command(&argv(&["analyze", "--image"])).is_err());
        assert!(parse_command(&argv(&["analyze", "--image", "a.png", "--fast"])).is_err());
    }

    #[test]
    fn aspect_and_help_commands() {
        assert_eq!(
            parse_command(&argv(&["aspect", "--image", "a.png"])).unwrap(),
            Command::Aspect {
                image: "a.png".into()
            }
        );
        assert!(parse_command(&argv(&["aspect"])).is_err());
        assert_eq!(parse_command(&argv(&[])).unwrap(), Command::Help);
        assert_eq!(parse_command(&argv(&["help"])).unwrap(), Command::Help);
        assert!(parse_command(&argv(&["paint"])).is_err());
    }

    #[test]
    fn save_requires_configured_endpoint() {
        let mut config = test_config("key");
        assert_eq!(
            save_target(&config).unwrap_err(),
            PipelineError::MissingCredential("SAVE_ENDPOINT_URL")
        );

        config.save_endpoint_url = Url::parse("https://example.com/exec").ok();
        config.save_shared_secret = "s".into();
        let (endpoint, secret) = save_target(&config).unwrap();
        assert_eq!(endpoint.as_str(), "https://example.com/exec");
        assert_eq!(secret, "s");
    }

    #[tokio::test]
    async fn outputs_follow_the_session_slots() {
        let out_dir = std::env::temp_dir().join(format!(
            "image_analyst_outputs_{}_{}",
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        let session = Session::new();
        let generation = session.begin();
        let analysis = serde_json::from_value(sample_bilingual_json()).unwrap();
        session.finish_analysis(generation, &Ok(analysis));
        session.finish_renders(
            generation,
            &Err(PipelineError::NoImageProduced("text only".into())),
        );

        let succeeded = write_outputs(&out_dir, &session).await.unwrap();

        assert!(!succeeded);
        let written = std::fs::read_to_string(out_dir.join("analysis.json")).unwrap();
        assert!(written.contains("en full prompt"));
        assert!(!out_dir.join("pose_detailed.png").exists());
        std::fs::remove_dir_all(&out_dir).unwrap();
    }
}
