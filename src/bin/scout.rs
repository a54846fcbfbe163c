//! scout - one-shot inference over an image, a video file, or a video URL

use anyhow::Result;
use clap::{ArgGroup, Parser};
use std::io::IsTerminal;
use std::path::PathBuf;

use framescout::detect::BackendRegistry;
use framescout::infer::{self, InferenceOptions, InferenceOutput, InputModality};
use framescout::ui::Ui;

#[derive(Parser, Debug)]
#[command(author, version, about)]
#[command(group(ArgGroup::new("input").required(true)))]
struct Args {
    /// Still image to run one inference pass over.
    #[arg(long, group = "input")]
    image: Option<PathBuf>,
    /// Local video file to process frame by frame.
    #[arg(long, group = "input")]
    video: Option<PathBuf>,
    /// Remote video URL to process frame by frame.
    #[arg(long, group = "input")]
    video_url: Option<String>,
    /// Model identifier selecting which pretrained weights to load.
    #[arg(long, env = "FRAMESCOUT_MODEL_ID", default_value = "yolov10s")]
    model_id: String,
    /// Inference image size in pixels (320..=1280).
    #[arg(long, default_value_t = 640)]
    image_size: u32,
    /// Minimum confidence for a detection to be reported (0.0..=1.0).
    #[arg(long, default_value_t = 0.25)]
    conf_threshold: f32,
    /// Directory receiving annotated output and detection stills.
    #[arg(long, env = "FRAMESCOUT_OUTPUT_DIR", default_value = "out")]
    output_dir: PathBuf,
    /// Directory holding model weight files.
    #[arg(long, env = "FRAMESCOUT_MODELS_DIR", default_value = "models")]
    models_dir: PathBuf,
    /// Base URL for fetching missing model weights.
    #[arg(long, env = "FRAMESCOUT_MODEL_BASE_URL")]
    model_base_url: Option<String>,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let ui = Ui::from_flag(Some(&args.ui), is_tty);

    let modality = InputModality::from_parts(args.image, args.video, args.video_url)?;
    let options = InferenceOptions {
        model_id: args.model_id,
        image_size: args.image_size,
        conf_threshold: args.conf_threshold,
        output_dir: args.output_dir,
    };

    let registry = BackendRegistry::new(args.models_dir, args.model_base_url);

    let output = {
        let _stage = ui.stage("Run inference");
        infer::run(&registry, &modality, &options)?
    };

    match output {
        InferenceOutput::AnnotatedImage(path) => {
            println!("{}", path.display());
        }
        InferenceOutput::OutputVideo(outcome) => {
            println!("{}", outcome.output_path);
            log::info!(
                "{} frames written, {} new classes",
                outcome.frames_written,
                outcome.newly_seen.len()
            );
            for still in &outcome.saved_stills {
                log::info!("detection still: {}", still.display());
            }
        }
    }
    Ok(())
}
