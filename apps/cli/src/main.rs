use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use orate_analysis::{analyze_transcript, FillerLexicon, SpeechReport};
use orate_audio::{read_wav_mono_at, AudioBuffer, CANONICAL_SAMPLE_RATE};
use orate_diarization::{classify_turns, Diarizer, TurnSet};
use orate_extraction::{extract_target, Extraction, ExtractionConfig};
use orate_feedback::FeedbackClient;
use orate_pyannote::{DiarizeConfig, PyannoteDiarizer, WespeakerEncoder};
use orate_separation::{ResolveConfig, TimedSeparator};
use orate_sepformer::SepformerSeparator;
use orate_sherpa::SherpaWhisperEngine;
use orate_speaker::{TargetSpeaker, TimedEncoder};
use orate_stt::Transcriber;

/// Target-speaker speech coaching pipeline.
///
/// Isolates the reference speaker from a mixed recording, transcribes the
/// reconstructed audio and produces a speech analysis report with optional
/// model-generated recommendations.
#[derive(Debug, Parser)]
#[command(name = "orate", version)]
struct Cli {
    /// Mixed recording to process (wav).
    #[arg(long)]
    input: PathBuf,

    /// Reference clip of the target speaker (wav).
    #[arg(long)]
    reference: PathBuf,

    /// Directory for generated artifacts.
    #[arg(long, default_value = "output")]
    output: PathBuf,

    /// Suffix artifact names with the input file stem and dump separated
    /// streams for inspection.
    #[arg(long)]
    debug: bool,

    /// Language code driving transcription, the filler lexicon and the
    /// feedback reply ("ru" or "en").
    #[arg(long, default_value = "ru")]
    language: String,

    /// Directory holding the model files.
    #[arg(long, default_value = "models")]
    models_dir: PathBuf,

    /// OpenRouter API key. The feedback stage is skipped when unset.
    #[arg(long, env = "OPENROUTER_API_KEY")]
    api_key: Option<String>,

    /// Worker threads for overlap separation.
    #[arg(long, default_value_t = 1)]
    workers: usize,

    /// Deadline in seconds for a single embedding or separation call.
    #[arg(long, default_value_t = 120)]
    model_timeout_secs: u64,
}

struct ModelPaths {
    segmentation: PathBuf,
    embedding: PathBuf,
    separation: PathBuf,
    whisper_dir: PathBuf,
}

impl ModelPaths {
    fn under(dir: &Path) -> Self {
        Self {
            segmentation: dir.join("segmentation-3.0.onnx"),
            embedding: dir.join("wespeaker_en_voxceleb_CAM++.onnx"),
            separation: dir.join("sepformer.onnx"),
            whisper_dir: dir.join("whisper"),
        }
    }
}

fn artifact_suffix(debug: bool, input: &Path) -> String {
    if !debug {
        return String::new();
    }
    input
        .file_stem()
        .and_then(|stem| stem.to_str())
        .map(|stem| format!("_{stem}"))
        .unwrap_or_default()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,orate=debug")),
        )
        .init();

    let cli = Cli::parse();
    run(cli).await
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let pipeline_started = Instant::now();
    let suffix = artifact_suffix(cli.debug, &cli.input);
    let models = ModelPaths::under(&cli.models_dir);

    std::fs::create_dir_all(&cli.output)
        .with_context(|| format!("failed to create {}", cli.output.display()))?;
    let combined_path = cli
        .output
        .join(format!("target_speaker_combined{suffix}.wav"));
    let transcript_path = cli.output.join(format!("transcript{suffix}.txt"));
    let report_path = cli.output.join(format!("analysis_report{suffix}.md"));
    let feedback_path = cli.output.join(format!("feedback{suffix}.md"));

    let mixed = read_wav_mono_at(&cli.input, CANONICAL_SAMPLE_RATE)
        .with_context(|| format!("failed to read {}", cli.input.display()))?;
    let reference = read_wav_mono_at(&cli.reference, CANONICAL_SAMPLE_RATE)
        .with_context(|| format!("failed to read {}", cli.reference.display()))?;
    tracing::info!(
        input = %cli.input.display(),
        duration_secs = mixed.duration_secs(),
        reference_secs = reference.duration_secs(),
        "loaded audio"
    );

    let turns = diarize_stage(&mixed, &models)?;
    let extraction = extraction_stage(&cli, &models, &mixed, &reference, &turns, &combined_path)?;
    let transcript = transcribe_stage(&cli, &models, &combined_path, &transcript_path)?;
    let report = analysis_stage(&cli, &transcript, &report_path)?;
    feedback_stage(&cli, &transcript, &report, &feedback_path).await?;

    tracing::info!(
        elapsed_ms = pipeline_started.elapsed().as_millis() as u64,
        output = %cli.output.display(),
        target_found = extraction.target.is_found(),
        "pipeline finished"
    );
    Ok(())
}

fn diarize_stage(mixed: &AudioBuffer, models: &ModelPaths) -> anyhow::Result<TurnSet> {
    let started = Instant::now();
    let diarizer = PyannoteDiarizer::load(
        &models.segmentation,
        &models.embedding,
        DiarizeConfig::default(),
    )
    .context("failed to load diarization models")?;
    let turns = diarizer
        .diarize(&mixed.samples, mixed.sample_rate)
        .context("diarization failed")?;
    let turns = classify_turns(turns);
    tracing::info!(
        mono = turns.mono.len(),
        overlap = turns.overlap.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "speaker turns ready"
    );
    Ok(turns)
}

fn extraction_stage(
    cli: &Cli,
    models: &ModelPaths,
    mixed: &AudioBuffer,
    reference: &AudioBuffer,
    turns: &TurnSet,
    combined_path: &Path,
) -> anyhow::Result<Extraction> {
    let started = Instant::now();
    let timeout = Duration::from_secs(cli.model_timeout_secs);

    let encoder = WespeakerEncoder::load(&models.embedding)
        .context("failed to load speaker embedding model")?;
    let encoder = TimedEncoder::new(encoder, timeout);
    let separator =
        SepformerSeparator::load(&models.separation).context("failed to load separation model")?;
    let separator = TimedSeparator::new(separator, timeout);

    let config = ExtractionConfig {
        resolve: ResolveConfig {
            workers: cli.workers,
            dump_dir: cli.debug.then(|| cli.output.join("separated_segments")),
            ..ResolveConfig::default()
        },
        ..ExtractionConfig::default()
    };

    let extraction = extract_target(
        mixed,
        reference,
        turns,
        &encoder,
        &separator,
        &config,
        combined_path,
    )
    .context("target extraction failed")?;

    match &extraction.target {
        TargetSpeaker::Found {
            label, similarity, ..
        } => tracing::info!(
            speaker = label.as_str(),
            similarity,
            duration_secs = extraction.duration_secs,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "target audio extracted"
        ),
        TargetSpeaker::NotFound => tracing::warn!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "no speaker matched the reference clip"
        ),
    }
    Ok(extraction)
}

fn transcribe_stage(
    cli: &Cli,
    models: &ModelPaths,
    combined_path: &Path,
    transcript_path: &Path,
) -> anyhow::Result<String> {
    let started = Instant::now();
    let engine = SherpaWhisperEngine::new(&models.whisper_dir, &cli.language)
        .context("failed to load whisper model")?;
    let transcript = engine
        .transcribe_file(combined_path)
        .context("transcription failed")?;
    std::fs::write(transcript_path, &transcript)
        .with_context(|| format!("failed to write {}", transcript_path.display()))?;
    tracing::info!(
        path = %transcript_path.display(),
        chars = transcript.chars().count(),
        model = engine.model_name(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "transcript written"
    );
    Ok(transcript)
}

fn analysis_stage(cli: &Cli, transcript: &str, report_path: &Path) -> anyhow::Result<SpeechReport> {
    let started = Instant::now();
    let lexicon = FillerLexicon::for_language(&cli.language);
    let report = analyze_transcript(transcript, &lexicon);
    std::fs::write(report_path, report.to_markdown())
        .with_context(|| format!("failed to write {}", report_path.display()))?;
    tracing::info!(
        path = %report_path.display(),
        total_words = report.metrics.total_words,
        fillers = report.metrics.filler_total,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "analysis report written"
    );
    Ok(report)
}

async fn feedback_stage(
    cli: &Cli,
    transcript: &str,
    report: &SpeechReport,
    feedback_path: &Path,
) -> anyhow::Result<()> {
    let api_key = match cli.api_key.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => key,
        _ => {
            tracing::info!("OPENROUTER_API_KEY not set, skipping feedback stage");
            return Ok(());
        }
    };
    if transcript.trim().is_empty() {
        tracing::info!("transcript is empty, skipping feedback stage");
        return Ok(());
    }

    let started = Instant::now();
    let client = FeedbackClient::builder(api_key).build()?;
    let feedback = client
        .request_feedback(transcript, report, &cli.language)
        .await
        .context("feedback request failed")?;
    std::fs::write(feedback_path, feedback)
        .with_context(|| format!("failed to write {}", feedback_path.display()))?;
    tracing::info!(
        path = %feedback_path.display(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "feedback written"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_suffix_uses_input_stem() {
        assert_eq!(artifact_suffix(true, Path::new("data/talk.wav")), "_talk");
        assert_eq!(artifact_suffix(false, Path::new("data/talk.wav")), "");
    }

    #[test]
    fn test_model_paths_live_under_models_dir() {
        let models = ModelPaths::under(Path::new("models"));
        assert_eq!(
            models.segmentation,
            Path::new("models/segmentation-3.0.onnx")
        );
        assert_eq!(models.whisper_dir, Path::new("models/whisper"));
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["orate", "--input", "in.wav", "--reference", "ref.wav"]);
        assert_eq!(cli.output, PathBuf::from("output"));
        assert_eq!(cli.language, "ru");
        assert_eq!(cli.workers, 1);
        assert!(!cli.debug);
    }
}
