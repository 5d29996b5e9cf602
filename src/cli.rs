//! Command-line front end: score one reference/snapshot pair from disk.
//!
//! ```text
//! sketch-tracker <reference> <snapshot> [--json] [--dump-dir DIR] [--config FILE]
//!                [--external PROGRAM [--external-arg ARG]...]
//! ```
//!
//! `--external` swaps the built-in ink-shape scorer for an external program
//! that receives both image paths and prints a score.
//!
//! stdout carries only the result (score or JSON report); logs go to stderr.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::pipeline::diagnostic::{DirectoryPatchSink, PatchSink};
use crate::pipeline::scoring::{
    ExternalProcessScorer, InkShapeScorer, ScoreOutcome, ScoringConfig, ScoringError,
    SimilarityScorer,
};

pub const USAGE: &str = "usage: sketch-tracker <reference> <snapshot> [--json] [--dump-dir DIR] \
[--config FILE] [--external PROGRAM [--external-arg ARG]...]";

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}\n{usage}", usage = USAGE)]
    Usage(String),

    #[error("Cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Scoring(#[from] ScoringError),

    #[error("Cannot write output: {0}")]
    Output(#[from] std::io::Error),
}

impl CliError {
    /// 2 for bad invocations, 1 for everything else.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Usage(_) => 2,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Score(CliArgs),
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    pub reference: PathBuf,
    pub snapshot: PathBuf,
    pub json: bool,
    pub dump_dir: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub external: Option<ExternalCommand>,
}

/// Program (plus leading arguments) used instead of the built-in scorer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

/// Parse arguments (without the program name).
pub fn parse_args<I>(args: I) -> Result<Command, CliError>
where
    I: IntoIterator<Item = String>,
{
    let mut positional = Vec::new();
    let mut json = false;
    let mut dump_dir = None;
    let mut config = None;
    let mut external_program = None;
    let mut external_args = Vec::new();

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(Command::Help),
            "--json" => json = true,
            "--dump-dir" => dump_dir = Some(PathBuf::from(flag_value(&mut args, "--dump-dir")?)),
            "--config" => config = Some(PathBuf::from(flag_value(&mut args, "--config")?)),
            "--external" => {
                external_program = Some(PathBuf::from(flag_value(&mut args, "--external")?));
            }
            "--external-arg" => external_args.push(flag_value(&mut args, "--external-arg")?),
            flag if flag.starts_with("--") => {
                return Err(CliError::Usage(format!("unknown option {flag}")));
            }
            _ => positional.push(PathBuf::from(arg)),
        }
    }

    let [reference, snapshot]: [PathBuf; 2] = positional.try_into().map_err(|p: Vec<PathBuf>| {
        CliError::Usage(format!("expected 2 image paths, got {}", p.len()))
    })?;

    let external = match external_program {
        Some(program) => Some(ExternalCommand {
            program,
            args: external_args,
        }),
        None if !external_args.is_empty() => {
            return Err(CliError::Usage("--external-arg requires --external".into()));
        }
        None => None,
    };

    Ok(Command::Score(CliArgs {
        reference,
        snapshot,
        json,
        dump_dir,
        config,
        external,
    }))
}

fn flag_value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String, CliError> {
    args.next()
        .ok_or_else(|| CliError::Usage(format!("{flag} needs a value")))
}

#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    reference: &'a Path,
    snapshot: &'a Path,
    scorer: &'static str,
    score: f64,
    raw: f64,
    outcome: ScoreOutcome,
    dump_dir: Option<&'a Path>,
}

/// What one scorer run produced, in the shape the CLI prints.
struct Outcome {
    scorer: &'static str,
    score: f64,
    raw: f64,
    outcome: ScoreOutcome,
    dump_dir: Option<PathBuf>,
}

/// Score the pair and write the result to `out`.
pub fn execute(args: &CliArgs, out: &mut impl Write) -> Result<(), CliError> {
    let config = match &args.config {
        Some(path) => ScoringConfig::from_file(path)?,
        None => ScoringConfig::load_or_default()?,
    };

    let reference = read_image(&args.reference)?;
    let snapshot = read_image(&args.snapshot)?;

    let result = match &args.external {
        Some(external) => score_external(external, config, &reference, &snapshot)?,
        None => score_ink_shape(args, config, &reference, &snapshot)?,
    };

    if args.json {
        let json = JsonReport {
            reference: &args.reference,
            snapshot: &args.snapshot,
            scorer: result.scorer,
            score: result.score,
            raw: result.raw,
            outcome: result.outcome,
            dump_dir: result.dump_dir.as_deref(),
        };
        let rendered = serde_json::to_string_pretty(&json).map_err(ScoringError::from)?;
        writeln!(out, "{rendered}")?;
    } else {
        writeln!(out, "{:.4}", result.score)?;
    }
    Ok(())
}

fn score_ink_shape(
    args: &CliArgs,
    config: ScoringConfig,
    reference: &[u8],
    snapshot: &[u8],
) -> Result<Outcome, CliError> {
    let sink = match &args.dump_dir {
        Some(dir) => Some(DirectoryPatchSink::new(dir)),
        None => DirectoryPatchSink::for_new_run(),
    };
    let dump_dir = sink.as_ref().map(|s| s.dir().to_path_buf());

    let mut scorer = InkShapeScorer::new(config);
    if let Some(sink) = sink {
        scorer = scorer.with_sink(Box::new(sink) as Box<dyn PatchSink>);
    }

    let report = scorer.score_detailed(reference, snapshot)?;
    Ok(Outcome {
        scorer: scorer.name(),
        score: report.score(),
        raw: report.similarity.raw,
        outcome: report.outcome,
        dump_dir,
    })
}

/// External programs produce no patches, so no dump directory is created.
fn score_external(
    external: &ExternalCommand,
    config: ScoringConfig,
    reference: &[u8],
    snapshot: &[u8],
) -> Result<Outcome, CliError> {
    let scorer = ExternalProcessScorer::new(&external.program)
        .with_args(external.args.iter().cloned())
        .with_config(config);
    let score = scorer.score(reference, snapshot)?;
    Ok(Outcome {
        scorer: scorer.name(),
        score,
        raw: score,
        outcome: ScoreOutcome::Scored,
        dump_dir: None,
    })
}

fn read_image(path: &Path) -> Result<Vec<u8>, CliError> {
    std::fs::read(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{DynamicImage, GrayImage, ImageOutputFormat, Luma};

    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn write_square_png(path: &Path) {
        let mut img = GrayImage::from_pixel(96, 96, Luma([255]));
        for y in 24..72 {
            for x in 24..72 {
                img.put_pixel(x, y, Luma([0]));
            }
        }
        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageLuma8(img)
            .write_to(&mut cursor, ImageOutputFormat::Png)
            .unwrap();
        std::fs::write(path, cursor.into_inner()).unwrap();
    }

    #[test]
    fn parses_positionals_and_flags() {
        let cmd = parse_args(args(&["ref.png", "snap.jpg", "--json", "--dump-dir", "/tmp/d"])).unwrap();
        assert_eq!(
            cmd,
            Command::Score(CliArgs {
                reference: "ref.png".into(),
                snapshot: "snap.jpg".into(),
                json: true,
                dump_dir: Some("/tmp/d".into()),
                config: None,
                external: None,
            })
        );
    }

    #[test]
    fn help_flag() {
        assert_eq!(parse_args(args(&["--help"])).unwrap(), Command::Help);
    }

    #[test]
    fn wrong_positional_count_is_usage_error() {
        let err = parse_args(args(&["only-one.png"])).unwrap_err();
        assert!(matches!(err, CliError::Usage(_)));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn missing_flag_value_is_usage_error() {
        let err = parse_args(args(&["a.png", "b.png", "--config"])).unwrap_err();
        assert!(matches!(err, CliError::Usage(_)));
    }

    #[test]
    fn unknown_flag_is_usage_error() {
        let err = parse_args(args(&["a.png", "b.png", "--fast"])).unwrap_err();
        assert!(matches!(err, CliError::Usage(_)));
    }

    #[test]
    fn prints_score_with_four_decimals() {
        let tmp = tempfile::tempdir().unwrap();
        let image = tmp.path().join("square.png");
        write_square_png(&image);

        let cli = CliArgs {
            reference: image.clone(),
            snapshot: image,
            json: false,
            dump_dir: Some(tmp.path().join("dump")),
            config: None,
            external: None,
        };
        let mut out = Vec::new();
        execute(&cli, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        let line = text.trim();
        assert_eq!(line.split('.').nth(1).map(str::len), Some(4), "{line}");
        let score: f64 = line.parse().unwrap();
        assert!(score >= 0.9, "{score}");
        assert!(tmp.path().join("dump/debug_blob_ref.png").exists());
        assert!(tmp.path().join("dump/debug_blob_snap.png").exists());
    }

    #[test]
    fn json_report() {
        let tmp = tempfile::tempdir().unwrap();
        let image = tmp.path().join("square.png");
        write_square_png(&image);

        let cli = CliArgs {
            reference: image.clone(),
            snapshot: image,
            json: true,
            dump_dir: Some(tmp.path().join("dump")),
            config: None,
            external: None,
        };
        let mut out = Vec::new();
        execute(&cli, &mut out).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["outcome"], "scored");
        assert_eq!(value["scorer"], "ink_shape");
        assert!(value["score"].as_f64().unwrap() >= 0.9);
        assert!(value["raw"].as_f64().unwrap() > 0.0);
    }

    #[test]
    fn undecodable_snapshot_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let image = tmp.path().join("square.png");
        write_square_png(&image);
        let junk = tmp.path().join("junk.png");
        std::fs::write(&junk, vec![7u8; 512]).unwrap();

        let cli = CliArgs {
            reference: image,
            snapshot: junk,
            json: false,
            dump_dir: Some(tmp.path().join("dump")),
            config: None,
            external: None,
        };
        let mut out = Vec::new();
        let err = execute(&cli, &mut out).unwrap_err();
        assert!(matches!(err, CliError::Scoring(ScoringError::Decode(_))));
        assert_eq!(err.exit_code(), 1);
        assert!(out.is_empty());
    }

    #[test]
    fn missing_file_reports_path() {
        let tmp = tempfile::tempdir().unwrap();
        let cli = CliArgs {
            reference: tmp.path().join("nope.png"),
            snapshot: tmp.path().join("nope2.png"),
            json: false,
            dump_dir: Some(tmp.path().join("dump")),
            config: None,
            external: None,
        };
        let err = execute(&cli, &mut Vec::new()).unwrap_err();
        assert!(err.to_string().contains("nope.png"));
    }

    #[test]
    fn config_file_is_honoured() {
        let tmp = tempfile::tempdir().unwrap();
        let image = tmp.path().join("square.png");
        write_square_png(&image);
        let config = tmp.path().join("scoring.json");
        std::fs::write(&config, r#"{ "canvas_size": 0 }"#).unwrap();

        let cli = CliArgs {
            reference: image.clone(),
            snapshot: image,
            json: false,
            dump_dir: Some(tmp.path().join("dump")),
            config: Some(config),
            external: None,
        };
        let err = execute(&cli, &mut Vec::new()).unwrap_err();
        assert!(matches!(err, CliError::Scoring(ScoringError::Config(_))));
    }

    #[test]
    fn parses_external_scorer() {
        let cmd = parse_args(args(&[
            "a.png",
            "--external",
            "python3",
            "--external-arg",
            "ssim.py",
            "b.png",
        ]))
        .unwrap();
        let Command::Score(cli) = cmd else {
            panic!("expected score command");
        };
        assert_eq!(cli.snapshot, PathBuf::from("b.png"));
        assert_eq!(
            cli.external,
            Some(ExternalCommand {
                program: "python3".into(),
                args: vec!["ssim.py".into()],
            })
        );
    }

    #[test]
    fn external_arg_without_program_is_usage_error() {
        let err = parse_args(args(&["a.png", "b.png", "--external-arg", "x"])).unwrap_err();
        assert!(matches!(err, CliError::Usage(_)));
    }

    #[cfg(unix)]
    #[test]
    fn external_scorer_from_cli() {
        let tmp = tempfile::tempdir().unwrap();
        let image = tmp.path().join("square.png");
        write_square_png(&image);

        let cli = CliArgs {
            reference: image.clone(),
            snapshot: image,
            json: true,
            dump_dir: Some(tmp.path().join("dump")),
            config: None,
            external: Some(ExternalCommand {
                program: "sh".into(),
                args: vec!["-c".into(), "echo 0.625".into(), "scorer".into()],
            }),
        };
        let mut out = Vec::new();
        execute(&cli, &mut out).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["scorer"], "external_process");
        assert_eq!(value["score"].as_f64().unwrap(), 0.625);
        assert!(value["dump_dir"].is_null());
        assert!(!tmp.path().join("dump").exists());
    }
}
