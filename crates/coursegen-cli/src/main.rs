mod analyze_cmd;
mod config;
mod generate_cmd;
mod validate_cmd;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use coursegen_core::curriculum::Curriculum;
use coursegen_core::orchestrator::PhaseOptions;
use coursegen_core::store::ChapterStore;

use config::{Overrides, Settings};

#[derive(Parser)]
#[command(
    name = "coursegen",
    about = "Generate multi-format training curricula with an LLM"
)]
struct Cli {
    /// Path to curriculum.json (overrides COURSEGEN_CURRICULUM)
    #[arg(long = "config-curriculum", global = true)]
    curriculum: Option<PathBuf>,

    /// Output root for chapter directories (overrides COURSEGEN_OUTPUT_DIR)
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a coursegen config file
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
        /// Anthropic API key to store in the config file
        #[arg(long)]
        api_key: Option<String>,
        /// Model identifier to store in the config file
        #[arg(long)]
        model: Option<String>,
    },
    /// Generate chapter documents and run the post-generation phases
    Generate {
        #[command(flatten)]
        selection: Selection,
        /// Chapters per concurrent batch (sequential when omitted)
        #[arg(long)]
        parallel: Option<usize>,
        /// Skip the check/edit review
        #[arg(long)]
        skip_check: bool,
        /// Skip revise/extend remediation
        #[arg(long)]
        skip_revise: bool,
        /// Skip the polish pass
        #[arg(long)]
        skip_polish: bool,
        /// Skip markdown normalisation and export
        #[arg(long)]
        skip_export: bool,
        /// Continue after the last checkpointed chapter
        #[arg(long)]
        resume: bool,
        /// Spending ceiling in US dollars (overrides COURSEGEN_BUDGET)
        #[arg(long)]
        budget: Option<f64>,
        /// Model identifier (overrides COURSEGEN_MODEL)
        #[arg(long)]
        model: Option<String>,
    },
    /// Check generated chapters against structural expectations (offline)
    Validate {
        #[command(flatten)]
        selection: Selection,
    },
    /// Show quality findings for a generated chapter (offline)
    Analyze {
        /// Chapter number to analyze
        #[arg(long)]
        chapter: u32,
    },
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct Selection {
    /// Chapter number to process
    #[arg(long)]
    chapter: Option<u32>,
    /// Process every chapter in the curriculum
    #[arg(long)]
    all: bool,
}

impl Selection {
    fn chapters(&self, curriculum: &Curriculum) -> Result<Vec<u32>> {
        match self.chapter {
            Some(n) => {
                curriculum.chapter(n)?;
                Ok(vec![n])
            }
            None => Ok(curriculum.chapters.iter().map(|c| c.number).collect()),
        }
    }
}

fn load_curriculum(settings: &Settings) -> Result<Curriculum> {
    Curriculum::load(&settings.curriculum_path).with_context(|| {
        format!(
            "failed to load curriculum from {}",
            settings.curriculum_path.display()
        )
    })
}

/// Execute the `coursegen init` command: write config file.
fn cmd_init(force: bool, api_key: Option<String>, model: Option<String>) -> Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let cfg = config::ConfigFile {
        api: config::ApiSection {
            model: Some(model.unwrap_or_else(|| coursegen_core::budget::DEFAULT_MODEL.to_string())),
            api_key: api_key.clone(),
            ..config::ApiSection::default()
        },
        budget: config::BudgetSection {
            ceiling_usd: Some(coursegen_core::budget::DEFAULT_CEILING_USD),
        },
        output: config::OutputSection {
            dir: Some(PathBuf::from(config::DEFAULT_OUTPUT_DIR)),
        },
        curriculum: config::CurriculumSection {
            path: Some(PathBuf::from(config::DEFAULT_CURRICULUM)),
        },
        pricing: Vec::new(),
    };

    config::save_config_to(&path, &cfg)?;

    println!("Config written to {}", path.display());
    if let Some(model) = &cfg.api.model {
        println!("  api.model = {model}");
    }
    match &api_key {
        Some(key) => println!("  api.api_key = {}", config::mask_secret(key)),
        None => println!("  api.api_key not set (export {} instead)", config::ENV_API_KEY),
    }
    if let Some(ceiling) = cfg.budget.ceiling_usd {
        println!("  budget.ceiling_usd = {ceiling:.2}");
    }
    println!();
    println!("Next: run `coursegen generate --chapter 1`.");

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut overrides = Overrides {
        curriculum: cli.curriculum,
        output_dir: cli.output_dir,
        ..Overrides::default()
    };

    match cli.command {
        Commands::Init {
            force,
            api_key,
            model,
        } => {
            cmd_init(force, api_key, model)?;
        }
        Commands::Generate {
            selection,
            parallel,
            skip_check,
            skip_revise,
            skip_polish,
            skip_export,
            resume,
            budget,
            model,
        } => {
            overrides.budget = budget;
            overrides.model = model;
            let settings = Settings::resolve(&overrides)?;
            let curriculum = load_curriculum(&settings)?;
            let chapters = selection.chapters(&curriculum)?;
            let args = generate_cmd::GenerateArgs {
                chapters,
                parallel,
                resume,
                phases: PhaseOptions {
                    skip_check_edit: skip_check,
                    skip_revise,
                    skip_polish,
                    skip_export,
                },
            };
            generate_cmd::run_generate(&settings, curriculum, args).await?;
        }
        Commands::Validate { selection } => {
            let settings = Settings::resolve(&overrides)?;
            let curriculum = load_curriculum(&settings)?;
            let chapters = selection.chapters(&curriculum)?;
            let store = ChapterStore::new(settings.output_dir.clone());
            validate_cmd::run_validate(&store, &curriculum, &chapters).await?;
        }
        Commands::Analyze { chapter } => {
            let settings = Settings::resolve(&overrides)?;
            let store = ChapterStore::new(settings.output_dir.clone());
            analyze_cmd::run_analyze(&store, chapter).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn generate_requires_exactly_one_selection() {
        assert!(Cli::try_parse_from(["coursegen", "generate"]).is_err());
        assert!(
            Cli::try_parse_from(["coursegen", "generate", "--chapter", "2", "--all"]).is_err()
        );
        let cli = Cli::try_parse_from([
            "coursegen",
            "generate",
            "--all",
            "--parallel",
            "4",
            "--skip-polish",
            "--budget",
            "2.5",
            "--output-dir",
            "out",
        ])
        .unwrap();
        assert_eq!(cli.output_dir, Some(PathBuf::from("out")));
        match cli.command {
            Commands::Generate {
                selection,
                parallel,
                skip_polish,
                skip_check,
                budget,
                ..
            } => {
                assert!(selection.all);
                assert_eq!(parallel, Some(4));
                assert!(skip_polish);
                assert!(!skip_check);
                assert_eq!(budget, Some(2.5));
            }
            _ => panic!("expected generate"),
        }
    }

    #[test]
    fn global_curriculum_flag_parses_after_subcommand() {
        let cli = Cli::try_parse_from([
            "coursegen",
            "validate",
            "--chapter",
            "3",
            "--config-curriculum",
            "course.json",
        ])
        .unwrap();
        assert_eq!(cli.curriculum, Some(PathBuf::from("course.json")));
    }

    #[test]
    fn selection_checks_chapter_exists() {
        let curriculum = Curriculum::from_json(
            r#"{"chapters": [
                {"number": 1, "title": "A", "learningObjectives": [], "topics": []},
                {"number": 2, "title": "B", "learningObjectives": [], "topics": []}
            ]}"#,
        )
        .unwrap();
        let all = Selection {
            chapter: None,
            all: true,
        };
        assert_eq!(all.chapters(&curriculum).unwrap(), vec![1, 2]);
        let missing = Selection {
            chapter: Some(7),
            all: false,
        };
        assert!(missing.chapters(&curriculum).is_err());
    }
}
