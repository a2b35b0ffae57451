//! Skill Advisor - skill recommendations that learn from feedback.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

use skill_advisor::config::ConfigLoader;
use skill_advisor::context::SessionContext;
use skill_advisor::display;
use skill_advisor::ratings::NewRating;
use skill_advisor::{SkillAdvisor, SkillError};

#[derive(Parser)]
#[command(
    name = "skill-advisor",
    about = "Skill recommendations that learn from feedback",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Config file to use instead of the default search paths.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database file, overriding the configured one.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Emit JSON instead of colored text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// The session a command applies to.
#[derive(Args, Debug, Clone)]
struct ContextArgs {
    /// File touched in the session (repeatable).
    #[arg(short, long = "file")]
    files: Vec<String>,
    /// Active agent id (repeatable).
    #[arg(short, long = "agent")]
    agents: Vec<String>,
    /// Project type tag.
    #[arg(short, long, default_value = "")]
    project_type: String,
}

impl ContextArgs {
    fn to_context(&self) -> SessionContext {
        SessionContext {
            touched_files: self.files.clone(),
            active_agents: self.agents.clone(),
            project_type: self.project_type.clone(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Recommend skills for a session.
    Recommend {
        #[command(flatten)]
        context: ContextArgs,
        /// Record the recommendations as surfaced.
        #[arg(long)]
        record: bool,
    },
    /// Mark a skill as activated in a session.
    Activate {
        /// Skill name.
        skill: String,
        #[command(flatten)]
        context: ContextArgs,
    },
    /// Report the outcome of a recorded recommendation.
    Feedback {
        /// Recommendation id.
        id: Uuid,
        /// The recommendation helped.
        #[arg(long)]
        helpful: bool,
        /// The task succeeded.
        #[arg(long)]
        succeeded: bool,
        /// Free-text comment.
        #[arg(long)]
        comment: Option<String>,
    },
    /// Rate a skill from 1 to 5 stars.
    Rate {
        /// Skill name.
        skill: String,
        /// Stars, 1 to 5.
        stars: u8,
        /// The skill helped.
        #[arg(long)]
        helpful: bool,
        /// The task succeeded.
        #[arg(long)]
        succeeded: bool,
        /// Free-text review.
        #[arg(long)]
        review: Option<String>,
        /// Project type the skill was used in.
        #[arg(long)]
        project_type: Option<String>,
    },
    /// Show the quality metrics of a skill.
    Score {
        /// Skill name.
        skill: String,
    },
    /// List the best rated skills.
    Top {
        /// Only skills rated under this project type.
        #[arg(long)]
        category: Option<String>,
        /// Maximum number of skills.
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// Dump ratings and metrics as JSON.
    Export {
        /// Only this skill.
        skill: Option<String>,
    },
    /// Show recent recommendations.
    History {
        /// Maximum number of records.
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// Drop stale learned patterns.
    Prune,
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn print_json<T: Serialize>(value: &T) -> Result<(), SkillError> {
    let out = serde_json::to_string_pretty(value)?;
    println!("{out}");
    Ok(())
}

fn open_advisor(cli: &Cli) -> Result<SkillAdvisor, SkillError> {
    let loader = match &cli.config {
        Some(path) => ConfigLoader::with_path(path.clone()),
        None => ConfigLoader::new(),
    };
    let mut config = loader.load()?;
    if let Some(db) = &cli.db {
        config.store.path.clone_from(db);
    }
    SkillAdvisor::open(config)
}

fn run(cli: &Cli) -> Result<(), SkillError> {
    let advisor = open_advisor(cli)?;

    match &cli.command {
        Commands::Recommend { context, record } => {
            let ctx = context.to_context();
            let recs = advisor.recommend(&ctx)?;
            let records = if *record {
                advisor.surface(&ctx, &recs)?
            } else {
                Vec::new()
            };
            if cli.json {
                #[derive(Serialize)]
                struct Output<'a> {
                    recommendations: &'a [skill_advisor::recommend::SkillRecommendation],
                    records: &'a [skill_advisor::feedback::RecommendationRecord],
                }
                print_json(&Output {
                    recommendations: &recs,
                    records: &records,
                })?;
            } else {
                display::print_recommendations(&recs);
                for record in &records {
                    display::print_record(record);
                }
            }
        }
        Commands::Activate { skill, context } => {
            let record = advisor.record_activation(&context.to_context(), skill)?;
            if cli.json {
                print_json(&record)?;
            } else {
                display::print_record(&record);
            }
        }
        Commands::Feedback {
            id,
            helpful,
            succeeded,
            comment,
        } => {
            let outcome =
                advisor.submit_feedback(*id, *helpful, *succeeded, comment.as_deref())?;
            if cli.json {
                print_json(&outcome)?;
            } else {
                display::print_feedback_outcome(&outcome);
            }
        }
        Commands::Rate {
            skill,
            stars,
            helpful,
            succeeded,
            review,
            project_type,
        } => {
            let mut rating = NewRating::new(skill.as_str(), *stars)
                .helpful(*helpful)
                .succeeded(*succeeded);
            rating.review.clone_from(review);
            rating.project_type.clone_from(project_type);
            let stored = advisor.rate(&rating)?;
            if cli.json {
                print_json(&stored)?;
            } else {
                display::print_rating(&stored);
            }
        }
        Commands::Score { skill } => {
            let metrics = advisor.get_score(skill)?;
            if cli.json {
                print_json(&metrics)?;
            } else {
                display::print_metrics(&metrics);
            }
        }
        Commands::Top { category, limit } => {
            let top = advisor.top_rated(category.as_deref(), *limit)?;
            if cli.json {
                print_json(&top)?;
            } else {
                display::print_top_rated(&top);
            }
        }
        Commands::Export { skill } => {
            print_json(&advisor.export(skill.as_deref())?)?;
        }
        Commands::History { limit } => {
            let records = advisor.history(*limit)?;
            let stats = advisor.feedback_stats()?;
            if cli.json {
                #[derive(Serialize)]
                struct Output<'a> {
                    records: &'a [skill_advisor::feedback::RecommendationRecord],
                    stats: &'a skill_advisor::feedback::FeedbackStats,
                }
                print_json(&Output {
                    records: &records,
                    stats: &stats,
                })?;
            } else {
                display::print_history(&records, &stats);
            }
        }
        Commands::Prune => {
            let removed = advisor.prune_patterns()?;
            if cli.json {
                print_json(&serde_json::json!({ "removed": removed }))?;
            } else {
                display::print_info(&format!("Removed {removed} context patterns"));
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::debug!(error = ?err, "Command failed");
            display::print_error(&err.to_string());
            ExitCode::FAILURE
        }
    }
}
