use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use crate::config::EditorConfig;
use crate::cursor::{Direction, Side};
use crate::document::{AnnotationStore, JsonFileProvider};
use crate::logging::LoggingConfig;
use crate::monitoring::{completion_table, render_table};
use crate::project::Project;
use crate::session::{EditorSession, EditorView, PairMove, RelationDirection, StatisticsView};

#[derive(Parser, Debug)]
#[command(name = "relation-editor")]
#[command(about = "Annotate relations between pairs of text segments")]
#[command(version)]
pub struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    /// Also write daily log files to this directory
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn logging_config(&self) -> LoggingConfig {
        let mut config = LoggingConfig {
            level: self.log_level.clone(),
            ..Default::default()
        };
        if let Some(dir) = &self.log_dir {
            config.log_dir = dir.clone();
            config.enable_file_logging = true;
        }
        config
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Interactive editing session over a JSON document
    Edit { document: PathBuf },
    /// Print progress and per-tag counts
    Stats {
        document: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Print which users finished each document of a project
    Monitor { project: PathBuf },
    /// Write the default configuration
    InitConfig { path: PathBuf },
}

/// One line of input in the edit loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditCommand {
    Pair(PairMove),
    Segment(Side, Direction),
    Relation(RelationDirection, String),
    Filter(Option<String>),
    Stats,
    Help,
    Quit,
}

pub const EDIT_HELP: &str = "\
n / p        next / previous pair
i            next incomplete pair
ln / lp      next / previous left segment
rn / rp      next / previous right segment
l <tag>      set the relation pointing at the left segment
r <tag>      set the relation pointing at the right segment
f [tag]      filter pairs by tag, or clear the filter
s            tag statistics
q            quit";

pub fn parse_edit_command(line: &str) -> Result<EditCommand> {
    let mut parts = line.split_whitespace();
    let head = parts.next().ok_or_else(|| anyhow!("empty command"))?;
    let rest: Vec<&str> = parts.collect();
    let argument = || {
        if rest.is_empty() {
            Err(anyhow!("'{}' needs a tag name", head))
        } else {
            Ok(rest.join(" "))
        }
    };

    let command = match head {
        "n" => EditCommand::Pair(PairMove::Next),
        "p" => EditCommand::Pair(PairMove::Previous),
        "i" => EditCommand::Pair(PairMove::NextIncomplete),
        "ln" => EditCommand::Segment(Side::Left, Direction::Next),
        "lp" => EditCommand::Segment(Side::Left, Direction::Previous),
        "rn" => EditCommand::Segment(Side::Right, Direction::Next),
        "rp" => EditCommand::Segment(Side::Right, Direction::Previous),
        "l" => EditCommand::Relation(RelationDirection::RightToLeft, argument()?),
        "r" => EditCommand::Relation(RelationDirection::LeftToRight, argument()?),
        "f" => EditCommand::Filter(argument().ok()),
        "s" => EditCommand::Stats,
        "h" | "?" | "help" => EditCommand::Help,
        "q" | "quit" => EditCommand::Quit,
        other => bail!("unknown command '{}', type h for help", other),
    };
    Ok(command)
}

pub fn load_config(path: Option<&Path>) -> Result<EditorConfig> {
    let config = match path {
        Some(path) => EditorConfig::load_from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EditorConfig::default(),
    };
    Ok(config.with_env_overrides())
}

pub fn render_view(view: &EditorView) -> String {
    let tag_name = |tag: &Option<crate::model::Tag>| {
        tag.as_ref()
            .map(|t| t.name.clone())
            .unwrap_or_else(|| "-".to_string())
    };
    let filter = view
        .filter
        .as_ref()
        .map(|t| format!("  filter: {}", t.name))
        .unwrap_or_default();

    let mut out = format!(
        "pair {}/{}  done {} ({}){}\n",
        view.pair_index + 1,
        view.pair_count,
        view.progress_label,
        view.progress.count_label(),
        filter
    );
    out.push_str(&format!("L {} {}\n", view.left_position, view.left_text));
    out.push_str(&format!("R {} {}\n", view.right_position, view.right_text));
    out.push_str(&format!(
        "  left: {}  right: {}\n",
        tag_name(&view.left_relation),
        tag_name(&view.right_relation)
    ));
    if let Some(url) = &view.left_metadata.url {
        out.push_str(&format!("  source: {}\n", url));
    }
    out
}

pub fn render_statistics(stats: &StatisticsView) -> String {
    let mut out = format!(
        "completed {} ({})\n",
        stats.progress.count_label(),
        stats.progress.percent_label()
    );
    for entry in &stats.per_tag {
        out.push_str(&format!("{:<20} {}\n", entry.tag.name, entry.pairs));
    }
    out
}

/// Drive a session from line-oriented input until `q` or end of input.
pub fn run_edit_loop<S, R, W>(session: &mut EditorSession<S>, input: R, out: &mut W) -> Result<()>
where
    S: AnnotationStore,
    R: BufRead,
    W: Write,
{
    write!(out, "{}", render_view(&session.view()))?;

    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let command = match parse_edit_command(&line) {
            Ok(command) => command,
            Err(e) => {
                writeln!(out, "{}", e)?;
                continue;
            }
        };

        match command {
            EditCommand::Quit => break,
            EditCommand::Help => {
                writeln!(out, "{}", EDIT_HELP)?;
                continue;
            }
            EditCommand::Stats => {
                write!(out, "{}", render_statistics(&session.tag_statistics()))?;
                continue;
            }
            EditCommand::Pair(movement) => {
                if session.on_navigate_pair(movement).is_none() {
                    writeln!(out, "no matching pair")?;
                }
            }
            EditCommand::Segment(side, direction) => {
                session.on_navigate(side, direction);
            }
            EditCommand::Relation(direction, tag) => {
                if let Err(e) = session.on_select_relation(direction, &tag) {
                    writeln!(out, "{}", e.user_message())?;
                }
            }
            EditCommand::Filter(tag) => {
                if let Err(e) = session.on_set_filter(tag.as_deref()) {
                    writeln!(out, "{}", e.user_message())?;
                }
            }
        }
        write!(out, "{}", render_view(&session.view()))?;
    }

    Ok(())
}

pub fn edit_command(document: PathBuf, config: EditorConfig) -> Result<()> {
    let provider = JsonFileProvider::new(&document);
    let mut session = EditorSession::from_provider(&provider, config)?;
    for warning in session.warnings() {
        eprintln!("warning: {}", warning);
    }

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    run_edit_loop(&mut session, stdin.lock(), &mut stdout)?;

    let progress = session.progress();
    info!(document = %document.display(), completed = %progress.count_label(), "Edit session closed");
    Ok(())
}

pub fn stats_command(document: PathBuf, json: bool, config: EditorConfig) -> Result<()> {
    let session = EditorSession::from_provider(&JsonFileProvider::new(document), config)?;
    let stats = session.tag_statistics();
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print!("{}", render_statistics(&stats));
    }
    Ok(())
}

pub fn monitor_command(project: PathBuf) -> Result<()> {
    let project = Project::load_from_file(&project)?;
    let stats = project.get_stats();
    println!(
        "{}: {} documents, {} finished, {} in progress",
        project.name, stats.total_documents, stats.finished, stats.in_progress
    );
    print!("{}", render_table(&completion_table(&project)));
    Ok(())
}

pub fn init_config_command(path: PathBuf) -> Result<()> {
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    EditorConfig::default().save_to_file(&path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}
