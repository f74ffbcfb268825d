use std::{net::SocketAddr, path::PathBuf};

use clap::{builder::ArgAction, Args, Parser, Subcommand};
use console::{style, Emoji};
use duckduckpatent::{
  config::{
    deployment_environment, is_production, KeywordConfig, OpsConfig, DEFAULT_OPS_URL,
    DEFAULT_SUGGESTIONS_URL,
  },
  keyword::KeywordService,
  patent::{Patent, PatentSearchQuery},
  service::PatentsService,
};
use errors::PatentdErrors;
use tracing::{debug, trace};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

pub mod errors;
pub mod server;

static LOOKING_GLASS: Emoji<'_, '_> = Emoji("🔍 ", "");
static FAMILY: Emoji<'_, '_> = Emoji("🌳 ", "");
static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "");
static PAPER: Emoji<'_, '_> = Emoji("📄 ", "");
static SAVE: Emoji<'_, '_> = Emoji("💾 ", "");
static WARNING: Emoji<'_, '_> = Emoji("⚠️  ", "");
static SUCCESS: Emoji<'_, '_> = Emoji("✨ ", "");
static BULB: Emoji<'_, '_> = Emoji("💡 ", "");

#[derive(Parser)]
#[command(author, version, about = "Server and CLI for the DuckDuckPatent patent search")]
struct Cli {
  /// Verbose mode (-v, -vv, -vvv)
  #[arg(
        short,
        long,
        action = ArgAction::Count,
        global = true,
        help = "Increase logging verbosity"
    )]
  verbose: u8,

  #[command(flatten)]
  upstream: Upstream,

  #[command(subcommand)]
  command: Commands,
}

/// Where the upstream APIs live and how to authenticate with them.
#[derive(Args)]
struct Upstream {
  /// Base URL of the EPO Open Patent Services API
  #[arg(long, env = "PATENT_API_URL", default_value = DEFAULT_OPS_URL, global = true)]
  ops_url: String,

  /// OPS consumer key
  #[arg(long, env = "OPS_CONSUMER_KEY", hide_env_values = true, global = true)]
  consumer_key: Option<String>,

  /// OPS consumer secret
  #[arg(long, env = "OPS_CONSUMER_SECRET", hide_env_values = true, global = true)]
  consumer_secret: Option<String>,

  /// Base URL of the word similarity API
  #[arg(long, env = "SUGGESTIONS_API_URL", default_value = DEFAULT_SUGGESTIONS_URL, global = true)]
  suggestions_url: String,

  /// Deployment environment, read from NODE_ENV or APP_ENV when omitted. `production`
  /// disables mock suggestions
  #[arg(long = "env", global = true)]
  environment: Option<String>,
}

impl Upstream {
  fn ops(&self) -> Result<OpsConfig, PatentdErrors> {
    Ok(OpsConfig::new(
      &self.ops_url,
      self.consumer_key.clone().unwrap_or_default(),
      self.consumer_secret.clone().unwrap_or_default(),
    )?)
  }

  fn keywords(&self) -> Result<KeywordConfig, PatentdErrors> {
    let environment = self.environment.clone().or_else(deployment_environment);
    let production = environment.is_some_and(|env| is_production(&env));
    Ok(KeywordConfig::new(&self.suggestions_url, production)?)
  }
}

#[derive(Subcommand)]
enum Commands {
  /// Search patents by keyword, inventor or applicant
  Search {
    /// Keywords matched against titles and abstracts
    keywords:  Vec<String>,
    /// Zero-based result page
    #[arg(long, short, default_value_t = 0)]
    page:      u32,
    /// Preferred title languages, may be repeated (en, de, fr)
    #[arg(long, short)]
    language:  Vec<String>,
    /// Publication country (US, EP, ...)
    #[arg(long, short)]
    country:   Option<String>,
    /// Publication years as YYYY-YYYY
    #[arg(long, short)]
    date:      Option<String>,
    /// Inventor name
    #[arg(long)]
    inventor:  Option<String>,
    /// Applicant name
    #[arg(long)]
    applicant: Option<String>,
  },
  /// Show a single patent
  Get {
    /// Patent id, e.g. EP1000000.A1
    id: String,
  },
  /// List the family of a patent
  Family {
    /// Patent id, e.g. EP1000000.A1
    id: String,
  },
  /// List the documents available for a patent
  Documents {
    /// Patent id, e.g. EP1000000.A1
    id: String,
  },
  /// Download one page of a document
  Download {
    /// Document link as listed by `documents`
    url:          String,
    /// Page to download
    #[arg(long, short, default_value_t = 1)]
    range:        u32,
    /// Format to request
    #[arg(long, default_value = "application/pdf")]
    content_type: String,
    /// File to write the page to
    #[arg(long, short)]
    output:       PathBuf,
  },
  /// Suggest keywords related to the given ones
  Suggest {
    /// Keywords to find related terms for
    #[arg(required = true)]
    keywords: Vec<String>,
  },
  /// Serve the HTTP API
  Serve {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:3000")]
    addr:    String,
    /// Write logs to daily rotated files in this directory instead of stderr
    #[arg(long)]
    log_dir: Option<PathBuf>,
  },
}

/// Setup logging with the specified verbosity level
///
/// The returned guard flushes file logs and must be kept alive.
fn setup_logging(verbosity: u8, log_dir: Option<&PathBuf>) -> Option<WorkerGuard> {
  let filter = match verbosity {
    0 => "warn",
    1 => "info",
    2 => "debug",
    _ => "trace",
  };

  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

  let subscriber = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_file(true)
    .with_line_number(true)
    .with_thread_ids(true)
    .with_target(true);

  match log_dir {
    Some(dir) => {
      let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(
          dir,
          "duckduckpatentd.log",
        ));
      subscriber.with_writer(writer).with_ansi(false).init();
      Some(guard)
    },
    None => {
      subscriber.init();
      None
    },
  }
}

/// Prints the fields of a patent below its title.
fn print_patent(patent: &Patent) {
  println!("   {} {}", style("Id:").green().bold(), style(&patent.id).yellow());
  println!("   {} {}", style("Title:").green().bold(), style(&patent.title).white());
  if !patent.inventors.is_empty() {
    println!(
      "   {} {}",
      style("Inventors:").green().bold(),
      style(patent.inventors.join(", ")).white()
    );
  }
  if !patent.applicants.is_empty() {
    println!(
      "   {} {}",
      style("Applicants:").green().bold(),
      style(patent.applicants.join(", ")).white()
    );
  }
  if let Some(family_id) = &patent.family_id {
    println!("   {} {}", style("Family:").green().bold(), style(family_id).cyan());
  }
}

/// Prints a numbered list of patents with an abstract preview.
fn print_patents(patents: &[Patent]) {
  for (i, patent) in patents.iter().enumerate() {
    debug!("Patent details: {:?}", patent);
    println!("\n{}. {}", style(i + 1).yellow(), style(&patent.title).white().bold());
    println!("   {} {}", style("Id:").green(), style(&patent.id).yellow());

    if !patent.inventors.is_empty() {
      println!("   {} {}", style("Inventors:").green(), style(patent.inventors.join(", ")).white());
    }

    let preview = patent.abstract_text.chars().take(100).collect::<String>();
    let preview =
      if patent.abstract_text.chars().count() > 100 { format!("{}...", preview) } else { preview };
    println!("   {} {}", style("Abstract:").green(), style(preview).white().italic());
  }
}

#[tokio::main]
async fn main() -> Result<(), PatentdErrors> {
  let cli = Cli::parse();
  let log_dir = match &cli.command {
    Commands::Serve { log_dir, .. } => log_dir.as_ref(),
    _ => None,
  };
  let _guard = setup_logging(cli.verbose, log_dir);

  match cli.command {
    Commands::Search { keywords, page, language, country, date, inventor, applicant } => {
      let pairs = keywords
        .into_iter()
        .map(|k| ("keywords", k))
        .chain(language.into_iter().map(|l| ("language", l)))
        .chain(country.map(|c| ("country", c)))
        .chain(date.map(|d| ("date", d)))
        .chain(inventor.map(|i| ("inventor", i)))
        .chain(applicant.map(|a| ("applicant", a)))
        .chain(std::iter::once(("page", page.to_string())))
        .map(|(key, value)| (key.to_string(), value));
      let query = PatentSearchQuery::from_pairs(pairs)?;
      trace!("Parsed query: {:?}", query);

      let service = PatentsService::new(cli.upstream.ops()?);

      println!(
        "{} Searching for: {}",
        style(LOOKING_GLASS).cyan(),
        style(query.keywords.join(", ")).yellow()
      );

      let result = service.query(&query).await?;
      if result.patents.is_empty() {
        println!("{} No patents found", style(WARNING).yellow());
      } else {
        println!(
          "\n{} Showing {} of {} patents:",
          style(SUCCESS).green(),
          style(result.patents.len()).yellow(),
          style(result.total).yellow()
        );
        print_patents(&result.patents);
      }
      Ok(())
    },

    Commands::Get { id } => {
      let service = PatentsService::new(cli.upstream.ops()?);

      println!("{} Fetching patent: {}", style(LOOKING_GLASS).cyan(), style(&id).yellow());

      let patent = service.get(&id).await?;
      debug!("Patent details: {:?}", patent);

      println!("\n{} Patent details:", style(PAPER).green());
      print_patent(&patent);
      println!("   {} {}", style("Abstract:").green().bold(), style(&patent.abstract_text).white());
      if !patent.citations.is_empty() {
        let cited = patent.citations.iter().map(|c| c.id.as_str()).collect::<Vec<_>>();
        println!("   {} {}", style("Cites:").green().bold(), style(cited.join(", ")).cyan());
      }
      Ok(())
    },

    Commands::Family { id } => {
      let service = PatentsService::new(cli.upstream.ops()?);

      println!("{} Fetching family of: {}", style(FAMILY).cyan(), style(&id).yellow());

      let family = service.query_family(&id).await?;
      println!(
        "\n{} Family has {} members:",
        style(SUCCESS).green(),
        style(family.total).yellow()
      );
      print_patents(&family.patents);
      Ok(())
    },

    Commands::Documents { id } => {
      let service = PatentsService::new(cli.upstream.ops()?);

      println!("{} Fetching documents of: {}", style(LOOKING_GLASS).cyan(), style(&id).yellow());

      let documents = service.query_documents(&id).await?;
      if documents.is_empty() {
        println!("{} No documents available", style(WARNING).yellow());
        return Ok(());
      }

      for document in &documents {
        println!(
          "\n{} {} ({} pages)",
          style(PAPER).green(),
          style(&document.doc_type).white().bold(),
          style(document.pages).yellow()
        );
        println!("   {} {}", style("Link:").green(), style(&document.url).blue().underlined());
        println!("   {} {}", style("Formats:").green(), style(document.formats.join(", ")).white());
        for section in &document.sections {
          println!(
            "   {} {} from page {}",
            style("Section:").green(),
            style(&section.name).cyan(),
            style(&section.start_page).yellow()
          );
        }
      }
      Ok(())
    },

    Commands::Download { url, range, content_type, output } => {
      let service = PatentsService::new(cli.upstream.ops()?);

      println!(
        "{} Downloading page {} of {}",
        style(LOOKING_GLASS).cyan(),
        style(range).yellow(),
        style(&url).yellow()
      );

      let page = service.get_document(&url, &content_type, range).await?;
      if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        trace!("Creating parent directories: {}", parent.display());
        std::fs::create_dir_all(parent)?;
      }
      std::fs::write(&output, &page.data)?;

      println!(
        "{} Saved {} bytes to {}",
        style(SAVE).green(),
        style(page.data.len()).yellow(),
        style(output.display()).yellow()
      );
      Ok(())
    },

    Commands::Suggest { keywords } => {
      let service = KeywordService::new(cli.upstream.keywords()?);
      let keywords = keywords.iter().map(|k| k.to_lowercase()).collect::<Vec<_>>();

      let suggestions = service.get_suggestions(&keywords).await?;
      if suggestions.is_empty() {
        println!(
          "{} No suggestions for: {}",
          style(WARNING).yellow(),
          style(keywords.join(", ")).yellow()
        );
      } else {
        println!("{} Related keywords:", style(BULB).yellow());
        for suggestion in suggestions {
          println!("   {}", style(suggestion).white());
        }
      }
      Ok(())
    },

    Commands::Serve { addr, .. } => {
      let addr: SocketAddr = addr.parse()?;
      let state = server::AppState::new(
        PatentsService::new(cli.upstream.ops()?),
        KeywordService::new(cli.upstream.keywords()?),
      );

      println!("{} Serving the patent API on {}", style(ROCKET).cyan(), style(addr).yellow());
      server::serve(addr, state).await
    },
  }
}
