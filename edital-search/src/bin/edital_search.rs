//! Command-line front end for the edital search store.
//!
//! Usage:
//!     edital-search --db editais.sqlite seed [--synthetic 5000]
//!     edital-search --db editais.sqlite search --keywords "equipamento; hospitalar" --state SP
//!     edital-search --db editais.sqlite options --field city --state SP

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use edital_search::demo::{seed_demo, synthetic_editais};
use edital_search::{DistinctField, EditalSearch, HighlightRange, Highlighted, SearchConfig, SearchFilter, SearchPage};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "edital-search")]
#[command(about = "Keyword search over public procurement notices", long_about = None)]
struct Cli {
    /// SQLite database file
    #[arg(long, default_value = "editais.sqlite")]
    db: PathBuf,
    /// JSON search configuration
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the demo corpus
    Seed {
        /// Also generate this many synthetic notices
        #[arg(long)]
        synthetic: Option<usize>,
        /// Seed for the synthetic generator
        #[arg(long, default_value_t = 42)]
        rng_seed: u64,
    },
    /// Search notices
    Search {
        /// Phrases separated by ';'
        #[arg(short, long, default_value = "")]
        keywords: String,
        #[arg(long = "state")]
        states: Vec<String>,
        #[arg(long = "city")]
        cities: Vec<String>,
        #[arg(long = "modality")]
        modalities: Vec<String>,
        /// Proposal opening on or after (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Proposal closing on or before (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
        /// Match keywords literally, without morphological variations
        #[arg(long)]
        exact: bool,
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Print excerpts as HTML with <mark> tags
        #[arg(long)]
        html: bool,
    },
    /// List distinct values for a filter
    Options {
        #[arg(long, value_enum)]
        field: OptionField,
        /// Restrict to one state
        #[arg(long)]
        state: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OptionField {
    State,
    City,
    Modality,
}

impl From<OptionField> for DistinctField {
    fn from(field: OptionField) -> Self {
        match field {
            OptionField::State => DistinctField::State,
            OptionField::City => DistinctField::City,
            OptionField::Modality => DistinctField::Modality,
        }
    }
}

/// Wrap highlighted char ranges in brackets for terminal output.
fn mark_plain(text: &str, highlights: &[HighlightRange]) -> String {
    let mut out = String::with_capacity(text.len() + highlights.len() * 2);
    for (i, c) in text.chars().enumerate() {
        let i = i as u64;
        if highlights.iter().any(|h| h.start == i) {
            out.push('[');
        }
        out.push(c);
        if highlights.iter().any(|h| h.end == i + 1) {
            out.push(']');
        }
    }
    out
}

/// Render `text` with its precomputed highlights, as HTML or bracket markers.
fn render(service: &EditalSearch, text: &str, highlights: &[HighlightRange], html: bool) -> String {
    if html {
        Highlighted::from_ranges(text, highlights).to_html(&service.config().palette)
    } else {
        mark_plain(text, highlights)
    }
}

fn print_page(service: &EditalSearch, page: &SearchPage, html: bool) {
    println!(
        "{} result(s), page {}/{}",
        page.total_count,
        page.page,
        page.total_pages().max(1)
    );
    for item in &page.items {
        let e = &item.edital;
        println!();
        println!(
            "{}  [{}]  {} / {}  {}",
            e.id,
            e.status.to_database_str(),
            e.unidade.uf_sigla.as_deref().unwrap_or("-"),
            e.unidade.municipio_nome.as_deref().unwrap_or("-"),
            e.modalidade_nome.as_deref().unwrap_or("-"),
        );
        if let Some(orgao) = &e.orgao.razao_social {
            println!("  {}", render(service, orgao, &item.organization_highlights, html));
        }
        println!(
            "  {}",
            render(service, &item.match_data.text, &item.match_data.highlights, html)
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => SearchConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SearchConfig::default(),
    };
    let service = EditalSearch::open(&cli.db, config)
        .with_context(|| format!("opening {}", cli.db.display()))?;

    match cli.command {
        Commands::Seed { synthetic, rng_seed } => {
            let mut written = seed_demo(service.database())?;
            if let Some(count) = synthetic {
                written += service.insert_editais(&synthetic_editais(count, rng_seed))?;
            }
            info!(written, "seed complete");
            println!("{} notice(s) written to {}", written, cli.db.display());
        }
        Commands::Search {
            keywords,
            states,
            cities,
            modalities,
            from,
            to,
            exact,
            page,
            html,
        } => {
            let filter = SearchFilter {
                keywords,
                states,
                cities,
                modalities,
                start_date: from,
                end_date: to,
                smart_search: !exact,
            };
            if !filter.is_active() {
                println!("No filter given. Pass --keywords or another filter.");
                return Ok(());
            }
            let result = service.search(filter, page).await?;
            print_page(&service, &result, html);
        }
        Commands::Options { field, state } => {
            for value in service.options(field.into(), state.as_deref())? {
                println!("{}", value);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_plain() {
        let highlights = [
            HighlightRange { start: 0, end: 5, keyword_index: 0, color_index: 0 },
            HighlightRange { start: 13, end: 16, keyword_index: 1, color_index: 1 },
        ];
        assert_eq!(mark_plain("Ração animal sal", &highlights), "[Ração] animal [sal]");
    }

    #[test]
    fn test_render_html_uses_given_ranges() {
        let service = EditalSearch::in_memory(SearchConfig::default()).unwrap();
        let highlights = [HighlightRange { start: 9, end: 17, keyword_index: 0, color_index: 0 }];
        assert_eq!(
            render(&service, "mentos e hospital", &highlights, true),
            "mentos e <mark class=\"bg-yellow-200 px-1 rounded\">hospital</mark>"
        );
        assert_eq!(render(&service, "mentos e hospital", &highlights, false), "mentos e [hospital]");
    }

    #[test]
    fn test_cli_parses_search() {
        let cli = Cli::try_parse_from([
            "edital-search", "search", "-k", "equipamento; hospitalar", "--state", "SP", "--state", "RJ",
            "--from", "2025-03-01", "--exact",
        ])
        .unwrap();
        match cli.command {
            Commands::Search { keywords, states, from, exact, .. } => {
                assert_eq!(keywords, "equipamento; hospitalar");
                assert_eq!(states, vec!["SP", "RJ"]);
                assert_eq!(from, NaiveDate::from_ymd_opt(2025, 3, 1));
                assert!(exact);
            }
            _ => panic!("expected search"),
        }
    }
}
