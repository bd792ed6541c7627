use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result, WrapErr};

use marginalia_common::telemetry::{self, TelemetryConfig};
use marginalia_common::{Config, FileStore, HttpAnnotationApi, MarginaliaError, ParseError};
use marginalia_core::{
    AnnotationRecord, AnnotationStore, ApiResponse, DecorationStatus, EntityRef, MemoryDecorator,
    MemoryDocument, PersistenceBridge, Region, rehydrate,
};

#[derive(Parser)]
#[command(version, about = "Marginalia - restore text annotations onto plain text", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to a .toml or .json config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Base URL of the annotation API (overrides config and environment)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a text file with its annotations wrapped in marker spans
    Render {
        /// Plain text the annotations were made on
        file: PathBuf,

        /// JSON file holding a record list or an API list response
        #[arg(long, required_unless_present = "entity", conflicts_with = "entity")]
        annotations: Option<PathBuf>,

        /// Entity uuid to fetch annotations for
        #[arg(long, requires = "entity_type")]
        entity: Option<String>,

        /// Entity type to fetch annotations for
        #[arg(long, requires = "entity")]
        entity_type: Option<String>,

        /// Region the text belongs to
        #[arg(long, default_value = "clean")]
        region: Region,
    },
    /// Print the annotations stored for an entity
    List {
        #[arg(long)]
        entity: String,

        #[arg(long)]
        entity_type: String,

        /// Print the raw records as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_miette();
    telemetry::init(TelemetryConfig::from_env("marginalia-cli"));

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref(), cli.api_url).await?;

    match cli.command {
        Commands::Render {
            file,
            annotations,
            entity,
            entity_type,
            region,
        } => {
            let text = std::fs::read_to_string(&file)
                .into_diagnostic()
                .wrap_err_with(|| format!("Could not read {}", file.display()))?;
            let records = match (annotations, entity, entity_type) {
                (Some(path), _, _) => read_records(&path)?,
                (None, Some(uuid), Some(kind)) => fetch_records(&config, EntityRef::new(uuid, kind)).await?,
                _ => return Err(miette::miette!("Either --annotations or --entity with --entity-type is required")),
            };
            let rendered = render(&text, records, region);
            println!("{}", rendered.html);
            for (id, status) in &rendered.statuses {
                if *status != DecorationStatus::Active {
                    eprintln!("⚠ {id}: not restored ({status:?})");
                }
            }
            eprintln!("✓ Restored {} of {} annotations", rendered.restored(), rendered.statuses.len());
        }
        Commands::List {
            entity,
            entity_type,
            json,
        } => {
            let records = fetch_records(&config, EntityRef::new(entity, entity_type)).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&records).into_diagnostic()?);
            } else {
                for record in &records {
                    println!("{}", describe(record));
                }
                eprintln!("{} annotations", records.len());
            }
        }
    }

    Ok(())
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("marginalia").join("config.toml"))
}

/// Config file (explicit, else the default path if present), then the
/// environment, then `--api-url`.
async fn load_config(path: Option<&Path>, api_url: Option<String>) -> Result<Config> {
    let path = path
        .map(Path::to_path_buf)
        .or_else(|| default_config_path().filter(|p| p.exists()));
    let config = match path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading config");
            Config::load(&FileStore::new(path)).await?
        }
        None => Config::default(),
    };
    let mut config = config.with_env()?;
    if let Some(url) = api_url {
        config.api_url = url;
        config.validate()?;
    }
    Ok(config)
}

/// Read records from a JSON file: either a bare array or a list response.
fn read_records(path: &Path) -> Result<Vec<AnnotationRecord>, MarginaliaError> {
    let src = std::fs::read_to_string(path)?;
    let name = path.display().to_string();
    if src.trim_start().starts_with('[') {
        return serde_json::from_str(&src).map_err(|e| ParseError::json(name, src.clone(), &e).into());
    }
    let response: ApiResponse<Vec<AnnotationRecord>> =
        serde_json::from_str(&src).map_err(|e| ParseError::json(name, src.clone(), &e))?;
    Ok(response.into_result()?.unwrap_or_default())
}

async fn fetch_records(config: &Config, entity: EntityRef) -> Result<Vec<AnnotationRecord>, MarginaliaError> {
    let api = HttpAnnotationApi::from_config(config)?;
    tracing::info!(base = %api.base(), entity = %entity.uuid, kind = %entity.kind, "fetching annotations");
    let bridge = PersistenceBridge::new(api, entity).with_notifier(|message: &str| {
        tracing::error!("{message}");
    });
    Ok(bridge.fetch().await?)
}

struct Rendered {
    html: String,
    statuses: Vec<(String, DecorationStatus)>,
}

impl Rendered {
    fn restored(&self) -> usize {
        self.statuses
            .iter()
            .filter(|(_, status)| *status == DecorationStatus::Active)
            .count()
    }
}

/// Restore `records` onto `text` and serialise the result.
///
/// Only records of `region` can be restored; the rest are reported as
/// undecorated.
fn render(text: &str, records: Vec<AnnotationRecord>, region: Region) -> Rendered {
    let (doc, pre) = MemoryDocument::with_text(text);
    let mut store = AnnotationStore::new(doc, MemoryDecorator::new());
    store.register_container(region, pre);
    rehydrate(&mut store, records);
    let drawn = store.flush_pending();
    tracing::debug!(drawn, "decorations drawn");

    let statuses = store
        .iter()
        .map(|a| (a.id.to_string(), store.decoration_status(&a.id)))
        .collect();
    Rendered {
        html: store.adapter().inner_html(pre),
        statuses,
    }
}

fn describe(record: &AnnotationRecord) -> String {
    let offset = &record.target.text_offset;
    let mut line = format!(
        "{}\t{}\t{}\t{}..{}\t{:?}",
        record.id, record.style, record.target.region, offset.start, offset.end, offset.text
    );
    if !record.content.is_empty() {
        line.push('\t');
        line.push_str(&record.content);
    }
    line
}

fn init_miette() {
    let _ = miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .with_cause_chain()
                .color(true)
                .context_lines(5)
                .tab_width(2)
                .break_words(true)
                .build(),
        )
    }));
    miette::set_panic_hook();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const TEXT: &str = "The quick brown fox";

    fn record(id: &str, start: usize, end: usize, text: &str) -> AnnotationRecord {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "entity_uuid": "e-1",
            "entity_type": "article",
            "style": "underline",
            "content": "",
            "target": {
                "region": "clean",
                "text_offset": { "start": start, "end": end, "text": text }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_render_restores_matching_records() {
        let rendered = render(TEXT, vec![record("a", 10, 15, "brown")], Region::Clean);
        assert_eq!(
            rendered.html,
            "The quick <span id=\"annotation-span-a\" class=\"annotation-target\" data-annotation-id=\"a\">brown</span> fox"
        );
        assert_eq!(rendered.restored(), 1);
    }

    #[test]
    fn test_render_reports_out_of_range_records() {
        let rendered = render(
            TEXT,
            vec![record("a", 10, 15, "brown"), record("b", 100, 110, "nowhere")],
            Region::Clean,
        );
        assert_eq!(rendered.statuses.len(), 2);
        assert_eq!(rendered.restored(), 1);
        assert_eq!(rendered.statuses[1], ("b".to_string(), DecorationStatus::Undecorated));
    }

    #[test]
    fn test_render_skips_other_regions() {
        let rendered = render(TEXT, vec![record("a", 10, 15, "brown")], Region::Translate);
        assert_eq!(rendered.html, TEXT);
        assert_eq!(rendered.restored(), 0);
    }

    #[test]
    fn test_read_records_accepts_list_and_envelope() {
        let mut list = tempfile::NamedTempFile::new().unwrap();
        let records = vec![record("a", 10, 15, "brown")];
        write!(list, "{}", serde_json::to_string(&records).unwrap()).unwrap();
        assert_eq!(read_records(list.path()).unwrap(), records);

        let mut envelope = tempfile::NamedTempFile::new().unwrap();
        let response = ApiResponse::ok(records.clone());
        write!(envelope, "{}", serde_json::to_string(&response).unwrap()).unwrap();
        assert_eq!(read_records(envelope.path()).unwrap(), records);
    }

    #[test]
    fn test_read_records_rejects_error_envelope() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"code": 500, "message": "boom"}}"#).unwrap();
        let err = read_records(file.path()).unwrap_err();
        assert!(matches!(err, MarginaliaError::Annotation(_)));
    }

    #[test]
    fn test_read_records_points_at_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[{{\"id\": 1}}]").unwrap();
        let err = read_records(file.path()).unwrap_err();
        assert!(matches!(err, MarginaliaError::Parse(_)));
    }

    #[test]
    fn test_describe_record() {
        let mut r = record("a", 10, 15, "brown");
        r.content = "colour".to_string();
        assert_eq!(describe(&r), "a\tunderline\tclean\t10..15\t\"brown\"\tcolour");
    }

    #[tokio::test]
    async fn test_api_url_flag_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "api_url = \"http://file.example/api\"\nsettle_delay_ms = 80\n").unwrap();

        let config = load_config(Some(&path), Some("http://flag.example/api".to_string()))
            .await
            .unwrap();
        assert_eq!(config.api_url, "http://flag.example/api");
        assert_eq!(config.settle_delay_ms, 80);
    }

    #[tokio::test]
    async fn test_invalid_api_url_flag() {
        assert!(load_config(None, Some("not a url".to_string())).await.is_err());
    }
}
