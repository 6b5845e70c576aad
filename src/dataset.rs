//! Loads the paper table and the category/model count table into memory.
//!
//! Both tables are read once at startup. A source with a `remote_id` is served
//! from its local cache file when present; otherwise it is fetched with a single
//! blocking GET, parsed straight from the response bytes, and persisted to the
//! cache path for the next start.

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::config::{DashboardConfig, DatasetSource};
use crate::error::{DashboardError, Result};
use crate::utils;

static ARXIV_CLASS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z][A-Za-z\-]*(?:\.[A-Za-z\-]+)?").expect("valid arxiv class regex")
});

/// One nullable topical column of the paper table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryColumn {
    Particles,
    Gravity,
    Detectors,
    Theory,
    Colliders,
    StellarObjects,
    Methods,
    Inferences,
    Telescopes,
    DmModels,
}

impl CategoryColumn {
    pub const COUNT: usize = 10;

    pub const ALL: [CategoryColumn; Self::COUNT] = [
        Self::Particles,
        Self::Gravity,
        Self::Detectors,
        Self::Theory,
        Self::Colliders,
        Self::StellarObjects,
        Self::Methods,
        Self::Inferences,
        Self::Telescopes,
        Self::DmModels,
    ];

    pub fn column_name(self) -> &'static str {
        match self {
            Self::Particles => "particles",
            Self::Gravity => "gravity",
            Self::Detectors => "detectors",
            Self::Theory => "theory",
            Self::Colliders => "colliders",
            Self::StellarObjects => "stellar_objects",
            Self::Methods => "methods",
            Self::Inferences => "inferences",
            Self::Telescopes => "telescopes",
            Self::DmModels => "dm_models",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaperRecord {
    pub bibcode: String,
    pub year: i32,
    pub citations: u64,
    pub downloads: u64,
    pub first_author: Option<String>,
    pub title: Option<String>,
    pub arxiv_classes: Vec<String>,
    pub categories: [Option<String>; CategoryColumn::COUNT],
}

impl PaperRecord {
    pub fn category(&self, column: CategoryColumn) -> Option<&str> {
        self.categories[column.index()].as_deref()
    }

    pub fn primary_class(&self) -> Option<&str> {
        self.arxiv_classes.first().map(String::as_str)
    }
}

/// Precomputed (category, model, paper count) row, loaded as-is.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, serde::Serialize)]
pub struct CategoryCount {
    pub dm_category: String,
    pub dm_models: String,
    pub paper_count: u64,
}

#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub papers: Vec<PaperRecord>,
    pub category_counts: Vec<CategoryCount>,
}

#[derive(Debug, Deserialize)]
struct RawPaperRow {
    #[serde(default)]
    bibcode: Option<String>,
    #[serde(default)]
    year: Option<String>,
    #[serde(default)]
    citation_count: Option<String>,
    #[serde(default, alias = "downloads")]
    read_count: Option<String>,
    #[serde(default)]
    first_author: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    arxiv_class: Option<String>,
    #[serde(default)]
    particles: Option<String>,
    #[serde(default)]
    gravity: Option<String>,
    #[serde(default)]
    detectors: Option<String>,
    #[serde(default)]
    theory: Option<String>,
    #[serde(default)]
    colliders: Option<String>,
    #[serde(default)]
    stellar_objects: Option<String>,
    #[serde(default)]
    methods: Option<String>,
    #[serde(default)]
    inferences: Option<String>,
    #[serde(default)]
    telescopes: Option<String>,
    #[serde(default)]
    dm_models: Option<String>,
}

/// Resolves sources to bytes: cache file first, remote fetch otherwise.
pub struct SourceLoader {
    client: Client,
    remote_url_template: String,
}

impl SourceLoader {
    pub fn new(remote_url_template: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("damadi/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| DashboardError::Fetch {
                url: String::new(),
                source: err,
            })?;
        Ok(Self {
            client,
            remote_url_template: remote_url_template.into(),
        })
    }

    pub fn from_config(config: &DashboardConfig) -> Result<Self> {
        Self::new(config.remote_url_template.clone())
    }

    pub fn remote_url(&self, remote_id: &str) -> String {
        self.remote_url_template.replace("{id}", remote_id)
    }

    /// Returns the source bytes. `refresh` skips the cache for remote-backed sources.
    pub fn read(&self, source: &DatasetSource, refresh: bool) -> Result<Vec<u8>> {
        match &source.remote_id {
            Some(remote_id) if refresh || !source.path.is_file() => {
                let bytes = self.fetch(remote_id)?;
                utils::ensure_parent_dir(&source.path)?;
                utils::write_atomic_bytes(&source.path, &bytes)?;
                info!(path = %source.path.display(), bytes = bytes.len(), "cached remote table");
                Ok(bytes)
            }
            _ => {
                debug!(path = %source.path.display(), "reading local table");
                fs::read(&source.path).map_err(|err| DashboardError::io(&source.path, err))
            }
        }
    }

    fn fetch(&self, remote_id: &str) -> Result<Vec<u8>> {
        let url = self.remote_url(remote_id);
        info!(%url, "fetching remote table");
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|err| DashboardError::Fetch {
                url: url.clone(),
                source: err,
            })?;
        if !response.status().is_success() {
            return Err(DashboardError::FetchStatus {
                url,
                status: response.status().as_u16(),
            });
        }
        let bytes = response.bytes().map_err(|err| DashboardError::Fetch {
            url: url.clone(),
            source: err,
        })?;
        Ok(bytes.to_vec())
    }
}

pub fn load_papers(
    source: &DatasetSource,
    loader: &SourceLoader,
    refresh: bool,
) -> Result<Vec<PaperRecord>> {
    let bytes = loader.read(source, refresh)?;
    parse_papers(&source.path, &bytes)
}

pub fn load_category_counts(
    source: &DatasetSource,
    loader: &SourceLoader,
    refresh: bool,
) -> Result<Vec<CategoryCount>> {
    let bytes = loader.read(source, refresh)?;
    parse_category_counts(&source.path, &bytes)
}

/// Loads both tables; any failure is fatal to startup.
pub fn load_dataset(config: &DashboardConfig, loader: &SourceLoader, refresh: bool) -> Result<Dataset> {
    let papers = load_papers(&config.papers_source(), loader, refresh)?;
    let category_counts = load_category_counts(&config.category_counts_source(), loader, refresh)?;
    info!(
        papers = papers.len(),
        category_counts = category_counts.len(),
        "loaded dataset"
    );
    Ok(Dataset {
        papers,
        category_counts,
    })
}

/// Parses the row-per-paper CSV. `path` only labels errors.
pub fn parse_papers(path: &Path, bytes: &[u8]) -> Result<Vec<PaperRecord>> {
    let csv_err = |err: csv::Error| DashboardError::Csv {
        path: path.to_path_buf(),
        source: err,
    };
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(bytes);
    let headers = reader.headers().map_err(csv_err)?.clone();
    if headers.is_empty() {
        return Ok(Vec::new());
    }
    for column in ["bibcode", "year"] {
        if !headers.iter().any(|header| header == column) {
            return Err(DashboardError::MissingColumn {
                path: path.to_path_buf(),
                column,
            });
        }
    }

    let mut papers = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        let line = record.position().map(|pos| pos.line()).unwrap_or(0);
        let raw: RawPaperRow = record.deserialize(Some(&headers)).map_err(csv_err)?;
        papers.push(convert_row(path, line, raw)?);
    }
    Ok(papers)
}

fn convert_row(path: &Path, line: u64, raw: RawPaperRow) -> Result<PaperRecord> {
    let malformed = |column: &'static str, value: Option<&str>| DashboardError::MalformedColumn {
        path: path.to_path_buf(),
        line,
        column,
        value: value.unwrap_or_default().to_string(),
    };

    let bibcode = utils::non_null(raw.bibcode).ok_or_else(|| malformed("bibcode", None))?;
    let year_raw = utils::non_null(raw.year);
    let year = year_raw
        .as_deref()
        .and_then(parse_whole_number)
        .and_then(|value| i32::try_from(value).ok())
        .ok_or_else(|| malformed("year", year_raw.as_deref()))?;
    let citations = parse_count(raw.citation_count).map_err(|value| malformed("citation_count", Some(value.as_str())))?;
    let downloads = parse_count(raw.read_count).map_err(|value| malformed("read_count", Some(value.as_str())))?;

    let categories = [
        utils::non_null(raw.particles),
        utils::non_null(raw.gravity),
        utils::non_null(raw.detectors),
        utils::non_null(raw.theory),
        utils::non_null(raw.colliders),
        utils::non_null(raw.stellar_objects),
        utils::non_null(raw.methods),
        utils::non_null(raw.inferences),
        utils::non_null(raw.telescopes),
        utils::non_null(raw.dm_models),
    ];

    Ok(PaperRecord {
        bibcode,
        year,
        citations,
        downloads,
        first_author: utils::non_null(raw.first_author),
        title: utils::non_null(raw.title),
        arxiv_classes: utils::non_null(raw.arxiv_class)
            .map(|value| parse_arxiv_classes(&value))
            .unwrap_or_default(),
        categories,
    })
}

/// Accepts `12` and `12.0`; rejects fractions and negatives.
fn parse_whole_number(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if let Ok(value) = trimmed.parse::<i64>() {
        return Some(value);
    }
    let value = trimmed.parse::<f64>().ok()?;
    if value.is_finite() && value.fract() == 0.0 {
        Some(value as i64)
    } else {
        None
    }
}

/// Null counts are zero, as a pandas sum would skip them.
fn parse_count(raw: Option<String>) -> std::result::Result<u64, String> {
    match utils::non_null(raw) {
        None => Ok(0),
        Some(value) => parse_whole_number(&value)
            .and_then(|number| u64::try_from(number).ok())
            .ok_or(value),
    }
}

/// Handles both `['astro-ph.CO', 'hep-ph']` and `astro-ph.CO; hep-ph`.
pub fn parse_arxiv_classes(raw: &str) -> Vec<String> {
    ARXIV_CLASS_RE
        .find_iter(raw)
        .map(|found| found.as_str().to_string())
        .collect()
}

pub fn parse_category_counts(path: &Path, bytes: &[u8]) -> Result<Vec<CategoryCount>> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("csv") => {
            let mut reader = csv::ReaderBuilder::new()
                .has_headers(true)
                .from_reader(bytes);
            reader
                .deserialize::<CategoryCount>()
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|err| DashboardError::Csv {
                    path: path.to_path_buf(),
                    source: err,
                })
        }
        Some("json") => serde_json::from_slice(bytes).map_err(|err| DashboardError::Json {
            path: path.to_path_buf(),
            source: err,
        }),
        _ => Err(DashboardError::UnsupportedFormat(path.to_path_buf())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::path::PathBuf;
    use std::thread;

    const HEADER: &str = "bibcode,year,citation_count,read_count,first_author,title,arxiv_class,particles,gravity,detectors,theory,colliders,stellar_objects,methods,inferences,telescopes,dm_models\n";

    fn label() -> PathBuf {
        PathBuf::from("papers.csv")
    }

    #[test]
    fn parses_rows_with_pandas_nulls() {
        let csv = format!(
            "{HEADER}2020ApJ...1..1A,2020,12.0,300,\"Doe, J.\",Axions,\"['astro-ph.CO', 'hep-ph']\",axion,,NaN,,,,,,,\n"
        );
        let papers = parse_papers(&label(), csv.as_bytes()).unwrap();
        assert_eq!(papers.len(), 1);
        let paper = &papers[0];
        assert_eq!(paper.year, 2020);
        assert_eq!(paper.citations, 12);
        assert_eq!(paper.downloads, 300);
        assert_eq!(paper.first_author.as_deref(), Some("Doe, J."));
        assert_eq!(paper.arxiv_classes, vec!["astro-ph.CO", "hep-ph"]);
        assert_eq!(paper.category(CategoryColumn::Particles), Some("axion"));
        assert_eq!(paper.category(CategoryColumn::Detectors), None);
        assert_eq!(paper.primary_class(), Some("astro-ph.CO"));
    }

    #[test]
    fn null_counts_are_zero() {
        let csv = format!("{HEADER}b1,2019,,nan,,,,,,,,,,,,,\n");
        let papers = parse_papers(&label(), csv.as_bytes()).unwrap();
        assert_eq!(papers[0].citations, 0);
        assert_eq!(papers[0].downloads, 0);
        assert!(papers[0].arxiv_classes.is_empty());
    }

    #[test]
    fn downloads_alias_is_accepted() {
        let csv = "bibcode,year,downloads\nb1,2021,7\n";
        let papers = parse_papers(&label(), csv.as_bytes()).unwrap();
        assert_eq!(papers[0].downloads, 7);
    }

    #[test]
    fn malformed_year_reports_line() {
        let csv = format!("{HEADER}b1,2019,1,1,,,,,,,,,,,,,\nb2,soon,1,1,,,,,,,,,,,,,\n");
        let err = parse_papers(&label(), csv.as_bytes()).unwrap_err();
        match err {
            DashboardError::MalformedColumn { line, column, value, .. } => {
                assert_eq!(line, 3);
                assert_eq!(column, "year");
                assert_eq!(value, "soon");
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn missing_year_column_is_fatal() {
        let err = parse_papers(&label(), b"bibcode,title\nb1,x\n").unwrap_err();
        assert!(matches!(err, DashboardError::MissingColumn { column: "year", .. }));
    }

    #[test]
    fn empty_input_is_empty_table() {
        assert!(parse_papers(&label(), b"").unwrap().is_empty());
        assert!(parse_papers(&label(), HEADER.as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn category_counts_from_csv_and_json() {
        let csv = b"dm_category,dm_models,paper_count\nParticle,WIMP,10\nParticle,Axion,5\n";
        let rows = parse_category_counts(Path::new("counts.csv"), csv).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].dm_models, "Axion");

        let json = br#"[{"dm_category": "Modified gravity", "dm_models": "MOND", "paper_count": 3}]"#;
        let rows = parse_category_counts(Path::new("counts.json"), json).unwrap();
        assert_eq!(rows[0].paper_count, 3);

        let err = parse_category_counts(Path::new("counts.pkl"), b"").unwrap_err();
        assert!(matches!(err, DashboardError::UnsupportedFormat(_)));
    }

    #[test]
    fn cached_source_skips_network() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("papers.csv");
        fs::write(&path, "bibcode,year\nb1,2020\n").unwrap();
        let loader = SourceLoader::new("http://127.0.0.1:9/{id}").unwrap();
        let source = DatasetSource {
            path: path.clone(),
            remote_id: Some("remote".into()),
        };
        let bytes = loader.read(&source, false).unwrap();
        assert_eq!(bytes, b"bibcode,year\nb1,2020\n");
    }

    /// Answers one request per queued response on a loopback port, then exits.
    /// The handle yields the number of requests served.
    fn local_server(responses: Vec<(&'static str, &'static [u8])>) -> (String, thread::JoinHandle<usize>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let mut served = 0;
            for (status, body) in responses {
                let (mut stream, _) = listener.accept().unwrap();
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut line = String::new();
                while reader.read_line(&mut line).unwrap() > 0 && line != "\r\n" {
                    line.clear();
                }
                let mut response = format!(
                    "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                )
                .into_bytes();
                response.extend_from_slice(body);
                // The client may hang up early on error statuses.
                let _ = stream.write_all(&response);
                served += 1;
            }
            served
        });
        (format!("http://{addr}/uc?id={{id}}"), handle)
    }

    #[test]
    fn fetched_table_is_persisted_to_cache() {
        let body: &'static [u8] = b"bibcode,year\nb1,2020\n";
        let (template, server) = local_server(vec![("200 OK", body)]);
        let dir = tempfile::tempdir().unwrap();
        let loader = SourceLoader::new(template).unwrap();
        let source = DatasetSource {
            path: dir.path().join("cache").join("papers.csv"),
            remote_id: Some("file-1".into()),
        };
        let bytes = loader.read(&source, false).unwrap();
        assert_eq!(bytes, body);
        assert_eq!(fs::read(&source.path).unwrap(), body);
        assert_eq!(server.join().unwrap(), 1);

        // A second read is served from the cache; the server has already exited.
        assert_eq!(loader.read(&source, false).unwrap(), body);
    }

    #[test]
    fn error_status_is_fatal_and_not_cached() {
        let (template, server) = local_server(vec![("404 Not Found", b"gone")]);
        let dir = tempfile::tempdir().unwrap();
        let loader = SourceLoader::new(template).unwrap();
        let source = DatasetSource {
            path: dir.path().join("papers.csv"),
            remote_id: Some("file-1".into()),
        };
        let err = loader.read(&source, false).unwrap_err();
        assert!(matches!(err, DashboardError::FetchStatus { status: 404, .. }));
        assert!(!source.path.exists());
        assert_eq!(server.join().unwrap(), 1);
    }

    #[test]
    fn refresh_refetches_over_existing_cache() {
        let fresh: &'static [u8] = b"bibcode,year\nb2,2021\n";
        let (template, server) = local_server(vec![("200 OK", fresh)]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("papers.csv");
        fs::write(&path, "bibcode,year\nstale,1999\n").unwrap();
        let loader = SourceLoader::new(template).unwrap();
        let source = DatasetSource {
            path: path.clone(),
            remote_id: Some("file-1".into()),
        };
        assert_eq!(loader.read(&source, true).unwrap(), fresh);
        assert_eq!(fs::read(&path).unwrap(), fresh);
        assert_eq!(server.join().unwrap(), 1);
    }

    #[test]
    fn whitespace_category_counts_as_present() {
        let csv = "bibcode,year,particles,gravity\nb1,2020,\"  \",lensing\n";
        let papers = parse_papers(&label(), csv.as_bytes()).unwrap();
        assert!(papers[0].category(CategoryColumn::Particles).is_some());
        assert_eq!(papers[0].category(CategoryColumn::Gravity), Some("lensing"));
    }

    #[test]
    fn unreachable_remote_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let loader = SourceLoader::new("http://127.0.0.1:9/{id}").unwrap();
        let source = DatasetSource {
            path: dir.path().join("missing.csv"),
            remote_id: Some("remote".into()),
        };
        let err = loader.read(&source, false).unwrap_err();
        assert!(matches!(err, DashboardError::Fetch { .. }));
        assert!(!source.path.exists());
    }

    #[test]
    fn missing_local_file_is_an_error() {
        let loader = SourceLoader::new("unused").unwrap();
        let err = loader
            .read(&DatasetSource::local("/nonexistent/papers.csv"), false)
            .unwrap_err();
        assert!(matches!(err, DashboardError::Io { .. }));
    }
}
