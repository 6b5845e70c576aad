use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tower::ServiceExt;

use damadi::aggregate::Aggregates;
use damadi::charts::ChartId;
use damadi::config::{DashboardConfig, DatasetSource};
use damadi::dataset::{self, Dataset, SourceLoader};
use damadi::focus::ResearchFocus;
use damadi::serve::{build_router, AppState};
use damadi::theme::{self, ThemeMode};

const PAPERS_CSV: &str = "\
bibcode,year,citation_count,read_count,first_author,title,arxiv_class,particles,gravity,detectors,theory,colliders,stellar_objects,methods,inferences,telescopes,dm_models
2019A,2019,10,100,\"Doe, J.\",Axion haloscopes,\"['hep-ph']\",axion,,haloscope,,,,,,,axion
2019B,2019,3.0,40,\"Roe, R.\",Lensing constraints,astro-ph.CO,,lensing,,,,,,,,
2020A,2020,0,NaN,\"Doe, J.\",Uncategorised note,,,,,,,,,,,
2020B,2020,25,500,\"Poe, P.\",WIMP limits,\"['hep-ex', 'astro-ph.CO']\",wimp,,xenon,,,,,,,wimp
2021A,2021,,7,,Dwarf galaxy survey,astro-ph.GA,,,,,,dwarf,,,telescope,
";

const COUNTS_CSV: &str = "\
dm_category,dm_models,paper_count
Particle,WIMP,40
Particle,Axion,25
Modified gravity,MOND,12
";

fn fixture_dataset() -> Dataset {
    Dataset {
        papers: dataset::parse_papers(Path::new("papers.csv"), PAPERS_CSV.as_bytes()).unwrap(),
        category_counts: dataset::parse_category_counts(
            Path::new("paper_counts.csv"),
            COUNTS_CSV.as_bytes(),
        )
        .unwrap(),
    }
}

fn manifest_path(entry: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join(entry)
}

fn test_app() -> Router {
    let config = DashboardConfig {
        templates_dir: manifest_path("templates"),
        assets_dir: manifest_path("static"),
        ..DashboardConfig::default()
    };
    let aggregates = Aggregates::build(&fixture_dataset(), 5);
    build_router(AppState::new(config, aggregates))
}

async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

#[test]
fn loads_dataset_from_local_cache_files() {
    let dir = tempfile::tempdir().unwrap();
    let papers = dir.path().join("df_unique.csv");
    let counts = dir.path().join("paper_counts.json");
    fs::write(&papers, PAPERS_CSV).unwrap();
    fs::write(
        &counts,
        r#"[{"dm_category": "Particle", "dm_models": "WIMP", "paper_count": 40}]"#,
    )
    .unwrap();

    let config = DashboardConfig {
        papers: DatasetSource::local(&papers),
        category_counts: DatasetSource::local(&counts),
        ..DashboardConfig::default()
    };
    let loader = SourceLoader::from_config(&config).unwrap();
    let data = dataset::load_dataset(&config, &loader, false).unwrap();
    assert_eq!(data.papers.len(), 5);
    assert_eq!(data.category_counts.len(), 1);
}

#[test]
fn remote_backed_tables_are_read_from_output_dir_cache() {
    let dir = tempfile::tempdir().unwrap();
    let cache_dir = dir.path().join(".damadi");
    fs::create_dir_all(&cache_dir).unwrap();
    fs::write(cache_dir.join("df_unique.csv"), PAPERS_CSV).unwrap();
    fs::write(cache_dir.join("paper_counts.csv"), COUNTS_CSV).unwrap();

    let config = DashboardConfig {
        output_dir: cache_dir,
        papers: DatasetSource {
            path: PathBuf::from("df_unique.csv"),
            remote_id: Some("papers-id".into()),
        },
        category_counts: DatasetSource {
            path: PathBuf::from("paper_counts.csv"),
            remote_id: Some("counts-id".into()),
        },
        // Nothing listens here, so any fetch attempt would fail the load.
        remote_url_template: "http://127.0.0.1:9/{id}".into(),
        ..DashboardConfig::default()
    };
    let loader = SourceLoader::from_config(&config).unwrap();
    let data = dataset::load_dataset(&config, &loader, false).unwrap();
    assert_eq!(data.papers.len(), 5);
    assert_eq!(data.category_counts.len(), 3);
}

#[test]
fn aggregates_drop_uncategorised_papers() {
    let aggregates = Aggregates::build(&fixture_dataset(), 5);
    assert_eq!(aggregates.records, 5);
    assert_eq!(aggregates.resolved, 4);
    assert_eq!(aggregates.dropped, 1);
    assert_eq!(aggregates.papers_by_year.total(), 4);
    assert_eq!(aggregates.citations_by_year_focus.total(), 38);

    let focuses = aggregates.papers_by_focus.focuses();
    assert!(focuses.contains(&ResearchFocus::Particles));
    assert!(focuses.contains(&ResearchFocus::GravitationalPhenomena));
    assert!(focuses.contains(&ResearchFocus::StellarObjects));
    assert!(!focuses.contains(&ResearchFocus::DarkMatterModels));

    let subtotal_particle = aggregates
        .category_subtotals
        .iter()
        .find(|row| row.category == "Particle")
        .unwrap();
    assert_eq!(subtotal_particle.paper_count, 65);
    assert_eq!(subtotal_particle.models, 2);
}

#[test]
fn rebuilding_aggregates_is_idempotent() {
    let data = fixture_dataset();
    assert_eq!(Aggregates::build(&data, 5), Aggregates::build(&data, 5));
}

#[test]
fn every_chart_builds_for_both_themes() {
    let aggregates = Aggregates::build(&fixture_dataset(), 5);
    let palette = theme::shuffled_palette(42);
    for mode in [ThemeMode::Dark, ThemeMode::Light] {
        let theme = mode.theme();
        for chart in ChartId::ALL {
            let figure = serde_json::to_value(chart.build(&aggregates, &theme, &palette)).unwrap();
            assert!(figure["data"].is_array(), "{}", chart.as_str());
            assert_eq!(figure["layout"]["paper_bgcolor"], theme.background);
        }
    }
}

#[test]
fn charts_survive_an_empty_dataset() {
    let aggregates = Aggregates::build(&Dataset::default(), 5);
    let theme = ThemeMode::Dark.theme();
    let palette = theme::shuffled_palette(7);
    for chart in ChartId::ALL {
        let figure = serde_json::to_value(chart.build(&aggregates, &theme, &palette)).unwrap();
        assert!(figure["layout"].is_object(), "{}", chart.as_str());
    }
}

#[tokio::test]
async fn health_reports_snapshot_sizes() {
    let (status, body) = get(test_app(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["ok"], true);
    assert_eq!(json["papers"], 5);
    assert_eq!(json["dropped"], 1);
}

#[tokio::test]
async fn root_renders_default_page() {
    let (status, body) = get(test_app(), "/").await;
    assert_eq!(status, StatusCode::OK);
    let html = String::from_utf8(body).unwrap();
    assert!(html.contains("Interactive Plots: Dark Matter Models"));
    assert!(html.contains("data-chart=\"sunburst-dm-models\""));
    assert!(html.contains("page-2\" selected>"));
}

#[tokio::test]
async fn light_theme_swaps_image_sources() {
    let (status, body) = get(test_app(), "/page-1?theme=light").await;
    assert_eq!(status, StatusCode::OK);
    let html = String::from_utf8(body).unwrap();
    assert!(html.contains("pop_dm_models_light.svg"));
    assert!(!html.contains("pop_dm_models.svg"));
    assert!(html.contains("?theme=dark"));
}

#[tokio::test]
async fn unmapped_path_is_not_found_layout() {
    let (status, body) = get(test_app(), "/no-such-page").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let html = String::from_utf8(body).unwrap();
    assert!(html.contains("404"));
}

#[tokio::test]
async fn chart_endpoint_serves_figure_json() {
    let (status, body) = get(test_app(), "/api/charts/papers-per-year?theme=light").await;
    assert_eq!(status, StatusCode::OK);
    let figure: Value = serde_json::from_slice(&body).unwrap();
    assert!(figure["data"].is_array());
    assert_eq!(
        figure["layout"]["paper_bgcolor"],
        ThemeMode::Light.theme().background
    );
}

#[tokio::test]
async fn unknown_chart_is_404() {
    let (status, _) = get(test_app(), "/api/charts/pie-of-everything").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn page_options_list_every_page() {
    let (status, body) = get(test_app(), "/api/pages").await;
    assert_eq!(status, StatusCode::OK);
    let options: Vec<Value> = serde_json::from_slice(&body).unwrap();
    assert_eq!(options.len(), 17);
    assert_eq!(options[0]["label"], "static");
    assert_eq!(options[1]["value"], "/page-2");
}

#[tokio::test]
async fn stylesheet_is_served_from_assets() {
    let (status, body) = get(test_app(), "/assets/custom_styles.css").await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8(body).unwrap().contains("#sidebar"));
}

#[tokio::test]
async fn broken_templates_are_a_server_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = DashboardConfig {
        templates_dir: dir.path().to_path_buf(),
        ..DashboardConfig::default()
    };
    let app = build_router(AppState::new(config, Aggregates::build(&fixture_dataset(), 5)));
    let (status, _) = get(app, "/page-2").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}
