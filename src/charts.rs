//! Plotly figure specifications built from the aggregate tables.
//!
//! Builders are pure: the same tables, theme and palette always produce the same
//! figure JSON. Rendering happens in the browser.

use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

use crate::aggregate::{
    log_scale, model_category, AggregateTable, Aggregates, CoOccurrence, GroupKey, ScatterPoint,
};
use crate::dataset::CategoryCount;
use crate::focus::ResearchFocus;
use crate::theme::{Theme, FONT_FAMILY, SPEKTRUM};

const TOP_CLASSES: usize = 25;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Figure {
    pub data: Vec<Value>,
    pub layout: Value,
}

impl Figure {
    fn new(data: Vec<Value>, theme: &Theme, layout: Value) -> Self {
        Self {
            data,
            layout: merge_objects(theme.figure_layout(), layout),
        }
    }
}

fn merge_objects(base: Value, extra: Value) -> Value {
    match (base, extra) {
        (Value::Object(mut base), Value::Object(extra)) => {
            for (key, value) in extra {
                let merged = match base.remove(&key) {
                    Some(existing @ Value::Object(_)) if value.is_object() => {
                        merge_objects(existing, value)
                    }
                    _ => value,
                };
                base.insert(key, merged);
            }
            Value::Object(base)
        }
        (_, extra) => extra,
    }
}

fn focus_color(focus: ResearchFocus, palette: &[&str]) -> String {
    if palette.is_empty() {
        return SPEKTRUM[0].to_string();
    }
    palette[focus as usize % palette.len()].to_string()
}

fn colorscale(theme: &Theme) -> Value {
    let ramp = theme.sequential();
    let last = (ramp.len() - 1) as f64;
    Value::Array(
        ramp.iter()
            .enumerate()
            .map(|(idx, color)| json!([idx as f64 / last, color]))
            .collect(),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Year,
    Category,
    Focus,
}

impl Axis {
    fn label(self, key: &GroupKey) -> Option<Value> {
        match self {
            Self::Year => key.year.map(|year| json!(year)),
            Self::Category => key.category.as_ref().map(|category| json!(category)),
            Self::Focus => key.focus.map(|focus| json!(focus.label())),
        }
    }

    fn title(self) -> &'static str {
        match self {
            Self::Year => "year",
            Self::Category => "arXiv class",
            Self::Focus => "research focus",
        }
    }
}

/// Fixed visual encoding for a bar chart.
#[derive(Debug, Clone, Copy)]
pub struct BarEncoding {
    pub title: &'static str,
    pub x: Axis,
    pub series_by_focus: bool,
    pub stacked: bool,
    pub log_y: bool,
    pub y_title: &'static str,
    pub hover_template: &'static str,
}

pub fn bar_chart(table: &AggregateTable, encoding: &BarEncoding, theme: &Theme, palette: &[&str]) -> Figure {
    let data = if encoding.series_by_focus {
        let mut series: BTreeMap<ResearchFocus, (Vec<Value>, Vec<u64>)> = BTreeMap::new();
        for row in &table.rows {
            let (Some(focus), Some(x)) = (row.key.focus, encoding.x.label(&row.key)) else {
                continue;
            };
            let entry = series.entry(focus).or_default();
            entry.0.push(x);
            entry.1.push(row.value);
        }
        series
            .into_iter()
            .map(|(focus, (x, y))| {
                json!({
                    "type": "bar",
                    "name": focus.label(),
                    "x": x,
                    "y": y,
                    "marker": {"color": focus_color(focus, palette)},
                    "hovertemplate": encoding.hover_template,
                })
            })
            .collect()
    } else {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for row in &table.rows {
            if let Some(label) = encoding.x.label(&row.key) {
                x.push(label);
                y.push(row.value);
            }
        }
        let colors: Vec<&str> = if palette.is_empty() {
            Vec::new()
        } else {
            (0..x.len()).map(|idx| palette[idx % palette.len()]).collect()
        };
        vec![json!({
            "type": "bar",
            "name": table.metric.label(),
            "x": x,
            "y": y,
            "marker": {"color": colors},
            "hovertemplate": encoding.hover_template,
        })]
    };

    let barmode = if encoding.stacked { "stack" } else { "group" };
    let y_type = if encoding.log_y { "log" } else { "linear" };
    Figure::new(
        data,
        theme,
        json!({
            "title": {"text": encoding.title},
            "barmode": barmode,
            "xaxis": {"title": {"text": encoding.x.title()}},
            "yaxis": {"title": {"text": encoding.y_title}, "type": y_type},
            "legend": {"title": {"text": "research focus"}},
        }),
    )
}

/// Category → model hierarchy in Plotly's ids/labels/parents/values form.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Hierarchy {
    pub ids: Vec<String>,
    pub labels: Vec<String>,
    pub parents: Vec<String>,
    pub values: Vec<u64>,
}

impl Hierarchy {
    /// Duplicate (category, model) rows are merged; each category's value is the
    /// sum of its leaves. Blank categories become `unclassified` so no leaf can
    /// collide with the empty root parent.
    pub fn from_counts(counts: &[CategoryCount]) -> Self {
        let mut tree: BTreeMap<&str, BTreeMap<&str, u64>> = BTreeMap::new();
        for row in counts {
            *tree
                .entry(model_category(row))
                .or_default()
                .entry(row.dm_models.as_str())
                .or_insert(0) += row.paper_count;
        }
        let mut hierarchy = Self::default();
        for (category, models) in tree {
            hierarchy.ids.push(category.to_string());
            hierarchy.labels.push(category.to_string());
            hierarchy.parents.push(String::new());
            hierarchy.values.push(models.values().sum());
            for (model, count) in models {
                hierarchy.ids.push(format!("{category}/{model}"));
                hierarchy.labels.push(model.to_string());
                hierarchy.parents.push(category.to_string());
                hierarchy.values.push(count);
            }
        }
        hierarchy
    }

    pub fn leaf_total(&self) -> u64 {
        self.parents
            .iter()
            .zip(&self.values)
            .filter(|(parent, _)| !parent.is_empty())
            .map(|(_, value)| value)
            .sum()
    }

    pub fn root_total(&self) -> u64 {
        self.parents
            .iter()
            .zip(&self.values)
            .filter(|(parent, _)| parent.is_empty())
            .map(|(_, value)| value)
            .sum()
    }
}

pub fn sunburst(counts: &[CategoryCount], theme: &Theme) -> Figure {
    let hierarchy = Hierarchy::from_counts(counts);
    let mut category_colors = Map::new();
    let mut roots = 0;
    let colors: Vec<Value> = hierarchy
        .parents
        .iter()
        .zip(&hierarchy.ids)
        .map(|(parent, id)| {
            let key = if parent.is_empty() { id } else { parent };
            category_colors
                .entry(key.clone())
                .or_insert_with(|| {
                    let color = SPEKTRUM[roots % SPEKTRUM.len()];
                    roots += 1;
                    json!(color)
                })
                .clone()
        })
        .collect();
    let trace = json!({
        "type": "sunburst",
        "ids": hierarchy.ids,
        "labels": hierarchy.labels,
        "parents": hierarchy.parents,
        "values": hierarchy.values,
        "branchvalues": "total",
        "marker": {"colors": colors},
        "textinfo": "label+percent entry",
        "insidetextorientation": "radial",
        "textfont": {"size": 14, "color": theme.figure_text},
        "hovertemplate": "%{label}<br>%{value:,} papers<extra></extra>",
    });
    Figure::new(
        vec![trace],
        theme,
        json!({"width": 550, "height": 550}),
    )
}

pub fn treemap(counts: &[CategoryCount], theme: &Theme) -> Figure {
    let hierarchy = Hierarchy::from_counts(counts);
    let trace = json!({
        "type": "treemap",
        "ids": hierarchy.ids,
        "labels": hierarchy.labels,
        "parents": hierarchy.parents,
        "values": hierarchy.values,
        "branchvalues": "total",
        "marker": {
            "colors": hierarchy.values,
            "colorscale": "YlGn",
            "colorbar": {"title": {"text": "paper_count"}},
        },
        "hovertemplate": "%{label}<br>%{value:,} papers<extra></extra>",
    });
    Figure::new(vec![trace], theme, json!({"width": 800, "height": 500}))
}

pub fn citation_sunburst(table: &AggregateTable, theme: &Theme, palette: &[&str]) -> Figure {
    let mut tree: BTreeMap<&str, BTreeMap<ResearchFocus, u64>> = BTreeMap::new();
    for row in &table.rows {
        let (Some(category), Some(focus)) = (row.key.category.as_deref(), row.key.focus) else {
            continue;
        };
        *tree.entry(category).or_default().entry(focus).or_insert(0) += row.value;
    }
    let mut ids = Vec::new();
    let mut labels = Vec::new();
    let mut parents = Vec::new();
    let mut values = Vec::new();
    let mut colors = Vec::new();
    for (category, focuses) in tree {
        ids.push(category.to_string());
        labels.push(category.to_string());
        parents.push(String::new());
        values.push(focuses.values().sum::<u64>());
        colors.push(theme.highlight.to_string());
        for (focus, citations) in focuses {
            ids.push(format!("{category}/{}", focus.label()));
            labels.push(focus.label().to_string());
            parents.push(category.to_string());
            values.push(citations);
            colors.push(focus_color(focus, palette));
        }
    }
    let trace = json!({
        "type": "sunburst",
        "ids": ids,
        "labels": labels,
        "parents": parents,
        "values": values,
        "branchvalues": "total",
        "marker": {"colors": colors},
        "hovertemplate": "%{label}<br>%{value:,} citations<extra></extra>",
    });
    Figure::new(
        vec![trace],
        theme,
        json!({"title": {"text": "citations by arXiv class and research focus"}, "width": 650, "height": 650}),
    )
}

pub fn citation_scatter(aggregates: &Aggregates, theme: &Theme, palette: &[&str]) -> Figure {
    let mut series: BTreeMap<ResearchFocus, Vec<&ScatterPoint>> = BTreeMap::new();
    for point in &aggregates.scatter {
        series.entry(point.focus).or_default().push(point);
    }
    let data = series
        .into_iter()
        .map(|(focus, points)| {
            let x: Vec<f64> = points.iter().map(|p| log_scale(p.downloads)).collect();
            let y: Vec<f64> = points.iter().map(|p| log_scale(p.citations)).collect();
            let customdata: Vec<Value> = points
                .iter()
                .map(|p| json!([p.bibcode, p.title.as_deref().unwrap_or(""), p.citations, p.downloads, p.year]))
                .collect();
            json!({
                "type": "scattergl",
                "mode": "markers",
                "name": focus.label(),
                "x": x,
                "y": y,
                "customdata": customdata,
                "marker": {"color": focus_color(focus, palette), "size": 6, "opacity": 0.7},
                "hovertemplate": "%{customdata[1]}<br>%{customdata[0]} (%{customdata[4]})<br>%{customdata[2]:,} citations, %{customdata[3]:,} downloads<extra>%{fullData.name}</extra>",
            })
        })
        .collect();
    Figure::new(
        data,
        theme,
        json!({
            "title": {"text": "citations vs downloads"},
            "xaxis": {"title": {"text": "log10(downloads + 1)"}},
            "yaxis": {"title": {"text": "log10(citations + 1)"}},
            "height": 600,
        }),
    )
}

/// Year × focus heatmap of `log10(value + 1)`; absent groups stay blank.
pub fn focus_heatmap(table: &AggregateTable, theme: &Theme) -> Figure {
    let years = table.years();
    let focuses = table.focuses();
    let mut z = vec![vec![Value::Null; years.len()]; focuses.len()];
    let mut raw = vec![vec![Value::Null; years.len()]; focuses.len()];
    for (yi, focus) in focuses.iter().enumerate() {
        for (xi, year) in years.iter().enumerate() {
            let key = GroupKey {
                year: Some(*year),
                category: None,
                focus: Some(*focus),
            };
            if let Some(value) = table.value(&key) {
                z[yi][xi] = json!(log_scale(value));
                raw[yi][xi] = json!(value);
            }
        }
    }
    let labels: Vec<&str> = focuses.iter().map(|focus| focus.label()).collect();
    let trace = json!({
        "type": "heatmap",
        "x": years,
        "y": labels,
        "z": z,
        "customdata": raw,
        "colorscale": colorscale(theme),
        "colorbar": {"title": {"text": "log10(n + 1)"}},
        "hovertemplate": "%{y}, %{x}<br>%{customdata:,} papers<extra></extra>",
    });
    Figure::new(
        vec![trace],
        theme,
        json!({"title": {"text": "papers per year and research focus"}, "height": 500}),
    )
}

pub fn co_occurrence_heatmap(matrix: &CoOccurrence, theme: &Theme) -> Figure {
    let labels = matrix.labels();
    let z: Vec<Vec<f64>> = matrix
        .counts
        .iter()
        .map(|row| row.iter().map(|count| log_scale(*count)).collect())
        .collect();
    let trace = json!({
        "type": "heatmap",
        "x": labels,
        "y": labels,
        "z": z,
        "customdata": matrix.counts,
        "colorscale": colorscale(theme),
        "colorbar": {"title": {"text": "log10(n + 1)"}},
        "hovertemplate": "%{y} × %{x}<br>%{customdata:,} papers<extra></extra>",
    });
    Figure::new(
        vec![trace],
        theme,
        json!({"title": {"text": "co-occurrence of category terms"}, "width": 700, "height": 650}),
    )
}

/// Category columns on a circle, edges weighted by shared papers.
pub fn co_occurrence_network(matrix: &CoOccurrence, theme: &Theme, palette: &[&str]) -> Figure {
    let n = matrix.columns.len();
    let positions: Vec<(f64, f64)> = (0..n)
        .map(|idx| {
            let angle = std::f64::consts::TAU * idx as f64 / n.max(1) as f64;
            (angle.cos(), angle.sin())
        })
        .collect();
    let max_edge = (0..n)
        .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
        .map(|(i, j)| matrix.counts[i][j])
        .max()
        .unwrap_or(0);
    let max_node = (0..n).map(|i| matrix.counts[i][i]).max().unwrap_or(0);

    let mut data = Vec::new();
    for i in 0..n {
        for j in (i + 1)..n {
            let weight = matrix.counts[i][j];
            if weight == 0 {
                continue;
            }
            let width = 1.0 + 7.0 * weight as f64 / max_edge.max(1) as f64;
            data.push(json!({
                "type": "scatter",
                "mode": "lines",
                "x": [positions[i].0, positions[j].0],
                "y": [positions[i].1, positions[j].1],
                "line": {"width": width, "color": theme.secondary_text},
                "opacity": 0.6,
                "hoverinfo": "text",
                "text": format!("{} – {}: {} papers", matrix.columns[i].column_name(), matrix.columns[j].column_name(), weight),
                "showlegend": false,
            }));
        }
    }
    let sizes: Vec<f64> = (0..n)
        .map(|i| 10.0 + 30.0 * (matrix.counts[i][i] as f64 / max_node.max(1) as f64).sqrt())
        .collect();
    let colors: Vec<&str> = if palette.is_empty() {
        Vec::new()
    } else {
        (0..n).map(|i| palette[i % palette.len()]).collect()
    };
    data.push(json!({
        "type": "scatter",
        "mode": "markers+text",
        "x": positions.iter().map(|p| p.0).collect::<Vec<_>>(),
        "y": positions.iter().map(|p| p.1).collect::<Vec<_>>(),
        "text": matrix.labels(),
        "textposition": "top center",
        "customdata": (0..n).map(|i| matrix.counts[i][i]).collect::<Vec<_>>(),
        "marker": {"size": sizes, "color": colors, "line": {"width": 1, "color": theme.text}},
        "hovertemplate": "%{text}<br>%{customdata:,} papers<extra></extra>",
        "showlegend": false,
    }));
    let hidden_axis = json!({"showgrid": false, "zeroline": false, "showticklabels": false});
    Figure::new(
        data,
        theme,
        json!({
            "title": {"text": "category term network"},
            "xaxis": hidden_axis,
            "yaxis": hidden_axis,
            "width": 700,
            "height": 700,
        }),
    )
}

pub fn top_authors(aggregates: &Aggregates, theme: &Theme) -> Figure {
    let authors: Vec<&str> = aggregates.authors.iter().rev().map(|a| a.author.as_str()).collect();
    let papers: Vec<u64> = aggregates.authors.iter().rev().map(|a| a.papers).collect();
    let customdata: Vec<Value> = aggregates
        .authors
        .iter()
        .rev()
        .map(|a| json!([a.citations, a.downloads]))
        .collect();
    let trace = json!({
        "type": "bar",
        "orientation": "h",
        "x": papers,
        "y": authors,
        "customdata": customdata,
        "marker": {"color": theme.highlight},
        "hovertemplate": "%{y}<br>%{x} papers, %{customdata[0]:,} citations, %{customdata[1]:,} downloads<extra></extra>",
    });
    Figure::new(
        vec![trace],
        theme,
        json!({
            "title": {"text": "most prolific first authors"},
            "xaxis": {"title": {"text": "papers"}},
            "height": 200 + 25 * aggregates.authors.len(),
            "margin": {"l": 200},
        }),
    )
}

/// Classes ranked by paper count, capped at the busiest few. The result is no
/// longer key-ordered, so it only feeds [`bar_chart`].
fn ranked_classes(table: &AggregateTable) -> AggregateTable {
    let mut ranked = table.clone();
    ranked
        .rows
        .sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.key.cmp(&b.key)));
    ranked.rows.truncate(TOP_CLASSES);
    ranked
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChartId {
    PapersPerYear,
    UniquePapersPerYear,
    CitationsPerYear,
    DownloadsPerYear,
    FocusTotals,
    ArxivClasses,
    ClassesPerYear,
    CitationSunburst,
    CitationScatter,
    FocusHeatmap,
    ModelSunburst,
    ModelTreemap,
    TermCoOccurrence,
    TermNetwork,
    TopAuthors,
}

impl ChartId {
    pub const ALL: [ChartId; 15] = [
        Self::PapersPerYear,
        Self::UniquePapersPerYear,
        Self::CitationsPerYear,
        Self::DownloadsPerYear,
        Self::FocusTotals,
        Self::ArxivClasses,
        Self::ClassesPerYear,
        Self::CitationSunburst,
        Self::CitationScatter,
        Self::FocusHeatmap,
        Self::ModelSunburst,
        Self::ModelTreemap,
        Self::TermCoOccurrence,
        Self::TermNetwork,
        Self::TopAuthors,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PapersPerYear => "papers-per-year",
            Self::UniquePapersPerYear => "unique-papers-per-year",
            Self::CitationsPerYear => "citations-per-year",
            Self::DownloadsPerYear => "downloads-per-year",
            Self::FocusTotals => "focus-totals",
            Self::ArxivClasses => "arxiv-classes",
            Self::ClassesPerYear => "classes-per-year",
            Self::CitationSunburst => "citation-sunburst",
            Self::CitationScatter => "citation-scatter",
            Self::FocusHeatmap => "focus-heatmap",
            Self::ModelSunburst => "sunburst-dm-models",
            Self::ModelTreemap => "treemap-dm-models",
            Self::TermCoOccurrence => "term-co-occurrence",
            Self::TermNetwork => "term-network",
            Self::TopAuthors => "top-authors",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.as_str() == raw)
    }

    /// `palette` colours the bars and focus series.
    pub fn build(self, aggregates: &Aggregates, theme: &Theme, palette: &[&str]) -> Figure {
        match self {
            Self::PapersPerYear => bar_chart(
                &aggregates.papers_by_year_focus,
                &BarEncoding {
                    title: "papers per year by research focus",
                    x: Axis::Year,
                    series_by_focus: true,
                    stacked: true,
                    log_y: false,
                    y_title: "papers",
                    hover_template: "%{x}<br>%{y:,} papers<extra>%{fullData.name}</extra>",
                },
                theme,
                palette,
            ),
            Self::UniquePapersPerYear => bar_chart(
                &aggregates.unique_by_year_focus,
                &BarEncoding {
                    title: "unique papers per year by research focus",
                    x: Axis::Year,
                    series_by_focus: true,
                    stacked: true,
                    log_y: false,
                    y_title: "unique papers",
                    hover_template: "%{x}<br>%{y:,} unique papers<extra>%{fullData.name}</extra>",
                },
                theme,
                palette,
            ),
            Self::CitationsPerYear => bar_chart(
                &aggregates.citations_by_year_focus,
                &BarEncoding {
                    title: "citations per year by research focus",
                    x: Axis::Year,
                    series_by_focus: true,
                    stacked: false,
                    log_y: true,
                    y_title: "citations",
                    hover_template: "%{x}<br>%{y:,} citations<extra>%{fullData.name}</extra>",
                },
                theme,
                palette,
            ),
            Self::DownloadsPerYear => bar_chart(
                &aggregates.downloads_by_year_focus,
                &BarEncoding {
                    title: "downloads per year by research focus",
                    x: Axis::Year,
                    series_by_focus: true,
                    stacked: true,
                    log_y: false,
                    y_title: "downloads",
                    hover_template: "%{x}<br>%{y:,} downloads<extra>%{fullData.name}</extra>",
                },
                theme,
                palette,
            ),
            Self::FocusTotals => bar_chart(
                &aggregates.papers_by_focus,
                &BarEncoding {
                    title: "papers per research focus",
                    x: Axis::Focus,
                    series_by_focus: false,
                    stacked: false,
                    log_y: false,
                    y_title: "papers",
                    hover_template: "%{x}<br>%{y:,} papers<extra></extra>",
                },
                theme,
                palette,
            ),
            Self::ArxivClasses => bar_chart(
                &ranked_classes(&aggregates.papers_by_category),
                &BarEncoding {
                    title: "papers per primary arXiv class",
                    x: Axis::Category,
                    series_by_focus: false,
                    stacked: false,
                    log_y: true,
                    y_title: "papers",
                    hover_template: "%{x}<br>%{y:,} papers<extra></extra>",
                },
                theme,
                palette,
            ),
            Self::ClassesPerYear => classes_per_year(&aggregates.papers_by_year_category, theme),
            Self::CitationSunburst => {
                citation_sunburst(&aggregates.citations_by_year_category_focus, theme, palette)
            }
            Self::CitationScatter => citation_scatter(aggregates, theme, palette),
            Self::FocusHeatmap => focus_heatmap(&aggregates.papers_by_year_focus, theme),
            Self::ModelSunburst => sunburst(&aggregates.category_counts, theme),
            Self::ModelTreemap => treemap(&aggregates.category_counts, theme),
            Self::TermCoOccurrence => co_occurrence_heatmap(&aggregates.co_occurrence, theme),
            Self::TermNetwork => co_occurrence_network(&aggregates.co_occurrence, theme, palette),
            Self::TopAuthors => top_authors(aggregates, theme),
        }
    }
}

/// Stacked yearly bars, one series per arXiv class.
fn classes_per_year(table: &AggregateTable, theme: &Theme) -> Figure {
    let mut series: BTreeMap<&str, (Vec<i32>, Vec<u64>)> = BTreeMap::new();
    for row in &table.rows {
        let (Some(year), Some(category)) = (row.key.year, row.key.category.as_deref()) else {
            continue;
        };
        let entry = series.entry(category).or_default();
        entry.0.push(year);
        entry.1.push(row.value);
    }
    let ramp = theme.sequential();
    let data = series
        .into_iter()
        .enumerate()
        .map(|(idx, (category, (x, y)))| {
            json!({
                "type": "bar",
                "name": category,
                "x": x,
                "y": y,
                "marker": {"color": ramp[(idx % (ramp.len() - 1)) + 1]},
                "hovertemplate": "%{x}<br>%{y:,} papers<extra>%{fullData.name}</extra>",
            })
        })
        .collect();
    Figure::new(
        data,
        theme,
        json!({
            "title": {"text": "papers per year by primary arXiv class"},
            "barmode": "stack",
            "xaxis": {"title": {"text": "year"}},
            "yaxis": {"title": {"text": "papers"}},
            "font": {"family": FONT_FAMILY},
        }),
    )
}
