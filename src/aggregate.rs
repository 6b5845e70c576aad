//! Grouped statistics over the resolved paper table.
//!
//! Every table is recomputed from scratch at startup. Rows come out in key order
//! so two runs over the same input produce identical tables, and a group with no
//! qualifying papers is simply absent rather than emitted with a zero.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::info;

use crate::dataset::{CategoryColumn, CategoryCount, Dataset, PaperRecord};
use crate::focus::{resolve_all, ResearchFocus, ResolvedPaper};

pub const UNCLASSIFIED: &str = "unclassified";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Grouping {
    Year,
    YearFocus,
    YearCategory,
    YearCategoryFocus,
    Focus,
    Category,
}

impl Grouping {
    fn key(self, row: &ResolvedPaper<'_>) -> GroupKey {
        let year = Some(row.paper.year);
        let category = Some(row.paper.primary_class().unwrap_or(UNCLASSIFIED).to_string());
        let focus = Some(row.focus);
        match self {
            Self::Year => GroupKey { year, category: None, focus: None },
            Self::YearFocus => GroupKey { year, category: None, focus },
            Self::YearCategory => GroupKey { year, category, focus: None },
            Self::YearCategoryFocus => GroupKey { year, category, focus },
            Self::Focus => GroupKey { year: None, category: None, focus },
            Self::Category => GroupKey { year: None, category, focus: None },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    PaperCount,
    UniquePapers,
    CitationSum,
    DownloadSum,
}

impl Metric {
    pub fn label(self) -> &'static str {
        match self {
            Self::PaperCount => "papers",
            Self::UniquePapers => "unique papers",
            Self::CitationSum => "citations",
            Self::DownloadSum => "downloads",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct GroupKey {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus: Option<ResearchFocus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateRow {
    #[serde(flatten)]
    pub key: GroupKey,
    pub value: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateTable {
    pub grouping: Grouping,
    pub metric: Metric,
    pub rows: Vec<AggregateRow>,
}

impl AggregateTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.rows.iter().map(|row| row.value).sum()
    }

    pub fn years(&self) -> Vec<i32> {
        let years: BTreeSet<i32> = self.rows.iter().filter_map(|row| row.key.year).collect();
        years.into_iter().collect()
    }

    pub fn focuses(&self) -> Vec<ResearchFocus> {
        let focuses: BTreeSet<ResearchFocus> =
            self.rows.iter().filter_map(|row| row.key.focus).collect();
        focuses.into_iter().collect()
    }

    pub fn categories(&self) -> Vec<String> {
        let categories: BTreeSet<&str> = self
            .rows
            .iter()
            .filter_map(|row| row.key.category.as_deref())
            .collect();
        categories.into_iter().map(str::to_string).collect()
    }

    /// Sum of values per year, across the other key parts.
    pub fn totals_by_year(&self) -> BTreeMap<i32, u64> {
        let mut totals = BTreeMap::new();
        for row in &self.rows {
            if let Some(year) = row.key.year {
                *totals.entry(year).or_insert(0) += row.value;
            }
        }
        totals
    }

    /// Rows are key-ordered, so lookup is a binary search.
    pub fn value(&self, key: &GroupKey) -> Option<u64> {
        self.rows
            .binary_search_by(|row| row.key.cmp(key))
            .ok()
            .map(|idx| self.rows[idx].value)
    }
}

#[derive(Default)]
struct Accumulator<'a> {
    sum: u64,
    bibcodes: BTreeSet<&'a str>,
}

pub fn aggregate(rows: &[ResolvedPaper<'_>], grouping: Grouping, metric: Metric) -> AggregateTable {
    let mut groups: BTreeMap<GroupKey, Accumulator<'_>> = BTreeMap::new();
    for row in rows {
        let acc = groups.entry(grouping.key(row)).or_default();
        match metric {
            Metric::PaperCount => acc.sum += 1,
            Metric::UniquePapers => {
                acc.bibcodes.insert(row.paper.bibcode.as_str());
            }
            Metric::CitationSum => acc.sum += row.paper.citations,
            Metric::DownloadSum => acc.sum += row.paper.downloads,
        }
    }
    let rows = groups
        .into_iter()
        .map(|(key, acc)| {
            let value = match metric {
                Metric::UniquePapers => acc.bibcodes.len() as u64,
                _ => acc.sum,
            };
            AggregateRow { key, value }
        })
        .collect();
    AggregateTable {
        grouping,
        metric,
        rows,
    }
}

/// Display scaling for skewed counts.
pub fn log_scale(value: u64) -> f64 {
    (value as f64 + 1.0).log10()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorStat {
    pub author: String,
    pub papers: u64,
    pub citations: u64,
    pub downloads: u64,
}

/// Per first-author totals, most prolific first.
pub fn author_stats(papers: &[PaperRecord], limit: usize) -> Vec<AuthorStat> {
    let mut by_author: HashMap<&str, AuthorStat> = HashMap::new();
    for paper in papers {
        let Some(author) = paper.first_author.as_deref() else {
            continue;
        };
        let stat = by_author.entry(author).or_insert_with(|| AuthorStat {
            author: author.to_string(),
            papers: 0,
            citations: 0,
            downloads: 0,
        });
        stat.papers += 1;
        stat.citations += paper.citations;
        stat.downloads += paper.downloads;
    }
    let mut stats: Vec<AuthorStat> = by_author.into_values().collect();
    stats.sort_by(|a, b| {
        b.papers
            .cmp(&a.papers)
            .then_with(|| b.citations.cmp(&a.citations))
            .then_with(|| a.author.cmp(&b.author))
    });
    stats.truncate(limit);
    stats
}

/// Papers carrying both columns; the diagonal is each column's coverage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoOccurrence {
    pub columns: Vec<CategoryColumn>,
    pub counts: Vec<Vec<u64>>,
}

impl CoOccurrence {
    pub fn labels(&self) -> Vec<&'static str> {
        self.columns.iter().map(|column| column.column_name()).collect()
    }

    pub fn get(&self, a: CategoryColumn, b: CategoryColumn) -> u64 {
        self.counts[a.index()][b.index()]
    }
}

pub fn co_occurrence(papers: &[PaperRecord]) -> CoOccurrence {
    let n = CategoryColumn::COUNT;
    let mut counts = vec![vec![0u64; n]; n];
    for paper in papers {
        let present: Vec<usize> = CategoryColumn::ALL
            .iter()
            .filter(|column| paper.category(**column).is_some())
            .map(|column| column.index())
            .collect();
        for &i in &present {
            for &j in &present {
                counts[i][j] += 1;
            }
        }
    }
    CoOccurrence {
        columns: CategoryColumn::ALL.to_vec(),
        counts,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategorySubtotal {
    pub category: String,
    pub paper_count: u64,
    pub models: usize,
}

/// Blank model categories are grouped under [`UNCLASSIFIED`].
pub fn model_category(count: &CategoryCount) -> &str {
    if count.dm_category.trim().is_empty() {
        UNCLASSIFIED
    } else {
        count.dm_category.as_str()
    }
}

pub fn category_subtotals(counts: &[CategoryCount]) -> Vec<CategorySubtotal> {
    let mut groups: BTreeMap<&str, (u64, usize)> = BTreeMap::new();
    for row in counts {
        let entry = groups.entry(model_category(row)).or_insert((0, 0));
        entry.0 += row.paper_count;
        entry.1 += 1;
    }
    groups
        .into_iter()
        .map(|(category, (paper_count, models))| CategorySubtotal {
            category: category.to_string(),
            paper_count,
            models,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterPoint {
    pub bibcode: String,
    pub title: Option<String>,
    pub year: i32,
    pub citations: u64,
    pub downloads: u64,
    pub focus: ResearchFocus,
}

/// Every table the charts read, built once from the loaded dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregates {
    pub records: usize,
    pub resolved: usize,
    pub dropped: usize,
    pub papers_by_year: AggregateTable,
    pub papers_by_year_focus: AggregateTable,
    pub unique_by_year_focus: AggregateTable,
    pub citations_by_year_focus: AggregateTable,
    pub downloads_by_year_focus: AggregateTable,
    pub papers_by_year_category: AggregateTable,
    pub citations_by_year_category_focus: AggregateTable,
    pub papers_by_focus: AggregateTable,
    pub papers_by_category: AggregateTable,
    pub authors: Vec<AuthorStat>,
    pub co_occurrence: CoOccurrence,
    pub category_counts: Vec<CategoryCount>,
    pub category_subtotals: Vec<CategorySubtotal>,
    pub scatter: Vec<ScatterPoint>,
}

impl Aggregates {
    pub fn build(dataset: &Dataset, top_authors: usize) -> Self {
        let resolved = resolve_all(&dataset.papers);
        let rows = &resolved.rows;
        let aggregates = Self {
            records: dataset.papers.len(),
            resolved: rows.len(),
            dropped: resolved.dropped,
            papers_by_year: aggregate(rows, Grouping::Year, Metric::PaperCount),
            papers_by_year_focus: aggregate(rows, Grouping::YearFocus, Metric::PaperCount),
            unique_by_year_focus: aggregate(rows, Grouping::YearFocus, Metric::UniquePapers),
            citations_by_year_focus: aggregate(rows, Grouping::YearFocus, Metric::CitationSum),
            downloads_by_year_focus: aggregate(rows, Grouping::YearFocus, Metric::DownloadSum),
            papers_by_year_category: aggregate(rows, Grouping::YearCategory, Metric::PaperCount),
            citations_by_year_category_focus: aggregate(
                rows,
                Grouping::YearCategoryFocus,
                Metric::CitationSum,
            ),
            papers_by_focus: aggregate(rows, Grouping::Focus, Metric::PaperCount),
            papers_by_category: aggregate(rows, Grouping::Category, Metric::PaperCount),
            authors: author_stats(&dataset.papers, top_authors),
            co_occurrence: co_occurrence(&dataset.papers),
            category_counts: dataset.category_counts.clone(),
            category_subtotals: category_subtotals(&dataset.category_counts),
            scatter: rows
                .iter()
                .map(|row| ScatterPoint {
                    bibcode: row.paper.bibcode.clone(),
                    title: row.paper.title.clone(),
                    year: row.paper.year,
                    citations: row.paper.citations,
                    downloads: row.paper.downloads,
                    focus: row.focus,
                })
                .collect(),
        };
        info!(
            records = aggregates.records,
            resolved = aggregates.resolved,
            dropped = aggregates.dropped,
            years = aggregates.papers_by_year.rows.len(),
            "built aggregates"
        );
        aggregates
    }
}
