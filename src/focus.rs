//! Research-focus resolution.
//!
//! Each paper carries up to ten nullable category columns but is charted under a
//! single label. The label is the first rule in [`FOCUS_RULES`] whose column is
//! present; secondary categories are discarded. Papers with no category at all
//! are dropped from every focus-based aggregate.

use serde::Serialize;
use tracing::debug;

use crate::dataset::{CategoryColumn, PaperRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ResearchFocus {
    Particles,
    GravitationalPhenomena,
    Detectors,
    Theory,
    Colliders,
    StellarObjects,
    Methods,
    Inferences,
    Telescopes,
    DarkMatterModels,
}

impl ResearchFocus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Particles => "Particles",
            Self::GravitationalPhenomena => "Gravitational phenomena",
            Self::Detectors => "Detectors",
            Self::Theory => "Theory",
            Self::Colliders => "Colliders",
            Self::StellarObjects => "Stellar objects",
            Self::Methods => "Methods",
            Self::Inferences => "Inferences",
            Self::Telescopes => "Telescopes",
            Self::DarkMatterModels => "Dark matter models",
        }
    }

    /// Every focus, in rule priority order.
    pub fn all() -> impl Iterator<Item = ResearchFocus> {
        FOCUS_RULES.iter().map(|(_, focus)| *focus)
    }
}

/// Priority-ordered (column, label) rules; earlier rules win.
pub const FOCUS_RULES: [(CategoryColumn, ResearchFocus); CategoryColumn::COUNT] = [
    (CategoryColumn::Particles, ResearchFocus::Particles),
    (CategoryColumn::Gravity, ResearchFocus::GravitationalPhenomena),
    (CategoryColumn::Detectors, ResearchFocus::Detectors),
    (CategoryColumn::Theory, ResearchFocus::Theory),
    (CategoryColumn::Colliders, ResearchFocus::Colliders),
    (CategoryColumn::StellarObjects, ResearchFocus::StellarObjects),
    (CategoryColumn::Methods, ResearchFocus::Methods),
    (CategoryColumn::Inferences, ResearchFocus::Inferences),
    (CategoryColumn::Telescopes, ResearchFocus::Telescopes),
    (CategoryColumn::DmModels, ResearchFocus::DarkMatterModels),
];

pub fn resolve_focus(paper: &PaperRecord) -> Option<ResearchFocus> {
    FOCUS_RULES
        .iter()
        .find(|(column, _)| paper.category(*column).is_some())
        .map(|(_, focus)| *focus)
}

#[derive(Debug, Clone, Copy)]
pub struct ResolvedPaper<'a> {
    pub paper: &'a PaperRecord,
    pub focus: ResearchFocus,
}

#[derive(Debug, Clone, Default)]
pub struct ResolvedTable<'a> {
    pub rows: Vec<ResolvedPaper<'a>>,
    pub dropped: usize,
}

pub fn resolve_all(papers: &[PaperRecord]) -> ResolvedTable<'_> {
    let mut table = ResolvedTable::default();
    for paper in papers {
        match resolve_focus(paper) {
            Some(focus) => table.rows.push(ResolvedPaper { paper, focus }),
            None => table.dropped += 1,
        }
    }
    debug!(
        resolved = table.rows.len(),
        dropped = table.dropped,
        "resolved research focus"
    );
    table
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn paper(bibcode: &str, year: i32, columns: &[CategoryColumn]) -> PaperRecord {
        let mut categories: [Option<String>; CategoryColumn::COUNT] = Default::default();
        for column in columns {
            categories[column.index()] = Some(column.column_name().to_string());
        }
        PaperRecord {
            bibcode: bibcode.to_string(),
            year,
            citations: 0,
            downloads: 0,
            first_author: None,
            title: None,
            arxiv_classes: Vec::new(),
            categories,
        }
    }

    #[test]
    fn particles_beat_gravity() {
        let record = paper("b1", 2020, &[CategoryColumn::Gravity, CategoryColumn::Particles]);
        assert_eq!(resolve_focus(&record), Some(ResearchFocus::Particles));
        assert_eq!(resolve_focus(&record).unwrap().label(), "Particles");
    }

    #[test]
    fn first_present_column_wins_for_every_rule() {
        for (idx, (column, focus)) in FOCUS_RULES.iter().enumerate() {
            let later: Vec<CategoryColumn> = FOCUS_RULES[idx..].iter().map(|(c, _)| *c).collect();
            let record = paper("b", 2000, &later);
            assert_eq!(resolve_focus(&record), Some(*focus), "column {column:?}");
        }
    }

    #[test]
    fn uncategorised_rows_are_dropped() {
        let papers = vec![
            paper("a", 2019, &[]),
            paper("b", 2019, &[CategoryColumn::Telescopes]),
            paper("c", 2020, &[]),
        ];
        let table = resolve_all(&papers);
        assert_eq!(table.dropped, 2);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].focus, ResearchFocus::Telescopes);
    }

    #[test]
    fn focus_order_follows_rules() {
        let order: Vec<_> = ResearchFocus::all().collect();
        let mut sorted = order.clone();
        sorted.sort();
        assert_eq!(order, sorted);
        assert_eq!(order.len(), CategoryColumn::COUNT);
    }
}
