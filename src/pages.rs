//! Path → layout lookup table.
//!
//! Layouts are static: headings, pre-rendered images and chart placeholders that
//! the page script fills from `/api/charts/:chart_id`. Matching is plain string
//! equality; anything unmapped gets the not-found layout.

use serde::Serialize;
use std::collections::HashMap;

use crate::charts::ChartId;
use crate::theme::Theme;

pub const DEFAULT_PATH: &str = "/page-2";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Block {
    Heading(&'static str),
    Paragraph(&'static str),
    Divider,
    /// Dark-theme source; the light variant is derived from it.
    Image { id: &'static str, src: &'static str },
    Chart(ChartId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub path: &'static str,
    pub label: &'static str,
    pub title: &'static str,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayoutBlock {
    Heading { text: &'static str },
    Paragraph { text: &'static str },
    Divider,
    Image { id: &'static str, src: String },
    Chart { id: &'static str },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageLayout {
    pub path: &'static str,
    pub title: &'static str,
    pub found: bool,
    pub blocks: Vec<LayoutBlock>,
}

impl Page {
    pub fn layout(&self, theme: &Theme) -> PageLayout {
        let blocks = self
            .blocks
            .iter()
            .map(|block| match *block {
                Block::Heading(text) => LayoutBlock::Heading { text },
                Block::Paragraph(text) => LayoutBlock::Paragraph { text },
                Block::Divider => LayoutBlock::Divider,
                Block::Image { id, src } => LayoutBlock::Image {
                    id,
                    src: theme.image_src(src),
                },
                Block::Chart(chart) => LayoutBlock::Chart { id: chart.as_str() },
            })
            .collect();
        PageLayout {
            path: self.path,
            title: self.title,
            found: true,
            blocks,
        }
    }

    pub fn charts(&self) -> impl Iterator<Item = ChartId> + '_ {
        self.blocks.iter().filter_map(|block| match *block {
            Block::Chart(chart) => Some(chart),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageOption {
    pub label: &'static str,
    pub value: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    Page(&'a Page),
    NotFound,
}

impl Route<'_> {
    pub fn layout(&self, theme: &Theme) -> PageLayout {
        match self {
            Route::Page(page) => page.layout(theme),
            Route::NotFound => not_found_layout(),
        }
    }
}

pub fn not_found_layout() -> PageLayout {
    PageLayout {
        path: "",
        title: "page not found",
        found: false,
        blocks: vec![
            LayoutBlock::Heading {
                text: "404: nothing lives at this path",
            },
            LayoutBlock::Paragraph {
                text: "Pick a page from the plots & graphs menu.",
            },
        ],
    }
}

pub struct PageRouter {
    pages: Vec<Page>,
    index: HashMap<&'static str, usize>,
}

impl Default for PageRouter {
    fn default() -> Self {
        Self::new(default_pages())
    }
}

impl PageRouter {
    pub fn new(pages: Vec<Page>) -> Self {
        let index = pages
            .iter()
            .enumerate()
            .map(|(idx, page)| (page.path, idx))
            .collect();
        Self { pages, index }
    }

    /// `/` maps to the default page; everything else must match exactly.
    pub fn resolve(&self, path: &str) -> Route<'_> {
        let path = if path.is_empty() || path == "/" {
            DEFAULT_PATH
        } else {
            path
        };
        match self.index.get(path) {
            Some(idx) => Route::Page(&self.pages[*idx]),
            None => Route::NotFound,
        }
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn options(&self) -> Vec<PageOption> {
        self.pages
            .iter()
            .map(|page| PageOption {
                label: page.label,
                value: page.path,
            })
            .collect()
    }
}

fn image(id: &'static str, src: &'static str) -> Block {
    Block::Image { id, src }
}

pub fn default_pages() -> Vec<Page> {
    vec![
        Page {
            path: "/page-1",
            label: "static",
            title: "Static Plots: Dark Matter Models",
            blocks: vec![
                Block::Divider,
                Block::Heading("top 20 dark matter models (paper count)"),
                image("top20-dm-models-img", "/assets/top20_dm_models_grid.svg"),
                Block::Divider,
                Block::Heading("prevalence of dark matter models in papers over time"),
                image("pop-dm-models-img", "/assets/pop_dm_models.svg"),
                Block::Divider,
                Block::Heading("mass range coverage for dark matter models"),
                image("mass-dm-models-img", "/assets/mass_dm_models.svg"),
            ],
        },
        Page {
            path: "/page-2",
            label: "interactive",
            title: "Interactive Plots: Dark Matter Models",
            blocks: vec![
                Block::Chart(ChartId::ModelSunburst),
                Block::Divider,
                Block::Chart(ChartId::ModelTreemap),
                Block::Divider,
            ],
        },
        Page {
            path: "/papers-per-year",
            label: "papers per year",
            title: "Papers per Year",
            blocks: vec![
                Block::Chart(ChartId::PapersPerYear),
                Block::Divider,
                Block::Chart(ChartId::UniquePapersPerYear),
            ],
        },
        Page {
            path: "/citations",
            label: "citations",
            title: "Citations",
            blocks: vec![
                Block::Chart(ChartId::CitationsPerYear),
                Block::Divider,
                Block::Chart(ChartId::CitationSunburst),
            ],
        },
        Page {
            path: "/downloads",
            label: "downloads",
            title: "Downloads",
            blocks: vec![Block::Chart(ChartId::DownloadsPerYear)],
        },
        Page {
            path: "/citations-vs-downloads",
            label: "citations vs downloads",
            title: "Citations vs Downloads",
            blocks: vec![
                Block::Paragraph("Both axes are log10(x + 1) so uncited papers stay on the chart."),
                Block::Chart(ChartId::CitationScatter),
            ],
        },
        Page {
            path: "/research-focus",
            label: "research focus",
            title: "Research Focus",
            blocks: vec![
                Block::Paragraph(
                    "Each paper counts once, under the first of its categories in the order particles, gravity, detectors, theory, colliders, stellar objects, methods, inferences, telescopes, dark matter models.",
                ),
                Block::Chart(ChartId::FocusTotals),
                Block::Divider,
                Block::Chart(ChartId::FocusHeatmap),
            ],
        },
        Page {
            path: "/arxiv-classes",
            label: "arXiv classes",
            title: "arXiv Classification",
            blocks: vec![
                Block::Chart(ChartId::ArxivClasses),
                Block::Divider,
                Block::Chart(ChartId::ClassesPerYear),
            ],
        },
        Page {
            path: "/authors",
            label: "authors",
            title: "Author Statistics",
            blocks: vec![
                Block::Chart(ChartId::TopAuthors),
                Block::Divider,
                Block::Heading("first-author collaboration network"),
                image("author-network-img", "/assets/author_network.svg"),
            ],
        },
        Page {
            path: "/co-occurrence",
            label: "term co-occurrence",
            title: "Co-occurrence of Terms",
            blocks: vec![Block::Chart(ChartId::TermCoOccurrence)],
        },
        Page {
            path: "/term-network",
            label: "term network",
            title: "Term Network",
            blocks: vec![Block::Chart(ChartId::TermNetwork)],
        },
        Page {
            path: "/dm-model-trends",
            label: "model trends",
            title: "Dark Matter Model Trends",
            blocks: vec![
                Block::Heading("prevalence of dark matter models in papers over time"),
                image("pop-dm-models-img", "/assets/pop_dm_models.svg"),
                Block::Divider,
                Block::Heading("dark matter models per year"),
                image("dm-models-per-year-img", "/assets/dm_models_per_year.svg"),
            ],
        },
        Page {
            path: "/mass-ranges",
            label: "mass ranges",
            title: "Mass Range Coverage",
            blocks: vec![
                Block::Heading("mass range coverage for dark matter models"),
                image("mass-dm-models-img", "/assets/mass_dm_models.svg"),
            ],
        },
        Page {
            path: "/particles",
            label: "particles",
            title: "Particles",
            blocks: vec![
                Block::Heading("most mentioned particle candidates"),
                image("particles-wordcloud-img", "/assets/particles_wordcloud.svg"),
            ],
        },
        Page {
            path: "/detectors-telescopes",
            label: "detectors & telescopes",
            title: "Detectors and Telescopes",
            blocks: vec![
                Block::Heading("detectors"),
                image("detectors-wordcloud-img", "/assets/detectors_wordcloud.svg"),
                Block::Divider,
                Block::Heading("telescopes"),
                image("telescopes-wordcloud-img", "/assets/telescopes_wordcloud.svg"),
            ],
        },
        Page {
            path: "/methods-inferences",
            label: "methods & inferences",
            title: "Methods and Inferences",
            blocks: vec![
                Block::Heading("methods"),
                image("methods-wordcloud-img", "/assets/methods_wordcloud.svg"),
                Block::Divider,
                Block::Heading("inferences"),
                image("inferences-wordcloud-img", "/assets/inferences_wordcloud.svg"),
            ],
        },
        Page {
            path: "/about",
            label: "about",
            title: "About the Data",
            blocks: vec![
                Block::Paragraph(
                    "Bibliographic records of dark matter research: one row per paper with year, citations, downloads, first author, arXiv classification and topical categories.",
                ),
                Block::Paragraph(
                    "Aggregates are computed once when the server starts; restart it to pick up new data.",
                ),
            ],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::{DARK_THEME, LIGHT_THEME};
    use std::collections::HashSet;

    #[test]
    fn root_maps_to_default_page() {
        let router = PageRouter::default();
        match router.resolve("/") {
            Route::Page(page) => assert_eq!(page.path, DEFAULT_PATH),
            Route::NotFound => panic!("root should resolve"),
        }
    }

    #[test]
    fn unmapped_paths_fall_through() {
        let router = PageRouter::default();
        assert_eq!(router.resolve("/page-3"), Route::NotFound);
        assert_eq!(router.resolve("/page-1/"), Route::NotFound);
        let layout = router.resolve("/nope").layout(&DARK_THEME);
        assert!(!layout.found);
    }

    #[test]
    fn paths_are_unique_and_table_sized() {
        let pages = default_pages();
        let paths: HashSet<_> = pages.iter().map(|p| p.path).collect();
        assert_eq!(paths.len(), pages.len());
        assert!((15..=20).contains(&pages.len()));
    }

    #[test]
    fn every_chart_has_a_page() {
        let router = PageRouter::default();
        let placed: HashSet<ChartId> = router.pages().iter().flat_map(|p| p.charts()).collect();
        for id in ChartId::ALL {
            assert!(placed.contains(&id), "{id:?} is not placed on any page");
        }
    }

    #[test]
    fn images_follow_theme() {
        let router = PageRouter::default();
        let Route::Page(page) = router.resolve("/page-1") else {
            panic!("page-1 should resolve");
        };
        let dark = page.layout(&DARK_THEME);
        let light = page.layout(&LIGHT_THEME);
        let src = |layout: &PageLayout| {
            layout
                .blocks
                .iter()
                .find_map(|block| match block {
                    LayoutBlock::Image { src, .. } => Some(src.clone()),
                    _ => None,
                })
                .unwrap()
        };
        assert_eq!(src(&dark), "/assets/top20_dm_models_grid.svg");
        assert_eq!(src(&light), "/assets/top20_dm_models_grid_light.svg");
    }

    #[test]
    fn dropdown_lists_static_and_interactive_first() {
        let options = PageRouter::default().options();
        assert_eq!(options[0], PageOption { label: "static", value: "/page-1" });
        assert_eq!(options[1], PageOption { label: "interactive", value: "/page-2" });
    }
}
