use anyhow::{Context, Result};
use clap::Args;
use element_locator::Criteria;

/// Criteria flags shared by the search commands
#[derive(Args, Clone, Debug, Default)]
pub struct CriteriaArgs {
    /// Criteria as `key=value` pairs, e.g. `title="Save As",control_type=Window`
    #[arg(long = "where", value_name = "PAIRS")]
    pub pairs: Option<String>,

    /// Exact element name
    #[arg(long)]
    pub title: Option<String>,

    /// Regex that must match the whole element name
    #[arg(long)]
    pub title_re: Option<String>,

    #[arg(long)]
    pub class_name: Option<String>,

    #[arg(long)]
    pub class_name_re: Option<String>,

    #[arg(long)]
    pub control_type: Option<String>,

    #[arg(long)]
    pub control_id: Option<i64>,

    #[arg(long)]
    pub auto_id: Option<String>,

    /// Owning process id
    #[arg(long)]
    pub process: Option<u32>,

    /// Native reference of the element
    #[arg(long)]
    pub handle: Option<String>,

    /// Free-text name resolved with the fuzzy matcher
    #[arg(long)]
    pub best_match: Option<String>,

    /// Pick the nth match
    #[arg(long)]
    pub found_index: Option<usize>,

    /// Walk depth below the search root
    #[arg(long)]
    pub depth: Option<usize>,

    /// Search every level, not only the immediate children of the root
    #[arg(long, conflicts_with = "top_level")]
    pub deep: bool,

    /// Search immediate children of the root only
    #[arg(long)]
    pub top_level: bool,

    /// Include hidden elements
    #[arg(long)]
    pub include_hidden: bool,

    /// Only enabled elements
    #[arg(long)]
    pub enabled_only: bool,
}

impl CriteriaArgs {
    /// `--where` pairs first, then individual flags on top
    pub fn to_criteria(&self) -> Result<Criteria> {
        let mut criteria = match &self.pairs {
            Some(pairs) => pairs
                .parse::<Criteria>()
                .with_context(|| format!("Invalid --where '{pairs}'"))?,
            None => Criteria::new(),
        };

        if let Some(title) = &self.title {
            criteria = criteria.title(title);
        }
        if let Some(pattern) = &self.title_re {
            criteria = criteria.title_re(pattern);
        }
        if let Some(class_name) = &self.class_name {
            criteria = criteria.class_name(class_name);
        }
        if let Some(pattern) = &self.class_name_re {
            criteria = criteria.class_name_re(pattern);
        }
        if let Some(control_type) = &self.control_type {
            criteria = criteria.control_type(control_type);
        }
        if let Some(control_id) = self.control_id {
            criteria = criteria.control_id(control_id);
        }
        if let Some(auto_id) = &self.auto_id {
            criteria = criteria.auto_id(auto_id);
        }
        if let Some(process) = self.process {
            criteria = criteria.process(process);
        }
        if let Some(handle) = &self.handle {
            criteria = criteria.handle(handle.as_str());
        }
        if let Some(query) = &self.best_match {
            criteria = criteria.best_match(query);
        }
        if let Some(index) = self.found_index {
            criteria = criteria.found_index(index);
        }
        if let Some(depth) = self.depth {
            criteria = criteria.depth(depth);
        }
        if self.deep {
            criteria = criteria.top_level_only(false);
        }
        if self.top_level {
            criteria = criteria.top_level_only(true);
        }
        if self.include_hidden {
            criteria = criteria.visible_only(false);
        }
        if self.enabled_only {
            criteria = criteria.enabled_only(true);
        }
        Ok(criteria)
    }
}

/// Parse repeated `--level` values into a chain
pub fn parse_levels(levels: &[String]) -> Result<Vec<Criteria>> {
    levels
        .iter()
        .map(|level| {
            level
                .parse::<Criteria>()
                .with_context(|| format!("Invalid --level '{level}'"))
        })
        .collect()
}
