//! samconfig document rendering and parsing.
//!
//! A document is a header section carrying the shared `atlantis` deploy
//! parameters followed by one section per stage, in [`stage_order`].

mod parse;
mod render;

pub use parse::parse;
pub use render::{render, to_document, RenderContext, Section};

use crate::context::ValidationContext;

/// Document format version written in the first line.
pub const FORMAT_VERSION: &str = "0.1";

/// Table holding the shared deploy parameters.
pub const ATLANTIS_SECTION: &str = "atlantis";

pub const PARAMETER_OVERRIDES: &str = "parameter_overrides";
pub const TAGS: &str = "tags";

/// First-character priority of stage ids; anything else sorts last.
const STAGE_PRIORITY: &[char] = &['d', 't', 'b', 's', 'p'];

fn stage_rank(stage_id: &str) -> usize {
    stage_id
        .chars()
        .next()
        .and_then(|c| STAGE_PRIORITY.iter().position(|p| *p == c))
        .unwrap_or(STAGE_PRIORITY.len())
}

/// Order stage ids dev-like, test-like, build-like, staging-like,
/// prod-like, then the rest. Ties are broken by id.
pub fn stage_order<'a, I>(stages: I) -> Vec<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut ordered: Vec<&str> = stages.into_iter().collect();
    ordered.sort_by(|a, b| stage_rank(a).cmp(&stage_rank(b)).then_with(|| a.cmp(b)));
    ordered
}

/// `samconfig-<prefix>[-<project>]-<infra>.toml`
pub fn file_name(ctx: &ValidationContext) -> String {
    format!("samconfig-{}-{}.toml", ctx.application_id(), ctx.infra_type)
}
