//! The `dermascan diseases` command: print knowledge base labels, one per line.

use anyhow::Context;
use dermascan_core::{Config, KnowledgeBase};

pub fn execute(config: &Config) -> anyhow::Result<()> {
    let knowledge = KnowledgeBase::load(config.knowledge_path().as_deref())
        .context("Failed to load knowledge base")?;
    for label in knowledge.labels() {
        println!("{label}");
    }
    Ok(())
}
