//! Built-in tool implementations for Helmsman.
//!
//! Tools give the agent the ability to act in the world: search the web,
//! look up images and videos, scrape pages, package downloadable
//! artifacts, and report ambient caller context.
//!
//! The search and scrape tools are stubs that return deterministic,
//! plausible results so the agent loop can be exercised end-to-end
//! without network access; swap them for real backends in production.

pub mod artifact_creator;
pub mod current_context;
pub mod image_search;
pub mod page_scrape;
pub mod video_search;
pub mod web_search;

use helmsman_core::tool::ToolRegistry;

pub use artifact_creator::ArtifactCreatorTool;
pub use current_context::CurrentContextTool;
pub use image_search::ImageSearchTool;
pub use page_scrape::PageScrapeTool;
pub use video_search::VideoSearchTool;
pub use web_search::WebSearchTool;

/// Create a default tool registry with all built-in tools.
pub fn default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for tool in [
        Box::new(WebSearchTool) as Box<dyn helmsman_core::Tool>,
        Box::new(ImageSearchTool),
        Box::new(VideoSearchTool),
        Box::new(PageScrapeTool),
        Box::new(ArtifactCreatorTool),
        Box::new(CurrentContextTool),
    ] {
        // Built-in names are unique by construction
        let name = tool.name().to_string();
        if let Err(e) = registry.register(tool) {
            tracing::warn!(tool = %name, error = %e, "Skipping built-in tool");
        }
    }
    registry
}
