// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Tool handler implementations.

mod admin;
mod documents;
mod points;
mod query;

use std::sync::Arc;

pub use admin::{GetCollectionStatsTool, GetManifestTool, GetToolSchemaTool};
pub use documents::{AddDocumentTool, DeleteDocumentTool, GetDocumentTool, UpdateDocumentTool};
pub use points::{AddPointsTool, DeletePointsTool, GetPointsTool, QueryPointsTool, UpdatePointsTool};
pub use query::{AskTool, ExplainTool, SearchTool};

use crate::manifest::Manifest;

use super::registry::ToolHandler;

/// The complete default tool surface, in manifest order. The manifest tools
/// are built last so their tier-1 view covers every tool, themselves
/// included.
pub fn default_handlers() -> Vec<Arc<dyn ToolHandler>> {
    let mut handlers: Vec<Arc<dyn ToolHandler>> = vec![
        Arc::new(SearchTool),
        Arc::new(AskTool),
        Arc::new(ExplainTool),
        Arc::new(AddPointsTool),
        Arc::new(UpdatePointsTool),
        Arc::new(DeletePointsTool),
        Arc::new(GetPointsTool),
        Arc::new(QueryPointsTool),
        Arc::new(AddDocumentTool),
        Arc::new(UpdateDocumentTool),
        Arc::new(DeleteDocumentTool),
        Arc::new(GetDocumentTool),
        Arc::new(GetCollectionStatsTool),
    ];

    let mut specs: Vec<_> = handlers.iter().map(|handler| handler.spec()).collect();
    specs.push(GetManifestTool::self_spec());
    specs.push(GetToolSchemaTool::self_spec());

    let manifest = Arc::new(Manifest::new(specs));
    manifest.validate_briefs();

    handlers.push(Arc::new(GetManifestTool::new(manifest.clone())));
    handlers.push(Arc::new(GetToolSchemaTool::new(manifest)));
    handlers
}
