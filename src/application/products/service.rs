use std::sync::Arc;

use crate::application::report::ErrorSink;
use crate::application::repos::ProductsWriteRepo;
use crate::cache::Invalidator;

/// Mutation actions over the product catalog.
///
/// Each action validates, performs one logical write, and on success applies
/// the matching invalidation plan before returning.
#[derive(Clone)]
pub struct ProductActions {
    pub(crate) writer: Arc<dyn ProductsWriteRepo>,
    pub(crate) invalidator: Invalidator,
    pub(crate) sink: Arc<dyn ErrorSink>,
}

impl ProductActions {
    pub fn new(
        writer: Arc<dyn ProductsWriteRepo>,
        invalidator: Invalidator,
        sink: Arc<dyn ErrorSink>,
    ) -> Self {
        Self {
            writer,
            invalidator,
            sink,
        }
    }
}
