use std::sync::Arc;

use crate::types::TypeDescriptor;

/// Field names and declared types of one result set.
///
/// Established once from the format's header and immutable for the lifetime
/// of the read. Names are preserved in server order and NOT deduplicated:
/// the server may legally emit duplicate column names.
#[derive(Debug, Clone)]
pub struct ResultMetadata {
    names: Vec<String>,
    types: Vec<Arc<TypeDescriptor>>,
}

impl ResultMetadata {
    pub(crate) fn new(names: Vec<String>, types: Vec<Arc<TypeDescriptor>>) -> Self {
        debug_assert_eq!(names.len(), types.len());
        Self { names, types }
    }

    pub fn field_count(&self) -> usize {
        self.names.len()
    }

    pub fn field_names(&self) -> &[String] {
        &self.names
    }

    pub fn field_type(&self, index: usize) -> Option<&Arc<TypeDescriptor>> {
        self.types.get(index)
    }

    pub fn field_types(&self) -> &[Arc<TypeDescriptor>] {
        &self.types
    }
}
