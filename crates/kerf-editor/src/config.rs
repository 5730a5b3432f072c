use std::fmt;
use std::sync::Arc;

use kerf_parse::ParserOptions;
use kerf_syntax::{NoDescriptors, TagDescriptorProvider};

/// Everything a [`DocumentParser`](crate::DocumentParser) needs besides the text.
#[derive(Clone)]
pub struct EditorConfig {
    pub options: ParserOptions,
    /// Consulted by the tag rewrite after every full parse.
    pub descriptors: Arc<dyn TagDescriptorProvider>,
    /// Reported in diagnostic locations.
    pub file_name: Option<Arc<str>>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            options: ParserOptions::default(),
            descriptors: Arc::new(NoDescriptors),
            file_name: None,
        }
    }
}

impl EditorConfig {
    pub fn with_options(mut self, options: ParserOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_descriptors(mut self, descriptors: Arc<dyn TagDescriptorProvider>) -> Self {
        self.descriptors = descriptors;
        self
    }

    pub fn with_file_name(mut self, file_name: impl Into<Arc<str>>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }
}

impl fmt::Debug for EditorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditorConfig")
            .field("options", &self.options)
            .field("file_name", &self.file_name)
            .finish_non_exhaustive()
    }
}
