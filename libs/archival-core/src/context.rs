//! Per-operation mutable state: the current path and accumulated validation
//! errors (spec §3, §4.3).

use crate::error::{ArchiveError, ValidationError, ValidationException};
use crate::options::SerializationOptions;

#[derive(Debug, Clone)]
enum PathSegment {
    Name(String),
    Index(usize),
}

/// Threaded through every scope for one load or save operation.
///
/// Invariant: the path always reflects the currently open scope — scopes
/// push a segment on entry and pop it on exit, so any error raised mid-walk
/// carries a fully-qualified location.
pub struct SerializationContext<'a> {
    options: &'a SerializationOptions,
    path: Vec<PathSegment>,
    errors: Vec<ValidationError>,
}

impl<'a> SerializationContext<'a> {
    pub fn new(options: &'a SerializationOptions) -> Self {
        Self { options, path: Vec::new(), errors: Vec::new() }
    }

    pub fn options(&self) -> &SerializationOptions {
        self.options
    }

    pub fn push_name(&mut self, name: impl Into<String>) {
        self.path.push(PathSegment::Name(name.into()));
    }

    pub fn push_index(&mut self, index: usize) {
        self.path.push(PathSegment::Index(index));
    }

    pub fn pop(&mut self) {
        self.path.pop();
    }

    /// Slash-separated path to the currently visited location, e.g.
    /// `/user/addresses/2/city`.
    pub fn current_path(&self) -> String {
        let mut rendered = String::new();
        for segment in &self.path {
            rendered.push('/');
            match segment {
                PathSegment::Name(name) => rendered.push_str(name),
                PathSegment::Index(index) => rendered.push_str(&index.to_string()),
            }
        }
        if rendered.is_empty() {
            rendered.push('/');
        }
        rendered
    }

    /// Record a validation failure at the current path.
    ///
    /// Returns `Err` immediately once `validation_max_errors` is reached
    /// (non-zero cap); the caller should propagate that as an abort.
    pub fn add_validation_error(&mut self, message: impl Into<String>) -> Result<(), ArchiveError> {
        let path = self.current_path();
        let message = message.into();
        if let Some(entry) = self.errors.iter_mut().find(|e| e.path == path) {
            entry.messages.push(message);
        } else {
            self.errors.push(ValidationError { path, messages: vec![message] });
        }

        if self.is_cap_reached() {
            tracing::debug!(errors = self.errors.len(), "validation error cap reached, aborting");
            return Err(ArchiveError::Validation(ValidationException { errors: std::mem::take(&mut self.errors) }));
        }
        Ok(())
    }

    pub fn is_cap_reached(&self) -> bool {
        self.options.validation_max_errors != 0
            && self.errors.len() as u32 >= self.options.validation_max_errors
    }

    /// Called once by the top-level entry points after the user's `Serialize`
    /// returns: turns any accumulated validation errors into the single
    /// exception the operation reports.
    pub fn finalize(self) -> Result<(), ArchiveError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ArchiveError::Validation(ValidationException { errors: self.errors }))
        }
    }
}

/// RAII guard that pushes a name segment on construction and pops it on
/// drop, so a scope entry/exit can't forget to restore the path on an early
/// return.
pub struct NameGuard<'a, 'ctx> {
    ctx: &'a mut SerializationContext<'ctx>,
}

impl<'a, 'ctx> NameGuard<'a, 'ctx> {
    pub fn new(ctx: &'a mut SerializationContext<'ctx>, name: impl Into<String>) -> Self {
        ctx.push_name(name);
        Self { ctx }
    }

    pub fn ctx(&mut self) -> &mut SerializationContext<'ctx> {
        self.ctx
    }
}

impl Drop for NameGuard<'_, '_> {
    fn drop(&mut self) {
        self.ctx.pop();
    }
}

/// Same as [`NameGuard`] but for an array index segment.
pub struct IndexGuard<'a, 'ctx> {
    ctx: &'a mut SerializationContext<'ctx>,
}

impl<'a, 'ctx> IndexGuard<'a, 'ctx> {
    pub fn new(ctx: &'a mut SerializationContext<'ctx>, index: usize) -> Self {
        ctx.push_index(index);
        Self { ctx }
    }

    pub fn ctx(&mut self) -> &mut SerializationContext<'ctx> {
        self.ctx
    }
}

impl Drop for IndexGuard<'_, '_> {
    fn drop(&mut self) {
        self.ctx.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_renders_nested_segments() {
        let options = SerializationOptions::default();
        let mut ctx = SerializationContext::new(&options);
        ctx.push_name("a");
        ctx.push_name("b");
        ctx.push_index(2);
        ctx.push_name("c");
        assert_eq!(ctx.current_path(), "/a/b/2/c");
    }

    #[test]
    fn root_path_is_single_slash() {
        let options = SerializationOptions::default();
        let ctx = SerializationContext::new(&options);
        assert_eq!(ctx.current_path(), "/");
    }

    #[test]
    fn cap_reached_aborts_with_full_list() {
        let options = SerializationOptions::builder().validation_max_errors(2).build();
        let mut ctx = SerializationContext::new(&options);
        ctx.push_name("a");
        assert!(ctx.add_validation_error("first").is_ok());
        ctx.pop();
        ctx.push_name("b");
        let result = ctx.add_validation_error("second");
        assert!(result.is_err());
        if let Err(ArchiveError::Validation(exc)) = result {
            assert_eq!(exc.errors.len(), 2);
        } else {
            panic!("expected ValidationException");
        }
    }
}
