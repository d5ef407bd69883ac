/// Answers whether an external program can be launched.
pub trait ToolLocator: Send + Sync {
    fn is_available(&self, program: &str) -> bool;
}

/// Looks programs up on `PATH`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WhichLocator;

impl ToolLocator for WhichLocator {
    fn is_available(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}
