pub type UiTask = Box<dyn FnOnce() + Send + 'static>;

/// The host's UI execution context.
///
/// Work produced on background tasks reaches the view only through
/// [`UiContext::post`]; hosts run posted tasks in order on their UI thread.
pub trait UiContext: Send + Sync + 'static {
    fn post(&self, task: UiTask);

    /// Shows a transient message. Callers off the UI thread go through `post`.
    fn toast(&self, message: &str);
}
