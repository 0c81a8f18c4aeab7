/// Device handle state machine.
///
/// State transitions:
/// ```text
/// idle --prepare--> streaming --idle timeout--> idle
/// ```
/// The stream opens lazily on the first data access and closes
/// automatically once nothing has touched the handle for a fixed number of
/// ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamState {
    #[default]
    Idle,
    Streaming,
}

impl StreamState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming)
    }
}
