/// Execution classes used for worker scheduling and observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskClass {
	/// Request dispatch: one unit of work per accepted request envelope.
	Dispatch,
	/// Socket pumps, accept loops and relays.
	Io,
	/// Synchronous handler bodies executed on the blocking pool.
	Blocking,
}

impl TaskClass {
	pub(crate) const fn as_str(self) -> &'static str {
		match self {
			Self::Dispatch => "dispatch",
			Self::Io => "io",
			Self::Blocking => "blocking",
		}
	}
}
