pub mod client;
pub mod memory;
pub mod result;
pub mod splunk;

pub use client::{JobHandle, JobState, JobStatus, SearchBackend, SearchEndpoint, SearchError, SearchJobClient};
pub use memory::{MemoryBackend, MemorySearchClient};
pub use result::{extract_value, ResultRow};
pub use splunk::{SplunkBackend, SplunkClient};
