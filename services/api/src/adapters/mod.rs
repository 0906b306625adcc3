pub mod analysis_llm;
pub mod db;
pub mod memory;

pub use analysis_llm::OpenAiAnalysisAdapter;
pub use db::DbAdapter;
pub use memory::MemoryStore;
