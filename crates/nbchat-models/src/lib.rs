// Models module - wire formats of the local and remote provider APIs
pub mod requests;
pub mod responses;


// Re-export commonly used types
pub use requests::{
    ChatMessage, ChatRequest, GenerateOptions, GenerateRequest, DEFAULT_TEMPERATURE,
    LOCAL_CONTEXT_WINDOW, REMOTE_MAX_TOKENS,
};
pub use responses::{
    error_detail, parse_body, ChatResponse, Choice, ChoiceMessage, GenerateResponse, ModelEntry,
    ModelsResponse, ShapeError, TagEntry, TagsResponse, Usage,
};
