pub mod claude;
pub mod error;
pub mod gemini;
pub mod schema;
pub mod traits;
pub mod util;

pub use claude::Claude;
pub use error::{AiError, Result};
pub use gemini::Gemini;
pub use schema::ResponseSchema;
pub use traits::{Completion, JsonPrompt};
pub use util::{extract_json_array, strip_code_blocks, truncate_to_char_boundary};
