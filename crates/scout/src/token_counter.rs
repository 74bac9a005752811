use std::path::Path;
use tokenizers::tokenizer::Tokenizer;

const GPT_4O_TOKENIZER_KEY: &str = "Xenova/gpt-4o";
const GPT_4_TOKENIZER_KEY: &str = "Xenova/gpt-4";
const CLAUDE_TOKENIZER_KEY: &str = "Xenova/claude-tokenizer";
const QWEN_TOKENIZER_KEY: &str = "Qwen/Qwen2.5-Coder-32B-Instruct";

/// Something that can measure text in model tokens.
///
/// `None` means the measurement is unavailable, e.g. the tokenizer never loaded.
pub trait TokenMeter: Send + Sync {
    fn count_tokens(&self, text: &str) -> Option<usize>;
}

/// Counts tokens with the tokenizer matching one fixed model.
pub struct TokenCounter {
    model: String,
    tokenizer: Option<Tokenizer>,
}

impl TokenCounter {
    /// Load the tokenizer for `model_name` from the Hugging Face hub.
    ///
    /// This does blocking network I/O on first use of a model; run it off the async runtime.
    pub fn new(model_name: &str) -> Self {
        let key = Self::model_to_tokenizer_key(model_name);
        let tokenizer = Tokenizer::from_pretrained(key, None)
            .map_err(|e| {
                tracing::error!(model = model_name, tokenizer = key, error = %e, "Failed to load tokenizer");
            })
            .ok();
        Self {
            model: model_name.to_string(),
            tokenizer,
        }
    }

    /// Load a `tokenizer.json` from disk
    pub fn from_file(model_name: &str, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let tokenizer = Tokenizer::from_file(path)
            .map_err(|e| {
                tracing::error!(model = model_name, path = %path.display(), error = %e, "Failed to load tokenizer");
            })
            .ok();
        Self {
            model: model_name.to_string(),
            tokenizer,
        }
    }

    /// Build from the bytes of a serialized `tokenizer.json`
    pub fn from_bytes(model_name: &str, bytes: impl AsRef<[u8]>) -> Self {
        let tokenizer = Tokenizer::from_bytes(bytes)
            .map_err(|e| {
                tracing::error!(model = model_name, error = %e, "Failed to load tokenizer");
            })
            .ok();
        Self {
            model: model_name.to_string(),
            tokenizer,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn is_loaded(&self) -> bool {
        self.tokenizer.is_some()
    }

    fn model_to_tokenizer_key(model_name: &str) -> &'static str {
        let model_name = model_name.to_lowercase();
        if model_name.contains("claude") {
            CLAUDE_TOKENIZER_KEY
        } else if model_name.contains("qwen") {
            QWEN_TOKENIZER_KEY
        } else if model_name.starts_with("gpt-4-") || model_name == "gpt-4" || model_name.starts_with("gpt-3.5") {
            GPT_4_TOKENIZER_KEY
        } else {
            // gpt-4o family and anything unknown
            GPT_4O_TOKENIZER_KEY
        }
    }
}

impl TokenMeter for TokenCounter {
    fn count_tokens(&self, text: &str) -> Option<usize> {
        let tokenizer = self.tokenizer.as_ref()?;
        match tokenizer.encode(text, false) {
            Ok(encoding) => Some(encoding.len()),
            Err(e) => {
                tracing::error!(model = %self.model, error = %e, "Failed to encode text");
                None
            }
        }
    }
}
