//! Model catalog.
//!
//! [`MODELS`] is the compiled-in list of ggml whisper models the
//! [`ModelCache`](crate::cache::ModelCache) knows how to fetch by id. Every
//! entry is served from the `ggerganov/whisper.cpp` Hugging Face repository.

use serde::Serialize;

// ---------------------------------------------------------------------------
// ModelLanguage
// ---------------------------------------------------------------------------

/// Which languages a model was trained on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelLanguage {
    /// English-only (`.en`) model.
    English,
    /// The 99-language multilingual model.
    Multilingual,
}

impl ModelLanguage {
    /// Short code used in the catalog and on the CLI (`"en"` / `"multi"`).
    pub fn code(&self) -> &'static str {
        match self {
            ModelLanguage::English => "en",
            ModelLanguage::Multilingual => "multi",
        }
    }
}

// ---------------------------------------------------------------------------
// ModelDescriptor
// ---------------------------------------------------------------------------

/// Static metadata for one downloadable model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelDescriptor {
    /// Catalog id, e.g. `"base.en"` or `"small-q5_1"`.
    pub id: &'static str,
    /// Human-readable name.
    pub name: &'static str,
    /// Approximate download size in megabytes.
    pub size_mb: u32,
    pub language: ModelLanguage,
    /// Whether the weights are quantised (`q5_0` / `q5_1`).
    pub quantized: bool,
    /// Download URL.
    pub url: &'static str,
}

macro_rules! hf_url {
    ($file:literal) => {
        concat!("https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-", $file, ".bin")
    };
}

macro_rules! model {
    ($id:literal, $name:literal, $size:literal, $lang:ident, $quant:literal) => {
        ModelDescriptor {
            id: $id,
            name: $name,
            size_mb: $size,
            language: ModelLanguage::$lang,
            quantized: $quant,
            url: hf_url!($id),
        }
    };
}

/// Every model the cache can fetch by id.
pub const MODELS: &[ModelDescriptor] = &[
    model!("tiny.en", "Tiny English", 75, English, false),
    model!("tiny", "Tiny Multilingual", 75, Multilingual, false),
    model!("base.en", "Base English", 142, English, false),
    model!("base", "Base Multilingual", 142, Multilingual, false),
    model!("small.en", "Small English", 466, English, false),
    model!("small", "Small Multilingual", 466, Multilingual, false),
    model!("tiny.en-q5_1", "Tiny English (Q5_1)", 31, English, true),
    model!("tiny-q5_1", "Tiny Multilingual (Q5_1)", 31, Multilingual, true),
    model!("base.en-q5_1", "Base English (Q5_1)", 57, English, true),
    model!("base-q5_1", "Base Multilingual (Q5_1)", 57, Multilingual, true),
    model!("small.en-q5_1", "Small English (Q5_1)", 182, English, true),
    model!("small-q5_1", "Small Multilingual (Q5_1)", 182, Multilingual, true),
    model!("medium.en-q5_0", "Medium English (Q5_0)", 515, English, true),
    model!("medium-q5_0", "Medium Multilingual (Q5_0)", 515, Multilingual, true),
    model!("large-q5_0", "Large Multilingual (Q5_0)", 1030, Multilingual, true),
];

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Find a [`ModelDescriptor`] by its catalog id.
pub fn find_model(id: &str) -> Option<&'static ModelDescriptor> {
    MODELS.iter().find(|m| m.id == id)
}

/// Models usable for `language` (an ISO-639-1 code or `"auto"`).
///
/// English-only models are offered for `"en"` alongside the multilingual ones;
/// every other language gets the multilingual models only.
pub fn models_for_language(language: &str) -> Vec<&'static ModelDescriptor> {
    MODELS
        .iter()
        .filter(|m| m.language == ModelLanguage::Multilingual || language == "en")
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
