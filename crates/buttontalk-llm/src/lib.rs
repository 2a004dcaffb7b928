//! Language-model providers for buttontalk.
//!
//! Every backend implements [`buttontalk_core::LanguageModel`] and is chosen
//! once, in [`build_provider`], from a [`ProviderConfig`]. The session never
//! branches on which provider it talks to.
//!
//! | Provider | Wire format |
//! |----------|-------------|
//! | OpenAI, Groq | `POST /chat/completions`, Server-Sent Events |
//! | Ollama | `POST /api/chat`, newline-delimited JSON |
//! | Scripted | none; deterministic offline token stream |

#![deny(unused_crate_dependencies)]

mod config;
mod lines;
mod ollama;
mod openai;
mod scripted;
mod wire;

pub use config::{ProviderConfig, build_provider};
pub use ollama::{OLLAMA_DEFAULT_URL, Ollama, parse_ndjson_line};
pub use openai::{GROQ_DEFAULT_URL, OPENAI_DEFAULT_URL, OpenAiCompatible, parse_sse_line};
pub use scripted::{SCRIPTED_REPLY, ScriptedModel};
pub use wire::StreamLine;
