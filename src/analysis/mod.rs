//! Transcript analysis hand-off
//!
//! The engine never calls analysis providers directly: it renders the
//! configured prompt and hands the full transcript to an external
//! collaborator behind `TranscriptAnalyzer`.

use anyhow::Result;
use async_trait::async_trait;

/// External analysis collaborator (LLM provider adapter, out of core).
#[async_trait]
pub trait TranscriptAnalyzer: Send + Sync {
    async fn analyze(&self, prompt: &str) -> Result<String>;
}

/// Substitute the transcript into a prompt template.
pub fn render_prompt(template: &str, transcript: &str) -> String {
    template.replace("{transcript}", transcript)
}

/// Default analysis prompt.
pub const DEFAULT_ANALYSIS_PROMPT: &str = "Analyze this sales conversation transcript. \
Provide specific insights based ONLY on what is actually said in the transcript. \
Do not fill in gaps, assume context, or make up information. If key information is \
missing from the transcript, explicitly state that it is missing.\n\nAnalyze for:\n\
1. Strengths shown in the actual conversation\n\
2. Areas for improvement based on what was said\n\
3. Specific action items\n\
4. Missing information that would be helpful for analysis\n\n\
Transcript:\n{transcript}";
