use super::{AssistantError, ChatMessage, TextGenerator};
use crate::domain::SimulationResults;
use std::sync::Arc;
use tracing::{error, warn};

pub const CHAT_GREETING: &str = "Hello! I'm your Quantum Assistant. I can help explain computational chemistry concepts or guide you through simulations.";

pub const SYSTEM_INSTRUCTION: &str = "You are QuantaLab's virtual lab assistant, an expert in computational chemistry and quantum mechanics.
Your goal is to help students and researchers understand complex topics like:
- Density Functional Theory (DFT) vs Hartree-Fock
- Basis sets (STO-3G, 6-31G*, etc.)
- Molecular orbitals (HOMO/LUMO)
- Geometry optimization

Keep your answers helpful, concise, and scientifically accurate. If asked about the app features, explain that QuantaLab submits Psi4 simulations to a backend and can fall back to a local demo mode.";

const ANALYSIS_MISSING_KEY: &str =
    "Gemini API Key not found. Please set a valid API key to generate reports.";
const ANALYSIS_EMPTY: &str = "No analysis generated.";
const ANALYSIS_FAILED: &str = "Failed to generate analysis using AI.";

const CHAT_MISSING_KEY: &str = "API Key not configured. Please check your environment variables.";
const CHAT_APOLOGY: &str =
    "I'm having trouble connecting to the quantum realm right now. Please try again.";

fn analysis_prompt(results: &SimulationResults, molecule_name: &str) -> String {
    let dipole = results
        .dipole_moment
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "You are a computational chemistry expert.
Analyze the following simulation results for the molecule \"{}\".

Results:
- Total Energy: {} Hartrees
- Dipole Moment: {} Debye
- HOMO Energy: {} Hartree
- LUMO Energy: {} Hartree
- HOMO-LUMO Gap: {} Hartree

Please explain:
1. The stability of the molecule based on the energy and gap.
2. The polarity based on the dipole moment.
3. Potential reactivity (nucleophilic/electrophilic) based on orbitals.
Keep the explanation concise and suitable for an undergraduate chemistry student.",
        molecule_name,
        results.energy,
        dipole,
        results.homo_energy,
        results.lumo_energy,
        results.gap
    )
}

/// Produces a plain-language interpretation of a finished calculation.
/// Failures come back as user-facing text, never as errors.
pub struct ResultsAnalyst {
    generator: Arc<dyn TextGenerator>,
}

impl ResultsAnalyst {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    pub async fn analyze(&self, results: &SimulationResults, molecule_name: &str) -> String {
        let prompt = analysis_prompt(results, molecule_name);
        match self.generator.generate(&prompt).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) | Err(AssistantError::EmptyResponse) => ANALYSIS_EMPTY.to_string(),
            Err(AssistantError::MissingApiKey) => ANALYSIS_MISSING_KEY.to_string(),
            Err(err) => {
                error!("Gemini analysis failed: {}", err);
                ANALYSIS_FAILED.to_string()
            }
        }
    }
}

/// A linear conversation with the lab assistant, seeded with a greeting.
pub struct ChatSession {
    generator: Arc<dyn TextGenerator>,
    messages: Vec<ChatMessage>,
}

impl ChatSession {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            messages: vec![ChatMessage::model(CHAT_GREETING)],
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Sends `text` and returns the assistant's reply. Blank input is ignored
    /// and returns `None`.
    pub async fn send(&mut self, text: &str) -> Option<&ChatMessage> {
        if text.trim().is_empty() {
            return None;
        }
        let reply = match self
            .generator
            .chat(SYSTEM_INSTRUCTION, &self.messages, text)
            .await
        {
            Ok(reply) if !reply.trim().is_empty() => reply,
            Ok(_) | Err(AssistantError::EmptyResponse) => {
                "I couldn't generate a response.".to_string()
            }
            Err(AssistantError::MissingApiKey) => CHAT_MISSING_KEY.to_string(),
            Err(err) => {
                warn!("Chat error: {}", err);
                CHAT_APOLOGY.to_string()
            }
        };
        self.messages.push(ChatMessage::user(text));
        self.messages.push(ChatMessage::model(reply));
        self.messages.last()
    }

    pub fn reset(&mut self) {
        self.messages = vec![ChatMessage::model(CHAT_GREETING)];
    }
}
