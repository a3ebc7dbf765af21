//! Prompt templates for the council flow

use crate::orchestration::policy::Synthesis;

/// Templates for generating prompts at each phase
pub struct PromptTemplate;

impl PromptTemplate {
    /// Instruction text used when the session configures none
    pub fn default_instructions() -> &'static str {
        r#"You are one member of a council of independent experts.
Answer precisely and state only what you can support. When you are unsure, say so.
Other members will read and critique your answers, and you will critique theirs."#
    }

    /// System preamble sent with every call
    pub fn system_preamble(instructions: &str) -> String {
        let instructions = instructions.trim();
        if instructions.is_empty() {
            Self::default_instructions().to_string()
        } else {
            instructions.to_string()
        }
    }

    /// Broadcast prompt: the user's question as written
    pub fn broadcast(question: &str) -> String {
        question.to_string()
    }

    /// Marker shown in place of a peer that produced nothing this round
    pub fn no_response_marker(agent: &str) -> String {
        format!("[no response from {}]", agent)
    }

    /// Critique request built from the other agents' broadcast answers.
    ///
    /// `peers` never contains the recipient's own answer; `missing` lists
    /// peers that were excluded from the round.
    pub fn vulnerability(question: &str, peers: &[(&str, &str)], missing: &[&str]) -> String {
        let mut prompt = format!(
            "Other agents answered the same question you did.\n\nQuestion: {}\n",
            question
        );

        for (agent, answer) in peers {
            prompt.push_str(&format!("\n--- Agent {} ---\n{}\n", agent, answer));
        }
        for agent in missing {
            prompt.push_str(&format!("\n{}\n", Self::no_response_marker(agent)));
        }

        if peers.is_empty() {
            prompt.push_str(
                "\nNo other agent produced an answer this round. Re-examine the question \
                 itself and list the claims an answer is most likely to get wrong.",
            );
        } else {
            prompt.push_str(
                r#"
Find the flaws in these answers. For each one, list:
1. Statements that are false or unsupported
2. Missing caveats or important omissions
3. Reasoning errors

Be specific and quote the text you object to."#,
            );
        }
        prompt
    }

    /// Synthesis request sent to each harmonizer
    pub fn judgment(question: &str, critiques: &[(&str, &str)], missing: &[&str]) -> String {
        let mut prompt = format!(
            r#"The following statements are the flaws other agents found in each other's answers to this question:

{}

Organize their critiques by topic in an additive manner (that is, do not eliminate information).
Structure your response using the following sections: 'Agreement', 'Disagreement', and 'Unique observations'.
In 'Agreement', list ideas supported by multiple agents. In 'Disagreement', note contradictory statements.
In 'Unique observations', highlight observations made by only one agent.
The agents under review need detailed responses to be able to improve. Use detailed bullet points.
"#,
            question
        );

        for (agent, critique) in critiques {
            prompt.push_str(&format!("\n--- Agent {} ---\n{}\n", agent, critique));
        }
        for agent in missing {
            prompt.push_str(&format!("\n{}\n", Self::no_response_marker(agent)));
        }
        prompt
    }

    /// Revision request carrying the selected synthesis or syntheses
    pub fn reflection(syntheses: &[Synthesis]) -> String {
        let mut prompt = String::from(
            "Judgment of your response has resulted in the observations that follow. \
             Regenerate your version of the text under review taking into account the \
             consensus of these observations. If you object to an observation, explain why.\n",
        );

        if let [only] = syntheses {
            prompt.push_str(&format!("\n{}\n", only.content.trim()));
            return prompt;
        }

        for synthesis in syntheses {
            prompt.push_str(&format!(
                "\n--- Judgment by {} ---\n{}\n",
                synthesis.harmonizer,
                synthesis.content.trim()
            ));
        }
        prompt
    }
}
