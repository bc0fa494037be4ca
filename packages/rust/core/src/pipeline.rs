//! Pipeline definition: the fixed, linear chain of steps a run executes.

use std::sync::Arc;

use brainstorm_shared::{BrainstormError, Persona, Result};

use crate::roles::RoleRegistry;

/// One ordered stage of the pipeline, bound to exactly one persona.
#[derive(Debug, Clone)]
pub struct Step {
    /// 1-based position; defines execution order.
    pub position: usize,
    pub persona: Arc<Persona>,
    /// Instruction body. `{topic}`, `{context}` and `{persona}` are substituted
    /// by the prompt builder.
    pub instruction_template: String,
    /// Human-readable description of the desired answer shape.
    pub expected_output_hint: String,
}

/// Immutable ordered sequence of steps.
#[derive(Debug, Clone)]
pub struct Pipeline {
    steps: Vec<Step>,
}

impl Pipeline {
    /// Build a pipeline, checking positions run `1..=n` with no gaps or repeats.
    pub fn new(steps: Vec<Step>) -> Result<Self> {
        if steps.is_empty() {
            return Err(BrainstormError::invalid_input("pipeline needs at least one step"));
        }
        for (i, step) in steps.iter().enumerate() {
            if step.position != i + 1 {
                return Err(BrainstormError::invalid_input(format!(
                    "step {} is at index {i}; positions must be 1..={} in order",
                    step.position,
                    steps.len()
                )));
            }
        }
        Ok(Self { steps })
    }

    /// Pair each persona of the registry with an instruction, in registry order.
    pub fn from_registry(
        registry: &RoleRegistry,
        instructions: &[(&str, &str)],
    ) -> Result<Self> {
        if registry.len() != instructions.len() {
            return Err(BrainstormError::invalid_input(format!(
                "{} personas but {} instructions",
                registry.len(),
                instructions.len()
            )));
        }
        let steps = registry
            .roles()
            .iter()
            .zip(instructions)
            .enumerate()
            .map(|(i, (persona, (template, hint)))| Step {
                position: i + 1,
                persona: Arc::clone(persona),
                instruction_template: (*template).into(),
                expected_output_hint: (*hint).into(),
            })
            .collect();
        Self::new(steps)
    }

    /// The five-step brainstorm: ideas, feasibility, UX, technical, synthesis.
    pub fn brainstorm(registry: &RoleRegistry) -> Result<Self> {
        Self::from_registry(registry, &BRAINSTORM_INSTRUCTIONS)
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Persona names in step order.
    pub fn persona_names(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.persona.name.clone()).collect()
    }
}

/// Instruction template and expected-output hint for each built-in step.
const BRAINSTORM_INSTRUCTIONS: [(&str, &str); 5] = [
    (
        "Your task as the {persona}:
1. Propose 5-7 innovative ideas on the given topic
2. Give a brief but inspiring description of each idea
3. Don't limit yourself to obvious solutions - think boldly
4. Borrow analogies from other fields where they help
5. Focus on potential and possibilities, not limitations

Response format: a numbered list of ideas with a description of each.",
        "List of 5-7 creative ideas with detailed descriptions",
    ),
    (
        "Analyze the ideas proposed by the Creative Idea Generator.

Your task as the {persona}:
1. Rate each idea on feasibility (1-10)
2. List the main resources required (time, money, people)
3. Identify the main risks and obstacles
4. Propose concrete implementation steps for the top 3 ideas
5. Give a realistic implementation timeline

Be constructively critical, but don't kill ideas outright.",
        "Detailed feasibility analysis of each idea with ratings and an action plan",
    ),
    (
        "Evaluate the proposed ideas from the user experience perspective.

Your task as the {persona}:
1. Define the target audience for each idea
2. Evaluate usability and accessibility
3. Predict the emotional response of users
4. Identify potential problems in the user experience
5. Propose improvements that make each idea more user-friendly
6. Rank the ideas by attractiveness to users

Think as an end user, not as a developer.",
        "UX analysis of each idea focusing on user experience and usability",
    ),
    (
        "Conduct a technical review of the proposed ideas.

Your task as the {persona}:
1. Rate the technical complexity of each idea (1-10)
2. Determine the required technologies and tools
3. Identify technical risks and limitations
4. Propose alternative technical approaches
5. Evaluate scalability and performance
6. Recommend a solution architecture

Be expert, but explain complex concepts in simple terms.",
        "Technical assessment of each idea with complexity analysis and recommendations",
    ),
    (
        "Create the final report based on all previous analyses.

Your task as the {persona}:
1. BRIEF SUMMARY: the essence of all proposed ideas (2-3 paragraphs)

2. TOP-3 IDEAS with justification:
   - Idea name
   - Why it made the top 3
   - Key advantages
   - Main challenges

3. COMPREHENSIVE BRAINSTORM ASSESSMENT:
   - Creativity (1-10 + justification)
   - Practicality (1-10 + justification)
   - User value (1-10 + justification)
   - Technical feasibility (1-10 + justification)
   - OVERALL RATING (1-10)

4. STRATEGIC RECOMMENDATIONS:
   - Which idea to implement first
   - Step-by-step action plan
   - Key success metrics
   - Potential partners and resources

5. NEXT STEPS: concrete actions for the next 30/90 days

Be objective but inspiring. Focus on actionable recommendations.",
        "Comprehensive final report with ratings, top ideas and strategic recommendations",
    ),
];
