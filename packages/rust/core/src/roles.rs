//! Role registry: the fixed team of personas taking part in a brainstorm.

use std::collections::HashSet;
use std::sync::Arc;

use brainstorm_shared::{BrainstormError, Persona, PersonaConstraints, Result};

/// Key, name, goal, backstory for each built-in role, in pipeline order.
const BUILTIN_ROLES: [(&str, &str, &str, &str); 5] = [
    (
        "creative",
        "Creative Idea Generator",
        "Generate innovative and unconventional ideas to solve given tasks",
        "You are a creative thinker with a rich imagination and a knack for unconventional \
         solutions. You draw inspiration from art, nature, and interdisciplinary approaches, \
         and your strength is proposing ideas nobody else would think of.",
    ),
    (
        "analyst",
        "Practical Analyst",
        "Analyze proposed ideas for feasibility and effectiveness",
        "You are an experienced business analyst with sharp critical thinking. You quickly \
         spot potential problems and estimate resource and time costs, turning creative \
         ideas into workable plans.",
    ),
    (
        "ux_expert",
        "UX/User Experience Expert",
        "Evaluate ideas from the user experience and usability perspective",
        "You are a user experience expert with a deep understanding of human psychology and \
         behavior. You keep the user at the center and can predict how people will interact \
         with a solution.",
    ),
    (
        "tech_expert",
        "Technical Expert",
        "Evaluate technical feasibility of ideas and propose technological solutions",
        "You are a senior engineer with years of experience building and operating complex \
         systems. You know what modern technology can and cannot do, and you make sure \
         proposals are technically sound and scalable.",
    ),
    (
        "evaluator",
        "Strategic Evaluator",
        "Conduct a final analysis of all ideas and provide a comprehensive assessment",
        "You are a strategic consultant who synthesizes different perspectives into an \
         objective assessment. You see the big picture, anticipate long-term consequences, \
         and finish with practical recommendations.",
    ),
];

/// Ordered, immutable set of personas for one run.
#[derive(Debug, Clone)]
pub struct RoleRegistry {
    personas: Vec<Arc<Persona>>,
}

impl RoleRegistry {
    /// The five built-in roles, all sharing the given constraints.
    pub fn builtin(constraints: PersonaConstraints) -> Self {
        let personas = BUILTIN_ROLES
            .iter()
            .map(|(key, name, goal, backstory)| {
                Arc::new(Persona {
                    key: (*key).into(),
                    name: (*name).into(),
                    goal: (*goal).into(),
                    backstory: (*backstory).into(),
                    constraints,
                })
            })
            .collect();
        Self { personas }
    }

    /// A custom registry. Keys and names must be unique.
    pub fn from_personas(personas: Vec<Persona>) -> Result<Self> {
        if personas.is_empty() {
            return Err(BrainstormError::invalid_input("role registry needs at least one persona"));
        }

        let mut keys = HashSet::new();
        let mut names = HashSet::new();
        for persona in &personas {
            if !keys.insert(persona.key.as_str()) {
                return Err(BrainstormError::invalid_input(format!(
                    "duplicate persona key: {}",
                    persona.key
                )));
            }
            if !names.insert(persona.name.as_str()) {
                return Err(BrainstormError::invalid_input(format!(
                    "duplicate persona name: {}",
                    persona.name
                )));
            }
        }

        Ok(Self {
            personas: personas.into_iter().map(Arc::new).collect(),
        })
    }

    /// All personas in pipeline order.
    pub fn roles(&self) -> &[Arc<Persona>] {
        &self.personas
    }

    /// Look up a persona by key.
    pub fn get(&self, key: &str) -> Option<&Arc<Persona>> {
        self.personas.iter().find(|p| p.key == key)
    }

    pub fn len(&self) -> usize {
        self.personas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constraints() -> PersonaConstraints {
        PersonaConstraints {
            max_iterations: 3,
            max_rpm: 20,
        }
    }

    #[test]
    fn builtin_roles_in_fixed_order() {
        let registry = RoleRegistry::builtin(constraints());
        let names: Vec<&str> = registry.roles().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "Creative Idea Generator",
                "Practical Analyst",
                "UX/User Experience Expert",
                "Technical Expert",
                "Strategic Evaluator",
            ]
        );
    }

    #[test]
    fn repeated_calls_return_same_order() {
        let registry = RoleRegistry::builtin(constraints());
        let first: Vec<_> = registry.roles().iter().map(|p| p.key.clone()).collect();
        let second: Vec<_> = registry.roles().iter().map(|p| p.key.clone()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn constraints_applied_to_every_role() {
        let registry = RoleRegistry::builtin(PersonaConstraints {
            max_iterations: 5,
            max_rpm: 50,
        });
        assert!(registry.roles().iter().all(|p| p.constraints.max_rpm == 50));
        assert!(registry.roles().iter().all(|p| p.constraints.max_iterations == 5));
    }

    #[test]
    fn lookup_by_key() {
        let registry = RoleRegistry::builtin(constraints());
        assert_eq!(registry.get("tech_expert").unwrap().name, "Technical Expert");
        assert!(registry.get("marketer").is_none());
    }

    #[test]
    fn custom_registry_rejects_duplicates() {
        let persona = Persona {
            key: "a".into(),
            name: "A".into(),
            goal: "g".into(),
            backstory: "b".into(),
            constraints: constraints(),
        };
        let err = RoleRegistry::from_personas(vec![persona.clone(), persona]).unwrap_err();
        assert!(err.to_string().contains("duplicate persona key"));

        assert!(RoleRegistry::from_personas(vec![]).is_err());
    }
}
