//! Human-decision port.
//!
//! The engine never talks to a UI toolkit directly. Whenever a rule needs a
//! person to decide (swapping the key item, picking a weapon to drop,
//! confirming a reset) it blocks on one of these calls and acts only on the
//! returned answer.

/// Synchronous yes/no and pick-one prompts answered by the frontend.
pub trait DecisionPort {
    /// Ask a yes/no question.
    fn confirm(&mut self, question: &str) -> bool;

    /// Ask the player to pick one of `options`.
    ///
    /// Returns the index of the chosen option, or `None` when the player backs out.
    fn choose_one(&mut self, prompt: &str, options: &[String]) -> Option<usize>;
}

impl<T: DecisionPort + ?Sized> DecisionPort for &mut T {
    fn confirm(&mut self, question: &str) -> bool {
        (**self).confirm(question)
    }

    fn choose_one(&mut self, prompt: &str, options: &[String]) -> Option<usize> {
        (**self).choose_one(prompt, options)
    }
}
